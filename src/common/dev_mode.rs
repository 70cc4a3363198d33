use std::path::{Path, PathBuf};

use crate::common::config::{Config, SensorBackend};
use crate::common::error::Result;
use crate::common::paths;

/// Development mode swaps the serial sensor for the simulated one and moves
/// the socket under /tmp so the service runs without hardware or root.
#[derive(Debug, Clone)]
pub struct DevMode {
    enabled: bool,
}

impl DevMode {
    pub fn new(enabled: bool) -> Self {
        if enabled {
            eprintln!("🧪 Development mode enabled - using the simulated fingerprint sensor");
        }
        Self { enabled }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn socket_path(&self) -> PathBuf {
        if self.enabled {
            paths::dev_socket_path()
        } else {
            paths::system_socket_path()
        }
    }

    /// Resolves the config for this mode. An explicit path always wins.
    pub fn load_config(&self, explicit: Option<&Path>) -> Result<Config> {
        let mut config = match explicit {
            Some(path) => Config::load_from_path(path)?,
            None if self.enabled => {
                let dev_path = paths::dev_config_file();
                if dev_path.exists() {
                    Config::load_from_path(&dev_path)?
                } else {
                    Config::default()
                }
            }
            None => Config::load()?,
        };

        if self.enabled {
            config.sensor.backend = SensorBackend::Simulated;
            config.service.socket_path = paths::dev_socket_path();
            config.enrollment.remove_finger_delay_ms = 0;
            tracing::debug!("Dev mode overrides applied: {:?}", config.service.socket_path);
        }

        config.validate()?;
        Ok(config)
    }
}
