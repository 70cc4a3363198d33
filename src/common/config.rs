use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::common::error::{Result, VoteError};
use crate::common::paths;
use crate::core::EnrollOptions;

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub sensor: SensorConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub enrollment: EnrollmentConfig,
    #[serde(default)]
    pub service: ServiceConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SensorBackend {
    Serial,
    Simulated,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SensorConfig {
    #[serde(default = "default_backend")]
    pub backend: SensorBackend,
    #[serde(default = "default_port")]
    pub port: String,
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    #[serde(default = "default_address")]
    pub address: u32,
    #[serde(default)]
    pub password: u32,
    /// Number of template pages the module can hold.
    #[serde(default = "default_library_capacity")]
    pub library_capacity: u16,
    #[serde(default = "default_response_timeout")]
    pub response_timeout_ms: u64,
    /// Empty captures in a row before the simulated sensor reports a
    /// timeout. 0 waits forever.
    #[serde(default = "default_simulated_idle_polls")]
    pub simulated_idle_polls: u32,
}

fn default_backend() -> SensorBackend { SensorBackend::Serial }
fn default_port() -> String { "/dev/ttyUSB0".to_string() }
fn default_baud_rate() -> u32 { 57600 }
fn default_address() -> u32 { 0xFFFF_FFFF }
fn default_library_capacity() -> u16 { 127 }
fn default_response_timeout() -> u64 { 1000 }
fn default_simulated_idle_polls() -> u32 { 200 }

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            port: default_port(),
            baud_rate: default_baud_rate(),
            address: default_address(),
            password: 0,
            library_capacity: default_library_capacity(),
            response_timeout_ms: default_response_timeout(),
            simulated_idle_polls: default_simulated_idle_polls(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RegistryConfig {
    #[serde(default = "default_registry_capacity")]
    pub capacity: usize,
}

fn default_registry_capacity() -> usize { 100 }

impl Default for RegistryConfig {
    fn default() -> Self {
        Self { capacity: default_registry_capacity() }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct EnrollmentConfig {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_remove_finger_delay")]
    pub remove_finger_delay_ms: u64,
}

fn default_poll_interval() -> u64 { 50 }
fn default_remove_finger_delay() -> u64 { 2000 }

impl Default for EnrollmentConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval(),
            remove_finger_delay_ms: default_remove_finger_delay(),
        }
    }
}

impl EnrollmentConfig {
    pub fn options(&self) -> EnrollOptions {
        EnrollOptions {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            remove_finger_delay: Duration::from_millis(self.remove_finger_delay_ms),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServiceConfig {
    #[serde(default = "default_socket_path")]
    pub socket_path: PathBuf,
    #[serde(default = "default_read_timeout")]
    pub read_timeout_secs: u64,
    #[serde(default = "default_write_timeout")]
    pub write_timeout_secs: u64,
}

fn default_socket_path() -> PathBuf { paths::system_socket_path() }
fn default_read_timeout() -> u64 { 10 }
fn default_write_timeout() -> u64 { 5 }

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            socket_path: default_socket_path(),
            read_timeout_secs: default_read_timeout(),
            write_timeout_secs: default_write_timeout(),
        }
    }
}

impl Config {
    /// Loads the system config, falling back to defaults when it is absent.
    pub fn load() -> Result<Self> {
        let path = paths::system_config_file();
        if path.exists() {
            Self::load_from_path(&path)
        } else {
            tracing::info!("No config at {}, using defaults", path.display());
            let config = Self::default();
            config.validate()?;
            Ok(config)
        }
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(VoteError::Config(format!(
                "Config file not found: {}", path.display()
            )));
        }

        tracing::info!("Loading config from: {}", path.display());
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)
            .map_err(|e| VoteError::Config(format!("Config parse error: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.registry.capacity == 0 {
            return Err(VoteError::Config(
                "Registry capacity must be at least 1".to_string()
            ));
        }

        if self.sensor.library_capacity == 0 {
            return Err(VoteError::Config(
                "Sensor library capacity must be at least 1".to_string()
            ));
        }

        // Enrollment stores at count + 1 before the capacity check, so pages
        // 1..=capacity + 1 must all exist on the module
        if self.registry.capacity.saturating_add(1) >= self.sensor.library_capacity as usize {
            return Err(VoteError::Config(format!(
                "Registry capacity {} needs at least {} sensor pages, module has {}",
                self.registry.capacity,
                self.registry.capacity.saturating_add(2),
                self.sensor.library_capacity
            )));
        }

        if self.sensor.backend == SensorBackend::Serial {
            if self.sensor.port.is_empty() {
                return Err(VoteError::Config("Sensor port must not be empty".to_string()));
            }
            if !(9600..=115200).contains(&self.sensor.baud_rate) || self.sensor.baud_rate % 9600 != 0 {
                return Err(VoteError::Config(format!(
                    "Baud rate must be a multiple of 9600 between 9600 and 115200, got {}",
                    self.sensor.baud_rate
                )));
            }
        }

        if self.sensor.response_timeout_ms == 0 || self.sensor.response_timeout_ms > 60_000 {
            return Err(VoteError::Config(format!(
                "Sensor response timeout must be between 1 and 60000 ms, got {}",
                self.sensor.response_timeout_ms
            )));
        }

        if self.enrollment.poll_interval_ms > 5_000 {
            return Err(VoteError::Config(format!(
                "Poll interval must be at most 5000 ms, got {}",
                self.enrollment.poll_interval_ms
            )));
        }

        if self.enrollment.remove_finger_delay_ms > 30_000 {
            return Err(VoteError::Config(format!(
                "Remove-finger delay must be at most 30000 ms, got {}",
                self.enrollment.remove_finger_delay_ms
            )));
        }

        if self.service.read_timeout_secs == 0 || self.service.write_timeout_secs == 0 {
            return Err(VoteError::Config(
                "Service timeouts must be at least 1 second".to_string()
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.registry.capacity, 100);
        assert_eq!(config.enrollment.remove_finger_delay_ms, 2000);
        assert_eq!(config.sensor.baud_rate, 57600);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [sensor]
            backend = "simulated"

            [registry]
            capacity = 10
            "#,
        )
        .unwrap();

        assert_eq!(config.sensor.backend, SensorBackend::Simulated);
        assert_eq!(config.registry.capacity, 10);
        assert_eq!(config.enrollment.poll_interval_ms, 50);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn registry_larger_than_library_is_rejected() {
        let mut config = Config::default();
        config.registry.capacity = 200;
        assert!(matches!(config.validate(), Err(VoteError::Config(_))));
    }

    #[test]
    fn library_must_hold_the_page_after_a_full_registry() {
        let mut config = Config::default();
        config.sensor.library_capacity = 3;

        config.registry.capacity = 2;
        assert!(matches!(config.validate(), Err(VoteError::Config(_))));

        config.registry.capacity = 1;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn odd_baud_rate_is_rejected() {
        let mut config = Config::default();
        config.sensor.baud_rate = 12345;
        assert!(config.validate().is_err());

        config.sensor.backend = SensorBackend::Simulated;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn load_from_path_reads_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[service]\nsocket_path = \"/tmp/test-fingervote.sock\"").unwrap();

        let config = Config::load_from_path(file.path()).unwrap();
        assert_eq!(config.service.socket_path, PathBuf::from("/tmp/test-fingervote.sock"));
    }

    #[test]
    fn load_from_missing_path_fails() {
        let err = Config::load_from_path(Path::new("/nonexistent/fingervote.toml")).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
