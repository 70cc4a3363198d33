pub mod config;
pub mod dev_mode;
pub mod error;
pub mod paths;

pub use config::{Config, SensorBackend};
pub use dev_mode::DevMode;
pub use error::{Result, VoteError};
pub use paths::{dev_config_file, dev_socket_path, system_config_file, system_socket_path};
