use thiserror::Error;

use crate::sensor::SensorStatus;

#[derive(Error, Debug)]
pub enum VoteError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Sensor error: {0}")]
    Sensor(SensorStatus),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Service error: {0}")]
    Service(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, VoteError>;
