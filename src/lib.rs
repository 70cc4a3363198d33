// Core modules
pub mod common;
pub mod core;
pub mod sensor;
pub mod service;

// Re-export commonly used types
pub use crate::common::{Config, DevMode, Result, VoteError};
pub use crate::core::{
    Confirmation, ConfirmError, EnrollError, EnrollOptions, EnrollPrompt, IdentificationOutcome,
    Registry, RegistryError, RegistryStats, ResetError, VoterDetails, VoterRecord, VotingStation,
};
pub use crate::sensor::{FingerprintSensor, SearchResult, SensorDevice, SensorStatus, SlotId, TemplateSlot};
pub use crate::service::{protocol, ServiceClient};
