//! A voting station: one sensor, one registry, one workflow at a time.
//!
//! Every sensor-using operation takes `&mut self`, so the borrow checker
//! enforces the single execution slot the hardware requires.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::enroll::{self, EnrollError, EnrollOptions, EnrollPrompt};
use crate::core::identify::{self, IdentificationOutcome};
use crate::core::registry::{Registry, VoterDetails, VoterRecord};
use crate::sensor::{FingerprintSensor, SensorStatus, SlotId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Confirmation {
    pub voter_id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfirmError {
    #[error("voter {0} not found")]
    NotFound(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("failed to erase the fingerprint library: {0}")]
pub struct ResetError(pub SensorStatus);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryStats {
    pub enrolled: usize,
    pub capacity: usize,
    pub next_slot_id: SlotId,
    pub started_at: DateTime<Utc>,
}

pub struct VotingStation<S> {
    sensor: S,
    registry: Registry,
    options: EnrollOptions,
    started_at: DateTime<Utc>,
}

impl<S: FingerprintSensor> VotingStation<S> {
    pub fn new(sensor: S, registry_capacity: usize, options: EnrollOptions) -> Self {
        Self {
            sensor,
            registry: Registry::new(registry_capacity),
            options,
            started_at: Utc::now(),
        }
    }

    /// Enrolls at the next free slot, reporting prompts as the sequence runs.
    pub fn enroll(
        &mut self,
        details: VoterDetails,
        prompt: &mut dyn FnMut(EnrollPrompt),
    ) -> Result<VoterRecord, EnrollError> {
        let candidate = self.registry.next_slot_id();
        enroll::enroll(&mut self.sensor, &mut self.registry, candidate, details, &self.options, prompt)
    }

    pub fn identify(&mut self) -> IdentificationOutcome {
        identify::identify(&mut self.sensor, &self.registry)
    }

    /// Looks a voter up by the id they present. No sensor access.
    pub fn confirm(&self, voter_id: &str) -> Result<Confirmation, ConfirmError> {
        match self.registry.find_by_voter_id(voter_id) {
            Some(record) => {
                tracing::info!("Vote confirmed for voter {} ({})", record.voter_id, record.name);
                Ok(Confirmation {
                    voter_id: record.voter_id.clone(),
                    name: record.name.clone(),
                })
            }
            None => Err(ConfirmError::NotFound(voter_id.to_string())),
        }
    }

    /// Erases the sensor library, then the registry. If the erase fails the
    /// registry is kept so slot ids stay tied to the templates on the module.
    pub fn reset(&mut self) -> Result<(), ResetError> {
        self.sensor.erase_all().check().map_err(|status| {
            tracing::error!("Reset aborted, sensor erase failed: {}", status);
            ResetError(status)
        })?;

        let removed = self.registry.len();
        self.registry.clear();
        tracing::info!("Reset complete, {} voter records removed", removed);
        Ok(())
    }

    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            enrolled: self.registry.len(),
            capacity: self.registry.capacity(),
            next_slot_id: self.registry.next_slot_id(),
            started_at: self.started_at,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn sensor(&self) -> &S {
        &self.sensor
    }

    pub fn sensor_mut(&mut self) -> &mut S {
        &mut self.sensor
    }
}
