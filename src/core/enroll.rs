//! Two-capture enrollment against the sensor.
//!
//! The registry is only written in the final step, so any abort leaves it
//! exactly as it was. Sensor-side effects are not rolled back: once the
//! model is stored, a later duplicate or capacity abort leaves an orphaned
//! template on the module.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::thread;
use std::time::Duration;
use thiserror::Error;

use crate::core::registry::{Registry, RegistryError, VoterDetails, VoterRecord};
use crate::sensor::{FingerprintSensor, SensorStatus, SlotId, TemplateSlot};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnrollOptions {
    /// Pause between presence polls.
    pub poll_interval: Duration,
    /// Pause after the first capture before waiting for the finger to lift.
    pub remove_finger_delay: Duration,
}

impl Default for EnrollOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(50),
            remove_finger_delay: Duration::from_millis(2000),
        }
    }
}

impl EnrollOptions {
    pub fn immediate() -> Self {
        Self {
            poll_interval: Duration::ZERO,
            remove_finger_delay: Duration::ZERO,
        }
    }
}

/// Instructions for the person at the sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnrollPrompt {
    PlaceFinger,
    RemoveFinger,
    PlaceSameFingerAgain,
    Storing,
}

impl fmt::Display for EnrollPrompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            EnrollPrompt::PlaceFinger => "Place finger on the sensor...",
            EnrollPrompt::RemoveFinger => "Remove finger",
            EnrollPrompt::PlaceSameFingerAgain => "Place the same finger again...",
            EnrollPrompt::Storing => "Storing fingerprint...",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnrollError {
    #[error("missing required field: {0}")]
    Validation(String),

    #[error("slot {0} cannot take a new enrollment")]
    SlotUnavailable(SlotId),

    #[error("sensor error: {0}")]
    Sensor(SensorStatus),

    #[error("could not create fingerprint model: {0}")]
    ModelCreation(SensorStatus),

    #[error("could not store fingerprint at slot {slot}: {status}")]
    Storage { slot: SlotId, status: SensorStatus },

    #[error("fingerprint already enrolled at slot {matched}")]
    DuplicateBiometric { matched: SlotId },

    #[error("voter registry is full ({capacity} voters)")]
    RegistryFull { capacity: usize },
}

pub fn enroll<S: FingerprintSensor + ?Sized>(
    sensor: &mut S,
    registry: &mut Registry,
    candidate: SlotId,
    details: VoterDetails,
    options: &EnrollOptions,
    prompt: &mut dyn FnMut(EnrollPrompt),
) -> Result<VoterRecord, EnrollError> {
    if let Some(field) = details.first_missing_field() {
        return Err(EnrollError::Validation(field.to_string()));
    }
    // Storing over an enrolled slot would silently replace that voter's template
    if candidate == 0 || registry.is_slot_enrolled(candidate) {
        return Err(EnrollError::SlotUnavailable(candidate));
    }

    tracing::info!("Enrolling voter {} at slot {}", details.voter_id, candidate);

    prompt(EnrollPrompt::PlaceFinger);
    wait_for_image(sensor, options)?;
    sensor.to_template(TemplateSlot::One).check().map_err(EnrollError::Sensor)?;

    prompt(EnrollPrompt::RemoveFinger);
    thread::sleep(options.remove_finger_delay);
    while sensor.is_finger_present() {
        thread::sleep(options.poll_interval);
    }

    prompt(EnrollPrompt::PlaceSameFingerAgain);
    wait_for_image(sensor, options)?;
    sensor.to_template(TemplateSlot::Two).check().map_err(EnrollError::Sensor)?;

    sensor.create_model().check().map_err(EnrollError::ModelCreation)?;

    prompt(EnrollPrompt::Storing);
    sensor
        .store_model(candidate)
        .check()
        .map_err(|status| EnrollError::Storage { slot: candidate, status })?;

    let search = sensor.search();
    match (search.status, search.matched) {
        (SensorStatus::Ok, Some(matched)) if registry.is_slot_enrolled(matched) => {
            tracing::warn!(
                "Duplicate fingerprint: matches slot {}, template at slot {} left orphaned",
                matched, candidate
            );
            return Err(EnrollError::DuplicateBiometric { matched });
        }
        (SensorStatus::Ok, _) | (SensorStatus::NotFound, _) | (SensorStatus::NoMatch, _) => {}
        (status, _) => {
            tracing::warn!(
                "Duplicate check failed ({}), template at slot {} left orphaned",
                status, candidate
            );
            return Err(EnrollError::Sensor(status));
        }
    }

    let record = VoterRecord::new(candidate, details);
    registry.commit(record.clone()).map_err(|err| match err {
        RegistryError::Full { capacity } => {
            tracing::warn!("Registry full, template at slot {} left orphaned", candidate);
            EnrollError::RegistryFull { capacity }
        }
        RegistryError::SlotTaken(slot) => EnrollError::SlotUnavailable(slot),
        RegistryError::InvalidSlot => EnrollError::SlotUnavailable(candidate),
    })?;

    tracing::info!("Voter {} enrolled at slot {}", record.voter_id, record.slot_id);
    Ok(record)
}

/// Polls until an image is taken. Only "no finger" keeps the wait going.
fn wait_for_image<S: FingerprintSensor + ?Sized>(
    sensor: &mut S,
    options: &EnrollOptions,
) -> Result<(), EnrollError> {
    loop {
        match sensor.capture_image() {
            SensorStatus::Ok => return Ok(()),
            SensorStatus::NoFinger => thread::sleep(options.poll_interval),
            status => return Err(EnrollError::Sensor(status)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor::{SensorOp, SimulatedSensor};

    fn details(voter_id: &str, name: &str) -> VoterDetails {
        VoterDetails {
            voter_id: voter_id.to_string(),
            name: name.to_string(),
            age: "30".to_string(),
            gender: "F".to_string(),
            address: "X".to_string(),
        }
    }

    fn run(
        sensor: &mut SimulatedSensor,
        registry: &mut Registry,
        details: VoterDetails,
    ) -> Result<VoterRecord, EnrollError> {
        let slot = registry.next_slot_id();
        enroll(sensor, registry, slot, details, &EnrollOptions::immediate(), &mut |_| {})
    }

    #[test]
    fn prompts_follow_capture_sequence() {
        let mut sensor = SimulatedSensor::default();
        let mut registry = Registry::new(10);
        sensor.place(1);
        sensor.place(1);

        let mut prompts = Vec::new();
        enroll(
            &mut sensor,
            &mut registry,
            1,
            details("V1", "Alice"),
            &EnrollOptions::immediate(),
            &mut |p| prompts.push(p),
        )
        .unwrap();

        assert_eq!(
            prompts,
            vec![
                EnrollPrompt::PlaceFinger,
                EnrollPrompt::RemoveFinger,
                EnrollPrompt::PlaceSameFingerAgain,
                EnrollPrompt::Storing,
            ]
        );
    }

    #[test]
    fn empty_field_rejected_before_sensor_use() {
        let mut sensor = SimulatedSensor::default();
        let mut registry = Registry::new(10);
        sensor.place(1);

        let err = run(&mut sensor, &mut registry, details("V1", "")).unwrap_err();
        assert_eq!(err, EnrollError::Validation("name".to_string()));
        assert_eq!(sensor.pending_touches(), 1);
        assert!(registry.is_empty());
    }

    #[test]
    fn enrolled_slot_is_not_overwritten() {
        let mut sensor = SimulatedSensor::default();
        let mut registry = Registry::new(10);
        sensor.place(1);
        sensor.place(1);
        run(&mut sensor, &mut registry, details("V1", "Alice")).unwrap();

        sensor.place(2);
        sensor.place(2);
        let err = enroll(
            &mut sensor,
            &mut registry,
            1,
            details("V2", "Bob"),
            &EnrollOptions::immediate(),
            &mut |_| {},
        )
        .unwrap_err();

        assert_eq!(err, EnrollError::SlotUnavailable(1));
        assert_eq!(sensor.stored(1), Some(1));
    }

    #[test]
    fn second_capture_waits_for_finger_to_lift() {
        let mut sensor = SimulatedSensor::default();
        let mut registry = Registry::new(10);
        // First touch rests on the glass for three presence polls
        sensor.hold(4, 3);
        sensor.place(4);

        let record = run(&mut sensor, &mut registry, details("V1", "Alice")).unwrap();

        assert_eq!(record.slot_id, 1);
        assert_eq!(sensor.pending_touches(), 0);
        assert_eq!(sensor.stored(1), Some(4));
    }

    #[test]
    fn second_template_comes_from_the_next_touch() {
        let mut sensor = SimulatedSensor::default();
        let mut registry = Registry::new(10);
        sensor.hold(4, 3);
        sensor.place(5);

        let err = run(&mut sensor, &mut registry, details("V1", "Alice")).unwrap_err();

        assert_eq!(err, EnrollError::ModelCreation(SensorStatus::EnrollMismatch));
        assert_eq!(sensor.pending_touches(), 0);
    }

    #[test]
    fn enrollment_without_finger_gives_up_at_idle_limit() {
        let mut sensor = SimulatedSensor::default().with_idle_limit(5);
        let mut registry = Registry::new(10);

        let err = run(&mut sensor, &mut registry, details("V1", "Alice")).unwrap_err();

        assert_eq!(err, EnrollError::Sensor(SensorStatus::Timeout));
        assert!(registry.is_empty());
    }

    #[test]
    fn capture_error_aborts_wait() {
        let mut sensor = SimulatedSensor::default();
        let mut registry = Registry::new(10);
        sensor.fail_next(SensorOp::Capture, SensorStatus::ImageFail);

        let err = run(&mut sensor, &mut registry, details("V1", "Alice")).unwrap_err();
        assert_eq!(err, EnrollError::Sensor(SensorStatus::ImageFail));
        assert!(registry.is_empty());
    }

    #[test]
    fn different_fingers_fail_model_creation() {
        let mut sensor = SimulatedSensor::default();
        let mut registry = Registry::new(10);
        sensor.place(1);
        sensor.place(2);

        let err = run(&mut sensor, &mut registry, details("V1", "Alice")).unwrap_err();
        assert_eq!(err, EnrollError::ModelCreation(SensorStatus::EnrollMismatch));
        assert_eq!(sensor.template_count(), 0);
    }

    #[test]
    fn store_failure_reports_slot() {
        let mut sensor = SimulatedSensor::default();
        let mut registry = Registry::new(10);
        sensor.place(1);
        sensor.place(1);
        sensor.fail_next(SensorOp::Store, SensorStatus::FlashError);

        let err = run(&mut sensor, &mut registry, details("V1", "Alice")).unwrap_err();
        assert_eq!(err, EnrollError::Storage { slot: 1, status: SensorStatus::FlashError });
        assert!(registry.is_empty());
    }

    #[test]
    fn stale_template_match_is_not_a_duplicate() {
        let mut sensor = SimulatedSensor::default();
        let mut registry = Registry::new(10);
        // Page 0 is never assigned to a voter, so nothing in the registry refers to it
        sensor.preload(0, 4);
        sensor.place(4);
        sensor.place(4);

        let record = run(&mut sensor, &mut registry, details("V1", "Alice")).unwrap();
        assert_eq!(record.slot_id, 1);
    }

    #[test]
    fn failed_duplicate_search_aborts() {
        let mut sensor = SimulatedSensor::default();
        let mut registry = Registry::new(10);
        sensor.place(1);
        sensor.place(1);
        sensor.fail_next(SensorOp::Search, SensorStatus::PacketReceive);

        let err = run(&mut sensor, &mut registry, details("V1", "Alice")).unwrap_err();
        assert_eq!(err, EnrollError::Sensor(SensorStatus::PacketReceive));
        assert!(registry.is_empty());
    }
}
