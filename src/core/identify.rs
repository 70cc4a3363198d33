use serde::{Deserialize, Serialize};

use crate::core::registry::{Registry, VoterRecord};
use crate::sensor::{FingerprintSensor, SensorStatus, SlotId, TemplateSlot};

/// Result of a single-capture identification. None of these are errors;
/// callers branch on the variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum IdentificationOutcome {
    NotRecognized,
    /// The sensor matched a template that no voter record points at.
    RecognizedUnregistered { slot_id: SlotId, confidence: u16 },
    Recognized { record: VoterRecord, confidence: u16 },
}

impl IdentificationOutcome {
    pub fn record(&self) -> Option<&VoterRecord> {
        match self {
            IdentificationOutcome::Recognized { record, .. } => Some(record),
            _ => None,
        }
    }
}

pub fn identify<S: FingerprintSensor + ?Sized>(
    sensor: &mut S,
    registry: &Registry,
) -> IdentificationOutcome {
    let status = sensor.capture_image();
    tracing::debug!("Capture result: {}", status);
    if !status.is_ok() {
        return IdentificationOutcome::NotRecognized;
    }

    let status = sensor.to_template(TemplateSlot::One);
    tracing::debug!("Template result: {}", status);
    if !status.is_ok() {
        return IdentificationOutcome::NotRecognized;
    }

    let search = sensor.search();
    tracing::debug!("Search result: {}", search.status);
    let slot_id = match (search.status, search.matched) {
        (SensorStatus::Ok, Some(slot_id)) => slot_id,
        _ => return IdentificationOutcome::NotRecognized,
    };

    match registry.find_by_slot_id(slot_id) {
        Some(record) => {
            tracing::info!(
                "Matched slot {} (confidence {}) to voter {}",
                slot_id, search.confidence, record.voter_id
            );
            IdentificationOutcome::Recognized {
                record: record.clone(),
                confidence: search.confidence,
            }
        }
        None => {
            tracing::warn!("Slot {} matched on the sensor but has no voter record", slot_id);
            IdentificationOutcome::RecognizedUnregistered {
                slot_id,
                confidence: search.confidence,
            }
        }
    }
}
