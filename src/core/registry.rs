use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::sensor::SlotId;

/// Externally supplied voter details. All fields are opaque strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterDetails {
    pub voter_id: String,
    pub name: String,
    pub age: String,
    pub gender: String,
    pub address: String,
}

impl VoterDetails {
    /// Name of the first empty required field, if any.
    pub fn first_missing_field(&self) -> Option<&'static str> {
        [
            ("voter_id", &self.voter_id),
            ("name", &self.name),
            ("age", &self.age),
            ("gender", &self.gender),
            ("address", &self.address),
        ]
        .into_iter()
        .find(|(_, value)| value.trim().is_empty())
        .map(|(field, _)| field)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterRecord {
    pub slot_id: SlotId,
    pub voter_id: String,
    pub name: String,
    pub age: String,
    pub gender: String,
    pub address: String,
}

impl VoterRecord {
    pub fn new(slot_id: SlotId, details: VoterDetails) -> Self {
        Self {
            slot_id,
            voter_id: details.voter_id,
            name: details.name,
            age: details.age,
            gender: details.gender,
            address: details.address,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("registry is full ({capacity} voters)")]
    Full { capacity: usize },

    #[error("slot {0} already has a voter record")]
    SlotTaken(SlotId),

    #[error("slot id 0 is not a valid voter slot")]
    InvalidSlot,
}

/// Largest registry that still has a slot id left for the next candidate.
pub const MAX_CAPACITY: usize = SlotId::MAX as usize - 1;

/// Bounded, insertion-ordered set of voter records keyed by sensor slot.
#[derive(Debug, Clone)]
pub struct Registry {
    records: Vec<VoterRecord>,
    capacity: usize,
}

impl Registry {
    pub fn new(capacity: usize) -> Self {
        if capacity > MAX_CAPACITY {
            tracing::warn!("Registry capacity {} clamped to {}", capacity, MAX_CAPACITY);
        }
        let capacity = capacity.min(MAX_CAPACITY);
        Self {
            records: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_full(&self) -> bool {
        self.records.len() >= self.capacity
    }

    /// Slot to reserve for the next enrollment. Ids are never reused
    /// because records are only removed by a full clear.
    pub fn next_slot_id(&self) -> SlotId {
        SlotId::try_from(self.records.len() + 1).unwrap_or(SlotId::MAX)
    }

    pub fn commit(&mut self, record: VoterRecord) -> Result<(), RegistryError> {
        if self.is_full() {
            return Err(RegistryError::Full { capacity: self.capacity });
        }
        if record.slot_id == 0 {
            return Err(RegistryError::InvalidSlot);
        }
        if self.is_slot_enrolled(record.slot_id) {
            return Err(RegistryError::SlotTaken(record.slot_id));
        }

        tracing::debug!("Committing voter {} at slot {}", record.voter_id, record.slot_id);
        self.records.push(record);
        Ok(())
    }

    pub fn find_by_slot_id(&self, slot_id: SlotId) -> Option<&VoterRecord> {
        self.records.iter().find(|r| r.slot_id == slot_id)
    }

    pub fn find_by_voter_id(&self, voter_id: &str) -> Option<&VoterRecord> {
        self.records.iter().find(|r| r.voter_id == voter_id)
    }

    pub fn is_slot_enrolled(&self, slot_id: SlotId) -> bool {
        self.find_by_slot_id(slot_id).is_some()
    }

    pub fn records(&self) -> &[VoterRecord] {
        &self.records
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(slot_id: SlotId, voter_id: &str) -> VoterRecord {
        VoterRecord {
            slot_id,
            voter_id: voter_id.to_string(),
            name: "Alice".to_string(),
            age: "30".to_string(),
            gender: "F".to_string(),
            address: "X".to_string(),
        }
    }

    #[test]
    fn next_slot_follows_count() {
        let mut registry = Registry::new(3);
        assert_eq!(registry.next_slot_id(), 1);

        registry.commit(record(1, "V1")).unwrap();
        assert_eq!(registry.next_slot_id(), 2);
    }

    #[test]
    fn capacity_beyond_slot_range_is_clamped() {
        let registry = Registry::new(usize::MAX);
        assert_eq!(registry.capacity(), MAX_CAPACITY);

        let registry = Registry::new(70_000);
        assert_eq!(registry.capacity(), MAX_CAPACITY);
        assert_eq!(registry.next_slot_id(), 1);
    }

    #[test]
    fn commit_fails_when_full() {
        let mut registry = Registry::new(1);
        registry.commit(record(1, "V1")).unwrap();

        assert_eq!(
            registry.commit(record(2, "V2")),
            Err(RegistryError::Full { capacity: 1 })
        );
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn commit_rejects_taken_slot() {
        let mut registry = Registry::new(5);
        registry.commit(record(1, "V1")).unwrap();

        assert_eq!(registry.commit(record(1, "V2")), Err(RegistryError::SlotTaken(1)));
    }

    #[test]
    fn commit_rejects_slot_zero() {
        let mut registry = Registry::new(5);
        assert_eq!(registry.commit(record(0, "V1")), Err(RegistryError::InvalidSlot));
        assert!(registry.is_empty());
    }

    #[test]
    fn lookups_by_slot_and_voter_id() {
        let mut registry = Registry::new(5);
        registry.commit(record(1, "V1")).unwrap();
        registry.commit(record(2, "V2")).unwrap();

        assert_eq!(registry.find_by_slot_id(2).map(|r| r.voter_id.as_str()), Some("V2"));
        assert_eq!(registry.find_by_voter_id("V1").map(|r| r.slot_id), Some(1));
        assert!(registry.find_by_slot_id(3).is_none());
        assert!(registry.find_by_voter_id("V9").is_none());
    }

    #[test]
    fn is_slot_enrolled_tracks_commits_only() {
        let mut registry = Registry::new(5);
        assert!(!registry.is_slot_enrolled(1));

        registry.commit(record(1, "V1")).unwrap();
        assert!(registry.is_slot_enrolled(1));
        assert!(!registry.is_slot_enrolled(2));
    }

    #[test]
    fn duplicate_voter_ids_are_allowed() {
        let mut registry = Registry::new(5);
        registry.commit(record(1, "V1")).unwrap();
        registry.commit(record(2, "V1")).unwrap();

        assert_eq!(registry.len(), 2);
        // First enrollment wins on lookup
        assert_eq!(registry.find_by_voter_id("V1").map(|r| r.slot_id), Some(1));
    }

    #[test]
    fn clear_restarts_slot_numbering() {
        let mut registry = Registry::new(5);
        registry.commit(record(1, "V1")).unwrap();
        registry.clear();

        assert!(registry.is_empty());
        assert_eq!(registry.next_slot_id(), 1);
    }
}
