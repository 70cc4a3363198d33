use rand::Rng;
use std::collections::{BTreeMap, HashMap, VecDeque};

use super::{FingerprintSensor, SearchResult, SensorStatus, SlotId, TemplateSlot};

/// Operations that can be made to fail on the simulated sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SensorOp {
    Capture,
    ToTemplate,
    CreateModel,
    Store,
    Search,
    EraseAll,
}

#[derive(Debug, Clone, Copy)]
struct Touch {
    finger: u32,
    /// Presence polls the finger stays on the glass after being imaged.
    hold: u32,
}

/// In-memory stand-in for the module, used in dev mode and tests.
///
/// A finger is an opaque `u32`. A queued touch is consumed by the next
/// capture. A plain touch lifts straight away; a held touch stays on the
/// glass for a number of presence polls, and every capture in that time
/// images the held finger again instead of taking the next touch.
///
/// With an idle limit set, that many captures in a row with nothing on the
/// glass answer [`SensorStatus::Timeout`] so a wait for a finger that will
/// never come gives up.
#[derive(Debug)]
pub struct SimulatedSensor {
    capacity: u16,
    touches: VecDeque<Touch>,
    image: Option<u32>,
    on_glass: Option<Touch>,
    idle_limit: Option<u32>,
    idle_polls: u32,
    buffers: [Option<u32>; 2],
    model: Option<u32>,
    library: BTreeMap<SlotId, u32>,
    faults: HashMap<SensorOp, SensorStatus>,
}

impl Default for SimulatedSensor {
    fn default() -> Self {
        Self::new(127)
    }
}

impl SimulatedSensor {
    pub fn new(capacity: u16) -> Self {
        Self {
            capacity,
            touches: VecDeque::new(),
            image: None,
            on_glass: None,
            idle_limit: None,
            idle_polls: 0,
            buffers: [None, None],
            model: None,
            library: BTreeMap::new(),
            faults: HashMap::new(),
        }
    }

    /// Gives up on empty captures after `polls` in a row. 0 waits forever.
    pub fn with_idle_limit(mut self, polls: u32) -> Self {
        self.idle_limit = (polls > 0).then_some(polls);
        self
    }

    /// Queues one tap of `finger`.
    pub fn place(&mut self, finger: u32) {
        self.hold(finger, 0);
    }

    /// Queues a touch that stays on the glass for `polls` presence polls.
    pub fn hold(&mut self, finger: u32, polls: u32) {
        self.touches.push_back(Touch { finger, hold: polls });
    }

    pub fn pending_touches(&self) -> usize {
        self.touches.len()
    }

    /// Makes the next call of `op` answer with `status` instead of running.
    pub fn fail_next(&mut self, op: SensorOp, status: SensorStatus) {
        self.faults.insert(op, status);
    }

    /// Writes a template straight into the library, bypassing enrollment.
    pub fn preload(&mut self, slot: SlotId, finger: u32) {
        self.library.insert(slot, finger);
    }

    pub fn stored(&self, slot: SlotId) -> Option<u32> {
        self.library.get(&slot).copied()
    }

    pub fn template_count(&self) -> usize {
        self.library.len()
    }

    fn fault(&mut self, op: SensorOp) -> Option<SensorStatus> {
        self.faults.remove(&op)
    }
}

impl FingerprintSensor for SimulatedSensor {
    fn capture_image(&mut self) -> SensorStatus {
        if let Some(status) = self.fault(SensorOp::Capture) {
            return status;
        }
        if let Some(held) = self.on_glass {
            self.image = Some(held.finger);
            self.idle_polls = 0;
            return SensorStatus::Ok;
        }
        match self.touches.pop_front() {
            Some(touch) => {
                self.image = Some(touch.finger);
                self.on_glass = (touch.hold > 0).then_some(touch);
                self.idle_polls = 0;
                SensorStatus::Ok
            }
            None => {
                self.idle_polls += 1;
                match self.idle_limit {
                    Some(limit) if self.idle_polls >= limit => {
                        tracing::warn!("No simulated finger after {} captures, giving up", limit);
                        self.idle_polls = 0;
                        SensorStatus::Timeout
                    }
                    _ => SensorStatus::NoFinger,
                }
            }
        }
    }

    fn to_template(&mut self, slot: TemplateSlot) -> SensorStatus {
        if let Some(status) = self.fault(SensorOp::ToTemplate) {
            return status;
        }
        match self.image {
            Some(finger) => {
                self.buffers[slot.buffer_id() as usize - 1] = Some(finger);
                SensorStatus::Ok
            }
            None => SensorStatus::InvalidImage,
        }
    }

    fn create_model(&mut self) -> SensorStatus {
        if let Some(status) = self.fault(SensorOp::CreateModel) {
            return status;
        }
        match self.buffers {
            [Some(first), Some(second)] if first == second => {
                self.model = Some(first);
                SensorStatus::Ok
            }
            [Some(_), Some(_)] => SensorStatus::EnrollMismatch,
            _ => SensorStatus::FeatureFail,
        }
    }

    fn store_model(&mut self, id: SlotId) -> SensorStatus {
        if let Some(status) = self.fault(SensorOp::Store) {
            return status;
        }
        if id >= self.capacity {
            return SensorStatus::BadLocation;
        }
        match self.model {
            Some(finger) => {
                self.library.insert(id, finger);
                SensorStatus::Ok
            }
            None => SensorStatus::InvalidImage,
        }
    }

    fn search(&mut self) -> SearchResult {
        if let Some(status) = self.fault(SensorOp::Search) {
            return SearchResult::failed(status);
        }
        let Some(probe) = self.buffers[0] else {
            return SearchResult::failed(SensorStatus::InvalidImage);
        };

        // The module reports the lowest matching page
        match self.library.iter().find(|(_, finger)| **finger == probe) {
            Some((slot, _)) => {
                let confidence = rand::thread_rng().gen_range(60..=300);
                SearchResult::found(*slot, confidence)
            }
            None => SearchResult::failed(SensorStatus::NotFound),
        }
    }

    fn erase_all(&mut self) -> SensorStatus {
        if let Some(status) = self.fault(SensorOp::EraseAll) {
            return status;
        }
        self.library.clear();
        SensorStatus::Ok
    }

    fn is_finger_present(&mut self) -> bool {
        let Some(held) = self.on_glass.as_mut() else {
            return false;
        };
        held.hold -= 1;
        if held.hold == 0 {
            self.on_glass = None;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_without_touch_reports_no_finger() {
        let mut sensor = SimulatedSensor::default();
        assert_eq!(sensor.capture_image(), SensorStatus::NoFinger);
    }

    #[test]
    fn tapped_finger_lifts_immediately() {
        let mut sensor = SimulatedSensor::default();
        sensor.place(7);
        assert_eq!(sensor.capture_image(), SensorStatus::Ok);
        assert!(!sensor.is_finger_present());
    }

    #[test]
    fn held_finger_is_imaged_again_until_lifted() {
        let mut sensor = SimulatedSensor::default();
        sensor.hold(7, 2);
        sensor.place(8);

        assert_eq!(sensor.capture_image(), SensorStatus::Ok);
        assert_eq!(sensor.capture_image(), SensorStatus::Ok);
        assert_eq!(sensor.image, Some(7));
        assert_eq!(sensor.pending_touches(), 1);

        assert!(sensor.is_finger_present());
        assert!(sensor.is_finger_present());
        assert!(!sensor.is_finger_present());

        assert_eq!(sensor.capture_image(), SensorStatus::Ok);
        assert_eq!(sensor.image, Some(8));
        assert_eq!(sensor.pending_touches(), 0);
    }

    #[test]
    fn idle_limit_turns_empty_waits_into_timeout() {
        let mut sensor = SimulatedSensor::default().with_idle_limit(3);
        assert_eq!(sensor.capture_image(), SensorStatus::NoFinger);
        assert_eq!(sensor.capture_image(), SensorStatus::NoFinger);
        assert_eq!(sensor.capture_image(), SensorStatus::Timeout);

        // A touch resets the count
        sensor.place(1);
        assert_eq!(sensor.capture_image(), SensorStatus::Ok);
        assert_eq!(sensor.capture_image(), SensorStatus::NoFinger);
    }

    #[test]
    fn zero_idle_limit_waits_forever() {
        let mut sensor = SimulatedSensor::default().with_idle_limit(0);
        for _ in 0..1000 {
            assert_eq!(sensor.capture_image(), SensorStatus::NoFinger);
        }
    }

    #[test]
    fn model_requires_matching_captures() {
        let mut sensor = SimulatedSensor::default();
        sensor.place(1);
        sensor.place(2);

        sensor.capture_image();
        sensor.to_template(TemplateSlot::One);
        sensor.capture_image();
        sensor.to_template(TemplateSlot::Two);

        assert_eq!(sensor.create_model(), SensorStatus::EnrollMismatch);
    }

    #[test]
    fn search_returns_lowest_matching_slot() {
        let mut sensor = SimulatedSensor::default();
        sensor.preload(5, 9);
        sensor.preload(2, 9);
        sensor.place(9);

        sensor.capture_image();
        sensor.to_template(TemplateSlot::One);
        let result = sensor.search();

        assert_eq!(result.status, SensorStatus::Ok);
        assert_eq!(result.matched, Some(2));
    }

    #[test]
    fn store_outside_library_is_bad_location() {
        let mut sensor = SimulatedSensor::new(10);
        sensor.place(3);
        sensor.place(3);
        sensor.capture_image();
        sensor.to_template(TemplateSlot::One);
        sensor.capture_image();
        sensor.to_template(TemplateSlot::Two);
        sensor.create_model();

        assert_eq!(sensor.store_model(10), SensorStatus::BadLocation);
        assert_eq!(sensor.store_model(9), SensorStatus::Ok);
    }

    #[test]
    fn injected_fault_fires_once() {
        let mut sensor = SimulatedSensor::default();
        sensor.preload(1, 1);
        sensor.fail_next(SensorOp::EraseAll, SensorStatus::DbClearFail);

        assert_eq!(sensor.erase_all(), SensorStatus::DbClearFail);
        assert_eq!(sensor.template_count(), 1);
        assert_eq!(sensor.erase_all(), SensorStatus::Ok);
        assert_eq!(sensor.template_count(), 0);
    }
}
