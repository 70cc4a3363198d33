//! Fingerprint sensor capability.
//!
//! The core only talks to a sensor through [`FingerprintSensor`]. Every
//! operation answers with a [`SensorStatus`]; anything other than
//! [`SensorStatus::Ok`] is an opaque failure cause to the workflows.

pub mod r30x;
pub mod simulated;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::common::config::{SensorBackend, SensorConfig};
use crate::common::Result;

pub use r30x::R30xSensor;
pub use simulated::{SensorOp, SimulatedSensor};

/// Template page on the sensor, correlated 1:1 with a voter record.
pub type SlotId = u16;

/// The two character buffers a capture can be converted into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateSlot {
    One,
    Two,
}

impl TemplateSlot {
    pub fn buffer_id(self) -> u8 {
        match self {
            TemplateSlot::One => 1,
            TemplateSlot::Two => 2,
        }
    }
}

/// Confirmation codes of the R30x family. `Timeout` and `BadPacket` are
/// produced host-side when the module does not answer properly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SensorStatus {
    Ok,
    PacketReceive,
    NoFinger,
    ImageFail,
    ImageMessy,
    FeatureFail,
    NoMatch,
    NotFound,
    EnrollMismatch,
    BadLocation,
    DbReadFail,
    UploadFeatureFail,
    PacketResponseFail,
    UploadFail,
    DeleteFail,
    DbClearFail,
    PasswordFail,
    InvalidImage,
    FlashError,
    InvalidRegister,
    AddressCode,
    PasswordRequired,
    BadPacket,
    Timeout,
    Unknown(u8),
}

impl SensorStatus {
    pub fn from_code(code: u8) -> Self {
        match code {
            0x00 => SensorStatus::Ok,
            0x01 => SensorStatus::PacketReceive,
            0x02 => SensorStatus::NoFinger,
            0x03 => SensorStatus::ImageFail,
            0x06 => SensorStatus::ImageMessy,
            0x07 => SensorStatus::FeatureFail,
            0x08 => SensorStatus::NoMatch,
            0x09 => SensorStatus::NotFound,
            0x0A => SensorStatus::EnrollMismatch,
            0x0B => SensorStatus::BadLocation,
            0x0C => SensorStatus::DbReadFail,
            0x0D => SensorStatus::UploadFeatureFail,
            0x0E => SensorStatus::PacketResponseFail,
            0x0F => SensorStatus::UploadFail,
            0x10 => SensorStatus::DeleteFail,
            0x11 => SensorStatus::DbClearFail,
            0x13 => SensorStatus::PasswordFail,
            0x15 => SensorStatus::InvalidImage,
            0x18 => SensorStatus::FlashError,
            0x1A => SensorStatus::InvalidRegister,
            0x20 => SensorStatus::AddressCode,
            0x21 => SensorStatus::PasswordRequired,
            0xFE => SensorStatus::BadPacket,
            0xFF => SensorStatus::Timeout,
            other => SensorStatus::Unknown(other),
        }
    }

    pub fn code(self) -> u8 {
        match self {
            SensorStatus::Ok => 0x00,
            SensorStatus::PacketReceive => 0x01,
            SensorStatus::NoFinger => 0x02,
            SensorStatus::ImageFail => 0x03,
            SensorStatus::ImageMessy => 0x06,
            SensorStatus::FeatureFail => 0x07,
            SensorStatus::NoMatch => 0x08,
            SensorStatus::NotFound => 0x09,
            SensorStatus::EnrollMismatch => 0x0A,
            SensorStatus::BadLocation => 0x0B,
            SensorStatus::DbReadFail => 0x0C,
            SensorStatus::UploadFeatureFail => 0x0D,
            SensorStatus::PacketResponseFail => 0x0E,
            SensorStatus::UploadFail => 0x0F,
            SensorStatus::DeleteFail => 0x10,
            SensorStatus::DbClearFail => 0x11,
            SensorStatus::PasswordFail => 0x13,
            SensorStatus::InvalidImage => 0x15,
            SensorStatus::FlashError => 0x18,
            SensorStatus::InvalidRegister => 0x1A,
            SensorStatus::AddressCode => 0x20,
            SensorStatus::PasswordRequired => 0x21,
            SensorStatus::BadPacket => 0xFE,
            SensorStatus::Timeout => 0xFF,
            SensorStatus::Unknown(code) => code,
        }
    }

    pub fn is_ok(self) -> bool {
        self == SensorStatus::Ok
    }

    /// Turns the status into a `Result` so callers can use `?`.
    pub fn check(self) -> std::result::Result<(), SensorStatus> {
        if self.is_ok() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for SensorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            SensorStatus::Ok => "ok",
            SensorStatus::PacketReceive => "packet receive error",
            SensorStatus::NoFinger => "no finger on sensor",
            SensorStatus::ImageFail => "failed to capture image",
            SensorStatus::ImageMessy => "image too messy",
            SensorStatus::FeatureFail => "could not extract features",
            SensorStatus::NoMatch => "fingerprints do not match",
            SensorStatus::NotFound => "no matching template",
            SensorStatus::EnrollMismatch => "captures do not belong to the same finger",
            SensorStatus::BadLocation => "template slot out of range",
            SensorStatus::DbReadFail => "template library read failed",
            SensorStatus::UploadFeatureFail => "feature upload failed",
            SensorStatus::PacketResponseFail => "module cannot receive data packet",
            SensorStatus::UploadFail => "image upload failed",
            SensorStatus::DeleteFail => "template delete failed",
            SensorStatus::DbClearFail => "template library clear failed",
            SensorStatus::PasswordFail => "wrong module password",
            SensorStatus::InvalidImage => "no valid image in buffer",
            SensorStatus::FlashError => "flash write error",
            SensorStatus::InvalidRegister => "invalid register",
            SensorStatus::AddressCode => "wrong module address",
            SensorStatus::PasswordRequired => "module password must be verified",
            SensorStatus::BadPacket => "malformed response packet",
            SensorStatus::Timeout => "sensor did not respond",
            SensorStatus::Unknown(_) => "unknown status",
        };
        write!(f, "{} (0x{:02X})", text, self.code())
    }
}

/// Outcome of a library search against the template in buffer 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchResult {
    pub status: SensorStatus,
    pub matched: Option<SlotId>,
    pub confidence: u16,
}

impl SearchResult {
    pub fn found(slot: SlotId, confidence: u16) -> Self {
        Self { status: SensorStatus::Ok, matched: Some(slot), confidence }
    }

    pub fn failed(status: SensorStatus) -> Self {
        Self { status, matched: None, confidence: 0 }
    }
}

/// A single physical sensor session. Implementations are not reentrant;
/// callers hold `&mut` for the duration of a workflow.
pub trait FingerprintSensor {
    /// Takes one image if a finger is on the glass.
    fn capture_image(&mut self) -> SensorStatus;

    /// Extracts a template from the last image into the given buffer.
    fn to_template(&mut self, slot: TemplateSlot) -> SensorStatus;

    /// Combines both buffers into a model.
    fn create_model(&mut self) -> SensorStatus;

    fn store_model(&mut self, id: SlotId) -> SensorStatus;

    fn search(&mut self) -> SearchResult;

    fn erase_all(&mut self) -> SensorStatus;

    fn is_finger_present(&mut self) -> bool;
}

/// The sensor a running service drives, chosen by config.
pub enum SensorDevice {
    Serial(R30xSensor),
    Simulated(SimulatedSensor),
}

impl SensorDevice {
    pub fn open(config: &SensorConfig) -> Result<Self> {
        match config.backend {
            SensorBackend::Serial => Ok(SensorDevice::Serial(R30xSensor::open(config)?)),
            SensorBackend::Simulated => {
                tracing::info!("Using simulated sensor ({} pages)", config.library_capacity);
                let sensor = SimulatedSensor::new(config.library_capacity)
                    .with_idle_limit(config.simulated_idle_polls);
                Ok(SensorDevice::Simulated(sensor))
            }
        }
    }

    pub fn as_simulated_mut(&mut self) -> Option<&mut SimulatedSensor> {
        match self {
            SensorDevice::Simulated(sensor) => Some(sensor),
            SensorDevice::Serial(_) => None,
        }
    }
}

impl FingerprintSensor for SensorDevice {
    fn capture_image(&mut self) -> SensorStatus {
        match self {
            SensorDevice::Serial(s) => s.capture_image(),
            SensorDevice::Simulated(s) => s.capture_image(),
        }
    }

    fn to_template(&mut self, slot: TemplateSlot) -> SensorStatus {
        match self {
            SensorDevice::Serial(s) => s.to_template(slot),
            SensorDevice::Simulated(s) => s.to_template(slot),
        }
    }

    fn create_model(&mut self) -> SensorStatus {
        match self {
            SensorDevice::Serial(s) => s.create_model(),
            SensorDevice::Simulated(s) => s.create_model(),
        }
    }

    fn store_model(&mut self, id: SlotId) -> SensorStatus {
        match self {
            SensorDevice::Serial(s) => s.store_model(id),
            SensorDevice::Simulated(s) => s.store_model(id),
        }
    }

    fn search(&mut self) -> SearchResult {
        match self {
            SensorDevice::Serial(s) => s.search(),
            SensorDevice::Simulated(s) => s.search(),
        }
    }

    fn erase_all(&mut self) -> SensorStatus {
        match self {
            SensorDevice::Serial(s) => s.erase_all(),
            SensorDevice::Simulated(s) => s.erase_all(),
        }
    }

    fn is_finger_present(&mut self) -> bool {
        match self {
            SensorDevice::Serial(s) => s.is_finger_present(),
            SensorDevice::Simulated(s) => s.is_finger_present(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_codes_map_back() {
        for code in [0x00, 0x02, 0x09, 0x0B, 0x11, 0x18, 0x21, 0xFE, 0xFF] {
            assert_eq!(SensorStatus::from_code(code).code(), code);
        }
    }

    #[test]
    fn unmapped_code_is_preserved() {
        let status = SensorStatus::from_code(0x42);
        assert_eq!(status, SensorStatus::Unknown(0x42));
        assert_eq!(status.code(), 0x42);
    }

    #[test]
    fn check_only_passes_ok() {
        assert!(SensorStatus::Ok.check().is_ok());
        assert_eq!(SensorStatus::ImageFail.check(), Err(SensorStatus::ImageFail));
    }

    #[test]
    fn display_includes_hex_code() {
        assert_eq!(SensorStatus::NotFound.to_string(), "no matching template (0x09)");
    }
}
