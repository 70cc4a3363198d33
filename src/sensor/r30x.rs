//! Serial driver for R30x / AS608 / ZFM fingerprint modules.
//!
//! Packet layout (all multi-byte fields big-endian):
//!
//! ```text
//! EF 01 | address (4) | pid (1) | length (2) | payload | checksum (2)
//! ```
//!
//! `length` counts the payload plus the checksum. The checksum is the
//! wrapping 16-bit sum of pid, both length bytes and the payload.

use serialport::SerialPort;
use std::io::{self, Read, Write};
use std::time::Duration;
use thiserror::Error;

use super::{FingerprintSensor, SearchResult, SensorStatus, SlotId, TemplateSlot};
use crate::common::config::SensorConfig;
use crate::common::{Result, VoteError};

const START_CODE: [u8; 2] = [0xEF, 0x01];
const HEADER_LEN: usize = 9;
const MAX_PACKET_LEN: usize = 256;

pub const PID_COMMAND: u8 = 0x01;
pub const PID_ACK: u8 = 0x07;

const CMD_GEN_IMAGE: u8 = 0x01;
const CMD_IMAGE_TO_TZ: u8 = 0x02;
const CMD_SEARCH: u8 = 0x04;
const CMD_REG_MODEL: u8 = 0x05;
const CMD_STORE: u8 = 0x06;
const CMD_EMPTY: u8 = 0x0D;
const CMD_VERIFY_PASSWORD: u8 = 0x13;

/// Failed presence polls in a row between warnings.
const PRESENCE_FAILURE_WARN: u32 = 20;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PacketError {
    #[error("packet truncated: {0} bytes")]
    Truncated(usize),

    #[error("bad start code {0:02X?}")]
    BadStartCode([u8; 2]),

    #[error("length field {0} out of range")]
    Length(usize),

    #[error("checksum mismatch: expected {expected:#06x}, got {actual:#06x}")]
    Checksum { expected: u16, actual: u16 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub address: u32,
    pub pid: u8,
    pub payload: Vec<u8>,
}

impl Packet {
    pub fn command(address: u32, payload: Vec<u8>) -> Self {
        Self { address, pid: PID_COMMAND, payload }
    }

    fn checksum(pid: u8, length: u16, payload: &[u8]) -> u16 {
        let [len_hi, len_lo] = length.to_be_bytes();
        payload
            .iter()
            .fold(pid as u16 + len_hi as u16 + len_lo as u16, |sum, b| sum.wrapping_add(*b as u16))
    }

    pub fn encode(&self) -> Vec<u8> {
        let length = (self.payload.len() + 2) as u16;
        let mut bytes = Vec::with_capacity(HEADER_LEN + self.payload.len() + 2);
        bytes.extend_from_slice(&START_CODE);
        bytes.extend_from_slice(&self.address.to_be_bytes());
        bytes.push(self.pid);
        bytes.extend_from_slice(&length.to_be_bytes());
        bytes.extend_from_slice(&self.payload);
        bytes.extend_from_slice(&Self::checksum(self.pid, length, &self.payload).to_be_bytes());
        bytes
    }

    pub fn decode(bytes: &[u8]) -> std::result::Result<Self, PacketError> {
        if bytes.len() < HEADER_LEN + 2 {
            return Err(PacketError::Truncated(bytes.len()));
        }
        let start = [bytes[0], bytes[1]];
        if start != START_CODE {
            return Err(PacketError::BadStartCode(start));
        }

        let address = u32::from_be_bytes([bytes[2], bytes[3], bytes[4], bytes[5]]);
        let pid = bytes[6];
        let length = u16::from_be_bytes([bytes[7], bytes[8]]);
        let body_len = length as usize;
        if body_len < 2 || body_len > MAX_PACKET_LEN {
            return Err(PacketError::Length(body_len));
        }
        if bytes.len() < HEADER_LEN + body_len {
            return Err(PacketError::Truncated(bytes.len()));
        }

        let payload = &bytes[HEADER_LEN..HEADER_LEN + body_len - 2];
        let tail = &bytes[HEADER_LEN + body_len - 2..HEADER_LEN + body_len];
        let actual = u16::from_be_bytes([tail[0], tail[1]]);
        let expected = Self::checksum(pid, length, payload);
        if actual != expected {
            return Err(PacketError::Checksum { expected, actual });
        }

        Ok(Self { address, pid, payload: payload.to_vec() })
    }
}

/// Driver over any byte transport; in production a serial port.
pub struct R30xSensor<P = Box<dyn SerialPort>> {
    port: P,
    address: u32,
    library_capacity: u16,
    presence_failures: u32,
}

impl R30xSensor<Box<dyn SerialPort>> {
    /// Opens the serial port and performs the password handshake.
    pub fn open(config: &SensorConfig) -> Result<Self> {
        tracing::info!("Opening fingerprint sensor on {} @ {} baud", config.port, config.baud_rate);
        let port = serialport::new(&config.port, config.baud_rate)
            .timeout(Duration::from_millis(config.response_timeout_ms))
            .open()?;

        let mut sensor = Self::new(port, config.address, config.library_capacity);
        sensor.verify_password(config.password).map_err(VoteError::Sensor)?;
        tracing::info!("Fingerprint sensor ready");
        Ok(sensor)
    }
}

impl<P: Read + Write> R30xSensor<P> {
    pub fn new(port: P, address: u32, library_capacity: u16) -> Self {
        Self { port, address, library_capacity, presence_failures: 0 }
    }

    pub fn verify_password(&mut self, password: u32) -> std::result::Result<(), SensorStatus> {
        let mut payload = vec![CMD_VERIFY_PASSWORD];
        payload.extend_from_slice(&password.to_be_bytes());
        self.simple(payload).check()
    }

    fn command(&mut self, payload: Vec<u8>) -> std::result::Result<Vec<u8>, SensorStatus> {
        let packet = Packet::command(self.address, payload);
        self.port.write_all(&packet.encode()).map_err(io_status)?;
        self.port.flush().map_err(io_status)?;

        let ack = self.read_packet()?;
        if ack.pid != PID_ACK || ack.payload.is_empty() {
            tracing::warn!("Unexpected packet from sensor: pid {:#04x}", ack.pid);
            return Err(SensorStatus::BadPacket);
        }
        Ok(ack.payload)
    }

    fn read_packet(&mut self) -> std::result::Result<Packet, SensorStatus> {
        let mut buf = vec![0u8; HEADER_LEN];
        self.port.read_exact(&mut buf).map_err(io_status)?;

        let body_len = u16::from_be_bytes([buf[7], buf[8]]) as usize;
        if !(2..=MAX_PACKET_LEN).contains(&body_len) {
            return Err(SensorStatus::BadPacket);
        }
        buf.resize(HEADER_LEN + body_len, 0);
        self.port.read_exact(&mut buf[HEADER_LEN..]).map_err(io_status)?;

        Packet::decode(&buf).map_err(|e| {
            tracing::warn!("Dropping sensor packet: {}", e);
            SensorStatus::BadPacket
        })
    }

    fn simple(&mut self, payload: Vec<u8>) -> SensorStatus {
        match self.command(payload) {
            Ok(ack) => status_of(&ack),
            Err(status) => status,
        }
    }
}

fn status_of(ack: &[u8]) -> SensorStatus {
    ack.first().map_or(SensorStatus::BadPacket, |code| SensorStatus::from_code(*code))
}

fn io_status(err: io::Error) -> SensorStatus {
    tracing::debug!("Sensor I/O failure: {}", err);
    SensorStatus::Timeout
}

impl<P: Read + Write> FingerprintSensor for R30xSensor<P> {
    fn capture_image(&mut self) -> SensorStatus {
        self.simple(vec![CMD_GEN_IMAGE])
    }

    fn to_template(&mut self, slot: TemplateSlot) -> SensorStatus {
        self.simple(vec![CMD_IMAGE_TO_TZ, slot.buffer_id()])
    }

    fn create_model(&mut self) -> SensorStatus {
        self.simple(vec![CMD_REG_MODEL])
    }

    fn store_model(&mut self, id: SlotId) -> SensorStatus {
        let [hi, lo] = id.to_be_bytes();
        self.simple(vec![CMD_STORE, TemplateSlot::One.buffer_id(), hi, lo])
    }

    fn search(&mut self) -> SearchResult {
        let [count_hi, count_lo] = self.library_capacity.to_be_bytes();
        let payload = vec![CMD_SEARCH, TemplateSlot::One.buffer_id(), 0x00, 0x00, count_hi, count_lo];
        match self.command(payload) {
            Ok(ack) => {
                let status = status_of(&ack);
                if !status.is_ok() {
                    return SearchResult::failed(status);
                }
                if ack.len() < 5 {
                    return SearchResult::failed(SensorStatus::BadPacket);
                }
                let slot = u16::from_be_bytes([ack[1], ack[2]]);
                let confidence = u16::from_be_bytes([ack[3], ack[4]]);
                SearchResult::found(slot, confidence)
            }
            Err(status) => SearchResult::failed(status),
        }
    }

    fn erase_all(&mut self) -> SensorStatus {
        self.simple(vec![CMD_EMPTY])
    }

    fn is_finger_present(&mut self) -> bool {
        // Errors count as present so removal waits keep polling
        match self.capture_image() {
            SensorStatus::NoFinger => {
                self.presence_failures = 0;
                false
            }
            status @ (SensorStatus::Timeout | SensorStatus::BadPacket) => {
                self.presence_failures = self.presence_failures.saturating_add(1);
                if self.presence_failures % PRESENCE_FAILURE_WARN == 0 {
                    tracing::warn!(
                        "Sensor not answering presence polls ({} in a row, last: {})",
                        self.presence_failures, status
                    );
                }
                true
            }
            _ => {
                self.presence_failures = 0;
                true
            }
        }
    }
}
