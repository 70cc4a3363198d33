use serde::{Deserialize, Serialize};
use std::io::{Read, Write};

use crate::common::{Result, VoteError};
use crate::core::{
    Confirmation, EnrollError, IdentificationOutcome, RegistryStats, ResetError, VoterDetails,
    VoterRecord,
};

// Request types
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Enroll(EnrollRequest),
    Identify,
    Confirm { voter_id: String },
    Reset,
    Stats,
    /// Queues touches on the simulated sensor. Dev mode only.
    Touch { finger: u32, times: u32 },
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct EnrollRequest {
    pub details: VoterDetails,
    pub stream_prompts: bool,
}

// Response types
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Enrolled(VoterRecord),
    Identified(IdentificationOutcome),
    Confirmed(Confirmation),
    ResetComplete,
    Stats(RegistryStats),
    Touched { pending: usize },
    Error(ErrorResponse),
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Sensor,
    Duplicate,
    Capacity,
    NotFound,
    Unsupported,
    Internal,
}

impl ErrorKind {
    /// Whether the caller can fix this by changing the request.
    pub fn is_client_error(self) -> bool {
        matches!(
            self,
            ErrorKind::Validation | ErrorKind::Duplicate | ErrorKind::NotFound | ErrorKind::Unsupported
        )
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ErrorResponse {
    pub kind: ErrorKind,
    pub message: String,
    /// Raw sensor confirmation code when the failure came from the module.
    pub sensor_code: Option<u8>,
}

impl ErrorResponse {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into(), sensor_code: None }
    }
}

impl From<&EnrollError> for ErrorResponse {
    fn from(err: &EnrollError) -> Self {
        let (kind, sensor_code) = match err {
            EnrollError::Validation(_) | EnrollError::SlotUnavailable(_) => (ErrorKind::Validation, None),
            EnrollError::Sensor(status) | EnrollError::ModelCreation(status) => {
                (ErrorKind::Sensor, Some(status.code()))
            }
            EnrollError::Storage { status, .. } => (ErrorKind::Sensor, Some(status.code())),
            EnrollError::DuplicateBiometric { .. } => (ErrorKind::Duplicate, None),
            EnrollError::RegistryFull { .. } => (ErrorKind::Capacity, None),
        };
        Self { kind, message: err.to_string(), sensor_code }
    }
}

impl From<&ResetError> for ErrorResponse {
    fn from(err: &ResetError) -> Self {
        Self {
            kind: ErrorKind::Sensor,
            message: err.to_string(),
            sensor_code: Some(err.0.code()),
        }
    }
}

// Streaming messages for real-time updates
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum StreamMessage {
    Prompt { message: String },
    Complete,
}

// Message type indicators for stream protocol
pub const MSG_TYPE_RESPONSE: u8 = 0;
pub const MSG_TYPE_STREAM: u8 = 1;

pub const MAX_MESSAGE_LEN: usize = 1024 * 1024;

/// A message read from the service: either a stream update or the final response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Stream(StreamMessage),
    Response(Response),
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    bincode::serialize(value).map_err(|e| VoteError::Protocol(format!("Failed to serialize: {}", e)))
}

fn decode<T: serde::de::DeserializeOwned>(data: &[u8]) -> Result<T> {
    bincode::deserialize(data).map_err(|e| VoteError::Protocol(format!("Failed to deserialize: {}", e)))
}

fn read_len<R: Read>(reader: &mut R) -> Result<usize> {
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf)?;
    let len = u32::from_le_bytes(len_buf) as usize;
    if len > MAX_MESSAGE_LEN {
        return Err(VoteError::Protocol(format!("Message too large: {} bytes", len)));
    }
    Ok(len)
}

pub fn write_request<W: Write>(writer: &mut W, request: &Request) -> Result<()> {
    let data = encode(request)?;
    writer.write_all(&(data.len() as u32).to_le_bytes())?;
    writer.write_all(&data)?;
    writer.flush()?;
    Ok(())
}

pub fn read_request<R: Read>(reader: &mut R) -> Result<Request> {
    let len = read_len(reader)?;
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf)?;
    decode(&buf)
}

fn write_typed<W: Write>(writer: &mut W, msg_type: u8, data: &[u8]) -> Result<()> {
    writer.write_all(&[msg_type])?;
    writer.write_all(&(data.len() as u32).to_le_bytes())?;
    writer.write_all(data)?;
    writer.flush()?;
    Ok(())
}

pub fn write_stream_message<W: Write>(writer: &mut W, msg: &StreamMessage) -> Result<()> {
    write_typed(writer, MSG_TYPE_STREAM, &encode(msg)?)
}

pub fn write_response<W: Write>(writer: &mut W, response: &Response) -> Result<()> {
    write_typed(writer, MSG_TYPE_RESPONSE, &encode(response)?)
}

pub fn read_frame<R: Read>(reader: &mut R) -> Result<Frame> {
    let mut type_buf = [0u8; 1];
    reader.read_exact(&mut type_buf)?;
    let len = read_len(reader)?;
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf)?;

    match type_buf[0] {
        MSG_TYPE_STREAM => Ok(Frame::Stream(decode(&buf)?)),
        MSG_TYPE_RESPONSE => Ok(Frame::Response(decode(&buf)?)),
        other => Err(VoteError::Protocol(format!("Unknown message type: {}", other))),
    }
}
