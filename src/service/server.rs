use std::io::{Read, Write};

use crate::common::Result;
use crate::core::{ConfirmError, EnrollPrompt, VotingStation};
use crate::sensor::SensorDevice;
use crate::service::protocol::{
    read_request, write_response, write_stream_message, EnrollRequest, ErrorKind, ErrorResponse,
    Request, Response, StreamMessage,
};

pub const MAX_TOUCHES_PER_REQUEST: u32 = 16;

/// Runs one request against the station and builds the response.
pub fn dispatch(
    station: &mut VotingStation<SensorDevice>,
    request: Request,
    dev_mode: bool,
    emit: &mut dyn FnMut(StreamMessage),
) -> Response {
    match request {
        Request::Enroll(EnrollRequest { details, .. }) => {
            tracing::info!("Processing enrollment request for voter: {}", details.voter_id);
            let mut prompt = |p: EnrollPrompt| emit(StreamMessage::Prompt { message: p.to_string() });
            match station.enroll(details, &mut prompt) {
                Ok(record) => Response::Enrolled(record),
                Err(e) => {
                    tracing::error!("Enrollment failed: {}", e);
                    Response::Error(ErrorResponse::from(&e))
                }
            }
        }
        Request::Identify => {
            tracing::info!("Processing identify request");
            Response::Identified(station.identify())
        }
        Request::Confirm { voter_id } => {
            tracing::info!("Processing confirm request for voter: {}", voter_id);
            match station.confirm(&voter_id) {
                Ok(confirmation) => Response::Confirmed(confirmation),
                Err(e @ ConfirmError::NotFound(_)) => {
                    Response::Error(ErrorResponse::new(ErrorKind::NotFound, e.to_string()))
                }
            }
        }
        Request::Reset => {
            tracing::info!("Processing reset request");
            match station.reset() {
                Ok(()) => Response::ResetComplete,
                Err(e) => Response::Error(ErrorResponse::from(&e)),
            }
        }
        Request::Stats => Response::Stats(station.stats()),
        Request::Touch { times, .. } if times > MAX_TOUCHES_PER_REQUEST => {
            Response::Error(ErrorResponse::new(
                ErrorKind::Validation,
                format!("At most {} touches can be queued at once", MAX_TOUCHES_PER_REQUEST),
            ))
        }
        Request::Touch { finger, times } => {
            let simulated = if dev_mode { station.sensor_mut().as_simulated_mut() } else { None };
            match simulated {
                Some(sensor) => {
                    for _ in 0..times {
                        sensor.place(finger);
                    }
                    tracing::debug!("Queued {} touch(es) of finger {}", times, finger);
                    Response::Touched { pending: sensor.pending_touches() }
                }
                None => Response::Error(ErrorResponse::new(
                    ErrorKind::Unsupported,
                    "Simulated touches are only available in development mode",
                )),
            }
        }
    }
}

/// Reads one request from the stream, runs it and writes the reply.
/// Enrollment prompts are streamed ahead of the final response when asked for.
pub fn handle_connection<T: Read + Write>(
    stream: &mut T,
    station: &mut VotingStation<SensorDevice>,
    dev_mode: bool,
) -> Result<()> {
    let request = read_request(stream)?;
    let streaming = matches!(&request, Request::Enroll(req) if req.stream_prompts);

    let mut stream_error = None;
    let response = dispatch(station, request, dev_mode, &mut |msg| {
        if !streaming || stream_error.is_some() {
            return;
        }
        if let Err(e) = write_stream_message(stream, &msg) {
            tracing::warn!("Client stopped receiving prompts: {}", e);
            stream_error = Some(e);
        }
    });

    if let Some(e) = stream_error {
        return Err(e);
    }
    if streaming {
        write_stream_message(stream, &StreamMessage::Complete)?;
    }
    write_response(stream, &response)
}
