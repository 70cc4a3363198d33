use crate::common::{Result, VoteError};
use crate::core::VoterDetails;
use crate::service::protocol::{
    read_frame, write_request, EnrollRequest, Frame, Request, Response, StreamMessage,
};
use crossterm::{cursor, terminal};
use std::io::{self, Write};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub struct ServiceClient {
    socket_path: PathBuf,
    show_prompts: bool,
}

impl ServiceClient {
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        ServiceClient {
            socket_path: socket_path.into(),
            show_prompts: true,
        }
    }

    /// Suppresses the live prompt line, e.g. for machine-readable output.
    pub fn quiet(mut self) -> Self {
        self.show_prompts = false;
        self
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    pub fn enroll(&self, details: VoterDetails) -> Result<Response> {
        let request = Request::Enroll(EnrollRequest {
            details,
            stream_prompts: self.show_prompts,
        });
        self.call(&request)
    }

    pub fn identify(&self) -> Result<Response> {
        self.call(&Request::Identify)
    }

    pub fn confirm(&self, voter_id: &str) -> Result<Response> {
        self.call(&Request::Confirm { voter_id: voter_id.to_string() })
    }

    pub fn reset(&self) -> Result<Response> {
        self.call(&Request::Reset)
    }

    pub fn stats(&self) -> Result<Response> {
        self.call(&Request::Stats)
    }

    pub fn touch(&self, finger: u32, times: u32) -> Result<Response> {
        self.call(&Request::Touch { finger, times })
    }

    /// Sends a request and reads frames until the final response arrives.
    pub fn call(&self, request: &Request) -> Result<Response> {
        let mut stream = self.connect_with_retry(3)?;
        write_request(&mut stream, request)?;

        let mut prompt_shown = false;
        loop {
            match read_frame(&mut stream)? {
                Frame::Stream(StreamMessage::Prompt { message }) => {
                    if self.show_prompts {
                        // Overwrite the previous prompt in place
                        crossterm::execute!(
                            io::stdout(),
                            cursor::MoveToColumn(0),
                            terminal::Clear(terminal::ClearType::CurrentLine)
                        )
                        .ok();
                        print!("👆 {}", message);
                        io::stdout().flush().ok();
                        prompt_shown = true;
                    }
                }
                Frame::Stream(StreamMessage::Complete) => {
                    if prompt_shown {
                        println!();
                    }
                }
                Frame::Response(response) => return Ok(response),
            }
        }
    }

    fn connect_with_retry(&self, max_retries: u32) -> Result<UnixStream> {
        let mut last_error = None;
        for attempt in 0..max_retries {
            match UnixStream::connect(&self.socket_path) {
                Ok(stream) => {
                    // Enrollment waits on a person, so reads get a generous timeout
                    stream.set_read_timeout(Some(Duration::from_secs(120)))?;
                    stream.set_write_timeout(Some(Duration::from_secs(10)))?;
                    return Ok(stream);
                }
                Err(e) => {
                    tracing::debug!("Failed to connect (attempt {}): {}", attempt + 1, e);
                    last_error = Some(e);
                    if attempt + 1 < max_retries {
                        std::thread::sleep(Duration::from_millis(500));
                    }
                }
            }
        }

        Err(VoteError::Service(format!(
            "Failed to connect to service at {}: {}. Is fingervote-service running?",
            self.socket_path.display(),
            last_error.map_or_else(|| "no attempts made".to_string(), |e| e.to_string())
        )))
    }
}
