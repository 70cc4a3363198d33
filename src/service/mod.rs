pub mod client;
pub mod protocol;
pub mod server;

pub use client::ServiceClient;
pub use protocol::{ErrorKind, ErrorResponse, Request, Response, StreamMessage};
pub use server::{dispatch, handle_connection};
