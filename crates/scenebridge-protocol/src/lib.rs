//! Wire protocol shared by the scenebridge host and its clients.
//!
//! A request names one command (`"domain.action"`) and carries its
//! parameters; the reply is a tagged success or error document. Messages are
//! delimited either by a little-endian `u32` length prefix or, in document
//! mode, by the boundaries of consecutive JSON documents.

mod client;
mod errors;
mod framing;
mod name;
mod request;
mod response;

pub use client::{Client, ClientOptions};
pub use errors::{ClientError, FrameError, RequestError};
pub use framing::{FrameDecoder, encode_frame, write_frame};
pub use name::{CommandName, DEFAULT_DOMAIN, DOMAIN_SEPARATOR};
pub use request::CommandRequest;
pub use response::CommandResponse;
