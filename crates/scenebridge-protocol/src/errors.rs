//! Error types for request parsing, framing and the blocking client.

use std::io;

use thiserror::Error;

/// Errors raised while interpreting a request document.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RequestError {
    /// The document is not a valid request envelope.
    #[error("malformed request: {message}")]
    Malformed {
        /// Human-readable description of the problem.
        message: String,
    },
    /// The command type violates the `domain.action` shape.
    #[error("malformed command type '{command_type}': {reason}")]
    InvalidName {
        /// The offending command type.
        command_type: String,
        /// Why the name was rejected.
        reason: &'static str,
    },
    /// The parameters could not be read as a key-value document.
    #[error("malformed parameters: {message}")]
    InvalidParameters {
        /// Human-readable description of the problem.
        message: String,
    },
}

impl RequestError {
    /// Creates a malformed envelope error.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed {
            message: message.into(),
        }
    }

    /// Creates an invalid name error.
    pub fn invalid_name(command_type: impl Into<String>, reason: &'static str) -> Self {
        Self::InvalidName {
            command_type: command_type.into(),
            reason,
        }
    }

    /// Creates an invalid parameters error.
    pub fn invalid_parameters(message: impl Into<String>) -> Self {
        Self::InvalidParameters {
            message: message.into(),
        }
    }
}

/// Errors raised while splitting a byte stream into frames.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// A frame announced or accumulated more bytes than allowed.
    #[error("frame too large: {size} bytes exceeds {max_size} byte limit")]
    TooLarge {
        /// Size announced by the prefix or buffered so far.
        size: usize,
        /// Configured maximum.
        max_size: usize,
    },
    /// Buffered bytes can never become a JSON document.
    #[error("invalid JSON document: {message}")]
    InvalidDocument {
        /// Parser diagnostic.
        message: String,
    },
}

/// Errors surfaced by [`crate::Client`].
#[derive(Debug, Error)]
pub enum ClientError {
    /// Resolving the TCP address failed.
    #[error("failed to resolve host address {endpoint}: {source}")]
    Resolve {
        /// Endpoint being resolved.
        endpoint: String,
        #[source]
        source: io::Error,
    },
    /// Connecting to the host failed.
    #[error("failed to connect to host at {endpoint}: {source}")]
    Connect {
        /// Endpoint being connected to.
        endpoint: String,
        #[source]
        source: io::Error,
    },
    /// Unix sockets are not available on this platform.
    #[cfg(not(unix))]
    #[error("platform does not support Unix sockets: {0}")]
    UnsupportedUnixTransport(String),
    /// Serialising the request failed.
    #[error("failed to serialise command request: {0}")]
    Serialise(#[source] serde_json::Error),
    /// Writing the request failed.
    #[error("failed to send request to host: {0}")]
    Send(#[source] io::Error),
    /// Reading the response failed.
    #[error("failed to read response from host: {0}")]
    Receive(#[source] io::Error),
    /// The host closed the connection before replying.
    #[error("host closed the connection before responding")]
    Closed,
    /// The response frame was invalid.
    #[error("invalid response frame: {0}")]
    Frame(#[from] FrameError),
    /// The response document was not a valid response.
    #[error("failed to parse host response: {0}")]
    Parse(#[source] serde_json::Error),
    /// Reconnection gave up.
    #[error("maximum reconnection attempts reached ({attempts})")]
    ReconnectExhausted {
        /// Attempts made before giving up.
        attempts: u32,
    },
}

impl ClientError {
    /// Whether the connection can no longer pair requests with responses.
    ///
    /// After a failed write or read, or a bad frame, a late or partial
    /// response may still arrive on the stream, so it must be discarded.
    #[must_use]
    pub fn poisons_connection(&self) -> bool {
        matches!(
            self,
            Self::Closed | Self::Send(_) | Self::Receive(_) | Self::Frame(_)
        )
    }

    /// Whether the error indicates a dropped connection worth reconnecting.
    #[must_use]
    pub fn is_connection_lost(&self) -> bool {
        match self {
            Self::Closed => true,
            Self::Send(source) | Self::Receive(source) => matches!(
                source.kind(),
                io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::BrokenPipe
                    | io::ErrorKind::UnexpectedEof
                    | io::ErrorKind::NotConnected
            ),
            _ => false,
        }
    }
}
