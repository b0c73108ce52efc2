//! Error types for the client runtime.

use std::io;
use std::sync::Arc;

use scenebridge_protocol::ClientError;
use thiserror::Error;

#[derive(Debug, Error)]
pub(crate) enum AppError {
    #[error("failed to load configuration: {0}")]
    LoadConfiguration(Arc<ortho_config::OrthoError>),
    #[error("{0}")]
    CliUsage(clap::Error),
    #[error("parameters must be a JSON object: {0}")]
    InvalidParameters(String),
    #[error("parameter '{0}' must be written as KEY=VALUE")]
    InvalidParam(String),
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error("failed to print response: {0}")]
    WriteResponse(io::Error),
}
