//! Errors surfaced while launching or running the host process.

use std::io;

use camino::Utf8PathBuf;
use thiserror::Error;

use crate::bootstrap::BootstrapError;
use crate::registry::RegistrationError;
use crate::transport::TransportError;

use super::shutdown::ShutdownError;

/// Errors surfaced while launching or running the host.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// Bootstrapping the host failed.
    #[error("host bootstrap failed: {source}")]
    Bootstrap {
        /// Underlying bootstrap error.
        #[source]
        source: BootstrapError,
    },
    /// Installing the shutdown signal handlers failed.
    #[error("failed to await shutdown signal: {source}")]
    Shutdown {
        /// Underlying shutdown error.
        #[source]
        source: ShutdownError,
    },
    /// A command domain could not be registered.
    #[error("failed to register command domains: {source}")]
    Registration {
        /// Underlying registration error.
        #[source]
        source: RegistrationError,
    },
    /// Starting or stopping the transport failed.
    #[error("transport failed: {source}")]
    Transport {
        /// Underlying transport error.
        #[source]
        source: TransportError,
    },
    /// Writing the history file on shutdown failed.
    #[error("failed to flush history to '{path}': {source}")]
    HistoryFlush {
        /// Destination file.
        path: Utf8PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

impl From<BootstrapError> for LaunchError {
    fn from(source: BootstrapError) -> Self {
        Self::Bootstrap { source }
    }
}

impl From<ShutdownError> for LaunchError {
    fn from(source: ShutdownError) -> Self {
        Self::Shutdown { source }
    }
}

impl From<RegistrationError> for LaunchError {
    fn from(source: RegistrationError) -> Self {
        Self::Registration { source }
    }
}

impl From<TransportError> for LaunchError {
    fn from(source: TransportError) -> Self {
        Self::Transport { source }
    }
}
