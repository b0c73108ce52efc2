//! Shared configuration for the scenebridge host and its clients.
//!
//! Values are layered by `ortho_config`: built-in defaults, then an optional
//! configuration file, then `SCENEBRIDGE_*` environment variables, then
//! command-line flags.

mod defaults;
mod framing;
mod logging;
mod socket;

use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use defaults::{
    DEFAULT_ASYNC_TIMEOUT_SECS, DEFAULT_BATCH_SIZE_LIMIT, DEFAULT_HISTORY_CAPACITY,
    DEFAULT_LOG_FILTER, DEFAULT_MAX_ASYNC_OPERATIONS, DEFAULT_MAX_FRAME_BYTES,
    DEFAULT_OPERATION_RETENTION_SECS, DEFAULT_SHUTDOWN_GRACE_MS, DEFAULT_TCP_HOST,
    DEFAULT_TCP_PORT, DEFAULT_TICK_INTERVAL_MS, default_framing, default_log_filter,
    default_log_filter_string, default_log_format, default_socket_endpoint,
};
pub use framing::{Framing, FramingParseError};
pub use logging::{LogFormat, LogFormatParseError};
pub use socket::{SocketEndpoint, SocketParseError, SocketPreparationError};

/// Resolved settings for the command host and the CLI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "SCENEBRIDGE")]
pub struct Config {
    /// Endpoint the command server listens on and clients connect to.
    #[ortho_config(default = defaults::default_socket_endpoint())]
    #[serde(default = "defaults::default_socket_endpoint")]
    pub daemon_socket: SocketEndpoint,
    /// `tracing` filter directive.
    #[ortho_config(default = defaults::default_log_filter_string())]
    #[serde(default = "defaults::default_log_filter_string")]
    pub log_filter: String,
    /// Telemetry output format.
    #[ortho_config(default = defaults::default_log_format())]
    #[serde(default = "defaults::default_log_format")]
    pub log_format: LogFormat,
    /// Wire framing used by every connection.
    #[ortho_config(default = defaults::default_framing())]
    #[serde(default = "defaults::default_framing")]
    pub framing: Framing,
    /// Largest request frame accepted, in bytes.
    #[ortho_config(default = defaults::DEFAULT_MAX_FRAME_BYTES)]
    #[serde(default = "defaults::default_max_frame_bytes")]
    pub max_frame_bytes: usize,
    /// Entries retained by the history log.
    #[ortho_config(default = defaults::DEFAULT_HISTORY_CAPACITY)]
    #[serde(default = "defaults::default_history_capacity")]
    pub history_capacity: usize,
    /// Maximum number of commands per batch.
    #[ortho_config(default = defaults::DEFAULT_BATCH_SIZE_LIMIT)]
    #[serde(default = "defaults::default_batch_size_limit")]
    pub batch_size_limit: usize,
    /// Maximum number of pending or running asynchronous operations.
    #[ortho_config(default = defaults::DEFAULT_MAX_ASYNC_OPERATIONS)]
    #[serde(default = "defaults::default_max_async_operations")]
    pub max_async_operations: usize,
    /// Seconds before a running asynchronous operation fails with a timeout.
    #[ortho_config(default = defaults::DEFAULT_ASYNC_TIMEOUT_SECS)]
    #[serde(default = "defaults::default_async_timeout_secs")]
    pub async_timeout_secs: u64,
    /// Seconds a finished operation remains queryable.
    #[ortho_config(default = defaults::DEFAULT_OPERATION_RETENTION_SECS)]
    #[serde(default = "defaults::default_operation_retention_secs")]
    pub operation_retention_secs: u64,
    /// Host loop tick interval in milliseconds.
    #[ortho_config(default = defaults::DEFAULT_TICK_INTERVAL_MS)]
    #[serde(default = "defaults::default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// Milliseconds connection threads get to finish during shutdown.
    #[ortho_config(default = defaults::DEFAULT_SHUTDOWN_GRACE_MS)]
    #[serde(default = "defaults::default_shutdown_grace_ms")]
    pub shutdown_grace_ms: u64,
    /// File the history log is written to on shutdown.
    #[serde(default)]
    pub history_file: Option<Utf8PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            daemon_socket: defaults::default_socket_endpoint(),
            log_filter: defaults::default_log_filter_string(),
            log_format: defaults::default_log_format(),
            framing: defaults::default_framing(),
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            batch_size_limit: DEFAULT_BATCH_SIZE_LIMIT,
            max_async_operations: DEFAULT_MAX_ASYNC_OPERATIONS,
            async_timeout_secs: DEFAULT_ASYNC_TIMEOUT_SECS,
            operation_retention_secs: DEFAULT_OPERATION_RETENTION_SECS,
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            shutdown_grace_ms: DEFAULT_SHUTDOWN_GRACE_MS,
            history_file: None,
        }
    }
}

impl Config {
    /// Endpoint the command server listens on.
    #[must_use]
    pub fn daemon_socket(&self) -> &SocketEndpoint {
        &self.daemon_socket
    }

    /// `tracing` filter directive.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Telemetry output format.
    #[must_use]
    pub fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Wire framing.
    #[must_use]
    pub fn framing(&self) -> Framing {
        self.framing
    }

    /// Largest accepted frame in bytes.
    #[must_use]
    pub fn max_frame_bytes(&self) -> usize {
        self.max_frame_bytes
    }

    /// History log capacity.
    #[must_use]
    pub fn history_capacity(&self) -> usize {
        self.history_capacity
    }

    /// Maximum batch length.
    #[must_use]
    pub fn batch_size_limit(&self) -> usize {
        self.batch_size_limit
    }

    /// Maximum number of live asynchronous operations.
    #[must_use]
    pub fn max_async_operations(&self) -> usize {
        self.max_async_operations
    }

    /// Timeout applied to running asynchronous operations.
    #[must_use]
    pub fn async_timeout(&self) -> Duration {
        Duration::from_secs(self.async_timeout_secs)
    }

    /// How long finished operations stay queryable.
    #[must_use]
    pub fn operation_retention(&self) -> Duration {
        Duration::from_secs(self.operation_retention_secs)
    }

    /// Host loop tick interval.
    #[must_use]
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Grace period for connection threads during shutdown.
    #[must_use]
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    /// Destination for the history log written on shutdown.
    #[must_use]
    pub fn history_file(&self) -> Option<&Utf8Path> {
        self.history_file.as_deref()
    }

    /// Rejects limits that would make the host unusable.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        let limits = [
            ("max_frame_bytes", self.max_frame_bytes),
            ("history_capacity", self.history_capacity),
            ("batch_size_limit", self.batch_size_limit),
            ("max_async_operations", self.max_async_operations),
        ];
        if let Some((field, _)) = limits.iter().find(|(_, value)| *value == 0) {
            return Err(ConfigValidationError::ZeroLimit { field: *field });
        }
        if self.tick_interval_ms == 0 {
            return Err(ConfigValidationError::ZeroLimit {
                field: "tick_interval_ms",
            });
        }
        Ok(())
    }
}

/// Errors raised by [`Config::validate`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigValidationError {
    /// A limit that must be positive was zero.
    #[error("configuration value '{field}' must be greater than zero")]
    ZeroLimit {
        /// Name of the offending field.
        field: &'static str,
    },
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.daemon_socket().to_string(), "tcp://127.0.0.1:8080");
        assert_eq!(config.framing(), Framing::LengthPrefixed);
        assert_eq!(config.batch_size_limit(), 50);
        assert_eq!(config.async_timeout(), Duration::from_secs(300));
        assert!(config.history_file().is_none());
        assert_eq!(config.validate(), Ok(()));
    }

    #[rstest]
    #[case::frame(Config { max_frame_bytes: 0, ..Config::default() }, "max_frame_bytes")]
    #[case::batch(Config { batch_size_limit: 0, ..Config::default() }, "batch_size_limit")]
    #[case::tick(Config { tick_interval_ms: 0, ..Config::default() }, "tick_interval_ms")]
    fn rejects_zero_limits(#[case] config: Config, #[case] field: &'static str) {
        assert_eq!(
            config.validate(),
            Err(ConfigValidationError::ZeroLimit { field })
        );
    }
}
