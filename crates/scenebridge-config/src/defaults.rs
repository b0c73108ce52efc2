//! Built-in values used when no file, environment, or flag overrides apply.

use crate::framing::Framing;
use crate::logging::LogFormat;
use crate::socket::SocketEndpoint;

/// Loopback address the command server binds by default.
pub const DEFAULT_TCP_HOST: &str = "127.0.0.1";

/// Port the command server binds by default.
pub const DEFAULT_TCP_PORT: u16 = 8080;

/// Default log filter expression.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Largest accepted request frame (1 MiB).
pub const DEFAULT_MAX_FRAME_BYTES: usize = 1024 * 1024;

/// Entries retained by the history log.
pub const DEFAULT_HISTORY_CAPACITY: usize = 100;

/// Maximum number of commands in one batch.
pub const DEFAULT_BATCH_SIZE_LIMIT: usize = 50;

/// Maximum number of live asynchronous operations.
pub const DEFAULT_MAX_ASYNC_OPERATIONS: usize = 100;

/// Seconds an asynchronous operation may run before it fails.
pub const DEFAULT_ASYNC_TIMEOUT_SECS: u64 = 300;

/// Seconds a finished operation stays queryable.
pub const DEFAULT_OPERATION_RETENTION_SECS: u64 = 600;

/// Host loop tick interval in milliseconds.
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 16;

/// Milliseconds granted to connection threads during shutdown.
pub const DEFAULT_SHUTDOWN_GRACE_MS: u64 = 2000;

/// Default log filter expression.
#[must_use]
pub fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value for serde defaults.
#[must_use]
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format.
#[must_use]
pub fn default_log_format() -> LogFormat {
    LogFormat::Json
}

/// Default wire framing.
#[must_use]
pub fn default_framing() -> Framing {
    Framing::LengthPrefixed
}

/// Endpoint the command server listens on by default.
#[must_use]
pub fn default_socket_endpoint() -> SocketEndpoint {
    SocketEndpoint::tcp(DEFAULT_TCP_HOST, DEFAULT_TCP_PORT)
}

pub(crate) fn default_max_frame_bytes() -> usize {
    DEFAULT_MAX_FRAME_BYTES
}

pub(crate) fn default_history_capacity() -> usize {
    DEFAULT_HISTORY_CAPACITY
}

pub(crate) fn default_batch_size_limit() -> usize {
    DEFAULT_BATCH_SIZE_LIMIT
}

pub(crate) fn default_max_async_operations() -> usize {
    DEFAULT_MAX_ASYNC_OPERATIONS
}

pub(crate) fn default_async_timeout_secs() -> u64 {
    DEFAULT_ASYNC_TIMEOUT_SECS
}

pub(crate) fn default_operation_retention_secs() -> u64 {
    DEFAULT_OPERATION_RETENTION_SECS
}

pub(crate) fn default_tick_interval_ms() -> u64 {
    DEFAULT_TICK_INTERVAL_MS
}

pub(crate) fn default_shutdown_grace_ms() -> u64 {
    DEFAULT_SHUTDOWN_GRACE_MS
}
