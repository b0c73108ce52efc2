//! Asynchronous operations: commands run outside the request cycle.
//!
//! An operation is registered `Pending`, started `Running` on its own
//! background thread, and ends `Completed`, `Failed` or `Cancelled`. The
//! background thread never touches host state; it hands the command to the
//! host thread through an [`OperationExecutor`] and waits for the outcome,
//! bounded by a timeout. Cancellation is cooperative: a flag the command
//! body polls at its checkpoints.

mod commands;
mod manager;
mod record;

pub use self::commands::{ASYNC_DOMAIN, async_actions};
pub use self::manager::{
    OperationExecutor, OperationHandle, OperationJob, OperationLimits, OperationManager,
    OperationOutcome,
};
pub use self::record::{OperationSnapshot, OperationStatus};

/// Tracing target for operation lifecycle events.
pub(crate) const OPERATIONS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::operations");
