//! Operation records and their serialisable snapshots.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display, EnumString};

use crate::history::now_rfc3339;

/// Lifecycle state of an async operation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[strum(ascii_case_insensitive)]
pub enum OperationStatus {
    /// Registered, not yet started.
    Pending,
    /// Waiting on, or running on, the host thread.
    Running,
    /// Finished with a result.
    Completed,
    /// Finished with an error or timed out.
    Failed,
    /// Cancelled before finishing.
    Cancelled,
}

impl OperationStatus {
    /// Whether the status is final.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

#[derive(Debug)]
pub(super) struct OperationRecord {
    pub(super) id: String,
    pub(super) command_type: String,
    pub(super) parameters: Value,
    pub(super) status: OperationStatus,
    pub(super) created: Instant,
    pub(super) created_at: String,
    pub(super) started_at: Option<String>,
    pub(super) completed: Option<Instant>,
    pub(super) completed_at: Option<String>,
    pub(super) progress: f64,
    pub(super) result: Option<Value>,
    pub(super) error: Option<String>,
    pub(super) cancel: Arc<AtomicBool>,
}

impl OperationRecord {
    pub(super) fn pending(id: String, command_type: String, parameters: Value) -> Self {
        Self {
            id,
            command_type,
            parameters,
            status: OperationStatus::Pending,
            created: Instant::now(),
            created_at: now_rfc3339(),
            started_at: None,
            completed: None,
            completed_at: None,
            progress: 0.0,
            result: None,
            error: None,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    pub(super) fn start(&mut self) {
        self.status = OperationStatus::Running;
        self.started_at = Some(now_rfc3339());
        self.progress = 0.0;
    }

    pub(super) fn finish(&mut self, status: OperationStatus) {
        self.status = status;
        self.completed = Some(Instant::now());
        self.completed_at = Some(now_rfc3339());
    }

    pub(super) fn snapshot(&self) -> OperationSnapshot {
        OperationSnapshot {
            id: self.id.clone(),
            command_type: self.command_type.clone(),
            parameters: self.parameters.clone(),
            status: self.status,
            created_at: self.created_at.clone(),
            started_at: self.started_at.clone(),
            completed_at: self.completed_at.clone(),
            progress: self.progress,
            result: self.result.clone(),
            error: self.error.clone(),
            elapsed_secs: self
                .completed
                .unwrap_or_else(Instant::now)
                .saturating_duration_since(self.created)
                .as_secs_f64(),
        }
    }
}

/// Point-in-time view of an operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationSnapshot {
    /// Opaque operation id.
    pub id: String,
    /// Command the operation runs.
    pub command_type: String,
    /// Parameters passed to the command.
    pub parameters: Value,
    /// Lifecycle state.
    pub status: OperationStatus,
    /// RFC 3339 registration time.
    pub created_at: String,
    /// RFC 3339 start time.
    pub started_at: Option<String>,
    /// RFC 3339 time the operation reached a final state.
    pub completed_at: Option<String>,
    /// Progress in `0.0..=1.0`.
    pub progress: f64,
    /// Result of a completed operation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error message of a failed operation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Seconds since registration, frozen once final.
    pub elapsed_secs: f64,
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case::pending(OperationStatus::Pending, false)]
    #[case::running(OperationStatus::Running, false)]
    #[case::completed(OperationStatus::Completed, true)]
    #[case::failed(OperationStatus::Failed, true)]
    #[case::cancelled(OperationStatus::Cancelled, true)]
    fn terminal_states(#[case] status: OperationStatus, #[case] terminal: bool) {
        assert_eq!(status.is_terminal(), terminal);
    }

    #[test]
    fn statuses_parse_ignoring_case() {
        assert_eq!(
            "running".parse::<OperationStatus>().expect("status"),
            OperationStatus::Running
        );
        assert_eq!(OperationStatus::Cancelled.to_string(), "Cancelled");
    }

    #[test]
    fn finishing_stamps_completion() {
        let mut record =
            OperationRecord::pending("op".to_owned(), "tasks.Sleep".to_owned(), Value::Null);
        record.start();
        record.finish(OperationStatus::Completed);
        let snapshot = record.snapshot();
        assert!(snapshot.started_at.is_some());
        assert!(snapshot.completed_at.is_some());
        assert_eq!(snapshot.status, OperationStatus::Completed);
    }
}
