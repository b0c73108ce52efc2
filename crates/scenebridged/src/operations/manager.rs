//! Operation table and background execution.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, SyncSender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::thread;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::registry::CommandError;

use super::OPERATIONS_TARGET;
use super::record::{OperationRecord, OperationSnapshot, OperationStatus};

/// Outcome of running an operation's command on the host thread.
pub type OperationOutcome = Result<Value, CommandError>;

/// Runs operation jobs on the host thread.
pub trait OperationExecutor: Send + Sync + 'static {
    /// Queues `job`; its outcome must be sent on `reply`.
    ///
    /// Returns `false` when the job cannot be queued. Dropping `reply`
    /// without sending tells the waiting thread the host went away.
    fn submit(&self, job: OperationJob, reply: SyncSender<OperationOutcome>) -> bool;
}

/// One command execution requested by an operation.
#[derive(Debug)]
pub struct OperationJob {
    /// Cancellation and progress handle for the body.
    pub handle: OperationHandle,
    /// Command to run.
    pub command_type: String,
    /// Parameters for the command.
    pub parameters: Value,
}

/// Bounds applied to async operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperationLimits {
    /// Maximum number of non-terminal operations.
    pub max_live: usize,
    /// Bound on the host-thread round trip.
    pub timeout: Duration,
    /// How long terminal operations stay visible.
    pub retention: Duration,
}

impl Default for OperationLimits {
    fn default() -> Self {
        Self {
            max_live: scenebridge_config::DEFAULT_MAX_ASYNC_OPERATIONS,
            timeout: Duration::from_secs(scenebridge_config::DEFAULT_ASYNC_TIMEOUT_SECS),
            retention: Duration::from_secs(scenebridge_config::DEFAULT_OPERATION_RETENTION_SECS),
        }
    }
}

struct Inner {
    table: Mutex<HashMap<String, OperationRecord>>,
    executor: Arc<dyn OperationExecutor>,
    limits: OperationLimits,
}

impl Inner {
    fn table(&self) -> MutexGuard<'_, HashMap<String, OperationRecord>> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Moves a pending operation to running; `None` if it was cancelled first.
    fn start(&self, id: &str) -> Option<Arc<AtomicBool>> {
        let mut table = self.table();
        let record = table.get_mut(id)?;
        if record.status != OperationStatus::Pending {
            return None;
        }
        record.start();
        Some(Arc::clone(&record.cancel))
    }

    /// Applies an outcome unless the operation already reached a final state.
    fn finish(&self, id: &str, outcome: OperationOutcome) {
        let mut table = self.table();
        let Some(record) = table.get_mut(id) else {
            return;
        };
        if record.status != OperationStatus::Running {
            debug!(
                target: OPERATIONS_TARGET,
                operation_id = id,
                status = %record.status,
                "discarding outcome of finished operation"
            );
            return;
        }
        match outcome {
            Ok(result) => {
                record.progress = 1.0;
                record.result = Some(result);
                record.finish(OperationStatus::Completed);
            }
            Err(CommandError::Cancelled) => record.finish(OperationStatus::Cancelled),
            Err(error) => {
                record.error = Some(error.to_string());
                record.finish(OperationStatus::Failed);
            }
        }
        info!(
            target: OPERATIONS_TARGET,
            operation_id = id,
            status = %record.status,
            "operation finished"
        );
    }
}

/// Handle given to the command body of an operation.
#[derive(Debug, Clone)]
pub struct OperationHandle {
    id: String,
    cancel: Arc<AtomicBool>,
    manager: Weak<Inner>,
}

impl std::fmt::Debug for Inner {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("OperationTable")
            .field("limits", &self.limits)
            .finish_non_exhaustive()
    }
}

impl OperationHandle {
    /// Operation id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Whether cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    /// Records progress, clamped to `0.0..=1.0`, while the operation runs.
    pub fn report_progress(&self, progress: f64) {
        let Some(inner) = self.manager.upgrade() else {
            return;
        };
        let mut table = inner.table();
        if let Some(record) = table.get_mut(&self.id)
            && record.status == OperationStatus::Running
            && progress.is_finite()
        {
            record.progress = progress.clamp(0.0, 1.0);
        }
    }
}

/// Thread-safe table of async operations.
///
/// Cloning shares the same table. Each registered operation gets a
/// background thread that submits its command to the host thread through
/// the [`OperationExecutor`] and waits, bounded by the configured timeout.
#[derive(Debug, Clone)]
pub struct OperationManager {
    inner: Arc<Inner>,
}

impl OperationManager {
    /// Creates an empty table executing jobs through `executor`.
    pub fn new(executor: Arc<dyn OperationExecutor>, limits: OperationLimits) -> Self {
        Self {
            inner: Arc::new(Inner {
                table: Mutex::new(HashMap::new()),
                executor,
                limits,
            }),
        }
    }

    /// Configured limits.
    #[must_use]
    pub fn limits(&self) -> OperationLimits {
        self.inner.limits
    }

    /// Registers an operation and starts it in the background.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::LimitExceeded`] when too many operations are
    /// live, or a handler error if no thread could be started.
    pub fn register(
        &self,
        command_type: impl Into<String>,
        parameters: Value,
    ) -> Result<String, CommandError> {
        let command_type = command_type.into();
        let id = Uuid::new_v4().to_string();
        {
            let mut table = self.inner.table();
            let live = table
                .values()
                .filter(|record| !record.status.is_terminal())
                .count();
            if live >= self.inner.limits.max_live {
                return Err(CommandError::limit_exceeded(
                    "async operation",
                    self.inner.limits.max_live,
                ));
            }
            table.insert(
                id.clone(),
                OperationRecord::pending(id.clone(), command_type.clone(), parameters.clone()),
            );
        }

        let inner = Arc::clone(&self.inner);
        let thread_id = id.clone();
        let spawned = thread::Builder::new()
            .name(format!("operation-{}", short_id(&id)))
            .spawn(move || run_operation(&inner, &thread_id, command_type, parameters));
        if let Err(error) = spawned {
            self.inner.table().remove(&id);
            return Err(CommandError::handler(format!(
                "failed to start operation thread: {error}"
            )));
        }

        debug!(target: OPERATIONS_TARGET, operation_id = %id, "operation registered");
        Ok(id)
    }

    /// Current state of an operation.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::OperationNotFound`] for unknown ids.
    pub fn status(&self, id: &str) -> Result<OperationSnapshot, CommandError> {
        self.inner
            .table()
            .get(id)
            .map(OperationRecord::snapshot)
            .ok_or_else(|| CommandError::operation_not_found(id))
    }

    /// Requests cancellation.
    ///
    /// Pending and running operations are marked cancelled at once and their
    /// flag is raised for the body's checkpoints. Returns `false` for
    /// operations already in a final state.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::OperationNotFound`] for unknown ids.
    pub fn cancel(&self, id: &str) -> Result<bool, CommandError> {
        let mut table = self.inner.table();
        let record = table
            .get_mut(id)
            .ok_or_else(|| CommandError::operation_not_found(id))?;
        if record.status.is_terminal() {
            return Ok(false);
        }
        record.cancel.store(true, Ordering::SeqCst);
        record.finish(OperationStatus::Cancelled);
        info!(target: OPERATIONS_TARGET, operation_id = id, "operation cancelled");
        Ok(true)
    }

    /// Operations in registration order, optionally filtered by status.
    #[must_use]
    pub fn list(&self, status: Option<OperationStatus>) -> Vec<OperationSnapshot> {
        let table = self.inner.table();
        let mut records: Vec<&OperationRecord> = table
            .values()
            .filter(|record| status.is_none_or(|status| record.status == status))
            .collect();
        records.sort_by_key(|record| record.created);
        records.into_iter().map(OperationRecord::snapshot).collect()
    }

    /// Number of non-terminal operations.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.inner
            .table()
            .values()
            .filter(|record| !record.status.is_terminal())
            .count()
    }

    /// Removes terminal operations older than the retention window.
    pub fn sweep(&self) -> usize {
        let retention = self.inner.limits.retention;
        let mut table = self.inner.table();
        let before = table.len();
        table.retain(|_, record| {
            record
                .completed
                .is_none_or(|completed| completed.elapsed() < retention)
        });
        let removed = before - table.len();
        if removed > 0 {
            debug!(target: OPERATIONS_TARGET, removed, "swept expired operations");
        }
        removed
    }
}

fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

fn run_operation(inner: &Arc<Inner>, id: &str, command_type: String, parameters: Value) {
    let Some(cancel) = inner.start(id) else {
        return;
    };
    let job = OperationJob {
        handle: OperationHandle {
            id: id.to_owned(),
            cancel: Arc::clone(&cancel),
            manager: Arc::downgrade(inner),
        },
        command_type,
        parameters,
    };
    let (reply, outcome) = mpsc::sync_channel(1);
    if !inner.executor.submit(job, reply) {
        inner.finish(
            id,
            Err(CommandError::handler("host dispatcher is not accepting work")),
        );
        return;
    }

    let timeout = inner.limits.timeout;
    let outcome = match outcome.recv_timeout(timeout) {
        Ok(outcome) => outcome,
        Err(RecvTimeoutError::Timeout) => {
            cancel.store(true, Ordering::SeqCst);
            warn!(
                target: OPERATIONS_TARGET,
                operation_id = id,
                timeout_secs = timeout.as_secs(),
                "operation timed out"
            );
            Err(CommandError::Timeout { timeout })
        }
        Err(RecvTimeoutError::Disconnected) => Err(CommandError::handler(
            "host dispatcher stopped before the operation ran",
        )),
    };
    inner.finish(id, outcome);
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Instant;

    use serde_json::json;

    use super::*;

    /// Runs jobs on a thread after an optional gate opens.
    struct ThreadExecutor {
        delay: Duration,
        gate: Option<Arc<AtomicBool>>,
    }

    impl OperationExecutor for ThreadExecutor {
        fn submit(&self, job: OperationJob, reply: SyncSender<OperationOutcome>) -> bool {
            let delay = self.delay;
            let gate = self.gate.clone();
            thread::spawn(move || {
                while gate
                    .as_ref()
                    .is_some_and(|gate| !gate.load(Ordering::SeqCst))
                {
                    thread::sleep(Duration::from_millis(5));
                }
                thread::sleep(delay);
                let outcome = if job.handle.is_cancelled() {
                    Err(CommandError::Cancelled)
                } else {
                    job.handle.report_progress(0.5);
                    Ok(json!({"ran": job.command_type}))
                };
                let _ = reply.send(outcome);
            });
            true
        }
    }

    /// Never replies; keeps the sender alive so only the timeout fires.
    #[derive(Default)]
    struct SilentExecutor {
        held: Mutex<Vec<SyncSender<OperationOutcome>>>,
    }

    impl OperationExecutor for SilentExecutor {
        fn submit(&self, _job: OperationJob, reply: SyncSender<OperationOutcome>) -> bool {
            self.held
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(reply);
            true
        }
    }

    struct RejectingExecutor;

    impl OperationExecutor for RejectingExecutor {
        fn submit(&self, _job: OperationJob, _reply: SyncSender<OperationOutcome>) -> bool {
            false
        }
    }

    fn manager(executor: impl OperationExecutor, limits: OperationLimits) -> OperationManager {
        OperationManager::new(Arc::new(executor), limits)
    }

    fn wait_for_terminal(manager: &OperationManager, id: &str) -> OperationSnapshot {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            let snapshot = manager.status(id).expect("status");
            if snapshot.status.is_terminal() || Instant::now() > deadline {
                return snapshot;
            }
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn completes_with_result_and_full_progress() {
        let manager = manager(
            ThreadExecutor {
                delay: Duration::from_millis(10),
                gate: None,
            },
            OperationLimits::default(),
        );
        let id = manager.register("slow.op", json!({})).expect("register");
        let initial = manager.status(&id).expect("status").status;
        assert!(matches!(
            initial,
            OperationStatus::Pending | OperationStatus::Running
        ));

        let snapshot = wait_for_terminal(&manager, &id);
        assert_eq!(snapshot.status, OperationStatus::Completed);
        assert_eq!(snapshot.result, Some(json!({"ran": "slow.op"})));
        assert!((snapshot.progress - 1.0).abs() < f64::EPSILON);
        assert!(snapshot.completed_at.is_some());
    }

    #[test]
    fn cancelled_operations_never_complete() {
        let gate = Arc::new(AtomicBool::new(false));
        let manager = manager(
            ThreadExecutor {
                delay: Duration::ZERO,
                gate: Some(Arc::clone(&gate)),
            },
            OperationLimits::default(),
        );
        let id = manager.register("slow.op", json!({})).expect("register");
        assert!(manager.cancel(&id).expect("cancel"));
        gate.store(true, Ordering::SeqCst);

        thread::sleep(Duration::from_millis(100));
        let snapshot = manager.status(&id).expect("status");
        assert_eq!(snapshot.status, OperationStatus::Cancelled);
        assert!(snapshot.completed_at.is_some());
        assert!(!manager.cancel(&id).expect("second cancel"));
    }

    #[test]
    fn times_out_instead_of_hanging() {
        let manager = manager(
            SilentExecutor::default(),
            OperationLimits {
                timeout: Duration::from_millis(50),
                ..OperationLimits::default()
            },
        );
        let id = manager.register("slow.op", json!({})).expect("register");
        let snapshot = wait_for_terminal(&manager, &id);
        assert_eq!(snapshot.status, OperationStatus::Failed);
        assert_eq!(
            snapshot.error.as_deref(),
            Some("operation timed out after 0 seconds")
        );
    }

    #[test]
    fn rejected_jobs_fail() {
        let manager = manager(RejectingExecutor, OperationLimits::default());
        let id = manager.register("slow.op", json!({})).expect("register");
        let snapshot = wait_for_terminal(&manager, &id);
        assert_eq!(snapshot.status, OperationStatus::Failed);
    }

    #[test]
    fn enforces_the_live_operation_limit() {
        let manager = manager(
            SilentExecutor::default(),
            OperationLimits {
                max_live: 1,
                ..OperationLimits::default()
            },
        );
        manager.register("slow.op", json!({})).expect("first");
        let error = manager.register("slow.op", json!({})).expect_err("second");
        assert_eq!(error, CommandError::limit_exceeded("async operation", 1));
        assert_eq!(manager.live_count(), 1);
    }

    #[test]
    fn unknown_ids_are_reported() {
        let manager = manager(RejectingExecutor, OperationLimits::default());
        assert!(matches!(
            manager.status("missing"),
            Err(CommandError::OperationNotFound { .. })
        ));
        assert!(manager.cancel("missing").is_err());
    }

    #[test]
    fn lists_by_status_and_sweeps_expired() {
        let manager = manager(
            SilentExecutor::default(),
            OperationLimits {
                retention: Duration::ZERO,
                ..OperationLimits::default()
            },
        );
        let first = manager.register("a.One", json!({})).expect("first");
        let second = manager.register("b.Two", json!({})).expect("second");
        manager.cancel(&first).expect("cancel");

        let cancelled = manager.list(Some(OperationStatus::Cancelled));
        assert_eq!(cancelled.len(), 1);
        assert_eq!(cancelled.first().map(|op| op.id.as_str()), Some(first.as_str()));
        assert_eq!(manager.list(None).len(), 2);

        assert_eq!(manager.sweep(), 1);
        assert!(manager.status(&first).is_err());
        assert!(manager.status(&second).is_ok());
    }
}
