//! Runs async operation jobs on the host thread.

use std::sync::mpsc::SyncSender;

use tracing::debug;

use crate::dispatch::DispatcherHandle;
use crate::operations::{OperationExecutor, OperationJob, OperationOutcome};

use super::{ENGINE_TARGET, Engine};

impl OperationExecutor for DispatcherHandle<Engine> {
    fn submit(&self, job: OperationJob, reply: SyncSender<OperationOutcome>) -> bool {
        self.enqueue(move |engine: &mut Engine| {
            let id = job.handle.id().to_owned();
            let outcome = engine.run_operation(job);
            if reply.send(outcome).is_err() {
                debug!(target: ENGINE_TARGET, operation = %id, "operation result had no waiter");
            }
        })
    }
}
