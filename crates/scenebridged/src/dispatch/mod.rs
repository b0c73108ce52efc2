//! Hand-off queue between I/O threads and the host thread.
//!
//! Any thread may [`DispatcherHandle::enqueue`] a work item; only the thread
//! that owns the host state calls [`HostDispatcher::drain_once`], once per
//! tick. A drain runs the items queued when it started and nothing more, so
//! work enqueued during a drain waits for the next tick.

use std::collections::VecDeque;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{error, warn};

use crate::registry::panic_message;

/// Tracing target for dispatcher activity.
pub(crate) const DISPATCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::dispatch");

/// Work executed against the host state.
pub type WorkItem<S> = Box<dyn FnOnce(&mut S) + Send>;

struct Queue<S> {
    items: VecDeque<WorkItem<S>>,
    closed: bool,
}

struct Shared<S> {
    queue: Mutex<Queue<S>>,
}

impl<S> Shared<S> {
    fn lock(&self) -> MutexGuard<'_, Queue<S>> {
        // Items run outside the lock, so a poisoned queue is still consistent.
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Owner side of the queue, held by the host loop.
pub struct HostDispatcher<S> {
    shared: Arc<Shared<S>>,
}

/// Cloneable sender side of the queue.
pub struct DispatcherHandle<S> {
    shared: Arc<Shared<S>>,
}

impl<S> Clone for DispatcherHandle<S> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<S> fmt::Debug for DispatcherHandle<S> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_struct("DispatcherHandle").finish_non_exhaustive()
    }
}

impl<S> fmt::Debug for HostDispatcher<S> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("HostDispatcher")
            .field("pending", &self.pending())
            .finish()
    }
}

impl<S> Default for HostDispatcher<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> HostDispatcher<S> {
    /// Creates an empty, open queue.
    #[must_use]
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                queue: Mutex::new(Queue {
                    items: VecDeque::new(),
                    closed: false,
                }),
            }),
        }
    }

    /// Returns a handle other threads use to enqueue work.
    #[must_use]
    pub fn handle(&self) -> DispatcherHandle<S> {
        DispatcherHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Number of queued items.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.shared.lock().items.len()
    }

    /// Runs every item queued before the call; returns how many ran.
    ///
    /// A panicking item is logged and skipped.
    pub fn drain_once(&self, state: &mut S) -> usize {
        let batch = std::mem::take(&mut self.shared.lock().items);
        let count = batch.len();
        for item in batch {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| item(state))) {
                error!(
                    target: DISPATCH_TARGET,
                    panic = %panic_message(payload.as_ref()),
                    "work item panicked"
                );
            }
        }
        count
    }

    /// Stops accepting work and drops anything still queued.
    ///
    /// Dropping an item drops whatever reply channel it captured, which wakes
    /// the thread waiting on it.
    pub fn close(&self) -> usize {
        let dropped = {
            let mut queue = self.shared.lock();
            queue.closed = true;
            std::mem::take(&mut queue.items)
        };
        if !dropped.is_empty() {
            warn!(
                target: DISPATCH_TARGET,
                dropped = dropped.len(),
                "discarded queued work at shutdown"
            );
        }
        dropped.len()
    }
}

impl<S> DispatcherHandle<S> {
    /// Queues `item` for the next drain.
    ///
    /// Returns `false`, dropping the item, once the dispatcher is closed.
    pub fn enqueue<F>(&self, item: F) -> bool
    where
        F: FnOnce(&mut S) + Send + 'static,
    {
        let mut queue = self.shared.lock();
        if queue.closed {
            return false;
        }
        queue.items.push_back(Box::new(item));
        true
    }

    /// Whether the dispatcher still accepts work.
    #[must_use]
    pub fn is_open(&self) -> bool {
        !self.shared.lock().closed
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;
    use std::thread;

    use super::*;

    #[test]
    fn runs_items_in_enqueue_order() {
        let dispatcher = HostDispatcher::<Vec<u32>>::new();
        let handle = dispatcher.handle();
        for value in 1..=3 {
            assert!(handle.enqueue(move |log: &mut Vec<u32>| log.push(value)));
        }
        let mut log = Vec::new();
        assert_eq!(dispatcher.drain_once(&mut log), 3);
        assert_eq!(log, [1, 2, 3]);
    }

    #[test]
    fn items_enqueued_during_a_drain_wait_for_the_next_tick() {
        let dispatcher = HostDispatcher::<Vec<&'static str>>::new();
        let handle = dispatcher.handle();
        let inner = dispatcher.handle();
        handle.enqueue(move |log: &mut Vec<&'static str>| {
            log.push("outer");
            inner.enqueue(|log: &mut Vec<&'static str>| log.push("inner"));
        });

        let mut log = Vec::new();
        assert_eq!(dispatcher.drain_once(&mut log), 1);
        assert_eq!(log, ["outer"]);
        assert_eq!(dispatcher.drain_once(&mut log), 1);
        assert_eq!(log, ["outer", "inner"]);
    }

    #[test]
    fn a_panicking_item_does_not_stall_the_drain() {
        let dispatcher = HostDispatcher::<u32>::new();
        let handle = dispatcher.handle();
        handle.enqueue(|_: &mut u32| panic!("bad item"));
        handle.enqueue(|count: &mut u32| *count += 1);

        let mut count = 0;
        dispatcher.drain_once(&mut count);
        assert_eq!(count, 1);
    }

    #[test]
    fn accepts_work_from_other_threads() {
        let dispatcher = HostDispatcher::<u32>::new();
        let workers: Vec<_> = (0..4)
            .map(|_| {
                let handle = dispatcher.handle();
                thread::spawn(move || handle.enqueue(|count: &mut u32| *count += 1))
            })
            .collect();
        for worker in workers {
            assert!(worker.join().expect("worker"));
        }
        let mut count = 0;
        dispatcher.drain_once(&mut count);
        assert_eq!(count, 4);
    }

    #[test]
    fn closing_rejects_work_and_wakes_waiters() {
        let dispatcher = HostDispatcher::<u32>::new();
        let handle = dispatcher.handle();
        let (reply, waiter) = mpsc::sync_channel::<u32>(1);
        handle.enqueue(move |count: &mut u32| {
            let _ = reply.send(*count);
        });

        assert_eq!(dispatcher.close(), 1);
        assert!(waiter.recv().is_err(), "reply sender should be dropped");
        assert!(!handle.enqueue(|_: &mut u32| {}));
        assert!(!handle.is_open());
    }
}
