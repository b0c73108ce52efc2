//! Health reporter that remembers what it was told.

use std::sync::{Arc, Mutex};

use crate::health::{HealthReporter, LifecycleEvent};

/// Owned summary of a [`LifecycleEvent`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthEvent {
    BootstrapStarting,
    BootstrapSucceeded,
    BootstrapFailed(String),
    ListenerReady(String),
    HostStopping,
    HostStopped,
}

impl From<&LifecycleEvent<'_>> for HealthEvent {
    fn from(event: &LifecycleEvent<'_>) -> Self {
        match event {
            LifecycleEvent::BootstrapStarting => Self::BootstrapStarting,
            LifecycleEvent::BootstrapSucceeded { .. } => Self::BootstrapSucceeded,
            LifecycleEvent::BootstrapFailed { error } => Self::BootstrapFailed(error.to_string()),
            LifecycleEvent::ListenerReady { endpoint } => Self::ListenerReady(endpoint.to_string()),
            LifecycleEvent::HostStopping => Self::HostStopping,
            LifecycleEvent::HostStopped { .. } => Self::HostStopped,
        }
    }
}

/// Collects [`HealthEvent`]s; clones share one log.
#[derive(Debug, Clone, Default)]
pub struct RecordingReporter {
    events: Arc<Mutex<Vec<HealthEvent>>>,
}

impl RecordingReporter {
    /// Events recorded so far.
    pub fn events(&self) -> Vec<HealthEvent> {
        self.events.lock().expect("events lock").clone()
    }
}

impl HealthReporter for RecordingReporter {
    fn report(&self, event: &LifecycleEvent<'_>) {
        self.events
            .lock()
            .expect("events lock")
            .push(HealthEvent::from(event));
    }
}
