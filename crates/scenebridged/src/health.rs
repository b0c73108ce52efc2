//! Lifecycle events of a host and the reporters that observe them.

use std::sync::Arc;

use camino::Utf8Path;
use scenebridge_config::{Config, SocketEndpoint};
use tracing::{error, info};

use crate::bootstrap::BootstrapError;

const HEALTH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::health");

/// Milestones a host passes through, in order.
#[derive(Debug, Clone, Copy)]
pub enum LifecycleEvent<'a> {
    /// Configuration loading is about to begin.
    BootstrapStarting,
    /// Configuration, telemetry and the socket directory are ready.
    BootstrapSucceeded {
        /// Effective configuration.
        config: &'a Config,
    },
    /// Bootstrap stopped at a failing stage.
    BootstrapFailed {
        /// The failure.
        error: &'a BootstrapError,
    },
    /// The transport accepts connections.
    ListenerReady {
        /// Bound endpoint.
        endpoint: &'a SocketEndpoint,
    },
    /// A shutdown request was observed.
    HostStopping,
    /// The transport is closed and history flushed.
    HostStopped {
        /// Where history was written, if anywhere.
        history_file: Option<&'a Utf8Path>,
    },
}

impl LifecycleEvent<'_> {
    /// Stable snake-case name used as the `event` log field.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::BootstrapStarting => "bootstrap_starting",
            Self::BootstrapSucceeded { .. } => "bootstrap_succeeded",
            Self::BootstrapFailed { .. } => "bootstrap_failed",
            Self::ListenerReady { .. } => "listener_ready",
            Self::HostStopping => "host_stopping",
            Self::HostStopped { .. } => "host_stopped",
        }
    }
}

/// Receives [`LifecycleEvent`]s as the host reaches them.
pub trait HealthReporter: Send + Sync {
    /// Observes one event.
    fn report(&self, event: &LifecycleEvent<'_>);
}

impl<T: HealthReporter + ?Sized> HealthReporter for Arc<T> {
    fn report(&self, event: &LifecycleEvent<'_>) {
        (**self).report(event);
    }
}

/// Writes each event to `tracing` under the `health` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredHealthReporter;

impl StructuredHealthReporter {
    /// Builds a new reporter.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl HealthReporter for StructuredHealthReporter {
    fn report(&self, event: &LifecycleEvent<'_>) {
        let name = event.name();
        match *event {
            LifecycleEvent::BootstrapStarting => {
                info!(target: HEALTH_TARGET, event = name, "starting host bootstrap");
            }
            LifecycleEvent::BootstrapSucceeded { config } => info!(
                target: HEALTH_TARGET,
                event = name,
                socket = %config.daemon_socket(),
                framing = %config.framing(),
                log_filter = %config.log_filter(),
                log_format = %config.log_format(),
                "host bootstrap completed"
            ),
            LifecycleEvent::BootstrapFailed { error } => {
                error!(target: HEALTH_TARGET, event = name, %error, "host bootstrap failed");
            }
            LifecycleEvent::ListenerReady { endpoint } => {
                info!(target: HEALTH_TARGET, event = name, %endpoint, "accepting commands");
            }
            LifecycleEvent::HostStopping => {
                info!(target: HEALTH_TARGET, event = name, "host shutting down");
            }
            LifecycleEvent::HostStopped { history_file } => info!(
                target: HEALTH_TARGET,
                event = name,
                history_file = history_file.map(Utf8Path::as_str),
                "host stopped"
            ),
        }
    }
}
