//! Command execution engine for a scripted scene host.
//!
//! Clients connect over TCP or a Unix socket and send JSON commands named
//! `domain.action`. Connection threads decode frames and queue each request
//! on the [`dispatch::HostDispatcher`]; the host thread drains that queue
//! once per tick and runs the request through the [`engine::Engine`], which
//! resolves the handler in its [`registry::Router`], binds parameters, and
//! records the outcome in the session history, metrics and error log.
//!
//! Two entry points sit beside the registered domains. `batch.Execute` runs
//! several commands in one request, isolating per-command failures.
//! `async.Start` runs a command as a tracked [`operations`] entry that can be
//! polled and cancelled while the client carries on.
//!
//! Embedders build a [`Host`], register their own [`registry::CommandHandler`]
//! domains, start a [`transport::TransportServer`] with the host's connection
//! handler, and call [`Host::tick`] from the thread that owns their object
//! model. The `scenebridged` binary does exactly that with the in-memory
//! [`demo`] domains.

mod bootstrap;
pub mod demo;
mod diagnostics;
pub mod dispatch;
pub mod engine;
mod health;
mod history;
mod host;
mod metrics;
pub mod operations;
mod process;
pub mod registry;
mod session;
mod telemetry;
pub mod transport;

pub use bootstrap::{
    BootstrapError, Bootstrapped, ConfigLoader, StaticConfigLoader, SystemConfigLoader,
    bootstrap_with,
};
pub use diagnostics::{ERROR_LOG_CAPACITY, ErrorLog, ErrorRecord};
pub use health::{HealthReporter, LifecycleEvent, StructuredHealthReporter};
pub use history::{History, HistoryEntry};
pub use host::Host;
pub use metrics::{CommandMetrics, CommandStats, StatsReport};
pub use process::{
    LaunchError, ShutdownError, ShutdownSignal, ShutdownTrigger, SystemShutdownSignal, run_host,
    run_host_with,
};
pub use session::SessionContext;
pub use telemetry::{TelemetryError, TelemetryHandle, initialise as initialise_telemetry};

#[cfg(test)]
mod tests;
