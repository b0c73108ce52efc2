//! Sequences bootstrap, the host loop and shutdown.

use std::sync::Arc;
use std::thread;

use tracing::info;

use crate::bootstrap::{ConfigLoader, SystemConfigLoader, bootstrap_with};
use crate::demo::register_demo_domains;
use crate::health::{HealthReporter, LifecycleEvent, StructuredHealthReporter};
use crate::host::Host;
use crate::transport::TransportServer;

use super::PROCESS_TARGET;
use super::errors::LaunchError;
use super::shutdown::{ShutdownSignal, SystemShutdownSignal};

/// Runs the demo host with the production collaborators until a
/// termination signal arrives.
///
/// # Errors
///
/// Returns the first failing stage as a [`LaunchError`].
pub fn run_host() -> Result<(), LaunchError> {
    let shutdown = SystemShutdownSignal::install()?;
    run_host_with(
        &SystemConfigLoader,
        &StructuredHealthReporter::new(),
        &shutdown,
    )
}

/// Runs the demo host with injected collaborators.
///
/// The calling thread becomes the host thread: it drains queued commands
/// once per tick until `shutdown` is requested. Shutdown closes the queue
/// first so connection threads waiting on it are released, then stops the
/// transport and flushes history.
///
/// # Errors
///
/// Returns the first failing stage as a [`LaunchError`].
pub fn run_host_with(
    loader: &dyn ConfigLoader,
    reporter: &dyn HealthReporter,
    shutdown: &dyn ShutdownSignal,
) -> Result<(), LaunchError> {
    let config = bootstrap_with(loader, reporter)?.into_config();
    let mut host = Host::new(config)?;
    register_demo_domains(host.engine_mut())?;

    let handler = Arc::new(host.connection_handler());
    let mut server = TransportServer::start(
        host.config().daemon_socket(),
        handler,
        host.config().shutdown_grace(),
    )?;
    reporter.report(&LifecycleEvent::ListenerReady {
        endpoint: server.endpoint(),
    });

    let interval = host.config().tick_interval();
    while !shutdown.requested() {
        host.tick();
        thread::sleep(interval);
    }

    reporter.report(&LifecycleEvent::HostStopping);
    let dropped = host.close();
    info!(target: PROCESS_TARGET, dropped, "command queue closed");
    let stopped = server.stop();
    host.flush_history().map_err(|source| LaunchError::HistoryFlush {
        path: host
            .config()
            .history_file()
            .map(ToOwned::to_owned)
            .unwrap_or_default(),
        source,
    })?;
    stopped?;
    reporter.report(&LifecycleEvent::HostStopped {
        history_file: host.config().history_file(),
    });
    info!(target: PROCESS_TARGET, "shutdown sequence completed");
    Ok(())
}
