//! Running the host as a process: bootstrap, serve, and stop on a signal.

mod errors;
mod launch;
mod shutdown;

pub use errors::LaunchError;
pub use launch::{run_host, run_host_with};
pub use shutdown::{ShutdownError, ShutdownSignal, ShutdownTrigger, SystemShutdownSignal};

pub(crate) const PROCESS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::process");
