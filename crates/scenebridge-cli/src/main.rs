//! Entry point of the `scenebridge` client.
//!
//! Delegates to [`scenebridge_cli::run`], which sends one command to the
//! configured host and prints the response.

use std::io::{self, StderrLock, StdoutLock};
use std::process::ExitCode;

fn main() -> ExitCode {
    let mut stdout: StdoutLock<'_> = io::stdout().lock();
    let mut stderr: StderrLock<'_> = io::stderr().lock();
    scenebridge_cli::run(std::env::args_os(), &mut stdout, &mut stderr)
}
