//! Command-line client for a scenebridge host.
//!
//! `scenebridge` sends exactly one command and prints the host's response as
//! JSON. The runtime is exercised from the binary and from tests, where the
//! configuration loader and output streams are substituted.

mod cli;
mod config;
mod errors;

use std::ffi::OsString;
use std::io::Write;
use std::process::ExitCode;

use clap::Parser;
use scenebridge_protocol::{Client, CommandResponse};

use cli::Cli;
pub(crate) use config::{ConfigLoader, OrthoConfigLoader};
pub(crate) use errors::AppError;

/// Exit status when the host answered with an error response.
pub const EXIT_COMMAND_FAILED: u8 = 1;
/// Exit status for usage, configuration and transport failures.
pub const EXIT_CLIENT_FAILED: u8 = 2;

/// Runs the client with the given arguments and output streams.
#[must_use]
pub fn run<I, W, E>(args: I, stdout: &mut W, stderr: &mut E) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
{
    run_with_loader(args, stdout, stderr, &OrthoConfigLoader)
}

pub(crate) fn run_with_loader<I, W, E, L>(
    args: I,
    stdout: &mut W,
    stderr: &mut E,
    loader: &L,
) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
    L: ConfigLoader,
{
    match execute(args, stdout, loader) {
        Ok(response) if response.is_success() => ExitCode::SUCCESS,
        Ok(_) => ExitCode::from(EXIT_COMMAND_FAILED),
        // `--help` and `--version` arrive as clap errors bound for stdout.
        Err(AppError::CliUsage(error)) if !error.use_stderr() => {
            match write!(stdout, "{error}") {
                Ok(()) => ExitCode::SUCCESS,
                Err(_) => ExitCode::from(EXIT_CLIENT_FAILED),
            }
        }
        Err(error) => {
            #[expect(
                clippy::let_underscore_must_use,
                reason = "nothing is left to report to once stderr fails"
            )]
            let _ = writeln!(stderr, "scenebridge: {error}");
            ExitCode::from(EXIT_CLIENT_FAILED)
        }
    }
}

fn execute<I, W, L>(args: I, stdout: &mut W, loader: &L) -> Result<CommandResponse, AppError>
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    L: ConfigLoader,
{
    let cli = Cli::try_parse_from(args).map_err(AppError::CliUsage)?;
    let request = cli.request()?;
    let config = loader.load(cli.config_path.as_deref())?;

    let mut client = Client::connect_with(&cli.endpoint(&config), cli.client_options(&config))?;
    let response = client.send(&request)?;
    client.disconnect();

    write_response(stdout, &response, cli.compact)?;
    Ok(response)
}

fn write_response<W: Write>(
    stdout: &mut W,
    response: &CommandResponse,
    compact: bool,
) -> Result<(), AppError> {
    let rendered = if compact {
        serde_json::to_string(response)
    } else {
        serde_json::to_string_pretty(response)
    }
    .map_err(|error| AppError::WriteResponse(error.into()))?;
    writeln!(stdout, "{rendered}").map_err(AppError::WriteResponse)
}

#[cfg(test)]
mod tests;
