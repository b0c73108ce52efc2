use std::process::ExitCode;

#[expect(
    clippy::print_stderr,
    reason = "telemetry may not be installed when launch fails"
)]
fn main() -> ExitCode {
    match scenebridged::run_host() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("scenebridged: {error}");
            ExitCode::FAILURE
        }
    }
}
