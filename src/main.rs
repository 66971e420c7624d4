//! Binary entrypoint that launches the offline assistant server.

use std::process::ExitCode;

use offline_assistant::start_assistant;

/// Start the assistant with configuration from the environment.
fn main() -> ExitCode {
    start_assistant::run()
}
