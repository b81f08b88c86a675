//! `nexusd` binary: runs the orchestrator in the foreground.

use std::io::{self, Write};
use std::process::ExitCode;

fn main() -> ExitCode {
    match nexusd::run_orchestrator() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            let mut stderr = io::stderr().lock();
            if writeln!(stderr, "nexusd: {error}").is_err() {
                return ExitCode::from(2);
            }
            ExitCode::FAILURE
        }
    }
}
