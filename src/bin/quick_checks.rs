//! Validate the raw sales dataset; exits 0 when all checks pass, 1 otherwise.

use std::process::ExitCode;

use tabular_etl::pipeline::{run_quick_checks, PipelineConfig};

fn main() -> ExitCode {
    let config = PipelineConfig::new("data", "outputs");
    match run_quick_checks(&config) {
        Ok(()) => {
            println!("ALL_CHECKS_PASS");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}
