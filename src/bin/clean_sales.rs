//! Clean the raw sales dataset and write the cleaned artifact.

use std::sync::Arc;

use tabular_etl::observe::StdErrObserver;
use tabular_etl::pipeline::{run_cleaning, PipelineConfig};
use tabular_etl::EtlError;

fn main() -> Result<(), EtlError> {
    let mut config = PipelineConfig::new("data", "outputs");
    config.observer = Some(Arc::new(StdErrObserver));
    let verification = run_cleaning(&config)?;
    println!("CLEANING_OK");
    println!("{}", serde_json::to_string_pretty(&verification)?);
    Ok(())
}
