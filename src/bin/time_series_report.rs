//! Resample cleaned sales by month with a rolling mean and write the
//! time-series artifact.

use std::sync::Arc;

use tabular_etl::observe::StdErrObserver;
use tabular_etl::pipeline::{run_time_series_report, PipelineConfig};
use tabular_etl::EtlError;

fn main() -> Result<(), EtlError> {
    let mut config = PipelineConfig::new("data", "outputs");
    config.observer = Some(Arc::new(StdErrObserver));
    let verification = run_time_series_report(&config)?;
    println!("TIME_SERIES_OK");
    println!("{}", serde_json::to_string_pretty(&verification)?);
    Ok(())
}
