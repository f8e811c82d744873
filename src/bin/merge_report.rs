//! Merge cleaned sales with customers, aggregate by region, pivot, and write
//! the merged/summary/pivot artifacts.

use std::sync::Arc;

use tabular_etl::observe::StdErrObserver;
use tabular_etl::pipeline::{run_merge_report, PipelineConfig};
use tabular_etl::EtlError;

fn main() -> Result<(), EtlError> {
    let mut config = PipelineConfig::new("data", "outputs");
    config.observer = Some(Arc::new(StdErrObserver));
    let verification = run_merge_report(&config)?;
    println!("GROUPBY_MERGE_PIVOT_OK");
    println!("{}", serde_json::to_string_pretty(&verification)?);
    Ok(())
}
