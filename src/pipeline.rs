//! Batch pipeline runs over the sales/customers datasets.
//!
//! Each run is a one-shot, single-threaded pass: load, transform, write
//! artifacts, emit a JSON verification record. The only recoverable condition
//! is a missing cleaned-data artifact, which triggers recomputation from raw
//! input; every other error propagates and terminates the run, leaving
//! already-written artifacts in place.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::aggregate::{group_by, pivot, AggFn, AggSpec, NullKeys};
use crate::clean::{clean, to_categorical, CleaningPolicy};
use crate::error::{EtlError, EtlResult};
use crate::ingestion::read_csv_from_path;
use crate::join::{join_with_suffixes, JoinKind};
use crate::observe::{severity_for_error, PipelineObserver, Severity, StageContext};
use crate::report::{write_csv, ArtifactCheck, DtypeCheck, StageCount, Verification};
use crate::timeseries::{resample_monthly, with_rolling_mean};
use crate::types::{DataType, Field, Schema, Table, Value};

/// Raw sales dataset file name.
pub const SALES_FILE: &str = "sales_small.csv";
/// Customers dataset file name.
pub const CUSTOMERS_FILE: &str = "customers_small.csv";
/// Cleaned sales artifact file name.
pub const CLEANED_FILE: &str = "cleaned_sales.csv";
/// Inner-merged sales/customers artifact file name.
pub const MERGED_INNER_FILE: &str = "sales_customer_merged_inner.csv";
/// Region summary artifact file name.
pub const REGION_SUMMARY_FILE: &str = "region_summary.csv";
/// Region x category pivot artifact file name.
pub const PIVOT_FILE: &str = "category_region_sales.csv";
/// Monthly resample artifact file name.
pub const TIME_SERIES_FILE: &str = "time_series_report.csv";

/// Explicit configuration passed into each run; no hidden global state.
#[derive(Clone)]
pub struct PipelineConfig {
    /// Directory holding the raw input datasets.
    pub data_dir: PathBuf,
    /// Directory artifacts are written into (created idempotently).
    pub output_dir: PathBuf,
    /// Optional observer for stage/artifact/failure events.
    pub observer: Option<Arc<dyn PipelineObserver>>,
    /// Severity threshold at which `on_alert` is invoked.
    pub alert_at_or_above: Severity,
}

impl PipelineConfig {
    /// Create a config with no observer.
    pub fn new(data_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            output_dir: output_dir.into(),
            observer: None,
            alert_at_or_above: Severity::Critical,
        }
    }
}

impl std::fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("data_dir", &self.data_dir)
            .field("output_dir", &self.output_dir)
            .field("observer_set", &self.observer.is_some())
            .field("alert_at_or_above", &self.alert_at_or_above)
            .finish()
    }
}

/// Schema of the raw sales dataset. The key identifier parses strictly so a
/// malformed id fails the load instead of becoming a silent null.
pub fn sales_schema() -> Schema {
    Schema::new(vec![
        Field::new("order_id", DataType::Int64),
        Field::strict("customer_id", DataType::Int64),
        Field::new("amount", DataType::Float64),
        Field::new("region", DataType::Utf8),
        Field::new("category", DataType::Utf8),
        Field::new("product", DataType::Utf8),
        Field::new("order_date", DataType::Date),
    ])
}

/// Schema of the customers dataset.
pub fn customers_schema() -> Schema {
    Schema::new(vec![
        Field::strict("customer_id", DataType::Int64),
        Field::new("name", DataType::Utf8),
    ])
}

/// The one canonical cleaning policy for the sales dataset.
pub fn sales_policy() -> CleaningPolicy {
    CleaningPolicy {
        median_impute: vec!["amount".into()],
        key_column: "customer_id".into(),
        mode_impute: vec!["region".into()],
        categorical: vec!["product".into(), "category".into(), "region".into()],
    }
}

/// Clean the raw sales data and write `cleaned_sales.csv` plus its
/// verification record.
pub fn run_cleaning(config: &PipelineConfig) -> EtlResult<Verification> {
    let pipeline = "clean_sales";
    observed(config, pipeline, || {
        ensure_output_dir(config)?;

        let raw = read_csv_from_path(config.data_dir.join(SALES_FILE), &sales_schema())?;
        let outcome = clean(&raw, &sales_policy())?;
        for stage in &outcome.stages {
            notify_stage(config, pipeline, &stage.stage, stage.rows);
        }

        let cleaned_path = config.output_dir.join(CLEANED_FILE);
        write_csv(&outcome.table, &cleaned_path)?;
        notify_artifact(config, pipeline, &cleaned_path);

        let mut verification = Verification::new(pipeline);
        verification.stage_rows = outcome.stages.clone();
        verification
            .artifacts
            .push(ArtifactCheck::for_path(&cleaned_path));
        for column in ["customer_id", "product", "category", "region"] {
            verification
                .dtypes
                .push(DtypeCheck::observed(&outcome.table, column));
        }
        verification.write(config.output_dir.join("verification_clean_sales.json"))?;
        Ok(verification)
    })
}

/// Load the cleaned sales artifact, or recompute it from raw input when the
/// artifact is missing. Any other load error propagates.
pub fn load_cleaned_or_clean_raw(config: &PipelineConfig) -> EtlResult<Table> {
    let cleaned_path = config.output_dir.join(CLEANED_FILE);
    match read_csv_from_path(&cleaned_path, &sales_schema()) {
        Ok(table) => {
            // The CSV stores categorical columns as labels; re-encode them.
            let mut out = table;
            for column in &sales_policy().categorical {
                out = to_categorical(&out, column)?;
            }
            Ok(out)
        }
        Err(err) if err.is_not_found() => {
            ensure_output_dir(config)?;
            let raw = read_csv_from_path(config.data_dir.join(SALES_FILE), &sales_schema())?;
            let outcome = clean(&raw, &sales_policy())?;
            write_csv(&outcome.table, &cleaned_path)?;
            Ok(outcome.table)
        }
        Err(err) => Err(err),
    }
}

/// Join cleaned sales against customers and write the merged, summary, and
/// pivot artifacts plus a verification record.
pub fn run_merge_report(config: &PipelineConfig) -> EtlResult<Verification> {
    let pipeline = "merge_report";
    observed(config, pipeline, || {
        ensure_output_dir(config)?;

        let sales = load_cleaned_or_clean_raw(config)?;
        notify_stage(config, pipeline, "cleaned_sales", sales.row_count());
        let customers =
            read_csv_from_path(config.data_dir.join(CUSTOMERS_FILE), &customers_schema())?;

        let region_summary = group_by(
            &sales,
            &["region"],
            &[
                AggSpec::new("amount", AggFn::Sum, "total_sales"),
                AggSpec::new("order_id", AggFn::Count, "order_count"),
            ],
            NullKeys::Exclude,
        )?;

        let suffixes = ("_sales", "_cust");
        let merged_left =
            join_with_suffixes(&sales, &customers, "customer_id", JoinKind::Left, suffixes)?;
        notify_stage(config, pipeline, "merged_left", merged_left.row_count());
        let merged_inner =
            join_with_suffixes(&sales, &customers, "customer_id", JoinKind::Inner, suffixes)?;
        notify_stage(config, pipeline, "merged_inner", merged_inner.row_count());

        // Pivot over the left join so regions with no matched customers still
        // contribute; empty cells fill with zero to keep the table numeric.
        let pivoted = pivot(
            &merged_left,
            "region",
            "category",
            "amount",
            AggFn::Sum,
            Value::Float64(0.0),
        )?;

        let summary_path = config.output_dir.join(REGION_SUMMARY_FILE);
        let inner_path = config.output_dir.join(MERGED_INNER_FILE);
        let pivot_path = config.output_dir.join(PIVOT_FILE);
        write_csv(&region_summary, &summary_path)?;
        notify_artifact(config, pipeline, &summary_path);
        write_csv(&merged_inner, &inner_path)?;
        notify_artifact(config, pipeline, &inner_path);
        write_csv(&pivoted, &pivot_path)?;
        notify_artifact(config, pipeline, &pivot_path);

        let mut verification = Verification::new(pipeline);
        verification.stage_rows = vec![
            StageCount::new("cleaned_sales", sales.row_count()),
            StageCount::new("region_summary", region_summary.row_count()),
            StageCount::new("merged_left", merged_left.row_count()),
            StageCount::new("merged_inner", merged_inner.row_count()),
            StageCount::new("pivot_rows", pivoted.row_count()),
        ];
        for path in [&summary_path, &inner_path, &pivot_path] {
            verification.artifacts.push(ArtifactCheck::for_path(path));
        }
        // The join key must keep its nullable-integer type end to end.
        verification
            .dtypes
            .push(DtypeCheck::observed(&merged_inner, "customer_id"));
        verification.write(config.output_dir.join("verification_merge_report.json"))?;
        Ok(verification)
    })
}

/// Resample cleaned sales by month, append a 3-month rolling mean, and write
/// the time-series artifact plus a verification record.
pub fn run_time_series_report(config: &PipelineConfig) -> EtlResult<Verification> {
    let pipeline = "time_series_report";
    observed(config, pipeline, || {
        ensure_output_dir(config)?;

        let sales = load_cleaned_or_clean_raw(config)?;
        notify_stage(config, pipeline, "cleaned_sales", sales.row_count());

        let monthly = resample_monthly(&sales, "order_date", "amount")?;
        notify_stage(config, pipeline, "monthly", monthly.row_count());
        let report = with_rolling_mean(&monthly, "amount", 3, "rolling_mean_3m")?;

        let report_path = config.output_dir.join(TIME_SERIES_FILE);
        write_csv(&report, &report_path)?;
        notify_artifact(config, pipeline, &report_path);

        let mut verification = Verification::new(pipeline);
        verification.stage_rows = vec![
            StageCount::new("cleaned_sales", sales.row_count()),
            StageCount::new("monthly_periods", monthly.row_count()),
        ];
        verification
            .artifacts
            .push(ArtifactCheck::for_path(&report_path));
        verification
            .dtypes
            .push(DtypeCheck::observed(&report, "month"));
        verification.write(
            config
                .output_dir
                .join("verification_time_series_report.json"),
        )?;
        Ok(verification)
    })
}

/// Assertion-style validation of the raw sales dataset.
///
/// Checks: no synthetic index column in the file header, an `amount` column
/// present with a positive non-null sum, more than 10 rows, and a key column
/// that parsed as nullable Int64. Any violation is an
/// [`EtlError::AssertionFailure`].
pub fn run_quick_checks(config: &PipelineConfig) -> EtlResult<()> {
    let pipeline = "quick_checks";
    observed(config, pipeline, || {
        let path = config.data_dir.join(SALES_FILE);
        let headers = checked_raw_headers(&path)?;
        if !headers.iter().any(|h| h == "amount") {
            return Err(assertion(format!(
                "expected 'amount' column not found in {}",
                path.display()
            )));
        }

        let table = read_csv_from_path(&path, &sales_schema())?;
        if table.row_count() <= 10 {
            return Err(assertion(format!(
                "expected more than 10 rows, got {}",
                table.row_count()
            )));
        }

        let total: f64 = table
            .rows
            .iter()
            .flat_map(|row| row.iter().zip(&table.schema.fields))
            .filter(|(_, field)| field.name == "amount")
            .filter_map(|(value, _)| value.as_f64())
            .sum();
        if total <= 0.0 {
            return Err(assertion(format!(
                "sum of 'amount' ({total:.2}) is not positive"
            )));
        }

        match table.schema.field("customer_id").map(|f| &f.data_type) {
            Some(DataType::Int64) => {}
            other => {
                return Err(assertion(format!(
                    "expected 'customer_id' to be nullable Int64, got {other:?}"
                )));
            }
        }

        notify_stage(config, pipeline, "all_checks", table.row_count());
        Ok(())
    })
}

// A leading unnamed header column is the fingerprint of a table written with
// its synthetic row index and reloaded. Returns the header row so callers can
// run further file-level checks without reopening the file.
fn checked_raw_headers(path: &Path) -> EtlResult<csv::StringRecord> {
    let mut rdr = csv::ReaderBuilder::new().has_headers(true).from_path(path)?;
    let headers = rdr.headers()?.clone();
    for header in headers.iter() {
        if header.trim().is_empty() || header.starts_with("Unnamed:") {
            return Err(assertion(format!(
                "found synthetic index column '{header}' in {}; write CSVs without an index",
                path.display()
            )));
        }
    }
    Ok(headers)
}

fn assertion(message: String) -> EtlError {
    EtlError::AssertionFailure { message }
}

fn ensure_output_dir(config: &PipelineConfig) -> EtlResult<()> {
    std::fs::create_dir_all(&config.output_dir)?;
    Ok(())
}

fn notify_stage(config: &PipelineConfig, pipeline: &str, stage: &str, rows: usize) {
    if let Some(obs) = config.observer.as_ref() {
        obs.on_stage(&StageContext::new(pipeline, stage), rows);
    }
}

fn notify_artifact(config: &PipelineConfig, pipeline: &str, path: &Path) {
    if let Some(obs) = config.observer.as_ref() {
        obs.on_artifact(&StageContext::new(pipeline, "write"), path);
    }
}

// Run a pipeline body, reporting failures (and alerts past the threshold) to
// the configured observer before propagating.
fn observed<T>(
    config: &PipelineConfig,
    pipeline: &str,
    body: impl FnOnce() -> EtlResult<T>,
) -> EtlResult<T> {
    let result = body();
    if let (Err(err), Some(obs)) = (&result, config.observer.as_ref()) {
        let severity = severity_for_error(err);
        let ctx = StageContext::new(pipeline, "run");
        obs.on_failure(&ctx, severity, err);
        if severity >= config.alert_at_or_above {
            obs.on_alert(&ctx, severity, err);
        }
    }
    result
}
