use std::fs;
use std::path::Path;
use std::sync::Arc;

use tabular_etl::observe::FileObserver;
use tabular_etl::pipeline::{
    load_cleaned_or_clean_raw, run_cleaning, run_merge_report, run_quick_checks,
    run_time_series_report, PipelineConfig, CLEANED_FILE, MERGED_INNER_FILE, PIVOT_FILE,
    REGION_SUMMARY_FILE, TIME_SERIES_FILE,
};
use tabular_etl::EtlError;

fn config(output_dir: &Path) -> PipelineConfig {
    PipelineConfig::new("tests/fixtures", output_dir)
}

fn stage_rows(verification: &tabular_etl::report::Verification, stage: &str) -> usize {
    verification
        .stage_rows
        .iter()
        .find(|s| s.stage == stage)
        .unwrap_or_else(|| panic!("missing stage '{stage}'"))
        .rows
}

#[test]
fn run_cleaning_writes_artifact_and_verification() {
    let dir = tempfile::tempdir().unwrap();
    let verification = run_cleaning(&config(dir.path())).unwrap();

    assert_eq!(verification.pipeline, "clean_sales");
    assert_eq!(stage_rows(&verification, "raw"), 20);
    assert_eq!(stage_rows(&verification, "cleaned"), 19);
    assert!(verification.artifacts.iter().all(|a| a.exists));
    assert!(verification
        .dtypes
        .iter()
        .any(|d| d.column == "customer_id" && d.dtype == "Int64"));

    let cleaned = dir.path().join(CLEANED_FILE);
    assert!(cleaned.exists());
    assert!(dir.path().join("verification_clean_sales.json").exists());

    // The artifact must not carry a synthetic index column.
    let header = fs::read_to_string(&cleaned)
        .unwrap()
        .lines()
        .next()
        .unwrap()
        .to_owned();
    assert_eq!(
        header,
        "order_id,customer_id,amount,region,category,product,order_date"
    );
}

#[test]
fn merge_report_uses_the_cleaned_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path());
    run_cleaning(&cfg).unwrap();
    let verification = run_merge_report(&cfg).unwrap();

    assert_eq!(stage_rows(&verification, "cleaned_sales"), 19);
    assert_eq!(stage_rows(&verification, "merged_left"), 19);
    assert_eq!(stage_rows(&verification, "merged_inner"), 17);
    assert_eq!(stage_rows(&verification, "region_summary"), 2);
    for name in [REGION_SUMMARY_FILE, MERGED_INNER_FILE, PIVOT_FILE] {
        assert!(dir.path().join(name).exists(), "{name} missing");
    }
    assert!(verification
        .dtypes
        .iter()
        .any(|d| d.column == "customer_id" && d.dtype == "Int64"));
}

#[test]
fn merge_report_falls_back_to_raw_when_cleaned_artifact_is_missing() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path());
    // No run_cleaning first: the cleaned artifact does not exist yet.
    assert!(!dir.path().join(CLEANED_FILE).exists());

    let verification = run_merge_report(&cfg).unwrap();
    assert_eq!(stage_rows(&verification, "merged_inner"), 17);
    // The fallback recomputation wrote the artifact for later runs.
    assert!(dir.path().join(CLEANED_FILE).exists());
}

#[test]
fn load_cleaned_or_clean_raw_propagates_non_missing_errors() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path());
    // A present-but-malformed artifact is not recoverable.
    fs::write(dir.path().join(CLEANED_FILE), "not,a,sales,file\n1,2,3,4\n").unwrap();

    let err = load_cleaned_or_clean_raw(&cfg).unwrap_err();
    assert!(matches!(err, EtlError::SchemaMismatch { .. }));
}

#[test]
fn time_series_report_resamples_by_month() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path());
    let verification = run_time_series_report(&cfg).unwrap();

    // Fixture orders span January through March 2024.
    assert_eq!(stage_rows(&verification, "monthly_periods"), 3);
    let report = fs::read_to_string(dir.path().join(TIME_SERIES_FILE)).unwrap();
    let lines: Vec<&str> = report.lines().collect();
    assert_eq!(lines[0], "month,amount,rolling_mean_3m");
    assert_eq!(lines[1], "2024-01-01,807.5,");
    assert_eq!(lines[2], "2024-02-01,765,");
    assert_eq!(lines[3], "2024-03-01,662.5,745");
}

#[test]
fn quick_checks_pass_on_the_fixture() {
    let dir = tempfile::tempdir().unwrap();
    run_quick_checks(&config(dir.path())).unwrap();
}

#[test]
fn quick_checks_reject_a_tiny_dataset() {
    let dir = tempfile::tempdir().unwrap();
    let data_dir = dir.path().join("data");
    fs::create_dir_all(&data_dir).unwrap();
    fs::write(
        data_dir.join("sales_small.csv"),
        "order_id,customer_id,amount,region,category,product,order_date\n\
         1,1,10.0,North,Home,Lamp,2024-01-01\n",
    )
    .unwrap();

    let cfg = PipelineConfig::new(&data_dir, dir.path().join("outputs"));
    let err = run_quick_checks(&cfg).unwrap_err();
    assert!(matches!(err, EtlError::AssertionFailure { .. }));
    assert!(err.to_string().contains("more than 10 rows"));
}

#[test]
fn quick_checks_reject_a_synthetic_index_column() {
    let dir = tempfile::tempdir().unwrap();
    let data_dir = dir.path().join("data");
    fs::create_dir_all(&data_dir).unwrap();
    let mut body = String::from(
        ",order_id,customer_id,amount,region,category,product,order_date\n",
    );
    for i in 0..12 {
        body.push_str(&format!(
            "{i},{},{},10.0,North,Home,Lamp,2024-01-01\n",
            1000 + i,
            i + 1
        ));
    }
    fs::write(data_dir.join("sales_small.csv"), body).unwrap();

    let cfg = PipelineConfig::new(&data_dir, dir.path().join("outputs"));
    let err = run_quick_checks(&cfg).unwrap_err();
    assert!(err.to_string().contains("synthetic index column"));
}

#[test]
fn quick_checks_reject_a_file_without_an_amount_column() {
    let dir = tempfile::tempdir().unwrap();
    let data_dir = dir.path().join("data");
    fs::create_dir_all(&data_dir).unwrap();
    let mut body = String::from("order_id,customer_id,region,category,product,order_date\n");
    for i in 0..12 {
        body.push_str(&format!(
            "{},{},North,Home,Lamp,2024-01-01\n",
            1000 + i,
            i + 1
        ));
    }
    fs::write(data_dir.join("sales_small.csv"), body).unwrap();

    let cfg = PipelineConfig::new(&data_dir, dir.path().join("outputs"));
    let err = run_quick_checks(&cfg).unwrap_err();
    assert!(matches!(err, EtlError::AssertionFailure { .. }));
    assert!(err.to_string().contains("'amount' column not found"));
}

#[test]
fn failures_are_reported_to_the_observer() {
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("etl.log");
    let mut cfg = PipelineConfig::new(dir.path().join("no_such_dir"), dir.path().join("outputs"));
    cfg.observer = Some(Arc::new(FileObserver::new(&log_path)));

    let err = run_cleaning(&cfg).unwrap_err();
    assert!(err.is_not_found());

    let log = fs::read_to_string(&log_path).unwrap();
    assert!(log.contains("fail"));
    assert!(log.contains("clean_sales"));
    // Missing input files are critical and cross the default alert threshold.
    assert!(log.contains("ALERT"));
}
