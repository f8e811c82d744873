//! `tabular-etl` is a small library for single-pass batch transformation of
//! delimited data: load a CSV into an in-memory [`types::Table`] using a
//! typed [`types::Schema`], clean it by a column-specific policy, join two
//! tables on a shared key, aggregate by group keys (with an optional pivot
//! reshape), and write CSV artifacts plus a JSON verification record.
//!
//! ## Stages
//!
//! - [`ingestion`]: schema-first CSV loading with per-column lenient/strict
//!   parsing (malformed numerics become nulls, except on key columns)
//! - [`clean`]: median/mode imputation, null-key row drops, deduplication,
//!   and categorical conversion in one canonical order
//! - [`join`]: inner/left joins with null-safe key matching and collision
//!   suffixing
//! - [`aggregate`]: deterministic group-by sum/count plus pivot/melt
//! - [`timeseries`]: monthly resampling and rolling means
//! - [`report`]: index-free CSV output and JSON verification records
//! - [`pipeline`]: end-to-end batch runs wiring the stages together
//! - [`observe`]: observer hooks for stage counts, artifacts, and failures
//!
//! ## Quick example: clean then aggregate
//!
//! ```no_run
//! use tabular_etl::aggregate::{group_by, AggFn, AggSpec, NullKeys};
//! use tabular_etl::clean::{clean, CleaningPolicy};
//! use tabular_etl::ingestion::read_csv_from_path;
//! use tabular_etl::types::{DataType, Field, Schema};
//!
//! # fn main() -> Result<(), tabular_etl::EtlError> {
//! let schema = Schema::new(vec![
//!     Field::strict("customer_id", DataType::Int64),
//!     Field::new("amount", DataType::Float64),
//!     Field::new("region", DataType::Utf8),
//! ]);
//! let raw = read_csv_from_path("data/sales_small.csv", &schema)?;
//!
//! let policy = CleaningPolicy {
//!     median_impute: vec!["amount".into()],
//!     key_column: "customer_id".into(),
//!     mode_impute: vec!["region".into()],
//!     categorical: vec!["region".into()],
//! };
//! let cleaned = clean(&raw, &policy)?.table;
//!
//! let summary = group_by(
//!     &cleaned,
//!     &["region"],
//!     &[AggSpec::new("amount", AggFn::Sum, "total_sales")],
//!     NullKeys::Exclude,
//! )?;
//! println!("groups={}", summary.row_count());
//! # Ok(())
//! # }
//! ```
//!
//! Tables are never mutated in place: each stage returns a new table, so a
//! failure mid-run leaves earlier artifacts intact and re-runs are
//! reproducible (aggregation output is sorted by group key).

pub mod aggregate;
pub mod clean;
pub mod error;
pub mod ingestion;
pub mod join;
pub mod observe;
pub mod pipeline;
pub mod report;
pub mod timeseries;
pub mod types;

pub use error::{EtlError, EtlResult};
