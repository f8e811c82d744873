//! Loading delimited files into an in-memory [`crate::types::Table`].
//!
//! The pipeline ingests CSV only. Use [`csv::read_csv_from_path`] with a
//! [`crate::types::Schema`]; per-field [`crate::types::ParseMode`] controls
//! whether malformed numeric/date cells become nulls or fail the load.

pub mod csv;

pub use csv::{read_csv_from_path, read_csv_from_reader};
