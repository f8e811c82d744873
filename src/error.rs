use thiserror::Error;

/// Convenience result type for pipeline operations.
pub type EtlResult<T> = Result<T, EtlError>;

/// Error type returned across loading, cleaning, joining, and reporting.
///
/// This is a single error enum shared by every pipeline stage.
#[derive(Debug, Error)]
pub enum EtlError {
    /// Underlying I/O error (e.g. file not found, permission denied).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV read/write error.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization error (verification records).
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The input does not conform to the provided schema (missing required columns, etc.).
    #[error("schema mismatch: {message}")]
    SchemaMismatch { message: String },

    /// A value could not be parsed into the required [`crate::types::DataType`].
    #[error("failed to parse value at row {row} column '{column}': {message} (raw='{raw}')")]
    ParseError {
        row: usize,
        column: String,
        raw: String,
        message: String,
    },

    /// A median/mode was requested over a column with no non-null values.
    #[error("empty aggregation: column '{column}' has no non-null values to compute {statistic}")]
    EmptyAggregation { column: String, statistic: String },

    /// The join key column types disagree between the two tables (or are not joinable).
    #[error("join key type mismatch on '{column}': left is {left}, right is {right}")]
    JoinKeyType {
        column: String,
        left: String,
        right: String,
    },

    /// A post-hoc validation check failed (wrong row count, unexpected column, wrong dtype).
    #[error("assertion failed: {message}")]
    AssertionFailure { message: String },
}

impl EtlError {
    /// True when the error is "the file is simply not there".
    ///
    /// The pipelines treat a missing cleaned-data artifact as recoverable
    /// (recompute from raw input); every other error propagates.
    pub fn is_not_found(&self) -> bool {
        match self {
            EtlError::Io(e) => e.kind() == std::io::ErrorKind::NotFound,
            EtlError::Csv(e) => matches!(
                e.kind(),
                csv::ErrorKind::Io(io) if io.kind() == std::io::ErrorKind::NotFound
            ),
            _ => false,
        }
    }
}
