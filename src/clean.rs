//! Cleaning a raw [`Table`] into one suitable for joining and aggregating.
//!
//! One canonical policy, applied in a fixed order:
//!
//! 1. median-impute continuous numeric columns
//! 2. drop rows whose key identifier is null (a null key cannot join)
//! 3. mode-impute categorical text columns
//! 4. drop exact duplicate rows, keeping first occurrence
//! 5. convert low-cardinality text columns to categorical codes
//!
//! The order is load-bearing: deduplication runs after imputation so rows
//! that become identical once filled are deduplicated, and before categorical
//! conversion so dictionaries reflect the final deduplicated domain.

use std::collections::HashMap;

use chrono::Datelike;

use crate::error::{EtlError, EtlResult};
use crate::report::StageCount;
use crate::types::{Categories, DataType, Table, Value};

/// Column-specific cleaning policy for one dataset.
#[derive(Debug, Clone)]
pub struct CleaningPolicy {
    /// Continuous numeric (Float64) columns whose nulls take the column median.
    pub median_impute: Vec<String>,
    /// Key identifier column; rows with a null key are dropped.
    pub key_column: String,
    /// Text columns whose nulls take the column mode.
    pub mode_impute: Vec<String>,
    /// Low-cardinality text columns converted to categorical codes.
    pub categorical: Vec<String>,
}

/// A cleaned table plus per-stage row counts for the verification record.
#[derive(Debug, Clone)]
pub struct CleanOutcome {
    /// The cleaned table.
    pub table: Table,
    /// Row counts observed after each stage, in execution order.
    pub stages: Vec<StageCount>,
}

/// Apply the canonical cleaning policy to `table`.
pub fn clean(table: &Table, policy: &CleaningPolicy) -> EtlResult<CleanOutcome> {
    let mut stages = vec![StageCount::new("raw", table.row_count())];

    let mut out = table.clone();
    for column in &policy.median_impute {
        let m = median(&out, column)?;
        out = fill_null_with(&out, column, Value::Float64(m))?;
    }

    out = drop_null_keys(&out, &policy.key_column)?;
    stages.push(StageCount::new("null_keys_dropped", out.row_count()));

    for column in &policy.mode_impute {
        let m = mode(&out, column)?;
        out = fill_null_with(&out, column, Value::Utf8(m))?;
    }

    out = drop_duplicates(&out);
    stages.push(StageCount::new("deduplicated", out.row_count()));

    for column in &policy.categorical {
        out = to_categorical(&out, column)?;
    }
    stages.push(StageCount::new("cleaned", out.row_count()));

    Ok(CleanOutcome { table: out, stages })
}

/// Median over the non-null values of a Float64 column.
///
/// An even value count takes the mean of the two middle values. A column with
/// no non-null values is an [`EtlError::EmptyAggregation`].
pub fn median(table: &Table, column: &str) -> EtlResult<f64> {
    let idx = column_of_type(table, column, "Float64")?;
    let mut values: Vec<f64> = table
        .rows
        .iter()
        .filter_map(|row| match &row[idx] {
            Value::Float64(v) => Some(*v),
            _ => None,
        })
        .collect();
    if values.is_empty() {
        return Err(EtlError::EmptyAggregation {
            column: column.to_owned(),
            statistic: "median".to_owned(),
        });
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    Ok(if values.len() % 2 == 1 {
        values[mid]
    } else {
        (values[mid - 1] + values[mid]) / 2.0
    })
}

/// Mode (most frequent non-null value) of a Utf8 column.
///
/// Ties are broken by first-encountered value in scan order. A column with no
/// non-null values is an [`EtlError::EmptyAggregation`].
pub fn mode(table: &Table, column: &str) -> EtlResult<String> {
    let idx = column_of_type(table, column, "Utf8")?;
    let mut counts: HashMap<&str, (usize, usize)> = HashMap::new();
    for (row_idx, row) in table.rows.iter().enumerate() {
        if let Value::Utf8(s) = &row[idx] {
            let entry = counts.entry(s.as_str()).or_insert((0, row_idx));
            entry.0 += 1;
        }
    }
    counts
        .into_iter()
        .max_by(|a, b| a.1.0.cmp(&b.1.0).then(b.1.1.cmp(&a.1.1)))
        .map(|(label, _)| label.to_owned())
        .ok_or_else(|| EtlError::EmptyAggregation {
            column: column.to_owned(),
            statistic: "mode".to_owned(),
        })
}

/// Replace nulls in `column` with `fill`, leaving other cells untouched.
pub fn fill_null_with(table: &Table, column: &str, fill: Value) -> EtlResult<Table> {
    let idx = table
        .schema
        .index_of(column)
        .ok_or_else(|| missing_column(column))?;
    let rows = table
        .rows
        .iter()
        .map(|row| {
            let mut out = row.clone();
            if out[idx].is_null() {
                out[idx] = fill.clone();
            }
            out
        })
        .collect();
    Ok(Table::new(table.schema.clone(), rows))
}

/// Drop rows whose key column is null.
pub fn drop_null_keys(table: &Table, key_column: &str) -> EtlResult<Table> {
    let idx = table
        .schema
        .index_of(key_column)
        .ok_or_else(|| missing_column(key_column))?;
    Ok(table.filter_rows(|row| !row[idx].is_null()))
}

/// Remove exact duplicate rows (all columns equal), keeping first occurrence.
///
/// Idempotent: applying it twice yields the same table as applying it once.
pub fn drop_duplicates(table: &Table) -> Table {
    let mut seen = std::collections::HashSet::new();
    let rows = table
        .rows
        .iter()
        .filter(|row| seen.insert(row_fingerprint(row)))
        .cloned()
        .collect();
    Table::new(table.schema.clone(), rows)
}

/// Convert a Utf8 column to a categorical column.
///
/// The dictionary lists distinct values in order of first appearance; cells
/// become codes and nulls stay null.
pub fn to_categorical(table: &Table, column: &str) -> EtlResult<Table> {
    let idx = column_of_type(table, column, "Utf8")?;

    let mut cats = Categories::default();
    let mut rows = table.rows.clone();
    for row in &mut rows {
        if let Value::Utf8(s) = &row[idx] {
            let code = cats.code_or_insert(s);
            row[idx] = Value::Code(code);
        }
    }

    let mut schema = table.schema.clone();
    schema.fields[idx].data_type = DataType::Categorical(cats);
    Ok(Table::new(schema, rows))
}

fn column_of_type(table: &Table, column: &str, expected: &str) -> EtlResult<usize> {
    let idx = table
        .schema
        .index_of(column)
        .ok_or_else(|| missing_column(column))?;
    let actual = table.schema.fields[idx].data_type.name();
    if actual != expected {
        return Err(EtlError::SchemaMismatch {
            message: format!("column '{column}' is {actual}, expected {expected}"),
        });
    }
    Ok(idx)
}

fn missing_column(column: &str) -> EtlError {
    EtlError::SchemaMismatch {
        message: format!("no such column '{column}'"),
    }
}

// Hashable stand-in for a row; f64 cells compare by bit pattern, which is
// exact for values that round-tripped through the same parse.
#[derive(Hash, PartialEq, Eq)]
enum FingerprintPart {
    Null,
    I(i64),
    F(u64),
    S(String),
    D(i32),
    C(u32),
}

fn row_fingerprint(row: &[Value]) -> Vec<FingerprintPart> {
    row.iter()
        .map(|v| match v {
            Value::Null => FingerprintPart::Null,
            Value::Int64(i) => FingerprintPart::I(*i),
            Value::Float64(f) => FingerprintPart::F(f.to_bits()),
            Value::Utf8(s) => FingerprintPart::S(s.clone()),
            Value::Date(d) => FingerprintPart::D(d.num_days_from_ce()),
            Value::Code(c) => FingerprintPart::C(*c),
        })
        .collect()
}
