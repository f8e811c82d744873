//! CSV loading implementation.

use std::path::Path;

use chrono::NaiveDate;

use crate::error::{EtlError, EtlResult};
use crate::types::{DataType, ParseMode, Schema, Table, Value};

/// Load a CSV file into an in-memory [`Table`].
///
/// Rules:
///
/// - CSV must have headers.
/// - Headers must contain all schema fields (order can differ).
/// - Each value is parsed according to the schema field type; under
///   [`ParseMode::Lenient`] a cell that fails to parse becomes [`Value::Null`],
///   under [`ParseMode::Strict`] it fails the load with a parse error.
pub fn read_csv_from_path(path: impl AsRef<Path>, schema: &Schema) -> EtlResult<Table> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)?;
    read_csv_from_reader(&mut rdr, schema)
}

/// Load CSV data from an existing CSV reader.
pub fn read_csv_from_reader<R: std::io::Read>(
    rdr: &mut csv::Reader<R>,
    schema: &Schema,
) -> EtlResult<Table> {
    let headers = rdr.headers()?.clone();

    // Map schema fields -> CSV column indexes (allows re-ordered CSV columns).
    let mut col_idxs = Vec::with_capacity(schema.fields.len());
    for field in &schema.fields {
        match headers.iter().position(|h| h == field.name) {
            Some(idx) => col_idxs.push(idx),
            None => {
                return Err(EtlError::SchemaMismatch {
                    message: format!(
                        "missing required column '{field}'. headers={:?}",
                        headers.iter().collect::<Vec<_>>(),
                        field = field.name
                    ),
                });
            }
        }
    }

    let mut rows: Vec<Vec<Value>> = Vec::new();
    for (row_idx0, result) in rdr.records().enumerate() {
        // Report 1-based row number for users; +1 again because header is row 1.
        let user_row = row_idx0 + 2;
        let record = result?;

        let mut row: Vec<Value> = Vec::with_capacity(schema.fields.len());
        for (field, &csv_idx) in schema.fields.iter().zip(col_idxs.iter()) {
            let raw = record.get(csv_idx).unwrap_or("");
            row.push(parse_typed_value(
                user_row,
                &field.name,
                &field.data_type,
                field.parse_mode,
                raw,
            )?);
        }
        rows.push(row);
    }

    Ok(Table::new(schema.clone(), rows))
}

fn parse_typed_value(
    row: usize,
    column: &str,
    data_type: &DataType,
    mode: ParseMode,
    raw: &str,
) -> EtlResult<Value> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(Value::Null);
    }

    let parsed = match data_type {
        DataType::Utf8 => return Ok(Value::Utf8(trimmed.to_owned())),
        DataType::Int64 => trimmed
            .parse::<i64>()
            .map(Value::Int64)
            .map_err(|e| e.to_string()),
        DataType::Float64 => trimmed
            .parse::<f64>()
            .map(Value::Float64)
            .map_err(|e| e.to_string()),
        DataType::Date => NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
            .map(Value::Date)
            .map_err(|e| e.to_string()),
        DataType::Categorical(_) => {
            return Err(EtlError::SchemaMismatch {
                message: format!(
                    "column '{column}' declared categorical at load time; load as Utf8 and convert after cleaning"
                ),
            });
        }
    };

    match (parsed, mode) {
        (Ok(value), _) => Ok(value),
        (Err(_), ParseMode::Lenient) => Ok(Value::Null),
        (Err(message), ParseMode::Strict) => Err(EtlError::ParseError {
            row,
            column: column.to_owned(),
            raw: raw.to_owned(),
            message,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::read_csv_from_reader;
    use crate::types::{DataType, Field, Schema, Value};
    use chrono::NaiveDate;

    fn reader(input: &str) -> csv::Reader<&[u8]> {
        csv::ReaderBuilder::new()
            .has_headers(true)
            .from_reader(input.as_bytes())
    }

    #[test]
    fn lenient_numeric_parse_failures_become_null() {
        let schema = Schema::new(vec![
            Field::new("id", DataType::Int64),
            Field::new("amount", DataType::Float64),
        ]);
        let input = "id,amount\n1,not_a_number\n2,12.5\n";
        let table = read_csv_from_reader(&mut reader(input), &schema).unwrap();
        assert_eq!(table.rows[0], vec![Value::Int64(1), Value::Null]);
        assert_eq!(table.rows[1], vec![Value::Int64(2), Value::Float64(12.5)]);
    }

    #[test]
    fn strict_key_parse_failure_is_an_error() {
        let schema = Schema::new(vec![Field::strict("customer_id", DataType::Int64)]);
        let input = "customer_id\nabc\n";
        let err = read_csv_from_reader(&mut reader(input), &schema).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("failed to parse value"));
        assert!(msg.contains("column 'customer_id'"));
    }

    #[test]
    fn strict_empty_cell_is_still_null() {
        // Strictness is about malformed values; an absent value is a valid null.
        let schema = Schema::new(vec![
            Field::strict("customer_id", DataType::Int64),
            Field::new("name", DataType::Utf8),
        ]);
        let input = "customer_id,name\n,Alice\n7,Bob\n";
        let table = read_csv_from_reader(&mut reader(input), &schema).unwrap();
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.rows[0][0], Value::Null);
        assert_eq!(table.rows[1][0], Value::Int64(7));
    }

    #[test]
    fn dates_parse_as_iso_8601() {
        let schema = Schema::new(vec![Field::new("order_date", DataType::Date)]);
        let input = "order_date\n2024-01-05\nnot_a_date\n";
        let table = read_csv_from_reader(&mut reader(input), &schema).unwrap();
        assert_eq!(
            table.rows[0][0],
            Value::Date(NaiveDate::from_ymd_opt(2024, 1, 5).unwrap())
        );
        assert_eq!(table.rows[1][0], Value::Null);
    }
}
