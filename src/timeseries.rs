//! Calendar resampling and rolling window statistics.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};

use crate::error::{EtlError, EtlResult};
use crate::types::{DataType, Field, Schema, Table, Value};

/// Bucket a table by calendar month of `date_column` and sum `value_column`
/// per month.
///
/// Output has one row per observed month, ascending, with the month
/// represented as its first day under a `month` column. Rows with a null date
/// are excluded; null values are ignored by the sum. Months with no
/// observations are not fabricated.
pub fn resample_monthly(table: &Table, date_column: &str, value_column: &str) -> EtlResult<Table> {
    let date_idx = column_of(table, date_column, &DataType::Date)?;
    let value_idx = column_of(table, value_column, &DataType::Float64)?;

    let mut buckets: BTreeMap<(i32, u32), f64> = BTreeMap::new();
    for row in &table.rows {
        let Value::Date(d) = &row[date_idx] else {
            continue;
        };
        let sum = buckets.entry((d.year(), d.month())).or_insert(0.0);
        if let Value::Float64(v) = &row[value_idx] {
            *sum += v;
        }
    }

    let schema = Schema::new(vec![
        Field::new("month", DataType::Date),
        Field::new(value_column, DataType::Float64),
    ]);
    let rows = buckets
        .into_iter()
        .map(|((year, month), sum)| {
            // First of the month is always a valid date.
            let first = NaiveDate::from_ymd_opt(year, month, 1).expect("valid month start");
            vec![Value::Date(first), Value::Float64(sum)]
        })
        .collect();

    Ok(Table::new(schema, rows))
}

/// Rolling mean over a numeric series.
///
/// The first `window - 1` positions are [`Value::Null`] (the window has not
/// filled); a window containing any null also yields null.
pub fn rolling_mean(series: &[Value], window: usize) -> Vec<Value> {
    assert!(window > 0, "window must be > 0");
    let mut out = Vec::with_capacity(series.len());
    for idx in 0..series.len() {
        if idx + 1 < window {
            out.push(Value::Null);
            continue;
        }
        let values: Option<Vec<f64>> = series[idx + 1 - window..=idx]
            .iter()
            .map(Value::as_f64)
            .collect();
        out.push(match values {
            Some(vs) => Value::Float64(vs.iter().sum::<f64>() / window as f64),
            None => Value::Null,
        });
    }
    out
}

/// Append a rolling-mean column computed over `value_column` to a
/// month-ordered table (as produced by [`resample_monthly`]).
pub fn with_rolling_mean(
    table: &Table,
    value_column: &str,
    window: usize,
    output_column: &str,
) -> EtlResult<Table> {
    let value_idx = column_of(table, value_column, &DataType::Float64)?;
    let series: Vec<Value> = table.rows.iter().map(|r| r[value_idx].clone()).collect();
    let means = rolling_mean(&series, window);

    let mut schema = table.schema.clone();
    schema
        .fields
        .push(Field::new(output_column, DataType::Float64));
    let rows = table
        .rows
        .iter()
        .zip(means)
        .map(|(row, mean)| {
            let mut out = row.clone();
            out.push(mean);
            out
        })
        .collect();
    Ok(Table::new(schema, rows))
}

fn column_of(table: &Table, column: &str, expected: &DataType) -> EtlResult<usize> {
    let idx = table
        .schema
        .index_of(column)
        .ok_or_else(|| EtlError::SchemaMismatch {
            message: format!("no such column '{column}'"),
        })?;
    let actual = &table.schema.fields[idx].data_type;
    if actual != expected {
        return Err(EtlError::SchemaMismatch {
            message: format!(
                "column '{column}' is {}, expected {}",
                actual.name(),
                expected.name()
            ),
        });
    }
    Ok(idx)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn orders() -> Table {
        let schema = Schema::new(vec![
            Field::new("order_date", DataType::Date),
            Field::new("amount", DataType::Float64),
        ]);
        Table::new(
            schema,
            vec![
                vec![Value::Date(ymd(2024, 2, 10)), Value::Float64(20.0)],
                vec![Value::Date(ymd(2024, 1, 5)), Value::Float64(10.0)],
                vec![Value::Date(ymd(2024, 1, 28)), Value::Float64(5.0)],
                vec![Value::Null, Value::Float64(99.0)],
                vec![Value::Date(ymd(2024, 3, 1)), Value::Null],
            ],
        )
    }

    #[test]
    fn resample_buckets_by_month_ascending() {
        let out = resample_monthly(&orders(), "order_date", "amount").unwrap();
        assert_eq!(out.row_count(), 3);
        assert_eq!(
            out.rows[0],
            vec![Value::Date(ymd(2024, 1, 1)), Value::Float64(15.0)]
        );
        assert_eq!(
            out.rows[1],
            vec![Value::Date(ymd(2024, 2, 1)), Value::Float64(20.0)]
        );
        // Null amount still registers the month, summing to zero.
        assert_eq!(
            out.rows[2],
            vec![Value::Date(ymd(2024, 3, 1)), Value::Float64(0.0)]
        );
    }

    #[test]
    fn rolling_mean_is_null_until_window_fills() {
        let series = vec![
            Value::Float64(10.0),
            Value::Float64(20.0),
            Value::Float64(30.0),
            Value::Float64(40.0),
        ];
        let out = rolling_mean(&series, 3);
        assert_eq!(
            out,
            vec![
                Value::Null,
                Value::Null,
                Value::Float64(20.0),
                Value::Float64(30.0)
            ]
        );
    }

    #[test]
    fn rolling_mean_propagates_nulls_in_window() {
        let series = vec![Value::Float64(1.0), Value::Null, Value::Float64(3.0)];
        assert_eq!(
            rolling_mean(&series, 2),
            vec![Value::Null, Value::Null, Value::Null]
        );
    }

    #[test]
    fn with_rolling_mean_appends_a_column() {
        let monthly = resample_monthly(&orders(), "order_date", "amount").unwrap();
        let out = with_rolling_mean(&monthly, "amount", 3, "rolling_mean_3m").unwrap();
        assert_eq!(
            out.schema.field_names().collect::<Vec<_>>(),
            vec!["month", "amount", "rolling_mean_3m"]
        );
        assert_eq!(out.rows[2][2], Value::Float64(35.0 / 3.0));
    }
}
