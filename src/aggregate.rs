//! Group-by aggregation and pivot reshaping.
//!
//! Grouping may visit rows in any order internally, but the output is always
//! sorted ascending by group-key values (secondary keys in listed order) so
//! repeated runs are byte-reproducible.

use std::collections::HashMap;

use crate::error::{EtlError, EtlResult};
use crate::types::{DataType, Field, KeyValue, Schema, Table, Value};

/// Supported per-group reductions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggFn {
    /// Sum of non-null numeric values; zero of the source type when a group
    /// has no non-null values.
    Sum,
    /// Count of non-null values.
    Count,
}

/// One (source column, reduction, output column name) request.
#[derive(Debug, Clone)]
pub struct AggSpec {
    /// Column the reduction reads.
    pub column: String,
    /// Reduction to apply.
    pub func: AggFn,
    /// Name of the reduced column in the output.
    pub output: String,
}

impl AggSpec {
    /// Create an aggregation spec.
    pub fn new(
        column: impl Into<String>,
        func: AggFn,
        output: impl Into<String>,
    ) -> Self {
        Self {
            column: column.into(),
            func,
            output: output.into(),
        }
    }
}

/// Policy for rows whose group key is null.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NullKeys {
    /// Rows with any null group key are excluded from the output.
    #[default]
    Exclude,
    /// Null keys form their own group, sorted after all non-null keys.
    Keep,
}

/// Group `table` by `group_columns` and compute one reduced row per distinct
/// key combination.
///
/// Categorical group columns are decoded to plain strings in the output, so
/// downstream consumers compare by value. Output rows are sorted ascending by
/// group-key values.
pub fn group_by(
    table: &Table,
    group_columns: &[&str],
    aggs: &[AggSpec],
    null_keys: NullKeys,
) -> EtlResult<Table> {
    let key_cols: Vec<Vec<Option<KeyValue>>> = group_columns
        .iter()
        .map(|c| table.key_column(c))
        .collect::<EtlResult<_>>()?;

    let mut groups: HashMap<Vec<Option<KeyValue>>, Vec<usize>> = HashMap::new();
    'rows: for row_idx in 0..table.row_count() {
        let mut key = Vec::with_capacity(key_cols.len());
        for col in &key_cols {
            let part = col[row_idx].clone();
            if part.is_none() && null_keys == NullKeys::Exclude {
                continue 'rows;
            }
            key.push(part);
        }
        groups.entry(key).or_default().push(row_idx);
    }

    let mut keys: Vec<&Vec<Option<KeyValue>>> = groups.keys().collect();
    keys.sort_by(|a, b| cmp_keys(a.as_slice(), b.as_slice()));

    let schema = grouped_schema(table, group_columns, aggs)?;
    let mut rows = Vec::with_capacity(keys.len());
    for key in keys {
        let row_idxs = &groups[key];
        let mut row: Vec<Value> = key
            .iter()
            .map(|k| k.as_ref().map(KeyValue::to_value).unwrap_or(Value::Null))
            .collect();
        for agg in aggs {
            row.push(reduce_rows(table, row_idxs, agg)?);
        }
        rows.push(row);
    }

    Ok(Table::new(schema, rows))
}

/// Pivot `table` from long to wide form.
///
/// One output row per distinct `row_key` value, one output column per
/// distinct `col_key` value (both ascending); each cell is `func` over the
/// `value` column of the matching (row-key, col-key) subset. Cells with no
/// matching rows take `fill` (commonly zero), never null, so downstream
/// numeric operations stay total. Rows with a null row or column key are
/// excluded.
pub fn pivot(
    table: &Table,
    row_key: &str,
    col_key: &str,
    value: &str,
    func: AggFn,
    fill: Value,
) -> EtlResult<Table> {
    let row_keys = table.key_column(row_key)?;
    let col_keys = table.key_column(col_key)?;

    let mut cells: HashMap<(&KeyValue, &KeyValue), Vec<usize>> = HashMap::new();
    for idx in 0..table.row_count() {
        if let (Some(r), Some(c)) = (&row_keys[idx], &col_keys[idx]) {
            cells.entry((r, c)).or_default().push(idx);
        }
    }

    let distinct_rows: Vec<&KeyValue> = dedup_sorted(row_keys.iter().flatten());
    let distinct_cols: Vec<&KeyValue> = dedup_sorted(col_keys.iter().flatten());

    let value_type = numeric_column_type(table, value)?;
    let mut fields = vec![key_output_field(table, row_key)?];
    for c in &distinct_cols {
        fields.push(Field::new(c.render(), value_type.clone()));
    }
    let schema = Schema::new(fields);

    let mut rows = Vec::with_capacity(distinct_rows.len());
    for r in &distinct_rows {
        let mut row = vec![r.to_value()];
        for c in &distinct_cols {
            let cell = match cells.get(&(*r, *c)) {
                Some(idxs) => reduce_rows(
                    table,
                    idxs,
                    &AggSpec::new(value, func, value),
                )?,
                None => fill.clone(),
            };
            row.push(cell);
        }
        rows.push(row);
    }

    Ok(Table::new(schema, rows))
}

/// Reverse a [`pivot`]: melt a wide table back to long form.
///
/// Every column except `id_column` becomes one long row per wide row, with
/// the former column name under `var_name` and the cell under `value_name`.
pub fn melt(wide: &Table, id_column: &str, var_name: &str, value_name: &str) -> EtlResult<Table> {
    let id_idx = wide
        .schema
        .index_of(id_column)
        .ok_or_else(|| EtlError::SchemaMismatch {
            message: format!("no such column '{id_column}'"),
        })?;

    let value_type = wide
        .schema
        .fields
        .iter()
        .enumerate()
        .find(|(i, _)| *i != id_idx)
        .map(|(_, f)| f.data_type.clone())
        .unwrap_or(DataType::Float64);

    let schema = Schema::new(vec![
        wide.schema.fields[id_idx].clone(),
        Field::new(var_name, DataType::Utf8),
        Field::new(value_name, value_type),
    ]);

    let mut rows = Vec::new();
    for row in &wide.rows {
        for (idx, field) in wide.schema.fields.iter().enumerate() {
            if idx == id_idx {
                continue;
            }
            rows.push(vec![
                row[id_idx].clone(),
                Value::Utf8(field.name.clone()),
                row[idx].clone(),
            ]);
        }
    }

    Ok(Table::new(schema, rows))
}

// Ascending with nulls last; secondary keys in listed order.
fn cmp_keys(a: &[Option<KeyValue>], b: &[Option<KeyValue>]) -> std::cmp::Ordering {
    for (x, y) in a.iter().zip(b.iter()) {
        let ord = match (x, y) {
            (Some(x), Some(y)) => x.cmp(y),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        };
        if ord != std::cmp::Ordering::Equal {
            return ord;
        }
    }
    std::cmp::Ordering::Equal
}

fn dedup_sorted<'a>(keys: impl Iterator<Item = &'a KeyValue>) -> Vec<&'a KeyValue> {
    let mut out: Vec<&KeyValue> = Vec::new();
    for k in keys {
        if !out.contains(&k) {
            out.push(k);
        }
    }
    out.sort();
    out
}

fn grouped_schema(table: &Table, group_columns: &[&str], aggs: &[AggSpec]) -> EtlResult<Schema> {
    let mut fields = Vec::with_capacity(group_columns.len() + aggs.len());
    for col in group_columns {
        fields.push(key_output_field(table, col)?);
    }
    for agg in aggs {
        let dt = match agg.func {
            AggFn::Count => DataType::Int64,
            AggFn::Sum => numeric_column_type(table, &agg.column)?,
        };
        fields.push(Field::new(agg.output.clone(), dt));
    }
    Ok(Schema::new(fields))
}

// Group/pivot key columns come out as their by-value type: categorical
// decodes to Utf8, everything else keeps its type.
fn key_output_field(table: &Table, column: &str) -> EtlResult<Field> {
    let field = table
        .schema
        .field(column)
        .ok_or_else(|| EtlError::SchemaMismatch {
            message: format!("no such column '{column}'"),
        })?;
    let dt = match &field.data_type {
        DataType::Categorical(_) => DataType::Utf8,
        other => other.clone(),
    };
    Ok(Field::new(field.name.clone(), dt))
}

fn numeric_column_type(table: &Table, column: &str) -> EtlResult<DataType> {
    match table.schema.field(column).map(|f| &f.data_type) {
        Some(DataType::Int64) => Ok(DataType::Int64),
        Some(DataType::Float64) => Ok(DataType::Float64),
        Some(other) => Err(EtlError::SchemaMismatch {
            message: format!("column '{column}' is {}, expected numeric", other.name()),
        }),
        None => Err(EtlError::SchemaMismatch {
            message: format!("no such column '{column}'"),
        }),
    }
}

fn reduce_rows(table: &Table, row_idxs: &[usize], agg: &AggSpec) -> EtlResult<Value> {
    let idx = table
        .schema
        .index_of(&agg.column)
        .ok_or_else(|| EtlError::SchemaMismatch {
            message: format!("no such column '{}'", agg.column),
        })?;

    match agg.func {
        AggFn::Count => {
            let n = row_idxs
                .iter()
                .filter(|&&r| !table.rows[r][idx].is_null())
                .count();
            Ok(Value::Int64(n as i64))
        }
        AggFn::Sum => match numeric_column_type(table, &agg.column)? {
            DataType::Int64 => {
                let mut acc: i64 = 0;
                for &r in row_idxs {
                    if let Value::Int64(v) = &table.rows[r][idx] {
                        acc += v;
                    }
                }
                Ok(Value::Int64(acc))
            }
            _ => {
                let mut acc: f64 = 0.0;
                for &r in row_idxs {
                    if let Value::Float64(v) = &table.rows[r][idx] {
                        acc += v;
                    }
                }
                Ok(Value::Float64(acc))
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DataType, Field, Schema};

    fn sales() -> Table {
        let schema = Schema::new(vec![
            Field::new("order_id", DataType::Int64),
            Field::new("region", DataType::Utf8),
            Field::new("category", DataType::Utf8),
            Field::new("amount", DataType::Float64),
        ]);
        let row = |id: i64, region: &str, category: &str, amount: Option<f64>| {
            vec![
                Value::Int64(id),
                Value::Utf8(region.into()),
                Value::Utf8(category.into()),
                amount.map(Value::Float64).unwrap_or(Value::Null),
            ]
        };
        Table::new(
            schema,
            vec![
                row(1, "South", "Home", Some(30.0)),
                row(2, "North", "Electronics", Some(100.0)),
                row(3, "North", "Home", Some(50.0)),
                row(4, "South", "Home", None),
                row(5, "North", "Electronics", Some(25.0)),
            ],
        )
    }

    #[test]
    fn group_by_sums_and_counts_sorted_ascending() {
        let out = group_by(
            &sales(),
            &["region"],
            &[
                AggSpec::new("amount", AggFn::Sum, "total_sales"),
                AggSpec::new("order_id", AggFn::Count, "order_count"),
            ],
            NullKeys::Exclude,
        )
        .unwrap();

        assert_eq!(out.row_count(), 2);
        assert_eq!(out.rows[0][0], Value::Utf8("North".into()));
        assert_eq!(out.rows[0][1], Value::Float64(175.0));
        assert_eq!(out.rows[0][2], Value::Int64(3));
        assert_eq!(out.rows[1][0], Value::Utf8("South".into()));
        assert_eq!(out.rows[1][1], Value::Float64(30.0));
        assert_eq!(out.rows[1][2], Value::Int64(2));
    }

    #[test]
    fn count_skips_nulls_sum_ignores_them() {
        let out = group_by(
            &sales(),
            &["region"],
            &[AggSpec::new("amount", AggFn::Count, "n_amounts")],
            NullKeys::Exclude,
        )
        .unwrap();
        // South has one null amount of its two rows.
        assert_eq!(out.rows[1][1], Value::Int64(1));
    }

    #[test]
    fn multi_key_groups_sort_by_secondary_key() {
        let out = group_by(
            &sales(),
            &["region", "category"],
            &[AggSpec::new("amount", AggFn::Sum, "total")],
            NullKeys::Exclude,
        )
        .unwrap();
        let keys: Vec<(String, String)> = out
            .rows
            .iter()
            .map(|r| match (&r[0], &r[1]) {
                (Value::Utf8(a), Value::Utf8(b)) => (a.clone(), b.clone()),
                other => panic!("unexpected key {other:?}"),
            })
            .collect();
        assert_eq!(
            keys,
            vec![
                ("North".into(), "Electronics".into()),
                ("North".into(), "Home".into()),
                ("South".into(), "Home".into()),
            ]
        );
    }

    #[test]
    fn null_group_keys_policy() {
        let mut t = sales();
        t.rows.push(vec![
            Value::Int64(6),
            Value::Null,
            Value::Utf8("Home".into()),
            Value::Float64(7.0),
        ]);

        let excluded = group_by(
            &t,
            &["region"],
            &[AggSpec::new("order_id", AggFn::Count, "n")],
            NullKeys::Exclude,
        )
        .unwrap();
        assert_eq!(excluded.row_count(), 2);
        // Union of kept groups covers every non-null-key row.
        let total: i64 = excluded
            .rows
            .iter()
            .map(|r| match r[1] {
                Value::Int64(n) => n,
                _ => 0,
            })
            .sum();
        assert_eq!(total, 5);

        let kept = group_by(
            &t,
            &["region"],
            &[AggSpec::new("order_id", AggFn::Count, "n")],
            NullKeys::Keep,
        )
        .unwrap();
        assert_eq!(kept.row_count(), 3);
        // Null group sorts last.
        assert_eq!(kept.rows[2][0], Value::Null);
        assert_eq!(kept.rows[2][1], Value::Int64(1));
    }

    #[test]
    fn sum_over_all_null_group_is_zero_of_source_type() {
        let schema = Schema::new(vec![
            Field::new("k", DataType::Utf8),
            Field::new("v", DataType::Float64),
        ]);
        let t = Table::new(
            schema,
            vec![vec![Value::Utf8("a".into()), Value::Null]],
        );
        let out = group_by(
            &t,
            &["k"],
            &[AggSpec::new("v", AggFn::Sum, "total")],
            NullKeys::Exclude,
        )
        .unwrap();
        assert_eq!(out.rows[0][1], Value::Float64(0.0));
    }

    #[test]
    fn pivot_fills_empty_cells_and_sorts_both_axes() {
        let out = pivot(
            &sales(),
            "region",
            "category",
            "amount",
            AggFn::Sum,
            Value::Float64(0.0),
        )
        .unwrap();

        assert_eq!(
            out.schema.field_names().collect::<Vec<_>>(),
            vec!["region", "Electronics", "Home"]
        );
        assert_eq!(out.rows[0][0], Value::Utf8("North".into()));
        assert_eq!(out.rows[0][1], Value::Float64(125.0));
        assert_eq!(out.rows[0][2], Value::Float64(50.0));
        assert_eq!(out.rows[1][0], Value::Utf8("South".into()));
        // South sold no electronics: fill, not null.
        assert_eq!(out.rows[1][1], Value::Float64(0.0));
        assert_eq!(out.rows[1][2], Value::Float64(30.0));
    }

    #[test]
    fn melt_recovers_pivoted_aggregates() {
        let wide = pivot(
            &sales(),
            "region",
            "category",
            "amount",
            AggFn::Sum,
            Value::Float64(0.0),
        )
        .unwrap();
        let long = melt(&wide, "region", "category", "amount").unwrap();

        assert_eq!(long.row_count(), 4);
        assert_eq!(
            long.schema.field_names().collect::<Vec<_>>(),
            vec!["region", "category", "amount"]
        );
        // North/Electronics aggregate survives the round trip.
        assert_eq!(
            long.rows[0],
            vec![
                Value::Utf8("North".into()),
                Value::Utf8("Electronics".into()),
                Value::Float64(125.0)
            ]
        );
    }
}
