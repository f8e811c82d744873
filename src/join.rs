//! Relational joins between two [`Table`]s on a shared key column.
//!
//! Semantics:
//!
//! - `Inner`: only rows whose key appears in both tables.
//! - `Left`: every left row; unmatched rows get null right-side cells.
//! - Null keys never match (null != null for join purposes).
//! - A key repeated in the right table expands each matching left row once
//!   per right match; the expansion is preserved, never deduplicated.
//! - The key column appears once in the output; other column-name collisions
//!   are disambiguated by suffixing both sides.

use std::collections::HashMap;

use crate::error::{EtlError, EtlResult};
use crate::types::{DataType, Field, KeyValue, Schema, Table, Value};

/// Join mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    /// Keep only rows whose key matches in both tables.
    Inner,
    /// Keep every left row; fill unmatched right columns with null.
    Left,
}

/// Join `left` and `right` on `key` with the default `_left`/`_right`
/// collision suffixes.
pub fn join(left: &Table, right: &Table, key: &str, kind: JoinKind) -> EtlResult<Table> {
    join_with_suffixes(left, right, key, kind, ("_left", "_right"))
}

/// Join with caller-chosen collision suffixes (e.g. `("_sales", "_cust")`).
pub fn join_with_suffixes(
    left: &Table,
    right: &Table,
    key: &str,
    kind: JoinKind,
    suffixes: (&str, &str),
) -> EtlResult<Table> {
    let key_idx_right = check_key_types(left, right, key)?;
    let left_keys = left.key_column(key)?;
    let right_keys = right.key_column(key)?;

    // Right-side key -> row indexes, preserving right row order per key.
    let mut right_index: HashMap<&KeyValue, Vec<usize>> = HashMap::new();
    for (idx, k) in right_keys.iter().enumerate() {
        if let Some(k) = k {
            right_index.entry(k).or_default().push(idx);
        }
    }

    let schema = joined_schema(left, right, key, suffixes);

    let mut rows = Vec::new();
    for (left_idx, left_key) in left_keys.iter().enumerate() {
        let matches = left_key
            .as_ref()
            .and_then(|k| right_index.get(k))
            .map(Vec::as_slice)
            .unwrap_or(&[]);

        match (kind, matches.is_empty()) {
            (JoinKind::Inner, true) => {}
            (JoinKind::Left, true) => {
                let mut row = left.rows[left_idx].clone();
                row.extend(
                    (0..right.schema.fields.len())
                        .filter(|&i| i != key_idx_right)
                        .map(|_| Value::Null),
                );
                rows.push(row);
            }
            (_, false) => {
                for &right_idx in matches {
                    let mut row = left.rows[left_idx].clone();
                    row.extend(
                        right.rows[right_idx]
                            .iter()
                            .enumerate()
                            .filter(|(i, _)| *i != key_idx_right)
                            .map(|(_, v)| v.clone()),
                    );
                    rows.push(row);
                }
            }
        }
    }

    Ok(Table::new(schema, rows))
}

// Key kind as used for matching: categorical joins by label, so it shares a
// kind with Utf8.
fn key_kind(dt: &DataType) -> Option<&'static str> {
    match dt {
        DataType::Int64 => Some("integer"),
        DataType::Utf8 | DataType::Categorical(_) => Some("string"),
        DataType::Date => Some("date"),
        DataType::Float64 => None,
    }
}

// Validates both key columns and returns the key's index in the right table.
fn check_key_types(left: &Table, right: &Table, key: &str) -> EtlResult<usize> {
    let missing = |side: &str| EtlError::SchemaMismatch {
        message: format!("join key '{key}' missing from {side} table"),
    };
    let lf = left.schema.field(key).ok_or_else(|| missing("left"))?;
    let right_idx = right.schema.index_of(key).ok_or_else(|| missing("right"))?;
    let rf = &right.schema.fields[right_idx];

    match (key_kind(&lf.data_type), key_kind(&rf.data_type)) {
        (Some(l), Some(r)) if l == r => Ok(right_idx),
        _ => Err(EtlError::JoinKeyType {
            column: key.to_owned(),
            left: lf.data_type.name().to_owned(),
            right: rf.data_type.name().to_owned(),
        }),
    }
}

fn joined_schema(left: &Table, right: &Table, key: &str, suffixes: (&str, &str)) -> Schema {
    let right_names: Vec<&str> = right
        .schema
        .fields
        .iter()
        .filter(|f| f.name != key)
        .map(|f| f.name.as_str())
        .collect();

    let mut fields: Vec<Field> = Vec::new();
    for f in &left.schema.fields {
        let mut out = f.clone();
        if f.name != key && right_names.contains(&f.name.as_str()) {
            out.name = format!("{}{}", f.name, suffixes.0);
        }
        fields.push(out);
    }
    for f in &right.schema.fields {
        if f.name == key {
            continue;
        }
        let mut out = f.clone();
        if left.schema.index_of(&f.name).is_some() {
            out.name = format!("{}{}", f.name, suffixes.1);
        }
        fields.push(out);
    }
    Schema::new(fields)
}
