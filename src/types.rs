//! Core data model types.
//!
//! The pipeline operates on an in-memory [`Table`]: ordered rows over a fixed,
//! typed column set described by a [`Schema`]. Column access goes through the
//! schema (validated once per table), never free-form per-row string lookup.

use chrono::NaiveDate;

use crate::error::{EtlError, EtlResult};

/// Logical data type for a schema field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataType {
    /// 64-bit signed integer (nullable: cells may be [`Value::Null`]).
    Int64,
    /// 64-bit floating point number.
    Float64,
    /// UTF-8 string.
    Utf8,
    /// Calendar date (no time component).
    Date,
    /// Low-cardinality string column stored as codes into a dictionary.
    Categorical(Categories),
}

impl DataType {
    /// Short human-readable name used in errors and verification records.
    pub fn name(&self) -> &'static str {
        match self {
            DataType::Int64 => "Int64",
            DataType::Float64 => "Float64",
            DataType::Utf8 => "Utf8",
            DataType::Date => "Date",
            DataType::Categorical(_) => "Categorical",
        }
    }
}

/// Dictionary backing a [`DataType::Categorical`] column.
///
/// Labels are stored in order of first appearance; a cell holds a
/// [`Value::Code`] indexing into this list. Equality between two categorical
/// columns is by label, not by code assignment, so cross-table comparisons
/// must decode first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Categories {
    labels: Vec<String>,
}

impl Categories {
    /// Build a dictionary from labels in first-appearance order.
    pub fn new(labels: Vec<String>) -> Self {
        Self { labels }
    }

    /// Code for `label`, if present.
    pub fn code_of(&self, label: &str) -> Option<u32> {
        self.labels.iter().position(|l| l == label).map(|i| i as u32)
    }

    /// Label for `code`, if in range.
    pub fn label(&self, code: u32) -> Option<&str> {
        self.labels.get(code as usize).map(String::as_str)
    }

    /// Code for `label`, inserting it at the end if new.
    pub fn code_or_insert(&mut self, label: &str) -> u32 {
        match self.code_of(label) {
            Some(c) => c,
            None => {
                self.labels.push(label.to_owned());
                (self.labels.len() - 1) as u32
            }
        }
    }

    /// Number of distinct labels.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// True when the dictionary has no labels.
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Iterate labels in code order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().map(String::as_str)
    }
}

/// How parse failures are handled for a field during loading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParseMode {
    /// Values that fail to parse under the declared type become [`Value::Null`].
    #[default]
    Lenient,
    /// Parse failures are errors. Used for key identifier columns where a
    /// silently nulled key would corrupt joins.
    Strict,
}

/// A single named, typed field in a [`Schema`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    /// Field/column name.
    pub name: String,
    /// Field data type.
    pub data_type: DataType,
    /// Parse failure handling during loading.
    pub parse_mode: ParseMode,
}

impl Field {
    /// Create a new lenient field.
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            parse_mode: ParseMode::Lenient,
        }
    }

    /// Create a field whose values must parse cleanly or loading fails.
    pub fn strict(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            parse_mode: ParseMode::Strict,
        }
    }
}

/// An ordered list of fields describing the shape of a [`Table`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    /// Ordered list of fields.
    pub fields: Vec<Field>,
}

impl Schema {
    /// Create a new schema from fields.
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    /// Iterate field names in order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    /// Returns the index of a field by name, if present.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Returns the field by name, if present.
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// A single typed cell in a [`Table`].
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Missing/empty value. Distinct from zero and from the empty string.
    Null,
    /// 64-bit signed integer.
    Int64(i64),
    /// 64-bit float.
    Float64(f64),
    /// UTF-8 string.
    Utf8(String),
    /// Calendar date.
    Date(NaiveDate),
    /// Code into the owning field's [`Categories`] dictionary.
    Code(u32),
}

impl Value {
    /// True for [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Numeric view as f64 for `Int64`/`Float64` cells.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int64(v) => Some(*v as f64),
            Value::Float64(v) => Some(*v),
            _ => None,
        }
    }
}

/// Hashable, ordered view of a cell used as a join or group key.
///
/// Categorical cells are decoded to their label so key equality is by value,
/// never by code assignment. Float columns are not valid keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyValue {
    /// Integer key.
    Int(i64),
    /// String key (Utf8 or decoded categorical).
    Str(String),
    /// Date key.
    Date(NaiveDate),
}

impl KeyValue {
    /// Materialize the key back into a cell value.
    pub fn to_value(&self) -> Value {
        match self {
            KeyValue::Int(v) => Value::Int64(*v),
            KeyValue::Str(s) => Value::Utf8(s.clone()),
            KeyValue::Date(d) => Value::Date(*d),
        }
    }

    /// Render the key as a column-name-friendly label (dates as ISO-8601).
    pub fn render(&self) -> String {
        match self {
            KeyValue::Int(v) => v.to_string(),
            KeyValue::Str(s) => s.clone(),
            KeyValue::Date(d) => d.format("%Y-%m-%d").to_string(),
        }
    }
}

/// In-memory table: a [`Schema`] plus row-major value storage.
///
/// Invariant: every row has exactly one cell per schema field, and every
/// [`Value::Code`] in a column resolves in that field's dictionary.
/// Transformations produce new tables; no stage mutates its input.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    /// Schema describing row shape.
    pub schema: Schema,
    /// Row-major value storage.
    pub rows: Vec<Vec<Value>>,
}

impl Table {
    /// Create a table from schema and rows.
    pub fn new(schema: Schema, rows: Vec<Vec<Value>>) -> Self {
        Self { schema, rows }
    }

    /// Number of rows.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Number of null cells in the named column, or `None` if it is missing.
    pub fn null_count(&self, column: &str) -> Option<usize> {
        let idx = self.schema.index_of(column)?;
        Some(self.rows.iter().filter(|r| r[idx].is_null()).count())
    }

    /// Create a new table containing only rows that match `predicate`.
    pub fn filter_rows<F>(&self, mut predicate: F) -> Self
    where
        F: FnMut(&[Value]) -> bool,
    {
        let rows = self
            .rows
            .iter()
            .filter(|row| predicate(row.as_slice()))
            .cloned()
            .collect();
        Self {
            schema: self.schema.clone(),
            rows,
        }
    }

    /// Decode one cell of the named column to a string label.
    ///
    /// Categorical cells are decoded through the field dictionary; `Utf8`
    /// cells are returned as-is; nulls and other types yield `None`.
    pub fn label_at(&self, row: usize, column: &str) -> Option<&str> {
        let idx = self.schema.index_of(column)?;
        match (&self.schema.fields[idx].data_type, &self.rows[row][idx]) {
            (DataType::Categorical(cats), Value::Code(code)) => cats.label(*code),
            (_, Value::Utf8(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Key view of one column, for join and group-by purposes.
    ///
    /// One entry per row; `None` for null cells (null keys never match and
    /// may be excluded from grouping). Errors when the column is missing or
    /// its type is not a valid key type.
    pub fn key_column(&self, column: &str) -> EtlResult<Vec<Option<KeyValue>>> {
        let idx = self
            .schema
            .index_of(column)
            .ok_or_else(|| EtlError::SchemaMismatch {
                message: format!("no such column '{column}'"),
            })?;
        let field = &self.schema.fields[idx];
        let mut out = Vec::with_capacity(self.rows.len());
        for row in &self.rows {
            let key = match (&field.data_type, &row[idx]) {
                (_, Value::Null) => None,
                (DataType::Int64, Value::Int64(v)) => Some(KeyValue::Int(*v)),
                (DataType::Utf8, Value::Utf8(s)) => Some(KeyValue::Str(s.clone())),
                (DataType::Date, Value::Date(d)) => Some(KeyValue::Date(*d)),
                (DataType::Categorical(cats), Value::Code(code)) => cats
                    .label(*code)
                    .map(|l| KeyValue::Str(l.to_owned())),
                (dt, _) => {
                    return Err(EtlError::SchemaMismatch {
                        message: format!(
                            "column '{column}' ({}) is not a valid key type",
                            dt.name()
                        ),
                    });
                }
            };
            out.push(key);
        }
        Ok(out)
    }

    /// Decode a whole column to labels (`None` per null cell).
    ///
    /// This is the by-value view used for cross-table categorical equality.
    pub fn decode_column(&self, column: &str) -> Option<Vec<Option<String>>> {
        let idx = self.schema.index_of(column)?;
        let field = &self.schema.fields[idx];
        let mut out = Vec::with_capacity(self.rows.len());
        for row in &self.rows {
            let label = match (&field.data_type, &row[idx]) {
                (DataType::Categorical(cats), Value::Code(code)) => {
                    cats.label(*code).map(str::to_owned)
                }
                (_, Value::Utf8(s)) => Some(s.clone()),
                _ => None,
            };
            out.push(label);
        }
        Some(out)
    }
}
