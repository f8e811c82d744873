//! Writing tables and verification records to the output directory.
//!
//! CSV output never includes a synthetic row-index column; reloading a
//! written table must yield the same columns that were written. The JSON
//! verification record exists purely for external automated validation of a
//! pipeline run and is not derived data.

use std::fs::File;
use std::path::Path;

use serde::Serialize;

use crate::error::EtlResult;
use crate::types::{DataType, Table, Value};

/// Write a [`Table`] to a CSV file.
///
/// Dates are written as ISO-8601, categorical cells are decoded to their
/// labels, and nulls become empty fields. No index column is emitted.
pub fn write_csv(table: &Table, path: impl AsRef<Path>) -> EtlResult<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record(table.schema.field_names())?;

    for row in &table.rows {
        let record: Vec<String> = row
            .iter()
            .zip(table.schema.fields.iter())
            .map(|(value, field)| render_cell(value, &field.data_type))
            .collect();
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    Ok(())
}

fn render_cell(value: &Value, data_type: &DataType) -> String {
    match (value, data_type) {
        (Value::Null, _) => String::new(),
        (Value::Int64(v), _) => v.to_string(),
        (Value::Float64(v), _) => v.to_string(),
        (Value::Utf8(s), _) => s.clone(),
        (Value::Date(d), _) => d.format("%Y-%m-%d").to_string(),
        (Value::Code(code), DataType::Categorical(cats)) => {
            cats.label(*code).unwrap_or_default().to_owned()
        }
        // A code outside a categorical column violates the table invariant;
        // degrade to empty rather than panic in a batch writer.
        (Value::Code(_), _) => String::new(),
    }
}

/// Row count observed after one pipeline stage.
#[derive(Debug, Clone, Serialize)]
pub struct StageCount {
    /// Stage name, e.g. `null_keys_dropped`.
    pub stage: String,
    /// Rows in the table after the stage ran.
    pub rows: usize,
}

impl StageCount {
    /// Create a stage count.
    pub fn new(stage: impl Into<String>, rows: usize) -> Self {
        Self {
            stage: stage.into(),
            rows,
        }
    }
}

/// Existence check for one output artifact.
#[derive(Debug, Clone, Serialize)]
pub struct ArtifactCheck {
    /// Artifact file name.
    pub name: String,
    /// Whether the file exists on disk at record time.
    pub exists: bool,
}

impl ArtifactCheck {
    /// Record whether `path` exists, naming the artifact by file name.
    pub fn for_path(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        Self {
            name: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string()),
            exists: path.exists(),
        }
    }
}

/// A dtype/shape assertion relevant to the run, e.g. "the key column kept its
/// nullable-integer type end to end".
#[derive(Debug, Clone, Serialize)]
pub struct DtypeCheck {
    /// Column the check applies to.
    pub column: String,
    /// Observed dtype name.
    pub dtype: String,
}

impl DtypeCheck {
    /// Record the observed dtype of `column` in `table` ("missing" if absent).
    pub fn observed(table: &Table, column: &str) -> Self {
        Self {
            column: column.to_owned(),
            dtype: table
                .schema
                .field(column)
                .map(|f| f.data_type.name().to_owned())
                .unwrap_or_else(|| "missing".to_owned()),
        }
    }
}

/// Verification record emitted alongside each pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct Verification {
    /// Pipeline name, e.g. `clean_sales`.
    pub pipeline: String,
    /// Row counts before/after each major stage, in execution order.
    pub stage_rows: Vec<StageCount>,
    /// Existence booleans for generated files.
    pub artifacts: Vec<ArtifactCheck>,
    /// Dtype assertions relevant to the run.
    pub dtypes: Vec<DtypeCheck>,
}

impl Verification {
    /// Create an empty verification record for `pipeline`.
    pub fn new(pipeline: impl Into<String>) -> Self {
        Self {
            pipeline: pipeline.into(),
            stage_rows: Vec::new(),
            artifacts: Vec::new(),
            dtypes: Vec::new(),
        }
    }

    /// Serialize the record as pretty-printed JSON at `path`.
    pub fn write(&self, path: impl AsRef<Path>) -> EtlResult<()> {
        let file = File::create(path)?;
        serde_json::to_writer_pretty(file, self)?;
        Ok(())
    }
}
