//! Observer hooks for pipeline runs.
//!
//! Pipelines report stage completions, written artifacts, and failures to an
//! optional [`PipelineObserver`]. Implementors can record metrics, logs, or
//! trigger alerts; the built-ins log to stderr or append to a local file.

use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::EtlError;

/// Severity classification used for observer callbacks and alerting thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Informational event.
    Info,
    /// Warning-level event (non-fatal).
    Warning,
    /// Error-level event (stage failed).
    Error,
    /// Critical error (typically I/O or other infrastructure failures).
    Critical,
}

/// Severity assigned to an error when reporting it to observers.
pub fn severity_for_error(e: &EtlError) -> Severity {
    match e {
        EtlError::Io(_) => Severity::Critical,
        EtlError::Csv(err) => match err.kind() {
            csv::ErrorKind::Io(_) => Severity::Critical,
            _ => Severity::Error,
        },
        _ => Severity::Error,
    }
}

/// Context about the pipeline stage an event belongs to.
#[derive(Debug, Clone)]
pub struct StageContext {
    /// Name of the pipeline run (e.g. `clean_sales`).
    pub pipeline: String,
    /// Name of the stage within the run (e.g. `deduplicated`).
    pub stage: String,
}

impl StageContext {
    /// Create a stage context.
    pub fn new(pipeline: impl Into<String>, stage: impl Into<String>) -> Self {
        Self {
            pipeline: pipeline.into(),
            stage: stage.into(),
        }
    }
}

/// Observer interface for pipeline outcomes.
pub trait PipelineObserver: Send + Sync {
    /// Called when a stage completes, with its output row count.
    fn on_stage(&self, _ctx: &StageContext, _rows: usize) {}

    /// Called when an output artifact has been written.
    fn on_artifact(&self, _ctx: &StageContext, _path: &Path) {}

    /// Called when a stage fails.
    fn on_failure(&self, _ctx: &StageContext, _severity: Severity, _error: &EtlError) {}

    /// Called when a failure meets an alert threshold.
    ///
    /// Default behavior forwards to [`Self::on_failure`].
    fn on_alert(&self, ctx: &StageContext, severity: Severity, error: &EtlError) {
        self.on_failure(ctx, severity, error)
    }
}

/// An observer that fans out callbacks to a list of observers.
#[derive(Default)]
pub struct CompositeObserver {
    observers: Vec<Arc<dyn PipelineObserver>>,
}

impl CompositeObserver {
    /// Create a new composite observer from a list of observers.
    pub fn new(observers: Vec<Arc<dyn PipelineObserver>>) -> Self {
        Self { observers }
    }
}

impl fmt::Debug for CompositeObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeObserver")
            .field("observers_len", &self.observers.len())
            .finish()
    }
}

impl PipelineObserver for CompositeObserver {
    fn on_stage(&self, ctx: &StageContext, rows: usize) {
        for o in &self.observers {
            o.on_stage(ctx, rows);
        }
    }

    fn on_artifact(&self, ctx: &StageContext, path: &Path) {
        for o in &self.observers {
            o.on_artifact(ctx, path);
        }
    }

    fn on_failure(&self, ctx: &StageContext, severity: Severity, error: &EtlError) {
        for o in &self.observers {
            o.on_failure(ctx, severity, error);
        }
    }

    fn on_alert(&self, ctx: &StageContext, severity: Severity, error: &EtlError) {
        for o in &self.observers {
            o.on_alert(ctx, severity, error);
        }
    }
}

/// Logs pipeline events to stderr.
#[derive(Debug, Default)]
pub struct StdErrObserver;

impl PipelineObserver for StdErrObserver {
    fn on_stage(&self, ctx: &StageContext, rows: usize) {
        eprintln!(
            "[etl][{}] stage={} rows={rows}",
            ctx.pipeline, ctx.stage
        );
    }

    fn on_artifact(&self, ctx: &StageContext, path: &Path) {
        eprintln!(
            "[etl][{}] wrote {}",
            ctx.pipeline,
            path.display()
        );
    }

    fn on_failure(&self, ctx: &StageContext, severity: Severity, error: &EtlError) {
        eprintln!(
            "[etl][{}][{severity:?}] stage={} err={error}",
            ctx.pipeline, ctx.stage
        );
    }

    fn on_alert(&self, ctx: &StageContext, severity: Severity, error: &EtlError) {
        eprintln!(
            "[ALERT][etl][{}][{severity:?}] stage={} err={error}",
            ctx.pipeline, ctx.stage
        );
    }
}

/// Appends pipeline events to a local log file.
#[derive(Debug)]
pub struct FileObserver {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileObserver {
    /// Create a file observer that appends events to `path`.
    ///
    /// Writes are best-effort; failures to open/write the log file are ignored.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    fn append_line(&self, line: &str) {
        let _guard = self.lock.lock().ok();
        if let Ok(mut f) = OpenOptions::new().create(true).append(true).open(&self.path) {
            let _ = writeln!(f, "{line}");
        }
    }
}

impl PipelineObserver for FileObserver {
    fn on_stage(&self, ctx: &StageContext, rows: usize) {
        self.append_line(&format!(
            "{} stage pipeline={} stage={} rows={rows}",
            unix_ts(),
            ctx.pipeline,
            ctx.stage
        ));
    }

    fn on_artifact(&self, ctx: &StageContext, path: &Path) {
        self.append_line(&format!(
            "{} artifact pipeline={} path={}",
            unix_ts(),
            ctx.pipeline,
            path.display()
        ));
    }

    fn on_failure(&self, ctx: &StageContext, severity: Severity, error: &EtlError) {
        self.append_line(&format!(
            "{} fail severity={severity:?} pipeline={} stage={} err={error}",
            unix_ts(),
            ctx.pipeline,
            ctx.stage
        ));
    }

    fn on_alert(&self, ctx: &StageContext, severity: Severity, error: &EtlError) {
        self.append_line(&format!(
            "{} ALERT severity={severity:?} pipeline={} stage={} err={error}",
            unix_ts(),
            ctx.pipeline,
            ctx.stage
        ));
    }
}

fn unix_ts() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
