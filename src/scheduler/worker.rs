//! Per-file execution for one job.
//!
//! Each file goes through the same steps:
//!
//! 1. input must exist
//! 2. destination name from the naming options; an existing destination is
//!    an error unless `overwrite` is set
//! 3. decode → adjustment plan → encode → atomic write
//!
//! A failure at any step, including a panic inside the backend, becomes
//! that file's error. The remaining files are still attempted.

use super::job::{BatchJob, JobId};
use crate::adjustments::AdjustmentSet;
use crate::export::{self, ExportError, ExportOptions};
use crate::imaging::{BackendError, ImageBackend};
use crate::naming;
use crate::pipeline::{self, Deadline, PipelineError, PlannedOp};
use rayon::prelude::*;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FileError {
    #[error("input file not found")]
    InputMissing,
    #[error("output file exists (overwrite disabled): {0}")]
    OutputExists(PathBuf),
    #[error(transparent)]
    Decode(BackendError),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error(transparent)]
    Export(#[from] ExportError),
    #[error("backend panicked: {0}")]
    Panicked(String),
}

/// Everything a worker needs to run a job's files, detached from the registry.
#[derive(Debug, Clone)]
pub struct JobContext {
    pub id: JobId,
    pub input_files: Vec<PathBuf>,
    pub output_dir: PathBuf,
    pub export: ExportOptions,
    /// Adjustment plan, computed once per job.
    pub plan: Vec<PlannedOp>,
}

impl JobContext {
    pub fn from_job(job: &BatchJob) -> Self {
        Self::new(
            job.id,
            job.input_files.clone(),
            job.output_dir.clone(),
            &job.adjustments,
            job.export.clone(),
        )
    }

    pub fn new(
        id: JobId,
        input_files: Vec<PathBuf>,
        output_dir: PathBuf,
        adjustments: &AdjustmentSet,
        export: ExportOptions,
    ) -> Self {
        Self {
            id,
            input_files,
            output_dir,
            export,
            plan: pipeline::plan(adjustments),
        }
    }

    pub fn destination(&self, index: usize) -> PathBuf {
        naming::output_path(
            &self.output_dir,
            &self.input_files[index],
            index,
            &self.export.naming,
            self.export.format,
        )
    }
}

/// How a worker runs a job's files.
#[derive(Clone, Default)]
pub struct WorkerSettings {
    /// Shared pool for parallel files. `None` runs files in input order.
    pub pool: Option<Arc<rayon::ThreadPool>>,
    pub file_timeout: Option<Duration>,
}

/// Process the file at `index`, returning the written destination.
pub fn process_file(
    backend: &dyn ImageBackend,
    ctx: &JobContext,
    index: usize,
    file_timeout: Option<Duration>,
) -> Result<PathBuf, FileError> {
    let input: &Path = &ctx.input_files[index];
    if !input.exists() {
        return Err(FileError::InputMissing);
    }

    let output = ctx.destination(index);
    if output.exists() && !ctx.export.overwrite {
        return Err(FileError::OutputExists(output));
    }

    let deadline = file_timeout.map(Deadline::after);
    let img = backend.decode(input).map_err(FileError::Decode)?;
    let img = pipeline::run_plan(backend, img, &ctx.plan, deadline.as_ref())?;
    if let Some(deadline) = &deadline {
        deadline.check("encode")?;
    }
    export::export(backend, img, &ctx.export, &output)?;
    Ok(output)
}

/// [`process_file`] with panics turned into [`FileError::Panicked`].
pub fn process_file_isolated(
    backend: &dyn ImageBackend,
    ctx: &JobContext,
    index: usize,
    file_timeout: Option<Duration>,
) -> Result<PathBuf, FileError> {
    panic::catch_unwind(AssertUnwindSafe(|| {
        process_file(backend, ctx, index, file_timeout)
    }))
    .unwrap_or_else(|payload| Err(FileError::Panicked(panic_message(payload.as_ref()))))
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Run every file of a job, calling `report` once per file.
///
/// Sequential runs report in input order; pooled runs report in completion
/// order.
pub fn run_job(
    backend: &dyn ImageBackend,
    ctx: &JobContext,
    settings: &WorkerSettings,
    report: &(dyn Fn(usize, Result<PathBuf, FileError>) + Sync),
) {
    let run_one = |index: usize| {
        let result = process_file_isolated(backend, ctx, index, settings.file_timeout);
        if let Err(e) = &result {
            tracing::warn!(
                job = %ctx.id,
                file = %ctx.input_files[index].display(),
                error = %e,
                "file failed"
            );
        }
        report(index, result);
    };

    match &settings.pool {
        Some(pool) => {
            pool.install(|| (0..ctx.input_files.len()).into_par_iter().for_each(run_one))
        }
        None => (0..ctx.input_files.len()).for_each(run_one),
    }
}
