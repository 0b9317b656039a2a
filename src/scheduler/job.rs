//! Batch job entity, status and statistics snapshots.

use crate::adjustments::AdjustmentSet;
use crate::export::ExportOptions;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use uuid::Uuid;

/// Unique job identifier (UUID v4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// First eight hex digits, for thread names and log lines.
    pub fn short(&self) -> String {
        self.0.simple().to_string()[..8].to_string()
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for JobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Job lifecycle: `pending → processing → completed | failed`, or
/// `pending → failed` when cancelled or the output directory can't be made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One file that could not be processed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileFailure {
    /// Position in the job's `input_files`.
    pub index: usize,
    pub file: PathBuf,
    pub message: String,
}

impl fmt::Display for FileFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.file.display(), self.message)
    }
}

/// A set of files edited with one adjustment set and exported with one
/// set of options.
///
/// Values returned by the scheduler are snapshots; mutating them has no
/// effect on the scheduled job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchJob {
    pub id: JobId,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub input_files: Vec<PathBuf>,
    pub output_dir: PathBuf,
    pub adjustments: AdjustmentSet,
    pub export: ExportOptions,
    pub status: JobStatus,
    /// 0-100.
    pub progress: u8,
    pub processed_files: usize,
    /// Per-file failures, ordered by input index once the job is terminal.
    pub errors: Vec<FileFailure>,
    /// Why the job failed as a whole (cancelled, output directory, worker).
    pub failure: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Creation order, breaks `created_at` ties.
    #[serde(skip)]
    pub(crate) seq: u64,
}

impl BatchJob {
    pub(crate) fn new(
        name: String,
        input_files: Vec<PathBuf>,
        output_dir: PathBuf,
        adjustments: AdjustmentSet,
        export: ExportOptions,
        seq: u64,
    ) -> Self {
        Self {
            id: JobId::new(),
            name,
            created_at: Utc::now(),
            input_files,
            output_dir,
            adjustments,
            export,
            status: JobStatus::Pending,
            progress: 0,
            processed_files: 0,
            errors: Vec::new(),
            failure: None,
            started_at: None,
            completed_at: None,
            seq,
        }
    }

    pub fn total_files(&self) -> usize {
        self.input_files.len()
    }

    /// Files that have been tried, successfully or not.
    pub fn attempted_files(&self) -> usize {
        self.processed_files + self.errors.len()
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Error list in display form, job-level failure first.
    pub fn error_messages(&self) -> Vec<String> {
        self.failure
            .iter()
            .cloned()
            .chain(self.errors.iter().map(FileFailure::to_string))
            .collect()
    }

    pub(crate) fn update_progress(&mut self) {
        self.progress = progress_percent(self.attempted_files(), self.total_files());
    }
}

/// `round(attempted / total * 100)`; an empty job counts as done.
pub fn progress_percent(attempted: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    ((attempted as f64 / total as f64) * 100.0).round().min(100.0) as u8
}

/// Aggregate counters over every job the scheduler knows about.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStatistics {
    pub total: usize,
    pub pending: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
    pub total_files_processed: usize,
    pub total_files_queued: usize,
    /// File failures plus job-level failures.
    pub total_errors: usize,
}

impl JobStatistics {
    pub fn from_jobs<'a>(jobs: impl IntoIterator<Item = &'a BatchJob>) -> Self {
        let mut stats = Self::default();
        for job in jobs {
            stats.total += 1;
            match job.status {
                JobStatus::Pending => stats.pending += 1,
                JobStatus::Processing => stats.processing += 1,
                JobStatus::Completed => stats.completed += 1,
                JobStatus::Failed => stats.failed += 1,
            }
            stats.total_files_processed += job.processed_files;
            stats.total_files_queued += job.total_files();
            stats.total_errors += job.errors.len() + usize::from(job.failure.is_some());
        }
        stats
    }
}
