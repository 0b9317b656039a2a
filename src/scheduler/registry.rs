//! In-memory job table.
//!
//! Owned by the scheduler's actor thread, which makes it the single writer
//! of job state. Every lifecycle transition goes through a method here and
//! each one checks the current status first.

use super::SchedulerError;
use super::job::{BatchJob, FileFailure, JobId, JobStatistics, JobStatus};
use crate::adjustments::AdjustmentSet;
use crate::export::ExportOptions;
use chrono::Utc;
use std::collections::HashMap;
use std::path::PathBuf;

/// What a worker reports for one file.
#[derive(Debug, Clone)]
pub(crate) struct FileOutcome {
    pub index: usize,
    pub result: Result<PathBuf, String>,
}

#[derive(Debug, Default)]
pub(crate) struct JobRegistry {
    jobs: HashMap<JobId, BatchJob>,
    /// Which input indices have reported, for jobs that are processing.
    reported: HashMap<JobId, Vec<bool>>,
    next_seq: u64,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(
        &mut self,
        name: String,
        input_files: Vec<PathBuf>,
        output_dir: PathBuf,
        adjustments: AdjustmentSet,
        export: ExportOptions,
    ) -> BatchJob {
        let job = BatchJob::new(
            name,
            input_files,
            output_dir,
            adjustments,
            export,
            self.next_seq,
        );
        self.next_seq += 1;
        self.jobs.insert(job.id, job.clone());
        job
    }

    pub fn get(&self, id: JobId) -> Result<&BatchJob, SchedulerError> {
        self.jobs.get(&id).ok_or(SchedulerError::JobNotFound(id))
    }

    fn get_mut(&mut self, id: JobId) -> Result<&mut BatchJob, SchedulerError> {
        self.jobs.get_mut(&id).ok_or(SchedulerError::JobNotFound(id))
    }

    /// Snapshots, newest first.
    pub fn all(&self) -> Vec<BatchJob> {
        let mut jobs: Vec<BatchJob> = self.jobs.values().cloned().collect();
        jobs.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.seq.cmp(&a.seq))
        });
        jobs
    }

    pub fn by_status(&self, status: JobStatus) -> Vec<BatchJob> {
        self.all()
            .into_iter()
            .filter(|j| j.status == status)
            .collect()
    }

    pub fn count(&self, status: JobStatus) -> usize {
        self.jobs.values().filter(|j| j.status == status).count()
    }

    pub fn require_status(
        &self,
        id: JobId,
        expected: JobStatus,
        operation: &'static str,
    ) -> Result<&BatchJob, SchedulerError> {
        let job = self.get(id)?;
        if job.status != expected {
            return Err(SchedulerError::StateConflict {
                id,
                status: job.status,
                operation,
            });
        }
        Ok(job)
    }

    /// `pending → processing`. Resets counters and starts tracking files.
    pub fn start(&mut self, id: JobId) -> Result<BatchJob, SchedulerError> {
        self.require_status(id, JobStatus::Pending, "start")?;
        let job = self.get_mut(id)?;
        job.status = JobStatus::Processing;
        job.started_at = Some(Utc::now());
        job.processed_files = 0;
        job.errors.clear();
        job.progress = 0;
        let snapshot = job.clone();
        self.reported.insert(id, vec![false; snapshot.total_files()]);
        Ok(snapshot)
    }

    /// Apply one file outcome to a processing job.
    ///
    /// Returns the recorded failure, if any. Late or duplicate reports are
    /// ignored.
    pub fn record_file(
        &mut self,
        id: JobId,
        outcome: FileOutcome,
    ) -> Result<Option<FileFailure>, SchedulerError> {
        let Some(seen) = self
            .reported
            .get_mut(&id)
            .and_then(|r| r.get_mut(outcome.index))
        else {
            return Ok(None);
        };
        if *seen {
            return Ok(None);
        }
        *seen = true;

        let job = self.get_mut(id)?;
        let failure = match outcome.result {
            Ok(_) => {
                job.processed_files += 1;
                None
            }
            Err(message) => {
                let failure = FileFailure {
                    index: outcome.index,
                    file: job.input_files[outcome.index].clone(),
                    message,
                };
                job.errors.push(failure.clone());
                Some(failure)
            }
        };
        job.update_progress();
        Ok(failure)
    }

    /// `processing → completed | failed`.
    ///
    /// Files that never reported are recorded as failures so the job's
    /// counters always add up to its input count.
    pub fn finish(&mut self, id: JobId) -> Result<BatchJob, SchedulerError> {
        self.require_status(id, JobStatus::Processing, "finish")?;
        let reported = self.reported.remove(&id).unwrap_or_default();
        let job = self.get_mut(id)?;

        for (index, seen) in reported.iter().enumerate() {
            if !seen {
                job.errors.push(FileFailure {
                    index,
                    file: job.input_files[index].clone(),
                    message: "worker stopped before this file was processed".into(),
                });
            }
        }
        job.errors.sort_by_key(|f| f.index);
        job.status = if job.errors.is_empty() {
            JobStatus::Completed
        } else {
            JobStatus::Failed
        };
        job.progress = 100;
        job.completed_at = Some(Utc::now());
        Ok(job.clone())
    }

    /// Fail a job that is not running any files (cancelled, output
    /// directory error, worker spawn error).
    pub fn fail(&mut self, id: JobId, reason: String) -> Result<BatchJob, SchedulerError> {
        let job = self.get_mut(id)?;
        if job.status.is_terminal() {
            return Err(SchedulerError::StateConflict {
                id,
                status: job.status,
                operation: "fail",
            });
        }
        job.status = JobStatus::Failed;
        job.failure = Some(reason);
        job.completed_at = Some(Utc::now());
        let snapshot = job.clone();
        self.reported.remove(&id);
        Ok(snapshot)
    }

    /// Remove a terminal job.
    pub fn remove(&mut self, id: JobId) -> Result<BatchJob, SchedulerError> {
        let job = self.get(id)?;
        if !job.is_terminal() {
            return Err(SchedulerError::StateConflict {
                id,
                status: job.status,
                operation: "delete",
            });
        }
        self.jobs.remove(&id).ok_or(SchedulerError::JobNotFound(id))
    }

    /// Remove every `completed` job. Failed jobs stay for inspection.
    pub fn clear_completed(&mut self) -> usize {
        let before = self.jobs.len();
        self.jobs.retain(|_, j| j.status != JobStatus::Completed);
        before - self.jobs.len()
    }

    pub fn statistics(&self) -> JobStatistics {
        JobStatistics::from_jobs(self.jobs.values())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create(reg: &mut JobRegistry, files: &[&str]) -> JobId {
        reg.create(
            "job".into(),
            files.iter().map(PathBuf::from).collect(),
            PathBuf::from("/out"),
            AdjustmentSet::default(),
            ExportOptions::default(),
        )
        .id
    }

    fn ok(index: usize) -> FileOutcome {
        FileOutcome {
            index,
            result: Ok(PathBuf::from(format!("/out/{index}.jpg"))),
        }
    }

    fn err(index: usize, msg: &str) -> FileOutcome {
        FileOutcome {
            index,
            result: Err(msg.into()),
        }
    }

    #[test]
    fn all_is_newest_first() {
        let mut reg = JobRegistry::new();
        let first = create(&mut reg, &["a"]);
        let second = create(&mut reg, &["b"]);
        let third = create(&mut reg, &["c"]);
        let ids: Vec<_> = reg.all().iter().map(|j| j.id).collect();
        assert_eq!(ids, vec![third, second, first]);
    }

    #[test]
    fn clean_run_completes() {
        let mut reg = JobRegistry::new();
        let id = create(&mut reg, &["a", "b"]);
        reg.start(id).unwrap();
        reg.record_file(id, ok(0)).unwrap();
        assert_eq!(reg.get(id).unwrap().progress, 50);
        reg.record_file(id, ok(1)).unwrap();
        let job = reg.finish(id).unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.processed_files, 2);
        assert_eq!(job.progress, 100);
        assert!(job.completed_at.is_some());
    }

    #[test]
    fn any_file_error_fails_job_and_errors_sort_by_index() {
        let mut reg = JobRegistry::new();
        let id = create(&mut reg, &["a", "b", "c"]);
        reg.start(id).unwrap();
        reg.record_file(id, err(2, "late")).unwrap();
        reg.record_file(id, ok(1)).unwrap();
        reg.record_file(id, err(0, "early")).unwrap();
        let job = reg.finish(id).unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        let order: Vec<_> = job.errors.iter().map(|e| e.index).collect();
        assert_eq!(order, vec![0, 2]);
        assert_eq!(job.processed_files + job.errors.len(), 3);
    }

    #[test]
    fn unreported_files_become_errors() {
        let mut reg = JobRegistry::new();
        let id = create(&mut reg, &["a", "b"]);
        reg.start(id).unwrap();
        reg.record_file(id, ok(0)).unwrap();
        let job = reg.finish(id).unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.errors.len(), 1);
        assert_eq!(job.errors[0].file, PathBuf::from("b"));
    }

    #[test]
    fn duplicate_reports_are_ignored() {
        let mut reg = JobRegistry::new();
        let id = create(&mut reg, &["a"]);
        reg.start(id).unwrap();
        reg.record_file(id, ok(0)).unwrap();
        reg.record_file(id, err(0, "again")).unwrap();
        let job = reg.finish(id).unwrap();
        assert_eq!(job.processed_files, 1);
        assert!(job.errors.is_empty());
    }

    #[test]
    fn terminal_jobs_cannot_restart_or_fail_again() {
        let mut reg = JobRegistry::new();
        let id = create(&mut reg, &[]);
        reg.start(id).unwrap();
        reg.finish(id).unwrap();
        assert!(matches!(
            reg.start(id),
            Err(SchedulerError::StateConflict { .. })
        ));
        assert!(matches!(
            reg.fail(id, "x".into()),
            Err(SchedulerError::StateConflict { .. })
        ));
    }

    #[test]
    fn remove_requires_terminal() {
        let mut reg = JobRegistry::new();
        let id = create(&mut reg, &["a"]);
        assert!(matches!(
            reg.remove(id),
            Err(SchedulerError::StateConflict {
                status: JobStatus::Pending,
                ..
            })
        ));
        reg.fail(id, "cancelled".into()).unwrap();
        assert!(reg.remove(id).is_ok());
        assert!(matches!(reg.get(id), Err(SchedulerError::JobNotFound(_))));
    }

    #[test]
    fn clear_completed_keeps_failed() {
        let mut reg = JobRegistry::new();
        let done = create(&mut reg, &[]);
        reg.start(done).unwrap();
        reg.finish(done).unwrap();
        let failed = create(&mut reg, &["a"]);
        reg.fail(failed, "cancelled".into()).unwrap();
        let pending = create(&mut reg, &["b"]);

        assert_eq!(reg.clear_completed(), 1);
        assert!(reg.get(done).is_err());
        assert!(reg.get(failed).is_ok());
        assert!(reg.get(pending).is_ok());
    }
}
