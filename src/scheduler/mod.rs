//! Concurrency-bounded batch scheduler.
//!
//! A [`BatchScheduler`] is a handle to an actor thread that owns the
//! [`JobRegistry`](registry::JobRegistry) and the FIFO admission queue.
//! Public operations are messages with a reply channel; workers report file
//! outcomes and job completion back through the same channel, so job state
//! has exactly one writer and no lock.
//!
//! ```text
//!  caller ──Command──▶ actor ──spawn──▶ job worker ──▶ backend
//!    ▲                  │ ▲                 │
//!    └─────reply────────┘ └──FileFinished───┘
//!                           JobFinished
//! ```
//!
//! ## Admission
//!
//! Queued jobs start strictly in FIFO order while fewer than
//! `max_concurrent_jobs` (1-10, default 3) are processing. Admission re-runs
//! whenever a job is queued or finishes and when the cap changes.
//!
//! ## Within a job
//!
//! With `file_workers = 1` files run one at a time in input order. A larger
//! value runs them on a rayon pool shared by all jobs; error lists are still
//! ordered by input index. A file's failure never stops the others.
//!
//! Dropping the scheduler stops admission, waits for running jobs to finish
//! and joins the actor. Jobs still queued at that point stay pending.

pub mod job;
mod registry;
pub mod worker;

pub use job::{BatchJob, FileFailure, JobId, JobStatistics, JobStatus};
pub use worker::FileError;

use crate::adjustments::AdjustmentSet;
use crate::export::ExportOptions;
use crate::imaging::ImageBackend;
use registry::{FileOutcome, JobRegistry};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use thiserror::Error;
use worker::{JobContext, WorkerSettings};

/// Lower and upper bound for `max_concurrent_jobs`.
pub const CONCURRENCY_RANGE: (usize, usize) = (1, 10);

#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("job not found: {0}")]
    JobNotFound(JobId),
    #[error("cannot {operation} job {id}: it is {status}")]
    StateConflict {
        id: JobId,
        status: JobStatus,
        operation: &'static str,
    },
    #[error("cannot create output directory {}: {source}", path.display())]
    DirectoryCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to start scheduler thread: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("scheduler has stopped")]
    Stopped,
}

/// Scheduler tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerOptions {
    pub max_concurrent_jobs: usize,
    /// Parallel files per job; clamped to available cores.
    pub file_workers: usize,
    /// Per-file deadline, checked between pipeline stages.
    pub file_timeout: Option<Duration>,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 3,
            file_workers: 1,
            file_timeout: None,
        }
    }
}

/// Progress notifications, sent on the optional events channel.
#[derive(Debug, Clone, PartialEq)]
pub enum SchedulerEvent {
    JobQueued {
        id: JobId,
        name: String,
    },
    JobStarted {
        id: JobId,
        name: String,
        files: usize,
    },
    FileProcessed {
        id: JobId,
        index: usize,
        output: PathBuf,
        progress: u8,
    },
    FileFailed {
        id: JobId,
        failure: FileFailure,
        progress: u8,
    },
    /// A job reached a terminal state.
    JobFinished {
        id: JobId,
        name: String,
        status: JobStatus,
        processed: usize,
        errors: usize,
        failure: Option<String>,
    },
}

pub fn clamp_concurrency(n: usize) -> usize {
    n.clamp(CONCURRENCY_RANGE.0, CONCURRENCY_RANGE.1)
}

type Reply<T> = Sender<T>;

enum Command {
    Create {
        name: String,
        input_files: Vec<PathBuf>,
        output_dir: PathBuf,
        adjustments: Box<AdjustmentSet>,
        export: Box<ExportOptions>,
        reply: Reply<BatchJob>,
    },
    Queue {
        id: JobId,
        reply: Reply<Result<BatchJob, SchedulerError>>,
    },
    Get {
        id: JobId,
        reply: Reply<Result<BatchJob, SchedulerError>>,
    },
    All {
        reply: Reply<Vec<BatchJob>>,
    },
    ByStatus {
        status: JobStatus,
        reply: Reply<Vec<BatchJob>>,
    },
    Cancel {
        id: JobId,
        reply: Reply<Result<BatchJob, SchedulerError>>,
    },
    Delete {
        id: JobId,
        reply: Reply<Result<BatchJob, SchedulerError>>,
    },
    ClearCompleted {
        reply: Reply<usize>,
    },
    Statistics {
        reply: Reply<JobStatistics>,
    },
    SetMaxConcurrent {
        n: usize,
        reply: Reply<usize>,
    },
    WaitIdle {
        reply: Reply<()>,
    },
    FileFinished {
        id: JobId,
        outcome: FileOutcome,
    },
    JobFinished {
        id: JobId,
    },
    Shutdown,
}

/// Handle to the scheduler actor. Cheap to share by reference across threads.
pub struct BatchScheduler {
    tx: Sender<Command>,
    actor: Option<JoinHandle<()>>,
}

impl BatchScheduler {
    pub fn new(
        backend: Arc<dyn ImageBackend>,
        options: SchedulerOptions,
    ) -> Result<Self, SchedulerError> {
        Self::start(backend, options, None)
    }

    /// Like [`new`](Self::new), also sending [`SchedulerEvent`]s to `events`.
    pub fn with_events(
        backend: Arc<dyn ImageBackend>,
        options: SchedulerOptions,
        events: Sender<SchedulerEvent>,
    ) -> Result<Self, SchedulerError> {
        Self::start(backend, options, Some(events))
    }

    fn start(
        backend: Arc<dyn ImageBackend>,
        options: SchedulerOptions,
        events: Option<Sender<SchedulerEvent>>,
    ) -> Result<Self, SchedulerError> {
        let (tx, rx) = mpsc::channel();
        let actor = Actor::new(backend, options, events, tx.clone());
        let handle = thread::Builder::new()
            .name("darkroom-scheduler".into())
            .spawn(move || actor.run(rx))
            .map_err(SchedulerError::Spawn)?;
        Ok(Self {
            tx,
            actor: Some(handle),
        })
    }

    fn request<T>(&self, make: impl FnOnce(Reply<T>) -> Command) -> Result<T, SchedulerError> {
        let (reply, rx) = mpsc::channel();
        self.tx
            .send(make(reply))
            .map_err(|_| SchedulerError::Stopped)?;
        rx.recv().map_err(|_| SchedulerError::Stopped)
    }

    /// Create a pending job. Inputs are snapshotted; nothing touches disk.
    pub fn create_batch_job(
        &self,
        name: impl Into<String>,
        input_files: Vec<PathBuf>,
        output_dir: impl Into<PathBuf>,
        adjustments: &AdjustmentSet,
        export: &ExportOptions,
    ) -> Result<BatchJob, SchedulerError> {
        let name = name.into();
        let output_dir = output_dir.into();
        self.request(|reply| Command::Create {
            name,
            input_files,
            output_dir,
            adjustments: Box::new(adjustments.clone()),
            export: Box::new(export.clone()),
            reply,
        })
    }

    /// Create the job's output directory and append it to the queue.
    ///
    /// If the directory can't be created the job is marked failed, never
    /// enters the queue, and [`SchedulerError::DirectoryCreate`] is returned.
    pub fn queue_job(&self, id: JobId) -> Result<BatchJob, SchedulerError> {
        self.request(|reply| Command::Queue { id, reply })?
    }

    pub fn get_job(&self, id: JobId) -> Result<BatchJob, SchedulerError> {
        self.request(|reply| Command::Get { id, reply })?
    }

    /// Every job, newest first.
    pub fn get_all_jobs(&self) -> Result<Vec<BatchJob>, SchedulerError> {
        self.request(|reply| Command::All { reply })
    }

    pub fn get_jobs_by_status(&self, status: JobStatus) -> Result<Vec<BatchJob>, SchedulerError> {
        self.request(|reply| Command::ByStatus { status, reply })
    }

    /// Cancel a pending job. Running and finished jobs can't be cancelled.
    pub fn cancel_job(&self, id: JobId) -> Result<BatchJob, SchedulerError> {
        self.request(|reply| Command::Cancel { id, reply })?
    }

    /// Remove a completed or failed job.
    pub fn delete_job(&self, id: JobId) -> Result<BatchJob, SchedulerError> {
        self.request(|reply| Command::Delete { id, reply })?
    }

    /// Remove all completed jobs, returning how many were removed.
    pub fn clear_completed_jobs(&self) -> Result<usize, SchedulerError> {
        self.request(|reply| Command::ClearCompleted { reply })
    }

    pub fn get_statistics(&self) -> Result<JobStatistics, SchedulerError> {
        self.request(|reply| Command::Statistics { reply })
    }

    /// Set the concurrency cap (clamped to 1-10). Returns the effective value.
    pub fn set_max_concurrent_jobs(&self, n: usize) -> Result<usize, SchedulerError> {
        self.request(|reply| Command::SetMaxConcurrent { n, reply })
    }

    /// Block until the queue is empty and no job is processing.
    pub fn wait_idle(&self) -> Result<(), SchedulerError> {
        self.request(|reply| Command::WaitIdle { reply })
    }
}

impl Drop for BatchScheduler {
    fn drop(&mut self) {
        let _ = self.tx.send(Command::Shutdown);
        if let Some(handle) = self.actor.take() {
            if handle.join().is_err() {
                tracing::error!("scheduler thread panicked");
            }
        }
    }
}

fn build_pool(file_workers: usize) -> Option<Arc<rayon::ThreadPool>> {
    let cores = thread::available_parallelism().map_or(1, |n| n.get());
    let threads = file_workers.min(cores);
    if threads <= 1 {
        return None;
    }
    match rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|i| format!("darkroom-file-{i}"))
        .build()
    {
        Ok(pool) => Some(Arc::new(pool)),
        Err(e) => {
            tracing::warn!(error = %e, "file worker pool unavailable, running files sequentially");
            None
        }
    }
}

struct Actor {
    registry: JobRegistry,
    queue: VecDeque<JobId>,
    max_concurrent: usize,
    backend: Arc<dyn ImageBackend>,
    settings: WorkerSettings,
    events: Option<Sender<SchedulerEvent>>,
    /// Handed to workers so they can report back.
    tx: Sender<Command>,
    workers: Vec<JoinHandle<()>>,
    idle_waiters: Vec<Reply<()>>,
    shutting_down: bool,
}

impl Actor {
    fn new(
        backend: Arc<dyn ImageBackend>,
        options: SchedulerOptions,
        events: Option<Sender<SchedulerEvent>>,
        tx: Sender<Command>,
    ) -> Self {
        Self {
            registry: JobRegistry::new(),
            queue: VecDeque::new(),
            max_concurrent: clamp_concurrency(options.max_concurrent_jobs),
            backend,
            settings: WorkerSettings {
                pool: build_pool(options.file_workers),
                file_timeout: options.file_timeout,
            },
            events,
            tx,
            workers: Vec::new(),
            idle_waiters: Vec::new(),
            shutting_down: false,
        }
    }

    fn run(mut self, rx: Receiver<Command>) {
        while let Ok(cmd) = rx.recv() {
            self.handle(cmd);
            self.notify_idle();
            if self.shutting_down && self.processing() == 0 {
                break;
            }
        }
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
        tracing::debug!("scheduler stopped");
    }

    fn handle(&mut self, cmd: Command) {
        match cmd {
            Command::Create {
                name,
                input_files,
                output_dir,
                adjustments,
                export,
                reply,
            } => {
                let job =
                    self.registry
                        .create(name, input_files, output_dir, *adjustments, *export);
                tracing::debug!(
                    job = %job.id,
                    name = %job.name,
                    files = job.total_files(),
                    "job created"
                );
                let _ = reply.send(job);
            }
            Command::Queue { id, reply } => {
                let _ = reply.send(self.queue_job(id));
            }
            Command::Get { id, reply } => {
                let _ = reply.send(self.registry.get(id).cloned());
            }
            Command::All { reply } => {
                let _ = reply.send(self.registry.all());
            }
            Command::ByStatus { status, reply } => {
                let _ = reply.send(self.registry.by_status(status));
            }
            Command::Cancel { id, reply } => {
                let _ = reply.send(self.cancel_job(id));
            }
            Command::Delete { id, reply } => {
                let _ = reply.send(self.registry.remove(id));
            }
            Command::ClearCompleted { reply } => {
                let _ = reply.send(self.registry.clear_completed());
            }
            Command::Statistics { reply } => {
                let _ = reply.send(self.registry.statistics());
            }
            Command::SetMaxConcurrent { n, reply } => {
                self.max_concurrent = clamp_concurrency(n);
                tracing::debug!(max_concurrent = self.max_concurrent, "concurrency cap changed");
                self.admit();
                let _ = reply.send(self.max_concurrent);
            }
            Command::WaitIdle { reply } => {
                self.idle_waiters.push(reply);
            }
            Command::FileFinished { id, outcome } => self.file_finished(id, outcome),
            Command::JobFinished { id } => self.job_finished(id),
            Command::Shutdown => {
                self.shutting_down = true;
            }
        }
    }

    fn emit(&self, event: SchedulerEvent) {
        if let Some(events) = &self.events {
            let _ = events.send(event);
        }
    }

    fn processing(&self) -> usize {
        self.registry.count(JobStatus::Processing)
    }

    fn notify_idle(&mut self) {
        if !self.idle_waiters.is_empty() && self.queue.is_empty() && self.processing() == 0 {
            for waiter in self.idle_waiters.drain(..) {
                let _ = waiter.send(());
            }
        }
    }

    fn queue_job(&mut self, id: JobId) -> Result<BatchJob, SchedulerError> {
        let job = self.registry.require_status(id, JobStatus::Pending, "queue")?;
        if self.queue.contains(&id) {
            return Err(SchedulerError::StateConflict {
                id,
                status: JobStatus::Pending,
                operation: "queue",
            });
        }

        let output_dir = job.output_dir.clone();
        if let Err(source) = std::fs::create_dir_all(&output_dir) {
            let reason = format!(
                "cannot create output directory {}: {source}",
                output_dir.display()
            );
            let failed = self.registry.fail(id, reason)?;
            tracing::warn!(
                job = %id,
                dir = %output_dir.display(),
                error = %source,
                "output directory failed"
            );
            self.emit_finished(&failed);
            return Err(SchedulerError::DirectoryCreate {
                path: output_dir,
                source,
            });
        }

        self.queue.push_back(id);
        let name = self.registry.get(id)?.name.clone();
        tracing::debug!(job = %id, queued = self.queue.len(), "job queued");
        self.emit(SchedulerEvent::JobQueued { id, name });
        self.admit();
        Ok(self.registry.get(id)?.clone())
    }

    fn cancel_job(&mut self, id: JobId) -> Result<BatchJob, SchedulerError> {
        self.registry
            .require_status(id, JobStatus::Pending, "cancel")?;
        self.queue.retain(|queued| *queued != id);
        let job = self.registry.fail(id, "cancelled".into())?;
        tracing::info!(job = %id, "job cancelled");
        self.emit_finished(&job);
        Ok(job)
    }

    fn admit(&mut self) {
        if self.shutting_down {
            return;
        }
        while self.processing() < self.max_concurrent {
            let Some(id) = self.queue.pop_front() else {
                break;
            };
            self.start_job(id);
        }
    }

    fn start_job(&mut self, id: JobId) {
        let job = match self.registry.start(id) {
            Ok(job) => job,
            Err(e) => {
                tracing::warn!(job = %id, error = %e, "skipping queued job");
                return;
            }
        };
        let ctx = JobContext::from_job(&job);
        tracing::info!(
            job = %id,
            name = %job.name,
            files = job.total_files(),
            stages = ctx.plan.len(),
            "job started"
        );
        self.emit(SchedulerEvent::JobStarted {
            id,
            name: job.name.clone(),
            files: job.total_files(),
        });

        let backend = Arc::clone(&self.backend);
        let settings = self.settings.clone();
        let tx = self.tx.clone();
        let spawned = thread::Builder::new()
            .name(format!("darkroom-job-{}", id.short()))
            .spawn(move || {
                let _finished = FinishGuard { tx: tx.clone(), id };
                worker::run_job(backend.as_ref(), &ctx, &settings, &|index, result| {
                    let outcome = FileOutcome {
                        index,
                        result: result.map_err(|e| e.to_string()),
                    };
                    let _ = tx.send(Command::FileFinished { id, outcome });
                });
            });

        match spawned {
            Ok(handle) => {
                self.workers.retain(|h| !h.is_finished());
                self.workers.push(handle);
            }
            Err(e) => {
                tracing::error!(job = %id, error = %e, "failed to spawn job worker");
                if let Ok(job) = self.registry.fail(id, format!("failed to start worker: {e}")) {
                    self.emit_finished(&job);
                }
            }
        }
    }

    fn file_finished(&mut self, id: JobId, outcome: FileOutcome) {
        let index = outcome.index;
        let output = outcome.result.as_ref().ok().cloned();
        match self.registry.record_file(id, outcome) {
            Ok(Some(failure)) => {
                let progress = self.progress_of(id);
                self.emit(SchedulerEvent::FileFailed {
                    id,
                    failure,
                    progress,
                });
            }
            Ok(None) => {
                if let Some(output) = output {
                    let progress = self.progress_of(id);
                    self.emit(SchedulerEvent::FileProcessed {
                        id,
                        index,
                        output,
                        progress,
                    });
                }
            }
            Err(e) => tracing::warn!(job = %id, error = %e, "file outcome for unknown job"),
        }
    }

    fn progress_of(&self, id: JobId) -> u8 {
        self.registry.get(id).map_or(0, |j| j.progress)
    }

    fn job_finished(&mut self, id: JobId) {
        match self.registry.finish(id) {
            Ok(job) => {
                tracing::info!(
                    job = %id,
                    status = %job.status,
                    processed = job.processed_files,
                    errors = job.errors.len(),
                    "job finished"
                );
                self.emit_finished(&job);
            }
            Err(e) => tracing::warn!(job = %id, error = %e, "finish for job not processing"),
        }
        self.admit();
    }

    fn emit_finished(&self, job: &BatchJob) {
        self.emit(SchedulerEvent::JobFinished {
            id: job.id,
            name: job.name.clone(),
            status: job.status,
            processed: job.processed_files,
            errors: job.errors.len(),
            failure: job.failure.clone(),
        });
    }
}

/// Sends `JobFinished` when the worker thread exits, even by panic.
struct FinishGuard {
    tx: Sender<Command>,
    id: JobId,
}

impl Drop for FinishGuard {
    fn drop(&mut self) {
        let _ = self.tx.send(Command::JobFinished { id: self.id });
    }
}
