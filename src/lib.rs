//! # darkroom
//!
//! Non-destructive photo adjustments and bounded batch export.
//!
//! An edit is a plain [`AdjustmentSet`](adjustments::AdjustmentSet): exposure,
//! contrast, tone curve, HSL bands, grading and so on. Nothing touches pixels
//! until an image is exported, at which point the edit is turned into an
//! ordered list of backend primitives and run against the decoded image.
//!
//! # Architecture: Plan, Then Run
//!
//! ```text
//! AdjustmentSet ──plan()──▶ Vec<PlannedOp> ──run_plan()──▶ DynamicImage ──export()──▶ file
//! ```
//!
//! Planning is a pure function of the adjustment values. Stages whose
//! parameters are neutral produce no operations at all, so an identity edit
//! decodes and re-encodes without touching a single pixel. Because the plan
//! is plain data, the pipeline is unit-tested against a recording mock
//! backend and the `plan` command can print exactly what an export would do.
//!
//! Batches sit on top: the [`scheduler`] accepts jobs (files + one
//! adjustment set + one export configuration), keeps them in a FIFO queue,
//! and runs at most `max_concurrent_jobs` of them at once. Within a job a
//! failing file is recorded and the job moves on to the next one.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`adjustments`] | The adjustment parameter model and its neutral values |
//! | [`presets`] | Named partial adjustments, built-in and loaded from TOML |
//! | [`imaging`] | Backend trait, pure stage formulas, and the `image`-crate backend |
//! | [`pipeline`] | Ordered stage planning and execution, per-file deadlines |
//! | [`export`] | Export options, encoding and atomic writes |
//! | [`naming`] | Output file naming (prefix, suffix, index) |
//! | [`photo`] | Single-photo process and export for interactive callers |
//! | [`scheduler`] | Batch jobs, FIFO admission, per-file error isolation |
//! | [`config`] | `darkroom.toml` loading, validation, and merging |
//! | [`output`] | CLI output formatting for events, plans, and summaries |
//!
//! # Design Decisions
//!
//! ## Pure-Rust Imaging
//!
//! The [`imaging`] module uses the `image` crate for decoding, encoding and
//! resampling, plus a handful of hand-written per-pixel primitives (gamma,
//! linear, modulate, median). There are no system dependencies: the binary is
//! self-contained.
//!
//! ## One Writer for Job State
//!
//! All job state lives on the scheduler's actor thread. Workers report file
//! outcomes as messages and never touch the registry, so every status
//! transition happens in one place and snapshots handed to callers are
//! always consistent.

pub mod adjustments;
pub mod config;
pub mod export;
pub mod imaging;
pub mod naming;
pub mod output;
pub mod photo;
pub mod pipeline;
pub mod presets;
pub mod scheduler;
