//! CLI output formatting.
//!
//! Output is **photo-centric**: every file line leads with its 1-based
//! position in the job and its file name, with paths and messages shown as
//! secondary context.
//!
//! # Output Format
//!
//! ## Batch
//!
//! ```text
//! Queued Landscapes [3f2a9c1e]
//! Landscapes (3 photos)
//!     001 → dawn.jpg (33%)
//!     002 dusk.jpg: input file not found (67%)
//!     003 → noon.jpg (100%)
//! Landscapes: failed, 2 processed, 1 error
//! ```
//!
//! ## Plan
//!
//! ```text
//! 001 exposure: gamma 0.707
//! 002 hsl (blue): modulate brightness=1.000 saturation=1.400 hue=0.0°
//! ```
//!
//! # Architecture
//!
//! Each output has a `format_*` function (returns `Vec<String>`) for
//! testability and, where the CLI prints it directly, a `print_*` wrapper
//! that writes to stdout. Format functions are pure.

use crate::pipeline::PlannedOp;
use crate::presets::PresetLibrary;
use crate::scheduler::{BatchJob, JobStatistics, SchedulerEvent};
use std::path::Path;

// ============================================================================
// Shared helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        format!("{n} {word}")
    } else {
        format!("{n} {word}s")
    }
}

// ============================================================================
// Batch events
// ============================================================================

/// Format a single scheduler event as display lines.
///
/// Successful files show the written file name; failures show the input.
pub fn format_event(event: &SchedulerEvent) -> Vec<String> {
    match event {
        SchedulerEvent::JobQueued { id, name } => {
            vec![format!("Queued {} [{}]", name, id.short())]
        }
        SchedulerEvent::JobStarted { name, files, .. } => {
            vec![format!("{} ({})", name, plural(*files, "photo"))]
        }
        SchedulerEvent::FileProcessed {
            index,
            output,
            progress,
            ..
        } => vec![format!(
            "{}{} → {} ({}%)",
            indent(1),
            format_index(index + 1),
            file_name(output),
            progress
        )],
        SchedulerEvent::FileFailed {
            failure, progress, ..
        } => vec![format!(
            "{}{} {}: {} ({}%)",
            indent(1),
            format_index(failure.index + 1),
            file_name(&failure.file),
            failure.message,
            progress
        )],
        SchedulerEvent::JobFinished {
            name,
            status,
            processed,
            errors,
            failure,
            ..
        } => {
            let mut lines = vec![format!(
                "{}: {}, {} processed, {}",
                name,
                status,
                processed,
                plural(*errors, "error")
            )];
            if let Some(reason) = failure {
                lines.push(format!("{}Reason: {}", indent(1), reason));
            }
            lines
        }
    }
}

/// Format a job snapshot: header, output directory, then any errors.
///
/// ```text
/// Landscapes [3f2a9c1e] failed (100%)
///     Output: /tmp/out
///     002 dusk.jpg: decode failed
/// ```
pub fn format_job_summary(job: &BatchJob) -> Vec<String> {
    let mut lines = vec![format!(
        "{} [{}] {} ({}%)",
        job.name,
        job.id.short(),
        job.status,
        job.progress
    )];
    lines.push(format!("{}Output: {}", indent(1), job.output_dir.display()));
    if let Some(reason) = &job.failure {
        lines.push(format!("{}Reason: {}", indent(1), reason));
    }
    for failure in &job.errors {
        lines.push(format!(
            "{}{} {}: {}",
            indent(1),
            format_index(failure.index + 1),
            file_name(&failure.file),
            failure.message
        ));
    }
    lines
}

/// Format aggregate statistics as a single summary block.
pub fn format_statistics(stats: &JobStatistics) -> Vec<String> {
    vec![
        format!(
            "Jobs: {} ({} completed, {} failed, {} pending, {} processing)",
            stats.total, stats.completed, stats.failed, stats.pending, stats.processing
        ),
        format!(
            "Files: {} of {} processed, {}",
            stats.total_files_processed,
            stats.total_files_queued,
            plural(stats.total_errors, "error")
        ),
    ]
}

pub fn print_statistics(stats: &JobStatistics) {
    for line in format_statistics(stats) {
        println!("{}", line);
    }
}

// ============================================================================
// Plan and presets
// ============================================================================

/// Format a pipeline plan, one numbered line per backend call.
pub fn format_plan(plan: &[PlannedOp]) -> Vec<String> {
    if plan.is_empty() {
        return vec!["No operations (identity adjustments)".to_string()];
    }
    plan.iter()
        .enumerate()
        .map(|(i, op)| format!("{} {}", format_index(i + 1), op))
        .collect()
}

pub fn print_plan(plan: &[PlannedOp]) {
    for line in format_plan(plan) {
        println!("{}", line);
    }
}

/// Format the preset library: name with optional indented description.
pub fn format_presets(library: &PresetLibrary) -> Vec<String> {
    let mut lines = Vec::new();
    for preset in library.iter() {
        lines.push(preset.name.clone());
        if let Some(desc) = &preset.description {
            lines.push(format!("{}{}", indent(1), desc));
        }
    }
    lines
}

pub fn print_presets(library: &PresetLibrary) {
    for line in format_presets(library) {
        println!("{}", line);
    }
}
