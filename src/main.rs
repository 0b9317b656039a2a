use clap::{Parser, Subcommand};
use darkroom::adjustments::AdjustmentSet;
use darkroom::config::{self, AppConfig};
use darkroom::export::ExportOptions;
use darkroom::imaging::{self, Fit, ImageBackend, OutputFormat, ResizeParams, RustBackend};
use darkroom::naming::NamingOptions;
use darkroom::presets::PresetLibrary;
use darkroom::scheduler::{
    BatchJob, BatchScheduler, JobStatistics, JobStatus, clamp_concurrency,
};
use darkroom::{output, photo, pipeline};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};
use walkdir::WalkDir;

/// Where the edit comes from: an adjustments file, a preset, or both
/// (the preset is applied on top of the file).
#[derive(clap::Args, Clone)]
struct EditArgs {
    /// Adjustment set as TOML or JSON (by extension)
    #[arg(long)]
    adjustments: Option<PathBuf>,

    /// Preset applied on top of the adjustments
    #[arg(long)]
    preset: Option<String>,
}

/// Encoding flags. Unset values fall back to `[export]` in the config.
#[derive(clap::Args, Clone)]
struct EncodeArgs {
    /// Output format: jpeg, png, webp, tiff, avif
    #[arg(long)]
    format: Option<OutputFormat>,

    /// Lossy encoding quality (1-100)
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=100))]
    quality: Option<u32>,
}

#[derive(Parser)]
#[command(name = "darkroom")]
#[command(about = "Photo adjustments and batch export")]
#[command(long_about = "\
Photo adjustments and batch export

Edits are plain adjustment sets (TOML or JSON) and/or named presets. Nothing
is written until export, where the adjustments run as an ordered pipeline of
image operations. Stages at their neutral values are skipped entirely.

Adjustments file:

  exposure = 0.5           # stops, -2..2
  contrast = 15            # -100..100
  vibrance = 20
  [tone_curve]
  shadows = 10
  [hsl.blue]
  saturation = -30

Batch processing:

  darkroom batch shoot/day1 shoot/day2 extra.jpg --output-dir out --preset vivid

Each directory becomes its own job written to out/<directory name>; loose
files form one more job written to out/. At most `max_concurrent_jobs` jobs
run at once, the rest wait in order. A file that fails is recorded and the
job carries on with the next one.

Run 'darkroom gen-config' to generate a documented darkroom.toml.")]
#[command(version)]
struct Cli {
    /// Config file
    #[arg(long, default_value = config::CONFIG_FILE_NAME, global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Adjust and export a single photo
    Export {
        input: PathBuf,
        output: PathBuf,
        #[command(flatten)]
        edit: EditArgs,
        #[command(flatten)]
        encode: EncodeArgs,
        /// Target width in pixels
        #[arg(long)]
        width: Option<u32>,
        /// Target height in pixels
        #[arg(long)]
        height: Option<u32>,
        /// How the image fits the target box: inside, cover, fill
        #[arg(long, default_value = "inside")]
        fit: Fit,
    },
    /// Adjust and export many photos as scheduled batch jobs
    Batch {
        /// Photos and directories of photos
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        #[arg(long)]
        output_dir: PathBuf,
        #[command(flatten)]
        edit: EditArgs,
        #[command(flatten)]
        encode: EncodeArgs,
        /// Prepended to every output file name
        #[arg(long)]
        prefix: Option<String>,
        /// Appended to every output file stem
        #[arg(long)]
        suffix: Option<String>,
        /// Append the 1-based position in the job (`_001`)
        #[arg(long)]
        index: bool,
        /// Replace existing output files
        #[arg(long)]
        overwrite: bool,
        /// Jobs processed at once (1-10)
        #[arg(long)]
        max_jobs: Option<usize>,
        /// Write a JSON report of every job and the statistics
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// Print the pipeline operations an edit would run
    Plan {
        #[command(flatten)]
        edit: EditArgs,
    },
    /// List available presets
    Presets,
    /// Print a stock darkroom.toml with all options documented
    GenConfig,
}

#[derive(Serialize)]
struct BatchReport<'a> {
    jobs: &'a [BatchJob],
    statistics: JobStatistics,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("error")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Export {
            input,
            output,
            edit,
            encode,
            width,
            height,
            fit,
        } => {
            let (app_config, presets) = load_settings(&cli.config)?;
            let adjustments = resolve_edit(&edit, &presets)?;
            let mut options = export_options(&app_config, &encode, Some(output.as_path()));
            if width.is_some() || height.is_some() {
                options.resize = Some(ResizeParams { width, height, fit });
            }
            let backend = RustBackend::new();
            photo::export_photo(&backend, &input, &output, &options, Some(&adjustments))?;
            println!("{} → {}", input.display(), output.display());
        }
        Command::Batch {
            inputs,
            output_dir,
            edit,
            encode,
            prefix,
            suffix,
            index,
            overwrite,
            max_jobs,
            report,
        } => {
            let (app_config, presets) = load_settings(&cli.config)?;
            let adjustments = resolve_edit(&edit, &presets)?;
            let mut options = export_options(&app_config, &encode, None);
            options.naming = NamingOptions {
                prefix,
                suffix,
                include_index: index,
            };
            options.overwrite |= overwrite;

            let mut scheduler_options = app_config.scheduler.options();
            if let Some(n) = max_jobs {
                scheduler_options.max_concurrent_jobs = clamp_concurrency(n);
            }

            let groups = collect_jobs(&inputs, &output_dir)?;
            if groups.is_empty() {
                return Err("no supported images found in the given inputs".into());
            }

            let backend: Arc<dyn ImageBackend> = Arc::new(RustBackend::new());
            let (tx, rx) = std::sync::mpsc::channel();
            let printer = std::thread::spawn(move || {
                for event in rx {
                    for line in output::format_event(&event) {
                        println!("{}", line);
                    }
                }
            });

            let scheduler = BatchScheduler::with_events(backend, scheduler_options, tx)?;
            for group in groups {
                let job = scheduler.create_batch_job(
                    group.name,
                    group.files,
                    group.output_dir,
                    &adjustments,
                    &options,
                )?;
                if let Err(e) = scheduler.queue_job(job.id) {
                    tracing::warn!(job = %job.id, error = %e, "job not queued");
                }
            }
            scheduler.wait_idle()?;
            let jobs = scheduler.get_all_jobs()?;
            let statistics = scheduler.get_statistics()?;
            // Dropping the scheduler closes the event channel and ends the printer.
            drop(scheduler);
            if printer.join().is_err() {
                tracing::error!("event printer panicked");
            }

            println!();
            for job in jobs.iter().rev().filter(|j| j.status == JobStatus::Failed) {
                for line in output::format_job_summary(job) {
                    println!("{}", line);
                }
            }
            output::print_statistics(&statistics);

            if let Some(path) = report {
                let json = serde_json::to_string_pretty(&BatchReport {
                    jobs: &jobs,
                    statistics,
                })?;
                std::fs::write(&path, json)?;
            }

            if statistics.failed > 0 {
                std::process::exit(1);
            }
        }
        Command::Plan { edit } => {
            let (_, presets) = load_settings(&cli.config)?;
            let adjustments = resolve_edit(&edit, &presets)?;
            output::print_plan(&pipeline::plan(&adjustments));
        }
        Command::Presets => {
            let (_, presets) = load_settings(&cli.config)?;
            output::print_presets(&presets);
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Load `darkroom.toml` (defaults when absent) and the preset library.
fn load_settings(
    config_path: &Path,
) -> Result<(AppConfig, PresetLibrary), Box<dyn std::error::Error>> {
    let app_config = config::load_config(config_path)?;
    let mut library = PresetLibrary::builtin();
    if let Some(dir) = app_config.presets.resolve_directory(config_path) {
        let loaded = library.load_dir(&dir)?;
        tracing::debug!(dir = %dir.display(), loaded, "user presets");
    }
    Ok((app_config, library))
}

/// Build the adjustment set from an optional file plus an optional preset,
/// clamped to the documented ranges.
fn resolve_edit(
    edit: &EditArgs,
    presets: &PresetLibrary,
) -> Result<AdjustmentSet, Box<dyn std::error::Error>> {
    let base = match &edit.adjustments {
        Some(path) => load_adjustments(path)?,
        None => AdjustmentSet::identity(),
    };
    let resolved = match &edit.preset {
        Some(name) => presets.resolve(name, &base)?,
        None => base,
    };
    Ok(resolved.clamped())
}

fn load_adjustments(path: &Path) -> Result<AdjustmentSet, Box<dyn std::error::Error>> {
    let content = std::fs::read_to_string(path)?;
    let is_json = path
        .extension()
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));
    let adjustments = if is_json {
        serde_json::from_str(&content)?
    } else {
        toml::from_str(&content)?
    };
    Ok(adjustments)
}

/// Config defaults overridden by flags. A single-file export with no
/// `--format` takes the format from the output extension when it names one.
fn export_options(
    app_config: &AppConfig,
    encode: &EncodeArgs,
    output: Option<&Path>,
) -> ExportOptions {
    let mut options = app_config.export.export_options();
    let from_extension = output
        .and_then(|p| p.extension())
        .and_then(|e| e.to_str())
        .and_then(|e| e.parse::<OutputFormat>().ok());
    if let Some(format) = encode.format.or(from_extension) {
        options.format = format;
    }
    if let Some(quality) = encode.quality {
        if !options.format.is_lossy() {
            tracing::warn!(format = %options.format, quality, "--quality has no effect");
        }
        options.quality = quality.into();
    }
    options
}

struct JobGroup {
    name: String,
    files: Vec<PathBuf>,
    output_dir: PathBuf,
}

/// Turn CLI inputs into jobs: one per directory, plus one for loose files.
fn collect_jobs(inputs: &[PathBuf], output_dir: &Path) -> Result<Vec<JobGroup>, walkdir::Error> {
    let mut groups = Vec::new();
    let mut loose = Vec::new();

    for input in inputs {
        if input.is_dir() {
            let name = input
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| input.display().to_string());
            let mut files = Vec::new();
            for entry in WalkDir::new(input).min_depth(1).max_depth(1).sort_by_file_name() {
                let entry = entry?;
                if entry.file_type().is_file() && imaging::is_supported_input(entry.path()) {
                    files.push(entry.into_path());
                }
            }
            if files.is_empty() {
                tracing::warn!(dir = %input.display(), "no supported images, skipping");
                continue;
            }
            groups.push(JobGroup {
                output_dir: output_dir.join(&name),
                name,
                files,
            });
        } else {
            // Missing files still go in; the job records them as errors.
            loose.push(input.clone());
        }
    }

    if !loose.is_empty() {
        groups.push(JobGroup {
            name: "files".to_string(),
            files: loose,
            output_dir: output_dir.to_path_buf(),
        });
    }
    Ok(groups)
}
