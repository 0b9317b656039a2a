//! Application configuration module.
//!
//! Handles loading, validating, and merging `darkroom.toml`. Stock defaults
//! are serialized to a TOML table and the user file is merged on top, so a
//! config file only needs the keys it wants to change.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [scheduler]
//! max_concurrent_jobs = 3   # Jobs processed at once (1-10)
//! file_workers = 1          # Parallel files per job (clamped to CPU cores)
//! # file_timeout_secs = 120 # Per-file deadline; omit for none
//!
//! [export]
//! format = "jpeg"           # jpeg, png, webp, tiff, avif
//! quality = 90              # Lossy quality (1-100)
//! overwrite = false         # Replace existing output files
//!
//! [presets]
//! # directory = "presets"   # Extra *.toml presets, relative to this file
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::export::ExportOptions;
use crate::imaging::{OutputFormat, Quality};
use crate::scheduler::{CONCURRENCY_RANGE, SchedulerOptions};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "darkroom.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Application configuration loaded from `darkroom.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// Batch scheduler settings.
    pub scheduler: SchedulerConfig,
    /// Default export settings for `export` and `batch`.
    pub export: ExportConfig,
    /// User preset location.
    pub presets: PresetsConfig,
}

impl AppConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let (min, max) = CONCURRENCY_RANGE;
        if !(min..=max).contains(&self.scheduler.max_concurrent_jobs) {
            return Err(ConfigError::Validation(format!(
                "scheduler.max_concurrent_jobs must be {min}-{max}"
            )));
        }
        if self.scheduler.file_workers == 0 {
            return Err(ConfigError::Validation(
                "scheduler.file_workers must be at least 1".into(),
            ));
        }
        if self.scheduler.file_timeout_secs == Some(0) {
            return Err(ConfigError::Validation(
                "scheduler.file_timeout_secs must be positive".into(),
            ));
        }
        if !(1..=100).contains(&self.export.quality) {
            return Err(ConfigError::Validation(
                "export.quality must be 1-100".into(),
            ));
        }
        Ok(())
    }
}

/// Batch scheduler settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SchedulerConfig {
    pub max_concurrent_jobs: usize,
    /// Files processed in parallel within one job.
    /// Values larger than the core count are clamped down.
    pub file_workers: usize,
    /// Per-file deadline in seconds. When absent, files have no deadline.
    pub file_timeout_secs: Option<u64>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 3,
            file_workers: 1,
            file_timeout_secs: None,
        }
    }
}

impl SchedulerConfig {
    pub fn options(&self) -> SchedulerOptions {
        SchedulerOptions {
            max_concurrent_jobs: self.max_concurrent_jobs,
            file_workers: effective_file_workers(self.file_workers),
            file_timeout: self.file_timeout_secs.map(Duration::from_secs),
        }
    }
}

/// Resolve the effective per-job file worker count.
///
/// The user can constrain down, not up: `min(requested, cores)`, at least 1.
pub fn effective_file_workers(requested: usize) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    requested.min(cores).max(1)
}

/// Default export settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExportConfig {
    pub format: OutputFormat,
    pub quality: u32,
    pub overwrite: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Jpeg,
            quality: 90,
            overwrite: false,
        }
    }
}

impl ExportConfig {
    pub fn export_options(&self) -> ExportOptions {
        ExportOptions {
            format: self.format,
            quality: Quality::new(self.quality),
            overwrite: self.overwrite,
            ..Default::default()
        }
    }
}

/// User preset location.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PresetsConfig {
    /// Directory of `*.toml` presets. Relative paths resolve against the
    /// config file's directory.
    pub directory: Option<PathBuf>,
}

impl PresetsConfig {
    pub fn resolve_directory(&self, config_path: &Path) -> Option<PathBuf> {
        let dir = self.directory.as_ref()?;
        if dir.is_absolute() {
            return Some(dir.clone());
        }
        let base = config_path.parent().unwrap_or_else(|| Path::new(""));
        Some(base.join(dir))
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(AppConfig::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
/// Returns `Err` if the file exists but contains invalid TOML.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<AppConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: AppConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `path`.
///
/// A missing file yields the stock defaults. Merges user values on top of
/// stock defaults, rejects unknown keys, and validates the result.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let overlay = load_raw_config(path)?;
    if overlay.is_some() {
        tracing::debug!(path = %path.display(), "loaded config");
    }
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `darkroom.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# darkroom configuration
# ======================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Batch scheduler
# ---------------------------------------------------------------------------
[scheduler]
# Number of batch jobs processed at the same time (1-10).
# Further jobs wait in a first-in, first-out queue.
max_concurrent_jobs = 3

# Files processed in parallel inside one job. 1 processes files strictly
# in input order. Larger values are clamped to the number of CPU cores.
file_workers = 1

# Per-file deadline in seconds. A file that exceeds it is recorded as an
# error and the job moves on. Omit for no deadline.
# file_timeout_secs = 120

# ---------------------------------------------------------------------------
# Export defaults (command-line flags override these)
# ---------------------------------------------------------------------------
[export]
# Output format: "jpeg", "png", "webp", "tiff" or "avif".
# PNG, WebP and TIFF are written losslessly.
format = "jpeg"

# Encoding quality for JPEG and AVIF (1-100).
quality = 90

# Replace existing files in the output directory. When false, a file whose
# destination already exists is recorded as an error.
overwrite = false

# ---------------------------------------------------------------------------
# Presets
# ---------------------------------------------------------------------------
[presets]
# Directory of *.toml preset files, relative to this config file.
# User presets override built-in presets with the same name.
# directory = "presets"
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_values() {
        let config = AppConfig::default();
        assert_eq!(config.scheduler.max_concurrent_jobs, 3);
        assert_eq!(config.scheduler.file_workers, 1);
        assert_eq!(config.scheduler.file_timeout_secs, None);
        assert_eq!(config.export.format, OutputFormat::Jpeg);
        assert_eq!(config.export.quality, 90);
        assert!(!config.export.overwrite);
        assert!(config.presets.directory.is_none());
    }

    #[test]
    fn parse_partial_config() {
        let config: AppConfig = toml::from_str(
            r#"
[export]
format = "webp"
"#,
        )
        .unwrap();
        assert_eq!(config.export.format, OutputFormat::Webp);
        assert_eq!(config.export.quality, 90);
        assert_eq!(config.scheduler.max_concurrent_jobs, 3);
    }

    #[test]
    fn unsupported_format_rejected() {
        let result: Result<AppConfig, _> = toml::from_str(
            r#"
[export]
format = "gif"
"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn unknown_key_rejected() {
        let result: Result<AppConfig, _> = toml::from_str(
            r#"
[scheduler]
max_jobs = 4
"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn unknown_section_rejected() {
        let result: Result<AppConfig, _> = toml::from_str("[server]\nport = 80\n");
        assert!(result.is_err());
    }

    // =========================================================================
    // Validation
    // =========================================================================

    #[test]
    fn validate_default_config_passes() {
        assert!(AppConfig::default().validate().is_ok());
    }

    #[test]
    fn validate_concurrency_bounds() {
        let mut config = AppConfig::default();
        config.scheduler.max_concurrent_jobs = 10;
        assert!(config.validate().is_ok());
        config.scheduler.max_concurrent_jobs = 11;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
        config.scheduler.max_concurrent_jobs = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn validate_quality_bounds() {
        let mut config = AppConfig::default();
        config.export.quality = 100;
        assert!(config.validate().is_ok());
        config.export.quality = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn validate_zero_timeout() {
        let mut config = AppConfig::default();
        config.scheduler.file_timeout_secs = Some(0);
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    // =========================================================================
    // Derived options
    // =========================================================================

    #[test]
    fn scheduler_options_carry_timeout() {
        let config = SchedulerConfig {
            max_concurrent_jobs: 2,
            file_workers: 1,
            file_timeout_secs: Some(30),
        };
        let opts = config.options();
        assert_eq!(opts.max_concurrent_jobs, 2);
        assert_eq!(opts.file_workers, 1);
        assert_eq!(opts.file_timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn effective_file_workers_clamped_to_cores() {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        assert_eq!(effective_file_workers(10_000), cores);
        assert_eq!(effective_file_workers(1), 1);
        assert_eq!(effective_file_workers(0), 1);
    }

    #[test]
    fn export_options_from_config() {
        let config = ExportConfig {
            format: OutputFormat::Png,
            quality: 70,
            overwrite: true,
        };
        let opts = config.export_options();
        assert_eq!(opts.format, OutputFormat::Png);
        assert_eq!(opts.quality.value(), 70);
        assert!(opts.overwrite);
        assert!(opts.resize.is_none());
    }

    #[test]
    fn presets_directory_relative_to_config() {
        let presets = PresetsConfig {
            directory: Some(PathBuf::from("looks")),
        };
        assert_eq!(
            presets.resolve_directory(Path::new("/etc/darkroom/darkroom.toml")),
            Some(PathBuf::from("/etc/darkroom/looks"))
        );
        assert_eq!(PresetsConfig::default().resolve_directory(Path::new("x")), None);
    }

    // =========================================================================
    // Loading and merging
    // =========================================================================

    #[test]
    fn merge_toml_table_merge() {
        let base: toml::Value = toml::from_str(
            r#"
[export]
format = "jpeg"
quality = 90
"#,
        )
        .unwrap();
        let overlay: toml::Value = toml::from_str(
            r#"
[export]
quality = 70
"#,
        )
        .unwrap();
        let merged = merge_toml(base, overlay);
        let export = merged.get("export").unwrap();
        assert_eq!(export.get("quality").unwrap().as_integer(), Some(70));
        // format preserved from base
        assert_eq!(export.get("format").unwrap().as_str(), Some("jpeg"));
    }

    #[test]
    fn merge_toml_scalar_override() {
        let base: toml::Value = toml::from_str("a = 1\nb = 2").unwrap();
        let overlay: toml::Value = toml::from_str("a = 10").unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged.get("a").unwrap().as_integer(), Some(10));
        assert_eq!(merged.get("b").unwrap().as_integer(), Some(2));
    }

    #[test]
    fn load_config_returns_default_when_no_file() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(&tmp.path().join(CONFIG_FILE_NAME)).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn load_config_reads_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(CONFIG_FILE_NAME);
        fs::write(
            &path,
            r#"
[scheduler]
max_concurrent_jobs = 5
file_timeout_secs = 60

[export]
overwrite = true
"#,
        )
        .unwrap();
        let config = load_config(&path).unwrap();
        assert_eq!(config.scheduler.max_concurrent_jobs, 5);
        assert_eq!(config.scheduler.file_timeout_secs, Some(60));
        assert!(config.export.overwrite);
        assert_eq!(config.export.quality, 90);
    }

    #[test]
    fn load_config_invalid_toml_is_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "[scheduler\nbroken").unwrap();
        assert!(matches!(load_config(&path), Err(ConfigError::Toml(_))));
    }

    #[test]
    fn load_config_validates_values() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "[export]\nquality = 200\n").unwrap();
        assert!(matches!(load_config(&path), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn stock_defaults_value_has_all_sections() {
        let val = stock_defaults_value().unwrap();
        assert!(val.is_table());
        assert!(val.get("scheduler").is_some());
        assert!(val.get("export").is_some());
        assert!(val.get("presets").is_some());
    }

    // =========================================================================
    // stock_config_toml tests
    // =========================================================================

    #[test]
    fn stock_config_toml_roundtrips_to_defaults() {
        let config: AppConfig = toml::from_str(stock_config_toml()).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn stock_config_toml_contains_all_sections() {
        let content = stock_config_toml();
        assert!(content.contains("[scheduler]"));
        assert!(content.contains("[export]"));
        assert!(content.contains("[presets]"));
    }
}
