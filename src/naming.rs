//! Output filename convention for exported photos.
//!
//! Every exported file is named from its source stem:
//!
//! ```text
//! [prefix]stem[suffix][_NNN].ext
//! ```
//!
//! - `prefix` / `suffix`: optional literal strings
//! - `_NNN`: the file's 1-based position in its job, zero-padded to three
//!   digits, only when `include_index` is set (`_001`, `_042`, `_1000`)
//! - `ext`: from the export format (`jpeg` → `jpg`, `png`, `webp`, `tiff`, `avif`)
//!
//! Examples:
//! - `photo.jpg`, prefix `edit_`, index 0, jpeg → `edit_photo_001.jpg`
//! - `IMG_0042.CR2`, suffix `-web`, webp → `IMG_0042-web.webp`

use crate::imaging::OutputFormat;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// How output files are named.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NamingOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suffix: Option<String>,
    pub include_index: bool,
}

/// Build the output filename for the file at `index` (0-based) of a job.
pub fn output_file_name(
    input: &Path,
    index: usize,
    naming: &NamingOptions,
    format: OutputFormat,
) -> String {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut name = String::new();
    if let Some(prefix) = &naming.prefix {
        name.push_str(prefix);
    }
    name.push_str(&stem);
    if let Some(suffix) = &naming.suffix {
        name.push_str(suffix);
    }
    if naming.include_index {
        name.push_str(&format!("_{:03}", index + 1));
    }
    name.push('.');
    name.push_str(format.extension());
    name
}

/// [`output_file_name`] joined onto `output_dir`.
pub fn output_path(
    output_dir: &Path,
    input: &Path,
    index: usize,
    naming: &NamingOptions,
    format: OutputFormat,
) -> PathBuf {
    output_dir.join(output_file_name(input, index, naming, format))
}
