//! Parameter types for backend primitives.
//!
//! These structs describe *what* a primitive should do, not *how*. They are
//! the interface between the [`pipeline`](crate::pipeline) (which decides
//! which primitives to run) and the [`backend`](super::backend) (which does
//! the pixel work). Keeping them plain data lets the pipeline be planned and
//! tested against a recording mock.
//!
//! ## Types
//!
//! - [`Quality`]: lossy encoding quality (1–100, default 90). Clamped on construction.
//! - [`Sharpening`]: unsharp-mask parameters (sigma, amount, threshold).
//! - [`Modulate`]: brightness / saturation multipliers and a hue rotation in degrees.
//! - [`ResizeParams`] / [`Fit`]: target box and how the image is fitted into it.
//! - [`OutputFormat`]: encodable container formats.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "u32", into = "u32")]
pub struct Quality(u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(90)
    }
}

impl From<u32> for Quality {
    fn from(value: u32) -> Self {
        Self::new(value)
    }
}

impl From<Quality> for u32 {
    fn from(q: Quality) -> Self {
        q.0
    }
}

/// Unsharp-mask parameters.
///
/// - `sigma`: radius of the Gaussian blur the mask is built from
/// - `amount`: how much of the (original - blurred) difference is added back
/// - `threshold`: minimum difference (0-255) before a pixel is sharpened
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sharpening {
    pub sigma: f32,
    pub amount: f32,
    pub threshold: i32,
}

/// Brightness/saturation/hue modulation.
///
/// `brightness` and `saturation` are multipliers (1.0 = unchanged), `hue` is
/// a rotation in degrees (0.0 = unchanged).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Modulate {
    pub brightness: f32,
    pub saturation: f32,
    pub hue: f32,
}

impl Modulate {
    pub const NEUTRAL: Modulate = Modulate {
        brightness: 1.0,
        saturation: 1.0,
        hue: 0.0,
    };

    pub fn brightness(brightness: f32) -> Self {
        Self {
            brightness,
            ..Self::NEUTRAL
        }
    }

    pub fn saturation(saturation: f32) -> Self {
        Self {
            saturation,
            ..Self::NEUTRAL
        }
    }

    pub fn hue(hue: f32) -> Self {
        Self {
            hue,
            ..Self::NEUTRAL
        }
    }

    pub fn is_neutral(&self) -> bool {
        *self == Self::NEUTRAL
    }
}

impl Default for Modulate {
    fn default() -> Self {
        Self::NEUTRAL
    }
}

/// How an image is fitted into a target box.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Fit {
    /// Preserve aspect ratio, fit entirely inside the box.
    #[default]
    Inside,
    /// Preserve aspect ratio, cover the box, center-crop the overflow.
    Cover,
    /// Stretch to the exact box, ignoring aspect ratio.
    Fill,
}

impl FromStr for Fit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "inside" | "contain" => Ok(Fit::Inside),
            "cover" => Ok(Fit::Cover),
            "fill" => Ok(Fit::Fill),
            other => Err(format!("unknown fit: {other} (expected inside, cover or fill)")),
        }
    }
}

/// Target dimensions for a resize. A missing side is derived from the
/// source aspect ratio.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResizeParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    pub fit: Fit,
}

/// Encodable output formats.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum OutputFormat {
    #[default]
    Jpeg,
    Png,
    Webp,
    Tiff,
    Avif,
}

impl OutputFormat {
    /// File extension written for this format.
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "jpg",
            OutputFormat::Png => "png",
            OutputFormat::Webp => "webp",
            OutputFormat::Tiff => "tiff",
            OutputFormat::Avif => "avif",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "jpeg",
            OutputFormat::Png => "png",
            OutputFormat::Webp => "webp",
            OutputFormat::Tiff => "tiff",
            OutputFormat::Avif => "avif",
        }
    }

    /// Whether the encoder discards data (and therefore honors `quality`).
    pub fn is_lossy(self) -> bool {
        matches!(self, OutputFormat::Jpeg | OutputFormat::Avif)
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for format names no encoder is compiled in for.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported export format: {0}")]
pub struct UnsupportedFormat(pub String);

impl FromStr for OutputFormat {
    type Err = UnsupportedFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "jpeg" | "jpg" => Ok(OutputFormat::Jpeg),
            "png" => Ok(OutputFormat::Png),
            "webp" => Ok(OutputFormat::Webp),
            "tiff" | "tif" => Ok(OutputFormat::Tiff),
            "avif" => Ok(OutputFormat::Avif),
            other => Err(UnsupportedFormat(other.to_string())),
        }
    }
}

impl TryFrom<String> for OutputFormat {
    type Error = UnsupportedFormat;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<OutputFormat> for String {
    fn from(format: OutputFormat) -> Self {
        format.as_str().to_string()
    }
}
