//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait is the pixel boundary of the crate: decode,
//! a handful of primitives (gamma, linear, modulate, sharpen, blur, median,
//! resize), encode and write. The [`pipeline`](crate::pipeline) decides which
//! primitives run with which parameters; the backend only executes them.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend), built on the `image`
//! crate. Tests use the recording [`MockBackend`](tests::MockBackend).

use super::params::{Modulate, OutputFormat, Quality, ResizeParams, Sharpening};
use image::DynamicImage;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Decode failed: {0}")]
    Decode(String),
    #[error("Encode failed: {0}")]
    Encode(String),
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
}

/// Trait for image processing backends.
///
/// Primitives take the image by value and return the transformed image so a
/// backend can work in place when the buffer allows it. Implementations must
/// be deterministic: the same input and parameters give identical pixels.
///
/// `Send + Sync` so one backend can be shared by every scheduler worker.
pub trait ImageBackend: Send + Sync {
    /// Read and decode a source file.
    fn decode(&self, path: &Path) -> Result<DynamicImage, BackendError>;

    /// Gamma curve: `out = in^(1/gamma)` on normalized channels. `gamma > 1` brightens.
    fn gamma(&self, img: DynamicImage, gamma: f32) -> Result<DynamicImage, BackendError>;

    /// Per-channel `out = in * scale + offset`, clamped to the channel range.
    fn linear(&self, img: DynamicImage, scale: f32, offset: f32)
    -> Result<DynamicImage, BackendError>;

    /// Brightness and saturation multipliers plus a hue rotation.
    fn modulate(&self, img: DynamicImage, params: Modulate) -> Result<DynamicImage, BackendError>;

    /// Unsharp mask.
    fn sharpen(&self, img: DynamicImage, params: Sharpening) -> Result<DynamicImage, BackendError>;

    /// Gaussian blur.
    fn blur(&self, img: DynamicImage, sigma: f32) -> Result<DynamicImage, BackendError>;

    /// Median filter over a `(2r+1)²` window.
    fn median(&self, img: DynamicImage, radius: u32) -> Result<DynamicImage, BackendError>;

    /// Resize into the given box.
    fn resize(&self, img: DynamicImage, params: &ResizeParams)
    -> Result<DynamicImage, BackendError>;

    /// Encode to an in-memory buffer. Lossless formats ignore `quality`.
    fn encode(
        &self,
        img: &DynamicImage,
        format: OutputFormat,
        quality: Quality,
    ) -> Result<Vec<u8>, BackendError>;

    /// Write encoded bytes to `path`. Readers never observe a partial file.
    fn write(&self, bytes: &[u8], path: &Path) -> Result<(), BackendError>;
}
