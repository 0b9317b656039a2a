//! Image processing: pure Rust, statically linked.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Decode** | `image::ImageReader` (JPEG, PNG, TIFF, WebP) |
//! | **Tone / color** | lookup tables and per-pixel matrices |
//! | **Detail** | Gaussian blur, unsharp mask, median |
//! | **Resize** | Lanczos3 (`inside`, `cover`, `fill`) |
//! | **Encode** | JPEG, PNG, WebP (lossless), TIFF, AVIF |
//!
//! The module is split into:
//! - **Calculations**: Pure functions mapping adjustment dials to primitive
//!   parameters (unit testable)
//! - **Parameters**: Data structures describing primitive operations
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]

pub mod backend;
pub mod calculations;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, ImageBackend};
pub use params::{
    Fit, Modulate, OutputFormat, Quality, ResizeParams, Sharpening, UnsupportedFormat,
};
pub use rust_backend::{RustBackend, is_supported_input, supported_input_extensions};
