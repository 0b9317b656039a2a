//! Pure Rust image processing backend built on the `image` crate.
//!
//! Everything is statically linked into the binary.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, TIFF, WebP) | `image::ImageReader` with content sniffing |
//! | Gamma, linear | 256-entry lookup table per call |
//! | Modulate | per-pixel brightness, luma blend, hue-rotation matrix |
//! | Sharpen | `image::imageops::blur` + unsharp mask with amount |
//! | Blur | `image::imageops::blur` (Gaussian) |
//! | Median | windowed per-channel median |
//! | Resize | `resize_exact` with `Lanczos3`; cover = fill then center crop |
//! | Encode | `image::codecs::{jpeg, png, webp, tiff, avif}` |
//! | Write | `tempfile::NamedTempFile` in the target directory, then `persist` |
//!
//! Pixel work happens on 8-bit RGB, or RGBA when the source has alpha.
//! Alpha is carried through untouched by every color primitive.

use super::backend::{BackendError, ImageBackend};
use super::calculations::{
    calculate_fill_dimensions, calculate_resize_dimensions, hue_rotation_matrix,
};
use super::params::{Fit, Modulate, OutputFormat, Quality, ResizeParams, Sharpening};
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, ImageReader, RgbImage, RgbaImage};
use std::io::{Cursor, Write};
use std::path::Path;
use std::sync::LazyLock;

/// Extensions whose decoders are compiled in and known to work.
///
/// AVIF is excluded: the `image` crate's `"avif"` feature only enables the
/// **encoder**. `ImageFormat::reading_enabled()` reports `true` for AVIF
/// anyway, so the list is filtered by hand.
const PHOTO_CANDIDATES: &[(&str, ImageFormat)] = &[
    ("jpg", ImageFormat::Jpeg),
    ("jpeg", ImageFormat::Jpeg),
    ("png", ImageFormat::Png),
    ("tif", ImageFormat::Tiff),
    ("tiff", ImageFormat::Tiff),
    ("webp", ImageFormat::WebP),
];

static SUPPORTED_EXTENSIONS: LazyLock<Vec<&'static str>> = LazyLock::new(|| {
    PHOTO_CANDIDATES
        .iter()
        .filter(|(_, fmt)| fmt.reading_enabled())
        .map(|(ext, _)| *ext)
        .collect()
});

/// Returns the set of image file extensions that have working decoders compiled in.
pub fn supported_input_extensions() -> &'static [&'static str] {
    &SUPPORTED_EXTENSIONS
}

/// Whether `path` has one of the [`supported_input_extensions`].
pub fn is_supported_input(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| {
            supported_input_extensions()
                .iter()
                .any(|s| s.eq_ignore_ascii_case(e))
        })
}

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// 8-bit working buffer.
enum Working {
    Rgb(RgbImage),
    Rgba(RgbaImage),
}

impl Working {
    fn from_dynamic(img: DynamicImage) -> Self {
        if img.color().has_alpha() {
            Working::Rgba(img.into_rgba8())
        } else {
            Working::Rgb(img.into_rgb8())
        }
    }

    fn into_dynamic(self) -> DynamicImage {
        match self {
            Working::Rgb(b) => DynamicImage::ImageRgb8(b),
            Working::Rgba(b) => DynamicImage::ImageRgba8(b),
        }
    }

    fn channels(&self) -> usize {
        match self {
            Working::Rgb(_) => 3,
            Working::Rgba(_) => 4,
        }
    }

    fn dimensions(&self) -> (u32, u32) {
        match self {
            Working::Rgb(b) => b.dimensions(),
            Working::Rgba(b) => b.dimensions(),
        }
    }

    fn bytes(&self) -> &[u8] {
        match self {
            Working::Rgb(b) => &**b,
            Working::Rgba(b) => &**b,
        }
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        match self {
            Working::Rgb(b) => &mut **b,
            Working::Rgba(b) => &mut **b,
        }
    }

    fn blurred(&self, sigma: f32) -> Working {
        match self {
            Working::Rgb(b) => Working::Rgb(image::imageops::blur(b, sigma)),
            Working::Rgba(b) => Working::Rgba(image::imageops::blur(b, sigma)),
        }
    }

    /// Apply `f` to the RGB triple of every pixel.
    fn for_each_color(&mut self, mut f: impl FnMut(&mut [u8])) {
        let channels = self.channels();
        for px in self.bytes_mut().chunks_exact_mut(channels) {
            f(&mut px[..3]);
        }
    }
}

fn to_u8(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

fn apply_lut(img: DynamicImage, lut: &[u8; 256]) -> DynamicImage {
    let mut working = Working::from_dynamic(img);
    working.for_each_color(|px| {
        for v in px {
            *v = lut[*v as usize];
        }
    });
    working.into_dynamic()
}

fn gamma_lut(gamma: f32) -> [u8; 256] {
    let exponent = 1.0 / gamma;
    std::array::from_fn(|i| to_u8(255.0 * (i as f32 / 255.0).powf(exponent)))
}

fn linear_lut(scale: f32, offset: f32) -> [u8; 256] {
    std::array::from_fn(|i| to_u8(i as f32 * scale + offset))
}

fn modulate_pixel(px: &mut [u8], params: &Modulate, hue: Option<&[[f32; 3]; 3]>) {
    let mut rgb = [
        px[0] as f32 * params.brightness,
        px[1] as f32 * params.brightness,
        px[2] as f32 * params.brightness,
    ];
    if params.saturation != 1.0 {
        let luma = 0.299 * rgb[0] + 0.587 * rgb[1] + 0.114 * rgb[2];
        for c in &mut rgb {
            *c = luma + (*c - luma) * params.saturation;
        }
    }
    if let Some(m) = hue {
        rgb = [
            m[0][0] * rgb[0] + m[0][1] * rgb[1] + m[0][2] * rgb[2],
            m[1][0] * rgb[0] + m[1][1] * rgb[1] + m[1][2] * rgb[2],
            m[2][0] * rgb[0] + m[2][1] * rgb[1] + m[2][2] * rgb[2],
        ];
    }
    for (dst, v) in px.iter_mut().zip(rgb) {
        *dst = to_u8(v);
    }
}

fn median_filter(working: &Working, radius: u32) -> Working {
    let (w, h) = working.dimensions();
    let channels = working.channels();
    let src = working.bytes();
    let r = radius as i64;
    let mut out = src.to_vec();
    let mut window = Vec::with_capacity(((2 * r + 1) * (2 * r + 1)) as usize);

    for y in 0..h as i64 {
        for x in 0..w as i64 {
            let base = ((y * w as i64 + x) as usize) * channels;
            for c in 0..3 {
                window.clear();
                for dy in -r..=r {
                    let sy = (y + dy).clamp(0, h as i64 - 1);
                    for dx in -r..=r {
                        let sx = (x + dx).clamp(0, w as i64 - 1);
                        window.push(src[((sy * w as i64 + sx) as usize) * channels + c]);
                    }
                }
                let mid = window.len() / 2;
                let (_, median, _) = window.select_nth_unstable(mid);
                out[base + c] = *median;
            }
        }
    }

    match working {
        Working::Rgb(_) => Working::Rgb(RgbImage::from_raw(w, h, out).unwrap_or_default()),
        Working::Rgba(_) => Working::Rgba(RgbaImage::from_raw(w, h, out).unwrap_or_default()),
    }
}

/// Pixel layout handed to the encoder for `format`.
///
/// PNG and TIFF keep the source's bit depth. TIFF has no gray+alpha layout,
/// so those sources become RGBA, and float sources are stored as 16-bit.
/// Everything else is encoded as 8-bit RGB(A); JPEG drops alpha.
fn encodable(img: &DynamicImage, format: OutputFormat) -> DynamicImage {
    use DynamicImage as D;
    let deep = matches!(format, OutputFormat::Png | OutputFormat::Tiff);
    let alpha = img.color().has_alpha();
    match img {
        D::ImageLuma8(_)
        | D::ImageLuma16(_)
        | D::ImageRgb8(_)
        | D::ImageRgba8(_)
        | D::ImageRgb16(_)
        | D::ImageRgba16(_)
            if deep =>
        {
            img.clone()
        }
        D::ImageLumaA8(_) | D::ImageLumaA16(_) if format == OutputFormat::Png => img.clone(),
        D::ImageLumaA8(_) if deep => D::ImageRgba8(img.to_rgba8()),
        _ if deep && alpha => D::ImageRgba16(img.to_rgba16()),
        _ if deep => D::ImageRgb16(img.to_rgb16()),
        _ if alpha && format != OutputFormat::Jpeg => D::ImageRgba8(img.to_rgba8()),
        _ => D::ImageRgb8(img.to_rgb8()),
    }
}

/// Encode into memory in the layout [`encodable`] picks for `format`.
fn encode_image(
    img: &DynamicImage,
    format: OutputFormat,
    quality: Quality,
) -> Result<Vec<u8>, BackendError> {
    let mut buf = Vec::new();
    let q = quality.value() as u8;
    let normalized = encodable(img, format);

    let result = match format {
        OutputFormat::Jpeg => normalized.write_with_encoder(
            image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, q),
        ),
        OutputFormat::Png => {
            normalized.write_with_encoder(image::codecs::png::PngEncoder::new(&mut buf))
        }
        OutputFormat::Webp => {
            normalized.write_with_encoder(image::codecs::webp::WebPEncoder::new_lossless(&mut buf))
        }
        OutputFormat::Tiff => normalized.write_with_encoder(
            image::codecs::tiff::TiffEncoder::new(Cursor::new(&mut buf)),
        ),
        // speed=6 for reasonable throughput
        OutputFormat::Avif => normalized.write_with_encoder(
            image::codecs::avif::AvifEncoder::new_with_speed_quality(&mut buf, 6, q),
        ),
    };
    result.map_err(|e| BackendError::Encode(format!("{format}: {e}")))?;
    Ok(buf)
}

impl ImageBackend for RustBackend {
    fn decode(&self, path: &Path) -> Result<DynamicImage, BackendError> {
        let named = |e: std::io::Error| {
            BackendError::Io(std::io::Error::new(e.kind(), format!("{}: {e}", path.display())))
        };
        ImageReader::open(path)
            .map_err(named)?
            .with_guessed_format()
            .map_err(named)?
            .decode()
            .map_err(|e| BackendError::Decode(format!("{}: {}", path.display(), e)))
    }

    fn gamma(&self, img: DynamicImage, gamma: f32) -> Result<DynamicImage, BackendError> {
        if !(gamma.is_finite() && gamma > 0.0) {
            return Err(BackendError::ProcessingFailed(format!(
                "gamma must be positive, got {gamma}"
            )));
        }
        Ok(apply_lut(img, &gamma_lut(gamma)))
    }

    fn linear(
        &self,
        img: DynamicImage,
        scale: f32,
        offset: f32,
    ) -> Result<DynamicImage, BackendError> {
        Ok(apply_lut(img, &linear_lut(scale, offset)))
    }

    fn modulate(&self, img: DynamicImage, params: Modulate) -> Result<DynamicImage, BackendError> {
        if params.is_neutral() {
            return Ok(img);
        }
        let matrix = (params.hue != 0.0).then(|| hue_rotation_matrix(params.hue));
        let mut working = Working::from_dynamic(img);
        working.for_each_color(|px| modulate_pixel(px, &params, matrix.as_ref()));
        Ok(working.into_dynamic())
    }

    fn sharpen(&self, img: DynamicImage, params: Sharpening) -> Result<DynamicImage, BackendError> {
        if params.sigma <= 0.0 || params.amount == 0.0 {
            return Ok(img);
        }
        let mut working = Working::from_dynamic(img);
        let blurred = working.blurred(params.sigma);
        let channels = working.channels();
        for (i, (orig, blur)) in working
            .bytes_mut()
            .iter_mut()
            .zip(blurred.bytes())
            .enumerate()
        {
            if i % channels == 3 {
                continue;
            }
            let diff = *orig as i32 - *blur as i32;
            if diff.abs() > params.threshold {
                *orig = to_u8(*orig as f32 + params.amount * diff as f32);
            }
        }
        Ok(working.into_dynamic())
    }

    fn blur(&self, img: DynamicImage, sigma: f32) -> Result<DynamicImage, BackendError> {
        if sigma <= 0.0 {
            return Ok(img);
        }
        Ok(Working::from_dynamic(img).blurred(sigma).into_dynamic())
    }

    fn median(&self, img: DynamicImage, radius: u32) -> Result<DynamicImage, BackendError> {
        if radius == 0 {
            return Ok(img);
        }
        let working = Working::from_dynamic(img);
        Ok(median_filter(&working, radius).into_dynamic())
    }

    fn resize(
        &self,
        img: DynamicImage,
        params: &ResizeParams,
    ) -> Result<DynamicImage, BackendError> {
        let source = (img.width(), img.height());
        let Some((w, h)) = calculate_resize_dimensions(source, params) else {
            return Ok(img);
        };
        if w == 0 || h == 0 {
            return Err(BackendError::ProcessingFailed(format!(
                "cannot resize to {w}x{h}"
            )));
        }

        let both_sides = params.width.is_some() && params.height.is_some();
        if both_sides && params.fit == Fit::Cover {
            // Fill-resize then center-crop to exact dimensions
            let (fw, fh) = calculate_fill_dimensions(source, (w, h));
            let filled = img.resize_exact(fw, fh, FilterType::Lanczos3);
            return Ok(filled.crop_imm((fw - w) / 2, (fh - h) / 2, w, h));
        }
        Ok(img.resize_exact(w, h, FilterType::Lanczos3))
    }

    fn encode(
        &self,
        img: &DynamicImage,
        format: OutputFormat,
        quality: Quality,
    ) -> Result<Vec<u8>, BackendError> {
        encode_image(img, format, quality)
    }

    fn write(&self, bytes: &[u8], path: &Path) -> Result<(), BackendError> {
        let parent = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
        tmp.write_all(bytes)?;
        tmp.flush()?;
        tmp.persist(path).map_err(|e| BackendError::Io(e.error))?;
        Ok(())
    }
}
