//! Export encoding: adjusted image in, encoded file out.
//!
//! [`ExportOptions`] says what the file should look like (format, quality,
//! optional resize) and how it is named. [`encode`] produces the bytes;
//! [`export`] also writes them through the backend's atomic write.

use crate::imaging::{BackendError, ImageBackend, OutputFormat, Quality, ResizeParams};
use crate::naming::NamingOptions;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Output settings attached to an export or a batch job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExportOptions {
    pub format: OutputFormat,
    pub quality: Quality,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resize: Option<ResizeParams>,
    pub naming: NamingOptions,
    /// Replace existing destination files.
    pub overwrite: bool,
}

/// Resize (if requested) and encode.
pub fn encode<B: ImageBackend + ?Sized>(
    backend: &B,
    img: DynamicImage,
    options: &ExportOptions,
) -> Result<Vec<u8>, ExportError> {
    let img = match &options.resize {
        Some(resize) => backend.resize(img, resize)?,
        None => img,
    };
    Ok(backend.encode(&img, options.format, options.quality)?)
}

/// Encode and write to `output`.
///
/// Does not consult `options.overwrite`; callers that care check the
/// destination first.
pub fn export<B: ImageBackend + ?Sized>(
    backend: &B,
    img: DynamicImage,
    options: &ExportOptions,
    output: &Path,
) -> Result<(), ExportError> {
    let bytes = encode(backend, img, options)?;
    backend.write(&bytes, output)?;
    tracing::debug!(
        output = %output.display(),
        bytes = bytes.len(),
        format = %options.format,
        "exported"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::Fit;
    use crate::imaging::backend::tests::{MockBackend, RecordedOp};
    use image::RgbImage;

    fn blank() -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::new(4, 4))
    }

    #[test]
    fn defaults_are_jpeg_quality_90() {
        let opts = ExportOptions::default();
        assert_eq!(opts.format, OutputFormat::Jpeg);
        assert_eq!(opts.quality.value(), 90);
        assert!(!opts.overwrite);
        assert!(opts.resize.is_none());
    }

    #[test]
    fn unknown_format_rejected_when_deserializing() {
        let result: Result<ExportOptions, _> = toml::from_str("format = \"gif\"");
        assert!(result.is_err());
    }

    #[test]
    fn export_resizes_encodes_then_writes() {
        let backend = MockBackend::new();
        let opts = ExportOptions {
            format: OutputFormat::Webp,
            quality: Quality::new(70),
            resize: Some(ResizeParams {
                width: Some(100),
                height: None,
                fit: Fit::Inside,
            }),
            ..Default::default()
        };
        export(&backend, blank(), &opts, Path::new("/out/a.webp")).unwrap();

        assert_eq!(
            backend.get_operations(),
            vec![
                RecordedOp::Resize(ResizeParams {
                    width: Some(100),
                    height: None,
                    fit: Fit::Inside,
                }),
                RecordedOp::Encode {
                    format: OutputFormat::Webp,
                    quality: 70
                },
                RecordedOp::Write("/out/a.webp".into()),
            ]
        );
    }

    #[test]
    fn options_parse_from_toml() {
        let opts: ExportOptions = toml::from_str(
            r#"
            format = "png"
            quality = 75
            overwrite = true

            [resize]
            width = 1024
            fit = "cover"

            [naming]
            suffix = "-web"
            "#,
        )
        .unwrap();
        assert_eq!(opts.format, OutputFormat::Png);
        assert_eq!(opts.quality.value(), 75);
        assert!(opts.overwrite);
        assert_eq!(opts.resize.unwrap().fit, Fit::Cover);
        assert_eq!(opts.naming.suffix.as_deref(), Some("-web"));
    }
}
