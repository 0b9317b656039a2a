//! Single-photo operations for interactive callers.
//!
//! These propagate every error; the batch scheduler wraps the same steps
//! with per-file isolation instead.

use crate::adjustments::AdjustmentSet;
use crate::export::{self, ExportError, ExportOptions};
use crate::imaging::{BackendError, ImageBackend};
use crate::pipeline::{self, PipelineError};
use image::DynamicImage;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PhotoError {
    /// The backend's message already names the file.
    #[error(transparent)]
    Decode(BackendError),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error(transparent)]
    Export(#[from] ExportError),
}

fn decode<B: ImageBackend + ?Sized>(backend: &B, path: &Path) -> Result<DynamicImage, PhotoError> {
    backend.decode(path).map_err(PhotoError::Decode)
}

/// Decode `path` and apply `adjustments`, returning the edited pixels.
pub fn process_photo<B: ImageBackend + ?Sized>(
    backend: &B,
    path: &Path,
    adjustments: &AdjustmentSet,
) -> Result<DynamicImage, PhotoError> {
    let img = decode(backend, path)?;
    Ok(pipeline::apply(backend, img, adjustments)?)
}

/// Decode `path`, optionally adjust it, and export to `output`.
pub fn export_photo<B: ImageBackend + ?Sized>(
    backend: &B,
    path: &Path,
    output: &Path,
    options: &ExportOptions,
    adjustments: Option<&AdjustmentSet>,
) -> Result<(), PhotoError> {
    let img = match adjustments {
        Some(adj) => process_photo(backend, path, adj)?,
        None => decode(backend, path)?,
    };
    export::export(backend, img, options, output)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::backend::tests::{MockBackend, RecordedOp};
    use crate::imaging::{OutputFormat, Quality};

    #[test]
    fn process_decodes_then_adjusts() {
        let backend = MockBackend::new();
        let adj = AdjustmentSet {
            exposure: 1.0,
            ..Default::default()
        };
        process_photo(&backend, Path::new("/in/a.jpg"), &adj).unwrap();
        assert_eq!(
            backend.get_operations(),
            vec![
                RecordedOp::Decode("/in/a.jpg".into()),
                RecordedOp::Gamma(2.0)
            ]
        );
    }

    #[test]
    fn export_without_adjustments_skips_pipeline() {
        let backend = MockBackend::new();
        let opts = ExportOptions {
            format: OutputFormat::Png,
            quality: Quality::new(50),
            ..Default::default()
        };
        export_photo(
            &backend,
            Path::new("/in/a.jpg"),
            Path::new("/out/a.png"),
            &opts,
            None,
        )
        .unwrap();
        assert!(backend.get_primitives().is_empty());
        assert_eq!(backend.get_operations().len(), 3);
    }

    #[test]
    fn decode_failure_names_the_file() {
        let backend = MockBackend::failing_decode_for(&["/in/bad.jpg"]);
        let err = process_photo(&backend, Path::new("/in/bad.jpg"), &AdjustmentSet::default())
            .unwrap_err();
        assert!(matches!(&err, PhotoError::Decode(BackendError::Decode(_))));
        let message = err.to_string();
        assert_eq!(message, "Decode failed: /in/bad.jpg: not an image");
        assert_eq!(message.matches("/in/bad.jpg").count(), 1);
    }

    #[test]
    fn decode_failure_writes_nothing() {
        let backend = MockBackend::failing_decode_for(&["/in/bad.jpg"]);
        let result = export_photo(
            &backend,
            Path::new("/in/bad.jpg"),
            Path::new("/out/bad.jpg"),
            &ExportOptions::default(),
            Some(&AdjustmentSet::default()),
        );
        assert!(result.is_err());
        assert!(
            !backend
                .get_operations()
                .iter()
                .any(|op| matches!(op, RecordedOp::Write(_)))
        );
    }
}
