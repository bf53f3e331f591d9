use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::shared::constants::DEFAULT_TOLERANCE;
use crate::shared::encoding::{self, Encoding};

#[derive(Error, Debug)]
pub enum RecognizerError {
    #[error("failed to decode image {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("inference failed: {0}")]
    Inference(String),
}

/// Domain interface for the facial-recognition provider.
///
/// Implementations are shared across worker threads, hence `Sync` and `&self`.
pub trait FaceRecognizer: Send + Sync {
    /// Detect every face in the image and return one encoding per face.
    ///
    /// An image without faces yields an empty list, not an error.
    fn detect_and_encode(&self, image_path: &Path) -> Result<Vec<Encoding>, RecognizerError>;

    /// Distance at or below which an encoding matches a reference.
    fn tolerance(&self) -> f64 {
        DEFAULT_TOLERANCE
    }

    /// Minimum distance from `candidate` to any of the reference encodings.
    fn distance(&self, references: &[Encoding], candidate: &Encoding) -> f64 {
        encoding::min_distance(references, candidate)
    }

    fn compare(&self, references: &[Encoding], candidate: &Encoding) -> bool {
        self.distance(references, candidate) <= self.tolerance()
    }
}
