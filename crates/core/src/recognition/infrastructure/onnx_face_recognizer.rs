use std::path::Path;

use image::RgbImage;

use super::arcface_embedder::ArcFaceEmbedder;
use super::yolo_face_detector::{FaceBox, YoloFaceDetector};
use crate::recognition::domain::face_recognizer::{FaceRecognizer, RecognizerError};
use crate::shared::constants::{
    DEFAULT_TOLERANCE, EMBEDDING_MODEL_NAME, EMBEDDING_MODEL_URL, YOLO_MODEL_NAME, YOLO_MODEL_URL,
};
use crate::shared::encoding::Encoding;
use crate::shared::model_resolver::{ModelResolveError, ModelResolver, ProgressFn};

/// Fraction of the box size added around a face before embedding.
const CROP_MARGIN: f64 = 0.1;

/// Face recognizer backed by a YOLO detector and an ArcFace embedder.
pub struct OnnxFaceRecognizer {
    detector: YoloFaceDetector,
    embedder: ArcFaceEmbedder,
    tolerance: f64,
}

impl OnnxFaceRecognizer {
    pub fn new(detector: YoloFaceDetector, embedder: ArcFaceEmbedder) -> Self {
        Self {
            detector,
            embedder,
            tolerance: DEFAULT_TOLERANCE,
        }
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Resolve both models (downloading if needed) and open `sessions`
    /// sessions of each, one per concurrent worker.
    pub fn load(
        resolver: &ModelResolver,
        confidence: f64,
        sessions: usize,
        intra_threads: usize,
        progress: impl Fn(&str) -> Option<ProgressFn>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let yolo_path = resolve(resolver, YOLO_MODEL_NAME, YOLO_MODEL_URL, &progress)?;
        let embedding_path =
            resolve(resolver, EMBEDDING_MODEL_NAME, EMBEDDING_MODEL_URL, &progress)?;

        let detector = YoloFaceDetector::new(&yolo_path, confidence, sessions, intra_threads)?;
        let embedder = ArcFaceEmbedder::new(&embedding_path, sessions, intra_threads)?;
        Ok(Self::new(detector, embedder))
    }
}

fn resolve(
    resolver: &ModelResolver,
    name: &str,
    url: &str,
    progress: &impl Fn(&str) -> Option<ProgressFn>,
) -> Result<std::path::PathBuf, ModelResolveError> {
    log::debug!("Resolving model: {name}");
    resolver.resolve(name, url, progress(name))
}

impl FaceRecognizer for OnnxFaceRecognizer {
    fn detect_and_encode(&self, image_path: &Path) -> Result<Vec<Encoding>, RecognizerError> {
        let image = image::open(image_path)
            .map_err(|source| RecognizerError::Decode {
                path: image_path.to_path_buf(),
                source,
            })?
            .to_rgb8();
        if image.width() == 0 || image.height() == 0 {
            return Ok(Vec::new());
        }

        let faces = self.detector.detect(&image)?;
        log::debug!("{}: {} face(s) detected", image_path.display(), faces.len());

        faces
            .iter()
            .map(|face| self.embedder.embed(&square_crop(&image, face)))
            .collect()
    }

    fn tolerance(&self) -> f64 {
        self.tolerance
    }
}

/// Square crop centered on the face with a small margin, clamped to bounds.
fn square_crop(image: &RgbImage, face: &FaceBox) -> RgbImage {
    let (iw, ih) = (image.width() as f64, image.height() as f64);
    let cx = (face.x1 + face.x2) / 2.0;
    let cy = (face.y1 + face.y2) / 2.0;
    let side = (face.x2 - face.x1).max(face.y2 - face.y1) * (1.0 + 2.0 * CROP_MARGIN);
    let half = side / 2.0;

    let x1 = (cx - half).clamp(0.0, iw - 1.0) as u32;
    let y1 = (cy - half).clamp(0.0, ih - 1.0) as u32;
    let x2 = (cx + half).clamp(x1 as f64 + 1.0, iw) as u32;
    let y2 = (cy + half).clamp(y1 as f64 + 1.0, ih) as u32;

    image::imageops::crop_imm(image, x1, y1, x2 - x1, y2 - y1).to_image()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn face(x1: f64, y1: f64, x2: f64, y2: f64) -> FaceBox {
        FaceBox {
            x1,
            y1,
            x2,
            y2,
            confidence: 0.9,
        }
    }

    #[test]
    fn test_square_crop_adds_margin() {
        let image = RgbImage::new(200, 200);
        let crop = square_crop(&image, &face(50.0, 50.0, 100.0, 100.0));
        // 50px box + 10% margin per side
        assert_eq!(crop.dimensions(), (60, 60));
    }

    #[test]
    fn test_square_crop_uses_longer_side() {
        let image = RgbImage::new(200, 200);
        let crop = square_crop(&image, &face(50.0, 50.0, 100.0, 150.0));
        assert_eq!(crop.width(), crop.height());
        assert_eq!(crop.width(), 120);
    }

    #[test]
    fn test_square_crop_clamped_to_image() {
        let image = RgbImage::new(100, 80);
        let crop = square_crop(&image, &face(-20.0, -20.0, 40.0, 40.0));
        assert!(crop.width() <= 100);
        assert!(crop.height() <= 80);
        assert!(crop.width() > 0 && crop.height() > 0);
    }

    #[test]
    fn test_square_crop_degenerate_box_is_non_empty() {
        let image = RgbImage::new(10, 10);
        let crop = square_crop(&image, &face(12.0, 12.0, 12.0, 12.0));
        assert_eq!(crop.dimensions(), (1, 1));
    }
}
