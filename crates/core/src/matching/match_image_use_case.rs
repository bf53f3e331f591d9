use std::path::Path;

use thiserror::Error;

use crate::gallery::domain::gallery::{Gallery, GalleryEntry};
use crate::matching::claim::{IdentityClaims, ImageResult};
use crate::matching::conflict_resolver;
use crate::matching::encoding_cache::EncodingCache;
use crate::recognition::domain::face_recognizer::{FaceRecognizer, RecognizerError};
use crate::shared::encoding::Encoding;

#[derive(Error, Debug)]
pub enum MatchError {
    #[error("no faces found in {image}; image will not be included in results")]
    NoFaceDetected { image: String },
    #[error("gallery entry {entry} is corrupt ({reason}); {image} was not matched")]
    CorruptGalleryEntry {
        image: String,
        entry: String,
        reason: String,
    },
    #[error("could not read faces from {image}: {source}")]
    Recognizer {
        image: String,
        #[source]
        source: RecognizerError,
    },
    #[error("matching {image} panicked: {message}")]
    Panicked { image: String, message: String },
}

/// Cache key for an image: its file name, never the full path.
pub fn image_key(image_path: &Path) -> String {
    image_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| image_path.to_string_lossy().into_owned())
}

/// Matches one image against every gallery entry.
///
/// Pipeline: encodings (cache or recognizer) → claims per identity →
/// conflict resolution.
pub struct MatchImageUseCase<'a> {
    recognizer: &'a dyn FaceRecognizer,
    gallery: &'a Gallery,
    cache: &'a EncodingCache,
}

impl<'a> MatchImageUseCase<'a> {
    pub fn new(
        recognizer: &'a dyn FaceRecognizer,
        gallery: &'a Gallery,
        cache: &'a EncodingCache,
    ) -> Self {
        Self {
            recognizer,
            gallery,
            cache,
        }
    }

    pub fn execute(&self, image_path: &Path) -> Result<ImageResult, MatchError> {
        let image = image_key(image_path);
        let encodings = self.encodings(image_path, &image)?;

        let mut claims = Vec::new();
        for entry in self.gallery.entries() {
            let identity = match entry {
                GalleryEntry::Identity(identity) => identity,
                GalleryEntry::Corrupt { name, reason } => {
                    return Err(MatchError::CorruptGalleryEntry {
                        image,
                        entry: name.clone(),
                        reason: reason.clone(),
                    });
                }
            };

            let found: Vec<bool> = encodings
                .iter()
                .map(|e| self.recognizer.compare(&identity.encodings, e))
                .collect();
            let distances: Vec<f64> = encodings
                .iter()
                .map(|e| self.recognizer.distance(&identity.encodings, e))
                .collect();

            let faces: Vec<(usize, f64)> = found
                .iter()
                .zip(distances)
                .enumerate()
                .filter(|(_, (matched, _))| **matched)
                .map(|(face, (_, distance))| (face, distance))
                .collect();
            if !faces.is_empty() {
                claims.push(IdentityClaims::new(identity.key.clone(), faces));
            }
        }

        Ok(conflict_resolver::resolve(&claims))
    }

    /// Cached encodings, or fresh ones from the recognizer (then cached).
    fn encodings(&self, image_path: &Path, image: &str) -> Result<Vec<Encoding>, MatchError> {
        let encodings = match self.cache.get(image) {
            Some(cached) => cached,
            None => {
                let detected = self
                    .recognizer
                    .detect_and_encode(image_path)
                    .map_err(|source| MatchError::Recognizer {
                        image: image_path.display().to_string(),
                        source,
                    })?;
                if !detected.is_empty() {
                    self.cache.put(image, detected.clone());
                }
                detected
            }
        };

        if encodings.is_empty() {
            return Err(MatchError::NoFaceDetected {
                image: image_path.display().to_string(),
            });
        }
        Ok(encodings)
    }
}
