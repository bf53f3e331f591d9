use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::gallery::domain::gallery_store::{GalleryError, GalleryStore};
use crate::gallery::domain::identity::{Identity, IdentityKey};
use crate::gallery::domain::identity_name::{parse_identity_name, IdentityNameError};
use crate::matching::batch_console::report_errors;
use crate::matching::infrastructure::worker_pool::{catch_panic, WorkerPool};
use crate::matching::match_image_use_case::image_key;
use crate::recognition::domain::face_recognizer::{FaceRecognizer, RecognizerError};
use crate::shared::constants::IMAGE_EXTENSION;
use crate::shared::image_files::list_images;

#[derive(Error, Debug)]
pub enum TrainError {
    #[error("cannot read training directory {path}: {source}")]
    TrainDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Name(#[from] IdentityNameError),
    #[error("no face found in training image {image}")]
    NoFaceDetected { image: String },
    #[error("could not read faces from {image}: {source}")]
    Recognizer {
        image: String,
        #[source]
        source: RecognizerError,
    },
    #[error(transparent)]
    Gallery(#[from] GalleryError),
    #[error("training on {image} panicked: {message}")]
    Panicked { image: String, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrainOutcome {
    Trained(IdentityKey),
    AlreadyTrained(IdentityKey),
}

#[derive(Debug, Default)]
pub struct TrainReport {
    pub trained: Vec<IdentityKey>,
    pub skipped: Vec<IdentityKey>,
    pub failed: Vec<String>,
}

/// Builds gallery identities from named training photos.
pub struct TrainGalleryUseCase {
    recognizer: Box<dyn FaceRecognizer>,
    store: Box<dyn GalleryStore>,
    pool: WorkerPool,
    extension: String,
}

impl TrainGalleryUseCase {
    pub fn new(
        recognizer: Box<dyn FaceRecognizer>,
        store: Box<dyn GalleryStore>,
        pool: WorkerPool,
    ) -> Self {
        Self {
            recognizer,
            store,
            pool,
            extension: IMAGE_EXTENSION.to_string(),
        }
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    /// Persist an identity that already has encodings, unless its key is taken.
    pub fn add_identity(&self, identity: &Identity) -> Result<TrainOutcome, TrainError> {
        if self.store.contains(&identity.key) {
            return Ok(TrainOutcome::AlreadyTrained(identity.key.clone()));
        }
        self.store.save(identity)?;
        Ok(TrainOutcome::Trained(identity.key.clone()))
    }

    /// Train one identity from a photo named after it.
    ///
    /// The first detected face becomes the identity's reference encoding.
    pub fn add_image(&self, image_path: &Path) -> Result<TrainOutcome, TrainError> {
        let key = parse_identity_name(&image_key(image_path))?;
        if self.store.contains(&key) {
            return Ok(TrainOutcome::AlreadyTrained(key));
        }

        let image = image_path.display().to_string();
        let encodings = self
            .recognizer
            .detect_and_encode(image_path)
            .map_err(|source| TrainError::Recognizer {
                image: image.clone(),
                source,
            })?;
        let first = encodings
            .into_iter()
            .next()
            .ok_or(TrainError::NoFaceDetected { image })?;

        self.add_identity(&Identity::new(key, vec![first]))
    }

    /// Train every photo in `train_dir` on the worker pool.
    ///
    /// Only the first photo per identity (in file-name order) is used; later
    /// ones are reported as skipped.
    pub fn execute(&self, train_dir: &Path) -> Result<TrainReport, TrainError> {
        let images = list_images(train_dir, &self.extension).map_err(|source| {
            TrainError::TrainDir {
                path: train_dir.to_path_buf(),
                source,
            }
        })?;

        let mut report = TrainReport::default();
        let mut seen = BTreeSet::new();
        let mut queued = Vec::new();
        for path in images {
            match parse_identity_name(&image_key(&path)) {
                Ok(key) if !seen.insert(key.clone()) => {
                    log::debug!("{} repeats identity {key}", path.display());
                    report.skipped.push(key);
                }
                Ok(_) => queued.push(path),
                Err(e) => report.failed.push(e.to_string()),
            }
        }

        log::info!(
            "Training {} images on {} workers",
            queued.len(),
            self.pool.slots()
        );
        let outcomes = self.pool.run(queued, |path: PathBuf| {
            Some(catch_panic(|| self.add_image(&path)).unwrap_or_else(|message| {
                Err(TrainError::Panicked {
                    image: path.display().to_string(),
                    message,
                })
            }))
        });

        for outcome in outcomes {
            match outcome {
                Ok(TrainOutcome::Trained(key)) => report.trained.push(key),
                Ok(TrainOutcome::AlreadyTrained(key)) => report.skipped.push(key),
                Err(e) => report.failed.push(e.to_string()),
            }
        }
        report.trained.sort();
        report.skipped.sort();
        report.failed.sort();

        report_errors(
            "While training the gallery the following errors occurred:",
            &report.failed,
        );
        log::info!(
            "Trained {}, skipped {}, failed {}",
            report.trained.len(),
            report.skipped.len(),
            report.failed.len()
        );
        Ok(report)
    }
}
