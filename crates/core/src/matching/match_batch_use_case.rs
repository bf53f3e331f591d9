use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use thiserror::Error;

use crate::gallery::domain::gallery_store::{GalleryError, GalleryStore};
use crate::matching::batch_console::report_errors;
use crate::matching::batch_context::BatchContext;
use crate::matching::batch_logger::BatchLogger;
use crate::matching::claim::ImageResult;
use crate::matching::encoding_cache::EncodingCache;
use crate::matching::infrastructure::worker_pool::{catch_panic, WorkerPool};
use crate::matching::match_image_use_case::{image_key, MatchError, MatchImageUseCase};
use crate::recognition::domain::face_recognizer::FaceRecognizer;
use crate::shared::constants::IMAGE_EXTENSION;
use crate::shared::image_files::list_images;

const ERROR_HEADING: &str = "While processing the images the following errors occurred:";

#[derive(Error, Debug)]
pub enum BatchError {
    #[error("cannot read image directory {path}: {source}")]
    ImageDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Gallery(#[from] GalleryError),
}

/// `image_key → identity_key → [face_index]`
pub type BatchResult = BTreeMap<String, ImageResult>;

/// Outcome of one batch run.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub result: BatchResult,
    /// Per-image failures, in the order they were recorded.
    pub errors: Vec<String>,
    /// Image keys the batch was asked to process, in listing order.
    pub requested: Vec<String>,
}

impl BatchReport {
    /// Requested images that produced no result.
    pub fn missing(&self) -> Vec<&str> {
        self.requested
            .iter()
            .filter(|key| !self.result.contains_key(key.as_str()))
            .map(String::as_str)
            .collect()
    }
}

/// Matches every image in a directory against the gallery.
///
/// Pipeline: list images → load cache + gallery → worker pool of per-image
/// matchers → aggregate → flush error log → persist cache.
pub struct MatchBatchUseCase {
    recognizer: Box<dyn FaceRecognizer>,
    store: Box<dyn GalleryStore>,
    pool: WorkerPool,
    logger: Box<dyn BatchLogger>,
    cache_path: Option<PathBuf>,
    extension: String,
}

impl MatchBatchUseCase {
    pub fn new(
        recognizer: Box<dyn FaceRecognizer>,
        store: Box<dyn GalleryStore>,
        pool: WorkerPool,
        logger: Box<dyn BatchLogger>,
    ) -> Self {
        Self {
            recognizer,
            store,
            pool,
            logger,
            cache_path: None,
            extension: IMAGE_EXTENSION.to_string(),
        }
    }

    /// Load the encoding cache from `path` before a batch and save it after.
    pub fn with_cache_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache_path = Some(path.into());
        self
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    pub fn execute(&mut self, image_dir: &Path) -> Result<BatchReport, BatchError> {
        let images = list_images(image_dir, &self.extension).map_err(|source| {
            BatchError::ImageDir {
                path: image_dir.to_path_buf(),
                source,
            }
        })?;
        let requested: Vec<String> = images.iter().map(|p| image_key(p)).collect();

        let cache = self.load_cache();
        let gallery = self.store.load()?;
        if gallery.corrupt_count() > 0 {
            log::warn!(
                "{} gallery entries are corrupt; images will fail to match until they are retrained",
                gallery.corrupt_count()
            );
        }
        log::info!(
            "Matching {} images against {} identities on {} workers",
            images.len(),
            gallery.len(),
            self.pool.slots()
        );

        let recognizer = self.recognizer.as_ref();
        let ctx = BatchContext::new(cache, self.logger.as_mut(), images.len());

        let result: BatchResult = {
            let matcher = MatchImageUseCase::new(recognizer, &gallery, ctx.cache());
            let ctx = &ctx;
            self.pool
                .run(images, |path: PathBuf| {
                    let key = image_key(&path);
                    ctx.console().status(&format!("Processing {key}"));

                    let start = Instant::now();
                    let outcome = catch_panic(|| matcher.execute(&path)).unwrap_or_else(
                        |message| {
                            Err(MatchError::Panicked {
                                image: path.display().to_string(),
                                message,
                            })
                        },
                    );
                    let duration_ms = start.elapsed().as_secs_f64() * 1000.0;

                    let mut console = ctx.console();
                    match outcome {
                        Ok(matches) => {
                            let faces = matches.values().map(Vec::len).sum();
                            console.image_done(duration_ms, Some(faces));
                            Some((key, matches))
                        }
                        Err(e) => {
                            console.record_error(e.to_string());
                            console.image_done(duration_ms, None);
                            None
                        }
                    }
                })
                .into_iter()
                .collect()
        };

        let (cache, mut errors) = ctx.finish();
        if let Some(path) = &self.cache_path {
            match cache.persist(path) {
                Ok(()) => {
                    log::debug!("Saved {} cached encodings to {}", cache.len(), path.display())
                }
                Err(e) => errors.push(e.to_string()),
            }
        }
        report_errors(ERROR_HEADING, &errors);
        self.logger.summary();

        Ok(BatchReport {
            result,
            errors,
            requested,
        })
    }

    fn load_cache(&self) -> EncodingCache {
        let Some(path) = &self.cache_path else {
            return EncodingCache::new();
        };
        match EncodingCache::load(path) {
            Ok(cache) => {
                log::debug!("Loaded {} cached encodings from {}", cache.len(), path.display());
                cache
            }
            Err(e) => {
                log::warn!("Ignoring unreadable encoding cache: {e}");
                EncodingCache::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gallery::domain::gallery::GalleryEntry;
    use crate::gallery::domain::identity::IdentityKey;
    use crate::matching::batch_logger::NullBatchLogger;
    use crate::test_support::{identity, touch, MemoryGalleryStore, StubRecognizer};
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;

    fn store_ab() -> MemoryGalleryStore {
        MemoryGalleryStore::with_entries(vec![
            GalleryEntry::Identity(identity("A", &[&[0.0]])),
            GalleryEntry::Identity(identity("B", &[&[10.0]])),
        ])
    }

    fn use_case(recognizer: &StubRecognizer, store: MemoryGalleryStore, workers: usize) -> MatchBatchUseCase {
        MatchBatchUseCase::new(
            Box::new(recognizer.clone()),
            Box::new(store),
            WorkerPool::new(workers),
            Box::new(NullBatchLogger),
        )
    }

    fn image_result(entries: &[(&str, &[usize])]) -> ImageResult {
        entries
            .iter()
            .map(|(k, faces)| (IdentityKey::new(*k), faces.to_vec()))
            .collect()
    }

    #[test]
    fn test_batch_aggregates_every_matched_image() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), &["x.jpg", "z.jpg"]);
        let recognizer = StubRecognizer::new()
            .with_faces("x.jpg", &[&[0.3], &[10.5]])
            .with_faces("z.jpg", &[&[9.9]]);

        let report = use_case(&recognizer, store_ab(), 4)
            .execute(dir.path())
            .unwrap();

        assert_eq!(report.result.len(), 2);
        assert_eq!(report.result["x.jpg"], image_result(&[("A", &[0]), ("B", &[1])]));
        assert_eq!(report.result["z.jpg"], image_result(&[("B", &[0])]));
        assert!(report.errors.is_empty());
    }

    #[test]
    fn test_zero_face_image_is_absent_with_one_error() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), &["x.jpg", "y.jpg"]);
        let recognizer = StubRecognizer::new().with_faces("x.jpg", &[&[0.1]]);

        let report = use_case(&recognizer, store_ab(), 3)
            .execute(dir.path())
            .unwrap();

        assert!(report.result.contains_key("x.jpg"));
        assert!(!report.result.contains_key("y.jpg"));
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].contains("y.jpg"));
        assert_eq!(report.missing(), vec!["y.jpg"]);
    }

    #[test]
    fn test_image_with_unmatched_faces_has_empty_result() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), &["crowd.jpg"]);
        let recognizer = StubRecognizer::new().with_faces("crowd.jpg", &[&[50.0], &[70.0]]);

        let report = use_case(&recognizer, store_ab(), 2)
            .execute(dir.path())
            .unwrap();

        assert_eq!(report.result["crowd.jpg"], ImageResult::new());
        assert!(report.missing().is_empty());
    }

    #[test]
    fn test_only_configured_extension_is_processed() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), &["x.jpg", "x.png", "notes.txt"]);
        let recognizer = StubRecognizer::new()
            .with_faces("x.jpg", &[&[0.0]])
            .with_faces("x.png", &[&[0.0]]);

        let report = use_case(&recognizer, store_ab(), 2)
            .execute(dir.path())
            .unwrap();

        assert_eq!(report.requested, vec!["x.jpg"]);
        assert_eq!(recognizer.call_count(), 1);

        let report = use_case(&recognizer, store_ab(), 2)
            .with_extension("png")
            .execute(dir.path())
            .unwrap();
        assert_eq!(report.requested, vec!["x.png"]);
    }

    #[test]
    fn test_rerun_is_identical_and_hits_cache() {
        let dir = TempDir::new().unwrap();
        let cache_dir = TempDir::new().unwrap();
        let cache_path = cache_dir.path().join("cache.json");
        touch(dir.path(), &["a.jpg", "b.jpg", "c.jpg", "d.jpg"]);
        let recognizer = StubRecognizer::new()
            .with_faces("a.jpg", &[&[0.2]])
            .with_faces("b.jpg", &[&[10.1], &[0.4]])
            .with_faces("c.jpg", &[&[0.5], &[0.6]])
            .with_faces("d.jpg", &[&[30.0]]);

        let first = use_case(&recognizer, store_ab(), 4)
            .with_cache_path(&cache_path)
            .execute(dir.path())
            .unwrap();
        assert_eq!(recognizer.call_count(), 4);
        assert!(cache_path.exists());

        let second = use_case(&recognizer, store_ab(), 4)
            .with_cache_path(&cache_path)
            .execute(dir.path())
            .unwrap();

        assert_eq!(first.result, second.result);
        assert_eq!(recognizer.call_count(), 4, "second run must be served from cache");
    }

    #[test]
    fn test_zero_face_image_is_retried_next_run() {
        let dir = TempDir::new().unwrap();
        let cache_dir = TempDir::new().unwrap();
        let cache_path = cache_dir.path().join("cache.json");
        touch(dir.path(), &["y.jpg"]);
        let recognizer = StubRecognizer::new();

        for _ in 0..2 {
            use_case(&recognizer, store_ab(), 2)
                .with_cache_path(&cache_path)
                .execute(dir.path())
                .unwrap();
        }

        assert_eq!(recognizer.call_count(), 2);
    }

    #[test]
    fn test_unreadable_cache_is_replaced() {
        let dir = TempDir::new().unwrap();
        let cache_dir = TempDir::new().unwrap();
        let cache_path = cache_dir.path().join("cache.json");
        fs::write(&cache_path, "not json").unwrap();
        touch(dir.path(), &["x.jpg"]);
        let recognizer = StubRecognizer::new().with_faces("x.jpg", &[&[0.0]]);

        let report = use_case(&recognizer, store_ab(), 2)
            .with_cache_path(&cache_path)
            .execute(dir.path())
            .unwrap();

        assert_eq!(report.result.len(), 1);
        let reloaded = EncodingCache::load(&cache_path).unwrap();
        assert!(reloaded.get("x.jpg").is_some());
    }

    #[test]
    fn test_corrupt_gallery_entry_fails_image_with_cause() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), &["x.jpg"]);
        let recognizer = StubRecognizer::new().with_faces("x.jpg", &[&[0.0]]);
        let store = MemoryGalleryStore::with_entries(vec![
            GalleryEntry::Identity(identity("A", &[&[0.0]])),
            GalleryEntry::Corrupt {
                name: "B&X.json".into(),
                reason: "unexpected end of input".into(),
            },
        ]);

        let report = use_case(&recognizer, store, 2)
            .execute(dir.path())
            .unwrap();

        assert!(report.result.is_empty());
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].contains("B&X.json"));
        assert!(report.errors[0].contains("unexpected end of input"));
    }

    #[test]
    fn test_recognizer_failure_is_logged_and_skipped() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), &["bad.jpg", "x.jpg"]);
        let recognizer = StubRecognizer::new()
            .with_faces("x.jpg", &[&[0.0]])
            .failing_on("bad.jpg");

        let report = use_case(&recognizer, store_ab(), 3)
            .execute(dir.path())
            .unwrap();

        assert_eq!(report.result.keys().collect::<Vec<_>>(), vec!["x.jpg"]);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].contains("bad.jpg"));
    }

    #[test]
    fn test_cache_save_failure_keeps_results() {
        let dir = TempDir::new().unwrap();
        let blocker = TempDir::new().unwrap();
        let not_a_dir = blocker.path().join("file");
        fs::write(&not_a_dir, b"").unwrap();
        touch(dir.path(), &["x.jpg"]);
        let recognizer = StubRecognizer::new().with_faces("x.jpg", &[&[0.0]]);

        let report = use_case(&recognizer, store_ab(), 2)
            .with_cache_path(not_a_dir.join("cache.json"))
            .execute(dir.path())
            .unwrap();

        assert_eq!(report.result["x.jpg"], image_result(&[("A", &[0])]));
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].contains("encoding cache"));
    }

    #[test]
    fn test_panicking_image_is_reported() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), &["boom.jpg", "x.jpg"]);
        let recognizer = StubRecognizer::new()
            .with_faces("x.jpg", &[&[0.0]])
            .panicking_on("boom.jpg");

        let report = use_case(&recognizer, store_ab(), 3)
            .execute(dir.path())
            .unwrap();

        assert_eq!(report.result.keys().collect::<Vec<_>>(), vec!["x.jpg"]);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].contains("boom.jpg"));
        assert!(report.errors[0].contains("decoder crashed"));
        assert_eq!(report.missing(), vec!["boom.jpg"]);
    }

    #[test]
    fn test_concurrent_matches_never_exceed_slots() {
        let dir = TempDir::new().unwrap();
        let names: Vec<String> = (0..10).map(|i| format!("img{i:02}.jpg")).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        touch(dir.path(), &refs);
        let mut recognizer = StubRecognizer::new().with_delay(Duration::from_millis(10));
        for name in &names {
            recognizer = recognizer.with_faces(name, &[&[0.0]]);
        }

        let report = use_case(&recognizer, store_ab(), 3)
            .execute(dir.path())
            .unwrap();

        assert_eq!(report.result.len(), 10);
        assert!(recognizer.peak_active() <= 2);
        assert!(recognizer.peak_active() >= 1);
    }

    #[test]
    fn test_empty_directory_yields_empty_report() {
        let dir = TempDir::new().unwrap();
        let recognizer = StubRecognizer::new();

        let report = use_case(&recognizer, store_ab(), 2)
            .execute(dir.path())
            .unwrap();

        assert!(report.result.is_empty());
        assert!(report.errors.is_empty());
        assert!(report.requested.is_empty());
    }

    #[test]
    fn test_missing_image_directory_is_batch_error() {
        let dir = TempDir::new().unwrap();
        let recognizer = StubRecognizer::new();

        let err = use_case(&recognizer, store_ab(), 2)
            .execute(&dir.path().join("absent"))
            .unwrap_err();

        assert!(matches!(err, BatchError::ImageDir { .. }));
    }
}
