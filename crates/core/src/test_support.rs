//! Stubs and fixtures shared by unit tests across modules.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crate::gallery::domain::gallery::{Gallery, GalleryEntry};
use crate::gallery::domain::gallery_store::{GalleryError, GalleryStore};
use crate::gallery::domain::identity::{Identity, IdentityKey};
use crate::recognition::domain::face_recognizer::{FaceRecognizer, RecognizerError};
use crate::shared::encoding::Encoding;

pub fn enc(values: &[f64]) -> Encoding {
    Encoding::new(values.to_vec())
}

pub fn identity(key: &str, references: &[&[f64]]) -> Identity {
    Identity::new(
        IdentityKey::new(key),
        references.iter().map(|r| enc(r)).collect(),
    )
}

/// Create empty files with the given names; the stub recognizer never reads them.
pub fn touch(dir: &Path, names: &[&str]) {
    for name in names {
        fs::write(dir.join(name), b"").unwrap();
    }
}

/// Recognizer that returns canned encodings keyed by file name.
///
/// Unknown files yield no faces. Counters are shared so tests can inspect
/// them after the stub has been moved into a use case.
#[derive(Clone, Default)]
pub struct StubRecognizer {
    faces: HashMap<String, Vec<Encoding>>,
    failing: Vec<String>,
    panicking: Vec<String>,
    delay: Duration,
    pub calls: Arc<Mutex<Vec<String>>>,
    pub active: Arc<AtomicUsize>,
    pub peak: Arc<AtomicUsize>,
}

impl StubRecognizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_faces(mut self, file_name: &str, faces: &[&[f64]]) -> Self {
        self.faces
            .insert(file_name.to_string(), faces.iter().map(|f| enc(f)).collect());
        self
    }

    /// Make `detect_and_encode` fail for `file_name`.
    pub fn failing_on(mut self, file_name: &str) -> Self {
        self.failing.push(file_name.to_string());
        self
    }

    /// Make `detect_and_encode` panic for `file_name`.
    pub fn panicking_on(mut self, file_name: &str) -> Self {
        self.panicking.push(file_name.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn peak_active(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

impl FaceRecognizer for StubRecognizer {
    fn detect_and_encode(&self, image_path: &Path) -> Result<Vec<Encoding>, RecognizerError> {
        let name = image_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        self.calls.lock().unwrap().push(name.clone());
        if self.panicking.contains(&name) {
            panic!("decoder crashed on {name}");
        }

        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
        self.active.fetch_sub(1, Ordering::SeqCst);

        if self.failing.contains(&name) {
            return Err(RecognizerError::Inference(format!("cannot read {name}")));
        }
        Ok(self.faces.get(&name).cloned().unwrap_or_default())
    }
}

/// Gallery kept in memory; clones share the same entries.
#[derive(Clone, Default)]
pub struct MemoryGalleryStore {
    entries: Arc<Mutex<Vec<GalleryEntry>>>,
}

impl MemoryGalleryStore {
    pub fn with_entries(entries: Vec<GalleryEntry>) -> Self {
        Self {
            entries: Arc::new(Mutex::new(entries)),
        }
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .entries
            .lock()
            .unwrap()
            .iter()
            .filter_map(|e| match e {
                GalleryEntry::Identity(identity) => Some(identity.key.to_string()),
                GalleryEntry::Corrupt { .. } => None,
            })
            .collect();
        keys.sort();
        keys
    }
}

impl GalleryStore for MemoryGalleryStore {
    fn load(&self) -> Result<Gallery, GalleryError> {
        Ok(Gallery::new(self.entries.lock().unwrap().clone()))
    }

    fn contains(&self, key: &IdentityKey) -> bool {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .any(|e| matches!(e, GalleryEntry::Identity(identity) if &identity.key == key))
    }

    fn save(&self, identity: &Identity) -> Result<(), GalleryError> {
        let mut entries = self.entries.lock().unwrap();
        entries.retain(|e| !matches!(e, GalleryEntry::Identity(i) if i.key == identity.key));
        entries.push(GalleryEntry::Identity(identity.clone()));
        entries.sort_by(|a, b| entry_name(a).cmp(&entry_name(b)));
        Ok(())
    }
}

fn entry_name(entry: &GalleryEntry) -> String {
    match entry {
        GalleryEntry::Identity(identity) => identity.key.to_string(),
        GalleryEntry::Corrupt { name, .. } => name.clone(),
    }
}
