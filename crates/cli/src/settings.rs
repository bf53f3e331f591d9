use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use facematch_core::shared::constants::{
    APP_DIR_NAME, DEFAULT_TOLERANCE, DEFAULT_WORKERS, ENCODING_CACHE_FILE, IMAGE_EXTENSION,
};
use facematch_core::recognition::infrastructure::yolo_face_detector::DEFAULT_CONFIDENCE;

/// Persisted defaults, overridden per run by command-line flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub gallery_dir: Option<PathBuf>,
    pub cache_file: Option<PathBuf>,
    pub workers: usize,
    pub tolerance: f64,
    pub confidence: f64,
    pub extension: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            gallery_dir: None,
            cache_file: None,
            workers: DEFAULT_WORKERS,
            tolerance: DEFAULT_TOLERANCE,
            confidence: DEFAULT_CONFIDENCE,
            extension: IMAGE_EXTENSION.to_string(),
        }
    }
}

impl Settings {
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(APP_DIR_NAME).join("settings.json"))
    }

    /// Settings from `path`, or defaults if the file is missing or invalid.
    pub fn load_from(path: &Path) -> Self {
        let Ok(json) = fs::read_to_string(path) else {
            return Self::default();
        };
        serde_json::from_str(&json).unwrap_or_else(|e| {
            log::warn!("Ignoring invalid settings file {}: {e}", path.display());
            Self::default()
        })
    }

    pub fn save_to(&self, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn gallery_dir(&self) -> Option<PathBuf> {
        self.gallery_dir
            .clone()
            .or_else(|| dirs::data_dir().map(|d| d.join(APP_DIR_NAME).join("gallery")))
    }

    pub fn cache_file(&self) -> Option<PathBuf> {
        self.cache_file
            .clone()
            .or_else(|| dirs::cache_dir().map(|d| d.join(APP_DIR_NAME).join(ENCODING_CACHE_FILE)))
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.workers == 0 {
            return Err("Workers must be at least 1".into());
        }
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(format!(
                "Confidence must be between 0.0 and 1.0, got {}",
                self.confidence
            ));
        }
        if !self.tolerance.is_finite() || self.tolerance <= 0.0 {
            return Err(format!(
                "Tolerance must be a positive number, got {}",
                self.tolerance
            ));
        }
        if self.extension.is_empty() || self.extension.starts_with('.') {
            return Err(format!(
                "Extension must be given without a leading dot, got '{}'",
                self.extension
            ));
        }
        Ok(())
    }
}
