use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use thiserror::Error;

use crate::shared::encoding::Encoding;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("encoding cache I/O failed at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("encoding cache at {path} is not valid JSON: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode encoding cache: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Image name → detected face encodings, shared by all batch workers.
///
/// Keys are file names only, never full paths. Entries are raw encodings,
/// not identity decisions, so a hit stays valid however the gallery changes.
#[derive(Debug, Default)]
pub struct EncodingCache {
    entries: RwLock<HashMap<String, Vec<Encoding>>>,
}

impl EncodingCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a persisted cache. A missing file yields an empty cache.
    pub fn load(path: &Path) -> Result<Self, CacheError> {
        let json = match fs::read_to_string(path) {
            Ok(json) => json,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Self::new()),
            Err(source) => {
                return Err(CacheError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        let entries: HashMap<String, Vec<Encoding>> =
            serde_json::from_str(&json).map_err(|source| CacheError::Decode {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Self {
            entries: RwLock::new(entries),
        })
    }

    /// Persist the whole cache, replacing any previous file.
    pub fn persist(&self, path: &Path) -> Result<(), CacheError> {
        let io_err = |source| CacheError::Io {
            path: path.to_path_buf(),
            source,
        };

        // Sorted keys keep the file stable between runs
        let json = {
            let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
            let sorted: BTreeMap<&String, &Vec<Encoding>> = entries.iter().collect();
            serde_json::to_string(&sorted).map_err(CacheError::Encode)?
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let temp_path = path.with_extension("part");
        fs::write(&temp_path, json).map_err(io_err)?;
        fs::rename(&temp_path, path).map_err(io_err)
    }

    pub fn get(&self, image_key: &str) -> Option<Vec<Encoding>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(image_key)
            .cloned()
    }

    pub fn put(&self, image_key: impl Into<String>, encodings: Vec<Encoding>) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(image_key.into(), encodings);
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
