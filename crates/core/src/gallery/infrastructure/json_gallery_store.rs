use std::fs;
use std::path::{Path, PathBuf};

use crate::gallery::domain::gallery::{Gallery, GalleryEntry};
use crate::gallery::domain::gallery_store::{GalleryError, GalleryStore};
use crate::gallery::domain::identity::{Identity, IdentityKey};
use crate::shared::constants::GALLERY_EXTENSION;

/// Stores each identity as `<key>.json` in a single directory.
///
/// Listing order is lexical by file name, so tie-breaks between identities
/// are the same on every machine.
pub struct JsonGalleryStore {
    dir: PathBuf,
}

impl JsonGalleryStore {
    /// Open the store, creating the directory if it does not exist.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, GalleryError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| GalleryError::Io {
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir })
    }

    fn artifact_path(&self, key: &IdentityKey) -> PathBuf {
        self.dir.join(format!("{key}.{GALLERY_EXTENSION}"))
    }

    fn load_entry(path: &Path, name: String) -> GalleryEntry {
        let parsed = fs::read_to_string(path)
            .map_err(|e| e.to_string())
            .and_then(|json| serde_json::from_str::<Identity>(&json).map_err(|e| e.to_string()));

        match parsed {
            Ok(identity) if identity.encodings.is_empty() => GalleryEntry::Corrupt {
                name,
                reason: "no reference encodings".into(),
            },
            Ok(identity) => GalleryEntry::Identity(identity),
            Err(reason) => GalleryEntry::Corrupt { name, reason },
        }
    }
}

impl GalleryStore for JsonGalleryStore {
    fn load(&self) -> Result<Gallery, GalleryError> {
        let io_err = |source| GalleryError::Io {
            path: self.dir.clone(),
            source,
        };

        let mut artifacts: Vec<(String, PathBuf)> = Vec::new();
        for entry in fs::read_dir(&self.dir).map_err(io_err)? {
            let path = entry.map_err(io_err)?.path();
            if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some(GALLERY_EXTENSION)
            {
                continue;
            }
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                artifacts.push((name.to_string(), path.clone()));
            }
        }
        artifacts.sort();

        let entries: Vec<GalleryEntry> = artifacts
            .into_iter()
            .map(|(name, path)| Self::load_entry(&path, name))
            .collect();
        log::debug!(
            "Loaded {} gallery entries from {}",
            entries.len(),
            self.dir.display()
        );
        Ok(Gallery::new(entries))
    }

    fn contains(&self, key: &IdentityKey) -> bool {
        self.artifact_path(key).is_file()
    }

    fn save(&self, identity: &Identity) -> Result<(), GalleryError> {
        let json = serde_json::to_string(identity).map_err(|source| GalleryError::Encode {
            key: identity.key.clone(),
            source,
        })?;

        // Write then rename so a concurrent load never sees a partial file
        let path = self.artifact_path(&identity.key);
        let temp_path = path.with_extension("part");
        fs::write(&temp_path, json)
            .and_then(|_| fs::rename(&temp_path, &path))
            .map_err(|source| GalleryError::Io { path, source })
    }
}
