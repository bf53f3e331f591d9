use std::path::PathBuf;

use thiserror::Error;

use super::gallery::Gallery;
use super::identity::{Identity, IdentityKey};

#[derive(Error, Debug)]
pub enum GalleryError {
    #[error("gallery I/O failed at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode identity {key}: {source}")]
    Encode {
        key: IdentityKey,
        #[source]
        source: serde_json::Error,
    },
}

/// Domain interface for identity persistence.
///
/// One artifact per identity. Implementations are shared with training
/// workers, hence `Sync`.
pub trait GalleryStore: Send + Sync {
    /// Load every artifact, in a deterministic order.
    ///
    /// Unreadable artifacts become [`GalleryEntry::Corrupt`] entries rather
    /// than failing the load.
    ///
    /// [`GalleryEntry::Corrupt`]: super::gallery::GalleryEntry::Corrupt
    fn load(&self) -> Result<Gallery, GalleryError>;

    /// Whether an artifact for `key` exists.
    fn contains(&self, key: &IdentityKey) -> bool;

    /// Persist `identity`, replacing any existing artifact for its key.
    fn save(&self, identity: &Identity) -> Result<(), GalleryError>;
}
