use super::identity::Identity;

/// One persisted gallery artifact as seen by a matching pass.
#[derive(Clone, Debug, PartialEq)]
pub enum GalleryEntry {
    Identity(Identity),
    /// The artifact exists but could not be read or decoded.
    Corrupt { name: String, reason: String },
}

/// The full set of gallery entries visible to one matching pass.
///
/// Entries keep the store's enumeration order, which decides distance ties
/// during conflict resolution. The gallery is immutable once loaded.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Gallery {
    entries: Vec<GalleryEntry>,
}

impl Gallery {
    pub fn new(entries: Vec<GalleryEntry>) -> Self {
        Self { entries }
    }

    pub fn from_identities(identities: Vec<Identity>) -> Self {
        Self::new(identities.into_iter().map(GalleryEntry::Identity).collect())
    }

    pub fn entries(&self) -> &[GalleryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn identities(&self) -> impl Iterator<Item = &Identity> {
        self.entries.iter().filter_map(|e| match e {
            GalleryEntry::Identity(identity) => Some(identity),
            GalleryEntry::Corrupt { .. } => None,
        })
    }

    pub fn corrupt_count(&self) -> usize {
        self.len() - self.identities().count()
    }
}
