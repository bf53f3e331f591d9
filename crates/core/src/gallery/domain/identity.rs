use std::fmt;

use serde::{Deserialize, Serialize};

use crate::shared::encoding::Encoding;

/// Unique key of a known individual: `First_[Middle_]Last&Nationality`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentityKey(String);

impl IdentityKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Canonical key from name tokens (in file order) and nationality.
    pub fn from_parts(names: &[&str], nationality: &str) -> Self {
        Self(format!("{}&{nationality}", names.join("_")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A known individual and the reference encodings it was trained on.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub key: IdentityKey,
    pub encodings: Vec<Encoding>,
}

impl Identity {
    pub fn new(key: IdentityKey, encodings: Vec<Encoding>) -> Self {
        Self { key, encodings }
    }
}
