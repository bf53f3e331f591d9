use std::collections::BTreeMap;

use crate::gallery::domain::identity::IdentityKey;

/// One identity's claims on detected faces within a single image.
///
/// Each element of `faces` is `(face_index, distance)`. Only matching faces
/// are listed; identities without any match produce no `IdentityClaims`.
#[derive(Clone, Debug, PartialEq)]
pub struct IdentityClaims {
    pub identity: IdentityKey,
    pub faces: Vec<(usize, f64)>,
}

impl IdentityClaims {
    pub fn new(identity: IdentityKey, faces: Vec<(usize, f64)>) -> Self {
        Self { identity, faces }
    }
}

/// Conflict-free mapping of identity → ascending face indices for one image.
pub type ImageResult = BTreeMap<IdentityKey, Vec<usize>>;
