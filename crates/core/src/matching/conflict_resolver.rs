use crate::matching::claim::{IdentityClaims, ImageResult};

/// Assign every claimed face to exactly one identity.
///
/// A face goes to the identity with the smallest distance among all claims
/// on it. On equal distances the identity that appears first in `claims`
/// keeps the face. Identities left without faces are omitted.
///
/// Each claim is visited once; face slots are indexed directly, so the cost
/// is linear in the number of claims plus the highest face index.
pub fn resolve(claims: &[IdentityClaims]) -> ImageResult {
    let face_count = claims
        .iter()
        .flat_map(|c| c.faces.iter().map(|(face, _)| face + 1))
        .max()
        .unwrap_or(0);

    // face index → (position in `claims`, distance) of the current owner
    let mut owners: Vec<Option<(usize, f64)>> = vec![None; face_count];
    for (position, claim) in claims.iter().enumerate() {
        for &(face, distance) in &claim.faces {
            let replace = match owners[face] {
                Some((_, best)) => distance < best,
                None => true,
            };
            if replace {
                owners[face] = Some((position, distance));
            }
        }
    }

    let mut result = ImageResult::new();
    for (face, owner) in owners.into_iter().enumerate() {
        if let Some((position, _)) = owner {
            result
                .entry(claims[position].identity.clone())
                .or_default()
                .push(face);
        }
    }
    result
}
