use thiserror::Error;

use super::identity::IdentityKey;

/// Name token ignored when parsing, marking pre-cropped training photos.
const CROPPED_TOKEN: &str = "cropped";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum IdentityNameError {
    #[error("{0}: expected <first>_[<middle>_]<last>&<nationality>.jpg")]
    Malformed(String),
}

/// Derive an identity key from a training photo's file name.
///
/// Accepts `<first>_[<middle>_]<last>&<nationality>.<ext>`. Any directory
/// prefix is ignored, as is a `cropped` name token.
pub fn parse_identity_name(file_name: &str) -> Result<IdentityKey, IdentityNameError> {
    let malformed = || IdentityNameError::Malformed(file_name.to_string());

    let base = file_name.rsplit(['/', '\\']).next().unwrap_or(file_name);
    let (names, rest) = base.split_once('&').ok_or_else(malformed)?;
    let nationality = rest.split('.').next().unwrap_or_default();
    if nationality.is_empty() {
        return Err(malformed());
    }

    let tokens: Vec<&str> = names
        .split('_')
        .filter(|t| *t != CROPPED_TOKEN)
        .collect();
    if !(2..=3).contains(&tokens.len()) || tokens.iter().any(|t| t.is_empty()) {
        return Err(malformed());
    }

    Ok(IdentityKey::from_parts(&tokens, nationality))
}
