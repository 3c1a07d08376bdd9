//! Identifier validation: display names and peer identifiers exchanged
//! over the relay.

use crate::error::ProtoError;

const MIN_LEN: usize = 3;
const MAX_LEN: usize = 30;

fn is_valid_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

/// Validate a printable identifier: 3-30 chars, `[A-Za-z0-9_-]`, case-sensitive.
pub fn validate_identifier(id: &str) -> Result<(), ProtoError> {
    let len = id.chars().count();
    if !(MIN_LEN..=MAX_LEN).contains(&len) {
        return Err(ProtoError::InvalidIdentifier(id.to_string()));
    }
    if !id.chars().all(is_valid_char) {
        return Err(ProtoError::InvalidIdentifier(id.to_string()));
    }
    Ok(())
}
