//! Base64 field decoding with hard per-field length limits, enforced
//! before the (more expensive) base64 decode runs.

use base64::{engine::general_purpose::STANDARD, Engine};

use crate::error::ProtoError;

/// Max base64 length for a SPKI-encoded public key field.
pub const MAX_PUBLIC_KEY_B64: usize = 512;
/// Max base64 length for an IV field.
pub const MAX_IV_B64: usize = 32;
/// Max base64 length for an encrypted challenge/response/message field.
pub const MAX_ENCRYPTED_B64: usize = 131_072;
/// Max length (chars, not base64) for a file name field.
pub const MAX_FILE_NAME: usize = 255;
/// Max length (chars) for a MIME type field.
pub const MAX_MIME_TYPE: usize = 100;

/// Decode a base64 field, rejecting it outright if it exceeds `max` chars
/// *before* attempting to decode (a cheap DoS guard ahead of the more
/// expensive base64 pass).
pub fn decode_b64_bounded(field: &'static str, s: &str, max: usize) -> Result<Vec<u8>, ProtoError> {
    if s.len() > max {
        return Err(ProtoError::OversizedField {
            field,
            max,
            actual: s.len(),
        });
    }
    STANDARD
        .decode(s)
        .map_err(|source| ProtoError::InvalidBase64 { field, source })
}

/// Encode bytes as standard base64 (with padding), matching the wire format
/// used throughout the envelope.
pub fn encode_b64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

pub fn check_len(field: &'static str, s: &str, max: usize) -> Result<(), ProtoError> {
    if s.chars().count() > max {
        return Err(ProtoError::OversizedField {
            field,
            max,
            actual: s.chars().count(),
        });
    }
    Ok(())
}
