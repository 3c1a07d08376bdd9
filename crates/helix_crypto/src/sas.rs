//! Short Authentication String (SAS) derivation.
//!
//! Both peers compute this independently over the *sorted* pair of SPKI
//! public keys, so the result is identical regardless of who initiated.
//! It is verified out-of-band by the two humans, not by the
//! protocol itself.

use base64::{engine::general_purpose::STANDARD, Engine};

use crate::hash::sha256;

/// Derive the six-digit SAS string `"XXX YYY"` from the two SPKI-encoded
/// public keys.
pub fn derive_sas(own_spki: &[u8], peer_spki: &[u8]) -> String {
    let own_b64 = STANDARD.encode(own_spki);
    let peer_b64 = STANDARD.encode(peer_spki);

    let (first, second) = if own_b64 <= peer_b64 {
        (own_b64, peer_b64)
    } else {
        (peer_b64, own_b64)
    };

    let mut concatenated = String::with_capacity(first.len() + second.len());
    concatenated.push_str(&first);
    concatenated.push_str(&second);

    let digest = sha256(concatenated.as_bytes());
    let n = u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]);
    let code = n % 1_000_000;
    let formatted = format!("{code:06}");
    format!("{} {}", &formatted[..3], &formatted[3..])
}
