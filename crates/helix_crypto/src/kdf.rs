//! HKDF-SHA256 key derivation.
//!
//! The session core uses a single, fixed derivation: empty salt, empty
//! info, 32-byte output, straight from the ECDH shared secret to the
//! AES-GCM session key.

use hkdf::Hkdf;
use sha2::Sha256;

use crate::error::CryptoError;

/// `HKDF-SHA256(ikm, salt = "", info = "") -> 32 bytes`.
pub fn hkdf_sha256(ikm: &[u8]) -> Result<[u8; 32], CryptoError> {
    let hk = Hkdf::<Sha256>::new(None, ikm);
    let mut out = [0u8; 32];
    hk.expand(&[], &mut out)
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_for_same_input() {
        let ikm = b"some shared secret bytes-------\x00";
        let a = hkdf_sha256(ikm).unwrap();
        let b = hkdf_sha256(ikm).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn differs_for_different_input() {
        let a = hkdf_sha256(b"input-a").unwrap();
        let b = hkdf_sha256(b"input-b").unwrap();
        assert_ne!(a, b);
    }
}
