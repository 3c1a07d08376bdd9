//! AES-256-GCM sealing/opening.
//!
//! The wire format carries `iv` and ciphertext as separate JSON fields,
//! so the IV is an explicit argument here rather than bundled with the
//! ciphertext in a single blob.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use rand::RngCore;
use zeroize::Zeroizing;

use crate::error::CryptoError;

/// Generate a fresh random 96-bit IV. Must never be reused under the same key.
pub fn random_iv() -> [u8; 12] {
    let mut iv = [0u8; 12];
    rand::rngs::OsRng.fill_bytes(&mut iv);
    iv
}

/// Seal `plaintext` under `key`/`iv`. Output is `ciphertext || tag` (the
/// standard AES-GCM layout); no IV is embedded in the output.
pub fn aead_seal(key: &[u8; 32], iv: &[u8; 12], plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    let nonce = Nonce::from_slice(iv);
    cipher
        .encrypt(nonce, plaintext)
        .map_err(|_| CryptoError::AeadEncrypt)
}

/// Open `ciphertext` (as produced by `aead_seal`). Any tamper or wrong-key
/// failure surfaces identically as `AuthFailed`, with no plaintext leaked.
pub fn aead_open(
    key: &[u8; 32],
    iv: &[u8; 12],
    ciphertext: &[u8],
) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    let nonce = Nonce::from_slice(iv);
    let plaintext = cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| CryptoError::AuthFailed)?;
    Ok(Zeroizing::new(plaintext))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seal_open_roundtrip() {
        let key = [7u8; 32];
        let iv = random_iv();
        let plaintext = b"the quick brown fox";
        let ct = aead_seal(&key, &iv, plaintext).unwrap();
        let pt = aead_open(&key, &iv, &ct).unwrap();
        assert_eq!(&pt[..], plaintext);
    }

    #[test]
    fn tamper_is_rejected() {
        let key = [7u8; 32];
        let iv = random_iv();
        let mut ct = aead_seal(&key, &iv, b"hello").unwrap();
        let last = ct.len() - 1;
        ct[last] ^= 0x01;
        assert!(matches!(aead_open(&key, &iv, &ct), Err(CryptoError::AuthFailed)));
    }

    #[test]
    fn wrong_key_is_rejected() {
        let key = [7u8; 32];
        let other_key = [9u8; 32];
        let iv = random_iv();
        let ct = aead_seal(&key, &iv, b"hello").unwrap();
        assert!(matches!(aead_open(&other_key, &iv, &ct), Err(CryptoError::AuthFailed)));
    }
}
