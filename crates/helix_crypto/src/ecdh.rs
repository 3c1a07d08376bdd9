//! Ephemeral ECDH key agreement (NIST P-256).
//!
//! One keypair is generated per session and discarded on reset — there is
//! no long-term identity key in this layer.

use p256::ecdh::diffie_hellman;
use p256::pkcs8::{DecodePublicKey, EncodePublicKey};
use p256::{PublicKey, SecretKey};
use rand_core::OsRng;

use crate::error::CryptoError;

/// An ephemeral P-256 keypair. `SecretKey` zeroizes its scalar on drop
/// (RustCrypto's `elliptic-curve` crate implements this for us).
pub struct EcdhKeyPair {
    secret: SecretKey,
    public: PublicKey,
}

impl EcdhKeyPair {
    pub fn public(&self) -> &PublicKey {
        &self.public
    }

    pub fn secret(&self) -> &SecretKey {
        &self.secret
    }

    pub fn into_parts(self) -> (SecretKey, PublicKey) {
        (self.secret, self.public)
    }
}

/// Generate a fresh ephemeral P-256 keypair.
pub fn generate_ecdh() -> EcdhKeyPair {
    let secret = SecretKey::random(&mut OsRng);
    let public = secret.public_key();
    EcdhKeyPair { secret, public }
}

/// Export a public key as a SubjectPublicKeyInfo (SPKI) DER blob.
pub fn export_spki(public: &PublicKey) -> Result<Vec<u8>, CryptoError> {
    let doc = public
        .to_public_key_der()
        .map_err(|e| CryptoError::KeyGeneration(e.to_string()))?;
    Ok(doc.as_bytes().to_vec())
}

/// Import a SPKI DER blob as a P-256 public key.
pub fn import_spki(bytes: &[u8]) -> Result<PublicKey, CryptoError> {
    PublicKey::from_public_key_der(bytes)
        .map_err(|e| CryptoError::InvalidKey(format!("bad SPKI encoding: {e}")))
}

/// Raw ECDH shared secret (32 bytes, the P-256 x-coordinate). Never used
/// directly as a symmetric key — always pass through `hkdf_sha256` first.
pub fn derive_shared(secret: &SecretKey, peer_public: &PublicKey) -> [u8; 32] {
    let shared = diffie_hellman(secret.to_nonzero_scalar(), peer_public.as_affine());
    let mut out = [0u8; 32];
    out.copy_from_slice(shared.raw_secret_bytes().as_slice());
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spki_roundtrip_preserves_shared_secret() {
        let alice = generate_ecdh();
        let bob = generate_ecdh();

        let alice_spki = export_spki(alice.public()).unwrap();
        let bob_spki = export_spki(bob.public()).unwrap();

        let alice_pub_reimported = import_spki(&alice_spki).unwrap();
        let bob_pub_reimported = import_spki(&bob_spki).unwrap();

        let shared_a = derive_shared(alice.secret(), &bob_pub_reimported);
        let shared_b = derive_shared(bob.secret(), &alice_pub_reimported);
        assert_eq!(shared_a, shared_b);
    }

    #[test]
    fn import_rejects_garbage() {
        assert!(import_spki(b"not a key").is_err());
    }
}
