//! The per-session key material and challenge bookkeeping.

use p256::{PublicKey, SecretKey};
use zeroize::Zeroize;

/// Ephemeral keys plus the derived AES-GCM session key, once available.
///
/// `aes_key` is populated only after both `own_priv` and `peer_pub` were
/// valid and HKDF has run; it is wiped whenever the session resets.
pub struct SessionKeys {
    pub own_priv: SecretKey,
    pub own_pub: PublicKey,
    pub peer_pub: Option<PublicKey>,
    aes_key: Option<[u8; 32]>,
}

impl SessionKeys {
    pub fn generate() -> Self {
        let (own_priv, own_pub) = helix_crypto::ecdh::generate_ecdh().into_parts();
        Self {
            own_priv,
            own_pub,
            peer_pub: None,
            aes_key: None,
        }
    }

    pub fn aes_key(&self) -> Option<&[u8; 32]> {
        self.aes_key.as_ref()
    }

    pub fn set_aes_key(&mut self, key: [u8; 32]) {
        self.aes_key = Some(key);
    }

    pub fn has_aes_key(&self) -> bool {
        self.aes_key.is_some()
    }
}

impl Drop for SessionKeys {
    fn drop(&mut self) {
        if let Some(mut key) = self.aes_key.take() {
            key.zeroize();
        }
    }
}

/// A challenge buffered or decrypted while key derivation was still in
/// flight.
pub enum ChallengeReceived {
    None,
    Buffered { iv: [u8; 12], ciphertext: Vec<u8> },
    Decrypted(Vec<u8>),
}

impl Default for ChallengeReceived {
    fn default() -> Self {
        ChallengeReceived::None
    }
}

/// The responder's outstanding challenge plaintext, cleared immediately
/// after the first verify attempt (successful or not) — single-use.
#[derive(Default)]
pub struct ChallengeState {
    pub sent: Option<[u8; 32]>,
    pub received: ChallengeReceived,
}

impl ChallengeState {
    pub fn clear_sent(&mut self) {
        self.sent = None;
    }
}
