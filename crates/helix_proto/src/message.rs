//! Plaintext message payload carried inside a Type 8 `ENCRYPTED_MESSAGE`
//! frame's ciphertext.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlaintextMessage {
    #[serde(rename = "isAction")]
    pub is_action: bool,
    pub text: String,
}

impl PlaintextMessage {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            is_action: false,
            text: text.into(),
        }
    }

    pub fn me_action(text: impl Into<String>) -> Self {
        Self {
            is_action: true,
            text: text.into(),
        }
    }

    /// Parse decrypted bytes as canonical JSON; fall back to treating the
    /// bytes as a legacy plain UTF-8 string.
    pub fn parse(bytes: &[u8]) -> Self {
        if let Ok(msg) = serde_json::from_slice::<PlaintextMessage>(bytes) {
            return msg;
        }
        PlaintextMessage::text(String::from_utf8_lossy(bytes).into_owned())
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        serde_json::to_vec(self).expect("PlaintextMessage always serializes")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_canonical_json() {
        let msg = PlaintextMessage::text("hello");
        let bytes = msg.to_bytes();
        assert_eq!(PlaintextMessage::parse(&bytes), msg);
    }

    #[test]
    fn falls_back_to_legacy_plain_string() {
        let parsed = PlaintextMessage::parse(b"not json at all");
        assert_eq!(parsed, PlaintextMessage::text("not json at all"));
    }

    #[test]
    fn me_action_flag_roundtrips() {
        let msg = PlaintextMessage::me_action("waves");
        let bytes = msg.to_bytes();
        let parsed = PlaintextMessage::parse(&bytes);
        assert!(parsed.is_action);
    }
}
