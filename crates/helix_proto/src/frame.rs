//! The relay envelope and the typed per-type frame payloads.
//!
//! The relay is a dumb pipe: it sees `type`, `payload`, and routing
//! siblings (`senderId`/`targetId`) that it injects itself. The core MUST
//! NOT trust any other relay-injected field — so `RelayFrame` only exposes
//! what the wire format defines, and every payload is validated against
//! its schema and the size-limit table before the session state machine
//! ever sees it.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::codec::{check_len, MAX_ENCRYPTED_B64, MAX_FILE_NAME, MAX_IV_B64, MAX_MIME_TYPE, MAX_PUBLIC_KEY_B64};
use crate::error::ProtoError;

/// Wire type codes. `SAS_CONFIRM`/`SAS_DENY` occupy 18/19, the first
/// unused codes after the file-transfer family.
pub mod frame_type {
    pub const REGISTER: u8 = 0;
    pub const SESSION_REQUEST: u8 = 1;
    pub const SESSION_ACCEPT: u8 = 2;
    pub const SESSION_DENY: u8 = 3;
    pub const PUBLIC_KEY_RESPONSE: u8 = 4;
    pub const KEY_CONFIRM_CHALLENGE: u8 = 5;
    pub const KEY_CONFIRM_RESPONSE: u8 = 6;
    pub const SESSION_ESTABLISHED: u8 = 7;
    pub const ENCRYPTED_MESSAGE: u8 = 8;
    pub const SESSION_END: u8 = 9;
    pub const TYPING_START: u8 = 10;
    pub const TYPING_STOP: u8 = 11;
    pub const TRANSFER_REQUEST: u8 = 12;
    pub const TRANSFER_ACCEPT: u8 = 13;
    pub const TRANSFER_REJECT: u8 = 14;
    pub const TRANSFER_CHUNK: u8 = 15;
    pub const TRANSFER_COMPLETE: u8 = 16;
    pub const TRANSFER_ERROR: u8 = 17;
    pub const SAS_CONFIRM: u8 = 18;
    pub const SAS_DENY: u8 = 19;
}

/// On-wire envelope, as sent to and received from the relay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayFrame {
    #[serde(rename = "type")]
    pub frame_type: u8,
    pub payload: serde_json::Value,
    /// Relay-injected routing field; present on inbound frames.
    #[serde(rename = "senderId", skip_serializing_if = "Option::is_none", default)]
    pub sender_id: Option<String>,
    /// Relay-injected routing field; present on outbound frames.
    #[serde(rename = "targetId", skip_serializing_if = "Option::is_none", default)]
    pub target_id: Option<String>,
}

impl RelayFrame {
    pub fn new(frame_type: u8, payload: serde_json::Value, target_id: Option<String>) -> Self {
        Self {
            frame_type,
            payload,
            sender_id: None,
            target_id,
        }
    }
}

fn decode_payload<T: DeserializeOwned>(frame_type: u8, value: &serde_json::Value) -> Result<T, ProtoError> {
    serde_json::from_value(value.clone()).map_err(|e| ProtoError::SchemaViolation {
        frame_type,
        reason: e.to_string(),
    })
}

// ── Payload schemas ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterPayload {
    pub identifier: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRequestPayload {
    pub recipient: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionAcceptPayload {
    pub public_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SessionDenyPayload {}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicKeyResponsePayload {
    pub public_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyConfirmChallengePayload {
    pub iv: String,
    pub encrypted_challenge: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyConfirmResponsePayload {
    pub iv: String,
    pub encrypted_response: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SessionEstablishedPayload {}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptedMessagePayload {
    pub iv: String,
    pub data: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SessionEndPayload {}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TypingStartPayload {}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TypingStopPayload {}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRequestPayload {
    pub transfer_id: String,
    pub file_name: String,
    pub file_size: u64,
    pub mime_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferAcceptPayload {
    pub transfer_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRejectPayload {
    pub transfer_id: String,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferChunkPayload {
    pub transfer_id: String,
    pub chunk_index: u64,
    pub iv: String,
    pub data: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferCompletePayload {
    pub transfer_id: String,
    pub total_chunks: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferErrorPayload {
    pub transfer_id: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SasConfirmPayload {
    pub peer_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SasDenyPayload {
    pub peer_id: String,
}

// ── Typed frame ────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub enum Frame {
    Register(RegisterPayload),
    SessionRequest(SessionRequestPayload),
    SessionAccept(SessionAcceptPayload),
    SessionDeny(SessionDenyPayload),
    PublicKeyResponse(PublicKeyResponsePayload),
    KeyConfirmChallenge(KeyConfirmChallengePayload),
    KeyConfirmResponse(KeyConfirmResponsePayload),
    SessionEstablished(SessionEstablishedPayload),
    EncryptedMessage(EncryptedMessagePayload),
    SessionEnd(SessionEndPayload),
    TypingStart(TypingStartPayload),
    TypingStop(TypingStopPayload),
    TransferRequest(TransferRequestPayload),
    TransferAccept(TransferAcceptPayload),
    TransferReject(TransferRejectPayload),
    TransferChunk(TransferChunkPayload),
    TransferComplete(TransferCompletePayload),
    TransferError(TransferErrorPayload),
    SasConfirm(SasConfirmPayload),
    SasDeny(SasDenyPayload),
}

impl Frame {
    pub fn frame_type(&self) -> u8 {
        use frame_type::*;
        match self {
            Frame::Register(_) => REGISTER,
            Frame::SessionRequest(_) => SESSION_REQUEST,
            Frame::SessionAccept(_) => SESSION_ACCEPT,
            Frame::SessionDeny(_) => SESSION_DENY,
            Frame::PublicKeyResponse(_) => PUBLIC_KEY_RESPONSE,
            Frame::KeyConfirmChallenge(_) => KEY_CONFIRM_CHALLENGE,
            Frame::KeyConfirmResponse(_) => KEY_CONFIRM_RESPONSE,
            Frame::SessionEstablished(_) => SESSION_ESTABLISHED,
            Frame::EncryptedMessage(_) => ENCRYPTED_MESSAGE,
            Frame::SessionEnd(_) => SESSION_END,
            Frame::TypingStart(_) => TYPING_START,
            Frame::TypingStop(_) => TYPING_STOP,
            Frame::TransferRequest(_) => TRANSFER_REQUEST,
            Frame::TransferAccept(_) => TRANSFER_ACCEPT,
            Frame::TransferReject(_) => TRANSFER_REJECT,
            Frame::TransferChunk(_) => TRANSFER_CHUNK,
            Frame::TransferComplete(_) => TRANSFER_COMPLETE,
            Frame::TransferError(_) => TRANSFER_ERROR,
            Frame::SasConfirm(_) => SAS_CONFIRM,
            Frame::SasDeny(_) => SAS_DENY,
        }
    }

    /// Serialize into the wire envelope, attaching the routing target.
    pub fn into_relay_frame(self, target_id: Option<String>) -> RelayFrame {
        let frame_type = self.frame_type();
        let payload = match self {
            Frame::Register(p) => serde_json::to_value(p),
            Frame::SessionRequest(p) => serde_json::to_value(p),
            Frame::SessionAccept(p) => serde_json::to_value(p),
            Frame::SessionDeny(p) => serde_json::to_value(p),
            Frame::PublicKeyResponse(p) => serde_json::to_value(p),
            Frame::KeyConfirmChallenge(p) => serde_json::to_value(p),
            Frame::KeyConfirmResponse(p) => serde_json::to_value(p),
            Frame::SessionEstablished(p) => serde_json::to_value(p),
            Frame::EncryptedMessage(p) => serde_json::to_value(p),
            Frame::SessionEnd(p) => serde_json::to_value(p),
            Frame::TypingStart(p) => serde_json::to_value(p),
            Frame::TypingStop(p) => serde_json::to_value(p),
            Frame::TransferRequest(p) => serde_json::to_value(p),
            Frame::TransferAccept(p) => serde_json::to_value(p),
            Frame::TransferReject(p) => serde_json::to_value(p),
            Frame::TransferChunk(p) => serde_json::to_value(p),
            Frame::TransferComplete(p) => serde_json::to_value(p),
            Frame::TransferError(p) => serde_json::to_value(p),
            Frame::SasConfirm(p) => serde_json::to_value(p),
            Frame::SasDeny(p) => serde_json::to_value(p),
        }
        .expect("frame payloads always serialize to JSON");
        RelayFrame::new(frame_type, payload, target_id)
    }
}

impl TryFrom<&RelayFrame> for Frame {
    type Error = ProtoError;

    fn try_from(raw: &RelayFrame) -> Result<Self, ProtoError> {
        use frame_type::*;
        let ft = raw.frame_type;
        let payload = &raw.payload;
        Ok(match ft {
            REGISTER => Frame::Register(decode_payload(ft, payload)?),
            SESSION_REQUEST => Frame::SessionRequest(decode_payload(ft, payload)?),
            SESSION_ACCEPT => {
                let p: SessionAcceptPayload = decode_payload(ft, payload)?;
                check_len("publicKey", &p.public_key, MAX_PUBLIC_KEY_B64)?;
                Frame::SessionAccept(p)
            }
            SESSION_DENY => Frame::SessionDeny(decode_payload(ft, payload)?),
            PUBLIC_KEY_RESPONSE => {
                let p: PublicKeyResponsePayload = decode_payload(ft, payload)?;
                check_len("publicKey", &p.public_key, MAX_PUBLIC_KEY_B64)?;
                Frame::PublicKeyResponse(p)
            }
            KEY_CONFIRM_CHALLENGE => {
                let p: KeyConfirmChallengePayload = decode_payload(ft, payload)?;
                check_len("iv", &p.iv, MAX_IV_B64)?;
                check_len("encryptedChallenge", &p.encrypted_challenge, MAX_ENCRYPTED_B64)?;
                Frame::KeyConfirmChallenge(p)
            }
            KEY_CONFIRM_RESPONSE => {
                let p: KeyConfirmResponsePayload = decode_payload(ft, payload)?;
                check_len("iv", &p.iv, MAX_IV_B64)?;
                check_len("encryptedResponse", &p.encrypted_response, MAX_ENCRYPTED_B64)?;
                Frame::KeyConfirmResponse(p)
            }
            SESSION_ESTABLISHED => Frame::SessionEstablished(decode_payload(ft, payload)?),
            ENCRYPTED_MESSAGE => {
                let p: EncryptedMessagePayload = decode_payload(ft, payload)?;
                check_len("iv", &p.iv, MAX_IV_B64)?;
                check_len("data", &p.data, MAX_ENCRYPTED_B64)?;
                Frame::EncryptedMessage(p)
            }
            SESSION_END => Frame::SessionEnd(decode_payload(ft, payload)?),
            TYPING_START => Frame::TypingStart(decode_payload(ft, payload)?),
            TYPING_STOP => Frame::TypingStop(decode_payload(ft, payload)?),
            TRANSFER_REQUEST => {
                let p: TransferRequestPayload = decode_payload(ft, payload)?;
                check_len("fileName", &p.file_name, MAX_FILE_NAME)?;
                check_len("mimeType", &p.mime_type, MAX_MIME_TYPE)?;
                Frame::TransferRequest(p)
            }
            TRANSFER_ACCEPT => Frame::TransferAccept(decode_payload(ft, payload)?),
            TRANSFER_REJECT => Frame::TransferReject(decode_payload(ft, payload)?),
            TRANSFER_CHUNK => {
                let p: TransferChunkPayload = decode_payload(ft, payload)?;
                check_len("iv", &p.iv, MAX_IV_B64)?;
                check_len("data", &p.data, MAX_ENCRYPTED_B64)?;
                Frame::TransferChunk(p)
            }
            TRANSFER_COMPLETE => Frame::TransferComplete(decode_payload(ft, payload)?),
            TRANSFER_ERROR => Frame::TransferError(decode_payload(ft, payload)?),
            SAS_CONFIRM => Frame::SasConfirm(decode_payload(ft, payload)?),
            SAS_DENY => Frame::SasDeny(decode_payload(ft, payload)?),
            other => return Err(ProtoError::UnknownFrameType(other)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrips_through_relay_frame() {
        let frame = Frame::EncryptedMessage(EncryptedMessagePayload {
            iv: "aXY=".to_string(),
            data: "ZGF0YQ==".to_string(),
        });
        let relay = frame.into_relay_frame(Some("bob".to_string()));
        assert_eq!(relay.frame_type, frame_type::ENCRYPTED_MESSAGE);
        let decoded = Frame::try_from(&relay).unwrap();
        match decoded {
            Frame::EncryptedMessage(p) => {
                assert_eq!(p.iv, "aXY=");
                assert_eq!(p.data, "ZGF0YQ==");
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn rejects_oversized_public_key() {
        let raw = RelayFrame::new(
            frame_type::SESSION_ACCEPT,
            serde_json::json!({ "publicKey": "A".repeat(MAX_PUBLIC_KEY_B64 + 1) }),
            None,
        );
        assert!(Frame::try_from(&raw).is_err());
    }

    #[test]
    fn rejects_unknown_type() {
        let raw = RelayFrame::new(99, serde_json::json!({}), None);
        assert!(matches!(
            Frame::try_from(&raw),
            Err(ProtoError::UnknownFrameType(99))
        ));
    }

    #[test]
    fn rejects_schema_mismatch() {
        let raw = RelayFrame::new(frame_type::TRANSFER_REQUEST, serde_json::json!({}), None);
        assert!(matches!(
            Frame::try_from(&raw),
            Err(ProtoError::SchemaViolation { .. })
        ));
    }
}
