//! The per-peer session state machine (C3): ephemeral keys, handshake
//! state, challenge, SAS gate, message history, and file transfers.
//!
//! A `Session` never touches the transport or the chunk store directly.
//! Every handler returns a typed [`Action`]; the `SessionManager` is the
//! only thing that performs I/O. This keeps `Session` free of any back
//! reference to its owning manager.

use std::collections::HashMap;

use p256::{PublicKey, SecretKey};
use subtle::ConstantTimeEq;
use uuid::Uuid;

use helix_crypto::{aead, ecdh, hash, kdf, sas as sas_crypto, CryptoError};
use helix_proto::codec::{decode_b64_bounded, encode_b64, MAX_ENCRYPTED_B64, MAX_IV_B64, MAX_PUBLIC_KEY_B64};
use helix_proto::frame::{
    EncryptedMessagePayload, KeyConfirmChallengePayload, KeyConfirmResponsePayload,
    PublicKeyResponsePayload, SasConfirmPayload, SasDenyPayload, SessionAcceptPayload,
    SessionDenyPayload, SessionEndPayload, SessionEstablishedPayload, SessionRequestPayload,
    TransferAcceptPayload, TransferChunkPayload, TransferCompletePayload, TransferErrorPayload,
    TransferRejectPayload, TransferRequestPayload,
};
use helix_proto::{Frame, PlaintextMessage};

use crate::action::Action;
use crate::error::SessionError;
use crate::filetransfer::{Transfer, TransferRole, TransferStatus};
use crate::keys::{ChallengeReceived, ChallengeState, SessionKeys};
use crate::message_log::{MessageKind, MessageLog, MessageRecord};
use crate::sas::SasState;
use crate::state::SessionState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Initiator,
    Responder,
}

pub struct Session {
    pub peer_id: String,
    local_id: String,
    role: Role,
    state: SessionState,
    keys: SessionKeys,
    challenge: ChallengeState,
    sas: SasState,
    messages: MessageLog,
    transfers: HashMap<Uuid, Transfer>,
    max_file_bytes: u64,
    generation: u64,
    /// Set by `begin_key_derivation`, drained by the manager right after
    /// dispatching the frame that triggered it, so the manager (not the
    /// session) owns the `tokio::spawn`.
    pending_derivation: Option<KeyDerivationTask>,
}

/// A derivation kicked off by `Session::begin_key_derivation`, run to
/// completion by the manager's task runtime rather than the session
/// itself.
pub struct KeyDerivationTask {
    pub peer_id: String,
    pub generation: u64,
    secret: SecretKey,
    peer_public: PublicKey,
}

pub struct KeyDerivationOutcome {
    pub peer_id: String,
    pub generation: u64,
    pub result: Result<[u8; 32], CryptoError>,
}

impl KeyDerivationTask {
    pub async fn run(self) -> KeyDerivationOutcome {
        let shared = ecdh::derive_shared(&self.secret, &self.peer_public);
        let result = kdf::hkdf_sha256(&shared);
        KeyDerivationOutcome {
            peer_id: self.peer_id,
            generation: self.generation,
            result,
        }
    }
}

impl Session {
    fn blank(role: Role, state: SessionState, local_id: String, peer_id: String, max_file_bytes: u64) -> Self {
        Self {
            peer_id,
            local_id,
            role,
            state,
            keys: SessionKeys::generate(),
            challenge: ChallengeState::default(),
            sas: SasState::default(),
            messages: MessageLog::default(),
            transfers: HashMap::new(),
            max_file_bytes,
            generation: 0,
            pending_derivation: None,
        }
    }

    pub fn new_initiator(local_id: impl Into<String>, peer_id: impl Into<String>, max_file_bytes: u64) -> Self {
        Self::blank(Role::Initiator, SessionState::Initiating, local_id.into(), peer_id.into(), max_file_bytes)
    }

    /// `RequestReceived` is the instant Type 1 arrives; a responder session
    /// is always constructed already past it, sitting in `AwaitingAccept`
    /// until the local user decides.
    pub fn new_responder(local_id: impl Into<String>, peer_id: impl Into<String>, max_file_bytes: u64) -> Self {
        Self::blank(Role::Responder, SessionState::AwaitingAccept, local_id.into(), peer_id.into(), max_file_bytes)
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn messages(&self) -> &MessageLog {
        &self.messages
    }

    pub fn sas_value(&self) -> &str {
        &self.sas.value
    }

    pub fn transfer(&self, id: Uuid) -> Option<&Transfer> {
        self.transfers.get(&id)
    }

    pub fn remove_transfer(&mut self, id: Uuid) -> Option<Transfer> {
        self.transfers.remove(&id)
    }

    /// Wipe all ephemeral state and bump the generation so that any
    /// in-flight key derivation for this session is discarded on arrival
    /// (I6).
    pub fn reset(&mut self, new_state: SessionState) {
        self.keys = SessionKeys::generate();
        self.challenge = ChallengeState::default();
        self.sas = SasState::default();
        self.messages.clear();
        self.transfers.clear();
        self.generation += 1;
        self.pending_derivation = None;
        self.state = new_state;
    }

    // ── Local user-triggered actions ──────────────────────────────────

    pub fn send_request(&mut self) -> Frame {
        self.state = SessionState::InitiatingSession;
        Frame::SessionRequest(SessionRequestPayload {
            recipient: self.peer_id.clone(),
        })
    }

    pub fn accept_request(&mut self) -> Result<Frame, SessionError> {
        if self.state != SessionState::AwaitingAccept {
            return Err(SessionError::InvalidTransition(format!(
                "accept_request called in state {:?}",
                self.state
            )));
        }
        let spki = ecdh::export_spki(&self.keys.own_pub)?;
        self.state = SessionState::AwaitingChallenge;
        Ok(Frame::SessionAccept(SessionAcceptPayload {
            public_key: encode_b64(&spki),
        }))
    }

    pub fn deny_request(&mut self) -> Frame {
        self.state = SessionState::Denied;
        Frame::SessionDeny(SessionDenyPayload {})
    }

    pub fn end(&mut self) -> Frame {
        self.state = SessionState::Ended;
        Frame::SessionEnd(SessionEndPayload {})
    }

    pub fn send_message(&mut self, text: &str, is_action: bool) -> Result<Frame, SessionError> {
        if self.state != SessionState::Active {
            return Err(SessionError::InvalidTransition(
                "cannot send a message outside ACTIVE".into(),
            ));
        }
        let aes_key = self.keys.aes_key().ok_or_else(|| {
            SessionError::InvalidTransition("no AES key for an ACTIVE session".into())
        })?;
        let msg = if is_action {
            PlaintextMessage::me_action(text)
        } else {
            PlaintextMessage::text(text)
        };
        let iv = aead::random_iv();
        let ciphertext = aead::aead_seal(aes_key, &iv, &msg.to_bytes())?;
        self.messages.push(MessageRecord {
            sender: self.local_id.clone(),
            text: text.to_string(),
            kind: if is_action { MessageKind::MeAction } else { MessageKind::Own },
        });
        Ok(Frame::EncryptedMessage(EncryptedMessagePayload {
            iv: encode_b64(&iv),
            data: encode_b64(&ciphertext),
        }))
    }

    pub fn start_typing(&self) -> Option<Frame> {
        (self.state == SessionState::Active).then(|| {
            Frame::TypingStart(helix_proto::frame::TypingStartPayload {})
        })
    }

    pub fn stop_typing(&self) -> Option<Frame> {
        (self.state == SessionState::Active).then(|| {
            Frame::TypingStop(helix_proto::frame::TypingStopPayload {})
        })
    }

    pub fn confirm_sas(&mut self) -> Result<Action, SessionError> {
        if !matches!(self.state, SessionState::SasPendingLocal | SessionState::SasPendingRemote) {
            return Err(SessionError::InvalidTransition(
                "confirm_sas called outside the SAS gate".into(),
            ));
        }
        self.sas.local_confirmed = true;
        if self.sas.both_confirmed() {
            self.state = SessionState::Active;
            return Ok(Action::SessionActive);
        }
        self.state = SessionState::SasPendingRemote;
        Ok(Action::Send(Frame::SasConfirm(SasConfirmPayload {
            peer_id: self.peer_id.clone(),
        })))
    }

    pub fn deny_sas(&mut self) -> Frame {
        Frame::SasDeny(SasDenyPayload {
            peer_id: self.peer_id.clone(),
        })
    }

    /// Sender-side: offer a new file transfer.
    pub fn offer_transfer(&mut self, file_name: String, file_size: u64, mime_type: String) -> Result<(Uuid, Frame), SessionError> {
        if self.state != SessionState::Active {
            return Err(SessionError::InvalidTransition("cannot offer a transfer outside ACTIVE".into()));
        }
        if file_size > self.max_file_bytes {
            return Err(SessionError::InvalidTransition(format!(
                "file_size {file_size} exceeds max_file_bytes {}",
                self.max_file_bytes
            )));
        }
        let id = Uuid::new_v4();
        self.transfers.insert(
            id,
            Transfer::new(id, TransferRole::Sender, file_name.clone(), file_size, mime_type.clone()),
        );
        Ok((
            id,
            Frame::TransferRequest(TransferRequestPayload {
                transfer_id: id.to_string(),
                file_name,
                file_size,
                mime_type,
            }),
        ))
    }

    pub fn accept_transfer(&mut self, id: Uuid) -> Result<Frame, SessionError> {
        let transfer = self.transfers.get_mut(&id).ok_or_else(|| SessionError::InvalidTransition("unknown transfer".into()))?;
        transfer.status = TransferStatus::Accepted;
        Ok(Frame::TransferAccept(TransferAcceptPayload {
            transfer_id: id.to_string(),
        }))
    }

    pub fn reject_transfer(&mut self, id: Uuid, reason: Option<String>) -> Result<Frame, SessionError> {
        self.transfers.remove(&id).ok_or_else(|| SessionError::InvalidTransition("unknown transfer".into()))?;
        Ok(Frame::TransferReject(TransferRejectPayload {
            transfer_id: id.to_string(),
            reason,
        }))
    }

    /// Sender-side: seal the next chunk, advancing `next_chunk_index`.
    pub fn encrypt_next_chunk(&mut self, id: Uuid, plaintext: &[u8]) -> Result<Frame, SessionError> {
        let aes_key = self.keys.aes_key().ok_or_else(|| {
            SessionError::InvalidTransition("no AES key for an ACTIVE session".into())
        })?;
        let iv = aead::random_iv();
        let ciphertext = aead::aead_seal(aes_key, &iv, plaintext)?;
        let transfer = self.transfers.get_mut(&id).ok_or_else(|| SessionError::InvalidTransition("unknown transfer".into()))?;
        transfer.status = TransferStatus::Transferring;
        let chunk_index = transfer.next_chunk_index;
        transfer.next_chunk_index += 1;
        transfer.bytes_done += plaintext.len() as u64;
        transfer.note_chunk_sent();
        Ok(Frame::TransferChunk(TransferChunkPayload {
            transfer_id: id.to_string(),
            chunk_index,
            iv: encode_b64(&iv),
            data: encode_b64(&ciphertext),
        }))
    }

    /// Called once the manager's transport confirms a chunk send flushed,
    /// freeing a slot in the in-flight window.
    pub fn note_chunk_flushed(&mut self, id: Uuid) {
        if let Some(transfer) = self.transfers.get_mut(&id) {
            transfer.note_chunk_flushed();
        }
    }

    pub fn finish_transfer(&mut self, id: Uuid) -> Result<Frame, SessionError> {
        let transfer = self.transfers.get(&id).ok_or_else(|| SessionError::InvalidTransition("unknown transfer".into()))?;
        let total_chunks = transfer.next_chunk_index;
        Ok(Frame::TransferComplete(TransferCompletePayload {
            transfer_id: id.to_string(),
            total_chunks,
        }))
    }

    // ── Async key derivation plumbing ─────────────────────────────────

    fn begin_key_derivation(&mut self, peer_public: PublicKey) {
        self.keys.peer_pub = Some(peer_public.clone());
        self.state = match self.role {
            Role::Initiator => SessionState::DerivingKeyInitiator,
            Role::Responder => SessionState::DerivingKeyResponder,
        };
        self.pending_derivation = Some(KeyDerivationTask {
            peer_id: self.peer_id.clone(),
            generation: self.generation,
            secret: self.keys.own_priv.clone(),
            peer_public,
        });
    }

    /// Drain the derivation task queued by the frame just handled, if
    /// any. The manager calls this immediately after `handle_frame` and
    /// `tokio::spawn`s the result itself.
    pub fn take_pending_derivation(&mut self) -> Option<KeyDerivationTask> {
        self.pending_derivation.take()
    }

    /// Apply a completed derivation. Returns `None` if the outcome is
    /// stale (generation mismatch — the session was reset in the
    /// meantime) and must be discarded without mutating state (I6).
    pub fn complete_key_derivation(&mut self, outcome: KeyDerivationOutcome) -> Option<Result<Action, SessionError>> {
        if outcome.generation != self.generation {
            return None;
        }
        Some(self.apply_derived_key(outcome.result))
    }

    fn apply_derived_key(&mut self, result: Result<[u8; 32], CryptoError>) -> Result<Action, SessionError> {
        let key = result?;
        self.keys.set_aes_key(key);
        match self.role {
            Role::Initiator => {
                self.state = SessionState::KeyDerivedInitiator;
                match std::mem::replace(&mut self.challenge.received, ChallengeReceived::None) {
                    ChallengeReceived::Buffered { iv, ciphertext } => self.decrypt_and_respond_to_challenge(&iv, &ciphertext),
                    _ => Ok(Action::None),
                }
            }
            Role::Responder => self.send_challenge(),
        }
    }

    fn send_challenge(&mut self) -> Result<Action, SessionError> {
        let aes_key = *self.keys.aes_key().expect("aes_key set immediately before send_challenge");
        let challenge = hash::random_bytes(32);
        let iv = aead::random_iv();
        let ciphertext = aead::aead_seal(&aes_key, &iv, &challenge)?;
        let mut sent = [0u8; 32];
        sent.copy_from_slice(&challenge);
        self.challenge.sent = Some(sent);
        self.state = SessionState::AwaitingFinalConfirmation;
        Ok(Action::Send(Frame::KeyConfirmChallenge(KeyConfirmChallengePayload {
            iv: encode_b64(&iv),
            encrypted_challenge: encode_b64(&ciphertext),
        })))
    }

    fn decrypt_and_respond_to_challenge(&mut self, iv: &[u8; 12], ciphertext: &[u8]) -> Result<Action, SessionError> {
        let aes_key = *self.keys.aes_key().expect("aes_key set before decrypting a challenge");
        let plaintext = match aead::aead_open(&aes_key, iv, ciphertext) {
            Ok(p) => p,
            Err(_) => return Ok(Action::reset("Challenge decryption failed")),
        };
        let response_ciphertext = {
            let response_iv = aead::random_iv();
            let sealed = aead::aead_seal(&aes_key, &response_iv, &plaintext)?;
            (response_iv, sealed)
        };
        self.state = SessionState::ReceivedChallenge;
        Ok(Action::Send(Frame::KeyConfirmResponse(KeyConfirmResponsePayload {
            iv: encode_b64(&response_ciphertext.0),
            encrypted_response: encode_b64(&response_ciphertext.1),
        })))
    }

    // ── Inbound frame handling ────────────────────────────────────────

    pub fn handle_frame(&mut self, frame: &Frame) -> Result<Action, SessionError> {
        match frame {
            Frame::SessionAccept(p) => self.on_session_accept(p),
            Frame::SessionDeny(_) => Ok(self.on_session_deny()),
            Frame::PublicKeyResponse(p) => self.on_public_key_response(p),
            Frame::KeyConfirmChallenge(p) => self.on_key_confirm_challenge(p),
            Frame::KeyConfirmResponse(p) => self.on_key_confirm_response(p),
            Frame::SessionEstablished(_) => self.on_session_established(),
            Frame::EncryptedMessage(p) => self.on_encrypted_message(p),
            Frame::SessionEnd(_) => Ok(self.on_session_end()),
            Frame::TypingStart(_) => Ok(self.on_typing_start()),
            Frame::TypingStop(_) => Ok(self.on_typing_stop()),
            Frame::SasConfirm(_) => Ok(self.on_sas_confirm()),
            Frame::SasDeny(_) => Ok(Action::reset("Peer aborted verification")),
            Frame::TransferRequest(p) => self.on_transfer_request(p),
            Frame::TransferAccept(p) => Ok(self.on_transfer_accept(p)),
            Frame::TransferReject(p) => Ok(self.on_transfer_reject(p)),
            Frame::TransferChunk(p) => self.on_transfer_chunk(p),
            Frame::TransferComplete(p) => Ok(self.on_transfer_complete(p)),
            Frame::TransferError(p) => Ok(self.on_transfer_error(p)),
            Frame::Register(_) | Frame::SessionRequest(_) => Err(SessionError::InvalidTransition(
                "frame type not valid on an existing session".into(),
            )),
        }
    }

    fn on_session_accept(&mut self, p: &SessionAcceptPayload) -> Result<Action, SessionError> {
        if self.state != SessionState::InitiatingSession {
            return Ok(Action::reset("Unexpected session accept"));
        }
        let peer_spki = decode_b64_bounded("publicKey", &p.public_key, MAX_PUBLIC_KEY_B64)?;
        let peer_pub = ecdh::import_spki(&peer_spki)?;
        let own_spki = ecdh::export_spki(&self.keys.own_pub)?;
        self.begin_key_derivation(peer_pub);
        Ok(Action::Send(Frame::PublicKeyResponse(PublicKeyResponsePayload {
            public_key: encode_b64(&own_spki),
        })))
    }

    fn on_session_deny(&mut self) -> Action {
        self.state = SessionState::Denied;
        Action::reset("Session request denied")
    }

    fn on_public_key_response(&mut self, p: &PublicKeyResponsePayload) -> Result<Action, SessionError> {
        if self.state != SessionState::AwaitingChallenge {
            return Ok(Action::reset("Unexpected public key response"));
        }
        let peer_spki = decode_b64_bounded("publicKey", &p.public_key, MAX_PUBLIC_KEY_B64)?;
        let peer_pub = ecdh::import_spki(&peer_spki)?;
        // Momentarily observable before begin_key_derivation immediately
        // advances to DERIVING_KEY_RESPONDER.
        self.state = SessionState::ReceivedInitiatorKey;
        self.begin_key_derivation(peer_pub);
        Ok(Action::None)
    }

    fn on_key_confirm_challenge(&mut self, p: &KeyConfirmChallengePayload) -> Result<Action, SessionError> {
        let iv = decode_iv(&p.iv)?;
        let ciphertext = decode_b64_bounded("encryptedChallenge", &p.encrypted_challenge, MAX_ENCRYPTED_B64)?;
        match self.state {
            SessionState::KeyDerivedInitiator => self.decrypt_and_respond_to_challenge(&iv, &ciphertext),
            SessionState::DerivingKeyInitiator => {
                self.challenge.received = ChallengeReceived::Buffered { iv, ciphertext };
                Ok(Action::None)
            }
            _ => Ok(Action::reset("Unexpected key confirmation challenge")),
        }
    }

    fn on_key_confirm_response(&mut self, p: &KeyConfirmResponsePayload) -> Result<Action, SessionError> {
        if self.state != SessionState::AwaitingFinalConfirmation {
            return Ok(Action::reset("Unexpected key confirmation response"));
        }
        let aes_key = *self.keys.aes_key().ok_or_else(|| {
            SessionError::InvalidTransition("key confirmation response without a derived key".into())
        })?;
        let iv = decode_iv(&p.iv)?;
        let ciphertext = decode_b64_bounded("encryptedResponse", &p.encrypted_response, MAX_ENCRYPTED_B64)?;
        let expected = self.challenge.sent;
        self.challenge.clear_sent();
        let decrypted = match aead::aead_open(&aes_key, &iv, &ciphertext) {
            Ok(p) => p,
            Err(_) => return Ok(Action::reset("Challenge response verification failed")),
        };
        let expected = match expected {
            Some(bytes) => bytes,
            None => return Ok(Action::reset("Challenge response verification failed")),
        };
        if decrypted.as_slice().ct_eq(&expected).unwrap_u8() != 1 {
            return Ok(Action::reset("Challenge response verification failed"));
        }
        self.state = SessionState::HandshakeComplete;
        self.compute_sas()?;
        Ok(Action::Send(Frame::SessionEstablished(SessionEstablishedPayload {})))
    }

    fn on_session_established(&mut self) -> Result<Action, SessionError> {
        if self.state != SessionState::ReceivedChallenge {
            return Ok(Action::reset("Unexpected session established"));
        }
        self.state = SessionState::HandshakeComplete;
        self.compute_sas()?;
        Ok(Action::ShowInfo(self.sas.value.clone()))
    }

    fn compute_sas(&mut self) -> Result<(), SessionError> {
        let own_spki = ecdh::export_spki(&self.keys.own_pub)?;
        let peer_pub = self.keys.peer_pub.clone().ok_or_else(|| {
            SessionError::InvalidTransition("SAS computed before peer key was set".into())
        })?;
        let peer_spki = ecdh::export_spki(&peer_pub)?;
        self.sas.value = sas_crypto::derive_sas(&own_spki, &peer_spki);
        self.state = SessionState::SasPendingLocal;
        Ok(())
    }

    fn on_encrypted_message(&mut self, p: &EncryptedMessagePayload) -> Result<Action, SessionError> {
        if self.state != SessionState::Active {
            return Ok(Action::reset("Encrypted message received before the session was active"));
        }
        let aes_key = *self.keys.aes_key().ok_or_else(|| {
            SessionError::InvalidTransition("ACTIVE session without an AES key".into())
        })?;
        let iv = decode_iv(&p.iv)?;
        let ciphertext = decode_b64_bounded("data", &p.data, MAX_ENCRYPTED_B64)?;
        let plaintext = match aead::aead_open(&aes_key, &iv, &ciphertext) {
            Ok(p) => p,
            Err(_) => return Ok(Action::DisplaySystemMessage("Failed to decrypt message".into())),
        };
        let msg = PlaintextMessage::parse(&plaintext);
        self.messages.push(MessageRecord {
            sender: self.peer_id.clone(),
            text: msg.text.clone(),
            kind: if msg.is_action { MessageKind::MeAction } else { MessageKind::Peer },
        });
        Ok(if msg.is_action {
            Action::DisplayMeAction { sender: self.peer_id.clone(), text: msg.text }
        } else {
            Action::DisplayMessage { sender: self.peer_id.clone(), text: msg.text }
        })
    }

    fn on_session_end(&mut self) -> Action {
        self.state = SessionState::Ended;
        Action::reset_silent("Peer ended the session")
    }

    fn on_typing_start(&self) -> Action {
        if self.state == SessionState::Active { Action::ShowTyping } else { Action::None }
    }

    fn on_typing_stop(&self) -> Action {
        if self.state == SessionState::Active { Action::HideTyping } else { Action::None }
    }

    fn on_sas_confirm(&mut self) -> Action {
        self.sas.remote_confirmed = true;
        if self.sas.both_confirmed() && self.state == SessionState::SasPendingRemote {
            self.state = SessionState::Active;
            Action::SessionActive
        } else {
            Action::None
        }
    }

    fn on_transfer_request(&mut self, p: &TransferRequestPayload) -> Result<Action, SessionError> {
        if self.state != SessionState::Active {
            return Ok(Action::reset("Transfer request received before the session was active"));
        }
        let id = parse_transfer_id(&p.transfer_id)?;
        if p.file_size > self.max_file_bytes {
            return Ok(Action::AbortTransfer {
                transfer_id: id,
                reason: format!("file_size {} exceeds max_file_bytes {}", p.file_size, self.max_file_bytes),
            });
        }
        self.transfers.insert(
            id,
            Transfer::new(id, TransferRole::Receiver, p.file_name.clone(), p.file_size, p.mime_type.clone()),
        );
        Ok(Action::TransferOffered {
            transfer_id: id,
            file_name: p.file_name.clone(),
            file_size: p.file_size,
        })
    }

    fn on_transfer_accept(&mut self, p: &TransferAcceptPayload) -> Action {
        if self.state != SessionState::Active {
            return Action::reset("Transfer accept received before the session was active");
        }
        let Ok(id) = parse_transfer_id(&p.transfer_id) else { return Action::None };
        if let Some(t) = self.transfers.get_mut(&id) {
            t.status = TransferStatus::Accepted;
        }
        Action::None
    }

    fn on_transfer_reject(&mut self, p: &TransferRejectPayload) -> Action {
        if self.state != SessionState::Active {
            return Action::reset("Transfer reject received before the session was active");
        }
        let Ok(id) = parse_transfer_id(&p.transfer_id) else { return Action::None };
        if self.transfers.remove(&id).is_none() {
            return Action::None;
        }
        Action::DisplaySystemMessage(format!(
            "{} declined the file transfer{}",
            self.peer_id,
            p.reason.as_deref().map(|r| format!(": {r}")).unwrap_or_default()
        ))
    }

    fn on_transfer_chunk(&mut self, p: &TransferChunkPayload) -> Result<Action, SessionError> {
        if self.state != SessionState::Active {
            return Ok(Action::reset("Transfer chunk received before the session was active"));
        }
        let id = parse_transfer_id(&p.transfer_id)?;
        let aes_key = *self.keys.aes_key().ok_or_else(|| {
            SessionError::InvalidTransition("ACTIVE session without an AES key".into())
        })?;
        let iv = decode_iv(&p.iv)?;
        let ciphertext = decode_b64_bounded("data", &p.data, MAX_ENCRYPTED_B64)?;

        let Some(transfer) = self.transfers.get_mut(&id) else {
            return Ok(Action::AbortTransfer { transfer_id: id, reason: "unknown transfer".into() });
        };
        if p.chunk_index != transfer.next_chunk_index {
            self.transfers.remove(&id);
            return Ok(Action::AbortTransfer { transfer_id: id, reason: "chunk index out of order".into() });
        }
        let plaintext = match aead::aead_open(&aes_key, &iv, &ciphertext) {
            Ok(p) => p,
            Err(_) => {
                self.transfers.remove(&id);
                return Ok(Action::AbortTransfer { transfer_id: id, reason: "chunk decryption failed".into() });
            }
        };
        transfer.status = TransferStatus::Transferring;
        transfer.next_chunk_index += 1;
        transfer.bytes_done += plaintext.len() as u64;
        Ok(Action::StoreChunk { transfer_id: id, index: p.chunk_index, plaintext: plaintext.to_vec() })
    }

    fn on_transfer_complete(&mut self, p: &TransferCompletePayload) -> Action {
        if self.state != SessionState::Active {
            return Action::reset("Transfer complete received before the session was active");
        }
        let Ok(id) = parse_transfer_id(&p.transfer_id) else { return Action::None };
        let Some(transfer) = self.transfers.get_mut(&id) else {
            return Action::AbortTransfer { transfer_id: id, reason: "unknown transfer".into() };
        };
        if transfer.next_chunk_index != p.total_chunks {
            self.transfers.remove(&id);
            return Action::AbortTransfer { transfer_id: id, reason: "chunk count mismatch".into() };
        }
        transfer.status = TransferStatus::Complete;
        Action::CompleteTransfer { transfer_id: id }
    }

    fn on_transfer_error(&mut self, p: &TransferErrorPayload) -> Action {
        if self.state != SessionState::Active {
            return Action::reset("Transfer error received before the session was active");
        }
        let Ok(id) = parse_transfer_id(&p.transfer_id) else { return Action::None };
        if self.transfers.remove(&id).is_none() {
            return Action::None;
        }
        Action::DisplaySystemMessage(format!("File transfer failed: {}", p.reason))
    }
}

fn decode_iv(s: &str) -> Result<[u8; 12], SessionError> {
    let bytes = decode_b64_bounded("iv", s, MAX_IV_B64)?;
    bytes
        .try_into()
        .map_err(|_| SessionError::InvalidTransition("IV must be 12 bytes".into()))
}

fn parse_transfer_id(s: &str) -> Result<Uuid, SessionError> {
    Uuid::parse_str(s).map_err(|_| SessionError::InvalidTransition("invalid transfer id".into()))
}
