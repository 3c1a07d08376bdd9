//! Registry of sessions by peer id (C4): routes inbound relay frames,
//! serializes outbound frames through a single transport, and owns the
//! timers that each session's handshake and typing state depend on.
//!
//! A `SessionManager` is single-threaded cooperative: inbound frames are
//! dispatched one at a time, but a handler may suspend the manager on a
//! crypto operation (key derivation) without blocking other peers' timers
//! from firing, since derivation itself runs on a spawned task.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{self, Instant};
use uuid::Uuid;

use helix_proto::{frame_type, validation::validate_identifier, Frame, RelayFrame};

use crate::action::Action;
use crate::config::Config;
use crate::error::SessionError;
use crate::filetransfer::ChunkStore;
use crate::session::{KeyDerivationOutcome, Session};
use crate::state::SessionState;
use crate::transport::Transport;

/// Everything the application layer needs to know about, surfaced from
/// session activity that isn't itself an outbound frame.
#[derive(Debug, Clone)]
pub enum ManagerEvent {
    Info { peer_id: String, text: String },
    IncomingRequest { peer_id: String },
    Message { peer_id: String, sender: String, text: String },
    MeAction { peer_id: String, sender: String, text: String },
    SystemMessage { peer_id: String, text: String },
    Typing { peer_id: String, started: bool },
    SessionActive { peer_id: String },
    SessionReset { peer_id: String, reason: String },
    TransferOffered { peer_id: String, transfer_id: Uuid, file_name: String, file_size: u64 },
    TransferComplete {
        peer_id: String,
        transfer_id: Uuid,
        file_name: String,
        mime_type: String,
        bytes: Vec<u8>,
    },
    TransferFailed { peer_id: String, transfer_id: Uuid, reason: String },
}

struct SessionEntry {
    session: Session,
    request_deadline: Option<Instant>,
    handshake_deadline: Option<Instant>,
    typing_deadline: Option<Instant>,
}

impl SessionEntry {
    fn new(session: Session) -> Self {
        Self {
            session,
            request_deadline: None,
            handshake_deadline: None,
            typing_deadline: None,
        }
    }
}

pub struct SessionManager {
    local_id: String,
    transport: Arc<dyn Transport>,
    chunk_store: Arc<dyn ChunkStore>,
    config: Config,
    sessions: HashMap<String, SessionEntry>,
    event_tx: mpsc::UnboundedSender<ManagerEvent>,
    derivation_tx: mpsc::UnboundedSender<KeyDerivationOutcome>,
    derivation_rx: mpsc::UnboundedReceiver<KeyDerivationOutcome>,
}

impl SessionManager {
    pub fn new(
        local_id: impl Into<String>,
        transport: Arc<dyn Transport>,
        chunk_store: Arc<dyn ChunkStore>,
        config: Config,
        event_tx: mpsc::UnboundedSender<ManagerEvent>,
    ) -> Self {
        let (derivation_tx, derivation_rx) = mpsc::unbounded_channel();
        Self {
            local_id: local_id.into(),
            transport,
            chunk_store,
            config,
            sessions: HashMap::new(),
            event_tx,
            derivation_tx,
            derivation_rx,
        }
    }

    /// Sends the registration frame and awaits the relay's reply. Must
    /// succeed before any other method is called.
    pub async fn register(&self, inbound: &mut mpsc::UnboundedReceiver<RelayFrame>) -> Result<(), SessionError> {
        validate_identifier(&self.local_id)?;
        let payload = serde_json::json!({ "identifier": self.local_id });
        let frame = RelayFrame::new(frame_type::REGISTER, payload, None);
        self.transport
            .send(frame)
            .await
            .map_err(|e| SessionError::Transport(e.to_string()))?;

        let reply = time::timeout(Duration::from_millis(self.config.request_timeout_ms), inbound.recv())
            .await
            .map_err(|_| SessionError::RegistrationTimeout)?
            .ok_or(SessionError::RegistrationTimeout)?;

        match reply.payload.get("status").and_then(|v| v.as_str()) {
            Some("ok") => Ok(()),
            Some("taken") => Err(SessionError::IdentifierTaken(self.local_id.clone())),
            _ => Err(SessionError::IdentifierInvalid(self.local_id.clone())),
        }
    }

    /// Drives the manager until the inbound channel closes.
    pub async fn run(&mut self, mut inbound: mpsc::UnboundedReceiver<RelayFrame>) {
        let mut ticker = time::interval(Duration::from_millis(250));
        loop {
            tokio::select! {
                frame = inbound.recv() => {
                    match frame {
                        Some(frame) => self.handle_inbound(frame).await,
                        None => {
                            tracing::info!("relay connection closed");
                            break;
                        }
                    }
                }
                Some(outcome) = self.derivation_rx.recv() => {
                    self.handle_derivation_outcome(outcome).await;
                }
                _ = ticker.tick() => {
                    self.check_timeouts().await;
                }
            }
        }
    }

    // ── Local user-triggered actions ──────────────────────────────────

    pub async fn send_request(&mut self, peer_id: impl Into<String>) {
        let peer_id = peer_id.into();
        let mut session = Session::new_initiator(self.local_id.clone(), peer_id.clone(), self.config.max_file_bytes);
        let frame = session.send_request();
        self.sessions.insert(peer_id.clone(), SessionEntry::new(session));
        self.sync_timers(&peer_id);
        self.send_frame(&peer_id, frame).await;
    }

    pub async fn accept_request(&mut self, peer_id: &str) -> Result<(), SessionError> {
        let frame = self.entry_mut(peer_id)?.session.accept_request()?;
        self.sync_timers(peer_id);
        self.send_frame(peer_id, frame).await;
        Ok(())
    }

    pub async fn deny_request(&mut self, peer_id: &str) -> Result<(), SessionError> {
        let frame = self.entry_mut(peer_id)?.session.deny_request();
        self.send_frame(peer_id, frame).await;
        self.sessions.remove(peer_id);
        Ok(())
    }

    pub async fn end_session(&mut self, peer_id: &str) -> Result<(), SessionError> {
        let frame = self.entry_mut(peer_id)?.session.end();
        self.send_frame(peer_id, frame).await;
        self.sessions.remove(peer_id);
        Ok(())
    }

    pub async fn send_message(&mut self, peer_id: &str, text: &str, is_action: bool) -> Result<(), SessionError> {
        let frame = self.entry_mut(peer_id)?.session.send_message(text, is_action)?;
        self.send_frame(peer_id, frame).await;
        Ok(())
    }

    pub async fn start_typing(&mut self, peer_id: &str) -> Result<(), SessionError> {
        if let Some(frame) = self.entry_mut(peer_id)?.session.start_typing() {
            self.send_frame(peer_id, frame).await;
        }
        Ok(())
    }

    pub async fn stop_typing(&mut self, peer_id: &str) -> Result<(), SessionError> {
        if let Some(frame) = self.entry_mut(peer_id)?.session.stop_typing() {
            self.send_frame(peer_id, frame).await;
        }
        Ok(())
    }

    pub async fn confirm_sas(&mut self, peer_id: &str) -> Result<(), SessionError> {
        let action = self.entry_mut(peer_id)?.session.confirm_sas()?;
        self.apply_action(peer_id, action).await;
        Ok(())
    }

    pub async fn deny_sas(&mut self, peer_id: &str) -> Result<(), SessionError> {
        let entry = self.entry_mut(peer_id)?;
        let frame = entry.session.deny_sas();
        entry.session.reset(SessionState::Ended);
        self.send_frame(peer_id, frame).await;
        self.sessions.remove(peer_id);
        Ok(())
    }

    pub async fn offer_transfer(
        &mut self,
        peer_id: &str,
        file_name: String,
        file_size: u64,
        mime_type: String,
    ) -> Result<Uuid, SessionError> {
        let (id, frame) = self.entry_mut(peer_id)?.session.offer_transfer(file_name, file_size, mime_type)?;
        self.send_frame(peer_id, frame).await;
        Ok(id)
    }

    pub async fn accept_transfer(&mut self, peer_id: &str, id: Uuid) -> Result<(), SessionError> {
        let frame = self.entry_mut(peer_id)?.session.accept_transfer(id)?;
        self.send_frame(peer_id, frame).await;
        Ok(())
    }

    pub async fn reject_transfer(&mut self, peer_id: &str, id: Uuid, reason: Option<String>) -> Result<(), SessionError> {
        let frame = self.entry_mut(peer_id)?.session.reject_transfer(id, reason)?;
        self.send_frame(peer_id, frame).await;
        Ok(())
    }

    /// Seals and sends the next chunk, rejecting the call if the in-flight
    /// window is already full.
    pub async fn send_chunk(&mut self, peer_id: &str, id: Uuid, plaintext: &[u8]) -> Result<(), SessionError> {
        let window = self.config.inflight_window;
        let entry = self.entry_mut(peer_id)?;
        let within_window = entry
            .session
            .transfer(id)
            .map(|t| t.can_send_next_chunk(window))
            .unwrap_or(false);
        if !within_window {
            return Err(SessionError::InvalidTransition("in-flight window exhausted".into()));
        }
        let frame = entry.session.encrypt_next_chunk(id, plaintext)?;
        self.send_frame(peer_id, frame).await;
        Ok(())
    }

    /// Called by the transport-driving loop once a chunk send is flushed.
    pub fn note_chunk_flushed(&mut self, peer_id: &str, id: Uuid) {
        if let Some(entry) = self.sessions.get_mut(peer_id) {
            entry.session.note_chunk_flushed(id);
        }
    }

    pub async fn finish_transfer(&mut self, peer_id: &str, id: Uuid) -> Result<(), SessionError> {
        let frame = self.entry_mut(peer_id)?.session.finish_transfer(id)?;
        self.send_frame(peer_id, frame).await;
        Ok(())
    }

    // ── Inbound dispatch ───────────────────────────────────────────────

    async fn handle_inbound(&mut self, relay: RelayFrame) {
        let Some(peer_id) = relay.sender_id.clone() else {
            tracing::warn!("dropping relay frame with no senderId");
            return;
        };
        let frame = match Frame::try_from(&relay) {
            Ok(f) => f,
            Err(err) => {
                tracing::warn!(peer_id, error = %err, "dropping malformed frame");
                return;
            }
        };

        if !self.sessions.contains_key(&peer_id) {
            if let Frame::SessionRequest(_) = &frame {
                if validate_identifier(&peer_id).is_err() {
                    tracing::warn!(peer_id, "dropping session request from invalid senderId");
                    return;
                }
                let session = Session::new_responder(self.local_id.clone(), peer_id.clone(), self.config.max_file_bytes);
                self.sessions.insert(peer_id.clone(), SessionEntry::new(session));
                self.sync_timers(&peer_id);
                let _ = self.event_tx.send(ManagerEvent::IncomingRequest { peer_id });
            } else {
                tracing::debug!(peer_id, frame_type = frame.frame_type(), "dropping frame for unknown session");
            }
            return;
        }

        let state_before = self.sessions.get(&peer_id).unwrap().session.state();
        let outcome = self.sessions.get_mut(&peer_id).unwrap().session.handle_frame(&frame);
        match outcome {
            Ok(action) => self.apply_action(&peer_id, action).await,
            Err(err) => tracing::warn!(peer_id, error = %err, "frame handler rejected"),
        }
        self.trace_transition(&peer_id, state_before);
        self.spawn_pending_derivation(&peer_id);
        self.sync_timers(&peer_id);
    }

    /// Verbose per-transition logging, gated behind `config.debug` since it
    /// fires on every inbound frame and would otherwise flood the log at
    /// the default level.
    fn trace_transition(&self, peer_id: &str, state_before: SessionState) {
        if !self.config.debug {
            return;
        }
        let Some(entry) = self.sessions.get(peer_id) else {
            tracing::debug!(peer_id, ?state_before, "session ended");
            return;
        };
        let state_after = entry.session.state();
        if state_after != state_before {
            tracing::debug!(peer_id, ?state_before, ?state_after, "session state transition");
        }
    }

    async fn handle_derivation_outcome(&mut self, outcome: KeyDerivationOutcome) {
        let peer_id = outcome.peer_id.clone();
        let Some(entry) = self.sessions.get_mut(&peer_id) else { return };
        let state_before = entry.session.state();
        match entry.session.complete_key_derivation(outcome) {
            Some(Ok(action)) => {
                self.apply_action(&peer_id, action).await;
                self.trace_transition(&peer_id, state_before);
                self.sync_timers(&peer_id);
            }
            Some(Err(err)) => tracing::warn!(peer_id, error = %err, "key derivation failed"),
            None => tracing::debug!(peer_id, "discarding stale key derivation result"),
        }
    }

    async fn apply_action(&mut self, peer_id: &str, action: Action) {
        match action {
            Action::None => {}
            Action::Send(frame) => self.send_frame(peer_id, frame).await,
            Action::DisplayMessage { sender, text } => {
                let _ = self.event_tx.send(ManagerEvent::Message { peer_id: peer_id.to_string(), sender, text });
            }
            Action::DisplayMeAction { sender, text } => {
                let _ = self.event_tx.send(ManagerEvent::MeAction { peer_id: peer_id.to_string(), sender, text });
            }
            Action::DisplaySystemMessage(text) => {
                let _ = self.event_tx.send(ManagerEvent::SystemMessage { peer_id: peer_id.to_string(), text });
            }
            Action::ShowInfo(text) => {
                let _ = self.event_tx.send(ManagerEvent::Info { peer_id: peer_id.to_string(), text });
            }
            Action::ShowTyping => {
                if let Some(entry) = self.sessions.get_mut(peer_id) {
                    entry.typing_deadline = Some(Instant::now() + Duration::from_millis(self.config.peer_typing_timeout_ms));
                }
                let _ = self.event_tx.send(ManagerEvent::Typing { peer_id: peer_id.to_string(), started: true });
            }
            Action::HideTyping => {
                if let Some(entry) = self.sessions.get_mut(peer_id) {
                    entry.typing_deadline = None;
                }
                let _ = self.event_tx.send(ManagerEvent::Typing { peer_id: peer_id.to_string(), started: false });
            }
            Action::SessionActive => {
                let _ = self.event_tx.send(ManagerEvent::SessionActive { peer_id: peer_id.to_string() });
            }
            Action::TransferOffered { transfer_id, file_name, file_size } => {
                let _ = self.event_tx.send(ManagerEvent::TransferOffered {
                    peer_id: peer_id.to_string(),
                    transfer_id,
                    file_name,
                    file_size,
                });
            }
            Action::Reset { reason, notify } => {
                tracing::warn!(peer_id, reason = %reason, "resetting session");
                if let Some(mut entry) = self.sessions.remove(peer_id) {
                    entry.session.reset(SessionState::Ended);
                }
                if notify {
                    let _ = self.event_tx.send(ManagerEvent::SessionReset { peer_id: peer_id.to_string(), reason });
                }
            }
            Action::StoreChunk { transfer_id, index, plaintext } => {
                self.chunk_store.put(transfer_id, index, plaintext).await;
            }
            Action::CompleteTransfer { transfer_id } => {
                let assembled = self.chunk_store.assemble(transfer_id).await;
                self.chunk_store.delete(transfer_id).await;
                let removed = self.sessions.get_mut(peer_id).and_then(|e| e.session.remove_transfer(transfer_id));
                if let (Some(bytes), Some(transfer)) = (assembled, removed) {
                    let _ = self.event_tx.send(ManagerEvent::TransferComplete {
                        peer_id: peer_id.to_string(),
                        transfer_id,
                        file_name: transfer.file_name,
                        mime_type: transfer.mime_type,
                        bytes,
                    });
                }
            }
            Action::AbortTransfer { transfer_id, reason } => {
                self.chunk_store.delete(transfer_id).await;
                if let Some(entry) = self.sessions.get_mut(peer_id) {
                    entry.session.remove_transfer(transfer_id);
                }
                self.send_frame(
                    peer_id,
                    Frame::TransferError(helix_proto::frame::TransferErrorPayload {
                        transfer_id: transfer_id.to_string(),
                        reason: reason.clone(),
                    }),
                )
                .await;
                let _ = self.event_tx.send(ManagerEvent::TransferFailed { peer_id: peer_id.to_string(), transfer_id, reason });
            }
        }
    }

    async fn send_frame(&self, peer_id: &str, frame: Frame) {
        let relay = frame.into_relay_frame(Some(peer_id.to_string()));
        if let Err(err) = self.transport.send(relay).await {
            tracing::warn!(peer_id, error = %err, "send failed");
        }
    }

    fn spawn_pending_derivation(&mut self, peer_id: &str) {
        let Some(entry) = self.sessions.get_mut(peer_id) else { return };
        let Some(task) = entry.session.take_pending_derivation() else { return };
        let tx = self.derivation_tx.clone();
        tokio::spawn(async move {
            let outcome = task.run().await;
            let _ = tx.send(outcome);
        });
    }

    fn entry_mut(&mut self, peer_id: &str) -> Result<&mut SessionEntry, SessionError> {
        self.sessions.get_mut(peer_id).ok_or_else(|| SessionError::NotFound(peer_id.to_string()))
    }

    /// Arms or disarms the request/handshake deadlines based on the
    /// session's current state. Called after every mutation.
    ///
    /// The request timer only applies to the initiator, awaiting Type
    /// 2/3 — a responder's unanswered request has no built-in timeout and
    /// sits until the local user accepts or denies it.
    fn sync_timers(&mut self, peer_id: &str) {
        let now = Instant::now();
        let request_timeout = Duration::from_millis(self.config.request_timeout_ms);
        let handshake_timeout = Duration::from_millis(self.config.handshake_timeout_ms);
        let Some(entry) = self.sessions.get_mut(peer_id) else { return };
        match entry.session.state() {
            SessionState::InitiatingSession => {
                if entry.request_deadline.is_none() {
                    entry.request_deadline = Some(now + request_timeout);
                }
            }
            SessionState::RequestReceived | SessionState::AwaitingAccept => {
                entry.request_deadline = None;
            }
            SessionState::AwaitingChallenge
            | SessionState::DerivingKeyInitiator
            | SessionState::DerivingKeyResponder
            | SessionState::KeyDerivedInitiator
            | SessionState::ReceivedInitiatorKey
            | SessionState::ReceivedChallenge
            | SessionState::AwaitingFinalConfirmation
            | SessionState::HandshakeComplete => {
                entry.request_deadline = None;
                if entry.handshake_deadline.is_none() {
                    entry.handshake_deadline = Some(now + handshake_timeout);
                }
            }
            SessionState::SasPendingLocal | SessionState::SasPendingRemote | SessionState::Active => {
                entry.request_deadline = None;
                entry.handshake_deadline = None;
            }
            SessionState::Initiating | SessionState::Denied | SessionState::Ended => {
                entry.request_deadline = None;
                entry.handshake_deadline = None;
            }
        }
    }

    async fn check_timeouts(&mut self) {
        let now = Instant::now();
        let mut timed_out = Vec::new();
        let mut typing_expired = Vec::new();
        for (peer_id, entry) in self.sessions.iter() {
            if entry.request_deadline.is_some_and(|d| now >= d) {
                timed_out.push((peer_id.clone(), "Request timed out"));
            } else if entry.handshake_deadline.is_some_and(|d| now >= d) {
                timed_out.push((peer_id.clone(), "Handshake timed out"));
            } else if entry.typing_deadline.is_some_and(|d| now >= d) {
                typing_expired.push(peer_id.clone());
            }
        }
        for (peer_id, reason) in timed_out {
            tracing::warn!(peer_id, reason, "resetting session");
            if let Some(mut entry) = self.sessions.remove(&peer_id) {
                entry.session.reset(SessionState::Ended);
            }
            let _ = self.event_tx.send(ManagerEvent::SessionReset { peer_id, reason: reason.into() });
        }
        for peer_id in typing_expired {
            if let Some(entry) = self.sessions.get_mut(&peer_id) {
                entry.typing_deadline = None;
            }
            let _ = self.event_tx.send(ManagerEvent::Typing { peer_id, started: false });
        }
    }
}

#[cfg(test)]
mod tests {
    //! Exercises the manager's dispatch loop and timers directly (same
    //! "simulate both parties over an in-memory relay" shape as
    //! `transport`'s own tests), calling `handle_inbound`/`check_timeouts`
    //! by hand instead of running `SessionManager::run` so each step stays
    //! deterministic and inspectable.

    use super::*;
    use crate::filetransfer::InMemoryChunkStore;
    use crate::transport::InMemoryTransport;

    fn test_config() -> Config {
        Config {
            request_timeout_ms: 200,
            handshake_timeout_ms: 200,
            peer_typing_timeout_ms: 200,
            max_file_bytes: 1_000_000,
            ..Config::default()
        }
    }

    fn make_manager(
        local_id: &str,
        transport: InMemoryTransport,
    ) -> (SessionManager, mpsc::UnboundedReceiver<ManagerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            SessionManager::new(local_id, Arc::new(transport), Arc::new(InMemoryChunkStore::default()), test_config(), tx),
            rx,
        )
    }

    async fn pump(manager: &mut SessionManager, inbound: &mut mpsc::UnboundedReceiver<RelayFrame>) {
        let frame = time::timeout(Duration::from_millis(50), inbound.recv())
            .await
            .expect("a frame should have been sent")
            .expect("channel open");
        manager.handle_inbound(frame).await;
    }

    /// Key derivation runs on a spawned task and re-enters the manager
    /// through `derivation_rx`; `run` drives that in its `select!`, so
    /// these tests drive it by hand at the two points a derivation is
    /// actually spawned (after Type 2 for the initiator, after Type 4 for
    /// the responder).
    async fn drain_derivation(manager: &mut SessionManager) {
        let outcome = time::timeout(Duration::from_millis(50), manager.derivation_rx.recv())
            .await
            .expect("a derivation task should have been spawned")
            .expect("channel open");
        manager.handle_derivation_outcome(outcome).await;
    }

    async fn next_event(rx: &mut mpsc::UnboundedReceiver<ManagerEvent>) -> ManagerEvent {
        time::timeout(Duration::from_millis(50), rx.recv())
            .await
            .expect("an event should have been emitted")
            .expect("channel open")
    }

    #[tokio::test]
    async fn full_handshake_message_and_file_transfer_round_trip() {
        let (a_transport, mut a_inbound, b_transport, mut b_inbound) = InMemoryTransport::pair("alice", "bob");
        let (mut alice, mut alice_events) = make_manager("alice", a_transport);
        let (mut bob, mut bob_events) = make_manager("bob", b_transport);

        alice.send_request("bob").await;
        pump(&mut bob, &mut b_inbound).await; // Type 1
        assert!(matches!(
            next_event(&mut bob_events).await,
            ManagerEvent::IncomingRequest { peer_id } if peer_id == "alice"
        ));

        bob.accept_request("alice").await.unwrap();
        pump(&mut alice, &mut a_inbound).await; // Type 2 -> alice answers Type 4, spawns her derivation
        drain_derivation(&mut alice).await;
        pump(&mut bob, &mut b_inbound).await; // Type 4 -> bob spawns his derivation
        drain_derivation(&mut bob).await; // completes -> bob answers Type 5
        pump(&mut alice, &mut a_inbound).await; // Type 5 -> alice's derivation already done, answers Type 6
        pump(&mut bob, &mut b_inbound).await; // Type 6 -> bob answers Type 7
        pump(&mut alice, &mut a_inbound).await; // Type 7

        let ManagerEvent::Info { text: sas, .. } = next_event(&mut alice_events).await else {
            panic!("expected SAS info event")
        };
        assert!(!sas.is_empty());

        alice.confirm_sas("bob").await.unwrap();
        bob.confirm_sas("alice").await.unwrap();
        pump(&mut bob, &mut b_inbound).await; // bob receives alice's SAS confirm
        pump(&mut alice, &mut a_inbound).await; // alice receives bob's SAS confirm

        assert!(matches!(next_event(&mut alice_events).await, ManagerEvent::SessionActive { .. }));
        assert!(matches!(next_event(&mut bob_events).await, ManagerEvent::SessionActive { .. }));

        alice.send_message("bob", "hi bob", false).await.unwrap();
        pump(&mut bob, &mut b_inbound).await;
        match next_event(&mut bob_events).await {
            ManagerEvent::Message { sender, text, .. } => {
                assert_eq!(sender, "alice");
                assert_eq!(text, "hi bob");
            }
            other => panic!("expected Message, got {other:?}"),
        }

        let file = vec![7u8; 20_000];
        let transfer_id = alice
            .offer_transfer("bob", "report.pdf".into(), file.len() as u64, "application/pdf".into())
            .await
            .unwrap();
        pump(&mut bob, &mut b_inbound).await;
        assert!(matches!(
            next_event(&mut bob_events).await,
            ManagerEvent::TransferOffered { transfer_id: id, .. } if id == transfer_id
        ));

        bob.accept_transfer("alice", transfer_id).await.unwrap();
        pump(&mut alice, &mut a_inbound).await;

        for chunk in file.chunks(8_192) {
            alice.send_chunk("bob", transfer_id, chunk).await.unwrap();
            pump(&mut bob, &mut b_inbound).await;
        }
        alice.finish_transfer("bob", transfer_id).await.unwrap();
        pump(&mut bob, &mut b_inbound).await;

        match next_event(&mut bob_events).await {
            ManagerEvent::TransferComplete { transfer_id: id, file_name, mime_type, bytes } => {
                assert_eq!(id, transfer_id);
                assert_eq!(file_name, "report.pdf");
                assert_eq!(mime_type, "application/pdf");
                assert_eq!(bytes, file);
            }
            other => panic!("expected TransferComplete, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn unanswered_request_resets_after_the_configured_timeout() {
        let (a_transport, _a_inbound, b_transport, _b_inbound) = InMemoryTransport::pair("alice", "bob");
        let (mut alice, mut alice_events) = make_manager("alice", a_transport);
        let _bob = make_manager("bob", b_transport);

        alice.send_request("bob").await;
        time::advance(Duration::from_millis(250)).await;
        alice.check_timeouts().await;

        match next_event(&mut alice_events).await {
            ManagerEvent::SessionReset { peer_id, reason } => {
                assert_eq!(peer_id, "bob");
                assert_eq!(reason, "Request timed out");
            }
            other => panic!("expected SessionReset, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn handshake_stuck_awaiting_challenge_resets_after_the_configured_timeout() {
        let (a_transport, mut a_inbound, b_transport, mut b_inbound) = InMemoryTransport::pair("alice", "bob");
        let (mut alice, mut alice_events) = make_manager("alice", a_transport);
        let (mut bob, _bob_events) = make_manager("bob", b_transport);

        alice.send_request("bob").await;
        pump(&mut bob, &mut b_inbound).await;
        bob.accept_request("alice").await.unwrap();
        pump(&mut alice, &mut a_inbound).await;
        // Alice now sits deriving her key (a state the handshake timer
        // covers), waiting on a Type 5 that never arrives.

        time::advance(Duration::from_millis(250)).await;
        alice.check_timeouts().await;

        match next_event(&mut alice_events).await {
            ManagerEvent::SessionReset { peer_id, reason } => {
                assert_eq!(peer_id, "bob");
                assert_eq!(reason, "Handshake timed out");
            }
            other => panic!("expected SessionReset, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn typing_indicator_clears_itself_after_the_configured_timeout() {
        let (a_transport, _a_inbound, _b_transport, _b_inbound) = InMemoryTransport::pair("alice", "bob");
        let (mut alice, mut alice_events) = make_manager("alice", a_transport);

        // Insert a bare session entry directly so this test exercises only
        // the typing timer, not the whole handshake.
        let peer_id = "bob".to_string();
        alice.sessions.insert(
            peer_id.clone(),
            SessionEntry::new(crate::session::Session::new_initiator("alice", "bob", alice.config.max_file_bytes)),
        );

        alice.apply_action(&peer_id, Action::ShowTyping).await;
        assert!(matches!(next_event(&mut alice_events).await, ManagerEvent::Typing { started: true, .. }));

        time::advance(Duration::from_millis(250)).await;
        alice.check_timeouts().await;

        match next_event(&mut alice_events).await {
            ManagerEvent::Typing { peer_id: p, started: false } => assert_eq!(p, "bob"),
            other => panic!("expected Typing(false), got {other:?}"),
        }
    }
}
