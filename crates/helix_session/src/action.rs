//! The single typed result every inbound-frame handler returns.
//!
//! Handlers never perform I/O themselves and never panic on an ordinary
//! protocol violation — they report exactly one `Action`, and the
//! `SessionManager` is the only thing that touches the transport or the
//! presentation layer.

use helix_proto::Frame;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub enum Action {
    None,
    /// One outbound frame to relay to the peer (the `SEND_TYPE_n` family).
    Send(Frame),
    DisplayMessage { sender: String, text: String },
    DisplayMeAction { sender: String, text: String },
    DisplaySystemMessage(String),
    ShowInfo(String),
    ShowTyping,
    HideTyping,
    SessionActive,
    TransferOffered { transfer_id: Uuid, file_name: String, file_size: u64 },
    Reset { reason: String, notify: bool },
    /// A chunk of plaintext the manager must hand to the chunk store.
    StoreChunk { transfer_id: Uuid, index: u64, plaintext: Vec<u8> },
    /// Instructs the manager to assemble, expose, then delete the transfer.
    CompleteTransfer { transfer_id: Uuid },
    /// Instructs the manager to send a Type 17 error and delete stored chunks.
    AbortTransfer { transfer_id: Uuid, reason: String },
}

impl Action {
    pub fn reset(reason: impl Into<String>) -> Self {
        Action::Reset {
            reason: reason.into(),
            notify: true,
        }
    }

    pub fn reset_silent(reason: impl Into<String>) -> Self {
        Action::Reset {
            reason: reason.into(),
            notify: false,
        }
    }
}
