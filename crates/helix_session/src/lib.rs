//! helix_session — the HeliX client-side session core: the per-peer
//! handshake/SAS/message state machine (C3), the multi-session manager
//! that owns the transport and routes relay frames (C4), and the file
//! transfer engine (C5) that rides inside an `ACTIVE` session.
//!
//! # Module layout
//! - `session`      — the per-peer `Session` state machine
//! - `manager`      — `SessionManager`, the session registry and dispatch loop
//! - `filetransfer` — `Transfer` bookkeeping and the `ChunkStore` collaborator
//! - `transport`    — the `Transport` trait the manager sends frames through
//! - `action`       — the `Action` enum every frame handler returns
//! - `state`        — the `SessionState` enum
//! - `keys`         — per-session key material and challenge bookkeeping
//! - `sas`          — per-session SAS confirmation bookkeeping
//! - `message_log`  — in-memory chat history
//! - `config`       — manager configuration and its defaults
//! - `error`        — unified error type
//!
//! This crate never touches a socket, a chunk-storage backend, or a UI
//! directly — those are all traits (`Transport`, `ChunkStore`) or typed
//! events (`Action`, `ManagerEvent`) that an embedding application wires up.

pub mod action;
pub mod config;
pub mod error;
pub mod filetransfer;
pub mod keys;
pub mod manager;
pub mod message_log;
pub mod sas;
pub mod session;
pub mod state;
pub mod transport;

pub use action::Action;
pub use config::Config;
pub use error::SessionError;
pub use manager::{ManagerEvent, SessionManager};
pub use session::{Role, Session};
pub use state::SessionState;
