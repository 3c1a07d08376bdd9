//! helix_proto — wire envelope and frame schemas for the HeliX relay
//! protocol.
//!
//! # Module layout
//! - `frame`      — the `RelayFrame` envelope and the typed `Frame` enum
//! - `codec`      — bounded base64 (de)coding helpers
//! - `message`    — the plaintext payload carried inside encrypted message frames
//! - `validation` — identifier validation
//! - `error`      — unified error type
//!
//! The relay is untrusted transport: every inbound `RelayFrame` is
//! validated against its schema and field size limits before it becomes a
//! `Frame` that the session core will act on.

pub mod codec;
pub mod error;
pub mod frame;
pub mod message;
pub mod validation;

pub use error::ProtoError;
pub use frame::{frame_type, Frame, RelayFrame};
pub use message::PlaintextMessage;
