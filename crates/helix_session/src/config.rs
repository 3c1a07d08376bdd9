//! Runtime configuration for a session manager instance.
//!
//! Belongs to the `SessionManager`, not to a global — there is exactly
//! one manager per process in this crate's model, and it owns its own
//! config and identifier rather than reaching for statics.

#[derive(Debug, Clone)]
pub struct Config {
    pub relay_url: String,
    pub identifier: String,
    pub request_timeout_ms: u64,
    pub handshake_timeout_ms: u64,
    pub peer_typing_timeout_ms: u64,
    pub max_file_bytes: u64,
    pub chunk_bytes: usize,
    pub inflight_window: usize,
    pub debug: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            relay_url: String::new(),
            identifier: String::new(),
            request_timeout_ms: 60_000,
            handshake_timeout_ms: 30_000,
            peer_typing_timeout_ms: 5_000,
            max_file_bytes: 104_857_600,
            chunk_bytes: 65_536,
            inflight_window: 8,
            debug: false,
        }
    }
}
