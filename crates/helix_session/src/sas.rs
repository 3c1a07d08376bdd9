//! Per-session Short Authentication String confirmation state.

#[derive(Debug, Clone, Default)]
pub struct SasState {
    pub local_confirmed: bool,
    pub remote_confirmed: bool,
    pub value: String,
}

impl SasState {
    pub fn both_confirmed(&self) -> bool {
        self.local_confirmed && self.remote_confirmed
    }
}
