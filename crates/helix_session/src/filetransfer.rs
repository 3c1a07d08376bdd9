//! File transfer engine: per-transfer bookkeeping plus the external
//! chunk store collaborator used to reassemble incoming files.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferRole {
    Sender,
    Receiver,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStatus {
    Offered,
    Accepted,
    Rejected,
    Transferring,
    Complete,
    Cancelled,
    Errored,
}

#[derive(Debug, Clone)]
pub struct Transfer {
    pub transfer_id: Uuid,
    pub role: TransferRole,
    pub file_name: String,
    pub file_size: u64,
    pub mime_type: String,
    pub status: TransferStatus,
    pub next_chunk_index: u64,
    pub bytes_done: u64,
    in_flight_chunks: usize,
}

impl Transfer {
    pub fn new(
        transfer_id: Uuid,
        role: TransferRole,
        file_name: String,
        file_size: u64,
        mime_type: String,
    ) -> Self {
        Self {
            transfer_id,
            role,
            file_name,
            file_size,
            mime_type,
            status: TransferStatus::Offered,
            next_chunk_index: 0,
            bytes_done: 0,
            in_flight_chunks: 0,
        }
    }

    /// Whether the sender may issue another `TRANSFER_CHUNK` frame without
    /// exceeding the configured in-flight window.
    pub fn can_send_next_chunk(&self, window: usize) -> bool {
        self.in_flight_chunks < window
    }

    pub fn note_chunk_sent(&mut self) {
        self.in_flight_chunks += 1;
    }

    /// Called by the transport-driving loop when a send has been
    /// acknowledged as flushed, freeing a slot in the in-flight window.
    pub fn note_chunk_flushed(&mut self) {
        self.in_flight_chunks = self.in_flight_chunks.saturating_sub(1);
    }
}

/// External chunk reassembly store. Durability across process restarts is
/// explicitly not required.
#[async_trait]
pub trait ChunkStore: Send + Sync {
    async fn put(&self, transfer_id: Uuid, chunk_index: u64, bytes: Vec<u8>);
    async fn assemble(&self, transfer_id: Uuid) -> Option<Vec<u8>>;
    async fn delete(&self, transfer_id: Uuid);
}

/// In-memory default, suitable for tests and small deployments.
#[derive(Default)]
pub struct InMemoryChunkStore {
    chunks: Mutex<HashMap<Uuid, Vec<(u64, Vec<u8>)>>>,
}

#[async_trait]
impl ChunkStore for InMemoryChunkStore {
    async fn put(&self, transfer_id: Uuid, chunk_index: u64, bytes: Vec<u8>) {
        self.chunks
            .lock()
            .expect("chunk store mutex poisoned")
            .entry(transfer_id)
            .or_default()
            .push((chunk_index, bytes));
    }

    async fn assemble(&self, transfer_id: Uuid) -> Option<Vec<u8>> {
        let mut guard = self.chunks.lock().expect("chunk store mutex poisoned");
        let chunks = guard.get_mut(&transfer_id)?;
        chunks.sort_by_key(|(index, _)| *index);
        let mut out = Vec::new();
        for (_, bytes) in chunks.iter() {
            out.extend_from_slice(bytes);
        }
        Some(out)
    }

    async fn delete(&self, transfer_id: Uuid) {
        self.chunks
            .lock()
            .expect("chunk store mutex poisoned")
            .remove(&transfer_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn assembles_chunks_in_order_regardless_of_insertion_order() {
        let store = InMemoryChunkStore::default();
        let id = Uuid::new_v4();
        store.put(id, 1, vec![4, 5, 6]).await;
        store.put(id, 0, vec![1, 2, 3]).await;
        let assembled = store.assemble(id).await.unwrap();
        assert_eq!(assembled, vec![1, 2, 3, 4, 5, 6]);
    }

    #[tokio::test]
    async fn delete_removes_all_chunks() {
        let store = InMemoryChunkStore::default();
        let id = Uuid::new_v4();
        store.put(id, 0, vec![1]).await;
        store.delete(id).await;
        assert!(store.assemble(id).await.is_none());
    }

    #[test]
    fn in_flight_window_bounds_sends() {
        let mut t = Transfer::new(Uuid::new_v4(), TransferRole::Sender, "f".into(), 10, "application/octet-stream".into());
        for _ in 0..8 {
            assert!(t.can_send_next_chunk(8));
            t.note_chunk_sent();
        }
        assert!(!t.can_send_next_chunk(8));
        t.note_chunk_flushed();
        assert!(t.can_send_next_chunk(8));
    }
}
