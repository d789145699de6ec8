use std::{collections::HashMap, ops::Range};

use async_trait::async_trait;
use tidepool_core::Proof;
use tokio::sync::Mutex;

use super::{check_window, ProofStore, StoreError};

#[derive(Debug, Default)]
struct Slots {
    proofs: HashMap<u64, Proof>,
    merged: Option<Proof>,
    window: Range<u64>,
    settled_until: u64,
}

/// In-memory implementation of `ProofStore` for tests and short-lived runs.
#[derive(Debug, Default)]
pub struct MemoryProofStore {
    slots: Mutex<Slots>,
}

impl MemoryProofStore {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProofStore for MemoryProofStore {
    async fn get(&self, index: u64) -> Result<Proof, StoreError> {
        let slots = self.slots.lock().await;
        slots
            .proofs
            .get(&index)
            .cloned()
            .ok_or(StoreError::NotFound(index))
    }

    async fn put(&self, index: u64, proof: Proof) -> Result<(), StoreError> {
        let mut slots = self.slots.lock().await;
        slots.proofs.insert(index, proof);
        Ok(())
    }

    async fn get_merged(&self) -> Result<Option<Proof>, StoreError> {
        let slots = self.slots.lock().await;
        if slots.window.is_empty() {
            return Ok(None);
        }
        Ok(slots.merged.clone())
    }

    async fn put_merged(&self, proof: Proof, merged_until: u64) -> Result<(), StoreError> {
        let mut slots = self.slots.lock().await;
        check_window(&slots.window, merged_until)?;
        slots.merged = Some(proof);
        slots.window.end = merged_until;
        Ok(())
    }

    async fn start_merge(&self, at: u64) -> Result<(), StoreError> {
        let mut slots = self.slots.lock().await;
        slots.merged = None;
        slots.window = at..at;
        Ok(())
    }

    async fn proof_count(&self) -> Result<u64, StoreError> {
        let slots = self.slots.lock().await;
        Ok(slots.proofs.keys().max().map_or(0, |index| index + 1))
    }

    async fn merged_range(&self) -> Result<Range<u64>, StoreError> {
        Ok(self.slots.lock().await.window.clone())
    }

    async fn settled_until(&self) -> Result<u64, StoreError> {
        Ok(self.slots.lock().await.settled_until)
    }

    async fn set_settled_until(&self, until: u64) -> Result<(), StoreError> {
        self.slots.lock().await.settled_until = until;
        Ok(())
    }
}
