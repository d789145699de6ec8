//! Proof persistence keyed by sequence index
//!
//! Besides the per-step proofs, a store keeps a single merged proof covering
//! the window `[merged_from, merged_until)` and the `settled_until` cursor, so
//! merging and settlement can resume after a restart. Once a merged proof is
//! settled the window restarts at the settled index.

mod file;
mod memory;

pub use file::FileProofStore;
pub use memory::MemoryProofStore;

use std::ops::Range;

use async_trait::async_trait;
use thiserror::Error;
use tidepool_core::Proof;

/// Errors that can occur while reading or writing proofs.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Nothing stored at the index
    #[error("no proof stored at index {0}")]
    NotFound(u64),

    /// A merged window that does not extend the current one
    #[error("merge window {from}..{until} cannot move to {requested}")]
    Window {
        /// Current window start
        from: u64,
        /// Current window end
        until: u64,
        /// Requested end
        requested: u64,
    },

    /// Filesystem failure
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Encoding or decoding failure
    #[error("Serialization error: {0}")]
    Codec(String),
}

/// Indexed proof storage plus the merge and settlement cursors.
#[async_trait]
pub trait ProofStore: Send + Sync {
    /// Step proof at `index`
    async fn get(&self, index: u64) -> Result<Proof, StoreError>;

    /// Store the step proof at `index`, replacing any previous one.
    async fn put(&self, index: u64, proof: Proof) -> Result<(), StoreError>;

    /// The merged proof, if the current window is not empty.
    async fn get_merged(&self) -> Result<Option<Proof>, StoreError>;

    /// Replace the merged proof, now covering `[merged_from, merged_until)`.
    ///
    /// `merged_until` must lie past the window start.
    async fn put_merged(&self, proof: Proof, merged_until: u64) -> Result<(), StoreError>;

    /// Drop the merged proof and open an empty window at `at`.
    async fn start_merge(&self, at: u64) -> Result<(), StoreError>;

    /// One past the highest stored index
    async fn proof_count(&self) -> Result<u64, StoreError>;

    /// Steps covered by the merged proof
    async fn merged_range(&self) -> Result<Range<u64>, StoreError>;

    /// Steps already accepted by settlement, `[0, settled_until)`
    async fn settled_until(&self) -> Result<u64, StoreError>;

    /// Record that settlement accepted every step below `until`.
    async fn set_settled_until(&self, until: u64) -> Result<(), StoreError>;
}

/// Check that `until` extends the window `[from, _)`.
fn check_window(window: &Range<u64>, until: u64) -> Result<(), StoreError> {
    if until <= window.start {
        return Err(StoreError::Window {
            from: window.start,
            until: window.end,
            requested: until,
        });
    }
    Ok(())
}
