//! Proof merging
//!
//! Merging is associative, so a run of chained proofs can be folded left to
//! right or reduced pairwise in parallel with the same result.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tidepool_core::Proof;
use tokio::task::JoinSet;
use tracing::{debug, info};

use crate::{prover::Prover, store::ProofStore};

/// Merges chained proofs from a store
pub struct ProofMerger {
    prover: Arc<dyn Prover>,
    store: Arc<dyn ProofStore>,
    parallelism: usize,
}

impl std::fmt::Debug for ProofMerger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProofMerger")
            .field("parallelism", &self.parallelism)
            .finish_non_exhaustive()
    }
}

impl ProofMerger {
    /// Merger running at most `parallelism` merges at once
    pub fn new(prover: Arc<dyn Prover>, store: Arc<dyn ProofStore>, parallelism: usize) -> Self {
        Self {
            prover,
            store,
            parallelism: parallelism.max(1),
        }
    }

    async fn merge_two(prover: &dyn Prover, first: Proof, second: Proof) -> Result<Proof> {
        let common = first.public_input;
        Ok(prover.merge(common, first, second).await?)
    }

    /// Left fold: `merge(merge(p0, p1), p2) ...`
    pub async fn fold(&self, proofs: &[Proof]) -> Result<Proof> {
        let Some((first, rest)) = proofs.split_first() else {
            bail!("Nothing to merge");
        };
        let mut merged = first.clone();
        for proof in rest {
            merged = Self::merge_two(self.prover.as_ref(), merged, proof.clone()).await?;
        }
        Ok(merged)
    }

    /// Pairwise reduction, running up to `parallelism` merges at once.
    pub async fn reduce(&self, mut proofs: Vec<Proof>) -> Result<Proof> {
        if proofs.is_empty() {
            bail!("Nothing to merge");
        }

        let mut round = 0;
        while proofs.len() > 1 {
            round += 1;
            let carry = if proofs.len() % 2 == 1 { proofs.pop() } else { None };

            let mut pairs = Vec::with_capacity(proofs.len() / 2);
            let mut iter = proofs.into_iter();
            while let (Some(first), Some(second)) = (iter.next(), iter.next()) {
                pairs.push((first, second));
            }

            let mut next = Vec::with_capacity(pairs.len() + 1);
            let mut pairs = pairs.into_iter().peekable();
            while pairs.peek().is_some() {
                let batch: Vec<_> = pairs.by_ref().take(self.parallelism).collect();
                let mut results = vec![None; batch.len()];

                let mut set = JoinSet::new();
                for (offset, (first, second)) in batch.into_iter().enumerate() {
                    let prover = Arc::clone(&self.prover);
                    set.spawn(async move {
                        (offset, Self::merge_two(prover.as_ref(), first, second).await)
                    });
                }
                while let Some(joined) = set.join_next().await {
                    let (offset, merged) = joined.context("Merge task failed")?;
                    results[offset] = Some(merged?);
                }
                next.extend(results.into_iter().flatten());
            }
            next.extend(carry);

            info!("Merge round {} finished, {} proofs left", round, next.len());
            proofs = next;
        }

        proofs.pop().context("Nothing to merge")
    }

    /// Open a fresh merge window at step `at`, dropping the merged proof.
    ///
    /// Called once the merged proof is settled, so the next window starts at
    /// the settled roots.
    pub async fn start_merge(&self, at: u64) -> Result<()> {
        self.store
            .start_merge(at)
            .await
            .with_context(|| format!("Failed to start merge at {at}"))?;
        info!("Merge window restarted at proof {}", at);
        Ok(())
    }

    /// Fold every stored proof past the merge window into the merged slot.
    ///
    /// Progress is persisted after each step, so an interrupted run resumes
    /// where it stopped. Returns the merged proof, or `None` when the window
    /// is empty and no proof is stored at its start.
    pub async fn merge_pending(&self) -> Result<Option<Proof>> {
        let count = self.store.proof_count().await?;
        let window = self.store.merged_range().await?;
        if window.start >= count {
            return Ok(None);
        }

        let (mut merged, mut merged_until) = match self.store.get_merged().await? {
            Some(proof) => (proof, window.end),
            None => {
                let first = self
                    .store
                    .get(window.start)
                    .await
                    .with_context(|| format!("Failed to load proof {}", window.start))?;
                self.store.put_merged(first.clone(), window.start + 1).await?;
                (first, window.start + 1)
            }
        };

        if merged_until < count {
            info!("Merging proofs {}..{} onto {}", merged_until, count, window.start);
        }
        while merged_until < count {
            let index = merged_until;
            let proof = self
                .store
                .get(index)
                .await
                .with_context(|| format!("Failed to load proof {index}"))?;
            merged = Self::merge_two(self.prover.as_ref(), merged, proof)
                .await
                .with_context(|| format!("Failed to merge proof {index}"))?;
            merged_until = index + 1;
            self.store.put_merged(merged.clone(), merged_until).await?;
            debug!("Merged through {}", merged_until);
        }

        Ok(Some(merged))
    }
}
