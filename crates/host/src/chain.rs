//! Linear proof chain driver

use std::sync::Arc;

use anyhow::{Context, Result};
use tidepool_core::{Proof, StateRoots, Transition};
use tracing::{info, warn};

use crate::{
    prover::{ProveRequest, Prover},
    store::ProofStore,
};

/// Proves transitions one after another, each on top of the last proof,
/// and persists every step.
pub struct ProofChain {
    prover: Arc<dyn Prover>,
    store: Arc<dyn ProofStore>,
    last: Proof,
    next_index: u64,
}

impl std::fmt::Debug for ProofChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProofChain")
            .field("next_index", &self.next_index)
            .field("roots", &self.last.public_output.short())
            .finish_non_exhaustive()
    }
}

impl ProofChain {
    /// Start a chain at `roots`, normally the last settled roots.
    pub async fn genesis(
        prover: Arc<dyn Prover>,
        store: Arc<dyn ProofStore>,
        roots: StateRoots,
    ) -> Result<Self> {
        let request = ProveRequest {
            transition: Transition::Genesis,
            roots,
            earlier: None,
        };
        let proof = prover.prove(request).await.context("Failed to prove genesis")?;
        store
            .put(0, proof.clone())
            .await
            .context("Failed to store genesis proof")?;
        info!("Started proof chain at {}", roots.short());

        Ok(Self {
            prover,
            store,
            last: proof,
            next_index: 1,
        })
    }

    /// Continue from the last durable proof in `store`.
    pub async fn resume(prover: Arc<dyn Prover>, store: Arc<dyn ProofStore>) -> Result<Self> {
        let count = store.proof_count().await?;
        if count == 0 {
            anyhow::bail!("Proof store is empty, start a chain with genesis");
        }
        let last = store
            .get(count - 1)
            .await
            .with_context(|| format!("Failed to load proof {}", count - 1))?;
        if !prover.verify(&last) {
            warn!("Stored proof {} does not verify with this prover", count - 1);
        }
        info!("Resumed proof chain at index {}", count);

        Ok(Self {
            prover,
            store,
            last,
            next_index: count,
        })
    }

    /// Prove `transition` as the next step and persist it.
    pub async fn push(&mut self, transition: Transition) -> Result<Proof> {
        let method = transition.method();
        let index = self.next_index;
        let request = ProveRequest {
            transition,
            roots: self.last.public_output,
            earlier: Some(self.last.clone()),
        };

        let proof = match self.prover.prove(request).await {
            Ok(proof) => proof,
            Err(e) => {
                warn!("Rejected {} step {}: {}", method, index, e);
                return Err(e).context(format!("Failed to prove {method} step {index}"));
            }
        };
        self.store
            .put(index, proof.clone())
            .await
            .with_context(|| format!("Failed to store proof {index}"))?;
        info!("Proved {} step {} -> {}", method, index, proof.public_output.short());

        self.last = proof.clone();
        self.next_index += 1;
        Ok(proof)
    }

    /// Most recent proof
    pub fn last(&self) -> &Proof {
        &self.last
    }

    /// Roots after the last proved step
    pub fn roots(&self) -> StateRoots {
        self.last.public_output
    }

    /// Store index the next step lands at
    pub fn next_index(&self) -> u64 {
        self.next_index
    }
}
