//! Proving capability

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tidepool_core::{Proof, StateRoots, Transition, TransitionError};

/// One transition to prove on top of `earlier`
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProveRequest {
    /// Step to prove
    pub transition: Transition,
    /// Roots the step starts from
    pub roots: StateRoots,
    /// `None` only for genesis
    pub earlier: Option<Proof>,
}

/// Errors that can occur during proof generation.
#[derive(Debug, Error)]
pub enum ProverError {
    /// The transition failed its checks
    #[error("transition rejected: {0}")]
    Transition(#[from] TransitionError),

    /// Attestation key missing or malformed
    #[error("invalid prover key: {0}")]
    InvalidKey(String),

    /// The blocking proving task panicked or was cancelled
    #[error("proving task failed: {0}")]
    Task(String),
}

impl ProverError {
    /// The transition error behind this failure, if any.
    pub fn transition(&self) -> Option<&TransitionError> {
        match self {
            Self::Transition(err) => Some(err),
            _ => None,
        }
    }
}

/// Generates and checks proofs.
///
/// Proving is CPU-bound; implementations run it off the async executor.
#[async_trait]
pub trait Prover: Send + Sync {
    /// Run the transition's checks and certify its roots.
    async fn prove(&self, request: ProveRequest) -> Result<Proof, ProverError>;

    /// Whether this prover produced `proof`.
    fn verify(&self, proof: &Proof) -> bool;

    /// Certify `first` followed by `second`, starting at `common`.
    async fn merge(&self, common: StateRoots, first: Proof, second: Proof) -> Result<Proof, ProverError>;
}
