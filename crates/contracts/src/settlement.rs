//! Settlement contract

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tidepool_core::{Proof, ProofVerifier, StateRoots};
use tracing::{info, warn};

/// Reasons a settlement is refused
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettlementError {
    /// The proof does not start at the settled roots
    #[error("proof starts at {proof_input}, settled roots are {settled}")]
    StateMismatch {
        /// Settled roots, short form
        settled: String,
        /// Proof input roots, short form
        proof_input: String,
    },
    /// The proof does not verify
    #[error("proof failed verification")]
    InvalidProof,
}

/// Last accepted state roots, advanced one verified proof at a time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementContract {
    roots: StateRoots,
    /// Number of proofs accepted so far
    settlements: u64,
}

impl SettlementContract {
    /// Contract at genesis, with four empty trees
    pub fn new() -> Self {
        Self::with_roots(StateRoots::empty())
    }

    /// Contract already settled at `roots`
    pub fn with_roots(roots: StateRoots) -> Self {
        Self {
            roots,
            settlements: 0,
        }
    }

    /// Last accepted roots
    pub fn roots(&self) -> &StateRoots {
        &self.roots
    }

    /// Number of proofs accepted
    pub fn settlements(&self) -> u64 {
        self.settlements
    }

    /// Accept `proof` if it starts at the stored roots and verifies.
    pub fn settle(
        &mut self,
        verifier: &dyn ProofVerifier,
        proof: &Proof,
    ) -> Result<StateRoots, SettlementError> {
        if proof.public_input != self.roots {
            warn!(
                "Rejected settlement: proof starts at {}, settled {}",
                proof.public_input.short(),
                self.roots.short()
            );
            return Err(SettlementError::StateMismatch {
                settled: self.roots.short(),
                proof_input: proof.public_input.short(),
            });
        }
        if !verifier.verify(proof) {
            warn!("Rejected settlement: proof does not verify");
            return Err(SettlementError::InvalidProof);
        }

        self.roots = proof.public_output;
        self.settlements += 1;
        info!("Settled roots {} ({} settlements)", self.roots.short(), self.settlements);
        Ok(self.roots)
    }
}

impl Default for SettlementContract {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tidepool_core::MethodKind;

    struct PayloadVerifier;

    impl ProofVerifier for PayloadVerifier {
        fn verify(&self, proof: &Proof) -> bool {
            proof.payload == b"ok"
        }
    }

    fn proof(input: StateRoots, output: StateRoots, payload: &[u8]) -> Proof {
        Proof {
            method: MethodKind::Merge,
            public_input: input,
            public_output: output,
            payload: payload.to_vec(),
        }
    }

    fn roots(tag: u8) -> StateRoots {
        StateRoots {
            balances: [tag; 32],
            ..StateRoots::empty()
        }
    }

    #[test]
    fn test_settle_advances_roots() {
        let mut contract = SettlementContract::new();
        let settled = contract
            .settle(&PayloadVerifier, &proof(StateRoots::empty(), roots(1), b"ok"))
            .unwrap();
        assert_eq!(settled, roots(1));
        assert_eq!(contract.roots(), &roots(1));
        assert_eq!(contract.settlements(), 1);
    }

    #[test]
    fn test_settle_requires_current_roots() {
        let mut contract = SettlementContract::new();
        let result = contract.settle(&PayloadVerifier, &proof(roots(2), roots(3), b"ok"));
        assert!(matches!(result, Err(SettlementError::StateMismatch { .. })));
        assert_eq!(contract.roots(), &StateRoots::empty());
    }

    #[test]
    fn test_settle_requires_valid_proof() {
        let mut contract = SettlementContract::new();
        let result = contract.settle(&PayloadVerifier, &proof(StateRoots::empty(), roots(1), b"no"));
        assert_eq!(result, Err(SettlementError::InvalidProof));
        assert_eq!(contract.settlements(), 0);
    }

    #[test]
    fn test_persisted_form() {
        let mut contract = SettlementContract::new();
        contract
            .settle(&PayloadVerifier, &proof(StateRoots::empty(), roots(1), b"ok"))
            .unwrap();
        let json = serde_json::to_string(&contract).unwrap();
        assert_eq!(serde_json::from_str::<SettlementContract>(&json).unwrap(), contract);
    }
}
