//! Host-side logic for the Tidepool rollup
//!
//! The host keeps the full state trees, turns user intents into witnessed
//! transitions, proves them one after another and merges the resulting
//! proofs into a single proof the settlement contract can accept.

pub mod chain;
pub mod config;
pub mod merger;
pub mod prover;
pub mod prover_local;
pub mod state;
pub mod store;
pub mod witness;

pub use chain::ProofChain;
pub use config::{Config, ProverConfig, ProverMode};
pub use merger::ProofMerger;
pub use prover::{ProveRequest, Prover, ProverError};
pub use prover_local::LocalProver;
pub use state::{RollupState, StateError};
pub use store::{FileProofStore, MemoryProofStore, ProofStore, StoreError};
pub use witness::WitnessGenerator;
