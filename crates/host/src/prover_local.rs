//! In-process prover
//!
//! Runs the full transition checks and emits a certificate over
//! `(method, input, output)`. In attest mode the certificate is a keyed
//! Keccak256 digest and verification recomputes it; in mock mode the payload
//! is empty and every proof verifies.

use std::sync::Arc;

use async_trait::async_trait;
use tidepool_core::{
    merge_proofs, Context, MethodKind, Proof, ProofVerifier, SignatureVerifier, StateRoots,
};
use tiny_keccak::{Hasher, Keccak};
use tracing::{debug, info, warn};

use crate::{
    config::{ProverConfig, ProverMode},
    prover::{ProveRequest, Prover, ProverError},
};

struct Inner {
    mode: ProverMode,
    key: [u8; 32],
    signatures: Arc<dyn SignatureVerifier>,
}

impl Inner {
    fn digest(&self, method: MethodKind, input: &StateRoots, output: &StateRoots) -> [u8; 32] {
        let mut hasher = Keccak::v256();
        hasher.update(&self.key);
        hasher.update(&[method.tag()]);
        hasher.update(&input.to_bytes());
        hasher.update(&output.to_bytes());
        let mut output = [0u8; 32];
        hasher.finalize(&mut output);
        output
    }

    fn certify(&self, method: MethodKind, input: StateRoots, output: StateRoots) -> Proof {
        let payload = match self.mode {
            ProverMode::Attest => self.digest(method, &input, &output).to_vec(),
            ProverMode::Mock => Vec::new(),
        };
        Proof {
            method,
            public_input: input,
            public_output: output,
            payload,
        }
    }

    fn prove(&self, request: &ProveRequest) -> Result<Proof, ProverError> {
        let ctx = Context {
            proofs: self,
            signatures: self.signatures.as_ref(),
        };
        let output = request
            .transition
            .apply(&ctx, &request.roots, request.earlier.as_ref())?;
        Ok(self.certify(request.transition.method(), request.roots, output))
    }
}

impl ProofVerifier for Inner {
    fn verify(&self, proof: &Proof) -> bool {
        match self.mode {
            ProverMode::Mock => {
                debug!("Mock mode: skipping local verification");
                true
            }
            ProverMode::Attest => {
                proof.payload[..]
                    == self.digest(proof.method, &proof.public_input, &proof.public_output)[..]
            }
        }
    }
}

/// Prover running transitions on the blocking thread pool
#[derive(Clone)]
pub struct LocalProver {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for LocalProver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalProver")
            .field("mode", &self.inner.mode)
            .finish_non_exhaustive()
    }
}

impl LocalProver {
    /// Create a prover with configuration.
    ///
    /// Attest mode without a usable key falls back to mock mode.
    pub fn new(config: &ProverConfig, signatures: Arc<dyn SignatureVerifier>) -> Self {
        let key = match (config.mode, config.key.as_deref()) {
            (ProverMode::Mock, _) => None,
            (ProverMode::Attest, None) => {
                warn!("PROVER_KEY not set, falling back to MOCK mode");
                None
            }
            (ProverMode::Attest, Some(hex_key)) => match parse_key(hex_key) {
                Ok(key) => Some(key),
                Err(e) => {
                    warn!("{}, falling back to MOCK mode", e);
                    None
                }
            },
        };

        match key {
            Some(key) => {
                info!("Local prover initialized in ATTEST mode");
                Self::attesting(key, signatures)
            }
            None => {
                info!("Local prover initialized in MOCK mode");
                Self::mock(signatures)
            }
        }
    }

    /// Prover attesting with `key`
    pub fn attesting(key: [u8; 32], signatures: Arc<dyn SignatureVerifier>) -> Self {
        Self {
            inner: Arc::new(Inner {
                mode: ProverMode::Attest,
                key,
                signatures,
            }),
        }
    }

    /// Prover whose proofs always verify
    pub fn mock(signatures: Arc<dyn SignatureVerifier>) -> Self {
        Self {
            inner: Arc::new(Inner {
                mode: ProverMode::Mock,
                key: [0u8; 32],
                signatures,
            }),
        }
    }

    /// Active mode
    pub fn mode(&self) -> ProverMode {
        self.inner.mode
    }

    /// Verification predicates for running transitions outside the prover.
    pub fn context(&self) -> Context<'_> {
        Context {
            proofs: self.inner.as_ref(),
            signatures: self.inner.signatures.as_ref(),
        }
    }
}

fn parse_key(hex_key: &str) -> Result<[u8; 32], ProverError> {
    let bytes = hex::decode(hex_key.trim_start_matches("0x"))
        .map_err(|e| ProverError::InvalidKey(e.to_string()))?;
    bytes
        .try_into()
        .map_err(|_| ProverError::InvalidKey("expected 32 bytes".to_string()))
}

impl ProofVerifier for LocalProver {
    fn verify(&self, proof: &Proof) -> bool {
        self.inner.verify(proof)
    }
}

#[async_trait]
impl Prover for LocalProver {
    async fn prove(&self, request: ProveRequest) -> Result<Proof, ProverError> {
        let method = request.transition.method();
        debug!("Proving {} step", method);

        let inner = Arc::clone(&self.inner);
        let proof = tokio::task::spawn_blocking(move || inner.prove(&request))
            .await
            .map_err(|e| ProverError::Task(e.to_string()))??;

        debug!("Proved {} step, output {}", method, proof.public_output.short());
        Ok(proof)
    }

    fn verify(&self, proof: &Proof) -> bool {
        self.inner.verify(proof)
    }

    async fn merge(&self, common: StateRoots, first: Proof, second: Proof) -> Result<Proof, ProverError> {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || -> Result<Proof, ProverError> {
            let (input, output) = merge_proofs(inner.as_ref(), &common, &first, &second)?;
            Ok(inner.certify(MethodKind::Merge, input, output))
        })
        .await
        .map_err(|e| ProverError::Task(e.to_string()))?
    }
}
