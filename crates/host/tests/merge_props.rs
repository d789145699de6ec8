//! Any bracketing of a chain of proofs merges to the same proof.

use std::sync::Arc;

use proptest::prelude::*;
use tidepool_core::{KeyRegistry, MethodKind, Proof, StateRoots};
use tidepool_host::{LocalProver, MemoryProofStore, ProofMerger};

fn roots(tag: u8) -> StateRoots {
    StateRoots {
        burns: [tag; 32],
        ..StateRoots::empty()
    }
}

fn chain(len: u8) -> Vec<Proof> {
    (0..len)
        .map(|i| Proof {
            method: MethodKind::Deposit,
            public_input: roots(i),
            public_output: roots(i + 1),
            payload: Vec::new(),
        })
        .collect()
}

fn merger(parallelism: usize) -> ProofMerger {
    let prover = Arc::new(LocalProver::mock(Arc::new(KeyRegistry::new())));
    ProofMerger::new(prover, Arc::new(MemoryProofStore::new()), parallelism)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_bracketing_does_not_matter(len in 1u8..12, split in 0usize..12, parallelism in 1usize..5) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let proofs = chain(len);
        let split = 1 + split % proofs.len();
        let merger = merger(parallelism);

        let (folded, reduced, halves) = runtime.block_on(async {
            let folded = merger.fold(&proofs).await.unwrap();
            let reduced = merger.reduce(proofs.clone()).await.unwrap();
            let halves = if split < proofs.len() {
                let left = merger.fold(&proofs[..split]).await.unwrap();
                let right = merger.fold(&proofs[split..]).await.unwrap();
                merger.fold(&[left, right]).await.unwrap()
            } else {
                folded.clone()
            };
            (folded, reduced, halves)
        });

        prop_assert_eq!(folded.public_input, roots(0));
        prop_assert_eq!(folded.public_output, roots(len));
        prop_assert_eq!(&reduced, &folded);
        prop_assert_eq!(&halves, &folded);
    }
}
