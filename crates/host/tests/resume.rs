//! Restarting against a file-backed proof store.

use std::sync::Arc;

use ed25519_dalek::SigningKey;
use tidepool_core::{token_id, Deposit, KeyRegistry, StateRoots};
use tidepool_host::{
    FileProofStore, LocalProver, ProofChain, ProofMerger, ProofStore, Prover, RollupState,
    WitnessGenerator,
};

fn prover() -> Arc<LocalProver> {
    Arc::new(LocalProver::attesting([3u8; 32], Arc::new(KeyRegistry::new())))
}

#[tokio::test]
async fn test_chain_and_merge_survive_restart() {
    let dir = tempfile::tempdir().unwrap();
    let prover = prover();
    let depositor =
        tidepool_core::Address::derive(&SigningKey::from_bytes(&[5u8; 32]).verifying_key());
    let mina = token_id("MINA");
    let mut generator = WitnessGenerator::new(RollupState::new().unwrap());

    {
        let store = Arc::new(FileProofStore::open(dir.path()).await.unwrap());
        let mut chain = ProofChain::genesis(prover.clone(), store.clone(), StateRoots::empty())
            .await
            .unwrap();
        for amount in [100, 200] {
            let transition = generator.deposit(Deposit::new(depositor, mina, amount)).unwrap();
            let earlier = chain.last().clone();
            chain.push(transition.clone()).await.unwrap();
            generator
                .apply(&transition, &prover.context(), Some(&earlier))
                .unwrap();
        }

        let merger = ProofMerger::new(prover.clone(), store.clone(), 2);
        merger.merge_pending().await.unwrap();
        assert_eq!(store.merged_range().await.unwrap(), 0..3);
    }

    let store = Arc::new(FileProofStore::open(dir.path()).await.unwrap());
    let mut chain = ProofChain::resume(prover.clone(), store.clone()).await.unwrap();
    assert_eq!(chain.next_index(), 3);
    assert_eq!(chain.roots(), generator.roots());

    let transition = generator.deposit(Deposit::new(depositor, mina, 300)).unwrap();
    let earlier = chain.last().clone();
    chain.push(transition.clone()).await.unwrap();
    generator
        .apply(&transition, &prover.context(), Some(&earlier))
        .unwrap();
    assert_eq!(generator.state().balance(&depositor, &mina), Some(600));

    let merger = ProofMerger::new(prover.clone(), store.clone(), 2);
    let merged = merger.merge_pending().await.unwrap().unwrap();
    assert_eq!(store.merged_range().await.unwrap(), 0..4);
    assert_eq!(merged.public_input, StateRoots::empty());
    assert_eq!(merged.public_output, generator.roots());
    assert!(Prover::verify(prover.as_ref(), &merged));
}

#[tokio::test]
async fn test_other_key_rejects_stored_proofs() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FileProofStore::open(dir.path()).await.unwrap());
    ProofChain::genesis(prover(), store.clone(), StateRoots::empty())
        .await
        .unwrap();

    let stranger = LocalProver::attesting([4u8; 32], Arc::new(KeyRegistry::new()));
    let genesis = store.get(0).await.unwrap();
    assert!(Prover::verify(prover().as_ref(), &genesis));
    assert!(!Prover::verify(&stranger, &genesis));
}
