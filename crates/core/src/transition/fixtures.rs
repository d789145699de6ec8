//! Test fixtures: reference trees, keys and permissive verifiers

use ed25519_dalek::SigningKey;
use tidepool_merkle::{MerkleTree, BALANCES_HEIGHT, BURNS_HEIGHT, LIQUIDITIES_HEIGHT, POOLS_HEIGHT};

use super::{Context, LeafValue, Outcome, Transition};
use crate::{
    error::Result,
    leaves::{Balance, Burn, Leaf, Liquidity, Pool},
    proof::{MethodKind, Proof, ProofVerifier},
    signature::KeyRegistry,
    state::StateRoots,
    types::{Address, Amount, TokenId},
};

#[derive(Debug)]
pub(crate) struct AcceptAll;

impl ProofVerifier for AcceptAll {
    fn verify(&self, _proof: &Proof) -> bool {
        true
    }
}

#[derive(Debug)]
pub(crate) struct RejectAll;

impl ProofVerifier for RejectAll {
    fn verify(&self, _proof: &Proof) -> bool {
        false
    }
}

/// State trees mirrored in memory, with the latest proof ending at them.
#[derive(Debug)]
pub(crate) struct World {
    pub(crate) balances: MerkleTree,
    pub(crate) liquidities: MerkleTree,
    pub(crate) pools: MerkleTree,
    pub(crate) burns: MerkleTree,
    pub(crate) registry: KeyRegistry,
}

impl World {
    pub(crate) fn new() -> Self {
        Self {
            balances: MerkleTree::new(BALANCES_HEIGHT).unwrap(),
            liquidities: MerkleTree::new(LIQUIDITIES_HEIGHT).unwrap(),
            pools: MerkleTree::new(POOLS_HEIGHT).unwrap(),
            burns: MerkleTree::new(BURNS_HEIGHT).unwrap(),
            registry: KeyRegistry::new(),
        }
    }

    pub(crate) fn user(&mut self, seed: u8) -> (Address, SigningKey) {
        let key = SigningKey::from_bytes(&[seed; 32]);
        let address = self.registry.register(key.verifying_key());
        (address, key)
    }

    pub(crate) fn roots(&self) -> StateRoots {
        StateRoots {
            balances: self.balances.root(),
            liquidities: self.liquidities.root(),
            pools: self.pools.root(),
            burns: self.burns.root(),
        }
    }

    pub(crate) fn earlier(&self) -> Proof {
        Proof {
            method: MethodKind::Genesis,
            public_input: self.roots(),
            public_output: self.roots(),
            payload: Vec::new(),
        }
    }

    pub(crate) fn ctx(&self) -> Context<'_> {
        Context {
            proofs: &AcceptAll,
            signatures: &self.registry,
        }
    }

    pub(crate) fn set_balance(&mut self, index: u64, owner: Address, token: TokenId, amount: Amount) {
        self.balances
            .set_leaf(index, Balance::new(owner, token, amount).hash())
            .unwrap();
    }

    pub(crate) fn set_burn(&mut self, index: u64, burner: Address, token: TokenId, amount: Amount) {
        self.burns.set_leaf(index, Burn::new(burner, token, amount).hash()).unwrap();
    }

    pub(crate) fn set_pool(&mut self, index: u64, pool: &Pool) {
        self.pools.set_leaf(index, pool.hash()).unwrap();
    }

    pub(crate) fn set_liquidity(&mut self, index: u64, liquidity: &Liquidity) {
        self.liquidities.set_leaf(index, liquidity.hash()).unwrap();
    }

    /// Execute against the current roots and, on success, replay the writes.
    pub(crate) fn run(&mut self, transition: &Transition) -> Result<Outcome> {
        let roots = self.roots();
        let earlier = self.earlier();
        let outcome = transition.execute(&self.ctx(), &roots, Some(&earlier))?;
        for write in &outcome.writes {
            let tree = match write.leaf {
                LeafValue::Balance(_) => &mut self.balances,
                LeafValue::Burn(_) => &mut self.burns,
                LeafValue::Pool(_) => &mut self.pools,
                LeafValue::Liquidity(_) => &mut self.liquidities,
            };
            tree.set_leaf(write.index, write.leaf.hash()).unwrap();
        }
        assert_eq!(self.roots(), outcome.roots);
        Ok(outcome)
    }
}
