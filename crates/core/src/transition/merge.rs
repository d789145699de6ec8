//! Composition of two adjacent proofs

use crate::{
    error::{Result, TransitionError},
    proof::{Proof, ProofVerifier},
    state::StateRoots,
};

/// Check that `first` starts at `common` and `second` continues it, then
/// return the `(input, output)` pair the merged proof attests to.
pub fn merge_proofs(
    proofs: &dyn ProofVerifier,
    common: &StateRoots,
    first: &Proof,
    second: &Proof,
) -> Result<(StateRoots, StateRoots)> {
    if first.public_input != *common || first.public_output != second.public_input {
        return Err(TransitionError::ChainMismatch);
    }
    if !proofs.verify(first) || !proofs.verify(second) {
        return Err(TransitionError::ProofInvalid);
    }
    Ok((*common, second.public_output))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        proof::MethodKind,
        transition::fixtures::{AcceptAll, RejectAll},
    };

    fn roots(tag: u8) -> StateRoots {
        StateRoots {
            balances: [tag; 32],
            ..StateRoots::empty()
        }
    }

    fn step(from: u8, to: u8) -> Proof {
        Proof {
            method: MethodKind::Deposit,
            public_input: roots(from),
            public_output: roots(to),
            payload: Vec::new(),
        }
    }

    #[test]
    fn test_merge_adjacent() {
        let merged = merge_proofs(&AcceptAll, &roots(0), &step(0, 1), &step(1, 2)).unwrap();
        assert_eq!(merged, (roots(0), roots(2)));
    }

    #[test]
    fn test_merge_rejects_gap() {
        assert_eq!(
            merge_proofs(&AcceptAll, &roots(0), &step(0, 1), &step(2, 3)),
            Err(TransitionError::ChainMismatch)
        );
        assert_eq!(
            merge_proofs(&AcceptAll, &roots(9), &step(0, 1), &step(1, 2)),
            Err(TransitionError::ChainMismatch)
        );
    }

    #[test]
    fn test_merge_verifies_both() {
        assert_eq!(
            merge_proofs(&RejectAll, &roots(0), &step(0, 1), &step(1, 2)),
            Err(TransitionError::ProofInvalid)
        );
    }

    #[test]
    fn test_merge_is_associative() {
        let (a, b, c) = (step(0, 1), step(1, 2), step(2, 3));
        let left = {
            let (input, output) = merge_proofs(&AcceptAll, &roots(0), &a, &b).unwrap();
            let ab = Proof {
                method: MethodKind::Merge,
                public_input: input,
                public_output: output,
                payload: Vec::new(),
            };
            merge_proofs(&AcceptAll, &roots(0), &ab, &c).unwrap()
        };
        let right = {
            let (input, output) = merge_proofs(&AcceptAll, &roots(1), &b, &c).unwrap();
            let bc = Proof {
                method: MethodKind::Merge,
                public_input: input,
                public_output: output,
                payload: Vec::new(),
            };
            merge_proofs(&AcceptAll, &roots(0), &a, &bc).unwrap()
        };
        assert_eq!(left, right);
        assert_eq!(left, (roots(0), roots(3)));
    }
}
