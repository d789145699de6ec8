//! User signatures over message fields
//!
//! Messages are the concatenation of their 32-byte field elements. They carry
//! no nonce, so a captured signature can be replayed while the signer's
//! balance still allows it.

use std::collections::HashMap;

use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};

use crate::types::{Address, Field};

/// Signature as two 32-byte components
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    /// First half
    pub r: [u8; 32],
    /// Second half
    pub s: [u8; 32],
}

impl Signature {
    /// `r` followed by `s`
    pub fn to_bytes(&self) -> [u8; 64] {
        let mut bytes = [0u8; 64];
        bytes[..32].copy_from_slice(&self.r);
        bytes[32..].copy_from_slice(&self.s);
        bytes
    }

    /// Split 64 bytes into `r` and `s`
    pub fn from_bytes(bytes: &[u8; 64]) -> Self {
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&bytes[..32]);
        s.copy_from_slice(&bytes[32..]);
        Self { r, s }
    }
}

/// Checks that `signer` signed `message`
pub trait SignatureVerifier: Send + Sync {
    /// Whether `signature` is `signer`'s over `message`
    fn verify(&self, signer: &Address, message: &[Field], signature: &Signature) -> bool;
}

fn message_bytes(message: &[Field]) -> Vec<u8> {
    message.concat()
}

/// Sign message fields with a user key.
pub fn sign_fields(key: &SigningKey, message: &[Field]) -> Signature {
    Signature::from_bytes(&key.sign(&message_bytes(message)).to_bytes())
}

/// Ed25519 verifier resolving addresses to registered keys
#[derive(Clone, Debug, Default)]
pub struct KeyRegistry {
    keys: HashMap<Address, VerifyingKey>,
}

impl KeyRegistry {
    /// Registry with no keys
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a key and return the address it controls.
    pub fn register(&mut self, key: VerifyingKey) -> Address {
        let address = Address::derive(&key);
        self.keys.insert(address, key);
        address
    }

    /// Key registered for `address`
    pub fn get(&self, address: &Address) -> Option<&VerifyingKey> {
        self.keys.get(address)
    }

    /// Number of registered keys
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether no key is registered
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl SignatureVerifier for KeyRegistry {
    fn verify(&self, signer: &Address, message: &[Field], signature: &Signature) -> bool {
        let Some(key) = self.keys.get(signer) else {
            return false;
        };
        let signature = ed25519_dalek::Signature::from_bytes(&signature.to_bytes());
        key.verify(&message_bytes(message), &signature).is_ok()
    }
}
