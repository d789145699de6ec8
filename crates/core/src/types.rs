//! Common types

use std::{fmt, str::FromStr};

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use tidepool_merkle::Keccak256Hasher;

/// 32-byte field element; integers are stored little-endian in the low bytes
pub type Field = tidepool_merkle::Hash;

/// Token identifier
pub type TokenId = Field;

/// Token amount
pub type Amount = u64;

/// Liquidity points; products of two amounts always fit
pub type Points = u128;

/// Length of an encoded address
pub const ADDRESS_LEN: usize = 55;

const ADDRESS_PREFIX: &[u8] = b"B62";

/// Encode an integer as a field element.
pub fn field_from_u64(value: u64) -> Field {
    let mut field = [0u8; 32];
    field[..8].copy_from_slice(&value.to_le_bytes());
    field
}

/// Encode a 128-bit integer as a field element.
pub fn field_from_u128(value: u128) -> Field {
    let mut field = [0u8; 32];
    field[..16].copy_from_slice(&value.to_le_bytes());
    field
}

/// Token id from a short ASCII symbol, e.g. `token_id("USDC")`.
pub fn token_id(symbol: &str) -> TokenId {
    let mut id = [0u8; 32];
    let bytes = symbol.as_bytes();
    let len = bytes.len().min(32);
    id[..len].copy_from_slice(&bytes[..len]);
    id
}

/// Rollup account address: `"B62"` followed by 52 lowercase hex characters.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address([u8; ADDRESS_LEN]);

impl Address {
    /// Derive the address owned by an ed25519 verifying key.
    pub fn derive(key: &ed25519_dalek::VerifyingKey) -> Self {
        let digest = Keccak256Hasher::hash(key.as_bytes());
        let mut bytes = [0u8; ADDRESS_LEN];
        bytes[..3].copy_from_slice(ADDRESS_PREFIX);
        let encoded = hex::encode(&digest[..26]);
        bytes[3..].copy_from_slice(encoded.as_bytes());
        Self(bytes)
    }

    /// Encoded bytes
    pub fn as_bytes(&self) -> &[u8; ADDRESS_LEN] {
        &self.0
    }

    /// Encoded string
    pub fn as_str(&self) -> &str {
        // Only ASCII is ever stored.
        std::str::from_utf8(&self.0).unwrap_or_default()
    }

    /// The two field elements an address occupies in a record.
    pub fn to_fields(&self) -> [Field; 2] {
        let mut low = [0u8; 32];
        let mut high = [0u8; 32];
        low.copy_from_slice(&self.0[..32]);
        high[..ADDRESS_LEN - 32].copy_from_slice(&self.0[32..]);
        [low, high]
    }
}

/// Address parsing errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressError {
    /// Wrong length
    #[error("address must be {ADDRESS_LEN} bytes, got {0}")]
    Length(usize),
    /// Missing `B62` prefix
    #[error("address must start with B62")]
    Prefix,
    /// Body is not lowercase hex
    #[error("address body must be lowercase hex")]
    Encoding,
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.as_bytes();
        if raw.len() != ADDRESS_LEN {
            return Err(AddressError::Length(raw.len()));
        }
        if &raw[..3] != ADDRESS_PREFIX {
            return Err(AddressError::Prefix);
        }
        if !raw[3..].iter().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
            return Err(AddressError::Encoding);
        }
        let mut bytes = [0u8; ADDRESS_LEN];
        bytes.copy_from_slice(raw);
        Ok(Self(bytes))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.as_str())
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::SigningKey;

    fn address(seed: u8) -> Address {
        Address::derive(&SigningKey::from_bytes(&[seed; 32]).verifying_key())
    }

    #[test]
    fn test_field_encoding() {
        let field = field_from_u64(0x0102);
        assert_eq!(field[0], 0x02);
        assert_eq!(field[1], 0x01);
        assert!(field[2..].iter().all(|b| *b == 0));
        assert_eq!(field_from_u128(u64::MAX as u128)[..8], field_from_u64(u64::MAX)[..8]);
    }

    #[test]
    fn test_derive_address() {
        let a = address(1);
        assert_eq!(a.as_str().len(), ADDRESS_LEN);
        assert!(a.as_str().starts_with("B62"));
        assert_ne!(a, address(2));
        assert_eq!(a.as_str().parse::<Address>().unwrap(), a);
    }

    #[test]
    fn test_address_fields() {
        let a = address(3);
        let [low, high] = a.to_fields();
        assert_eq!(&low[..], &a.as_bytes()[..32]);
        assert_eq!(&high[..23], &a.as_bytes()[32..]);
        assert!(high[23..].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert_eq!("B62abc".parse::<Address>(), Err(AddressError::Length(6)));
        let body = "0".repeat(52);
        assert_eq!(format!("X62{body}").parse::<Address>(), Err(AddressError::Prefix));
        let upper = "A".repeat(52);
        assert_eq!(format!("B62{upper}").parse::<Address>(), Err(AddressError::Encoding));
    }

    #[test]
    fn test_address_serde() {
        let a = address(4);
        let json = serde_json::to_string(&a).unwrap();
        assert_eq!(json, format!("\"{a}\""));
        assert_eq!(serde_json::from_str::<Address>(&json).unwrap(), a);
    }
}
