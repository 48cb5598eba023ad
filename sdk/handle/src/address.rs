use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use wincode::{SchemaRead, SchemaWrite};

use crate::error::HandleError;

/// A 20-byte account or ledger address, rendered as `0x`-prefixed hex.
#[derive(
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Default,
    SchemaRead,
    SchemaWrite,
    Serialize,
    Deserialize,
)]
pub struct Address(pub [u8; 20]);

impl Address {
    pub const LEN: usize = 20;
    pub const ZERO: Address = Address([0u8; 20]);

    /// Derives the address owned by an Ed25519 verifying key.
    /// Formula: SHA256(verifying_key)[..20]
    pub fn from_verifying_key(verifying_key: &[u8; 32]) -> Self {
        let digest = Sha256::digest(verifying_key);
        let mut out = [0u8; 20];
        out.copy_from_slice(&digest[..20]);
        Self(out)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }
}

impl FromStr for Address {
    type Err = HandleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);

        if digits.len() != Self::LEN * 2 {
            return Err(HandleError::InvalidAddress(s.to_string()));
        }

        let mut out = [0u8; 20];
        hex::decode_to_slice(digits, &mut out)
            .map_err(|_| HandleError::InvalidAddress(s.to_string()))?;
        Ok(Self(out))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({self})")
    }
}

impl AsRef<[u8]> for Address {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let text = "0x00112233445566778899aabbccddeeff00112233";
        let addr: Address = text.parse().unwrap();
        assert_eq!(addr.to_string(), text);

        let upper: Address = "0X00112233445566778899AABBCCDDEEFF00112233".parse().unwrap();
        assert_eq!(addr, upper);
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!("0x1234".parse::<Address>().is_err());
        assert!("not an address".parse::<Address>().is_err());
        assert!(
            "0xzz112233445566778899aabbccddeeff00112233"
                .parse::<Address>()
                .is_err()
        );
    }

    #[test]
    fn test_from_verifying_key_is_deterministic() {
        let a = Address::from_verifying_key(&[7u8; 32]);
        let b = Address::from_verifying_key(&[7u8; 32]);
        let c = Address::from_verifying_key(&[8u8; 32]);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(!a.is_zero());
    }
}
