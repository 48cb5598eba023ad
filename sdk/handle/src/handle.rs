use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use wincode::{SchemaRead, SchemaWrite};

use crate::error::HandleError;

/// Opaque reference to one encrypted value held by one ledger.
///
/// The all-zero handle is the "empty slot" sentinel: ledgers return it for
/// values that were never written and clients must never send it for
/// decryption.
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
pub struct CiphertextHandle(pub [u8; 32]);

impl CiphertextHandle {
    pub const LEN: usize = 32;
    pub const ZERO: CiphertextHandle = CiphertextHandle([0u8; 32]);

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }
}

impl FromStr for CiphertextHandle {
    type Err = HandleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.strip_prefix("0x").unwrap_or(s);
        let mut out = [0u8; 32];
        hex::decode_to_slice(digits, &mut out)
            .map_err(|_| HandleError::InvalidHandle(s.to_string()))?;
        Ok(Self(out))
    }
}

impl fmt::Display for CiphertextHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for CiphertextHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CiphertextHandle({self})")
    }
}

impl AsRef<[u8]> for CiphertextHandle {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Proof that a freshly minted handle was produced for a specific
/// (ledger, submitter) pair. Single use: consumed by the submit call.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmissionProof(pub Vec<u8>);

impl AdmissionProof {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for AdmissionProof {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AdmissionProof({} bytes)", self.0.len())
    }
}

/// A decrypted plaintext.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum ClearValue {
    Bool(bool),
    Uint(u64),
}

const TAG_BOOL: u8 = 0;
const TAG_UINT: u8 = 1;

impl ClearValue {
    /// Wire encoding: `[tag] || payload` (bool: 1 byte, uint: 8 bytes LE).
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            ClearValue::Bool(b) => vec![TAG_BOOL, *b as u8],
            ClearValue::Uint(v) => {
                let mut out = Vec::with_capacity(9);
                out.push(TAG_UINT);
                out.extend_from_slice(&v.to_le_bytes());
                out
            }
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, HandleError> {
        match bytes {
            [TAG_BOOL, 0] => Ok(ClearValue::Bool(false)),
            [TAG_BOOL, 1] => Ok(ClearValue::Bool(true)),
            [TAG_UINT, rest @ ..] if rest.len() == 8 => {
                let raw: [u8; 8] = rest
                    .try_into()
                    .map_err(|_| HandleError::MalformedClearValue)?;
                Ok(ClearValue::Uint(u64::from_le_bytes(raw)))
            }
            _ => Err(HandleError::MalformedClearValue),
        }
    }

    /// Boolean view. Integers follow the ledger convention: non-zero is true.
    pub fn as_bool(&self) -> bool {
        match self {
            ClearValue::Bool(b) => *b,
            ClearValue::Uint(v) => *v != 0,
        }
    }

    pub fn as_u64(&self) -> u64 {
        match self {
            ClearValue::Bool(b) => *b as u64,
            ClearValue::Uint(v) => *v,
        }
    }
}

impl fmt::Display for ClearValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClearValue::Bool(b) => write!(f, "{b}"),
            ClearValue::Uint(v) => write!(f, "{v}"),
        }
    }
}
