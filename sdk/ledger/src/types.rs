use std::fmt;

use payveil_handle::{Address, CiphertextHandle};
use serde::{Deserialize, Serialize};

/// Transaction identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxHash(pub [u8; 32]);

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TxHash({self})")
    }
}

/// A transaction that has been sent but not yet confirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingTransaction {
    pub hash: TxHash,
}

/// Confirmation of a mined transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionReceipt {
    pub hash: TxHash,
    /// 1 = success, 0 = reverted
    pub status: u8,
    pub block_number: u64,
}

impl TransactionReceipt {
    pub fn succeeded(&self) -> bool {
        self.status == 1
    }
}

/// One handle to decrypt, with the ledger that owns it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecryptionRequest {
    pub handle: CiphertextHandle,
    pub ledger: Address,
}
