//! In-process Dev Network
//!
//! A single-node network holding ledger state, the coprocessor keys and the
//! decryption service. Clones share the same state, so one `DevNetwork` can be
//! handed to several sessions as their ledger, gateway and decryptor at once.
//!
//! ```text
//! ┌──────────────────── DevNetwork ─────────────────────┐
//! │ gateway.rs    encrypt → pending inputs + proof      │
//! │ ledger.rs     admit proof → values / comparisons    │
//! │ decryptor.rs  ACL check → re-encrypt to user key    │
//! │ coprocessor.rs  sealing, handles, proof MACs        │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! Rejected calls behave like reverted `eth_estimateGas`: the error is returned
//! from the send itself and no transaction is recorded.

mod coprocessor;
mod decryptor;
mod gateway;
mod ledger;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use dashmap::DashMap;
use log::{debug, info};
use payveil_authorization::{Clock, SystemClock};
use payveil_handle::{Address, CiphertextHandle};

use crate::error::LedgerError;
use crate::types::{PendingTransaction, TransactionReceipt, TxHash};

use coprocessor::{CoprocessorKeys, StoredCiphertext};

pub(crate) const NOT_SUBMITTED: &str = "You have not submitted a salary yet";
pub(crate) const NOT_A_PARTY: &str = "You can only view comparisons you are part of";
pub(crate) const COUNTERPART_NOT_SUBMITTED: &str = "The other user has not submitted a salary yet";
pub(crate) const SELF_COMPARISON: &str = "Cannot compare with yourself";
pub(crate) const INVALID_PROOF: &str = "invalid input proof";

/// Per-ledger registry.
#[derive(Debug, Default)]
struct LedgerState {
    values: HashMap<Address, CiphertextHandle>,
    /// (caller, counterpart) → handle of `caller > counterpart`
    comparisons: HashMap<(Address, Address), CiphertextHandle>,
}

/// Encrypted input awaiting admission by a ledger call.
#[derive(Debug)]
struct PendingInput {
    submitter: Address,
    ciphertext: StoredCiphertext,
}

struct DevState {
    chain_id: u64,
    keys: CoprocessorKeys,
    gateway_ready: AtomicBool,
    ledgers: DashMap<Address, LedgerState>,
    ciphertexts: DashMap<CiphertextHandle, StoredCiphertext>,
    pending_inputs: DashMap<CiphertextHandle, PendingInput>,
    receipts: DashMap<TxHash, TransactionReceipt>,
    deployments: AtomicU64,
    block_number: AtomicU64,
    transactions: AtomicU64,
    encryptions: AtomicU64,
    decryptions: AtomicU64,
    reject_next: Mutex<Option<String>>,
    clock: Arc<dyn Clock>,
}

/// Shared handle to an in-process network.
#[derive(Clone)]
pub struct DevNetwork {
    inner: Arc<DevState>,
}

impl DevNetwork {
    pub fn new(chain_id: u64) -> Self {
        Self::with_clock(chain_id, Arc::new(SystemClock))
    }

    /// Network whose decryption service reads time from `clock`.
    pub fn with_clock(chain_id: u64, clock: Arc<dyn Clock>) -> Self {
        info!("Starting dev network on chain {chain_id}");
        Self {
            inner: Arc::new(DevState {
                chain_id,
                keys: CoprocessorKeys::generate(),
                gateway_ready: AtomicBool::new(true),
                ledgers: DashMap::new(),
                ciphertexts: DashMap::new(),
                pending_inputs: DashMap::new(),
                receipts: DashMap::new(),
                deployments: AtomicU64::new(0),
                block_number: AtomicU64::new(0),
                transactions: AtomicU64::new(0),
                encryptions: AtomicU64::new(0),
                decryptions: AtomicU64::new(0),
                reject_next: Mutex::new(None),
                clock,
            }),
        }
    }

    pub fn chain_id(&self) -> u64 {
        self.inner.chain_id
    }

    /// Deploys a fresh, empty ledger and returns its address.
    pub fn deploy_ledger(&self) -> Address {
        let nonce = self.inner.deployments.fetch_add(1, Ordering::SeqCst);
        let mut hasher = blake3::Hasher::new_derive_key("payveil-dev-deploy-v1");
        hasher.update(&self.inner.chain_id.to_le_bytes());
        hasher.update(&nonce.to_le_bytes());
        let digest = hasher.finalize();

        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&digest.as_bytes()[..20]);
        let address = Address(bytes);

        self.inner.ledgers.insert(address, LedgerState::default());
        info!("Deployed ledger {address} on chain {}", self.inner.chain_id);
        address
    }

    /// Toggles whether the encryption backend reports itself initialised.
    pub fn set_gateway_ready(&self, ready: bool) {
        self.inner.gateway_ready.store(ready, Ordering::SeqCst);
    }

    /// Makes the next state-changing call revert with `reason`.
    pub fn reject_next_transaction(&self, reason: impl Into<String>) {
        if let Ok(mut slot) = self.inner.reject_next.lock() {
            *slot = Some(reason.into());
        }
    }

    /// Transactions accepted so far.
    pub fn transaction_count(&self) -> u64 {
        self.inner.transactions.load(Ordering::SeqCst)
    }

    /// Calls made to the encryption gateway.
    pub fn encryption_count(&self) -> u64 {
        self.inner.encryptions.load(Ordering::SeqCst)
    }

    /// Round-trips made to the decryption service.
    pub fn decryption_count(&self) -> u64 {
        self.inner.decryptions.load(Ordering::SeqCst)
    }

    fn take_rejection(&self) -> Result<(), LedgerError> {
        let reason = self
            .inner
            .reject_next
            .lock()
            .ok()
            .and_then(|mut slot| slot.take());
        match reason {
            Some(reason) => {
                debug!("Rejecting transaction: {reason}");
                Err(LedgerError::Rejected(reason))
            }
            None => Ok(()),
        }
    }

    fn ensure_deployed(&self, ledger: &Address) -> Result<(), LedgerError> {
        if self.inner.ledgers.contains_key(ledger) {
            Ok(())
        } else {
            Err(LedgerError::Unavailable(format!(
                "no ledger deployed at {ledger}"
            )))
        }
    }

    fn record_transaction(&self, ledger: &Address, from: &Address) -> PendingTransaction {
        let n = self.inner.transactions.fetch_add(1, Ordering::SeqCst) + 1;
        let block_number = self.inner.block_number.fetch_add(1, Ordering::SeqCst) + 1;

        let mut hasher = blake3::Hasher::new_derive_key("payveil-dev-tx-v1");
        hasher.update(&self.inner.chain_id.to_le_bytes());
        hasher.update(&n.to_le_bytes());
        hasher.update(ledger.as_bytes());
        hasher.update(from.as_bytes());
        let hash = TxHash(*hasher.finalize().as_bytes());

        self.inner.receipts.insert(
            hash,
            TransactionReceipt {
                hash,
                status: 1,
                block_number,
            },
        );
        debug!("Mined {hash} in block {block_number}");
        PendingTransaction { hash }
    }
}

impl std::fmt::Debug for DevNetwork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DevNetwork")
            .field("chain_id", &self.inner.chain_id)
            .field("ledgers", &self.inner.ledgers.len())
            .field("transactions", &self.transaction_count())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deployments_are_distinct() {
        let network = DevNetwork::new(31337);
        let a = network.deploy_ledger();
        let b = network.deploy_ledger();
        assert_ne!(a, b);
        assert!(network.ensure_deployed(&a).is_ok());
        assert!(network.ensure_deployed(&Address([7u8; 20])).is_err());
    }

    #[test]
    fn test_rejection_applies_once() {
        let network = DevNetwork::new(31337);
        network.reject_next_transaction("out of gas");
        assert_eq!(
            network.take_rejection(),
            Err(LedgerError::Rejected("out of gas".into()))
        );
        assert_eq!(network.take_rejection(), Ok(()));
    }

    #[test]
    fn test_clones_share_state() {
        let network = DevNetwork::new(1);
        let clone = network.clone();
        let ledger = network.deploy_ledger();
        let tx = clone.record_transaction(&ledger, &Address::ZERO);
        assert_eq!(network.transaction_count(), 1);
        assert!(network.inner.receipts.contains_key(&tx.hash));
    }
}
