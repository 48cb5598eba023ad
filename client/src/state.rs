//! Session state machine.
//!
//! ```text
//!   Idle ──begin──▶ InFlight ──finish──▶ Committed | Cancelled | Failed ──▶ Idle
//!                      │
//!                      └── second begin of the same kind ──▶ Busy (no-op)
//! ```

use payveil_handle::{Address, CiphertextHandle, ClearValue};
use serde::{Deserialize, Serialize};

use crate::error::ErrorKind;
use crate::guard::SessionFingerprint;
use crate::status;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Submit,
    Compare,
    DecryptValue,
    DecryptComparison,
}

/// How an operation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "error", rename_all = "snake_case")]
pub enum Outcome {
    /// Result applied to the session.
    Committed,
    /// Context changed mid-flight; result discarded.
    Cancelled,
    Failed(ErrorKind),
    /// Same kind already in flight.
    Busy,
    /// Nothing to do: zero value, missing preconditions or an already decrypted handle.
    Skipped,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationRecord {
    pub in_flight: bool,
    pub result_handle: Option<CiphertextHandle>,
    pub decrypted: Option<ClearValue>,
    pub status: String,
    pub outcome: Option<Outcome>,
}

impl OperationRecord {
    fn clear_result(&mut self) {
        self.result_handle = None;
        self.decrypted = None;
    }

    /// True when `handle` has already been decrypted into this record.
    pub fn has_decrypted(&self, handle: &CiphertextHandle) -> bool {
        self.result_handle.as_ref() == Some(handle) && self.decrypted.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Records {
    /// `result_handle` is the caller's own registered handle.
    pub submit: OperationRecord,
    /// `result_handle` is the active comparison handle.
    pub compare: OperationRecord,
    pub decrypt_value: OperationRecord,
    pub decrypt_comparison: OperationRecord,
}

impl Records {
    pub fn get(&self, kind: OperationKind) -> &OperationRecord {
        match kind {
            OperationKind::Submit => &self.submit,
            OperationKind::Compare => &self.compare,
            OperationKind::DecryptValue => &self.decrypt_value,
            OperationKind::DecryptComparison => &self.decrypt_comparison,
        }
    }

    pub fn get_mut(&mut self, kind: OperationKind) -> &mut OperationRecord {
        match kind {
            OperationKind::Submit => &mut self.submit,
            OperationKind::Compare => &mut self.compare,
            OperationKind::DecryptValue => &mut self.decrypt_value,
            OperationKind::DecryptComparison => &mut self.decrypt_comparison,
        }
    }
}

/// Result of a successful operation, applied under the state lock.
#[derive(Debug)]
pub(crate) enum Commit {
    Submitted {
        handle: CiphertextHandle,
        status: u8,
    },
    /// First entry becomes the active comparison.
    Compared {
        results: Vec<(Address, CiphertextHandle)>,
        status: u8,
        batch: bool,
    },
    ValueDecrypted {
        handle: CiphertextHandle,
        value: ClearValue,
    },
    ComparisonDecrypted {
        handle: CiphertextHandle,
        value: ClearValue,
    },
}

#[derive(Debug, Default)]
pub(crate) struct SessionState {
    /// Context the per-account fields below belong to.
    pub bound: SessionFingerprint,
    pub has_value: bool,
    pub counterpart: Option<Address>,
    pub batch_results: Vec<(Address, CiphertextHandle)>,
    pub records: Records,
    pub status: String,
}

impl SessionState {
    /// Rebinds to `current`, dropping per-account truth if the context moved.
    /// Returns whether a reset happened.
    pub fn sync(&mut self, current: SessionFingerprint) -> bool {
        if self.bound == current {
            return false;
        }
        self.bound = current;
        self.has_value = false;
        self.counterpart = None;
        self.batch_results.clear();
        self.records.submit.clear_result();
        self.records.compare.clear_result();
        self.records.decrypt_value.clear_result();
        self.records.decrypt_comparison.clear_result();
        true
    }

    pub fn set_status(&mut self, kind: Option<OperationKind>, message: impl Into<String>) {
        let message = message.into();
        if let Some(kind) = kind {
            self.records.get_mut(kind).status = message.clone();
        }
        self.status = message;
    }

    pub fn set_own_handle(&mut self, handle: Option<CiphertextHandle>) {
        self.has_value = handle.is_some();
        self.records.submit.result_handle = handle;
        let decrypted = self.records.decrypt_value.result_handle;
        if handle.is_none_or(|h| decrypted != Some(h)) {
            self.records.decrypt_value.clear_result();
        }
    }

    /// Applies `commit` and returns the status line describing it.
    ///
    /// A decryption whose handle is no longer the current one is discarded
    /// and reported as `Err` with the status line to show instead.
    pub fn apply(&mut self, commit: Commit) -> Result<String, String> {
        match commit {
            Commit::Submitted { handle, status } => {
                self.set_own_handle(Some(handle));
                Ok(status::submitted(status))
            }
            Commit::Compared {
                results,
                status,
                batch,
            } => {
                let active = results.first().copied();
                self.counterpart = active.map(|(counterpart, _)| counterpart);
                self.records.compare.result_handle = active.map(|(_, handle)| handle);
                let decrypted = self.records.decrypt_comparison.result_handle;
                if active.is_none_or(|(_, h)| decrypted != Some(h)) {
                    self.records.decrypt_comparison.clear_result();
                }
                let count = results.len();
                self.batch_results = results;
                if batch {
                    Ok(status::batch_compared(count, status))
                } else {
                    Ok(status::compared(status))
                }
            }
            Commit::ValueDecrypted { handle, value } => {
                if self.records.submit.result_handle != Some(handle) {
                    return Err(status::DECRYPT_SUPERSEDED.to_string());
                }
                let record = &mut self.records.decrypt_value;
                record.result_handle = Some(handle);
                record.decrypted = Some(value);
                Ok(status::own_value(value.as_u64()))
            }
            Commit::ComparisonDecrypted { handle, value } => {
                if self.records.compare.result_handle != Some(handle) {
                    return Err(status::DECRYPT_SUPERSEDED.to_string());
                }
                let record = &mut self.records.decrypt_comparison;
                record.result_handle = Some(handle);
                record.decrypted = Some(value);
                if value.as_bool() {
                    Ok(status::EARNS_MORE.to_string())
                } else {
                    Ok(status::EARNS_LESS.to_string())
                }
            }
        }
    }
}

/// Read-only view handed to the application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub fingerprint: SessionFingerprint,
    pub ledger: Option<Address>,
    pub is_deployed: bool,
    pub has_value: bool,
    pub own_handle: Option<CiphertextHandle>,
    pub counterpart: Option<Address>,
    pub comparison_handle: Option<CiphertextHandle>,
    pub batch_results: Vec<(Address, CiphertextHandle)>,
    pub clear_value: Option<u64>,
    pub comparison_result: Option<bool>,
    pub records: Records,
    pub status: String,
    pub can_submit: bool,
    pub can_compare: bool,
    pub can_decrypt_value: bool,
    pub can_decrypt_comparison: bool,
}

impl SessionSnapshot {
    pub(crate) fn build(
        state: &SessionState,
        fingerprint: SessionFingerprint,
        ledger: Option<Address>,
        gateway_ready: bool,
    ) -> Self {
        let records = &state.records;
        let connected = fingerprint.is_connected() && ledger.is_some();
        let decryptable = |source: &OperationRecord, target: &OperationRecord| {
            source
                .result_handle
                .is_some_and(|h| !h.is_zero() && !target.has_decrypted(&h))
                && !target.in_flight
        };

        Self {
            fingerprint,
            ledger,
            is_deployed: ledger.is_some(),
            has_value: state.has_value,
            own_handle: records.submit.result_handle,
            counterpart: state.counterpart,
            comparison_handle: records.compare.result_handle,
            batch_results: state.batch_results.clone(),
            clear_value: records.decrypt_value.decrypted.map(|v| v.as_u64()),
            comparison_result: records.decrypt_comparison.decrypted.map(|v| v.as_bool()),
            records: records.clone(),
            status: state.status.clone(),
            can_submit: connected && gateway_ready && !records.submit.in_flight,
            can_compare: connected
                && gateway_ready
                && state.has_value
                && !records.compare.in_flight,
            can_decrypt_value: connected && decryptable(&records.submit, &records.decrypt_value),
            can_decrypt_comparison: connected
                && decryptable(&records.compare, &records.decrypt_comparison),
        }
    }
}
