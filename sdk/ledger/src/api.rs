use std::future::Future;

use payveil_authorization::{DecryptionAuthorization, ReencryptedValue};
use payveil_handle::{
    Address, AdmissionProof, CiphertextHandle, EncryptedInput, EncryptedInputResponse,
};

use crate::error::{DecryptionError, GatewayError, LedgerError};
use crate::types::{DecryptionRequest, PendingTransaction, TransactionReceipt};

/// Turns validated plaintexts into handles plus an admission proof.
///
/// The proof is only valid for the input's exact (ledger, submitter, handles);
/// replaying it against another ledger or submitter fails admission.
pub trait EncryptionGateway: Send + Sync {
    /// Whether the backend is initialised for `chain_id`.
    fn is_ready(&self, chain_id: u64) -> bool;

    fn encrypt(
        &self,
        chain_id: u64,
        input: &EncryptedInput,
    ) -> impl Future<Output = Result<EncryptedInputResponse, GatewayError>> + Send;
}

/// The confidential ledger holding registered values and comparison results.
///
/// Every call names the ledger instance and the calling account.
pub trait ConfidentialLedger: Send + Sync {
    /// Registers or overwrites the caller's value.
    fn submit(
        &self,
        ledger: Address,
        from: Address,
        handle: CiphertextHandle,
        proof: &AdmissionProof,
    ) -> impl Future<Output = Result<PendingTransaction, LedgerError>> + Send;

    /// Replaces an existing value; fails with `NotSubmitted` when there is none.
    fn update(
        &self,
        ledger: Address,
        from: Address,
        handle: CiphertextHandle,
        proof: &AdmissionProof,
    ) -> impl Future<Output = Result<PendingTransaction, LedgerError>> + Send;

    fn wait_for_receipt(
        &self,
        tx: &PendingTransaction,
    ) -> impl Future<Output = Result<TransactionReceipt, LedgerError>> + Send;

    fn has_value(
        &self,
        ledger: Address,
        who: Address,
    ) -> impl Future<Output = Result<bool, LedgerError>> + Send;

    /// The caller's own handle; `NotSubmitted` when there is none.
    fn get_own_value(
        &self,
        ledger: Address,
        caller: Address,
    ) -> impl Future<Output = Result<CiphertextHandle, LedgerError>> + Send;

    /// Compares the caller's value against `counterpart`'s.
    fn request_comparison(
        &self,
        ledger: Address,
        caller: Address,
        counterpart: Address,
    ) -> impl Future<Output = Result<PendingTransaction, LedgerError>> + Send;

    /// [`request_comparison`](Self::request_comparison) for each counterpart, in order,
    /// as one transaction.
    fn batch_request_comparison(
        &self,
        ledger: Address,
        caller: Address,
        counterparts: &[Address],
    ) -> impl Future<Output = Result<PendingTransaction, LedgerError>> + Send;

    /// Handle of `party_a > party_b`; `Unauthorized` unless the caller is a party.
    fn get_comparison_result(
        &self,
        ledger: Address,
        caller: Address,
        party_a: Address,
        party_b: Address,
    ) -> impl Future<Output = Result<CiphertextHandle, LedgerError>> + Send;

    fn has_comparison(
        &self,
        ledger: Address,
        party_a: Address,
        party_b: Address,
    ) -> impl Future<Output = Result<bool, LedgerError>> + Send;
}

/// Returns plaintexts re-encrypted to an authorization's ephemeral key.
pub trait DecryptionService: Send + Sync {
    fn user_decrypt(
        &self,
        requests: &[DecryptionRequest],
        authorization: &DecryptionAuthorization,
    ) -> impl Future<Output = Result<Vec<ReencryptedValue>, DecryptionError>> + Send;
}
