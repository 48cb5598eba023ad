use std::collections::HashSet;

use log::{debug, warn};
use payveil_handle::{Address, AdmissionProof, CiphertextHandle, ValueKind};

use super::coprocessor::{StoredCiphertext, derive_handle};
use super::{
    COUNTERPART_NOT_SUBMITTED, DevNetwork, INVALID_PROOF, NOT_A_PARTY, NOT_SUBMITTED,
    SELF_COMPARISON,
};
use crate::api::ConfidentialLedger;
use crate::error::LedgerError;
use crate::types::{PendingTransaction, TransactionReceipt};

/// A comparison computed but not yet written.
struct ComparisonWrite {
    key: (Address, Address),
    handle: CiphertextHandle,
    ciphertext: StoredCiphertext,
}

impl DevNetwork {
    /// Consumes the pending input behind `handle` if `proof` admits it.
    fn admit(
        &self,
        ledger: &Address,
        from: &Address,
        handle: &CiphertextHandle,
        proof: &AdmissionProof,
    ) -> Result<StoredCiphertext, LedgerError> {
        if !self.inner.keys.verify_proof(ledger, from, handle, proof) {
            warn!("Input proof for {handle} rejected (ledger {ledger}, submitter {from})");
            return Err(LedgerError::Rejected(INVALID_PROOF.to_string()));
        }

        let (_, pending) = self
            .inner
            .pending_inputs
            .remove_if(handle, |_, pending| {
                pending.submitter == *from && pending.ciphertext.ledger == *ledger
            })
            .ok_or_else(|| LedgerError::Rejected(INVALID_PROOF.to_string()))?;

        let mut ciphertext = pending.ciphertext;
        ciphertext.acl.insert(*from);
        Ok(ciphertext)
    }

    fn store_value(
        &self,
        ledger: Address,
        from: Address,
        handle: CiphertextHandle,
        ciphertext: StoredCiphertext,
    ) -> Result<(), LedgerError> {
        self.inner.ciphertexts.insert(handle, ciphertext);
        let mut state = self
            .inner
            .ledgers
            .get_mut(&ledger)
            .ok_or_else(|| LedgerError::Unavailable(format!("no ledger deployed at {ledger}")))?;
        state.values.insert(from, handle);
        Ok(())
    }

    fn value_of(
        &self,
        ledger: &Address,
        who: &Address,
    ) -> Result<Option<CiphertextHandle>, LedgerError> {
        self.ensure_deployed(ledger)?;
        Ok(self
            .inner
            .ledgers
            .get(ledger)
            .and_then(|state| state.values.get(who).copied()))
    }

    fn plaintext_of(&self, handle: &CiphertextHandle) -> Result<u64, LedgerError> {
        let stored = self
            .inner
            .ciphertexts
            .get(handle)
            .ok_or_else(|| LedgerError::Unavailable(format!("missing ciphertext {handle}")))?;
        self.inner
            .keys
            .unseal(&stored)
            .map_err(LedgerError::Unavailable)
    }

    /// Computes `caller > counterpart` without touching ledger state.
    fn compute_comparison(
        &self,
        ledger: Address,
        caller: Address,
        counterpart: Address,
    ) -> Result<ComparisonWrite, LedgerError> {
        let own = self
            .value_of(&ledger, &caller)?
            .ok_or_else(|| LedgerError::NotSubmitted(NOT_SUBMITTED.to_string()))?;
        if counterpart == caller {
            return Err(LedgerError::Rejected(SELF_COMPARISON.to_string()));
        }
        let other = self
            .value_of(&ledger, &counterpart)?
            .ok_or_else(|| LedgerError::Rejected(COUNTERPART_NOT_SUBMITTED.to_string()))?;

        let greater = self.plaintext_of(&own)? > self.plaintext_of(&other)?;
        let mut ciphertext = self
            .inner
            .keys
            .seal(ledger, ValueKind::Bool, greater as u64)
            .map_err(LedgerError::Unavailable)?;
        ciphertext.acl = HashSet::from([caller, counterpart]);
        let handle = derive_handle(self.inner.chain_id, &ciphertext);

        Ok(ComparisonWrite {
            key: (caller, counterpart),
            handle,
            ciphertext,
        })
    }

    fn apply_comparisons(
        &self,
        ledger: Address,
        writes: Vec<ComparisonWrite>,
    ) -> Result<(), LedgerError> {
        let mut state = self
            .inner
            .ledgers
            .get_mut(&ledger)
            .ok_or_else(|| LedgerError::Unavailable(format!("no ledger deployed at {ledger}")))?;
        for write in writes {
            self.inner.ciphertexts.insert(write.handle, write.ciphertext);
            state.comparisons.insert(write.key, write.handle);
        }
        Ok(())
    }
}

impl ConfidentialLedger for DevNetwork {
    async fn submit(
        &self,
        ledger: Address,
        from: Address,
        handle: CiphertextHandle,
        proof: &AdmissionProof,
    ) -> Result<PendingTransaction, LedgerError> {
        self.ensure_deployed(&ledger)?;
        self.take_rejection()?;

        let ciphertext = self.admit(&ledger, &from, &handle, proof)?;
        self.store_value(ledger, from, handle, ciphertext)?;
        debug!("{from} submitted {handle} to {ledger}");
        Ok(self.record_transaction(&ledger, &from))
    }

    async fn update(
        &self,
        ledger: Address,
        from: Address,
        handle: CiphertextHandle,
        proof: &AdmissionProof,
    ) -> Result<PendingTransaction, LedgerError> {
        if self.value_of(&ledger, &from)?.is_none() {
            return Err(LedgerError::NotSubmitted(NOT_SUBMITTED.to_string()));
        }
        self.take_rejection()?;

        let ciphertext = self.admit(&ledger, &from, &handle, proof)?;
        self.store_value(ledger, from, handle, ciphertext)?;
        debug!("{from} updated their value on {ledger} to {handle}");
        Ok(self.record_transaction(&ledger, &from))
    }

    async fn wait_for_receipt(
        &self,
        tx: &PendingTransaction,
    ) -> Result<TransactionReceipt, LedgerError> {
        self.inner
            .receipts
            .get(&tx.hash)
            .map(|receipt| *receipt)
            .ok_or_else(|| LedgerError::UnknownTransaction(tx.hash.to_string()))
    }

    async fn has_value(&self, ledger: Address, who: Address) -> Result<bool, LedgerError> {
        Ok(self.value_of(&ledger, &who)?.is_some())
    }

    async fn get_own_value(
        &self,
        ledger: Address,
        caller: Address,
    ) -> Result<CiphertextHandle, LedgerError> {
        self.value_of(&ledger, &caller)?
            .ok_or_else(|| LedgerError::NotSubmitted(NOT_SUBMITTED.to_string()))
    }

    async fn request_comparison(
        &self,
        ledger: Address,
        caller: Address,
        counterpart: Address,
    ) -> Result<PendingTransaction, LedgerError> {
        let write = self.compute_comparison(ledger, caller, counterpart)?;
        self.take_rejection()?;

        self.apply_comparisons(ledger, vec![write])?;
        debug!("{caller} compared against {counterpart} on {ledger}");
        Ok(self.record_transaction(&ledger, &caller))
    }

    async fn batch_request_comparison(
        &self,
        ledger: Address,
        caller: Address,
        counterparts: &[Address],
    ) -> Result<PendingTransaction, LedgerError> {
        if counterparts.is_empty() {
            return Err(LedgerError::Rejected(
                "No counterparts to compare with".to_string(),
            ));
        }

        // all-or-nothing, like a reverting transaction
        let writes = counterparts
            .iter()
            .map(|counterpart| self.compute_comparison(ledger, caller, *counterpart))
            .collect::<Result<Vec<_>, _>>()?;
        self.take_rejection()?;

        self.apply_comparisons(ledger, writes)?;
        debug!(
            "{caller} compared against {} counterparts on {ledger}",
            counterparts.len()
        );
        Ok(self.record_transaction(&ledger, &caller))
    }

    async fn get_comparison_result(
        &self,
        ledger: Address,
        caller: Address,
        party_a: Address,
        party_b: Address,
    ) -> Result<CiphertextHandle, LedgerError> {
        self.ensure_deployed(&ledger)?;
        if caller != party_a && caller != party_b {
            return Err(LedgerError::Unauthorized(NOT_A_PARTY.to_string()));
        }
        // unset slots read as the empty handle
        Ok(self
            .inner
            .ledgers
            .get(&ledger)
            .and_then(|state| state.comparisons.get(&(party_a, party_b)).copied())
            .unwrap_or(CiphertextHandle::ZERO))
    }

    async fn has_comparison(
        &self,
        ledger: Address,
        party_a: Address,
        party_b: Address,
    ) -> Result<bool, LedgerError> {
        self.ensure_deployed(&ledger)?;
        Ok(self
            .inner
            .ledgers
            .get(&ledger)
            .is_some_and(|state| state.comparisons.contains_key(&(party_a, party_b))))
    }
}
