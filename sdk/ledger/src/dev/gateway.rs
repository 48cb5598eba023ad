use std::sync::atomic::Ordering;

use log::debug;
use payveil_handle::{EncryptedInput, EncryptedInputResponse, HandleError};

use super::coprocessor::derive_handle;
use super::{DevNetwork, PendingInput};
use crate::api::EncryptionGateway;
use crate::error::GatewayError;

impl EncryptionGateway for DevNetwork {
    fn is_ready(&self, chain_id: u64) -> bool {
        chain_id == self.inner.chain_id && self.inner.gateway_ready.load(Ordering::SeqCst)
    }

    async fn encrypt(
        &self,
        chain_id: u64,
        input: &EncryptedInput,
    ) -> Result<EncryptedInputResponse, GatewayError> {
        self.inner.encryptions.fetch_add(1, Ordering::SeqCst);

        if !self.is_ready(chain_id) {
            return Err(GatewayError::EncryptionUnavailable { chain_id });
        }
        if input.is_empty() {
            return Err(HandleError::EmptyInput.into());
        }

        let mut handles = Vec::with_capacity(input.values().len());
        for value in input.values() {
            value.kind.check(value.value)?;
            let ciphertext = self
                .inner
                .keys
                .seal(input.ledger(), value.kind, value.value)
                .map_err(GatewayError::Failed)?;
            let handle = derive_handle(chain_id, &ciphertext);

            self.inner.pending_inputs.insert(
                handle,
                PendingInput {
                    submitter: input.submitter(),
                    ciphertext,
                },
            );
            handles.push(handle);
        }

        let proof = self
            .inner
            .keys
            .input_proof(&input.ledger(), &input.submitter(), &handles);
        debug!(
            "Encrypted {} value(s) for {} on ledger {}",
            handles.len(),
            input.submitter(),
            input.ledger()
        );

        Ok(EncryptedInputResponse { handles, proof })
    }
}
