use std::sync::atomic::Ordering;

use log::debug;
use payveil_authorization::{
    AuthorizationError, DecryptionAuthorization, ReencryptedValue, seal_for,
};

use super::DevNetwork;
use crate::api::DecryptionService;
use crate::error::DecryptionError;
use crate::types::DecryptionRequest;

impl DecryptionService for DevNetwork {
    async fn user_decrypt(
        &self,
        requests: &[DecryptionRequest],
        authorization: &DecryptionAuthorization,
    ) -> Result<Vec<ReencryptedValue>, DecryptionError> {
        self.inner.decryptions.fetch_add(1, Ordering::SeqCst);
        authorization.verify(self.inner.clock.now())?;

        let mut results = Vec::with_capacity(requests.len());
        for request in requests {
            if request.handle.is_zero() {
                return Err(DecryptionError::ZeroHandle);
            }
            if !authorization.covers(&request.ledger) {
                return Err(AuthorizationError::LedgerNotAuthorized(request.ledger).into());
            }

            let clear = {
                let stored = self
                    .inner
                    .ciphertexts
                    .get(&request.handle)
                    .filter(|stored| stored.ledger == request.ledger)
                    .ok_or(DecryptionError::UnknownHandle(request.handle))?;
                if !stored.acl.contains(&authorization.user) {
                    return Err(DecryptionError::Unauthorized {
                        handle: request.handle,
                        user: authorization.user.to_string(),
                    });
                }
                self.inner
                    .keys
                    .clear_value(&stored)
                    .map_err(DecryptionError::Failed)?
            };

            results.push(seal_for(
                &authorization.ephemeral_public_key,
                request.handle,
                &clear,
            )?);
        }

        debug!(
            "Re-encrypted {} value(s) for {}",
            results.len(),
            authorization.user
        );
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use payveil_authorization::{
        AuthorizationCache, AuthorizationPolicy, AuthorizationSigner, LedgerSet, LocalSigner,
        ManualClock, MemoryStore, obtain_authorization,
    };
    use payveil_handle::{Address, ClearValue, EncryptedInput};

    use super::*;
    use crate::api::{ConfidentialLedger, EncryptionGateway};

    const CHAIN: u64 = 31337;
    const NOW: u64 = 1_700_000_000;

    async fn authorize(signer: &LocalSigner, ledger: Address) -> DecryptionAuthorization {
        let mut cache = AuthorizationCache::new(MemoryStore::new());
        obtain_authorization(
            &LedgerSet::single(ledger),
            signer,
            &mut cache,
            &AuthorizationPolicy::default(),
            NOW,
        )
        .await
        .unwrap()
    }

    async fn setup() -> (DevNetwork, Address, LocalSigner, LocalSigner) {
        let network = DevNetwork::with_clock(CHAIN, Arc::new(ManualClock::new(NOW)));
        let ledger = network.deploy_ledger();
        let alice = LocalSigner::generate();
        let bob = LocalSigner::generate();

        for (signer, value) in [(&alice, 60_000), (&bob, 50_000)] {
            let mut input = EncryptedInput::new(ledger, signer.address());
            input.add32(value).unwrap();
            let response = network.encrypt(CHAIN, &input).await.unwrap();
            network
                .submit(ledger, signer.address(), response.first().unwrap(), &response.proof)
                .await
                .unwrap();
        }
        (network, ledger, alice, bob)
    }

    #[tokio::test]
    async fn test_owner_decrypts_own_value() {
        let (network, ledger, alice, _) = setup().await;
        let handle = network.get_own_value(ledger, alice.address()).await.unwrap();
        let authorization = authorize(&alice, ledger).await;

        let sealed = network
            .user_decrypt(&[DecryptionRequest { handle, ledger }], &authorization)
            .await
            .unwrap();
        assert_eq!(authorization.open(&sealed[0]).unwrap(), ClearValue::Uint(60_000));
        assert_eq!(network.decryption_count(), 1);
    }

    #[tokio::test]
    async fn test_other_account_cannot_decrypt() {
        let (network, ledger, alice, bob) = setup().await;
        let handle = network.get_own_value(ledger, alice.address()).await.unwrap();
        let authorization = authorize(&bob, ledger).await;

        let err = network
            .user_decrypt(&[DecryptionRequest { handle, ledger }], &authorization)
            .await
            .unwrap_err();
        assert!(matches!(err, DecryptionError::Unauthorized { .. }));
    }

    #[tokio::test]
    async fn test_both_parties_decrypt_comparison() {
        let (network, ledger, alice, bob) = setup().await;
        network
            .request_comparison(ledger, alice.address(), bob.address())
            .await
            .unwrap();
        let handle = network
            .get_comparison_result(ledger, alice.address(), alice.address(), bob.address())
            .await
            .unwrap();

        for signer in [&alice, &bob] {
            let authorization = authorize(signer, ledger).await;
            let sealed = network
                .user_decrypt(&[DecryptionRequest { handle, ledger }], &authorization)
                .await
                .unwrap();
            assert_eq!(authorization.open(&sealed[0]).unwrap(), ClearValue::Bool(true));
        }
    }

    #[tokio::test]
    async fn test_uncovered_ledger_and_zero_handle() {
        let (network, ledger, alice, _) = setup().await;
        let handle = network.get_own_value(ledger, alice.address()).await.unwrap();
        let other_ledger = network.deploy_ledger();
        let authorization = authorize(&alice, other_ledger).await;

        let err = network
            .user_decrypt(&[DecryptionRequest { handle, ledger }], &authorization)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DecryptionError::Authorization(AuthorizationError::LedgerNotAuthorized(_))
        ));

        let err = network
            .user_decrypt(
                &[DecryptionRequest {
                    handle: payveil_handle::CiphertextHandle::ZERO,
                    ledger: other_ledger,
                }],
                &authorization,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DecryptionError::ZeroHandle));
    }

    #[tokio::test]
    async fn test_expired_authorization_refused() {
        let clock = ManualClock::new(NOW);
        let network = DevNetwork::with_clock(CHAIN, Arc::new(clock.clone()));
        let ledger = network.deploy_ledger();
        let alice = LocalSigner::generate();
        let authorization = authorize(&alice, ledger).await;

        clock.advance(authorization.duration_secs);
        let err = network
            .user_decrypt(&[], &authorization)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DecryptionError::Authorization(AuthorizationError::Expired { .. })
        ));
    }
}
