use chacha20poly1305::aead::OsRng;
use log::{debug, info, warn};
use x25519_dalek::{PublicKey, StaticSecret};

use crate::authorization::{DecryptionAuthorization, LedgerSet};
use crate::cache::{AuthorizationCache, AuthorizationCacheKey, AuthorizationStore};
use crate::error::AuthorizationError;
use crate::signer::AuthorizationSigner;

/// Default validity window of a fresh authorization (10 days).
pub const DEFAULT_AUTHORIZATION_DURATION_SECS: u64 = 10 * 24 * 60 * 60;

/// Renewal policy for freshly signed authorizations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthorizationPolicy {
    duration_secs: u64,
}

impl AuthorizationPolicy {
    pub fn new(duration_secs: u64) -> Result<Self, AuthorizationError> {
        if duration_secs == 0 {
            return Err(AuthorizationError::InvalidDuration);
        }
        Ok(Self { duration_secs })
    }

    pub fn duration_secs(&self) -> u64 {
        self.duration_secs
    }
}

impl Default for AuthorizationPolicy {
    fn default() -> Self {
        Self {
            duration_secs: DEFAULT_AUTHORIZATION_DURATION_SECS,
        }
    }
}

/// Returns a live authorization for `ledgers` owned by `signer`.
///
/// A cached record that is unexpired and authorizes exactly the same set for
/// the same account is returned unchanged without prompting. Otherwise a new
/// ephemeral key is generated, the binding is signed and the record is cached.
/// A declined or failed signature caches nothing.
pub async fn obtain_authorization<S, W>(
    ledgers: &LedgerSet,
    signer: &W,
    cache: &mut AuthorizationCache<S>,
    policy: &AuthorizationPolicy,
    now: u64,
) -> Result<DecryptionAuthorization, AuthorizationError>
where
    S: AuthorizationStore,
    W: AuthorizationSigner,
{
    let user = signer.address();
    let key = AuthorizationCacheKey::derive(ledgers, &user);

    if let Some(cached) = cache.lookup(&key, now)? {
        if cached.matches(ledgers, &user) && cached.is_valid_at(now) {
            debug!("Reusing cached authorization {key} for {user}");
            return Ok(cached);
        }
        warn!("Cached authorization {key} does not match request, replacing");
    }

    let secret = StaticSecret::random_from_rng(OsRng);
    let public = PublicKey::from(&secret);
    let ephemeral_public_key = *public.as_bytes();
    let duration_secs = policy.duration_secs();

    let msg =
        DecryptionAuthorization::binding_message(&ephemeral_public_key, ledgers, now, duration_secs)?;

    info!(
        "Requesting decryption authorization from {user} for {} ledger(s)",
        ledgers.len()
    );
    let signature = signer.sign(&msg).await?;

    let record = DecryptionAuthorization {
        ephemeral_public_key,
        ephemeral_private_key: secret.to_bytes(),
        signature,
        signer_public_key: signer.verifying_key(),
        ledgers: ledgers.as_slice().to_vec(),
        user,
        start_timestamp: now,
        duration_secs,
    };

    cache.insert(key, record.clone(), now)?;
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryStore;
    use crate::signer::LocalSigner;
    use payveil_handle::Address;

    #[test]
    fn test_zero_duration_policy_rejected() {
        assert!(matches!(
            AuthorizationPolicy::new(0),
            Err(AuthorizationError::InvalidDuration)
        ));
        assert_eq!(
            AuthorizationPolicy::default().duration_secs(),
            DEFAULT_AUTHORIZATION_DURATION_SECS
        );
    }

    #[tokio::test]
    async fn test_fresh_authorization_verifies() {
        let signer = LocalSigner::from_seed(&[1u8; 32]);
        let ledgers = LedgerSet::single(Address([9u8; 20]));
        let mut cache = AuthorizationCache::new(MemoryStore::new());
        let policy = AuthorizationPolicy::new(3_600).unwrap();

        let auth = obtain_authorization(&ledgers, &signer, &mut cache, &policy, 1_000)
            .await
            .unwrap();

        assert_eq!(auth.user, signer.address());
        assert_eq!(auth.start_timestamp, 1_000);
        assert_eq!(auth.duration_secs, 3_600);
        assert!(auth.verify(1_000).is_ok());
        assert!(matches!(
            auth.verify(4_600),
            Err(AuthorizationError::Expired { expired_at: 4_600 })
        ));
        assert_eq!(cache.store().len(), 1);
    }

    #[tokio::test]
    async fn test_tampered_authorization_fails_verification() {
        let signer = LocalSigner::from_seed(&[1u8; 32]);
        let ledgers = LedgerSet::single(Address([9u8; 20]));
        let mut cache = AuthorizationCache::new(MemoryStore::new());

        let mut auth = obtain_authorization(
            &ledgers,
            &signer,
            &mut cache,
            &AuthorizationPolicy::default(),
            10,
        )
        .await
        .unwrap();

        auth.ledgers.push(Address([0xff; 20]));
        assert!(matches!(
            auth.verify(10),
            Err(AuthorizationError::InvalidSignature)
        ));
    }
}
