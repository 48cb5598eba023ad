use std::sync::atomic::{AtomicUsize, Ordering};

use payveil_authorization::{
    AuthorizationCache, AuthorizationCacheKey, AuthorizationError, AuthorizationPolicy,
    AuthorizationSigner, AuthorizationStore, LedgerSet, LocalSigner, MemoryStore, SignerError,
    obtain_authorization,
};
use payveil_handle::Address;

/// Wraps a local key and counts (or refuses) signature prompts.
struct CountingSigner {
    inner: LocalSigner,
    prompts: AtomicUsize,
    decline: bool,
}

impl CountingSigner {
    fn new(seed: u8) -> Self {
        Self {
            inner: LocalSigner::from_seed(&[seed; 32]),
            prompts: AtomicUsize::new(0),
            decline: false,
        }
    }

    fn declining(seed: u8) -> Self {
        Self {
            decline: true,
            ..Self::new(seed)
        }
    }

    fn prompts(&self) -> usize {
        self.prompts.load(Ordering::SeqCst)
    }
}

impl AuthorizationSigner for CountingSigner {
    fn address(&self) -> Address {
        self.inner.address()
    }

    fn verifying_key(&self) -> [u8; 32] {
        self.inner.verifying_key()
    }

    async fn sign(&self, message: &[u8]) -> Result<Vec<u8>, SignerError> {
        self.prompts.fetch_add(1, Ordering::SeqCst);
        if self.decline {
            return Err(SignerError::Declined);
        }
        self.inner.sign(message).await
    }
}

const LEDGER: Address = Address([0x11; 20]);
const OTHER_LEDGER: Address = Address([0x22; 20]);

fn policy() -> AuthorizationPolicy {
    AuthorizationPolicy::new(600).unwrap()
}

#[tokio::test]
async fn second_request_in_window_is_a_cache_hit() {
    let signer = CountingSigner::new(1);
    let ledgers = LedgerSet::single(LEDGER);
    let mut cache = AuthorizationCache::new(MemoryStore::new());

    let first = obtain_authorization(&ledgers, &signer, &mut cache, &policy(), 1_000)
        .await
        .unwrap();
    let second = obtain_authorization(&ledgers, &signer, &mut cache, &policy(), 1_599)
        .await
        .unwrap();

    assert_eq!(signer.prompts(), 1);
    assert_eq!(first, second);
    assert_eq!(cache.store().len(), 1);
}

#[tokio::test]
async fn expired_authorization_is_resigned() {
    let signer = CountingSigner::new(1);
    let ledgers = LedgerSet::single(LEDGER);
    let mut cache = AuthorizationCache::new(MemoryStore::new());

    let first = obtain_authorization(&ledgers, &signer, &mut cache, &policy(), 1_000)
        .await
        .unwrap();
    let renewed = obtain_authorization(&ledgers, &signer, &mut cache, &policy(), 1_600)
        .await
        .unwrap();

    assert_eq!(signer.prompts(), 2);
    assert_ne!(first.ephemeral_public_key, renewed.ephemeral_public_key);
    assert_eq!(renewed.start_timestamp, 1_600);

    // The renewed record replaced the expired one at the same key.
    let key = AuthorizationCacheKey::derive(&ledgers, &signer.address());
    assert_eq!(cache.store().len(), 1);
    assert_eq!(cache.store().get(&key).unwrap(), Some(renewed));
}

#[tokio::test]
async fn different_ledger_set_gets_its_own_entry() {
    let signer = CountingSigner::new(1);
    let mut cache = AuthorizationCache::new(MemoryStore::new());

    let single = LedgerSet::single(LEDGER);
    let both = LedgerSet::new([OTHER_LEDGER, LEDGER]).unwrap();

    let a = obtain_authorization(&single, &signer, &mut cache, &policy(), 10)
        .await
        .unwrap();
    let b = obtain_authorization(&both, &signer, &mut cache, &policy(), 10)
        .await
        .unwrap();

    assert_eq!(signer.prompts(), 2);
    assert_ne!(a.ephemeral_public_key, b.ephemeral_public_key);
    assert_eq!(b.ledgers, vec![LEDGER, OTHER_LEDGER]);
    assert_eq!(cache.store().len(), 2);
}

#[tokio::test]
async fn other_account_never_reuses_entry() {
    let alice = CountingSigner::new(1);
    let bob = CountingSigner::new(2);
    let ledgers = LedgerSet::single(LEDGER);
    let mut cache = AuthorizationCache::new(MemoryStore::new());

    let a = obtain_authorization(&ledgers, &alice, &mut cache, &policy(), 10)
        .await
        .unwrap();
    let b = obtain_authorization(&ledgers, &bob, &mut cache, &policy(), 10)
        .await
        .unwrap();

    assert_eq!(alice.prompts(), 1);
    assert_eq!(bob.prompts(), 1);
    assert_eq!(a.user, alice.address());
    assert_eq!(b.user, bob.address());
}

#[tokio::test]
async fn declined_signature_caches_nothing() {
    let signer = CountingSigner::declining(3);
    let ledgers = LedgerSet::single(LEDGER);
    let mut cache = AuthorizationCache::new(MemoryStore::new());

    let result = obtain_authorization(&ledgers, &signer, &mut cache, &policy(), 10).await;

    assert!(matches!(
        result,
        Err(AuthorizationError::Denied(SignerError::Declined))
    ));
    assert!(cache.store().is_empty());
}
