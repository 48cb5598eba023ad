//! Authorization Cache
//!
//! Keyed store of decryption authorizations. The backing storage is a
//! capability ([`AuthorizationStore`]); expiry is enforced on top of it by
//! [`AuthorizationCache`], which removes expired records when it meets them
//! and sweeps the rest whenever a new record is written.

use std::collections::HashMap;
use std::fmt;

use anyhow::Result;
use log::debug;
use payveil_handle::Address;

use crate::authorization::{AUTHORIZATION_SCHEME_VERSION, DecryptionAuthorization, LedgerSet};

/// Deterministic cache key.
/// Formula: BLAKE3-derive("payveil-authorization-cache-v1", version || user || n || ledgers)
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AuthorizationCacheKey(pub [u8; 32]);

impl AuthorizationCacheKey {
    pub fn derive(ledgers: &LedgerSet, user: &Address) -> Self {
        let mut hasher = blake3::Hasher::new_derive_key("payveil-authorization-cache-v1");
        hasher.update(&[AUTHORIZATION_SCHEME_VERSION]);
        hasher.update(user.as_bytes());
        hasher.update(&(ledgers.len() as u32).to_le_bytes());
        for ledger in ledgers.as_slice() {
            hasher.update(ledger.as_bytes());
        }
        Self(*hasher.finalize().as_bytes())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for AuthorizationCacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for AuthorizationCacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AuthorizationCacheKey({self})")
    }
}

/// Backing storage for cached authorizations.
pub trait AuthorizationStore: Send {
    /// Retrieve a record. Returns `None` if not found.
    fn get(&self, key: &AuthorizationCacheKey) -> Result<Option<DecryptionAuthorization>>;

    /// Insert or overwrite a record.
    fn put(&mut self, key: AuthorizationCacheKey, record: DecryptionAuthorization) -> Result<()>;

    fn remove(&mut self, key: &AuthorizationCacheKey) -> Result<()>;

    fn keys(&self) -> Result<Vec<AuthorizationCacheKey>>;
}

/// Process-local store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: HashMap<AuthorizationCacheKey, DecryptionAuthorization>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl AuthorizationStore for MemoryStore {
    fn get(&self, key: &AuthorizationCacheKey) -> Result<Option<DecryptionAuthorization>> {
        Ok(self.records.get(key).cloned())
    }

    fn put(&mut self, key: AuthorizationCacheKey, record: DecryptionAuthorization) -> Result<()> {
        self.records.insert(key, record);
        Ok(())
    }

    fn remove(&mut self, key: &AuthorizationCacheKey) -> Result<()> {
        self.records.remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<AuthorizationCacheKey>> {
        Ok(self.records.keys().copied().collect())
    }
}

/// Expiry-aware view over an [`AuthorizationStore`].
#[derive(Debug, Default)]
pub struct AuthorizationCache<S> {
    store: S,
}

impl<S: AuthorizationStore> AuthorizationCache<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Returns the live record at `key`. An expired record is deleted and
    /// reported as absent.
    pub fn lookup(
        &mut self,
        key: &AuthorizationCacheKey,
        now: u64,
    ) -> Result<Option<DecryptionAuthorization>> {
        match self.store.get(key)? {
            Some(record) if record.is_expired_at(now) => {
                debug!("Dropping expired authorization {key}");
                self.store.remove(key)?;
                Ok(None)
            }
            other => Ok(other),
        }
    }

    /// Stores `record` at `key`, reclaiming any other expired entries first.
    pub fn insert(
        &mut self,
        key: AuthorizationCacheKey,
        record: DecryptionAuthorization,
        now: u64,
    ) -> Result<()> {
        let reclaimed = self.purge_expired(now)?;
        if reclaimed > 0 {
            debug!("Reclaimed {reclaimed} expired authorizations");
        }
        self.store.put(key, record)
    }

    /// Removes every expired record; returns how many were dropped.
    pub fn purge_expired(&mut self, now: u64) -> Result<usize> {
        let mut removed = 0;
        for key in self.store.keys()? {
            let expired = self
                .store
                .get(&key)?
                .is_some_and(|record| record.is_expired_at(now));
            if expired {
                self.store.remove(&key)?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(user: Address, start: u64, duration: u64) -> DecryptionAuthorization {
        DecryptionAuthorization {
            ephemeral_public_key: [1u8; 32],
            ephemeral_private_key: [2u8; 32],
            signature: vec![3u8; 64],
            signer_public_key: [4u8; 32],
            ledgers: vec![Address([9u8; 20])],
            user,
            start_timestamp: start,
            duration_secs: duration,
        }
    }

    #[test]
    fn test_key_ignores_input_order() {
        let user = Address([1u8; 20]);
        let a = LedgerSet::new([Address([2u8; 20]), Address([3u8; 20])]).unwrap();
        let b = LedgerSet::new([Address([3u8; 20]), Address([2u8; 20])]).unwrap();
        assert_eq!(
            AuthorizationCacheKey::derive(&a, &user),
            AuthorizationCacheKey::derive(&b, &user)
        );
    }

    #[test]
    fn test_key_separates_users_and_sets() {
        let set = LedgerSet::single(Address([2u8; 20]));
        let other_set = LedgerSet::new([Address([2u8; 20]), Address([3u8; 20])]).unwrap();
        let alice = Address([1u8; 20]);
        let bob = Address([5u8; 20]);

        let base = AuthorizationCacheKey::derive(&set, &alice);
        assert_ne!(base, AuthorizationCacheKey::derive(&set, &bob));
        assert_ne!(base, AuthorizationCacheKey::derive(&other_set, &alice));
    }

    #[test]
    fn test_expired_lookup_removes_entry() {
        let mut cache = AuthorizationCache::new(MemoryStore::new());
        let key = AuthorizationCacheKey([7u8; 32]);
        cache.insert(key, record(Address([1u8; 20]), 100, 10), 100).unwrap();

        assert!(cache.lookup(&key, 109).unwrap().is_some());
        assert!(cache.lookup(&key, 110).unwrap().is_none());
        assert!(cache.store().is_empty());
    }

    #[test]
    fn test_insert_sweeps_other_expired_entries() {
        let mut cache = AuthorizationCache::new(MemoryStore::new());
        let stale = AuthorizationCacheKey([1u8; 32]);
        let live = AuthorizationCacheKey([2u8; 32]);
        let fresh = AuthorizationCacheKey([3u8; 32]);

        cache.insert(stale, record(Address([1u8; 20]), 0, 10), 0).unwrap();
        cache.insert(live, record(Address([2u8; 20]), 0, 1_000), 0).unwrap();
        assert_eq!(cache.store().len(), 2);

        cache.insert(fresh, record(Address([3u8; 20]), 50, 10), 50).unwrap();

        let mut keys = cache.store().keys().unwrap();
        keys.sort();
        assert_eq!(keys, vec![live, fresh]);
    }
}
