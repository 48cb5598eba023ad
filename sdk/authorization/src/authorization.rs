use std::fmt;

use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use payveil_handle::{Address, ClearValue};
use serde::{Deserialize, Serialize};
use wincode::{SchemaRead, SchemaWrite};

use crate::error::AuthorizationError;
use crate::reencrypt::{ReencryptedValue, open_with};

/// Version of the ephemeral-key scheme; part of every cache key and binding.
pub const AUTHORIZATION_SCHEME_VERSION: u8 = 1;

/// Domain separator prepended to the signed binding.
const BINDING_DOMAIN: &[u8] = b"payveil-user-decrypt-v1";

/// Sorted, deduplicated, non-empty set of ledger addresses.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<Address>", into = "Vec<Address>")]
pub struct LedgerSet(Vec<Address>);

impl TryFrom<Vec<Address>> for LedgerSet {
    type Error = AuthorizationError;

    fn try_from(ledgers: Vec<Address>) -> Result<Self, Self::Error> {
        Self::new(ledgers)
    }
}

impl From<LedgerSet> for Vec<Address> {
    fn from(set: LedgerSet) -> Self {
        set.0
    }
}

impl LedgerSet {
    pub fn new(ledgers: impl IntoIterator<Item = Address>) -> Result<Self, AuthorizationError> {
        let mut ledgers: Vec<Address> = ledgers.into_iter().collect();
        ledgers.sort();
        ledgers.dedup();
        if ledgers.is_empty() {
            return Err(AuthorizationError::EmptyLedgerSet);
        }
        Ok(Self(ledgers))
    }

    pub fn single(ledger: Address) -> Self {
        Self(vec![ledger])
    }

    pub fn as_slice(&self) -> &[Address] {
        &self.0
    }

    pub fn contains(&self, ledger: &Address) -> bool {
        self.0.binary_search(ledger).is_ok()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// The structure the account signs.
#[derive(SchemaWrite)]
struct AuthorizationBinding {
    version: u8,
    ephemeral_public_key: [u8; 32],
    ledgers: Vec<Address>,
    start_timestamp: u64,
    duration_secs: u64,
}

/// A signed, time-bounded credential to decrypt handles of the named ledgers.
#[derive(Clone, PartialEq, Eq, SchemaRead, SchemaWrite)]
pub struct DecryptionAuthorization {
    pub ephemeral_public_key: [u8; 32],
    /// x25519 secret; results are re-encrypted to the matching public key.
    pub ephemeral_private_key: [u8; 32],
    /// Ed25519 signature over the binding.
    pub signature: Vec<u8>,
    /// Ed25519 verifying key of the signing account.
    pub signer_public_key: [u8; 32],
    /// Sorted, deduplicated.
    pub ledgers: Vec<Address>,
    pub user: Address,
    pub start_timestamp: u64,
    pub duration_secs: u64,
}

impl DecryptionAuthorization {
    /// Bytes the owning account signs.
    ///
    /// Layout: `domain || wincode(version, epk, ledgers, start, duration)`
    pub fn binding_message(
        ephemeral_public_key: &[u8; 32],
        ledgers: &LedgerSet,
        start_timestamp: u64,
        duration_secs: u64,
    ) -> Result<Vec<u8>, AuthorizationError> {
        let binding = AuthorizationBinding {
            version: AUTHORIZATION_SCHEME_VERSION,
            ephemeral_public_key: *ephemeral_public_key,
            ledgers: ledgers.as_slice().to_vec(),
            start_timestamp,
            duration_secs,
        };
        let encoded = wincode::serialize(&binding)
            .map_err(|e| AuthorizationError::Encoding(e.to_string()))?;

        let mut msg = Vec::with_capacity(BINDING_DOMAIN.len() + encoded.len());
        msg.extend_from_slice(BINDING_DOMAIN);
        msg.extend_from_slice(&encoded);
        Ok(msg)
    }

    /// First second at which the authorization is no longer usable.
    pub fn expires_at(&self) -> u64 {
        self.start_timestamp.saturating_add(self.duration_secs)
    }

    /// `start <= now < start + duration`
    pub fn is_valid_at(&self, now: u64) -> bool {
        self.duration_secs > 0 && now >= self.start_timestamp && now < self.expires_at()
    }

    pub fn is_expired_at(&self, now: u64) -> bool {
        now >= self.expires_at()
    }

    pub fn covers(&self, ledger: &Address) -> bool {
        self.ledgers.binary_search(ledger).is_ok()
    }

    /// True when this record authorizes exactly `ledgers` for `user`.
    pub fn matches(&self, ledgers: &LedgerSet, user: &Address) -> bool {
        self.user == *user && self.ledgers.as_slice() == ledgers.as_slice()
    }

    /// Full check performed by a decryption service before honouring a request.
    pub fn verify(&self, now: u64) -> Result<(), AuthorizationError> {
        if self.duration_secs == 0 {
            return Err(AuthorizationError::InvalidDuration);
        }
        let ledgers = LedgerSet::new(self.ledgers.iter().copied())?;
        if ledgers.as_slice() != self.ledgers.as_slice() {
            return Err(AuthorizationError::InvalidSignature);
        }
        if now < self.start_timestamp {
            return Err(AuthorizationError::NotYetValid {
                start: self.start_timestamp,
            });
        }
        if self.is_expired_at(now) {
            return Err(AuthorizationError::Expired {
                expired_at: self.expires_at(),
            });
        }
        if Address::from_verifying_key(&self.signer_public_key) != self.user {
            return Err(AuthorizationError::UserMismatch(self.user));
        }

        let msg = Self::binding_message(
            &self.ephemeral_public_key,
            &ledgers,
            self.start_timestamp,
            self.duration_secs,
        )?;
        let key = VerifyingKey::from_bytes(&self.signer_public_key)
            .map_err(|_| AuthorizationError::InvalidSignature)?;
        let signature = Signature::from_slice(&self.signature)
            .map_err(|_| AuthorizationError::InvalidSignature)?;
        key.verify(&msg, &signature)
            .map_err(|_| AuthorizationError::InvalidSignature)
    }

    /// Decrypts a value the decryption service re-encrypted to our ephemeral key.
    pub fn open(&self, sealed: &ReencryptedValue) -> Result<ClearValue, AuthorizationError> {
        open_with(&self.ephemeral_private_key, &self.ephemeral_public_key, sealed)
    }
}

impl fmt::Debug for DecryptionAuthorization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecryptionAuthorization")
            .field("ephemeral_public_key", &hex::encode(self.ephemeral_public_key))
            .field("user", &self.user)
            .field("ledgers", &self.ledgers)
            .field("start_timestamp", &self.start_timestamp)
            .field("duration_secs", &self.duration_secs)
            .finish_non_exhaustive() // Hides the ephemeral private key
    }
}
