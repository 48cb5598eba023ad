//! Payveil Decryption Authorization
//!
//! A decryption authorization is a short-lived credential that lets its holder
//! ask the decryption service for plaintexts of handles living on a named set
//! of ledgers. It pairs a fresh x25519 ephemeral key (results are re-encrypted
//! to it) with the account's Ed25519 signature over the binding.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                 obtain_authorization(ledgers, signer)            │
//! │                                                                  │
//! │  cache key = H(version || user || sorted ledgers)                │
//! │        │                                                         │
//! │        ├── hit, unexpired, same set ──▶ reuse (no prompt)        │
//! │        │                                                         │
//! │        └── miss / expired ──▶ ephemeral keypair                  │
//! │                                 │                                │
//! │                                 ▼                                │
//! │                         signer.sign(binding) ──▶ cache.put       │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Signing is interactive and costly, so the cache is the whole point: as
//! long as the account and ledger set stay the same, one signature serves
//! every decryption inside the validity window.

pub mod authorization;
pub mod cache;
pub mod clock;
pub mod error;
pub mod obtain;
pub mod reencrypt;
#[cfg(feature = "rocksdb")]
pub mod rocks;
pub mod signer;

pub use authorization::{AUTHORIZATION_SCHEME_VERSION, DecryptionAuthorization, LedgerSet};
pub use cache::{AuthorizationCache, AuthorizationCacheKey, AuthorizationStore, MemoryStore};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{AuthorizationError, SignerError};
pub use obtain::{AuthorizationPolicy, DEFAULT_AUTHORIZATION_DURATION_SECS, obtain_authorization};
pub use reencrypt::{ReencryptedValue, seal_for};
#[cfg(feature = "rocksdb")]
pub use rocks::RocksDbStore;
pub use signer::{AuthorizationSigner, LocalSigner};
