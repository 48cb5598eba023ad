use std::fmt;
use std::future::Future;

use chacha20poly1305::aead::rand_core::{OsRng, RngCore};
use ed25519_dalek::{Signer, SigningKey};
use payveil_handle::Address;

use crate::error::SignerError;

/// The account-side effect of creating an authorization.
///
/// In a wallet this prompts the user; `sign` is a suspension point and may be
/// declined.
pub trait AuthorizationSigner: Send + Sync {
    /// Address of the account that will sign.
    fn address(&self) -> Address;

    /// Ed25519 verifying key matching [`address`](Self::address).
    fn verifying_key(&self) -> [u8; 32];

    /// Signs the authorization binding.
    fn sign(&self, message: &[u8]) -> impl Future<Output = Result<Vec<u8>, SignerError>> + Send;
}

/// A non-interactive signer holding its key in memory.
/// NEVER expose this struct's internals.
pub struct LocalSigner {
    signing_key: SigningKey,
}

impl LocalSigner {
    /// Generates a fresh random account.
    pub fn generate() -> Self {
        let mut seed = [0u8; 32];
        OsRng.fill_bytes(&mut seed);
        Self::from_seed(&seed)
    }

    /// Reconstructs an account from a 32-byte seed.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(seed),
        }
    }
}

impl AuthorizationSigner for LocalSigner {
    fn address(&self) -> Address {
        Address::from_verifying_key(&self.verifying_key())
    }

    fn verifying_key(&self) -> [u8; 32] {
        self.signing_key.verifying_key().to_bytes()
    }

    async fn sign(&self, message: &[u8]) -> Result<Vec<u8>, SignerError> {
        Ok(self.signing_key.sign(message).to_bytes().to_vec())
    }
}

impl fmt::Debug for LocalSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalSigner")
            .field("address", &self.address())
            .finish_non_exhaustive()
    }
}
