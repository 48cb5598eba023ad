//! Result Re-encryption
//!
//! The decryption service never returns plaintexts in the clear: each value is
//! sealed to the authorization's ephemeral x25519 key.
//!
//! ```text
//! 1. Service generates a one-off keypair (spk, ssk)
//! 2. Shared secret = ECDH(ssk, authorization epk)
//! 3. Key = BLAKE3-derive("payveil-reencrypt-v1", shared || spk || epk)
//! 4. Ciphertext = ChaCha20-Poly1305(key, nonce, clear, aad = handle)
//! ```

use chacha20poly1305::{
    ChaCha20Poly1305, Nonce,
    aead::{Aead, KeyInit, OsRng, Payload, rand_core::RngCore},
};
use payveil_handle::{CiphertextHandle, ClearValue};
use serde::{Deserialize, Serialize};
use x25519_dalek::{EphemeralSecret, PublicKey, StaticSecret};

use crate::error::AuthorizationError;

/// A plaintext sealed to an authorization's ephemeral key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReencryptedValue {
    pub handle: CiphertextHandle,
    /// Service-side one-off public key.
    pub sender_public_key: [u8; 32],
    pub nonce: [u8; 12],
    pub ciphertext: Vec<u8>,
}

fn derive_key(shared_secret: &[u8], sender_pk: &[u8; 32], recipient_pk: &[u8; 32]) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new_derive_key("payveil-reencrypt-v1");
    hasher.update(shared_secret);
    hasher.update(sender_pk);
    hasher.update(recipient_pk);
    *hasher.finalize().as_bytes()
}

/// Seals `value` (the plaintext behind `handle`) to `recipient_pk`.
pub fn seal_for(
    recipient_pk: &[u8; 32],
    handle: CiphertextHandle,
    value: &ClearValue,
) -> Result<ReencryptedValue, AuthorizationError> {
    let secret = EphemeralSecret::random_from_rng(OsRng);
    let sender_pk = PublicKey::from(&secret);
    let shared = secret.diffie_hellman(&PublicKey::from(*recipient_pk));

    let key = derive_key(shared.as_bytes(), sender_pk.as_bytes(), recipient_pk);
    let cipher = ChaCha20Poly1305::new(&key.into());

    let mut nonce = [0u8; 12];
    OsRng.fill_bytes(&mut nonce);

    let plaintext = value.to_bytes();
    let ciphertext = cipher
        .encrypt(
            Nonce::from_slice(&nonce),
            Payload {
                msg: &plaintext,
                aad: handle.as_bytes(),
            },
        )
        .map_err(|_| AuthorizationError::ReencryptionFailed)?;

    Ok(ReencryptedValue {
        handle,
        sender_public_key: *sender_pk.as_bytes(),
        nonce,
        ciphertext,
    })
}

pub(crate) fn open_with(
    recipient_sk: &[u8; 32],
    recipient_pk: &[u8; 32],
    sealed: &ReencryptedValue,
) -> Result<ClearValue, AuthorizationError> {
    let secret = StaticSecret::from(*recipient_sk);
    let shared = secret.diffie_hellman(&PublicKey::from(sealed.sender_public_key));

    let key = derive_key(shared.as_bytes(), &sealed.sender_public_key, recipient_pk);
    let cipher = ChaCha20Poly1305::new(&key.into());

    let plaintext = cipher
        .decrypt(
            Nonce::from_slice(&sealed.nonce),
            Payload {
                msg: &sealed.ciphertext,
                aad: sealed.handle.as_bytes(),
            },
        )
        .map_err(|_| AuthorizationError::ReencryptionFailed)?;

    Ok(ClearValue::from_bytes(&plaintext)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keypair() -> ([u8; 32], [u8; 32]) {
        let secret = StaticSecret::random_from_rng(OsRng);
        let public = PublicKey::from(&secret);
        (secret.to_bytes(), *public.as_bytes())
    }

    #[test]
    fn test_seal_open_roundtrip() {
        let (sk, pk) = keypair();
        let handle = CiphertextHandle([5u8; 32]);

        let sealed = seal_for(&pk, handle, &ClearValue::Uint(60_000)).unwrap();
        let opened = open_with(&sk, &pk, &sealed).unwrap();
        assert_eq!(opened, ClearValue::Uint(60_000));
    }

    #[test]
    fn test_wrong_key_fails() {
        let (_, pk) = keypair();
        let (other_sk, other_pk) = keypair();
        let sealed = seal_for(&pk, CiphertextHandle([5u8; 32]), &ClearValue::Bool(true)).unwrap();

        assert!(open_with(&other_sk, &other_pk, &sealed).is_err());
    }

    #[test]
    fn test_handle_is_authenticated() {
        let (sk, pk) = keypair();
        let mut sealed =
            seal_for(&pk, CiphertextHandle([5u8; 32]), &ClearValue::Bool(true)).unwrap();
        sealed.handle = CiphertextHandle([6u8; 32]);

        assert!(matches!(
            open_with(&sk, &pk, &sealed),
            Err(AuthorizationError::ReencryptionFailed)
        ));
    }
}
