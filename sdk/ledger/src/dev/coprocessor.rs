//! Dev Coprocessor
//!
//! Stand-in for the network's confidential compute layer. Ciphertexts are
//! sealed with ChaCha20-Poly1305 under a network-held key; admission proofs are
//! keyed BLAKE3 MACs over the exact (ledger, submitter, handles) they admit.
//!
//! ```text
//! proof = n (1B) || handle_1 .. handle_n || MAC(proof_key, ledger || submitter || n || handles)
//! ```

use std::collections::HashSet;

use chacha20poly1305::{
    ChaCha20Poly1305, Nonce,
    aead::{Aead, KeyInit, OsRng, Payload, rand_core::RngCore},
};
use payveil_handle::{Address, AdmissionProof, CiphertextHandle, ClearValue, ValueKind};

const MAC_LEN: usize = 32;

/// A ciphertext as the network stores it.
#[derive(Debug, Clone)]
pub(crate) struct StoredCiphertext {
    pub ledger: Address,
    pub kind: ValueKind,
    pub nonce: [u8; 12],
    pub sealed: Vec<u8>,
    /// Accounts allowed to decrypt.
    pub acl: HashSet<Address>,
}

pub(crate) struct CoprocessorKeys {
    network_key: [u8; 32],
    proof_key: [u8; 32],
}

impl CoprocessorKeys {
    pub fn generate() -> Self {
        let mut network_key = [0u8; 32];
        let mut proof_key = [0u8; 32];
        OsRng.fill_bytes(&mut network_key);
        OsRng.fill_bytes(&mut proof_key);
        Self {
            network_key,
            proof_key,
        }
    }

    fn aad(ledger: &Address, kind: ValueKind) -> [u8; 21] {
        let mut aad = [0u8; 21];
        aad[..20].copy_from_slice(ledger.as_bytes());
        aad[20] = kind.bits() as u8;
        aad
    }

    pub fn seal(
        &self,
        ledger: Address,
        kind: ValueKind,
        value: u64,
    ) -> Result<StoredCiphertext, String> {
        let cipher = ChaCha20Poly1305::new(&self.network_key.into());
        let mut nonce = [0u8; 12];
        OsRng.fill_bytes(&mut nonce);

        let aad = Self::aad(&ledger, kind);
        let sealed = cipher
            .encrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: &value.to_le_bytes(),
                    aad: &aad,
                },
            )
            .map_err(|_| "sealing failed".to_string())?;

        Ok(StoredCiphertext {
            ledger,
            kind,
            nonce,
            sealed,
            acl: HashSet::new(),
        })
    }

    pub fn unseal(&self, stored: &StoredCiphertext) -> Result<u64, String> {
        let cipher = ChaCha20Poly1305::new(&self.network_key.into());
        let aad = Self::aad(&stored.ledger, stored.kind);
        let plaintext = cipher
            .decrypt(
                Nonce::from_slice(&stored.nonce),
                Payload {
                    msg: &stored.sealed,
                    aad: &aad,
                },
            )
            .map_err(|_| "unsealing failed".to_string())?;

        let raw: [u8; 8] = plaintext
            .as_slice()
            .try_into()
            .map_err(|_| "malformed plaintext".to_string())?;
        Ok(u64::from_le_bytes(raw))
    }

    pub fn clear_value(&self, stored: &StoredCiphertext) -> Result<ClearValue, String> {
        let raw = self.unseal(stored)?;
        Ok(match stored.kind {
            ValueKind::Bool => ClearValue::Bool(raw != 0),
            _ => ClearValue::Uint(raw),
        })
    }

    fn mac(&self, ledger: &Address, submitter: &Address, handles: &[CiphertextHandle]) -> [u8; 32] {
        let mut hasher = blake3::Hasher::new_keyed(&self.proof_key);
        hasher.update(ledger.as_bytes());
        hasher.update(submitter.as_bytes());
        hasher.update(&[handles.len() as u8]);
        for handle in handles {
            hasher.update(handle.as_bytes());
        }
        *hasher.finalize().as_bytes()
    }

    pub fn input_proof(
        &self,
        ledger: &Address,
        submitter: &Address,
        handles: &[CiphertextHandle],
    ) -> AdmissionProof {
        let mut bytes = Vec::with_capacity(1 + handles.len() * CiphertextHandle::LEN + MAC_LEN);
        bytes.push(handles.len() as u8);
        for handle in handles {
            bytes.extend_from_slice(handle.as_bytes());
        }
        bytes.extend_from_slice(&self.mac(ledger, submitter, handles));
        AdmissionProof(bytes)
    }

    /// Checks that `proof` admits `handle` on `ledger` for `submitter`.
    pub fn verify_proof(
        &self,
        ledger: &Address,
        submitter: &Address,
        handle: &CiphertextHandle,
        proof: &AdmissionProof,
    ) -> bool {
        let bytes = proof.as_bytes();
        let Some((&count, rest)) = bytes.split_first() else {
            return false;
        };
        let count = count as usize;
        if rest.len() != count * CiphertextHandle::LEN + MAC_LEN {
            return false;
        }

        let (handle_bytes, mac_bytes) = rest.split_at(count * CiphertextHandle::LEN);
        let handles: Vec<CiphertextHandle> = handle_bytes
            .chunks_exact(CiphertextHandle::LEN)
            .filter_map(|chunk| chunk.try_into().ok().map(CiphertextHandle))
            .collect();
        if !handles.contains(handle) {
            return false;
        }

        let Ok(mac): Result<[u8; 32], _> = mac_bytes.try_into() else {
            return false;
        };
        // blake3::Hash equality is constant time
        blake3::Hash::from(mac) == blake3::Hash::from(self.mac(ledger, submitter, &handles))
    }
}

/// Handle naming a stored ciphertext.
/// Formula: BLAKE3-derive("payveil-handle-v1", chain_id || ledger || kind || nonce || sealed)
pub(crate) fn derive_handle(chain_id: u64, stored: &StoredCiphertext) -> CiphertextHandle {
    let mut hasher = blake3::Hasher::new_derive_key("payveil-handle-v1");
    hasher.update(&chain_id.to_le_bytes());
    hasher.update(stored.ledger.as_bytes());
    hasher.update(&[stored.kind.bits() as u8]);
    hasher.update(&stored.nonce);
    hasher.update(&stored.sealed);
    CiphertextHandle(*hasher.finalize().as_bytes())
}
