//! Payveil Handles
//!
//! Data model shared by every payveil component: account/ledger addresses,
//! opaque ciphertext handles, admission proofs and the client-side encrypted
//! input builder that validates plaintexts before they reach a gateway.
//!
//! ```text
//! plaintext ──▶ EncryptedInput (width check) ──▶ Gateway ──▶ (handles, proof)
//!                                                              │
//!                                    Ledger::submit(handle, proof)
//! ```

pub mod address;
pub mod error;
pub mod handle;
pub mod input;

pub use address::Address;
pub use error::HandleError;
pub use handle::{AdmissionProof, CiphertextHandle, ClearValue};
pub use input::{EncryptedInput, EncryptedInputResponse, InputValue, ValueKind};
