use payveil_authorization::AuthorizationError;
use payveil_handle::{CiphertextHandle, HandleError};
use thiserror::Error;

/// Errors surfaced by a confidential ledger.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// The caller has no registered value.
    #[error("{0}")]
    NotSubmitted(String),

    /// The caller is not a party to the requested result.
    #[error("{0}")]
    Unauthorized(String),

    /// The call reverted; the reason is the ledger's own string.
    #[error("{0}")]
    Rejected(String),

    #[error("unknown transaction {0}")]
    UnknownTransaction(String),

    #[error("ledger unavailable: {0}")]
    Unavailable(String),
}

/// Errors surfaced by an encryption gateway.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("encryption backend not initialized for chain {chain_id}")]
    EncryptionUnavailable { chain_id: u64 },

    #[error(transparent)]
    Input(#[from] HandleError),

    #[error("encryption failed: {0}")]
    Failed(String),
}

/// Errors surfaced by a decryption service.
#[derive(Debug, Error)]
pub enum DecryptionError {
    #[error(transparent)]
    Authorization(#[from] AuthorizationError),

    #[error("{user} is not allowed to decrypt {handle}")]
    Unauthorized {
        handle: CiphertextHandle,
        user: String,
    },

    #[error("unknown handle {0}")]
    UnknownHandle(CiphertextHandle),

    #[error("the empty handle cannot be decrypted")]
    ZeroHandle,

    #[error("decryption failed: {0}")]
    Failed(String),
}
