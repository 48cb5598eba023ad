use payveil_handle::{Address, HandleError};
use thiserror::Error;

/// Failures reported by an [`AuthorizationSigner`](crate::AuthorizationSigner).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SignerError {
    #[error("user declined the signature request")]
    Declined,

    #[error("signing failed: {0}")]
    Failed(String),
}

/// Decryption authorization errors
#[derive(Debug, Error)]
pub enum AuthorizationError {
    #[error("authorization must name at least one ledger address")]
    EmptyLedgerSet,

    #[error("authorization duration must be positive")]
    InvalidDuration,

    #[error("authorization denied: {0}")]
    Denied(#[from] SignerError),

    #[error("authorization expired at {expired_at}")]
    Expired { expired_at: u64 },

    #[error("authorization starts in the future ({start})")]
    NotYetValid { start: u64 },

    #[error("authorization signature is invalid")]
    InvalidSignature,

    #[error("authorization signer does not own {0}")]
    UserMismatch(Address),

    #[error("ledger {0} is not covered by the authorization")]
    LedgerNotAuthorized(Address),

    #[error("re-encrypted value could not be opened")]
    ReencryptionFailed,

    #[error("encoding failed: {0}")]
    Encoding(String),

    #[error(transparent)]
    Handle(#[from] HandleError),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}
