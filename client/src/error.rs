use payveil_authorization::AuthorizationError;
use payveil_handle::HandleError;
use payveil_ledger::{DecryptionError, GatewayError, LedgerError, TxHash};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure categories surfaced to the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ValueOutOfRange,
    InvalidAddress,
    EncryptionUnavailable,
    AuthorizationDenied,
    LedgerRejected,
    NotSubmitted,
    Unauthorized,
    DecryptionFailed,
    Stale,
    Internal,
}

/// Everything that can go wrong inside one operation.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Input(#[from] HandleError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Authorization(#[from] AuthorizationError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Decryption(#[from] DecryptionError),

    #[error("transaction {0} reverted")]
    Reverted(TxHash),

    #[error("decryption service returned no value for the requested handle")]
    MissingResult,

    /// The network or account changed while the operation was suspended.
    #[error("session context changed")]
    Stale,
}

impl ClientError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ClientError::Input(e) => input_kind(e),
            ClientError::Gateway(GatewayError::Input(e)) => input_kind(e),
            ClientError::Gateway(_) => ErrorKind::EncryptionUnavailable,
            ClientError::Authorization(e) => authorization_kind(e),
            ClientError::Ledger(LedgerError::NotSubmitted(_)) => ErrorKind::NotSubmitted,
            ClientError::Ledger(LedgerError::Unauthorized(_)) => ErrorKind::Unauthorized,
            ClientError::Ledger(_) | ClientError::Reverted(_) => ErrorKind::LedgerRejected,
            ClientError::Decryption(DecryptionError::Authorization(e)) => authorization_kind(e),
            ClientError::Decryption(DecryptionError::Unauthorized { .. }) => {
                ErrorKind::Unauthorized
            }
            ClientError::Decryption(_) | ClientError::MissingResult => ErrorKind::DecryptionFailed,
            ClientError::Stale => ErrorKind::Stale,
        }
    }
}

fn input_kind(error: &HandleError) -> ErrorKind {
    match error {
        HandleError::ValueOutOfRange { .. } => ErrorKind::ValueOutOfRange,
        HandleError::InvalidAddress(_) => ErrorKind::InvalidAddress,
        _ => ErrorKind::Internal,
    }
}

fn authorization_kind(error: &AuthorizationError) -> ErrorKind {
    match error {
        AuthorizationError::ReencryptionFailed => ErrorKind::DecryptionFailed,
        AuthorizationError::Storage(_) | AuthorizationError::Encoding(_) => ErrorKind::Internal,
        _ => ErrorKind::AuthorizationDenied,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use payveil_authorization::SignerError;
    use payveil_handle::{CiphertextHandle, ValueKind};

    #[test]
    fn test_error_kinds() {
        let out_of_range = ClientError::from(HandleError::ValueOutOfRange {
            value: 1 << 40,
            kind: ValueKind::U32,
        });
        assert_eq!(out_of_range.kind(), ErrorKind::ValueOutOfRange);

        let gateway = ClientError::from(GatewayError::EncryptionUnavailable { chain_id: 1 });
        assert_eq!(gateway.kind(), ErrorKind::EncryptionUnavailable);

        let denied = ClientError::from(AuthorizationError::Denied(SignerError::Declined));
        assert_eq!(denied.kind(), ErrorKind::AuthorizationDenied);

        let rejected = ClientError::from(LedgerError::Rejected("out of gas".into()));
        assert_eq!(rejected.kind(), ErrorKind::LedgerRejected);
        assert_eq!(rejected.to_string(), "out of gas");

        let not_party = ClientError::from(DecryptionError::Unauthorized {
            handle: CiphertextHandle::ZERO,
            user: "0x00".into(),
        });
        assert_eq!(not_party.kind(), ErrorKind::Unauthorized);
        assert_eq!(ClientError::Stale.kind(), ErrorKind::Stale);
    }
}
