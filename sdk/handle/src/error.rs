use thiserror::Error;

use crate::input::ValueKind;

/// Errors raised while building or parsing handle-layer types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HandleError {
    #[error("value {value} does not fit in {kind}")]
    ValueOutOfRange { value: u64, kind: ValueKind },

    #[error("invalid address format: {0}")]
    InvalidAddress(String),

    #[error("invalid handle: {0}")]
    InvalidHandle(String),

    #[error("encrypted input is empty")]
    EmptyInput,

    #[error("malformed clear value encoding")]
    MalformedClearValue,
}
