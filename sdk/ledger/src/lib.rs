//! Payveil Ledger Contracts
//!
//! The three external collaborators a payveil client talks to, expressed as
//! traits, plus [`dev::DevNetwork`], an in-process network implementing all of
//! them for local runs and tests.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  EncryptionGateway      ConfidentialLedger      DecryptionService │
//! │  plaintext → handle     submit / compare        handle → sealed   │
//! │  + admission proof      ACL-guarded results     clear value       │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod dev;
pub mod error;
pub mod types;

pub use api::{ConfidentialLedger, DecryptionService, EncryptionGateway};
pub use dev::DevNetwork;
pub use error::{DecryptionError, GatewayError, LedgerError};
pub use types::{DecryptionRequest, PendingTransaction, TransactionReceipt, TxHash};
