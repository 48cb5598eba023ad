//! Payveil Client
//!
//! Client-side core of a confidential salary comparison: one [`Session`] per
//! application instance, driven by user intents and a live
//! [`SessionContext`] (network + account) supplied through a watch channel.
//!
//! ```text
//! ┌──────────────────────────── Session ────────────────────────────┐
//! │  submit_value ─┐                                                │
//! │  request_comparison ─┐     ┌──────────────┐   ┌──────────────┐  │
//! │  decrypt_value ──────┼───▶ │ begin / guard│──▶│ SessionState │  │
//! │  decrypt_comparison ─┘     └──────┬───────┘   └──────────────┘  │
//! │                                   ▼                             │
//! │       EncryptionGateway   ConfidentialLedger   DecryptionService│
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod guard;
pub mod registry;
pub mod session;
pub mod state;
pub mod status;

pub use error::{ClientError, ErrorKind};
pub use guard::{SessionContext, SessionFingerprint};
pub use registry::{Deployment, DeploymentRegistry};
pub use session::Session;
pub use state::{OperationKind, OperationRecord, Outcome, Records, SessionSnapshot};
