//! Session fingerprint and staleness guard.
//!
//! Every operation captures the (network, account) pair it started under.
//! After each suspension point the capture is compared with the live context;
//! any difference means the result belongs to a context the user has left.

use std::sync::Arc;

use payveil_authorization::AuthorizationSigner;
use payveil_handle::Address;
use serde::{Deserialize, Serialize};

/// The execution context the application currently presents.
#[derive(Debug)]
pub struct SessionContext<W> {
    pub chain_id: Option<u64>,
    pub signer: Option<Arc<W>>,
}

impl<W> SessionContext<W> {
    pub fn new(chain_id: u64, signer: Arc<W>) -> Self {
        Self {
            chain_id: Some(chain_id),
            signer: Some(signer),
        }
    }

    /// No network, no account.
    pub fn disconnected() -> Self {
        Self {
            chain_id: None,
            signer: None,
        }
    }
}

impl<W> Clone for SessionContext<W> {
    fn clone(&self) -> Self {
        Self {
            chain_id: self.chain_id,
            signer: self.signer.clone(),
        }
    }
}

impl<W> Default for SessionContext<W> {
    fn default() -> Self {
        Self::disconnected()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct SessionFingerprint {
    pub network_id: Option<u64>,
    pub account: Option<Address>,
}

impl SessionFingerprint {
    pub fn capture<W: AuthorizationSigner>(context: &SessionContext<W>) -> Self {
        Self {
            network_id: context.chain_id,
            account: context.signer.as_ref().map(|signer| signer.address()),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.network_id.is_some() && self.account.is_some()
    }

    /// True when work started under `self` may still be applied under `current`.
    pub fn still_valid(&self, current: &SessionFingerprint) -> bool {
        self.is_connected() && self == current
    }
}
