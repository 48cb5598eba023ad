use std::collections::HashMap;

use payveil_handle::Address;
use serde::{Deserialize, Serialize};

/// One deployed ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deployment {
    pub chain_id: u64,
    pub address: Address,
    pub chain_name: String,
}

/// Ledger address per chain id.
#[derive(Debug, Clone, Default)]
pub struct DeploymentRegistry {
    by_chain: HashMap<u64, Deployment>,
}

impl DeploymentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces the deployment for its chain.
    pub fn register(&mut self, deployment: Deployment) -> &mut Self {
        self.by_chain.insert(deployment.chain_id, deployment);
        self
    }

    pub fn resolve(&self, chain_id: u64) -> Option<&Deployment> {
        self.by_chain.get(&chain_id)
    }

    pub fn len(&self) -> usize {
        self.by_chain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_chain.is_empty()
    }
}

impl FromIterator<Deployment> for DeploymentRegistry {
    fn from_iter<I: IntoIterator<Item = Deployment>>(iter: I) -> Self {
        let mut registry = Self::new();
        for deployment in iter {
            registry.register(deployment);
        }
        registry
    }
}
