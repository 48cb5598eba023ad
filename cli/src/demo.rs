//! In-process walkthrough of the salary comparison flow.
//!
//! Spins up a [`DevNetwork`], deploys one ledger and drives one [`Session`]
//! per participant through submit, decrypt and compare.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use log::{info, warn};
use payveil_authorization::{
    AuthorizationCacheKey, AuthorizationPolicy, AuthorizationSigner, AuthorizationStore,
    DecryptionAuthorization, LocalSigner, MemoryStore,
};
use payveil_client::{
    Deployment, DeploymentRegistry, Outcome, Session, SessionContext, SessionSnapshot,
};
use payveil_config::{AuthorizationStoreKind, PayveilConfig};
use payveil_handle::Address;
use payveil_ledger::DevNetwork;
use tokio::sync::watch;

#[derive(Debug, Clone)]
pub struct DemoConfig {
    pub alice_value: u64,
    pub bob_value: u64,
    /// Print the final snapshots as JSON
    pub json: bool,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            alice_value: 60_000,
            bob_value: 50_000,
            json: false,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct BatchConfig {
    /// First value belongs to the requester, the rest to counterparts
    pub values: Vec<u64>,
    pub json: bool,
}

// ============================================================================
// Authorization store selection
// ============================================================================

/// Store backend picked from `[authorization]`.
pub enum CliStore {
    Memory(MemoryStore),
    #[cfg(feature = "rocksdb")]
    RocksDb(payveil_authorization::RocksDbStore),
}

impl CliStore {
    fn open(config: &PayveilConfig, participant: &str) -> Result<Self> {
        match config.authorization.store {
            AuthorizationStoreKind::Memory => Ok(Self::Memory(MemoryStore::new())),
            #[cfg(feature = "rocksdb")]
            AuthorizationStoreKind::Rocksdb => {
                let path = PathBuf::from(&config.authorization.store_path).join(participant);
                info!("Opening authorization store at {}", path.display());
                let store = payveil_authorization::RocksDbStore::open(&path)
                    .with_context(|| format!("opening {}", path.display()))?;
                Ok(Self::RocksDb(store))
            }
            #[cfg(not(feature = "rocksdb"))]
            AuthorizationStoreKind::Rocksdb => {
                let path = PathBuf::from(&config.authorization.store_path).join(participant);
                warn!(
                    "Built without the rocksdb feature, keeping authorizations for {} in memory",
                    path.display()
                );
                Ok(Self::Memory(MemoryStore::new()))
            }
        }
    }
}

impl AuthorizationStore for CliStore {
    fn get(&self, key: &AuthorizationCacheKey) -> Result<Option<DecryptionAuthorization>> {
        match self {
            Self::Memory(store) => store.get(key),
            #[cfg(feature = "rocksdb")]
            Self::RocksDb(store) => store.get(key),
        }
    }

    fn put(&mut self, key: AuthorizationCacheKey, record: DecryptionAuthorization) -> Result<()> {
        match self {
            Self::Memory(store) => store.put(key, record),
            #[cfg(feature = "rocksdb")]
            Self::RocksDb(store) => store.put(key, record),
        }
    }

    fn remove(&mut self, key: &AuthorizationCacheKey) -> Result<()> {
        match self {
            Self::Memory(store) => store.remove(key),
            #[cfg(feature = "rocksdb")]
            Self::RocksDb(store) => store.remove(key),
        }
    }

    fn keys(&self) -> Result<Vec<AuthorizationCacheKey>> {
        match self {
            Self::Memory(store) => store.keys(),
            #[cfg(feature = "rocksdb")]
            Self::RocksDb(store) => store.keys(),
        }
    }
}

// ============================================================================
// Participants
// ============================================================================

type CliSession = Session<DevNetwork, DevNetwork, DevNetwork, LocalSigner, CliStore>;

struct Participant {
    name: String,
    signer: Arc<LocalSigner>,
    // keeps the context channel open for the lifetime of the session
    _context: watch::Sender<SessionContext<LocalSigner>>,
    session: CliSession,
}

impl Participant {
    fn address(&self) -> Address {
        self.signer.address()
    }
}

struct Environment {
    config: PayveilConfig,
    network: DevNetwork,
    registry: DeploymentRegistry,
    policy: AuthorizationPolicy,
}

impl Environment {
    fn start(config: &PayveilConfig) -> Result<Self> {
        let chain_id = config.network.chain_id;
        if !config.features.dev_mode && config.deployment(chain_id).is_some() {
            warn!("Chain {chain_id} has a configured deployment; the demo still runs in-process");
        }
        let network = DevNetwork::new(chain_id);
        let ledger = network.deploy_ledger();
        info!("Deployed salary ledger {ledger} on chain {chain_id}");

        let mut registry = build_registry(config);
        registry.register(Deployment {
            chain_id,
            address: ledger,
            chain_name: config.network.chain_name.clone(),
        });

        let policy = AuthorizationPolicy::new(config.authorization.duration_secs)
            .context("invalid [authorization] duration_secs")?;

        Ok(Self {
            config: config.clone(),
            network,
            registry,
            policy,
        })
    }

    fn participant(&self, name: &str, seed: u8) -> Result<Participant> {
        let signer = Arc::new(LocalSigner::from_seed(&[seed; 32]));
        let (tx, rx) = watch::channel(SessionContext::new(
            self.config.network.chain_id,
            signer.clone(),
        ));
        let store = CliStore::open(&self.config, name)?;
        let session = Session::new(
            self.network.clone(),
            self.network.clone(),
            self.network.clone(),
            rx,
            self.registry.clone(),
            store,
        )
        .with_policy(self.policy);

        println!("👤 {name}: {}", signer.address());
        Ok(Participant {
            name: name.to_string(),
            signer,
            _context: tx,
            session,
        })
    }
}

/// Deployments listed in `[[deployments]]`, skipping unparseable addresses.
pub fn build_registry(config: &PayveilConfig) -> DeploymentRegistry {
    let mut registry = DeploymentRegistry::new();
    for entry in &config.deployments {
        match entry.address.parse::<Address>() {
            Ok(address) => {
                registry.register(Deployment {
                    chain_id: entry.chain_id,
                    address,
                    chain_name: entry.chain_name.clone(),
                });
            }
            Err(e) => warn!("Skipping deployment for chain {}: {e}", entry.chain_id),
        }
    }
    registry
}

// ============================================================================
// Flows
// ============================================================================

/// Two participants submit, decrypt their own value and compare.
pub async fn run_demo(config: DemoConfig) -> Result<()> {
    let settings = PayveilConfig::global();
    let env = Environment::start(settings)?;
    let alice = env.participant("alice", 1)?;
    let bob = env.participant("bob", 2)?;
    println!();

    step(&alice, "submit", alice.session.submit_value(config.alice_value).await).await?;
    step(&bob, "submit", bob.session.submit_value(config.bob_value).await).await?;
    step(&alice, "decrypt value", alice.session.decrypt_value().await).await?;

    let counterpart = bob.address().to_string();
    step(
        &alice,
        "compare",
        alice.session.request_comparison(&counterpart).await,
    )
    .await?;
    step(
        &alice,
        "decrypt comparison",
        alice.session.decrypt_comparison().await,
    )
    .await?;

    let snapshot = alice.session.snapshot().await;
    match snapshot.comparison_result {
        Some(true) => println!("\n✅ {} earns more than {}", alice.name, bob.name),
        Some(false) => println!("\n✅ {} does not earn more than {}", alice.name, bob.name),
        None => bail!("comparison result was not decrypted"),
    }

    if config.json {
        print_snapshot(&alice.session.snapshot().await)?;
        print_snapshot(&bob.session.snapshot().await)?;
    }
    print_counters(&env.network);
    Ok(())
}

/// One requester compared against several counterparts in one transaction.
pub async fn run_batch(config: BatchConfig) -> Result<()> {
    let Some((&own, others)) = config.values.split_first() else {
        bail!("batch needs at least two values");
    };
    if others.is_empty() {
        bail!("batch needs at least one counterpart value");
    }
    if others.len() > usize::from(u8::MAX - 1) {
        bail!("too many counterparts");
    }

    let settings = PayveilConfig::global();
    let env = Environment::start(settings)?;
    let requester = env.participant("requester", 1)?;

    let mut counterparts = Vec::with_capacity(others.len());
    for (i, value) in others.iter().enumerate() {
        let name = format!("peer-{}", i + 1);
        let peer = env.participant(&name, (i + 2) as u8)?;
        step(&peer, "submit", peer.session.submit_value(*value).await).await?;
        counterparts.push(peer.address().to_string());
    }
    println!();

    step(&requester, "submit", requester.session.submit_value(own).await).await?;
    let refs: Vec<&str> = counterparts.iter().map(String::as_str).collect();
    step(
        &requester,
        "batch compare",
        requester.session.request_batch_comparison(&refs).await,
    )
    .await?;

    let snapshot = requester.session.snapshot().await;
    println!("\n📋 {} comparison handles:", snapshot.batch_results.len());
    for (address, handle) in &snapshot.batch_results {
        println!("  {address} → {handle}");
    }

    step(
        &requester,
        "decrypt comparison",
        requester.session.decrypt_comparison().await,
    )
    .await?;
    if let Some(higher) = requester.session.snapshot().await.comparison_result {
        println!("  {} earns more than peer-1: {higher}", requester.name);
    }

    if config.json {
        print_snapshot(&requester.session.snapshot().await)?;
    }
    print_counters(&env.network);
    Ok(())
}

async fn step(who: &Participant, label: &str, outcome: Outcome) -> Result<()> {
    let status = who.session.snapshot().await.status;
    match outcome {
        Outcome::Committed | Outcome::Skipped => {
            println!("  [{}] {label}: {status}", who.name);
            Ok(())
        }
        other => bail!("[{}] {label} ended with {other:?}: {status}", who.name),
    }
}

fn print_snapshot(snapshot: &SessionSnapshot) -> Result<()> {
    let json = serde_json::to_string_pretty(snapshot)?;
    println!("{json}");
    Ok(())
}

fn print_counters(network: &DevNetwork) {
    println!();
    println!("📊 transactions: {}", network.transaction_count());
    println!("📊 encryptions:  {}", network.encryption_count());
    println!("📊 decryptions:  {}", network.decryption_count());
}
