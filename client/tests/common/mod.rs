#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use payveil_authorization::{
    AuthorizationSigner, LocalSigner, ManualClock, MemoryStore, SignerError,
};
use payveil_client::{Deployment, DeploymentRegistry, Session, SessionContext};
use payveil_handle::{
    Address, AdmissionProof, CiphertextHandle, EncryptedInput, EncryptedInputResponse,
};
use payveil_ledger::{
    ConfidentialLedger, DevNetwork, EncryptionGateway, GatewayError, LedgerError,
    PendingTransaction, TransactionReceipt,
};
use tokio::sync::watch;

pub const CHAIN: u64 = 31337;

type Hook = Box<dyn FnOnce() + Send>;

/// Local key with prompt counting and injectable behaviour.
pub struct TestSigner {
    inner: LocalSigner,
    prompts: AtomicUsize,
    decline: AtomicBool,
    yield_on_sign: AtomicBool,
    on_sign: Mutex<Option<Hook>>,
}

impl TestSigner {
    pub fn new(seed: u8) -> Arc<Self> {
        Arc::new(Self {
            inner: LocalSigner::from_seed(&[seed; 32]),
            prompts: AtomicUsize::new(0),
            decline: AtomicBool::new(false),
            yield_on_sign: AtomicBool::new(false),
            on_sign: Mutex::new(None),
        })
    }

    pub fn prompts(&self) -> usize {
        self.prompts.load(Ordering::SeqCst)
    }

    pub fn set_decline(&self, decline: bool) {
        self.decline.store(decline, Ordering::SeqCst);
    }

    pub fn set_yield(&self, yield_on_sign: bool) {
        self.yield_on_sign.store(yield_on_sign, Ordering::SeqCst);
    }

    /// Runs `hook` while the next signature is being produced.
    pub fn on_next_sign(&self, hook: impl FnOnce() + Send + 'static) {
        *self.on_sign.lock().unwrap() = Some(Box::new(hook));
    }
}

impl AuthorizationSigner for TestSigner {
    fn address(&self) -> Address {
        self.inner.address()
    }

    fn verifying_key(&self) -> [u8; 32] {
        self.inner.verifying_key()
    }

    async fn sign(&self, message: &[u8]) -> Result<Vec<u8>, SignerError> {
        self.prompts.fetch_add(1, Ordering::SeqCst);
        if self.yield_on_sign.load(Ordering::SeqCst) {
            tokio::task::yield_now().await;
        }
        run(&self.on_sign);
        if self.decline.load(Ordering::SeqCst) {
            return Err(SignerError::Declined);
        }
        self.inner.sign(message).await
    }
}

#[derive(Default)]
pub struct GatewayHooks {
    yield_before: AtomicBool,
    after_encrypt: Mutex<Option<Hook>>,
}

impl GatewayHooks {
    /// Makes every encryption suspend once before running.
    pub fn set_yield(&self, yield_before: bool) {
        self.yield_before.store(yield_before, Ordering::SeqCst);
    }

    /// Runs `hook` once the next encryption has completed.
    pub fn after_next_encrypt(&self, hook: impl FnOnce() + Send + 'static) {
        *self.after_encrypt.lock().unwrap() = Some(Box::new(hook));
    }
}

/// Dev gateway with hooks around `encrypt`.
pub struct HookedGateway {
    inner: DevNetwork,
    hooks: Arc<GatewayHooks>,
}

impl EncryptionGateway for HookedGateway {
    fn is_ready(&self, chain_id: u64) -> bool {
        self.inner.is_ready(chain_id)
    }

    async fn encrypt(
        &self,
        chain_id: u64,
        input: &EncryptedInput,
    ) -> Result<EncryptedInputResponse, GatewayError> {
        if self.hooks.yield_before.load(Ordering::SeqCst) {
            tokio::task::yield_now().await;
        }
        let response = self.inner.encrypt(chain_id, input).await;
        run(&self.hooks.after_encrypt);
        response
    }
}

#[derive(Default)]
pub struct LedgerHooks {
    after_receipt: Mutex<Option<Hook>>,
    after_result: Mutex<Option<Hook>>,
}

impl LedgerHooks {
    /// Runs `hook` once the next receipt has been returned.
    pub fn after_next_receipt(&self, hook: impl FnOnce() + Send + 'static) {
        *self.after_receipt.lock().unwrap() = Some(Box::new(hook));
    }

    /// Runs `hook` once the next comparison result handle has been read.
    pub fn after_next_result(&self, hook: impl FnOnce() + Send + 'static) {
        *self.after_result.lock().unwrap() = Some(Box::new(hook));
    }
}

fn run(slot: &Mutex<Option<Hook>>) {
    let hook = slot.lock().unwrap().take();
    if let Some(hook) = hook {
        hook();
    }
}

/// Dev ledger with hooks after receipts and result reads.
pub struct HookedLedger {
    inner: DevNetwork,
    hooks: Arc<LedgerHooks>,
}

impl ConfidentialLedger for HookedLedger {
    async fn submit(
        &self,
        ledger: Address,
        from: Address,
        handle: CiphertextHandle,
        proof: &AdmissionProof,
    ) -> Result<PendingTransaction, LedgerError> {
        self.inner.submit(ledger, from, handle, proof).await
    }

    async fn update(
        &self,
        ledger: Address,
        from: Address,
        handle: CiphertextHandle,
        proof: &AdmissionProof,
    ) -> Result<PendingTransaction, LedgerError> {
        self.inner.update(ledger, from, handle, proof).await
    }

    async fn wait_for_receipt(
        &self,
        tx: &PendingTransaction,
    ) -> Result<TransactionReceipt, LedgerError> {
        let receipt = self.inner.wait_for_receipt(tx).await;
        run(&self.hooks.after_receipt);
        receipt
    }

    async fn has_value(&self, ledger: Address, who: Address) -> Result<bool, LedgerError> {
        self.inner.has_value(ledger, who).await
    }

    async fn get_own_value(
        &self,
        ledger: Address,
        caller: Address,
    ) -> Result<CiphertextHandle, LedgerError> {
        self.inner.get_own_value(ledger, caller).await
    }

    async fn request_comparison(
        &self,
        ledger: Address,
        caller: Address,
        counterpart: Address,
    ) -> Result<PendingTransaction, LedgerError> {
        self.inner.request_comparison(ledger, caller, counterpart).await
    }

    async fn batch_request_comparison(
        &self,
        ledger: Address,
        caller: Address,
        counterparts: &[Address],
    ) -> Result<PendingTransaction, LedgerError> {
        self.inner
            .batch_request_comparison(ledger, caller, counterparts)
            .await
    }

    async fn get_comparison_result(
        &self,
        ledger: Address,
        caller: Address,
        party_a: Address,
        party_b: Address,
    ) -> Result<CiphertextHandle, LedgerError> {
        let handle = self
            .inner
            .get_comparison_result(ledger, caller, party_a, party_b)
            .await;
        run(&self.hooks.after_result);
        handle
    }

    async fn has_comparison(
        &self,
        ledger: Address,
        party_a: Address,
        party_b: Address,
    ) -> Result<bool, LedgerError> {
        self.inner.has_comparison(ledger, party_a, party_b).await
    }
}

pub type TestSession = Session<HookedLedger, HookedGateway, DevNetwork, TestSigner, MemoryStore>;
pub type ContextSender = Arc<watch::Sender<SessionContext<TestSigner>>>;

/// One user: their key, their live context and their session.
pub struct Party {
    pub signer: Arc<TestSigner>,
    pub context: ContextSender,
    pub hooks: Arc<GatewayHooks>,
    pub ledger_hooks: Arc<LedgerHooks>,
    pub session: TestSession,
}

impl Party {
    pub fn address(&self) -> Address {
        self.signer.address()
    }

    /// Returns a closure that moves this party's context to `chain_id`/`signer`.
    pub fn switcher(
        &self,
        chain_id: u64,
        signer: Arc<TestSigner>,
    ) -> impl FnOnce() + Send + 'static {
        let context = self.context.clone();
        move || {
            context.send_replace(SessionContext::new(chain_id, signer));
        }
    }

    pub fn switch_to(&self, chain_id: u64, signer: Arc<TestSigner>) {
        (self.switcher(chain_id, signer))();
    }
}

/// A dev network with one deployed ledger.
pub struct World {
    pub network: DevNetwork,
    pub ledger: Address,
    pub registry: DeploymentRegistry,
    pub clock: Option<Arc<ManualClock>>,
}

impl World {
    pub fn new() -> Self {
        Self::on(DevNetwork::new(CHAIN))
    }

    /// A world whose network and sessions share `clock`.
    pub fn with_clock(clock: Arc<ManualClock>) -> Self {
        let mut world = Self::on(DevNetwork::with_clock(CHAIN, clock.clone()));
        world.clock = Some(clock);
        world
    }

    fn on(network: DevNetwork) -> Self {
        let ledger = network.deploy_ledger();
        let registry = [Deployment {
            chain_id: CHAIN,
            address: ledger,
            chain_name: "dev".into(),
        }]
        .into_iter()
        .collect();
        Self {
            network,
            ledger,
            registry,
            clock: None,
        }
    }

    pub fn party(&self, seed: u8) -> Party {
        self.party_on(CHAIN, TestSigner::new(seed))
    }

    pub fn party_on(&self, chain_id: u64, signer: Arc<TestSigner>) -> Party {
        let (tx, rx) = watch::channel(SessionContext::new(chain_id, signer.clone()));
        let hooks = Arc::new(GatewayHooks::default());
        let gateway = HookedGateway {
            inner: self.network.clone(),
            hooks: hooks.clone(),
        };
        let ledger_hooks = Arc::new(LedgerHooks::default());
        let ledger = HookedLedger {
            inner: self.network.clone(),
            hooks: ledger_hooks.clone(),
        };
        let mut session = Session::new(
            ledger,
            gateway,
            self.network.clone(),
            rx,
            self.registry.clone(),
            MemoryStore::new(),
        );
        if let Some(clock) = &self.clock {
            session = session.with_clock(clock.clone());
        }
        Party {
            signer,
            context: Arc::new(tx),
            hooks,
            ledger_hooks,
            session,
        }
    }
}
