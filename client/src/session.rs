//! Operation Orchestrator
//!
//! A [`Session`] drives the four user operations against the external
//! collaborators and owns all client-side state.
//!
//! ```text
//!  intent ──▶ begin(kind) ──▶ gateway / authorization cache ──▶ ledger call
//!               │  single-flight check           │ after every await:
//!               │  context sync                  ▼ fingerprint still valid?
//!               ▼                          finish(kind, result)
//!         Busy / Skipped            Committed | Cancelled | Failed
//! ```
//!
//! State lives behind one async mutex that is only held for check-and-set and
//! commit sections. The authorization cache has its own mutex, held across the
//! signing prompt so that concurrent decryptions never prompt twice.

use std::sync::Arc;

use log::{debug, info, warn};
use payveil_authorization::{
    AuthorizationCache, AuthorizationPolicy, AuthorizationSigner, AuthorizationStore, Clock,
    DecryptionAuthorization, LedgerSet, MemoryStore, SystemClock, obtain_authorization,
};
use payveil_handle::{Address, CiphertextHandle, ClearValue, EncryptedInput};
use payveil_ledger::{
    ConfidentialLedger, DecryptionRequest, DecryptionService, EncryptionGateway, LedgerError,
    PendingTransaction, TransactionReceipt,
};
use tokio::sync::{Mutex, watch};

use crate::error::{ClientError, ErrorKind};
use crate::guard::{SessionContext, SessionFingerprint};
use crate::registry::DeploymentRegistry;
use crate::state::{Commit, OperationKind, Outcome, SessionSnapshot, SessionState};
use crate::status;

/// Context resolved when an operation starts.
struct Active<W> {
    fingerprint: SessionFingerprint,
    chain_id: u64,
    account: Address,
    ledger: Address,
    signer: Arc<W>,
}

pub struct Session<L, G, D, W, S = MemoryStore> {
    ledger: L,
    gateway: G,
    decryptor: D,
    context: watch::Receiver<SessionContext<W>>,
    registry: DeploymentRegistry,
    authorizations: Mutex<AuthorizationCache<S>>,
    policy: AuthorizationPolicy,
    clock: Arc<dyn Clock>,
    state: Mutex<SessionState>,
}

impl<L, G, D, W, S> Session<L, G, D, W, S>
where
    L: ConfidentialLedger,
    G: EncryptionGateway,
    D: DecryptionService,
    W: AuthorizationSigner,
    S: AuthorizationStore,
{
    pub fn new(
        ledger: L,
        gateway: G,
        decryptor: D,
        context: watch::Receiver<SessionContext<W>>,
        registry: DeploymentRegistry,
        store: S,
    ) -> Self {
        Self {
            ledger,
            gateway,
            decryptor,
            context,
            registry,
            authorizations: Mutex::new(AuthorizationCache::new(store)),
            policy: AuthorizationPolicy::default(),
            clock: Arc::new(SystemClock),
            state: Mutex::new(SessionState::default()),
        }
    }

    pub fn with_policy(mut self, policy: AuthorizationPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Fingerprint of the live context.
    pub fn fingerprint(&self) -> SessionFingerprint {
        SessionFingerprint::capture(&*self.context.borrow())
    }

    /// Ledger address for the live network, if one is deployed there.
    pub fn ledger_address(&self) -> Option<Address> {
        let chain_id = self.context.borrow().chain_id?;
        self.registry.resolve(chain_id).map(|d| d.address)
    }

    fn resolve(&self) -> Result<Active<W>, String> {
        let context = self.context.borrow();
        let fingerprint = SessionFingerprint::capture(&*context);
        let (Some(chain_id), Some(signer)) = (context.chain_id, context.signer.clone()) else {
            return Err("Wallet not connected".to_string());
        };
        let deployment = self
            .registry
            .resolve(chain_id)
            .ok_or_else(|| status::deployment_not_found(chain_id))?;

        Ok(Active {
            fingerprint,
            chain_id,
            account: signer.address(),
            ledger: deployment.address,
            signer,
        })
    }

    fn checkpoint(&self, active: &Active<W>) -> Result<(), ClientError> {
        if active.fingerprint.still_valid(&self.fingerprint()) {
            Ok(())
        } else {
            Err(ClientError::Stale)
        }
    }

    async fn progress(&self, kind: OperationKind, message: &str) {
        debug!("[{kind:?}] {message}");
        self.state.lock().await.set_status(Some(kind), message);
    }

    /// Opens an operation of `kind`. `precheck` runs under the state lock
    /// after the single-flight check and may veto the start.
    async fn begin<T>(
        &self,
        kind: OperationKind,
        message: &str,
        precheck: impl FnOnce(&mut SessionState) -> Result<T, Outcome>,
    ) -> Result<(Active<W>, T), Outcome> {
        let mut state = self.state.lock().await;
        if state.records.get(kind).in_flight {
            debug!("[{kind:?}] already in flight, ignoring");
            return Err(Outcome::Busy);
        }

        let active = match self.resolve() {
            Ok(active) => active,
            Err(message) => {
                state.sync(self.fingerprint());
                state.set_status(None, message);
                return Err(Outcome::Skipped);
            }
        };
        if state.sync(active.fingerprint) {
            info!("Session context changed, cleared per-account state");
        }
        let prepared = precheck(&mut *state)?;

        let record = state.records.get_mut(kind);
        record.in_flight = true;
        record.outcome = None;
        state.set_status(Some(kind), message);
        info!("[{kind:?}] {message}");
        Ok((active, prepared))
    }

    async fn finish(
        &self,
        kind: OperationKind,
        active: &Active<W>,
        result: Result<Commit, ClientError>,
    ) -> Outcome {
        let current = self.fingerprint();
        let mut state = self.state.lock().await;

        let result = match result {
            Ok(_) if !active.fingerprint.still_valid(&current) => Err(ClientError::Stale),
            other => other,
        };
        let (outcome, message) = match result {
            Ok(commit) => {
                state.sync(current);
                match state.apply(commit) {
                    Ok(message) => (Outcome::Committed, message),
                    Err(message) => {
                        info!("[{kind:?}] handle replaced mid-flight, discarding result");
                        (Outcome::Cancelled, message)
                    }
                }
            }
            Err(ClientError::Stale) => {
                info!("[{kind:?}] context changed mid-flight, discarding result");
                (Outcome::Cancelled, cancelled_message(kind).to_string())
            }
            Err(error) => {
                warn!("[{kind:?}] failed: {error}");
                (Outcome::Failed(error.kind()), failure_message(kind, &error))
            }
        };

        let record = state.records.get_mut(kind);
        record.in_flight = false;
        record.outcome = Some(outcome);
        state.set_status(Some(kind), message);
        outcome
    }

    async fn confirm(
        &self,
        kind: OperationKind,
        active: &Active<W>,
        tx: &PendingTransaction,
    ) -> Result<TransactionReceipt, ClientError> {
        self.progress(kind, &status::waiting_for(tx.hash)).await;
        let receipt = self.ledger.wait_for_receipt(tx).await?;
        self.checkpoint(active)?;
        if !receipt.succeeded() {
            return Err(ClientError::Reverted(receipt.hash));
        }
        Ok(receipt)
    }

    // ========================================================================
    // Submit
    // ========================================================================

    /// Encrypts `value` and registers it as the caller's salary.
    /// A zero value is ignored.
    pub async fn submit_value(&self, value: u64) -> Outcome {
        self.store_value(value, false).await
    }

    /// Replaces an existing registration; fails with `NotSubmitted` without one.
    pub async fn update_value(&self, value: u64) -> Outcome {
        self.store_value(value, true).await
    }

    async fn store_value(&self, value: u64, update: bool) -> Outcome {
        if value == 0 {
            debug!("Ignoring non-positive salary");
            return Outcome::Skipped;
        }
        let kind = OperationKind::Submit;
        let active = match self.begin(kind, status::SUBMITTING, |_| Ok(())).await {
            Ok((active, ())) => active,
            Err(outcome) => return outcome,
        };
        let result = self.run_store(&active, value, update).await;
        self.finish(kind, &active, result).await
    }

    async fn run_store(
        &self,
        active: &Active<W>,
        value: u64,
        update: bool,
    ) -> Result<Commit, ClientError> {
        let kind = OperationKind::Submit;
        let mut input = EncryptedInput::new(active.ledger, active.account);
        input.add32(value)?;

        let encrypted = self.gateway.encrypt(active.chain_id, &input).await?;
        self.checkpoint(active)?;
        let handle = encrypted.first()?;

        self.progress(kind, status::SENDING_TRANSACTION).await;
        let tx = if update {
            self.ledger
                .update(active.ledger, active.account, handle, &encrypted.proof)
                .await?
        } else {
            self.ledger
                .submit(active.ledger, active.account, handle, &encrypted.proof)
                .await?
        };
        self.checkpoint(active)?;
        let receipt = self.confirm(kind, active, &tx).await?;

        let own = self
            .ledger
            .get_own_value(active.ledger, active.account)
            .await?;
        self.checkpoint(active)?;

        Ok(Commit::Submitted {
            handle: own,
            status: receipt.status,
        })
    }

    // ========================================================================
    // Compare
    // ========================================================================

    /// Compares the caller's salary against `counterpart`'s.
    pub async fn request_comparison(&self, counterpart: &str) -> Outcome {
        self.compare(&[counterpart]).await
    }

    /// Compares against every counterpart in one transaction. The first
    /// result becomes the active comparison.
    pub async fn request_batch_comparison(&self, counterparts: &[&str]) -> Outcome {
        self.compare(counterparts).await
    }

    async fn compare(&self, counterparts: &[&str]) -> Outcome {
        let parsed = counterparts
            .iter()
            .map(|raw| raw.trim().parse::<Address>())
            .collect::<Result<Vec<_>, _>>();
        let counterparts = match parsed {
            Ok(list) if !list.is_empty() => list,
            Ok(_) => return Outcome::Skipped,
            Err(e) => {
                debug!("Rejecting counterpart address: {e}");
                self.state
                    .lock()
                    .await
                    .set_status(None, status::INVALID_ADDRESS);
                return Outcome::Failed(ErrorKind::InvalidAddress);
            }
        };

        let kind = OperationKind::Compare;
        let active = match self.begin(kind, status::COMPARING, |_| Ok(())).await {
            Ok((active, ())) => active,
            Err(outcome) => return outcome,
        };
        let result = self.run_compare(&active, counterparts).await;
        self.finish(kind, &active, result).await
    }

    async fn run_compare(
        &self,
        active: &Active<W>,
        counterparts: Vec<Address>,
    ) -> Result<Commit, ClientError> {
        let kind = OperationKind::Compare;

        let registered = self.ledger.has_value(active.ledger, active.account).await?;
        self.checkpoint(active)?;
        if !registered {
            return Err(LedgerError::NotSubmitted(status::NOT_SUBMITTED.to_string()).into());
        }

        self.progress(kind, status::SENDING_COMPARISON).await;
        let batch = counterparts.len() > 1;
        let tx = if batch {
            self.ledger
                .batch_request_comparison(active.ledger, active.account, &counterparts)
                .await?
        } else {
            self.ledger
                .request_comparison(active.ledger, active.account, counterparts[0])
                .await?
        };
        self.checkpoint(active)?;
        let receipt = self.confirm(kind, active, &tx).await?;

        let mut results = Vec::with_capacity(counterparts.len());
        for counterpart in counterparts {
            let handle = self
                .ledger
                .get_comparison_result(active.ledger, active.account, active.account, counterpart)
                .await?;
            self.checkpoint(active)?;
            results.push((counterpart, handle));
        }

        Ok(Commit::Compared {
            results,
            status: receipt.status,
            batch,
        })
    }

    // ========================================================================
    // Decrypt
    // ========================================================================

    /// Decrypts the caller's own registered handle.
    pub async fn decrypt_value(&self) -> Outcome {
        self.decrypt(OperationKind::DecryptValue).await
    }

    /// Decrypts the active comparison handle.
    pub async fn decrypt_comparison(&self) -> Outcome {
        self.decrypt(OperationKind::DecryptComparison).await
    }

    async fn decrypt(&self, kind: OperationKind) -> Outcome {
        let (source, message) = match kind {
            OperationKind::DecryptComparison => {
                (OperationKind::Compare, status::DECRYPTING_COMPARISON)
            }
            _ => (OperationKind::Submit, status::DECRYPTING_VALUE),
        };

        let begun = self
            .begin(kind, message, |state| {
                let handle = state
                    .records
                    .get(source)
                    .result_handle
                    .ok_or(Outcome::Skipped)?;
                if state.records.get(kind).has_decrypted(&handle) {
                    state.set_status(Some(kind), status::ALREADY_DECRYPTED);
                    return Err(Outcome::Skipped);
                }
                Ok(handle)
            })
            .await;
        let (active, handle) = match begun {
            Ok(begun) => begun,
            Err(outcome) => return outcome,
        };

        let result = self
            .run_decrypt(&active, kind, handle)
            .await
            .map(|value| match kind {
                OperationKind::DecryptComparison => Commit::ComparisonDecrypted { handle, value },
                _ => Commit::ValueDecrypted { handle, value },
            });
        self.finish(kind, &active, result).await
    }

    async fn run_decrypt(
        &self,
        active: &Active<W>,
        kind: OperationKind,
        handle: CiphertextHandle,
    ) -> Result<ClearValue, ClientError> {
        // empty slots never reach the decryption service
        if handle.is_zero() {
            return Ok(match kind {
                OperationKind::DecryptComparison => ClearValue::Bool(false),
                _ => ClearValue::Uint(0),
            });
        }

        let authorization = self.authorize(active).await?;
        self.checkpoint(active)?;

        let request = DecryptionRequest {
            handle,
            ledger: active.ledger,
        };
        let sealed = self
            .decryptor
            .user_decrypt(&[request], &authorization)
            .await?;
        self.checkpoint(active)?;

        let item = sealed
            .iter()
            .find(|item| item.handle == handle)
            .ok_or(ClientError::MissingResult)?;
        Ok(authorization.open(item)?)
    }

    async fn authorize(&self, active: &Active<W>) -> Result<DecryptionAuthorization, ClientError> {
        let ledgers = LedgerSet::single(active.ledger);
        let mut cache = self.authorizations.lock().await;
        let authorization = obtain_authorization(
            &ledgers,
            active.signer.as_ref(),
            &mut *cache,
            &self.policy,
            self.clock.now(),
        )
        .await?;
        Ok(authorization)
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Refreshes `has_value` from the ledger and, when a registration
    /// exists, the caller's own handle.
    pub async fn check_has_value(&self) -> Outcome {
        let Ok(active) = self.resolve() else {
            return Outcome::Skipped;
        };
        let result = self.ledger.has_value(active.ledger, active.account).await;

        {
            let mut state = self.state.lock().await;
            if !active.fingerprint.still_valid(&self.fingerprint()) {
                return Outcome::Cancelled;
            }
            state.sync(active.fingerprint);
            match result {
                Ok(true) => state.has_value = true,
                Ok(false) => {
                    state.set_own_handle(None);
                    return Outcome::Committed;
                }
                Err(error) => {
                    warn!("Checking registration failed: {error}");
                    let error = ClientError::from(error);
                    state.set_status(None, status::check_failed(&error));
                    return Outcome::Failed(error.kind());
                }
            }
        }

        self.refresh_own_value().await
    }

    /// Re-reads the caller's registration and own handle from the ledger.
    pub async fn refresh_own_value(&self) -> Outcome {
        let Ok(active) = self.resolve() else {
            return Outcome::Skipped;
        };
        let result = self.read_own_value(&active).await;

        let mut state = self.state.lock().await;
        if !active.fingerprint.still_valid(&self.fingerprint()) {
            return Outcome::Cancelled;
        }
        state.sync(active.fingerprint);
        match result {
            Ok(Some(handle)) => {
                state.set_own_handle(Some(handle));
                Outcome::Committed
            }
            Ok(None) | Err(LedgerError::NotSubmitted(_)) => {
                state.set_own_handle(None);
                state.set_status(None, status::NOT_SUBMITTED);
                Outcome::Committed
            }
            Err(error) => {
                warn!("Refreshing own value failed: {error}");
                state.set_status(None, status::REFRESH_FAILED);
                Outcome::Failed(ClientError::from(error).kind())
            }
        }
    }

    async fn read_own_value(
        &self,
        active: &Active<W>,
    ) -> Result<Option<CiphertextHandle>, LedgerError> {
        if !self.ledger.has_value(active.ledger, active.account).await? {
            return Ok(None);
        }
        let handle = self
            .ledger
            .get_own_value(active.ledger, active.account)
            .await?;
        Ok(Some(handle))
    }

    /// Whether the ledger holds a result for `party_a > party_b`.
    pub async fn has_comparison(
        &self,
        party_a: Address,
        party_b: Address,
    ) -> Result<bool, ClientError> {
        let active = self
            .resolve()
            .map_err(|reason| ClientError::Ledger(LedgerError::Unavailable(reason)))?;
        Ok(self
            .ledger
            .has_comparison(active.ledger, party_a, party_b)
            .await?)
    }

    /// Drops per-account state if the live context moved away from it.
    pub async fn sync_context(&self) -> bool {
        let current = self.fingerprint();
        self.state.lock().await.sync(current)
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let fingerprint = self.fingerprint();
        let ledger = self.ledger_address();
        let gateway_ready = fingerprint
            .network_id
            .is_some_and(|chain_id| self.gateway.is_ready(chain_id));

        let mut state = self.state.lock().await;
        state.sync(fingerprint);
        if let (Some(chain_id), None) = (fingerprint.network_id, ledger) {
            state.set_status(None, status::deployment_not_found(chain_id));
        }
        SessionSnapshot::build(&state, fingerprint, ledger, gateway_ready)
    }
}

fn cancelled_message(kind: OperationKind) -> &'static str {
    match kind {
        OperationKind::Submit => status::SUBMIT_CANCELLED,
        OperationKind::Compare => status::COMPARE_CANCELLED,
        OperationKind::DecryptValue | OperationKind::DecryptComparison => {
            status::DECRYPT_CANCELLED
        }
    }
}

fn failure_message(kind: OperationKind, error: &ClientError) -> String {
    match (kind, error.kind()) {
        (OperationKind::Submit, _) => status::submit_failed(error),
        (OperationKind::Compare, ErrorKind::NotSubmitted) => status::NOT_SUBMITTED.to_string(),
        (OperationKind::Compare, _) => status::compare_failed(error),
        (_, ErrorKind::AuthorizationDenied) => status::AUTHORIZATION_UNAVAILABLE.to_string(),
        _ => status::decrypt_failed(error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Deployment;
    use payveil_authorization::LocalSigner;
    use payveil_ledger::DevNetwork;

    type DevSession = Session<DevNetwork, DevNetwork, DevNetwork, LocalSigner>;

    fn dev_session(
        context: SessionContext<LocalSigner>,
    ) -> (DevNetwork, DevSession, watch::Sender<SessionContext<LocalSigner>>) {
        let network = DevNetwork::new(31337);
        let registry = [Deployment {
            chain_id: 31337,
            address: network.deploy_ledger(),
            chain_name: "dev".into(),
        }]
        .into_iter()
        .collect();
        let (tx, rx) = watch::channel(context);
        let session = Session::new(
            network.clone(),
            network.clone(),
            network.clone(),
            rx,
            registry,
            MemoryStore::new(),
        );
        (network, session, tx)
    }

    #[tokio::test]
    async fn test_zero_handles_decrypt_locally() {
        let signer = Arc::new(LocalSigner::generate());
        let (network, session, _context) = dev_session(SessionContext::new(31337, signer));
        {
            let mut state = session.state.lock().await;
            state.sync(session.fingerprint());
            state.set_own_handle(Some(CiphertextHandle::ZERO));
            state.records.compare.result_handle = Some(CiphertextHandle::ZERO);
        }

        assert_eq!(session.decrypt_value().await, Outcome::Committed);
        assert_eq!(session.decrypt_comparison().await, Outcome::Committed);

        let snapshot = session.snapshot().await;
        assert_eq!(snapshot.clear_value, Some(0));
        assert_eq!(snapshot.comparison_result, Some(false));
        assert_eq!(network.decryption_count(), 0);
    }

    #[tokio::test]
    async fn test_disconnected_session_starts_nothing() {
        let (network, session, _context) = dev_session(SessionContext::disconnected());

        assert_eq!(session.submit_value(10).await, Outcome::Skipped);
        assert_eq!(session.decrypt_value().await, Outcome::Skipped);
        assert_eq!(session.check_has_value().await, Outcome::Skipped);
        assert_eq!(network.encryption_count(), 0);

        let snapshot = session.snapshot().await;
        assert_eq!(snapshot.status, "Wallet not connected");
        assert!(!snapshot.can_submit && !snapshot.can_compare);
    }

    #[test]
    fn test_failure_messages() {
        let not_submitted = ClientError::Ledger(LedgerError::NotSubmitted("x".into()));
        assert_eq!(
            failure_message(OperationKind::Compare, &not_submitted),
            status::NOT_SUBMITTED
        );
        assert_eq!(
            failure_message(OperationKind::Compare, &ClientError::MissingResult),
            "Comparison failed: decryption service returned no value for the requested handle"
        );
        assert_eq!(
            cancelled_message(OperationKind::DecryptComparison),
            "Decryption cancelled"
        );
    }
}
