use parking_lot::Mutex;
use std::sync::Arc;
use tracing::info;

use super::EngineError;
use crate::config::EngineConfig;
use crate::crypto::keys::{KeyHolder, PublicKey};
use crate::crypto::seed::{derive_default_seed, Seed};
use crate::prover::{ProofRequester, ProverService};
use crate::rpc::LedgerRpc;
use crate::store::{CommitmentStore, ReconcileReport, SharedStore};
use crate::transaction::{PendingTransaction, TxAssembler, TxReceipt};
use crate::zkp::PedersenParams;

/// One owner's shielded balance, bound to a ledger and a prover.
pub struct ShieldedClient {
    owner: PublicKey,
    store: SharedStore,
    ledger: Arc<dyn LedgerRpc>,
    assembler: TxAssembler,
    config: EngineConfig,
}

impl ShieldedClient {
    /// Derive the seed from `holder`, then connect and reconcile.
    pub async fn connect(
        holder: &dyn KeyHolder,
        ledger: Arc<dyn LedgerRpc>,
        prover: Arc<dyn ProverService>,
        params: PedersenParams,
        config: EngineConfig,
    ) -> Result<Self, EngineError> {
        let seed = derive_default_seed(holder)?;
        Self::from_seed(&seed, holder.public_key(), ledger, prover, params, config).await
    }

    /// Connect with an already derived seed. Local state starts empty and is
    /// rebuilt from the ledger before this returns.
    pub async fn from_seed(
        seed: &Seed,
        owner: PublicKey,
        ledger: Arc<dyn LedgerRpc>,
        prover: Arc<dyn ProverService>,
        params: PedersenParams,
        config: EngineConfig,
    ) -> Result<Self, EngineError> {
        let store: SharedStore = Arc::new(Mutex::new(CommitmentStore::new(params, seed.note_keys())));
        let requester = ProofRequester::new(prover, config.retry.clone());
        let assembler = TxAssembler::new(store.clone(), requester, ledger.clone(), owner, &config);

        let client = Self {
            owner,
            store,
            ledger,
            assembler,
            config,
        };
        let report = client.reconcile().await?;
        info!(
            %owner,
            cluster = %client.config.cluster,
            notes = report.discovered,
            balance = client.private_balance(),
            "shielded client connected"
        );
        Ok(client)
    }

    pub fn owner(&self) -> PublicKey {
        self.owner
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> SharedStore {
        self.store.clone()
    }

    // -- Balances -----------------------------------------------------------

    /// Sum of unspent notes, reserved ones included.
    pub fn private_balance(&self) -> u64 {
        self.store.lock().unspent_total()
    }

    /// Sum of notes a new send may draw on.
    pub fn available_balance(&self) -> u64 {
        self.store.lock().available_total()
    }

    pub async fn public_balance(&self) -> Result<u64, EngineError> {
        let account = self
            .ledger
            .get_account_state(&self.owner)
            .await
            .map_err(EngineError::from_query)?;
        Ok(account.balance)
    }

    // -- Transactions -------------------------------------------------------

    pub fn build_top_up(&self, amount: u64) -> Result<PendingTransaction, EngineError> {
        self.assembler.build_top_up(amount)
    }

    pub fn sign_top_up(&self, pending: &mut PendingTransaction, holder: &dyn KeyHolder) -> Result<(), EngineError> {
        self.assembler.sign(pending, holder)
    }

    pub async fn build_send(&self, amount: u64, destination: PublicKey) -> Result<PendingTransaction, EngineError> {
        self.assembler.build_send(amount, destination).await
    }

    pub async fn send_tx(&self, pending: PendingTransaction) -> Result<TxReceipt, EngineError> {
        self.assembler.submit(pending).await
    }

    pub fn abandon(&self, pending: PendingTransaction) {
        self.assembler.abandon(pending)
    }

    /// Build, sign and submit a top-up.
    pub async fn top_up(&self, amount: u64, holder: &dyn KeyHolder) -> Result<TxReceipt, EngineError> {
        let mut pending = self.build_top_up(amount)?;
        self.sign_top_up(&mut pending, holder)?;
        self.send_tx(pending).await
    }

    /// Build and submit a private send.
    pub async fn send(&self, amount: u64, destination: PublicKey) -> Result<TxReceipt, EngineError> {
        let pending = self.build_send(amount, destination).await?;
        self.send_tx(pending).await
    }

    /// Re-read the shielded pool and bring the store in line with it.
    pub async fn reconcile(&self) -> Result<ReconcileReport, EngineError> {
        let state = self
            .ledger
            .get_shielded_state()
            .await
            .map_err(EngineError::from_query)?;
        Ok(self.store.lock().reconcile(&state))
    }
}

impl std::fmt::Debug for ShieldedClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShieldedClient")
            .field("owner", &self.owner)
            .field("cluster", &self.config.cluster)
            .field("store", &*self.store.lock())
            .finish_non_exhaustive()
    }
}
