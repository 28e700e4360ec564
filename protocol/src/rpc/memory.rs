//! In-process ledger.
//!
//! Applies the same acceptance rules as a cluster:
//!
//! - **Top-up**: owner signature valid, opening proof valid, public balance
//!   covers the amount, commitment not yet published.
//! - **Send**: nullifiers fresh and pairwise distinct, change commitment not
//!   yet published, attestation by the trusted prover valid, spend proof
//!   valid for the statement rebuilt from the transaction's public fields.
//!
//! An accepted transaction is applied atomically under one lock and
//! recorded as confirmed. [`MemoryLedger::delay_confirmations`] makes new
//! transactions report `Pending` for a number of polls first;
//! [`MemoryLedger::inject_transport_failures`] makes the next calls fail
//! with a transport error before touching state.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

use super::{AccountState, ConfirmationStatus, LedgerRpc, RpcError, ShieldedState, TxSignature};
use crate::crypto::hash::double_sha256;
use crate::crypto::keys::PublicKey;
use crate::transaction::{SendBody, ShieldedTransaction, TopUpBody, TxBody};
use crate::zkp::{Nullifier, PublishedNote, SpendVerifier};

#[derive(Default)]
struct LedgerState {
    balances: HashMap<PublicKey, u64>,
    notes: Vec<PublishedNote>,
    commitments: HashSet<Vec<u8>>,
    nullifier_set: HashSet<Nullifier>,
    nullifier_log: Vec<Nullifier>,
    statuses: HashMap<TxSignature, TrackedStatus>,
    submissions: usize,
    airdrops: u64,
    transport_failures: u32,
    confirmation_delay: u32,
}

struct TrackedStatus {
    status: ConfirmationStatus,
    polls_left: u32,
}

pub struct MemoryLedger {
    verifier: SpendVerifier,
    prover_key: PublicKey,
    airdrops_enabled: bool,
    state: Mutex<LedgerState>,
}

impl MemoryLedger {
    /// A ledger that accepts spends proven under `verifier` and attested by
    /// `prover_key`.
    pub fn new(verifier: SpendVerifier, prover_key: PublicKey) -> Self {
        Self {
            verifier,
            prover_key,
            airdrops_enabled: true,
            state: Mutex::new(LedgerState::default()),
        }
    }

    pub fn without_airdrops(mut self) -> Self {
        self.airdrops_enabled = false;
        self
    }

    /// Set a public balance directly.
    pub fn credit(&self, address: PublicKey, amount: u64) {
        let mut state = self.state.lock();
        let balance = state.balances.entry(address).or_default();
        *balance = balance.saturating_add(amount);
    }

    pub fn balance_of(&self, address: &PublicKey) -> u64 {
        self.state.lock().balances.get(address).copied().unwrap_or(0)
    }

    /// Number of `submit` calls that reached the ledger, accepted or not.
    pub fn submissions(&self) -> usize {
        self.state.lock().submissions
    }

    /// Fail the next `n` calls with [`RpcError::Transport`].
    pub fn inject_transport_failures(&self, n: u32) {
        self.state.lock().transport_failures = n;
    }

    /// Report transactions accepted from now on as pending for `polls`
    /// confirmation queries before confirming them.
    pub fn delay_confirmations(&self, polls: u32) {
        self.state.lock().confirmation_delay = polls;
    }

    fn check_transport(state: &mut LedgerState) -> Result<(), RpcError> {
        if state.transport_failures > 0 {
            state.transport_failures -= 1;
            return Err(RpcError::Transport("connection reset by peer".into()));
        }
        Ok(())
    }

    fn record(state: &mut LedgerState, signature: TxSignature) {
        let polls_left = state.confirmation_delay;
        state.statuses.insert(
            signature,
            TrackedStatus {
                status: ConfirmationStatus::Confirmed,
                polls_left,
            },
        );
    }

    fn apply_top_up(&self, state: &mut LedgerState, tx: &ShieldedTransaction, body: &TopUpBody) -> Result<(), RpcError> {
        if !tx.verify_owner_signature() {
            return Err(RpcError::InvalidSignature);
        }
        if body.amount == 0 {
            return Err(RpcError::Rejected("zero-amount top-up".into()));
        }
        if !body.opening.verify(
            self.verifier.pedersen_params(),
            &body.note.commitment,
            body.amount,
            body.owner.as_bytes(),
        ) {
            return Err(RpcError::Rejected("note does not commit to the top-up amount".into()));
        }

        let available = state.balances.get(&body.owner).copied().unwrap_or(0);
        if available < body.amount {
            return Err(RpcError::InsufficientFunds {
                required: body.amount,
                available,
            });
        }
        let key = body.note.commitment.to_bytes();
        if state.commitments.contains(&key) {
            return Err(RpcError::Rejected("commitment already published".into()));
        }

        state.balances.insert(body.owner, available - body.amount);
        state.commitments.insert(key);
        state.notes.push(body.note.clone());
        Ok(())
    }

    fn apply_send(&self, state: &mut LedgerState, body: &SendBody) -> Result<(), RpcError> {
        if body.nullifiers.is_empty() {
            return Err(RpcError::Rejected("send spends no notes".into()));
        }
        if body.amount == 0 {
            return Err(RpcError::Rejected("zero-amount send".into()));
        }
        let mut seen = HashSet::with_capacity(body.nullifiers.len());
        for nf in &body.nullifiers {
            if !seen.insert(*nf) || state.nullifier_set.contains(nf) {
                return Err(RpcError::DoubleSpend(*nf));
            }
        }
        if let Some(change) = &body.change {
            if state.commitments.contains(&change.commitment.to_bytes()) {
                return Err(RpcError::Rejected("change commitment already published".into()));
            }
        }

        let statement = body.statement();
        if !self.prover_key.verify(&statement.digest(), &body.attestation) {
            return Err(RpcError::InvalidSignature);
        }
        match self.verifier.verify(&body.proof, &statement) {
            Ok(true) => {}
            Ok(false) => return Err(RpcError::InvalidProof),
            Err(e) => {
                debug!(error = %e, "spend proof failed to decode");
                return Err(RpcError::InvalidProof);
            }
        }

        for nf in &body.nullifiers {
            state.nullifier_set.insert(*nf);
            state.nullifier_log.push(*nf);
        }
        if let Some(change) = &body.change {
            state.commitments.insert(change.commitment.to_bytes());
            state.notes.push(change.clone());
        }
        let balance = state.balances.entry(body.destination).or_default();
        *balance = balance.saturating_add(body.amount);
        Ok(())
    }
}

#[async_trait]
impl LedgerRpc for MemoryLedger {
    async fn request_airdrop(&self, to: &PublicKey, amount: u64) -> Result<TxSignature, RpcError> {
        if !self.airdrops_enabled {
            return Err(RpcError::AirdropUnavailable);
        }
        let mut state = self.state.lock();
        Self::check_transport(&mut state)?;

        state.airdrops += 1;
        let balance = state.balances.entry(*to).or_default();
        *balance = balance.saturating_add(amount);

        let mut preimage = to.as_bytes().to_vec();
        preimage.extend_from_slice(&amount.to_le_bytes());
        preimage.extend_from_slice(&state.airdrops.to_le_bytes());
        let signature = TxSignature::new(bs58::encode(double_sha256(&preimage)).into_string());
        Self::record(&mut state, signature.clone());
        info!(%to, amount, %signature, "airdrop credited");
        Ok(signature)
    }

    async fn confirm_transaction(&self, signature: &TxSignature) -> Result<ConfirmationStatus, RpcError> {
        let mut state = self.state.lock();
        Self::check_transport(&mut state)?;
        let tracked = state
            .statuses
            .get_mut(signature)
            .ok_or_else(|| RpcError::NotFound(signature.to_string()))?;
        if tracked.polls_left > 0 {
            tracked.polls_left -= 1;
            return Ok(ConfirmationStatus::Pending);
        }
        Ok(tracked.status.clone())
    }

    async fn submit(&self, tx: &ShieldedTransaction) -> Result<TxSignature, RpcError> {
        let mut state = self.state.lock();
        Self::check_transport(&mut state)?;
        state.submissions += 1;

        if tx.compute_id() != tx.id {
            return Err(RpcError::Rejected("transaction id does not match contents".into()));
        }
        let result = match &tx.body {
            TxBody::TopUp(body) => self.apply_top_up(&mut state, tx, body),
            TxBody::Send(body) => self.apply_send(&mut state, body),
        };
        if let Err(e) = result {
            warn!(tx = %tx.id, kind = %tx.kind(), error = %e, "transaction rejected");
            return Err(e);
        }

        let signature = tx.tx_signature();
        Self::record(&mut state, signature.clone());
        info!(tx = %tx.id, kind = %tx.kind(), amount = tx.amount(), "transaction accepted");
        Ok(signature)
    }

    async fn get_account_state(&self, address: &PublicKey) -> Result<AccountState, RpcError> {
        let mut state = self.state.lock();
        Self::check_transport(&mut state)?;
        Ok(AccountState {
            address: *address,
            balance: state.balances.get(address).copied().unwrap_or(0),
        })
    }

    async fn get_shielded_state(&self) -> Result<ShieldedState, RpcError> {
        let mut state = self.state.lock();
        Self::check_transport(&mut state)?;
        Ok(ShieldedState {
            notes: state.notes.clone(),
            nullifiers: state.nullifier_log.clone(),
        })
    }
}

impl std::fmt::Debug for MemoryLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("MemoryLedger")
            .field("accounts", &state.balances.len())
            .field("notes", &state.notes.len())
            .field("nullifiers", &state.nullifier_log.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keys::Keypair;
    use crate::crypto::seed::Seed;
    use crate::zkp::{OpeningProof, PedersenParams, ShieldedNote, SpendProver};
    use ark_std::rand::{rngs::StdRng, SeedableRng};
    use std::time::Duration;

    struct Fixture {
        ledger: MemoryLedger,
        params: PedersenParams,
        owner: Keypair,
    }

    fn fixture() -> Fixture {
        let mut rng = StdRng::seed_from_u64(11);
        let params = PedersenParams::setup(&mut rng);
        let (_, verifier) = SpendProver::setup(params.clone(), &mut rng).unwrap();
        let attester = Keypair::from_seed(&[6u8; 32]);
        Fixture {
            ledger: MemoryLedger::new(verifier, attester.public_key()),
            params,
            owner: Keypair::from_seed(&[1u8; 32]),
        }
    }

    fn signed_top_up(f: &Fixture, amount: u64, claimed: u64) -> ShieldedTransaction {
        let mut rng = StdRng::seed_from_u64(amount);
        let keys = Seed::from_bytes([2u8; 64]).note_keys();
        let note = ShieldedNote::fresh(&f.params, &keys, amount, &mut rng).unwrap();
        let opening = OpeningProof::prove(
            &f.params,
            note.commitment(),
            claimed,
            note.blinding(),
            f.owner.public_key().as_bytes(),
            &mut rng,
        );
        let mut tx = ShieldedTransaction::top_up(f.owner.public_key(), claimed, note.published(), opening);
        tx.signature = Some(f.owner.sign_message(&tx.signable_bytes()));
        tx
    }

    #[tokio::test]
    async fn top_up_moves_public_balance_into_pool() {
        let f = fixture();
        f.ledger.credit(f.owner.public_key(), 1_000);

        let tx = signed_top_up(&f, 600, 600);
        let sig = f.ledger.submit(&tx).await.unwrap();

        assert_eq!(f.ledger.balance_of(&f.owner.public_key()), 400);
        assert_eq!(f.ledger.get_shielded_state().await.unwrap().notes.len(), 1);
        assert_eq!(
            f.ledger.confirm_transaction(&sig).await.unwrap(),
            ConfirmationStatus::Confirmed
        );
    }

    #[tokio::test]
    async fn top_up_rejections() {
        let f = fixture();
        f.ledger.credit(f.owner.public_key(), 100);

        let too_big = signed_top_up(&f, 600, 600);
        assert!(matches!(
            f.ledger.submit(&too_big).await,
            Err(RpcError::InsufficientFunds { required: 600, available: 100 })
        ));

        let mut unsigned = signed_top_up(&f, 50, 50);
        unsigned.signature = None;
        assert!(matches!(f.ledger.submit(&unsigned).await, Err(RpcError::InvalidSignature)));

        // Note holds 90 but claims 50.
        let inflated = signed_top_up(&f, 90, 50);
        assert!(matches!(f.ledger.submit(&inflated).await, Err(RpcError::Rejected(_))));

        assert_eq!(f.ledger.balance_of(&f.owner.public_key()), 100);
        assert_eq!(f.ledger.submissions(), 3);
    }

    #[tokio::test]
    async fn duplicate_commitment_is_rejected() {
        let f = fixture();
        f.ledger.credit(f.owner.public_key(), 1_000);
        let tx = signed_top_up(&f, 10, 10);
        f.ledger.submit(&tx).await.unwrap();
        assert!(matches!(f.ledger.submit(&tx).await, Err(RpcError::Rejected(_))));
        assert_eq!(f.ledger.balance_of(&f.owner.public_key()), 990);
    }

    #[tokio::test]
    async fn transport_failures_leave_state_untouched() {
        let f = fixture();
        f.ledger.credit(f.owner.public_key(), 1_000);
        f.ledger.inject_transport_failures(1);

        let tx = signed_top_up(&f, 10, 10);
        assert!(matches!(f.ledger.submit(&tx).await, Err(RpcError::Transport(_))));
        assert_eq!(f.ledger.submissions(), 0);
        assert!(f.ledger.submit(&tx).await.is_ok());
    }

    #[tokio::test]
    async fn delayed_confirmation_reports_pending_first() {
        let f = fixture();
        f.ledger.delay_confirmations(2);
        let sig = f
            .ledger
            .request_airdrop(&f.owner.public_key(), 5)
            .await
            .unwrap();

        assert_eq!(f.ledger.confirm_transaction(&sig).await.unwrap(), ConfirmationStatus::Pending);
        assert_eq!(f.ledger.confirm_transaction(&sig).await.unwrap(), ConfirmationStatus::Pending);
        assert_eq!(f.ledger.confirm_transaction(&sig).await.unwrap(), ConfirmationStatus::Confirmed);
    }

    #[tokio::test]
    async fn airdrop_can_be_disabled() {
        let f = fixture();
        let ledger = f.ledger.without_airdrops();
        assert!(matches!(
            ledger.request_airdrop(&f.owner.public_key(), 5).await,
            Err(RpcError::AirdropUnavailable)
        ));
    }

    #[tokio::test]
    async fn unknown_signature_is_not_found() {
        let f = fixture();
        assert!(matches!(
            f.ledger.confirm_transaction(&TxSignature::new("nope")).await,
            Err(RpcError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn await_confirmation_rides_out_pending_polls_and_transport_errors() {
        let f = fixture();
        f.ledger.delay_confirmations(3);
        let sig = f
            .ledger
            .request_airdrop(&f.owner.public_key(), 5)
            .await
            .unwrap();
        f.ledger.inject_transport_failures(2);

        crate::rpc::await_confirmation(&f.ledger, &sig, Duration::from_secs(5), Duration::from_millis(1))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn await_confirmation_times_out_as_transport_error() {
        let f = fixture();
        f.ledger.delay_confirmations(u32::MAX);
        let sig = f
            .ledger
            .request_airdrop(&f.owner.public_key(), 5)
            .await
            .unwrap();

        let result =
            crate::rpc::await_confirmation(&f.ledger, &sig, Duration::from_millis(20), Duration::from_millis(2)).await;
        assert!(matches!(result, Err(RpcError::Transport(_))));
    }

    #[tokio::test]
    async fn await_confirmation_stops_on_a_permanent_error() {
        let f = fixture();
        let result = crate::rpc::await_confirmation(
            &f.ledger,
            &TxSignature::new("nope"),
            Duration::from_secs(5),
            Duration::from_millis(1),
        )
        .await;
        assert!(matches!(result, Err(RpcError::NotFound(_))));
    }
}
