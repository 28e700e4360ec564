//! Turns intents ("top up 0.5", "send 0.4 to X") into ledger transactions
//! and walks them through their lifecycle.
//!
//! Store effects are applied only once the ledger confirms: a top-up's note
//! and a send's change note enter the store on confirmation, and a send's
//! inputs go from reserved to spent at the same moment. Any failure before
//! that point releases the reservation, and so does dropping the pending
//! transaction or cancelling the future that holds it.

use chrono::{DateTime, Utc};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::builder::{SendBody, ShieldedTransaction, TxBody};
use super::types::{TxKind, TxState};
use crate::config::EngineConfig;
use crate::crypto::keys::{KeyHolder, PublicKey};
use crate::engine::EngineError;
use crate::prover::{ProofRequester, SpendDescription};
use crate::rpc::{self, LedgerRpc, RpcError, TxSignature};
use crate::store::{CommitmentId, ReservationGuard, ReservationId, SharedStore};
use crate::zkp::{OpeningProof, ShieldedNote};

// ---------------------------------------------------------------------------
// PendingTransaction
// ---------------------------------------------------------------------------

/// A transaction plus the store effects it carries.
#[derive(Debug)]
pub struct PendingTransaction {
    tx: ShieldedTransaction,
    state: TxState,
    reservation: Option<ReservationGuard>,
    inputs: Vec<CommitmentId>,
    notes_on_confirm: Vec<ShieldedNote>,
}

impl PendingTransaction {
    pub fn tx(&self) -> &ShieldedTransaction {
        &self.tx
    }

    pub fn kind(&self) -> TxKind {
        self.tx.kind()
    }

    pub fn state(&self) -> TxState {
        self.state
    }

    pub fn reservation(&self) -> Option<ReservationId> {
        self.reservation.as_ref().map(ReservationGuard::id)
    }

    /// Amount of the change note, if the send produces one.
    pub fn change_amount(&self) -> Option<u64> {
        match self.kind() {
            TxKind::Send => self.notes_on_confirm.first().map(ShieldedNote::amount),
            TxKind::TopUp => None,
        }
    }

    fn advance(&mut self, next: TxState) -> Result<(), EngineError> {
        if !self.state.can_transition_to(next, self.kind()) {
            return Err(EngineError::InvalidState(format!(
                "{} transaction cannot move from {} to {}",
                self.kind(),
                self.state,
                next
            )));
        }
        self.state = next;
        Ok(())
    }
}

/// What a confirmed transaction left behind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxReceipt {
    pub signature: TxSignature,
    pub tx_id: String,
    pub kind: TxKind,
    pub amount: u64,
    /// Change returned to the pool, sends only.
    pub change: Option<u64>,
    pub submitted_at: DateTime<Utc>,
    pub confirmed_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// TxAssembler
// ---------------------------------------------------------------------------

pub struct TxAssembler {
    store: SharedStore,
    requester: ProofRequester,
    ledger: Arc<dyn LedgerRpc>,
    owner: PublicKey,
    confirmation_timeout: Duration,
    poll_interval: Duration,
}

impl TxAssembler {
    pub fn new(
        store: SharedStore,
        requester: ProofRequester,
        ledger: Arc<dyn LedgerRpc>,
        owner: PublicKey,
        config: &EngineConfig,
    ) -> Self {
        Self {
            store,
            requester,
            ledger,
            owner,
            confirmation_timeout: config.confirmation_timeout,
            poll_interval: config.confirmation_poll_interval,
        }
    }

    /// A top-up of `amount` from the owner's public balance into a fresh
    /// note. Must be signed before submission.
    pub fn build_top_up(&self, amount: u64) -> Result<PendingTransaction, EngineError> {
        if amount == 0 {
            return Err(EngineError::ZeroAmount);
        }

        let (note, opening) = {
            let store = self.store.lock();
            let note = ShieldedNote::fresh(store.params(), store.keys(), amount, &mut OsRng)?;
            let opening = OpeningProof::prove(
                store.params(),
                note.commitment(),
                amount,
                note.blinding(),
                self.owner.as_bytes(),
                &mut OsRng,
            );
            (note, opening)
        };

        let tx = ShieldedTransaction::top_up(self.owner, amount, note.published(), opening);
        debug!(tx = %tx.id, amount, "top-up built");
        Ok(PendingTransaction {
            tx,
            state: TxState::Built,
            reservation: None,
            inputs: Vec::new(),
            notes_on_confirm: vec![note],
        })
    }

    /// Sign a built top-up with the owner's key.
    pub fn sign(&self, pending: &mut PendingTransaction, holder: &dyn KeyHolder) -> Result<(), EngineError> {
        let owner = match &pending.tx.body {
            TxBody::TopUp(body) => body.owner,
            TxBody::Send(_) => {
                return Err(EngineError::InvalidState(
                    "sends are authorised by their proof, not signed".into(),
                ))
            }
        };
        if holder.public_key() != owner {
            return Err(EngineError::SigningUnavailable(format!(
                "holder {} does not own top-up account {}",
                holder.public_key(),
                owner
            )));
        }
        if !pending.state.can_transition_to(TxState::Signed, TxKind::TopUp) {
            return Err(EngineError::InvalidState(format!(
                "top-up in state {} cannot be signed",
                pending.state
            )));
        }

        let signature = holder
            .sign(&pending.tx.signable_bytes())
            .map_err(|e| EngineError::SigningUnavailable(e.to_string()))?;
        pending.tx.signature = Some(signature);
        pending.advance(TxState::Signed)
    }

    /// A private send of `amount` to `destination`.
    ///
    /// Inputs are reserved before the prover is contacted; a shortfall fails
    /// here without any remote call. The reservation is held by a guard from
    /// that point on: an error, or dropping this future, releases it.
    pub async fn build_send(&self, amount: u64, destination: PublicKey) -> Result<PendingTransaction, EngineError> {
        if amount == 0 {
            return Err(EngineError::ZeroAmount);
        }

        let (guard, reservation) = ReservationGuard::reserve(&self.store, amount)?;
        let (tx, change) = self
            .prove_send(&reservation.inputs, amount, reservation.change(), destination)
            .await?;

        debug!(
            tx = %tx.id,
            reservation = %reservation.id,
            inputs = reservation.inputs.len(),
            change = reservation.change(),
            "send built"
        );
        Ok(PendingTransaction {
            tx,
            state: TxState::Built,
            reservation: Some(guard),
            inputs: reservation.inputs.iter().map(|(id, _)| *id).collect(),
            notes_on_confirm: change.into_iter().collect(),
        })
    }

    async fn prove_send(
        &self,
        inputs: &[(CommitmentId, ShieldedNote)],
        amount: u64,
        change: u64,
        destination: PublicKey,
    ) -> Result<(ShieldedTransaction, Option<ShieldedNote>), EngineError> {
        let change_note = if change > 0 {
            let store = self.store.lock();
            Some(ShieldedNote::fresh(store.params(), store.keys(), change, &mut OsRng)?)
        } else {
            None
        };

        let spend = SpendDescription {
            inputs: inputs.iter().map(|(_, note)| note.clone()).collect(),
            amount,
            destination,
            change: change_note,
        };
        let response = self.requester.request(&spend).await?;

        let tx = ShieldedTransaction::send(SendBody {
            nullifiers: spend.nullifiers(),
            input_sum: spend.input_sum(),
            change: spend.change.as_ref().map(ShieldedNote::published),
            destination,
            amount,
            proof: response.proof,
            attestation: response.attestation,
        });
        Ok((tx, spend.change))
    }

    /// Submit and wait for confirmation. Never resubmits.
    pub async fn submit(&self, mut pending: PendingTransaction) -> Result<TxReceipt, EngineError> {
        // Wrong state: `pending` drops here and its guard frees the inputs.
        pending.advance(TxState::Submitted)?;
        let submitted_at = Utc::now();

        let signature = match self.ledger.submit(&pending.tx).await {
            Ok(signature) => signature,
            Err(e) => return Err(self.fail(&mut pending, e)),
        };
        info!(tx = %pending.tx.id, %signature, kind = %pending.kind(), "transaction submitted");

        if let Err(e) = self.await_confirmation(&signature).await {
            return Err(self.fail(&mut pending, e));
        }
        pending.advance(TxState::Confirmed)?;

        let change = match pending.kind() {
            TxKind::Send => Some(pending.change_amount().unwrap_or(0)),
            TxKind::TopUp => None,
        };
        // Disarm before locking: a guard dropped under the lock would deadlock.
        let reservation = pending.reservation.take().map(ReservationGuard::disarm);
        {
            let mut store = self.store.lock();
            if let Some(id) = reservation {
                if let Err(e) = store.finalize(id) {
                    // Reconciliation got there first; mark inputs directly.
                    debug!(reservation = %id, error = %e, "finalizing inputs one by one");
                    for cid in &pending.inputs {
                        if let Err(e) = store.mark_spent(*cid) {
                            debug!(commitment = %cid, error = %e, "input not marked spent");
                        }
                    }
                }
            }
            for note in pending.notes_on_confirm.drain(..) {
                store.insert_note(note);
            }
        }

        let receipt = TxReceipt {
            signature,
            tx_id: pending.tx.id.clone(),
            kind: pending.kind(),
            amount: pending.tx.amount(),
            change,
            submitted_at,
            confirmed_at: Utc::now(),
        };
        info!(tx = %receipt.tx_id, signature = %receipt.signature, "transaction confirmed");
        Ok(receipt)
    }

    /// Drop a transaction that will not be submitted, freeing its inputs.
    pub fn abandon(&self, mut pending: PendingTransaction) {
        // The guard releases as it drops.
        drop(pending.reservation.take());
        debug!(tx = %pending.tx.id, "transaction abandoned");
    }

    async fn await_confirmation(&self, signature: &TxSignature) -> Result<(), RpcError> {
        rpc::await_confirmation(
            self.ledger.as_ref(),
            signature,
            self.confirmation_timeout,
            self.poll_interval,
        )
        .await
    }

    fn fail(&self, pending: &mut PendingTransaction, error: RpcError) -> EngineError {
        warn!(tx = %pending.tx.id, kind = %pending.kind(), error = %error, "submission failed");
        pending.state = TxState::Rejected;
        drop(pending.reservation.take());
        EngineError::SubmissionFailed(error)
    }
}

impl std::fmt::Debug for TxAssembler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TxAssembler")
            .field("owner", &self.owner)
            .field("requester", &self.requester)
            .finish_non_exhaustive()
    }
}
