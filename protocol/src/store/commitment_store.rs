use ark_bn254::Fr;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, info, warn};

use super::selection::{self, Candidate, Selection};
use super::{CommitmentId, ReservationId, StoreError};
use crate::config::EXACT_MATCH_SEARCH_BUDGET;
use crate::crypto::seed::NoteKeys;
use crate::rpc::ShieldedState;
use crate::zkp::{Nullifier, PedersenParams, ShieldedNote};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteStatus {
    Unspent,
    /// Held by an in-flight send.
    Reserved(ReservationId),
    Spent,
}

/// A note plus its local bookkeeping.
#[derive(Debug, Clone)]
pub struct StoredNote {
    pub id: CommitmentId,
    pub note: ShieldedNote,
    pub status: NoteStatus,
    pub added_at: DateTime<Utc>,
}

/// Inputs promised to one send. Handed out by [`CommitmentStore::reserve`];
/// the store keeps its own record keyed by `id`.
#[derive(Debug, Clone)]
pub struct Reservation {
    pub id: ReservationId,
    /// Amount the reservation was made for.
    pub amount: u64,
    pub inputs: Vec<(CommitmentId, ShieldedNote)>,
    /// Sum of input amounts. Always `>= amount`.
    pub total: u64,
    pub created_at: DateTime<Utc>,
}

impl Reservation {
    /// `total - amount`; zero for an exact match.
    pub fn change(&self) -> u64 {
        self.total - self.amount
    }

    pub fn nullifiers(&self) -> Vec<Nullifier> {
        self.inputs.iter().map(|(_, n)| n.nullifier()).collect()
    }
}

/// What a reconciliation pass changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Published notes of ours the store did not know about.
    pub discovered: usize,
    /// Local notes whose nullifier turned up on the ledger.
    pub newly_spent: usize,
    /// Local notes the ledger does not know. Removed.
    pub dropped: usize,
    /// Reservations cancelled because their inputs were spent or dropped.
    pub released_reservations: usize,
    /// Notes tagged for us that failed to decrypt or open.
    pub corrupt: usize,
}

// ---------------------------------------------------------------------------
// CommitmentStore
// ---------------------------------------------------------------------------

/// Notes owned by one seed.
pub struct CommitmentStore {
    params: PedersenParams,
    keys: NoteKeys,
    next_id: u64,
    notes: BTreeMap<CommitmentId, StoredNote>,
    by_commitment: HashMap<Vec<u8>, CommitmentId>,
    reservations: HashMap<ReservationId, Reservation>,
    search_budget: usize,
}

impl CommitmentStore {
    pub fn new(params: PedersenParams, keys: NoteKeys) -> Self {
        Self {
            params,
            keys,
            next_id: 1,
            notes: BTreeMap::new(),
            by_commitment: HashMap::new(),
            reservations: HashMap::new(),
            search_budget: EXACT_MATCH_SEARCH_BUDGET,
        }
    }

    pub fn params(&self) -> &PedersenParams {
        &self.params
    }

    pub fn keys(&self) -> &NoteKeys {
        &self.keys
    }

    // -- Insertion ----------------------------------------------------------

    /// Record a note from its opening. Commitment, tag and nullifier are
    /// computed here. Adding a commitment already present returns its id.
    pub fn add_commitment(&mut self, amount: u64, blinding: Fr) -> Result<CommitmentId, StoreError> {
        let note = ShieldedNote::new(&self.params, &self.keys, amount, blinding)?;
        Ok(self.insert_note(note))
    }

    /// Record a fully built note. Idempotent per commitment.
    pub fn insert_note(&mut self, note: ShieldedNote) -> CommitmentId {
        let key = note.commitment().to_bytes();
        if let Some(id) = self.by_commitment.get(&key) {
            return *id;
        }

        let id = CommitmentId(self.next_id);
        self.next_id += 1;
        debug!(%id, amount = note.amount(), "commitment added");

        self.by_commitment.insert(key, id);
        self.notes.insert(
            id,
            StoredNote {
                id,
                note,
                status: NoteStatus::Unspent,
                added_at: Utc::now(),
            },
        );
        id
    }

    // -- Queries ------------------------------------------------------------

    pub fn get(&self, id: CommitmentId) -> Option<&StoredNote> {
        self.notes.get(&id)
    }

    pub fn notes(&self) -> impl Iterator<Item = &StoredNote> {
        self.notes.values()
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// Sum over every note not yet spent, reserved ones included.
    pub fn unspent_total(&self) -> u64 {
        self.sum_where(|s| !matches!(s, NoteStatus::Spent))
    }

    /// Sum over notes free to be selected right now.
    pub fn available_total(&self) -> u64 {
        self.sum_where(|s| matches!(s, NoteStatus::Unspent))
    }

    fn sum_where(&self, pred: impl Fn(&NoteStatus) -> bool) -> u64 {
        self.notes
            .values()
            .filter(|n| pred(&n.status))
            .fold(0u64, |acc, n| acc.saturating_add(n.note.amount()))
    }

    pub fn reservation(&self, id: ReservationId) -> Option<&Reservation> {
        self.reservations.get(&id)
    }

    pub fn reservation_count(&self) -> usize {
        self.reservations.len()
    }

    // -- Selection & reservation -------------------------------------------

    /// Choose inputs covering `amount` among unreserved unspent notes.
    /// Does not reserve them.
    pub fn select_for_spend(&self, amount: u64) -> Result<Selection, StoreError> {
        if amount == 0 {
            return Err(StoreError::ZeroAmount);
        }
        let candidates: Vec<Candidate> = self
            .notes
            .values()
            .filter(|n| n.status == NoteStatus::Unspent)
            .map(|n| Candidate {
                id: n.id,
                amount: n.note.amount(),
            })
            .collect();

        selection::select(&candidates, amount, self.search_budget).ok_or(
            StoreError::InsufficientPrivateBalance {
                requested: amount,
                available: self.available_total(),
            },
        )
    }

    /// Select inputs for `amount` and mark them reserved, in one step.
    pub fn reserve(&mut self, amount: u64) -> Result<Reservation, StoreError> {
        let selection = self.select_for_spend(amount)?;
        let id = ReservationId::new();

        let mut inputs = Vec::with_capacity(selection.ids.len());
        for cid in &selection.ids {
            let stored = self
                .notes
                .get_mut(cid)
                .ok_or(StoreError::UnknownCommitment(*cid))?;
            stored.status = NoteStatus::Reserved(id);
            inputs.push((*cid, stored.note.clone()));
        }

        let reservation = Reservation {
            id,
            amount,
            inputs,
            total: selection.total,
            created_at: Utc::now(),
        };
        debug!(
            reservation = %id,
            amount,
            inputs = reservation.inputs.len(),
            total = reservation.total,
            exact = selection.exact,
            "inputs reserved"
        );
        self.reservations.insert(id, reservation.clone());
        Ok(reservation)
    }

    /// Return a reservation's inputs to the unspent pool.
    pub fn release(&mut self, id: ReservationId) -> Result<(), StoreError> {
        let reservation = self
            .reservations
            .remove(&id)
            .ok_or(StoreError::UnknownReservation(id))?;
        for (cid, _) in &reservation.inputs {
            if let Some(stored) = self.notes.get_mut(cid) {
                if stored.status == NoteStatus::Reserved(id) {
                    stored.status = NoteStatus::Unspent;
                }
            }
        }
        debug!(reservation = %id, "reservation released");
        Ok(())
    }

    /// Mark a reservation's inputs spent. Called once the send is confirmed.
    pub fn finalize(&mut self, id: ReservationId) -> Result<(), StoreError> {
        let reservation = self
            .reservations
            .remove(&id)
            .ok_or(StoreError::UnknownReservation(id))?;
        for (cid, _) in &reservation.inputs {
            if let Some(stored) = self.notes.get_mut(cid) {
                stored.status = NoteStatus::Spent;
            }
        }
        debug!(reservation = %id, "reservation finalized");
        Ok(())
    }

    /// Mark one note spent. Idempotent. A reserved note leaves its
    /// reservation.
    pub fn mark_spent(&mut self, id: CommitmentId) -> Result<(), StoreError> {
        let stored = self
            .notes
            .get_mut(&id)
            .ok_or(StoreError::UnknownCommitment(id))?;
        if let NoteStatus::Reserved(rid) = stored.status {
            if let Some(r) = self.reservations.get_mut(&rid) {
                r.inputs.retain(|(cid, _)| *cid != id);
            }
        }
        stored.status = NoteStatus::Spent;
        Ok(())
    }

    // -- Reconciliation -----------------------------------------------------

    /// Bring local state in line with a ledger snapshot.
    ///
    /// 1. Published notes tagged for us and unknown locally are recovered
    ///    and added.
    /// 2. Local notes whose nullifier is published become spent.
    /// 3. Local notes whose commitment is not published are dropped.
    ///
    /// Any reservation touching a note changed by 2 or 3 is cancelled and
    /// its remaining inputs return to the pool.
    pub fn reconcile(&mut self, state: &ShieldedState) -> ReconcileReport {
        let mut report = ReconcileReport::default();

        let published: HashSet<Vec<u8>> = state
            .notes
            .iter()
            .map(|n| n.commitment.to_bytes())
            .collect();
        let spent: HashSet<Nullifier> = state.nullifiers.iter().copied().collect();

        for published_note in &state.notes {
            if self
                .by_commitment
                .contains_key(&published_note.commitment.to_bytes())
            {
                continue;
            }
            match ShieldedNote::recover(&self.params, &self.keys, published_note) {
                Ok(Some(note)) => {
                    self.insert_note(note);
                    report.discovered += 1;
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(commitment = ?published_note.commitment, error = %e, "skipping corrupt note");
                    report.corrupt += 1;
                }
            }
        }

        let mut touched_reservations = HashSet::new();
        let mut to_drop = Vec::new();
        for stored in self.notes.values_mut() {
            let on_ledger = published.contains(&stored.note.commitment().to_bytes());
            let nullified = spent.contains(&stored.note.nullifier());

            if let NoteStatus::Reserved(rid) = stored.status {
                if nullified || !on_ledger {
                    touched_reservations.insert(rid);
                }
            }

            if nullified {
                if stored.status != NoteStatus::Spent {
                    stored.status = NoteStatus::Spent;
                    report.newly_spent += 1;
                }
            } else if !on_ledger {
                to_drop.push(stored.id);
            }
        }

        for id in to_drop {
            if let Some(stored) = self.notes.remove(&id) {
                self.by_commitment.remove(&stored.note.commitment().to_bytes());
                report.dropped += 1;
            }
        }

        for rid in touched_reservations {
            if let Some(reservation) = self.reservations.remove(&rid) {
                for (cid, _) in &reservation.inputs {
                    if let Some(stored) = self.notes.get_mut(cid) {
                        if stored.status == NoteStatus::Reserved(rid) {
                            stored.status = NoteStatus::Unspent;
                        }
                    }
                }
                report.released_reservations += 1;
            }
        }

        info!(
            discovered = report.discovered,
            newly_spent = report.newly_spent,
            dropped = report.dropped,
            unspent = self.unspent_total(),
            "reconciled with ledger"
        );
        report
    }
}

impl std::fmt::Debug for CommitmentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommitmentStore")
            .field("notes", &self.notes.len())
            .field("reservations", &self.reservations.len())
            .field("unspent_total", &self.unspent_total())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::seed::Seed;
    use crate::zkp::PublishedNote;
    use ark_std::test_rng;

    fn store() -> CommitmentStore {
        let params = PedersenParams::setup(&mut test_rng());
        CommitmentStore::new(params, Seed::from_bytes([4u8; 64]).note_keys())
    }

    fn add(store: &mut CommitmentStore, amount: u64, salt: &[u8]) -> CommitmentId {
        let r = store.keys().blinding_for(salt);
        store.add_commitment(amount, r).unwrap()
    }

    fn ledger_view(store: &CommitmentStore) -> ShieldedState {
        ShieldedState {
            notes: store.notes().map(|s| s.note.published()).collect(),
            nullifiers: Vec::new(),
        }
    }

    #[test]
    fn add_is_idempotent_per_commitment() {
        let mut s = store();
        let a = add(&mut s, 100, b"a");
        let again = add(&mut s, 100, b"a");
        assert_eq!(a, again);
        assert_eq!(s.len(), 1);
        assert_eq!(s.unspent_total(), 100);
    }

    #[test]
    fn mark_spent_is_idempotent() {
        let mut s = store();
        let a = add(&mut s, 100, b"a");
        add(&mut s, 50, b"b");
        s.mark_spent(a).unwrap();
        s.mark_spent(a).unwrap();
        assert_eq!(s.unspent_total(), 50);
        assert!(matches!(
            s.mark_spent(CommitmentId(99)),
            Err(StoreError::UnknownCommitment(_))
        ));
    }

    #[test]
    fn reserved_counts_as_unspent_but_not_available() {
        let mut s = store();
        add(&mut s, 300, b"a");
        add(&mut s, 200, b"b");

        let r = s.reserve(300).unwrap();
        assert_eq!(r.inputs.len(), 1);
        assert_eq!(r.change(), 0);
        assert_eq!(s.unspent_total(), 500);
        assert_eq!(s.available_total(), 200);
    }

    #[test]
    fn reserved_notes_are_not_selected_twice() {
        let mut s = store();
        add(&mut s, 500, b"a");
        s.reserve(400).unwrap();
        assert!(matches!(
            s.reserve(1),
            Err(StoreError::InsufficientPrivateBalance {
                requested: 1,
                available: 0
            })
        ));
    }

    #[test]
    fn release_returns_inputs_and_finalize_spends_them() {
        let mut s = store();
        add(&mut s, 500, b"a");

        let r = s.reserve(400).unwrap();
        assert_eq!(r.change(), 100);
        s.release(r.id).unwrap();
        assert_eq!(s.available_total(), 500);
        assert!(s.release(r.id).is_err());

        let r = s.reserve(400).unwrap();
        s.finalize(r.id).unwrap();
        assert_eq!(s.unspent_total(), 0);
        assert_eq!(s.reservation_count(), 0);
    }

    #[test]
    fn dropping_a_guard_releases_its_reservation() {
        use crate::store::ReservationGuard;
        use parking_lot::Mutex;
        use std::sync::Arc;

        let shared = Arc::new(Mutex::new(store()));
        add(&mut shared.lock(), 500, b"a");

        let (guard, r) = ReservationGuard::reserve(&shared, 400).unwrap();
        assert_eq!(guard.id(), r.id);
        assert_eq!(shared.lock().available_total(), 0);
        drop(guard);
        assert_eq!(shared.lock().available_total(), 500);
        assert_eq!(shared.lock().reservation_count(), 0);

        // A disarmed guard leaves the reservation to its caller.
        let (guard, _) = ReservationGuard::reserve(&shared, 400).unwrap();
        let id = guard.disarm();
        assert_eq!(shared.lock().available_total(), 0);
        shared.lock().finalize(id).unwrap();
        assert_eq!(shared.lock().unspent_total(), 0);
    }

    #[test]
    fn guard_tolerates_a_reservation_cancelled_elsewhere() {
        use crate::store::ReservationGuard;
        use parking_lot::Mutex;
        use std::sync::Arc;

        let shared = Arc::new(Mutex::new(store()));
        add(&mut shared.lock(), 500, b"a");

        let (guard, r) = ReservationGuard::reserve(&shared, 100).unwrap();
        shared.lock().release(r.id).unwrap();
        drop(guard);
        assert_eq!(shared.lock().available_total(), 500);
    }

    #[test]
    fn zero_amount_is_rejected() {
        let mut s = store();
        add(&mut s, 5, b"a");
        assert!(matches!(s.select_for_spend(0), Err(StoreError::ZeroAmount)));
    }

    #[test]
    fn reconcile_discovers_notes_from_ledger() {
        let mut original = store();
        add(&mut original, 700, b"a");
        add(&mut original, 300, b"b");
        let view = ledger_view(&original);

        // Same seed, same params, empty store: a fresh device.
        let mut fresh = CommitmentStore::new(
            original.params().clone(),
            Seed::from_bytes([4u8; 64]).note_keys(),
        );
        let report = fresh.reconcile(&view);
        assert_eq!(report.discovered, 2);
        assert_eq!(fresh.unspent_total(), 1_000);

        // A second pass changes nothing.
        assert_eq!(fresh.reconcile(&view), ReconcileReport::default());
    }

    #[test]
    fn reconcile_ignores_other_owners() {
        let mut ours = store();
        let theirs_note = ShieldedNote::new(
            ours.params(),
            &Seed::from_bytes([5u8; 64]).note_keys(),
            1_000,
            Fr::from(77u64),
        )
        .unwrap();
        let view = ShieldedState {
            notes: vec![theirs_note.published()],
            nullifiers: Vec::new(),
        };
        let report = ours.reconcile(&view);
        assert_eq!(report.discovered, 0);
        assert_eq!(ours.unspent_total(), 0);
    }

    #[test]
    fn reconcile_marks_published_nullifiers_spent() {
        let mut s = store();
        let a = add(&mut s, 700, b"a");
        add(&mut s, 300, b"b");
        let mut view = ledger_view(&s);
        view.nullifiers
            .push(s.get(a).unwrap().note.nullifier());

        let report = s.reconcile(&view);
        assert_eq!(report.newly_spent, 1);
        assert_eq!(s.unspent_total(), 300);
    }

    #[test]
    fn reconcile_drops_unknown_commitments_and_cancels_reservations() {
        let mut s = store();
        add(&mut s, 700, b"a");
        let view = ledger_view(&s);
        let ghost = add(&mut s, 300, b"ghost");

        let r = s.reserve(1_000).unwrap();
        assert_eq!(r.inputs.len(), 2);

        let report = s.reconcile(&view);
        assert_eq!(report.dropped, 1);
        assert_eq!(report.released_reservations, 1);
        assert!(s.get(ghost).is_none());
        assert_eq!(s.available_total(), 700);
        assert!(s.reservation(r.id).is_none());
    }

    #[test]
    fn reconcile_counts_corrupt_notes() {
        let mut s = store();
        let note = ShieldedNote::new(s.params(), s.keys(), 10, Fr::from(3u64)).unwrap();
        let mut published: PublishedNote = note.published();
        let last = published.ciphertext.len() - 1;
        published.ciphertext[last] ^= 1;

        let report = s.reconcile(&ShieldedState {
            notes: vec![published],
            nullifiers: Vec::new(),
        });
        assert_eq!(report.corrupt, 1);
        assert_eq!(report.discovered, 0);
    }
}
