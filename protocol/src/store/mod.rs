//! # Commitment Store
//!
//! The engine's view of one seed's shielded balance: which notes it owns,
//! which are spent, and which are promised to an in-flight send.
//!
//! ```text
//!            reserve                finalize
//! Unspent ───────────▶ Reserved ───────────────▶ Spent
//!    ▲                    │
//!    └────── release ─────┘
//! ```
//!
//! The store is a plain struct. The client wraps it in a
//! `parking_lot::Mutex` ([`SharedStore`]) so that selecting inputs and
//! marking them reserved happen under one lock acquisition; two concurrent
//! sends can never both hold the same note.
//!
//! The ledger stays the source of truth. [`CommitmentStore::reconcile`]
//! rebuilds local state from a ledger snapshot whenever the two may have
//! drifted.

pub mod commitment_store;
pub mod selection;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::zkp::NoteError;

pub use commitment_store::{CommitmentStore, NoteStatus, ReconcileReport, Reservation, StoredNote};
pub use selection::{Candidate, Selection};

/// The store as shared between a client and its in-flight operations.
pub type SharedStore = Arc<Mutex<CommitmentStore>>;

/// Local handle of a stored commitment. Assigned in insertion order; never
/// reused within one store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CommitmentId(pub u64);

impl fmt::Display for CommitmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "c#{}", self.0)
    }
}

/// Handle of a set of reserved inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReservationId(pub Uuid);

impl ReservationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ReservationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ReservationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Owns a live reservation. Dropping the guard releases its inputs back to
/// the pool, so a send that is dropped or cancelled mid-flight cannot strand
/// notes. [`ReservationGuard::disarm`] hands the id back without releasing.
///
/// The drop locks the store: never let a guard go out of scope while that
/// lock is held.
pub struct ReservationGuard {
    store: SharedStore,
    id: ReservationId,
    armed: bool,
}

impl ReservationGuard {
    pub fn new(store: SharedStore, id: ReservationId) -> Self {
        Self {
            store,
            id,
            armed: true,
        }
    }

    /// Reserve `amount` and wrap the reservation in one step.
    pub fn reserve(store: &SharedStore, amount: u64) -> Result<(Self, Reservation), StoreError> {
        let reservation = store.lock().reserve(amount)?;
        Ok((Self::new(store.clone(), reservation.id), reservation))
    }

    pub fn id(&self) -> ReservationId {
        self.id
    }

    /// Stop tracking the reservation and return its id. The caller now
    /// decides whether to finalize or release it.
    pub fn disarm(mut self) -> ReservationId {
        self.armed = false;
        self.id
    }
}

impl Drop for ReservationGuard {
    fn drop(&mut self) {
        if self.armed {
            if let Err(e) = self.store.lock().release(self.id) {
                tracing::debug!(reservation = %self.id, error = %e, "reservation already gone");
            }
        }
    }
}

impl fmt::Debug for ReservationGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReservationGuard")
            .field("id", &self.id)
            .field("armed", &self.armed)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    /// Unreserved unspent notes do not cover the request.
    #[error("insufficient private balance: requested {requested}, available {available}")]
    InsufficientPrivateBalance { requested: u64, available: u64 },

    #[error("amount must be greater than zero")]
    ZeroAmount,

    #[error("unknown commitment {0}")]
    UnknownCommitment(CommitmentId),

    #[error("unknown reservation {0}")]
    UnknownReservation(ReservationId),

    #[error(transparent)]
    Note(#[from] NoteError),
}
