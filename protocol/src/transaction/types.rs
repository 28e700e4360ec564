//! Vocabulary of shielded transactions: what kind of transaction it is and
//! where it is in its lifecycle.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// TxKind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TxKind {
    /// Public balance → new shielded note. Authorised by the owner's signature.
    TopUp,
    /// Shielded notes → public credit to a destination, change back into the
    /// pool. Authorised by a spend proof.
    Send,
}

impl fmt::Display for TxKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TopUp => write!(f, "TopUp"),
            Self::Send => write!(f, "Send"),
        }
    }
}

// ---------------------------------------------------------------------------
// TxState
// ---------------------------------------------------------------------------

/// Lifecycle of a pending transaction.
///
/// ```text
/// Built ──sign──▶ Signed ──submit──▶ Submitted ──▶ Confirmed
///   │                                    │
///   └──────────── submit (Send) ─────────┘──────▶ Rejected
/// ```
///
/// Top-ups must be signed before submission. Sends go straight from
/// `Built` to `Submitted`; the proof is their authorisation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TxState {
    Built,
    Signed,
    Submitted,
    Confirmed,
    Rejected,
}

impl TxState {
    /// Whether `self → next` is a legal move for a transaction of `kind`.
    pub fn can_transition_to(self, next: TxState, kind: TxKind) -> bool {
        use TxState::*;
        matches!(
            (self, next, kind),
            (Built, Signed, TxKind::TopUp)
                | (Signed, Submitted, TxKind::TopUp)
                | (Built, Submitted, TxKind::Send)
                | (Submitted, Confirmed, _)
                | (Submitted, Rejected, _)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, TxState::Confirmed | TxState::Rejected)
    }
}

impl fmt::Display for TxState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Built => write!(f, "Built"),
            Self::Signed => write!(f, "Signed"),
            Self::Submitted => write!(f, "Submitted"),
            Self::Confirmed => write!(f, "Confirmed"),
            Self::Rejected => write!(f, "Rejected"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn top_up_must_be_signed_first() {
        assert!(TxState::Built.can_transition_to(TxState::Signed, TxKind::TopUp));
        assert!(TxState::Signed.can_transition_to(TxState::Submitted, TxKind::TopUp));
        assert!(!TxState::Built.can_transition_to(TxState::Submitted, TxKind::TopUp));
    }

    #[test]
    fn send_is_never_signed() {
        assert!(!TxState::Built.can_transition_to(TxState::Signed, TxKind::Send));
        assert!(TxState::Built.can_transition_to(TxState::Submitted, TxKind::Send));
    }

    #[test]
    fn terminal_states_are_final() {
        for next in [
            TxState::Built,
            TxState::Signed,
            TxState::Submitted,
            TxState::Confirmed,
            TxState::Rejected,
        ] {
            assert!(!TxState::Confirmed.can_transition_to(next, TxKind::Send));
            assert!(!TxState::Rejected.can_transition_to(next, TxKind::TopUp));
        }
        assert!(TxState::Confirmed.is_terminal());
        assert!(!TxState::Submitted.is_terminal());
    }
}
