//! Errors surfaced to callers of the shielded engine.
//!
//! Lower layers have their own error types; everything that crosses the
//! engine boundary is folded into [`EngineError`] so a caller can match on
//! what happened rather than on where.

use thiserror::Error;

use crate::crypto::seed::SeedError;
use crate::prover::ProverError;
use crate::rpc::RpcError;
use crate::store::StoreError;
use crate::zkp::NoteError;

#[derive(Debug, Error)]
pub enum EngineError {
    /// The key holder could not or would not sign.
    #[error("signing unavailable: {0}")]
    SigningUnavailable(String),

    /// Unreserved unspent notes do not cover the send. Nothing was reserved,
    /// proven or submitted.
    #[error("insufficient private balance: requested {requested}, available {available}")]
    InsufficientPrivateBalance {
        /// Amount the caller asked to send.
        requested: u64,
        /// Sum of notes free to be selected at the time of the call.
        available: u64,
    },

    /// The prover refused the spend. Retrying the same spend will not help.
    #[error("prover rejected the spend: {0}")]
    ProverRejected(String),

    /// The prover or ledger could not be reached after all retries.
    #[error("transient network failure: {0}")]
    TransientNetworkFailure(String),

    /// The ledger refused the transaction, or its outcome is unknown. Not
    /// retried: re-query state before trying again.
    #[error("submission failed: {0}")]
    SubmissionFailed(#[source] RpcError),

    #[error("amount must be greater than zero")]
    ZeroAmount,

    /// The operation is not legal for the transaction in its current state.
    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("crypto error: {0}")]
    Crypto(String),

    #[error("ledger error: {0}")]
    Ledger(#[source] RpcError),

    #[error(transparent)]
    Store(StoreError),
}

impl EngineError {
    /// Map a failed read-only ledger query.
    pub fn from_query(e: RpcError) -> Self {
        match e {
            RpcError::Transport(msg) => EngineError::TransientNetworkFailure(msg),
            other => EngineError::Ledger(other),
        }
    }
}

impl From<StoreError> for EngineError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::InsufficientPrivateBalance {
                requested,
                available,
            } => EngineError::InsufficientPrivateBalance {
                requested,
                available,
            },
            StoreError::ZeroAmount => EngineError::ZeroAmount,
            StoreError::Note(e) => EngineError::Crypto(e.to_string()),
            other => EngineError::Store(other),
        }
    }
}

impl From<ProverError> for EngineError {
    fn from(e: ProverError) -> Self {
        match e {
            ProverError::Rejected(msg) => EngineError::ProverRejected(msg),
            ProverError::Transient(msg) => EngineError::TransientNetworkFailure(msg),
            ProverError::Sealing(e) => EngineError::Crypto(e.to_string()),
        }
    }
}

impl From<SeedError> for EngineError {
    fn from(e: SeedError) -> Self {
        match e {
            SeedError::SigningUnavailable(msg) => EngineError::SigningUnavailable(msg),
        }
    }
}

impl From<NoteError> for EngineError {
    fn from(e: NoteError) -> Self {
        EngineError::Crypto(e.to_string())
    }
}
