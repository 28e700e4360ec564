//! # Ledger RPC
//!
//! The engine talks to the ledger through [`LedgerRpc`]. The ledger owns
//! public balances, the set of published notes and the set of spent
//! nullifiers; it is the source of truth the commitment store reconciles
//! against.
//!
//! [`MemoryLedger`] is an in-process implementation with the same
//! acceptance rules a real cluster enforces. It backs the wallet's local
//! mode and the test suite.

pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{sleep, Instant};
use tracing::debug;

use crate::crypto::keys::PublicKey;
use crate::transaction::ShieldedTransaction;
use crate::zkp::{Nullifier, PublishedNote};

pub use memory::MemoryLedger;

/// Base58 handle the ledger assigns to an accepted transaction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxSignature(String);

impl TxSignature {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TxSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfirmationStatus {
    Pending,
    Confirmed,
    Rejected(String),
}

/// Public side of an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountState {
    pub address: PublicKey,
    /// Public balance in base units.
    pub balance: u64,
}

/// Snapshot of the shielded pool.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShieldedState {
    /// Every published note, in publication order.
    pub notes: Vec<PublishedNote>,
    /// Every spent nullifier, in publication order.
    pub nullifiers: Vec<Nullifier>,
}

#[derive(Debug, Error)]
pub enum RpcError {
    /// The request did not reach the ledger, or the answer did not come
    /// back. Safe to retry.
    #[error("transport error: {0}")]
    Transport(String),

    #[error("transaction rejected: {0}")]
    Rejected(String),

    #[error("nullifier {0} already spent")]
    DoubleSpend(Nullifier),

    #[error("spend proof does not verify")]
    InvalidProof,

    #[error("invalid signature")]
    InvalidSignature,

    #[error("insufficient public funds: required {required}, available {available}")]
    InsufficientFunds { required: u64, available: u64 },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("airdrops are not available on this cluster")]
    AirdropUnavailable,
}

impl RpcError {
    /// `true` for failures that say nothing about the request itself.
    pub fn is_transient(&self) -> bool {
        matches!(self, RpcError::Transport(_))
    }
}

#[async_trait]
pub trait LedgerRpc: Send + Sync {
    /// Credit `amount` to `to`'s public balance.
    async fn request_airdrop(&self, to: &PublicKey, amount: u64) -> Result<TxSignature, RpcError>;

    async fn confirm_transaction(&self, signature: &TxSignature) -> Result<ConfirmationStatus, RpcError>;

    /// Submit a transaction. Acceptance rules are applied before the call
    /// returns; `Ok` means the transaction is in the ledger's pipeline, not
    /// that it is confirmed.
    async fn submit(&self, tx: &ShieldedTransaction) -> Result<TxSignature, RpcError>;

    async fn get_account_state(&self, address: &PublicKey) -> Result<AccountState, RpcError>;

    async fn get_shielded_state(&self) -> Result<ShieldedState, RpcError>;
}

/// Poll `signature` until the ledger confirms it, rejects it, or `timeout`
/// elapses. Transport failures while polling are retried; any other error
/// ends the wait. A timeout is reported as [`RpcError::Transport`].
pub async fn await_confirmation(
    ledger: &dyn LedgerRpc,
    signature: &TxSignature,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<(), RpcError> {
    let deadline = Instant::now() + timeout;
    loop {
        match ledger.confirm_transaction(signature).await {
            Ok(ConfirmationStatus::Confirmed) => return Ok(()),
            Ok(ConfirmationStatus::Rejected(reason)) => return Err(RpcError::Rejected(reason)),
            Ok(ConfirmationStatus::Pending) => {}
            Err(e) if e.is_transient() => {
                debug!(%signature, error = %e, "confirmation poll failed");
            }
            Err(e) => return Err(e),
        }
        if Instant::now() >= deadline {
            return Err(RpcError::Transport(format!(
                "{} not confirmed within {:?}",
                signature, timeout
            )));
        }
        sleep(poll_interval).await;
    }
}
