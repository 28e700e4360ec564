//! # Shielded Engine
//!
//! The entry point for a wallet. [`ShieldedClient`] ties one owner's seed,
//! commitment store, proof requester and transaction assembler to a ledger:
//!
//! ```text
//!   KeyHolder ──derive_seed──▶ Seed ──▶ NoteKeys ──▶ CommitmentStore
//!                                                        │
//!   LedgerRpc ◀── submit / confirm ── TxAssembler ◀──────┤ reserve / finalize
//!       │                                 │              │
//!       └──── get_shielded_state ─────────┼─────────▶ reconcile
//!                                         ▼
//!                                  ProofRequester ──▶ ProverService
//! ```

pub mod client;
pub mod error;

pub use client::ShieldedClient;
pub use error::EngineError;
