// Copyright (c) 2026 Umbra Contributors. MIT License.
// See LICENSE for details.

//! # Umbra Protocol: Shielded Balance Engine
//!
//! Client-side engine for a private balance on a public ledger. Value moves
//! from a public account into Pedersen-committed notes (a *top-up*) and out
//! of them to any public address (a *send*) without revealing which notes
//! paid, or what is left over.
//!
//! ## Architecture
//!
//! - **crypto**: Hashing, Ed25519 keys, AES-GCM, sealed boxes, seed derivation.
//! - **zkp**: Commitments, notes and nullifiers, the spend circuit, Groth16.
//! - **store**: Which notes we own, which are spent, which are reserved.
//! - **prover**: Sealed proof requests with bounded retries.
//! - **rpc**: The ledger interface and an in-process ledger.
//! - **transaction**: Building, signing, submitting and confirming.
//! - **engine**: [`ShieldedClient`], the one type a wallet needs.
//! - **config**: Constants, clusters, runtime configuration.
//!
//! ## Ground Rules
//!
//! 1. The ledger is the source of truth. Local state is a cache that
//!    [`ShieldedClient::reconcile`] can always rebuild from the seed.
//! 2. Store effects land on confirmation, never on submission.
//! 3. A submission is attempted once. Proof requests may be retried;
//!    transactions are not.

pub mod config;
pub mod crypto;
pub mod engine;
pub mod prover;
pub mod rpc;
pub mod store;
pub mod transaction;
pub mod zkp;

pub use engine::{EngineError, ShieldedClient};
