//! # Zero-Knowledge Layer
//!
//! Groth16 over BN254 for private sends.
//!
//! ```text
//! commitment.rs  Pedersen commitments in G1 and Fr form, homomorphic sums
//! note.rs        shielded notes, owner tags, nullifiers, note encryption
//! opening.rs     Schnorr proof that a top-up note commits to its amount
//! circuit.rs     SpendCircuit: inputs = amount + change, change in range
//! prover.rs      SpendProver / SpendProof
//! verifier.rs    SpendVerifier
//! ```
//!
//! Soundness rests on Groth16 knowledge soundness and on DLOG hardness in
//! BN254/G1 and Fr for commitment binding. The setup is per parameter set;
//! see [`SpendProver::setup`].

pub mod circuit;
pub mod commitment;
pub mod note;
pub mod opening;
pub mod prover;
pub mod verifier;

pub use circuit::{SpendCircuit, SpendStatement, SpendWitness};
pub use commitment::{commit, verify_opening, Commitment, PedersenParams};
pub use note::{NoteError, Nullifier, PublishedNote, ShieldedNote};
pub use opening::OpeningProof;
pub use prover::{SpendProof, SpendProver};
pub use verifier::SpendVerifier;
