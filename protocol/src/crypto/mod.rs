//! # Cryptographic Primitives
//!
//! Everything secret in Umbra flows through here: the seed and the keys
//! derived from it, note encryption, and the sealed boxes that carry spend
//! witnesses to a prover.
//!
//! - **Ed25519** for account keys and the seed signature.
//! - **X25519** for sealing proof requests.
//! - **AES-256-GCM** for every ciphertext, always with AAD.
//! - **BLAKE3** for key derivation, tags and nullifiers.
//! - **SHA-256** for transaction ids.
//!
//! These are thin typed wrappers over audited crates. Nothing here is
//! novel, and it should stay that way.

pub mod encryption;
pub mod hash;
pub mod keys;
pub mod sealing;
pub mod seed;

pub use hash::{blake3_hash, derive_key, hash_to_field, sha256};
pub use keys::{KeyError, KeyHolder, Keypair, PublicKey, Signature};
pub use sealing::{SealError, SealedBox, SealingKeypair};
pub use seed::{derive_default_seed, derive_seed, NoteKeys, Seed, SeedError};
