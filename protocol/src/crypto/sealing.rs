//! # Sealed Boxes for the Prover
//!
//! A proof request carries the spend witness: amounts, blinding factors,
//! which commitments are being consumed. None of that may be visible to
//! anyone relaying the request. We seal it to the prover's long-term X25519
//! key with an ephemeral-static Diffie-Hellman:
//!
//! 1. The sender draws a fresh `EphemeralSecret` per request.
//! 2. `shared = DH(ephemeral, prover_static)`.
//! 3. `key = BLAKE3-derive_key(SEAL_CONTEXT, shared ‖ eph_pub ‖ prover_pub)`.
//! 4. The witness is AES-256-GCM encrypted under `key`, with the caller's
//!    AAD (the public-input digest) bound in.
//!
//! The ephemeral secret is consumed by `diffie_hellman`, so a request key can
//! never be reused. A non-contributory shared secret (the peer sent a
//! low-order point) is refused on both sides.

use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use x25519_dalek::{EphemeralSecret, PublicKey as X25519PublicKey, SharedSecret, StaticSecret};
use zeroize::Zeroizing;

use super::encryption::{self, EncryptionError};
use super::hash::derive_key;
use crate::config::SEAL_CONTEXT;

#[derive(Debug, Error)]
pub enum SealError {
    /// The DH output was all zeros; the peer key is a low-order point.
    #[error("key agreement produced a non-contributory secret")]
    NonContributory,

    #[error(transparent)]
    Encryption(#[from] EncryptionError),
}

/// Ciphertext plus the sender's ephemeral public key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedBox {
    pub ephemeral_public: [u8; 32],
    pub ciphertext: Vec<u8>,
}

/// Seal `plaintext` so only the holder of `recipient`'s secret can open it.
pub fn seal_to(
    recipient: &X25519PublicKey,
    plaintext: &[u8],
    aad: &[u8],
) -> Result<SealedBox, SealError> {
    let ephemeral = EphemeralSecret::random_from_rng(OsRng);
    let ephemeral_public = X25519PublicKey::from(&ephemeral);
    let shared = ephemeral.diffie_hellman(recipient);
    let key = box_key(&shared, &ephemeral_public, recipient)?;

    let ciphertext = encryption::seal(&key, plaintext, aad)?;
    Ok(SealedBox {
        ephemeral_public: ephemeral_public.to_bytes(),
        ciphertext,
    })
}

/// Long-term X25519 identity of a prover. Zeroized on drop.
pub struct SealingKeypair {
    secret: StaticSecret,
    public: X25519PublicKey,
}

impl SealingKeypair {
    pub fn generate() -> Self {
        Self::from_secret(StaticSecret::random_from_rng(OsRng))
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self::from_secret(StaticSecret::from(bytes))
    }

    fn from_secret(secret: StaticSecret) -> Self {
        let public = X25519PublicKey::from(&secret);
        Self { secret, public }
    }

    pub fn public_key(&self) -> X25519PublicKey {
        self.public
    }

    /// Open a box sealed to this key. `aad` must match what the sender bound.
    pub fn open(&self, sealed: &SealedBox, aad: &[u8]) -> Result<Zeroizing<Vec<u8>>, SealError> {
        let ephemeral_public = X25519PublicKey::from(sealed.ephemeral_public);
        let shared = self.secret.diffie_hellman(&ephemeral_public);
        let key = box_key(&shared, &ephemeral_public, &self.public)?;
        let plaintext = encryption::open(&key, &sealed.ciphertext, aad)?;
        Ok(Zeroizing::new(plaintext))
    }
}

impl std::fmt::Debug for SealingKeypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SealingKeypair(pub={})", hex::encode(self.public.as_bytes()))
    }
}

fn box_key(
    shared: &SharedSecret,
    ephemeral_public: &X25519PublicKey,
    recipient: &X25519PublicKey,
) -> Result<Zeroizing<[u8; 32]>, SealError> {
    if !shared.was_contributory() {
        return Err(SealError::NonContributory);
    }
    Ok(Zeroizing::new(derive_key(
        SEAL_CONTEXT,
        &[
            shared.as_bytes(),
            ephemeral_public.as_bytes(),
            recipient.as_bytes(),
        ],
    )))
}
