//! # Notes & Nullifiers
//!
//! A [`ShieldedNote`] is one unit of private balance together with
//! everything needed to find it again and spend it:
//!
//! - the commitment, published on the ledger;
//! - an owner tag (`keyed_hash(tag_key, commitment)`), published alongside
//!   so a re-scan can pick out our notes without trial-decrypting everything;
//! - the encrypted payload `amount ‖ blinding`, published alongside and bound
//!   to the commitment bytes through AAD;
//! - the nullifier `derive_key(NULLIFIER_CONTEXT, blinding ‖ commitment)`,
//!   revealed only when the note is spent.
//!
//! Without the blinding factor the nullifier cannot be linked back to its
//! commitment, so spending a note does not say which note was spent.

use ark_bn254::Fr;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use zeroize::Zeroizing;

use super::commitment::{commit, scalar_from_bytes, scalar_to_bytes, Commitment, PedersenParams};
use crate::config::{NOTE_SALT_LENGTH, NULLIFIER_CONTEXT};
use crate::crypto::encryption::{self, EncryptionError};
use crate::crypto::hash::derive_key;
use crate::crypto::seed::NoteKeys;

/// `amount (8, LE) ‖ blinding (32)`.
const NOTE_PAYLOAD_LENGTH: usize = 8 + 32;

#[derive(Debug, Error)]
pub enum NoteError {
    #[error("note payload encryption failed: {0}")]
    Encryption(#[from] EncryptionError),

    #[error("note payload is malformed")]
    MalformedPayload,

    /// The payload decrypted but does not open the commitment it sits next to.
    #[error("note payload does not open its commitment")]
    OpeningMismatch,
}

// ---------------------------------------------------------------------------
// Nullifier
// ---------------------------------------------------------------------------

/// The spend marker of a note. Published once; a second appearance is a
/// double spend.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Nullifier([u8; 32]);

impl Nullifier {
    pub fn derive(blinding: &Fr, commitment: &Commitment) -> Self {
        Self(derive_key(
            NULLIFIER_CONTEXT,
            &[&scalar_to_bytes(blinding), &commitment.to_bytes()],
        ))
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for Nullifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Nullifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Nullifier({}..)", &self.to_hex()[..12])
    }
}

// ---------------------------------------------------------------------------
// PublishedNote
// ---------------------------------------------------------------------------

/// What the ledger stores for every note: public, safe to relay.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishedNote {
    pub commitment: Commitment,
    pub tag: [u8; 32],
    pub ciphertext: Vec<u8>,
}

// ---------------------------------------------------------------------------
// ShieldedNote
// ---------------------------------------------------------------------------

/// A note we own, with its opening.
#[derive(Clone)]
pub struct ShieldedNote {
    amount: u64,
    blinding: Fr,
    commitment: Commitment,
    tag: [u8; 32],
    nullifier: Nullifier,
    ciphertext: Vec<u8>,
}

impl ShieldedNote {
    /// Build a note from an explicit opening.
    pub fn new(
        params: &PedersenParams,
        keys: &NoteKeys,
        amount: u64,
        blinding: Fr,
    ) -> Result<Self, NoteError> {
        let commitment = commit(params, amount, blinding);
        let commitment_bytes = commitment.to_bytes();

        let mut payload = Zeroizing::new([0u8; NOTE_PAYLOAD_LENGTH]);
        payload[..8].copy_from_slice(&amount.to_le_bytes());
        payload[8..].copy_from_slice(&scalar_to_bytes(&blinding));
        let ciphertext = encryption::seal(keys.note_key(), payload.as_slice(), &commitment_bytes)?;

        Ok(Self {
            amount,
            blinding,
            commitment,
            tag: keys.tag_for(&commitment_bytes),
            nullifier: Nullifier::derive(&blinding, &commitment),
            ciphertext,
        })
    }

    /// Build a note whose blinding is derived from a fresh random salt.
    pub fn fresh<R: RngCore + CryptoRng>(
        params: &PedersenParams,
        keys: &NoteKeys,
        amount: u64,
        rng: &mut R,
    ) -> Result<Self, NoteError> {
        let mut salt = Zeroizing::new([0u8; NOTE_SALT_LENGTH]);
        rng.fill_bytes(salt.as_mut_slice());
        Self::new(params, keys, amount, keys.blinding_for(salt.as_slice()))
    }

    /// Try to claim a published note.
    ///
    /// Returns `Ok(None)` when the tag is not ours. A matching tag whose
    /// payload fails to decrypt or to open the commitment is an error: the
    /// note was addressed to us and is corrupt.
    pub fn recover(
        params: &PedersenParams,
        keys: &NoteKeys,
        published: &PublishedNote,
    ) -> Result<Option<Self>, NoteError> {
        let commitment_bytes = published.commitment.to_bytes();
        if keys.tag_for(&commitment_bytes) != published.tag {
            return Ok(None);
        }

        let payload = Zeroizing::new(encryption::open(
            keys.note_key(),
            &published.ciphertext,
            &commitment_bytes,
        )?);
        if payload.len() != NOTE_PAYLOAD_LENGTH {
            return Err(NoteError::MalformedPayload);
        }

        let mut amount_bytes = [0u8; 8];
        amount_bytes.copy_from_slice(&payload[..8]);
        let amount = u64::from_le_bytes(amount_bytes);
        let blinding = scalar_from_bytes(&payload[8..]).map_err(|_| NoteError::MalformedPayload)?;

        if commit(params, amount, blinding) != published.commitment {
            return Err(NoteError::OpeningMismatch);
        }

        Ok(Some(Self {
            amount,
            blinding,
            commitment: published.commitment,
            tag: published.tag,
            nullifier: Nullifier::derive(&blinding, &published.commitment),
            ciphertext: published.ciphertext.clone(),
        }))
    }

    pub fn amount(&self) -> u64 {
        self.amount
    }

    pub fn blinding(&self) -> Fr {
        self.blinding
    }

    pub fn commitment(&self) -> &Commitment {
        &self.commitment
    }

    pub fn tag(&self) -> &[u8; 32] {
        &self.tag
    }

    pub fn nullifier(&self) -> Nullifier {
        self.nullifier
    }

    pub fn published(&self) -> PublishedNote {
        PublishedNote {
            commitment: self.commitment,
            tag: self.tag,
            ciphertext: self.ciphertext.clone(),
        }
    }
}

impl fmt::Debug for ShieldedNote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShieldedNote")
            .field("amount", &self.amount)
            .field("commitment", &self.commitment)
            .field("nullifier", &self.nullifier)
            .finish_non_exhaustive()
    }
}
