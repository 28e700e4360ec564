//! The shielded transaction as it travels to the ledger.
//!
//! A [`ShieldedTransaction`] carries one of two bodies:
//!
//! - [`TopUpBody`]: moves public balance into a fresh note. Authorised by
//!   the owner's Ed25519 signature over [`ShieldedTransaction::signable_bytes`].
//! - [`SendBody`]: spends notes by nullifier and credits a public
//!   destination. Authorised by a spend proof and the prover's attestation;
//!   it is never signed by the owner, so the owner's key cannot link it to
//!   the notes being spent.
//!
//! The id is `hex(double_sha256(signable_bytes))` and is stable across
//! signing.

use ark_bn254::Fr;
use ark_ff::Zero;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::types::TxKind;
use crate::config::BINDING_CONTEXT;
use crate::crypto::hash::{bytes_to_field, derive_key, double_sha256};
use crate::crypto::keys::{PublicKey, Signature};
use crate::rpc::TxSignature;
use crate::zkp::{Commitment, Nullifier, OpeningProof, PublishedNote, SpendProof, SpendStatement};

/// Wire version of [`ShieldedTransaction`].
pub const TX_VERSION: u16 = 1;

// ---------------------------------------------------------------------------
// Bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopUpBody {
    /// Public account debited by `amount`.
    pub owner: PublicKey,
    pub amount: u64,
    /// The note credited with `amount`.
    pub note: PublishedNote,
    /// Shows `note` commits to exactly `amount`.
    pub opening: OpeningProof,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendBody {
    /// One per spent note.
    pub nullifiers: Vec<Nullifier>,
    /// Homomorphic sum of the spent commitments.
    pub input_sum: Commitment,
    /// Change note, absent when the inputs matched the amount exactly.
    pub change: Option<PublishedNote>,
    pub destination: PublicKey,
    pub amount: u64,
    pub proof: SpendProof,
    /// Prover's signature over the statement digest.
    pub attestation: Signature,
}

impl SendBody {
    /// Public statement the proof must verify against.
    pub fn statement(&self) -> SpendStatement {
        spend_statement(
            &self.nullifiers,
            &self.destination,
            self.amount,
            &self.input_sum,
            self.change.as_ref().map(|n| &n.commitment),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxBody {
    TopUp(TopUpBody),
    Send(SendBody),
}

// ---------------------------------------------------------------------------
// ShieldedTransaction
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShieldedTransaction {
    /// `hex(double_sha256(signable_bytes))`.
    pub id: String,
    pub version: u16,
    /// Unix milliseconds at construction.
    pub created_at: u64,
    pub body: TxBody,
    /// Owner signature. Present on signed top-ups only.
    pub signature: Option<Signature>,
}

impl ShieldedTransaction {
    pub fn top_up(owner: PublicKey, amount: u64, note: PublishedNote, opening: OpeningProof) -> Self {
        Self::with_body(TxBody::TopUp(TopUpBody {
            owner,
            amount,
            note,
            opening,
        }))
    }

    pub fn send(body: SendBody) -> Self {
        Self::with_body(TxBody::Send(body))
    }

    fn with_body(body: TxBody) -> Self {
        let mut tx = Self {
            id: String::new(),
            version: TX_VERSION,
            created_at: Utc::now().timestamp_millis().max(0) as u64,
            body,
            signature: None,
        };
        tx.id = tx.compute_id();
        tx
    }

    pub fn kind(&self) -> TxKind {
        match self.body {
            TxBody::TopUp(_) => TxKind::TopUp,
            TxBody::Send(_) => TxKind::Send,
        }
    }

    /// Amount leaving the sender: debited publicly for a top-up, drawn from
    /// notes for a send.
    pub fn amount(&self) -> u64 {
        match &self.body {
            TxBody::TopUp(b) => b.amount,
            TxBody::Send(b) => b.amount,
        }
    }

    /// Canonical bytes covered by the id and the owner signature.
    ///
    /// Excludes `id` and `signature`. For a send, the proof and attestation
    /// are excluded too; they authorise the bytes rather than being part of
    /// them.
    pub fn signable_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(256);
        buf.extend_from_slice(&self.version.to_le_bytes());
        buf.extend_from_slice(self.kind().to_string().as_bytes());
        buf.push(0x00);
        buf.extend_from_slice(&self.created_at.to_le_bytes());

        match &self.body {
            TxBody::TopUp(b) => {
                buf.extend_from_slice(b.owner.as_bytes());
                buf.extend_from_slice(&b.amount.to_le_bytes());
                push_note(&mut buf, &b.note);
                buf.extend_from_slice(&b.opening.to_bytes());
            }
            TxBody::Send(b) => {
                buf.extend_from_slice(&(b.nullifiers.len() as u32).to_le_bytes());
                for nf in &b.nullifiers {
                    buf.extend_from_slice(nf.as_bytes());
                }
                buf.extend_from_slice(&b.input_sum.to_bytes());
                match &b.change {
                    Some(note) => {
                        buf.push(0x01);
                        push_note(&mut buf, note);
                    }
                    None => buf.push(0x00),
                }
                buf.extend_from_slice(b.destination.as_bytes());
                buf.extend_from_slice(&b.amount.to_le_bytes());
            }
        }
        buf
    }

    pub fn compute_id(&self) -> String {
        hex::encode(double_sha256(&self.signable_bytes()))
    }

    /// Ledger handle of this transaction: the owner signature when signed,
    /// the id digest otherwise. Both base58.
    pub fn tx_signature(&self) -> TxSignature {
        match &self.signature {
            Some(sig) => TxSignature::new(sig.to_base58()),
            None => TxSignature::new(
                bs58::encode(double_sha256(&self.signable_bytes())).into_string(),
            ),
        }
    }

    /// Whether `signature` is a valid owner signature. Always `false` for a
    /// send.
    pub fn verify_owner_signature(&self) -> bool {
        match (&self.body, &self.signature) {
            (TxBody::TopUp(b), Some(sig)) => b.owner.verify(&self.signable_bytes(), sig),
            _ => false,
        }
    }
}

fn push_note(buf: &mut Vec<u8>, note: &PublishedNote) {
    buf.extend_from_slice(&note.commitment.to_bytes());
    buf.extend_from_slice(&note.tag);
    buf.extend_from_slice(&(note.ciphertext.len() as u32).to_le_bytes());
    buf.extend_from_slice(&note.ciphertext);
}

// ---------------------------------------------------------------------------
// Binding
// ---------------------------------------------------------------------------

/// Digest of everything a spend proof must be tied to, reduced into Fr.
///
/// A proof produced for one set of nullifiers, destination, amount and
/// change verifies for no other.
pub fn spend_binding(
    nullifiers: &[Nullifier],
    destination: &PublicKey,
    amount: u64,
    input_sum: &Commitment,
    change: Option<&Commitment>,
) -> Fr {
    let amount_bytes = amount.to_le_bytes();
    let input_bytes = input_sum.to_bytes();
    let change_bytes = change.map(Commitment::to_bytes).unwrap_or_else(|| vec![0x00]);

    let mut parts: Vec<&[u8]> = nullifiers.iter().map(|nf| nf.as_bytes().as_slice()).collect();
    parts.push(destination.as_bytes());
    parts.push(&amount_bytes);
    parts.push(&input_bytes);
    parts.push(&change_bytes);

    bytes_to_field(&derive_key(BINDING_CONTEXT, &parts))
}

/// The spend statement for a set of public send fields.
pub fn spend_statement(
    nullifiers: &[Nullifier],
    destination: &PublicKey,
    amount: u64,
    input_sum: &Commitment,
    change: Option<&Commitment>,
) -> SpendStatement {
    SpendStatement {
        input_sum: input_sum.scalar,
        change_commitment: change.map(|c| c.scalar).unwrap_or_else(Fr::zero),
        amount,
        binding: spend_binding(nullifiers, destination, amount, input_sum, change),
    }
}
