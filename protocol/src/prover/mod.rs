//! # Proof Requests
//!
//! Spend proofs are produced by a prover service, not by the wallet. The
//! wallet describes the spend, seals the openings to the prover's X25519
//! key and gets back a Groth16 proof plus an Ed25519 attestation.
//!
//! ```text
//! wallet                                   prover
//!   |  encryption_key()                      |
//!   |--------------------------------------->|
//!   |  ProofRequest {                        |
//!   |    public: nullifiers, destination,    |
//!   |            amount, input_sum, change   |
//!   |    sealed: input and change openings   |
//!   |  }                                     |
//!   |--------------------------------------->|  opens, checks, proves
//!   |  ProofResponse { proof, attestation }  |
//!   |<---------------------------------------|
//! ```
//!
//! The sealed witness uses the statement digest as AAD, so it cannot be
//! replayed under different public fields. The attestation signs the same
//! digest: it is the prover vouching that the inputs exist on the ledger,
//! are unspent, and balance against amount plus change.
//!
//! [`ProofRequester`] drives a [`ProverService`] with bounded retries;
//! [`LocalProver`] is an in-process service.

pub mod local;
pub mod requester;

use ark_bn254::Fr;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;
use x25519_dalek::PublicKey as X25519PublicKey;
use zeroize::Zeroizing;

use crate::crypto::keys::{PublicKey, Signature};
use crate::crypto::sealing::{seal_to, SealError, SealedBox};
use crate::transaction::builder::spend_statement;
use crate::zkp::commitment::{scalar_from_bytes, scalar_to_bytes};
use crate::zkp::{Commitment, Nullifier, ShieldedNote, SpendProof, SpendStatement, SpendWitness};

pub use local::LocalProver;
pub use requester::ProofRequester;

#[derive(Debug, Error)]
pub enum ProverError {
    /// The service could not be reached or did not answer in time.
    #[error("prover unavailable: {0}")]
    Transient(String),

    /// The service looked at the request and refused it. Retrying the same
    /// request cannot succeed.
    #[error("prover rejected the request: {0}")]
    Rejected(String),

    #[error(transparent)]
    Sealing(#[from] SealError),
}

impl ProverError {
    pub fn is_transient(&self) -> bool {
        matches!(self, ProverError::Transient(_))
    }
}

#[async_trait]
pub trait ProverService: Send + Sync {
    /// Key requests must be sealed to.
    async fn encryption_key(&self) -> Result<X25519PublicKey, ProverError>;

    async fn request_proof(&self, request: &ProofRequest) -> Result<ProofResponse, ProverError>;
}

// ---------------------------------------------------------------------------
// SpendDescription
// ---------------------------------------------------------------------------

/// Everything the wallet knows about a spend it wants proven.
#[derive(Debug, Clone)]
pub struct SpendDescription {
    pub inputs: Vec<ShieldedNote>,
    pub amount: u64,
    pub destination: PublicKey,
    /// Present iff the inputs exceed `amount`.
    pub change: Option<ShieldedNote>,
}

impl SpendDescription {
    pub fn nullifiers(&self) -> Vec<Nullifier> {
        self.inputs.iter().map(ShieldedNote::nullifier).collect()
    }

    pub fn input_sum(&self) -> Commitment {
        Commitment::aggregate(self.inputs.iter().map(ShieldedNote::commitment))
    }

    pub fn statement(&self) -> SpendStatement {
        spend_statement(
            &self.nullifiers(),
            &self.destination,
            self.amount,
            &self.input_sum(),
            self.change.as_ref().map(ShieldedNote::commitment),
        )
    }

    pub fn witness(&self) -> SpendWitness {
        let (change_value, change_blinding) = self
            .change
            .as_ref()
            .map(|n| (n.amount(), n.blinding()))
            .unwrap_or((0, Fr::from(0u64)));
        SpendWitness {
            input_value: self.inputs.iter().map(ShieldedNote::amount).sum(),
            input_blinding: self.inputs.iter().map(ShieldedNote::blinding).sum(),
            change_value,
            change_blinding,
        }
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// One commitment opening, as sealed inside a request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpeningWire {
    pub amount: u64,
    /// Hex of the canonical scalar encoding.
    pub blinding: String,
}

impl OpeningWire {
    fn from_note(note: &ShieldedNote) -> Self {
        Self {
            amount: note.amount(),
            blinding: hex::encode(scalar_to_bytes(&note.blinding())),
        }
    }

    pub fn blinding(&self) -> Option<Fr> {
        let bytes = hex::decode(&self.blinding).ok()?;
        scalar_from_bytes(&bytes).ok()
    }
}

/// Plaintext of [`ProofRequest::sealed_witness`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WitnessPayload {
    /// Same order as the request's nullifiers.
    pub inputs: Vec<OpeningWire>,
    pub change: Option<OpeningWire>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProofRequest {
    pub request_id: Uuid,
    pub nullifiers: Vec<Nullifier>,
    pub destination: PublicKey,
    pub amount: u64,
    pub input_sum: Commitment,
    pub change_commitment: Option<Commitment>,
    pub sealed_witness: SealedBox,
}

impl ProofRequest {
    /// Seal `spend`'s openings to `prover_key`.
    pub fn new(spend: &SpendDescription, prover_key: &X25519PublicKey) -> Result<Self, ProverError> {
        let payload = WitnessPayload {
            inputs: spend.inputs.iter().map(OpeningWire::from_note).collect(),
            change: spend.change.as_ref().map(OpeningWire::from_note),
        };
        let plaintext = Zeroizing::new(
            serde_json::to_vec(&payload).expect("witness payload serialization must not fail"),
        );
        let statement = spend.statement();
        let sealed_witness = seal_to(prover_key, &plaintext, &statement.digest())?;

        Ok(Self {
            request_id: Uuid::new_v4(),
            nullifiers: spend.nullifiers(),
            destination: spend.destination,
            amount: spend.amount,
            input_sum: spend.input_sum(),
            change_commitment: spend.change.as_ref().map(|n| *n.commitment()),
            sealed_witness,
        })
    }

    /// Statement rebuilt from the public fields.
    pub fn statement(&self) -> SpendStatement {
        spend_statement(
            &self.nullifiers,
            &self.destination,
            self.amount,
            &self.input_sum,
            self.change_commitment.as_ref(),
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProofResponse {
    pub request_id: Uuid,
    pub proof: SpendProof,
    /// Prover's signature over [`SpendStatement::digest`].
    pub attestation: Signature,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keys::Keypair;
    use crate::crypto::sealing::SealingKeypair;
    use crate::crypto::seed::Seed;
    use crate::zkp::PedersenParams;
    use ark_std::test_rng;

    fn spend() -> SpendDescription {
        let params = PedersenParams::setup(&mut test_rng());
        let keys = Seed::from_bytes([1u8; 64]).note_keys();
        let note = |amount, salt: &[u8]| {
            ShieldedNote::new(&params, &keys, amount, keys.blinding_for(salt)).unwrap()
        };
        SpendDescription {
            inputs: vec![note(300, b"a"), note(200, b"b")],
            amount: 400,
            destination: Keypair::from_seed(&[9u8; 32]).public_key(),
            change: Some(note(100, b"c")),
        }
    }

    #[test]
    fn witness_sums_inputs() {
        let s = spend();
        let w = s.witness();
        assert_eq!(w.input_value, 500);
        assert_eq!(w.change_value, 100);
        assert_eq!(w.input_blinding, s.inputs[0].blinding() + s.inputs[1].blinding());
    }

    #[test]
    fn request_statement_matches_description() {
        let s = spend();
        let prover = SealingKeypair::generate();
        let request = ProofRequest::new(&s, &prover.public_key()).unwrap();
        assert_eq!(request.statement(), s.statement());
        assert_eq!(request.nullifiers.len(), 2);
    }

    #[test]
    fn sealed_witness_opens_only_under_its_statement() {
        let s = spend();
        let prover = SealingKeypair::generate();
        let request = ProofRequest::new(&s, &prover.public_key()).unwrap();

        let plain = prover
            .open(&request.sealed_witness, &request.statement().digest())
            .unwrap();
        let payload: WitnessPayload = serde_json::from_slice(&plain).unwrap();
        assert_eq!(payload.inputs[0].amount, 300);
        assert_eq!(payload.inputs[1].blinding(), Some(s.inputs[1].blinding()));

        let mut tampered = request.clone();
        tampered.amount = 401;
        assert!(prover
            .open(&tampered.sealed_witness, &tampered.statement().digest())
            .is_err());
    }
}
