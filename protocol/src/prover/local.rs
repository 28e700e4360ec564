//! In-process prover service.
//!
//! Opens the sealed witness, checks it against the public fields and the
//! ledger, proves, and attests. Every check that fails is a rejection; only
//! ledger transport errors (and injected failures) are transient.

use async_trait::async_trait;
use parking_lot::Mutex;
use rand::rngs::OsRng;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use x25519_dalek::PublicKey as X25519PublicKey;

use super::{ProofRequest, ProofResponse, ProverError, ProverService, WitnessPayload};
use crate::crypto::keys::{Keypair, PublicKey};
use crate::crypto::sealing::SealingKeypair;
use crate::rpc::{LedgerRpc, RpcError};
use crate::zkp::{commit, Commitment, Nullifier, SpendProver, SpendWitness};

pub struct LocalProver {
    prover: Arc<SpendProver>,
    sealing: SealingKeypair,
    attester: Keypair,
    ledger: Arc<dyn LedgerRpc>,
    transient_failures: Mutex<u32>,
    latency: Mutex<Option<Duration>>,
    served: AtomicUsize,
}

impl LocalProver {
    pub fn new(prover: SpendProver, attester: Keypair, ledger: Arc<dyn LedgerRpc>) -> Self {
        Self {
            prover: Arc::new(prover),
            sealing: SealingKeypair::generate(),
            attester,
            ledger,
            transient_failures: Mutex::new(0),
            latency: Mutex::new(None),
            served: AtomicUsize::new(0),
        }
    }

    /// Key the ledger must trust for attestations.
    pub fn attestation_key(&self) -> PublicKey {
        self.attester.public_key()
    }

    /// Fail the next `n` proof requests as unavailable.
    pub fn fail_transiently(&self, n: u32) {
        *self.transient_failures.lock() = n;
    }

    /// Sleep this long before answering each proof request.
    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.lock() = latency;
    }

    /// Proof requests received, successful or not.
    pub fn requests_served(&self) -> usize {
        self.served.load(Ordering::SeqCst)
    }

    async fn check_ledger(&self, commitments: &[Commitment], nullifiers: &[Nullifier]) -> Result<(), ProverError> {
        let state = self
            .ledger
            .get_shielded_state()
            .await
            .map_err(|e: RpcError| ProverError::Transient(format!("ledger unavailable: {}", e)))?;

        for c in commitments {
            if !state.notes.iter().any(|n| n.commitment == *c) {
                return Err(ProverError::Rejected(format!("input {:?} is not on the ledger", c)));
            }
        }
        if let Some(nf) = nullifiers.iter().find(|nf| state.nullifiers.contains(nf)) {
            return Err(ProverError::Rejected(format!("input nullifier {} already spent", nf)));
        }
        Ok(())
    }
}

#[async_trait]
impl ProverService for LocalProver {
    async fn encryption_key(&self) -> Result<X25519PublicKey, ProverError> {
        Ok(self.sealing.public_key())
    }

    async fn request_proof(&self, request: &ProofRequest) -> Result<ProofResponse, ProverError> {
        self.served.fetch_add(1, Ordering::SeqCst);

        let latency = *self.latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        {
            let mut failures = self.transient_failures.lock();
            if *failures > 0 {
                *failures -= 1;
                return Err(ProverError::Transient("prover overloaded".into()));
            }
        }

        let statement = request.statement();
        let digest = statement.digest();
        let plaintext = self
            .sealing
            .open(&request.sealed_witness, &digest)
            .map_err(|e| ProverError::Rejected(format!("cannot open witness: {}", e)))?;
        let payload: WitnessPayload = serde_json::from_slice(&plaintext)
            .map_err(|e| ProverError::Rejected(format!("malformed witness: {}", e)))?;

        if payload.inputs.is_empty() || payload.inputs.len() != request.nullifiers.len() {
            return Err(ProverError::Rejected("input count does not match nullifiers".into()));
        }

        let params = self.prover.pedersen_params();
        let mut commitments = Vec::with_capacity(payload.inputs.len());
        let mut input_value: u64 = 0;
        let mut input_blinding = ark_bn254::Fr::from(0u64);
        for (opening, nf) in payload.inputs.iter().zip(&request.nullifiers) {
            let blinding = opening
                .blinding()
                .ok_or_else(|| ProverError::Rejected("malformed input blinding".into()))?;
            let c = commit(params, opening.amount, blinding);
            if Nullifier::derive(&blinding, &c) != *nf {
                return Err(ProverError::Rejected("nullifier does not match its input".into()));
            }
            input_value = input_value
                .checked_add(opening.amount)
                .ok_or_else(|| ProverError::Rejected("input values overflow".into()))?;
            input_blinding += blinding;
            commitments.push(c);
        }
        if Commitment::aggregate(commitments.iter()) != request.input_sum {
            return Err(ProverError::Rejected("input sum does not match inputs".into()));
        }

        let (change_value, change_blinding) = match (&payload.change, &request.change_commitment) {
            (Some(opening), Some(expected)) => {
                let blinding = opening
                    .blinding()
                    .ok_or_else(|| ProverError::Rejected("malformed change blinding".into()))?;
                if commit(params, opening.amount, blinding) != *expected {
                    return Err(ProverError::Rejected("change does not open its commitment".into()));
                }
                (opening.amount, blinding)
            }
            (None, None) => (0, ark_bn254::Fr::from(0u64)),
            _ => return Err(ProverError::Rejected("change presence mismatch".into())),
        };
        if request.amount.checked_add(change_value) != Some(input_value) {
            return Err(ProverError::Rejected(format!(
                "inputs {} do not balance amount {} plus change {}",
                input_value, request.amount, change_value
            )));
        }

        self.check_ledger(&commitments, &request.nullifiers).await?;

        let witness = SpendWitness {
            input_value,
            input_blinding,
            change_value,
            change_blinding,
        };
        let prover = Arc::clone(&self.prover);
        let proof = tokio::task::spawn_blocking(move || prover.prove(&statement, &witness, &mut OsRng))
            .await
            .map_err(|e| ProverError::Rejected(format!("proving task failed: {}", e)))?
            .map_err(|e| {
                warn!(error = %e, "spend proof generation failed");
                ProverError::Rejected(e.to_string())
            })?;

        debug!(request = %request.request_id, size = proof.size(), "spend proof generated");
        info!(
            request = %request.request_id,
            inputs = request.nullifiers.len(),
            amount = request.amount,
            "proof request served"
        );
        Ok(ProofResponse {
            request_id: request.request_id,
            proof,
            attestation: self.attester.sign_message(&digest),
        })
    }
}

impl std::fmt::Debug for LocalProver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalProver")
            .field("attestation_key", &self.attester.public_key())
            .field("served", &self.requests_served())
            .finish_non_exhaustive()
    }
}
