//! # Groth16 Spend Verification
//!
//! The ledger side of a spend. The verification key is small and public;
//! verification is three pairings plus a four-term MSM, constant time in the
//! number of notes spent.

use anyhow::{Context, Result};
use ark_bn254::Bn254;
use ark_groth16::{Groth16, VerifyingKey};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use ark_snark::SNARK;

use super::circuit::SpendStatement;
use super::commitment::PedersenParams;
use super::prover::SpendProof;

/// Groth16 verification key for the spend circuit.
#[derive(Clone)]
pub struct SpendVerifier {
    vk: VerifyingKey<Bn254>,
    params: PedersenParams,
}

impl SpendVerifier {
    pub(crate) fn from_vk(vk: VerifyingKey<Bn254>, params: PedersenParams) -> Self {
        Self { vk, params }
    }

    pub fn pedersen_params(&self) -> &PedersenParams {
        &self.params
    }

    /// `Ok(false)` for a well-formed proof of a different statement; `Err`
    /// only for undecodable proofs.
    pub fn verify(&self, proof: &SpendProof, statement: &SpendStatement) -> Result<bool> {
        let ark_proof = proof.to_ark_proof()?;
        Groth16::<Bn254>::verify(&self.vk, &statement.public_inputs(), &ark_proof)
            .context("Groth16 verification algorithm failed")
    }

    pub fn vk_to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.vk
            .serialize_compressed(&mut buf)
            .expect("VK serialization must not fail");
        buf
    }

    pub fn vk_from_bytes(data: &[u8], params: PedersenParams) -> Result<Self> {
        let vk = VerifyingKey::<Bn254>::deserialize_compressed(data)
            .context("failed to deserialize verification key")?;
        Ok(Self { vk, params })
    }
}
