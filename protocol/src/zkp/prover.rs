//! # Groth16 Spend Proofs
//!
//! 1. **Setup**: `SpendProver::setup(params, rng)` once per parameter set.
//!    The Pedersen scalar generators are circuit constants, so the CRS is
//!    only valid for the params it was generated with. Replace the local
//!    setup with ceremony output before going anywhere near mainnet.
//! 2. **Prove**: [`SpendProver::prove`] checks the witness against the
//!    constraint system first and only then runs Groth16. ark-groth16 panics
//!    on an unsatisfiable system instead of returning an error.
//! 3. The [`SpendProof`] is ~128 bytes compressed and rides inside the send
//!    transaction.

use anyhow::{bail, Context, Result};
use ark_bn254::{Bn254, Fr};
use ark_groth16::{Groth16, ProvingKey};
use ark_relations::r1cs::{ConstraintSynthesizer, ConstraintSystem};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use ark_snark::SNARK;
use ark_std::rand::{CryptoRng, Rng};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use super::circuit::{SpendCircuit, SpendStatement, SpendWitness};
use super::commitment::PedersenParams;
use super::verifier::SpendVerifier;

// ---------------------------------------------------------------------------
// SpendProver
// ---------------------------------------------------------------------------

/// Groth16 proving key for the spend circuit, plus the params it is bound to.
pub struct SpendProver {
    pk: ProvingKey<Bn254>,
    params: PedersenParams,
}

impl SpendProver {
    /// Circuit-specific setup. Returns the prover and the matching verifier.
    pub fn setup<R: Rng + CryptoRng>(
        params: PedersenParams,
        rng: &mut R,
    ) -> Result<(Self, SpendVerifier)> {
        let (pk, vk) =
            Groth16::<Bn254>::circuit_specific_setup(SpendCircuit::blank(&params), rng)
                .context("Groth16 setup failed for the spend circuit")?;

        let verifier = SpendVerifier::from_vk(vk, params.clone());
        Ok((Self { pk, params }, verifier))
    }

    pub fn pedersen_params(&self) -> &PedersenParams {
        &self.params
    }

    /// `Ok(true)` iff `witness` satisfies the circuit for `statement`.
    pub fn is_satisfied(&self, statement: &SpendStatement, witness: &SpendWitness) -> Result<bool> {
        let cs = ConstraintSystem::<Fr>::new_ref();
        SpendCircuit::new(&self.params, statement, witness)
            .generate_constraints(cs.clone())
            .context("spend constraint synthesis failed")?;
        cs.is_satisfied().context("spend constraint check failed")
    }

    /// Prove `statement` with `witness`.
    ///
    /// # Errors
    ///
    /// Fails without proving when the witness does not satisfy the circuit.
    pub fn prove<R: Rng + CryptoRng>(
        &self,
        statement: &SpendStatement,
        witness: &SpendWitness,
        rng: &mut R,
    ) -> Result<SpendProof> {
        if !self.is_satisfied(statement, witness)? {
            bail!("spend witness does not satisfy the circuit");
        }

        let circuit = SpendCircuit::new(&self.params, statement, witness);
        let proof = Groth16::<Bn254>::prove(&self.pk, circuit, rng)
            .context("Groth16 proof generation failed")?;

        let mut bytes = Vec::new();
        proof
            .serialize_compressed(&mut bytes)
            .context("proof serialization failed")?;
        Ok(SpendProof { bytes })
    }
}

// ---------------------------------------------------------------------------
// SpendProof
// ---------------------------------------------------------------------------

/// A compressed Groth16 proof of a spend.
#[derive(Clone, PartialEq, Eq)]
pub struct SpendProof {
    bytes: Vec<u8>,
}

impl SpendProof {
    pub fn to_bytes(&self) -> Vec<u8> {
        self.bytes.clone()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Parse and validate compressed proof bytes.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        ark_groth16::Proof::<Bn254>::deserialize_compressed(data)
            .context("invalid Groth16 proof bytes")?;
        Ok(Self {
            bytes: data.to_vec(),
        })
    }

    pub(crate) fn to_ark_proof(&self) -> Result<ark_groth16::Proof<Bn254>> {
        ark_groth16::Proof::<Bn254>::deserialize_compressed(&self.bytes[..])
            .context("proof deserialization failed")
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

impl fmt::Debug for SpendProof {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SpendProof({} bytes)", self.bytes.len())
    }
}

impl Serialize for SpendProof {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(&self.bytes))
    }
}

impl<'de> Deserialize<'de> for SpendProof {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(&s).map_err(serde::de::Error::custom)?;
        SpendProof::from_bytes(&bytes).map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
