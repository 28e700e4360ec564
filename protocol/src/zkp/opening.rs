//! Proof that a top-up note commits to the amount it claims.
//!
//! A top-up debits a public amount `v` and publishes `C = v * G + r * H`.
//! The ledger cannot open `C`, so the owner proves knowledge of `r` with
//! `C - v * G = r * H` (a Schnorr proof with base `H`):
//!
//! ```text
//! k  <- random,  K = k * H
//! e  = H(C || K || v || context)
//! s  = k + e * r
//! verify: s * H == K + e * (C - v * G)
//! ```
//!
//! `context` is the owner's public key, so a proof cannot be lifted into
//! someone else's top-up. Nothing about `r` leaks beyond what `C` already
//! says.

use ark_bn254::{Fr, G1Affine};
use ark_ec::{AffineRepr, CurveGroup};
use ark_ff::UniformRand;
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize, SerializationError};
use ark_std::rand::Rng;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::ops::Mul;

use super::commitment::{Commitment, PedersenParams};
use crate::config::OPENING_CONTEXT;
use crate::crypto::hash::{bytes_to_field, derive_key};

#[derive(Clone, Copy, PartialEq, Eq, CanonicalSerialize, CanonicalDeserialize)]
pub struct OpeningProof {
    nonce: G1Affine,
    response: Fr,
}

impl OpeningProof {
    pub fn prove<R: Rng>(
        params: &PedersenParams,
        commitment: &Commitment,
        amount: u64,
        blinding: Fr,
        context: &[u8],
        rng: &mut R,
    ) -> Self {
        let k = Fr::rand(rng);
        let nonce = params.h.mul(k).into_affine();
        let e = challenge(commitment, &nonce, amount, context);
        Self {
            nonce,
            response: k + e * blinding,
        }
    }

    pub fn verify(
        &self,
        params: &PedersenParams,
        commitment: &Commitment,
        amount: u64,
        context: &[u8],
    ) -> bool {
        let e = challenge(commitment, &self.nonce, amount, context);
        let excess = commitment.point.into_group() - params.g.mul(Fr::from(amount));
        params.h.mul(self.response) == self.nonce.into_group() + excess.mul(e)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.serialize_compressed(&mut buf)
            .expect("OpeningProof serialization must not fail");
        buf
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, SerializationError> {
        Self::deserialize_compressed(data)
    }
}

fn challenge(commitment: &Commitment, nonce: &G1Affine, amount: u64, context: &[u8]) -> Fr {
    let mut nonce_bytes = Vec::new();
    nonce
        .serialize_compressed(&mut nonce_bytes)
        .expect("G1 serialization must not fail");
    bytes_to_field(&derive_key(
        OPENING_CONTEXT,
        &[&commitment.to_bytes(), &nonce_bytes, &amount.to_le_bytes(), context],
    ))
}

impl fmt::Debug for OpeningProof {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OpeningProof({}..)", &hex::encode(self.to_bytes())[..16])
    }
}

impl Serialize for OpeningProof {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(self.to_bytes()))
    }
}

impl<'de> Deserialize<'de> for OpeningProof {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(&s).map_err(serde::de::Error::custom)?;
        OpeningProof::from_bytes(&bytes).map_err(serde::de::Error::custom)
    }
}
