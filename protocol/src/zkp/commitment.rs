//! # Pedersen Commitments over BN254
//!
//! Every shielded note is a Pedersen commitment to its amount `v` under a
//! blinding factor `r`, carried in two forms that share the same witness:
//!
//! ```text
//! C = v * G + r * H          (on BN254/G1, published on the ledger)
//! c = v * g + r * h   mod p  (in Fr, what the spend circuit constrains)
//! ```
//!
//! The spend circuit runs over `Fr`. Checking the G1 form in-circuit would
//! mean emulating `Fq` arithmetic inside `Fr`; the scalar form costs two
//! multiplications instead.
//!
//! Both forms are additively homomorphic. A spend aggregates its inputs with
//! [`Commitment::aggregate`] and proves one opening `(V, R)` of the sum,
//! which is how the circuit stays the same size no matter how many notes a
//! spend consumes.

use ark_bn254::{Fr, G1Affine, G1Projective};
use ark_ec::{AffineRepr, CurveGroup};
use ark_ff::{UniformRand, Zero};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize, SerializationError};
use ark_std::rand::Rng;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::ops::Mul;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Generators for both commitment forms.
///
/// Whoever knows a discrete-log relation between `G` and `H` (or `g` and `h`)
/// can open any commitment to any value. [`PedersenParams::setup`] draws them
/// from the supplied RNG; a deployment must feed it ceremony output.
#[derive(Clone, Debug, PartialEq, Eq, CanonicalSerialize, CanonicalDeserialize)]
pub struct PedersenParams {
    /// EC generator for the value component.
    pub g: G1Affine,
    /// EC generator for the blinding component.
    pub h: G1Affine,
    /// Scalar generator for the value component.
    pub g_scalar: Fr,
    /// Scalar generator for the blinding component.
    pub h_scalar: Fr,
}

/// A commitment in both forms.
#[derive(Clone, Copy, PartialEq, Eq, CanonicalSerialize, CanonicalDeserialize)]
pub struct Commitment {
    /// `C = v * G + r * H` on BN254/G1.
    pub point: G1Affine,
    /// `c = v * g + r * h` in Fr.
    pub scalar: Fr,
}

// ---------------------------------------------------------------------------
// Setup
// ---------------------------------------------------------------------------

impl PedersenParams {
    pub fn setup<R: Rng>(rng: &mut R) -> Self {
        let g = G1Projective::rand(rng).into_affine();
        let h = G1Projective::rand(rng).into_affine();
        let g_scalar = Fr::rand(rng);
        let h_scalar = Fr::rand(rng);

        debug_assert!(!g.is_zero() && !h.is_zero());

        Self {
            g,
            h,
            g_scalar,
            h_scalar,
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.serialize_compressed(&mut buf)
            .expect("PedersenParams serialization must not fail");
        buf
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, SerializationError> {
        Self::deserialize_compressed(data)
    }
}

// ---------------------------------------------------------------------------
// Commit / open
// ---------------------------------------------------------------------------

/// Commit to `value` under `blinding`, in both forms.
pub fn commit(params: &PedersenParams, value: u64, blinding: Fr) -> Commitment {
    let v = Fr::from(value);
    let point = (params.g.mul(v) + params.h.mul(blinding)).into_affine();
    let scalar = v * params.g_scalar + blinding * params.h_scalar;
    Commitment { point, scalar }
}

/// `true` iff `commitment` opens to `(value, blinding)` in both forms.
/// Reveals the opening; this is the prover's check, not a public one.
pub fn verify_opening(
    params: &PedersenParams,
    commitment: &Commitment,
    value: u64,
    blinding: Fr,
) -> bool {
    commit(params, value, blinding) == *commitment
}

impl Commitment {
    /// The commitment to zero under zero blinding: the identity in both forms.
    pub fn identity() -> Self {
        Self {
            point: G1Affine::zero(),
            scalar: Fr::zero(),
        }
    }

    /// Homomorphic sum. Opens to the sum of values under the sum of blindings.
    pub fn aggregate<'a, I>(commitments: I) -> Self
    where
        I: IntoIterator<Item = &'a Commitment>,
    {
        let mut point = G1Projective::zero();
        let mut scalar = Fr::zero();
        for c in commitments {
            point += c.point;
            scalar += c.scalar;
        }
        Self {
            point: point.into_affine(),
            scalar,
        }
    }

    /// Canonical compressed encoding. Tags, nullifiers and note AAD are all
    /// computed over these bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.serialize_compressed(&mut buf)
            .expect("Commitment serialization must not fail");
        buf
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, SerializationError> {
        Self::deserialize_compressed(data)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }
}

impl fmt::Debug for Commitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex = self.to_hex();
        write!(f, "Commitment({}..)", &hex[..16])
    }
}

impl Serialize for Commitment {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Commitment {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(&s).map_err(serde::de::Error::custom)?;
        Commitment::from_bytes(&bytes).map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Scalar encoding
// ---------------------------------------------------------------------------

/// Canonical 32-byte little-endian encoding of a scalar.
pub fn scalar_to_bytes(scalar: &Fr) -> [u8; 32] {
    let mut out = [0u8; 32];
    scalar
        .serialize_compressed(&mut out[..])
        .expect("Fr always fits in 32 bytes");
    out
}

/// Inverse of [`scalar_to_bytes`]. Rejects non-canonical encodings.
pub fn scalar_from_bytes(bytes: &[u8]) -> Result<Fr, SerializationError> {
    Fr::deserialize_compressed(bytes)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
