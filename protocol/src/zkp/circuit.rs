//! # Spend Circuit
//!
//! The R1CS statement behind every private send:
//!
//! ```text
//! "I know (V, R, change, r_c) such that
//!     1. V * g + R * h      = c_in        (inputs open to V)
//!     2. change * g + r_c * h = c_change  (change note opens to change)
//!     3. V = amount + change              (conservation)
//!     4. 0 <= change < 2^64               (no wrap-around)"
//! ```
//!
//! `c_in` is the homomorphic sum of the scalar commitments being spent, so
//! `(V, R)` is the sum of their openings. A spend of one note and a spend of
//! five notes produce the same circuit.
//!
//! A fifth public input, the transaction binding, is squared into a dummy
//! constraint. It carries no arithmetic meaning; it makes the proof
//! non-malleable with respect to the nullifiers and destination it was
//! produced for.
//!
//! When a spend has no change, both `change` and `r_c` are zero and `c_change`
//! is the zero scalar.
//!
//! ## Public inputs (in order)
//!
//! | index | value |
//! |-------|-------|
//! | 0 | aggregated input scalar commitment `c_in` |
//! | 1 | change scalar commitment `c_change` |
//! | 2 | `Fr::from(amount)` |
//! | 3 | transaction binding |
//!
//! Roughly 70 constraints: 4 for the commitments, 64 booleans, one
//! recomposition, one conservation, one binding square.

use ark_bn254::Fr;
use ark_ff::PrimeField;
use ark_r1cs_std::{
    alloc::AllocVar,
    boolean::Boolean,
    eq::EqGadget,
    fields::{fp::FpVar, FieldVar},
};
use ark_relations::r1cs::{ConstraintSynthesizer, ConstraintSystemRef, SynthesisError};

use super::commitment::{scalar_to_bytes, PedersenParams};
use crate::config::{RANGE_BITS, STATEMENT_CONTEXT};
use crate::crypto::hash::derive_key;

// ---------------------------------------------------------------------------
// Witness and public statement
// ---------------------------------------------------------------------------

/// Public half of a spend statement.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SpendStatement {
    /// Sum of the input scalar commitments.
    pub input_sum: Fr,
    /// Scalar commitment of the change note, zero when there is none.
    pub change_commitment: Fr,
    /// Amount leaving the shielded pool.
    pub amount: u64,
    /// Digest of nullifiers, destination and change, reduced into Fr.
    pub binding: Fr,
}

impl SpendStatement {
    /// Public inputs in allocation order.
    pub fn public_inputs(&self) -> Vec<Fr> {
        vec![
            self.input_sum,
            self.change_commitment,
            Fr::from(self.amount),
            self.binding,
        ]
    }

    /// Domain-separated digest of the public inputs.
    pub fn digest(&self) -> [u8; 32] {
        let inputs: Vec<[u8; 32]> = self.public_inputs().iter().map(scalar_to_bytes).collect();
        let parts: Vec<&[u8]> = inputs.iter().map(|b| b.as_slice()).collect();
        derive_key(STATEMENT_CONTEXT, &parts)
    }
}

/// Private half of a spend statement.
#[derive(Clone, Copy)]
pub struct SpendWitness {
    /// Sum of input amounts.
    pub input_value: u64,
    /// Sum of input blindings.
    pub input_blinding: Fr,
    pub change_value: u64,
    pub change_blinding: Fr,
}

// ---------------------------------------------------------------------------
// Circuit definition
// ---------------------------------------------------------------------------

/// Groth16 circuit for a spend. `Option` slots are empty during key
/// generation; the constraint topology does not depend on them.
#[derive(Clone)]
pub struct SpendCircuit {
    pub g_scalar: Fr,
    pub h_scalar: Fr,

    // -- Private witness ----------------------------------------------------
    pub input_value: Option<Fr>,
    pub input_blinding: Option<Fr>,
    pub change_value: Option<Fr>,
    pub change_blinding: Option<Fr>,

    // -- Public inputs ------------------------------------------------------
    pub input_sum: Option<Fr>,
    pub change_commitment: Option<Fr>,
    pub amount: Option<Fr>,
    pub binding: Option<Fr>,
}

impl SpendCircuit {
    pub fn new(params: &PedersenParams, statement: &SpendStatement, witness: &SpendWitness) -> Self {
        Self {
            g_scalar: params.g_scalar,
            h_scalar: params.h_scalar,
            input_value: Some(Fr::from(witness.input_value)),
            input_blinding: Some(witness.input_blinding),
            change_value: Some(Fr::from(witness.change_value)),
            change_blinding: Some(witness.change_blinding),
            input_sum: Some(statement.input_sum),
            change_commitment: Some(statement.change_commitment),
            amount: Some(Fr::from(statement.amount)),
            binding: Some(statement.binding),
        }
    }

    /// Witness-free circuit for CRS generation.
    pub fn blank(params: &PedersenParams) -> Self {
        Self {
            g_scalar: params.g_scalar,
            h_scalar: params.h_scalar,
            input_value: None,
            input_blinding: None,
            change_value: None,
            change_blinding: None,
            input_sum: None,
            change_commitment: None,
            amount: None,
            binding: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Constraint synthesizer
// ---------------------------------------------------------------------------

impl ConstraintSynthesizer<Fr> for SpendCircuit {
    fn generate_constraints(self, cs: ConstraintSystemRef<Fr>) -> Result<(), SynthesisError> {
        // Public inputs. Order must match `SpendStatement::public_inputs`.
        let input_sum = FpVar::<Fr>::new_input(ark_relations::ns!(cs, "input_sum"), || {
            self.input_sum.ok_or(SynthesisError::AssignmentMissing)
        })?;
        let change_commitment =
            FpVar::<Fr>::new_input(ark_relations::ns!(cs, "change_commitment"), || {
                self.change_commitment
                    .ok_or(SynthesisError::AssignmentMissing)
            })?;
        let amount = FpVar::<Fr>::new_input(ark_relations::ns!(cs, "amount"), || {
            self.amount.ok_or(SynthesisError::AssignmentMissing)
        })?;
        let binding = FpVar::<Fr>::new_input(ark_relations::ns!(cs, "binding"), || {
            self.binding.ok_or(SynthesisError::AssignmentMissing)
        })?;

        // Private witnesses.
        let input_value = FpVar::<Fr>::new_witness(ark_relations::ns!(cs, "input_value"), || {
            self.input_value.ok_or(SynthesisError::AssignmentMissing)
        })?;
        let input_blinding =
            FpVar::<Fr>::new_witness(ark_relations::ns!(cs, "input_blinding"), || {
                self.input_blinding.ok_or(SynthesisError::AssignmentMissing)
            })?;
        let change_value =
            FpVar::<Fr>::new_witness(ark_relations::ns!(cs, "change_value"), || {
                self.change_value.ok_or(SynthesisError::AssignmentMissing)
            })?;
        let change_blinding =
            FpVar::<Fr>::new_witness(ark_relations::ns!(cs, "change_blinding"), || {
                self.change_blinding.ok_or(SynthesisError::AssignmentMissing)
            })?;

        let g = FpVar::<Fr>::new_constant(ark_relations::ns!(cs, "g_scalar"), self.g_scalar)?;
        let h = FpVar::<Fr>::new_constant(ark_relations::ns!(cs, "h_scalar"), self.h_scalar)?;

        // 1. Inputs open to (V, R).
        (&input_value * &g + &input_blinding * &h).enforce_equal(&input_sum)?;

        // 2. Change note opens to (change, r_c).
        (&change_value * &g + &change_blinding * &h).enforce_equal(&change_commitment)?;

        // 3. Conservation.
        (&amount + &change_value).enforce_equal(&input_value)?;

        // 4. change in [0, 2^64).
        let bits = value_to_bits(self.change_value);
        let mut reconstructed = FpVar::<Fr>::zero();
        let mut power_of_two = FpVar::<Fr>::one();
        let two = FpVar::<Fr>::constant(Fr::from(2u64));
        for i in 0..RANGE_BITS {
            let bit = Boolean::<Fr>::new_witness(ark_relations::ns!(cs, "change_bit"), || {
                bits.as_ref()
                    .map(|b| b[i])
                    .ok_or(SynthesisError::AssignmentMissing)
            })?;
            reconstructed += FpVar::<Fr>::from(bit) * &power_of_two;
            power_of_two *= &two;
        }
        reconstructed.enforce_equal(&change_value)?;

        // 5. Bind the proof to the transaction.
        let binding_sq = binding.square()?;
        let binding_sq_witness =
            FpVar::<Fr>::new_witness(ark_relations::ns!(cs, "binding_sq"), || {
                self.binding
                    .map(|b| b * b)
                    .ok_or(SynthesisError::AssignmentMissing)
            })?;
        binding_sq.enforce_equal(&binding_sq_witness)?;

        Ok(())
    }
}

/// Little-endian bits of a value, `None` in key-generation mode.
fn value_to_bits(value: Option<Fr>) -> Option<Vec<bool>> {
    let bigint = value?.into_bigint();
    Some(
        bigint
            .0
            .iter()
            .flat_map(|limb| (0..64).map(move |i| (limb >> i) & 1 == 1))
            .take(RANGE_BITS)
            .collect(),
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
