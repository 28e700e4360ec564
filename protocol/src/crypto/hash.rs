//! # Hashing & Key Derivation
//!
//! Every derived secret in Umbra comes out of BLAKE3 in one of its three
//! modes, and every digest a third party might need to reproduce comes out of
//! SHA-256:
//!
//! - **`derive_key`** splits the seed into purpose-bound sub-keys and derives
//!   nullifiers and per-note blindings. The context string is part of the
//!   function; two contexts can never produce related outputs.
//! - **`keyed_hash`** computes owner tags: a PRF under the tag key, so the
//!   owner can recognise its notes and nobody else can link them.
//! - **plain `hash`** for digests of public data (public-input digests,
//!   transaction ids).
//!
//! `hash_to_field` is how bytes become BN254 scalars. It reduces a 256-bit
//! BLAKE3 output modulo the ~254-bit field order; the bias is below 2^-128.

use ark_bn254::Fr;
use ark_ff::PrimeField;
use sha2::{Digest, Sha256};

/// SHA-256 of the input as a fixed array.
///
/// Used for the transaction id, where a ledger implementation in another
/// ecosystem should be able to recompute it without pulling in BLAKE3.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// `SHA-256(SHA-256(data))`, the classic transaction-id construction.
pub fn double_sha256(data: &[u8]) -> [u8; 32] {
    sha256(&sha256(data))
}

/// Plain BLAKE3 digest.
///
/// # Example
///
/// ```
/// use umbra_protocol::crypto::blake3_hash;
///
/// let digest = blake3_hash(b"umbra");
/// assert_eq!(digest.len(), 32);
/// ```
pub fn blake3_hash(data: &[u8]) -> [u8; 32] {
    *blake3::hash(data).as_bytes()
}

/// BLAKE3 over several slices fed sequentially. Equal to hashing their
/// concatenation, without building the buffer.
pub fn blake3_hash_multi(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new();
    for part in parts {
        hasher.update(part);
    }
    *hasher.finalize().as_bytes()
}

/// BLAKE3 `derive_key` over several slices.
///
/// `context` must be a hardcoded, globally unique string (see the
/// `*_CONTEXT` constants in [`crate::config`]). Never pass user input as the
/// context.
pub fn derive_key(context: &str, parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new_derive_key(context);
    for part in parts {
        hasher.update(part);
    }
    *hasher.finalize().as_bytes()
}

/// BLAKE3 in keyed mode: a PRF under `key`.
pub fn keyed_hash(key: &[u8; 32], parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new_keyed(key);
    for part in parts {
        hasher.update(part);
    }
    *hasher.finalize().as_bytes()
}

/// Map arbitrary bytes to a BN254 scalar: BLAKE3, then reduce mod `r`.
///
/// ```
/// use umbra_protocol::crypto::hash::hash_to_field;
///
/// assert_eq!(hash_to_field(b"a"), hash_to_field(b"a"));
/// assert_ne!(hash_to_field(b"a"), hash_to_field(b"b"));
/// ```
pub fn hash_to_field(data: &[u8]) -> Fr {
    Fr::from_le_bytes_mod_order(&blake3_hash(data))
}

/// Reduce 32 already-uniform bytes to a scalar without rehashing.
pub fn bytes_to_field(bytes: &[u8; 32]) -> Fr {
    Fr::from_le_bytes_mod_order(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_known_vector() {
        let expected =
            hex::decode("e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855")
                .unwrap();
        assert_eq!(sha256(b"").as_slice(), expected.as_slice());
    }

    #[test]
    fn double_sha256_is_sha_of_sha() {
        let once = sha256(b"umbra");
        assert_eq!(double_sha256(b"umbra"), sha256(&once));
        assert_ne!(double_sha256(b"umbra"), once);
    }

    #[test]
    fn multi_matches_concatenation() {
        assert_eq!(
            blake3_hash_multi(&[b"hello", b" world"]),
            blake3_hash(b"hello world")
        );
    }

    #[test]
    fn derive_key_separates_contexts() {
        let a = derive_key("umbra test a", &[b"material"]);
        let b = derive_key("umbra test b", &[b"material"]);
        assert_ne!(a, b);
        assert_ne!(a, blake3_hash(b"material"));
    }

    #[test]
    fn derive_key_matches_blake3_reference() {
        let ours = derive_key("umbra test", &[b"ab", b"cd"]);
        assert_eq!(ours, blake3::derive_key("umbra test", b"abcd"));
    }

    #[test]
    fn keyed_hash_depends_on_key() {
        let a = keyed_hash(&[1u8; 32], &[b"note"]);
        let b = keyed_hash(&[2u8; 32], &[b"note"]);
        assert_ne!(a, b);
        assert_eq!(a, *blake3::keyed_hash(&[1u8; 32], b"note").as_bytes());
    }

    #[test]
    fn hash_to_field_is_deterministic() {
        assert_eq!(hash_to_field(b"x"), hash_to_field(b"x"));
        assert_ne!(hash_to_field(b"x"), hash_to_field(b"y"));
    }
}
