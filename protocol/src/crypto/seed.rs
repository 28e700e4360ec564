//! # Seed Derivation
//!
//! A shielded balance is keyed by a 64-byte seed: the Ed25519 signature of
//! the account key over [`SEED_MESSAGE`]. Ed25519 signing is deterministic, so
//! the same key holder always gets the same seed back and can rebuild its
//! private balance from the ledger on any machine, with nothing extra to back
//! up.
//!
//! The seed is never used directly. [`Seed::note_keys`] splits it into three
//! purpose-bound keys with BLAKE3 `derive_key`:
//!
//! | key | used for |
//! |---|---|
//! | blinding key | per-note Pedersen blinding factors |
//! | tag key | owner tags that let a re-scan recognise our notes |
//! | note key | AES-256-GCM encryption of the published note payload |
//!
//! Both [`Seed`] and [`NoteKeys`] zero their memory on drop and redact
//! themselves in `Debug`. They are passed explicitly; nothing in the engine
//! keeps a global copy.

use ark_bn254::Fr;
use std::fmt;
use subtle::ConstantTimeEq;
use thiserror::Error;
use tracing::debug;
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::hash::{derive_key, hash_to_field, keyed_hash};
use super::keys::KeyHolder;
use crate::config::{
    BLINDING_CONTEXT, BLINDING_KEY_CONTEXT, NOTE_KEY_CONTEXT, SEED_LENGTH, SEED_MESSAGE,
    TAG_KEY_CONTEXT,
};

#[derive(Debug, Error)]
pub enum SeedError {
    /// The key holder produced no signature, or one that does not verify.
    #[error("signing unavailable: {0}")]
    SigningUnavailable(String),
}

/// 64 secret bytes identifying one shielded balance.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Seed {
    bytes: [u8; SEED_LENGTH],
}

impl Seed {
    /// Restore a seed from bytes previously obtained via [`derive_seed`].
    pub fn from_bytes(bytes: [u8; SEED_LENGTH]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; SEED_LENGTH] {
        &self.bytes
    }

    /// Split the seed into its working keys.
    pub fn note_keys(&self) -> NoteKeys {
        NoteKeys {
            blinding_key: derive_key(BLINDING_KEY_CONTEXT, &[&self.bytes]),
            tag_key: derive_key(TAG_KEY_CONTEXT, &[&self.bytes]),
            note_key: derive_key(NOTE_KEY_CONTEXT, &[&self.bytes]),
        }
    }
}

impl fmt::Debug for Seed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Seed(<redacted>)")
    }
}

impl PartialEq for Seed {
    fn eq(&self, other: &Self) -> bool {
        self.bytes[..].ct_eq(&other.bytes[..]).into()
    }
}

impl Eq for Seed {}

/// Sign `message` with `holder` and return the signature as a seed.
///
/// Pass [`SEED_MESSAGE`] unless you are migrating an identity that was
/// created under a different message. The signature is verified against the
/// holder's public key before it is accepted.
///
/// ```
/// use umbra_protocol::config::SEED_MESSAGE;
/// use umbra_protocol::crypto::{derive_seed, Keypair};
///
/// let kp = Keypair::from_seed(&[1u8; 32]);
/// let a = derive_seed(&kp, SEED_MESSAGE.as_bytes()).unwrap();
/// let b = derive_seed(&kp, SEED_MESSAGE.as_bytes()).unwrap();
/// assert_eq!(a, b);
/// ```
pub fn derive_seed<H: KeyHolder + ?Sized>(holder: &H, message: &[u8]) -> Result<Seed, SeedError> {
    let public_key = holder.public_key();
    let signature = holder
        .sign(message)
        .map_err(|e| SeedError::SigningUnavailable(e.to_string()))?;

    if !public_key.verify(message, &signature) {
        return Err(SeedError::SigningUnavailable(
            "signature does not verify against the holder's public key".into(),
        ));
    }

    debug!(owner = %public_key, "derived shielded seed");
    Ok(Seed {
        bytes: *signature.as_bytes(),
    })
}

/// [`derive_seed`] over the fixed [`SEED_MESSAGE`].
pub fn derive_default_seed<H: KeyHolder + ?Sized>(holder: &H) -> Result<Seed, SeedError> {
    derive_seed(holder, SEED_MESSAGE.as_bytes())
}

/// Working keys derived from a [`Seed`].
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct NoteKeys {
    blinding_key: [u8; 32],
    tag_key: [u8; 32],
    note_key: [u8; 32],
}

impl NoteKeys {
    /// Blinding factor for the note created with `salt`.
    pub fn blinding_for(&self, salt: &[u8]) -> Fr {
        hash_to_field(&derive_key(BLINDING_CONTEXT, &[&self.blinding_key, salt]))
    }

    /// Owner tag for a commitment, given its canonical bytes.
    pub fn tag_for(&self, commitment_bytes: &[u8]) -> [u8; 32] {
        keyed_hash(&self.tag_key, &[commitment_bytes])
    }

    pub(crate) fn note_key(&self) -> &[u8; 32] {
        &self.note_key
    }
}

impl fmt::Debug for NoteKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("NoteKeys(<redacted>)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keys::{KeyError, Keypair, PublicKey, Signature};

    /// A holder whose device is locked.
    struct LockedDevice(PublicKey);

    impl KeyHolder for LockedDevice {
        fn public_key(&self) -> PublicKey {
            self.0
        }

        fn sign(&self, _message: &[u8]) -> Result<Signature, KeyError> {
            Err(KeyError::SignerUnavailable("device locked".into()))
        }
    }

    /// A holder that signs with a different key than it advertises.
    struct Impostor {
        advertised: PublicKey,
        actual: Keypair,
    }

    impl KeyHolder for Impostor {
        fn public_key(&self) -> PublicKey {
            self.advertised
        }

        fn sign(&self, message: &[u8]) -> Result<Signature, KeyError> {
            Ok(self.actual.sign_message(message))
        }
    }

    #[test]
    fn seed_is_deterministic_per_holder() {
        let kp = Keypair::from_seed(&[5u8; 32]);
        let a = derive_default_seed(&kp).unwrap();
        let b = derive_default_seed(&kp).unwrap();
        assert_eq!(a, b);

        let other = derive_default_seed(&Keypair::from_seed(&[6u8; 32])).unwrap();
        assert_ne!(a, other);
    }

    #[test]
    fn seed_depends_on_message() {
        let kp = Keypair::from_seed(&[5u8; 32]);
        let a = derive_seed(&kp, b"one").unwrap();
        let b = derive_seed(&kp, b"two").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn locked_signer_is_signing_unavailable() {
        let holder = LockedDevice(Keypair::generate().public_key());
        assert!(matches!(
            derive_default_seed(&holder),
            Err(SeedError::SigningUnavailable(_))
        ));
    }

    #[test]
    fn mismatched_signature_is_rejected() {
        let holder = Impostor {
            advertised: Keypair::generate().public_key(),
            actual: Keypair::generate(),
        };
        assert!(derive_default_seed(&holder).is_err());
    }

    #[test]
    fn seeds_differing_in_one_byte_are_unequal() {
        let a = Seed::from_bytes([7u8; SEED_LENGTH]);
        for i in [0, SEED_LENGTH / 2, SEED_LENGTH - 1] {
            let mut bytes = [7u8; SEED_LENGTH];
            bytes[i] ^= 0x01;
            assert_ne!(a, Seed::from_bytes(bytes));
        }
        assert_eq!(a, Seed::from_bytes([7u8; SEED_LENGTH]));
    }

    #[test]
    fn debug_is_redacted() {
        let seed = Seed::from_bytes([0xAB; SEED_LENGTH]);
        assert_eq!(format!("{:?}", seed), "Seed(<redacted>)");
        assert_eq!(format!("{:?}", seed.note_keys()), "NoteKeys(<redacted>)");
    }

    #[test]
    fn note_keys_are_independent() {
        let keys = Seed::from_bytes([1u8; SEED_LENGTH]).note_keys();
        assert_ne!(keys.blinding_key, keys.tag_key);
        assert_ne!(keys.tag_key, keys.note_key);
        assert_ne!(keys.blinding_for(b"salt-a"), keys.blinding_for(b"salt-b"));
        assert_eq!(keys.blinding_for(b"salt-a"), keys.blinding_for(b"salt-a"));
    }

    #[test]
    fn tags_differ_across_seeds() {
        let a = Seed::from_bytes([1u8; SEED_LENGTH]).note_keys();
        let b = Seed::from_bytes([2u8; SEED_LENGTH]).note_keys();
        assert_ne!(a.tag_for(b"commitment"), b.tag_for(b"commitment"));
    }
}
