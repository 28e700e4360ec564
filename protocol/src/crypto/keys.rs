//! # Keys & the Key-Holder Boundary
//!
//! Ed25519 identities for Umbra accounts.
//!
//! The engine never needs a private key for itself. It needs *something that
//! can sign*: once to derive the shielded seed, and once per top-up to
//! authorise the public debit. That capability is the [`KeyHolder`] trait.
//! A hardware wallet, a browser extension bridge, or the plain in-memory
//! [`Keypair`] below can all stand behind it.
//!
//! Public keys and signatures are displayed in base58, the way account
//! addresses and transaction signatures appear on the ledgers Umbra targets.
//!
//! Key bytes are never logged. The `Debug` impl of [`Keypair`] prints the
//! public half only.

use ed25519_dalek::{
    Signature as DalekSignature, Signer, SigningKey, Verifier, VerifyingKey, KEYPAIR_LENGTH,
    SECRET_KEY_LENGTH,
};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::config::SIGNATURE_LENGTH;

/// Errors from key parsing and signing.
///
/// Messages stay vague about key material on purpose.
#[derive(Debug, Error)]
pub enum KeyError {
    /// Secret key bytes have the wrong length.
    #[error("invalid secret key bytes")]
    InvalidSecretKey,

    /// Bytes are not a valid Ed25519 point, or the encoding is malformed.
    #[error("invalid public key")]
    InvalidPublicKey,

    /// Signature bytes have the wrong length or encoding.
    #[error("invalid signature encoding")]
    InvalidSignature,

    /// A 64-byte keypair whose public half does not match its secret half.
    #[error("keypair validation failed: public key does not match secret key")]
    KeypairMismatch,

    /// The key holder could not produce a signature (locked device, user
    /// declined, bridge disconnected).
    #[error("signer unavailable: {0}")]
    SignerUnavailable(String),
}

// ---------------------------------------------------------------------------
// KeyHolder
// ---------------------------------------------------------------------------

/// Anything able to produce Ed25519 signatures for one public key.
pub trait KeyHolder: Send + Sync {
    /// The public key signatures will verify against.
    fn public_key(&self) -> PublicKey;

    /// Sign `message`. Implementations that front a device or a user prompt
    /// return [`KeyError::SignerUnavailable`] when no signature is coming.
    fn sign(&self, message: &[u8]) -> Result<Signature, KeyError>;
}

// ---------------------------------------------------------------------------
// Keypair
// ---------------------------------------------------------------------------

/// An in-memory Ed25519 keypair.
///
/// Deliberately not `Serialize`. Exporting a secret goes through
/// [`Keypair::to_keypair_bytes`] so it is always an explicit act.
///
/// ```
/// use umbra_protocol::crypto::keys::{Keypair, KeyHolder};
///
/// let kp = Keypair::generate();
/// let sig = KeyHolder::sign(&kp, b"hello").unwrap();
/// assert!(kp.public_key().verify(b"hello", &sig));
/// ```
pub struct Keypair {
    signing_key: SigningKey,
}

impl Keypair {
    /// Fresh keypair from the OS RNG.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Deterministic keypair from a 32-byte secret. Test fixtures and
    /// KDF-derived keys use this.
    pub fn from_seed(seed: &[u8; SECRET_KEY_LENGTH]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(seed),
        }
    }

    /// Parse the 64-byte `secret ‖ public` layout used by keyfiles.
    /// The public half is checked against the one derived from the secret.
    pub fn from_keypair_bytes(bytes: &[u8]) -> Result<Self, KeyError> {
        let arr: &[u8; KEYPAIR_LENGTH] = bytes
            .try_into()
            .map_err(|_| KeyError::InvalidSecretKey)?;
        let signing_key =
            SigningKey::from_keypair_bytes(arr).map_err(|_| KeyError::KeypairMismatch)?;
        Ok(Self { signing_key })
    }

    /// Export as `secret ‖ public`, 64 bytes. Handle with care.
    pub fn to_keypair_bytes(&self) -> [u8; KEYPAIR_LENGTH] {
        self.signing_key.to_keypair_bytes()
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey {
            bytes: self.signing_key.verifying_key().to_bytes(),
        }
    }

    /// Infallible signing, for callers holding a concrete `Keypair`.
    pub fn sign_message(&self, message: &[u8]) -> Signature {
        Signature {
            bytes: self.signing_key.sign(message).to_bytes(),
        }
    }
}

impl KeyHolder for Keypair {
    fn public_key(&self) -> PublicKey {
        Keypair::public_key(self)
    }

    fn sign(&self, message: &[u8]) -> Result<Signature, KeyError> {
        Ok(self.sign_message(message))
    }
}

impl Clone for Keypair {
    fn clone(&self) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(&self.signing_key.to_bytes()),
        }
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Keypair(pub={})", self.public_key())
    }
}

// ---------------------------------------------------------------------------
// PublicKey
// ---------------------------------------------------------------------------

/// A 32-byte Ed25519 public key, doubling as an account address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PublicKey {
    bytes: [u8; 32],
}

impl PublicKey {
    /// Wrap raw bytes without curve validation. Use
    /// [`PublicKey::try_from_slice`] for untrusted input.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self { bytes }
    }

    /// Length-checked and point-validated constructor.
    pub fn try_from_slice(slice: &[u8]) -> Result<Self, KeyError> {
        let bytes: [u8; 32] = slice.try_into().map_err(|_| KeyError::InvalidPublicKey)?;
        VerifyingKey::from_bytes(&bytes).map_err(|_| KeyError::InvalidPublicKey)?;
        Ok(Self { bytes })
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.bytes
    }

    /// `true` iff `signature` is a valid signature over `message`.
    pub fn verify(&self, message: &[u8], signature: &Signature) -> bool {
        let Ok(verifying_key) = VerifyingKey::from_bytes(&self.bytes) else {
            return false;
        };
        let sig = DalekSignature::from_bytes(&signature.bytes);
        verifying_key.verify(message, &sig).is_ok()
    }

    pub fn to_base58(&self) -> String {
        bs58::encode(self.bytes).into_string()
    }

    pub fn from_base58(s: &str) -> Result<Self, KeyError> {
        let bytes = bs58::decode(s)
            .into_vec()
            .map_err(|_| KeyError::InvalidPublicKey)?;
        Self::try_from_slice(&bytes)
    }
}

impl FromStr for PublicKey {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_base58(s)
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base58())
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self.to_base58())
    }
}

// ---------------------------------------------------------------------------
// Signature
// ---------------------------------------------------------------------------

/// A 64-byte Ed25519 signature.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Signature {
    bytes: [u8; SIGNATURE_LENGTH],
}

impl Signature {
    pub fn from_bytes(bytes: [u8; SIGNATURE_LENGTH]) -> Self {
        Self { bytes }
    }

    pub fn try_from_slice(slice: &[u8]) -> Result<Self, KeyError> {
        let bytes: [u8; SIGNATURE_LENGTH] =
            slice.try_into().map_err(|_| KeyError::InvalidSignature)?;
        Ok(Self { bytes })
    }

    pub fn as_bytes(&self) -> &[u8; SIGNATURE_LENGTH] {
        &self.bytes
    }

    pub fn to_base58(&self) -> String {
        bs58::encode(self.bytes).into_string()
    }

    pub fn from_base58(s: &str) -> Result<Self, KeyError> {
        let bytes = bs58::decode(s)
            .into_vec()
            .map_err(|_| KeyError::InvalidSignature)?;
        Self::try_from_slice(&bytes)
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base58())
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = self.to_base58();
        write!(f, "Signature({}..)", &s[..s.len().min(12)])
    }
}

// Serde through hex: serde's derive does not cover [u8; 64].
impl Serialize for Signature {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(self.bytes))
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(&s).map_err(serde::de::Error::custom)?;
        Signature::try_from_slice(&bytes).map_err(serde::de::Error::custom)
    }
}
