//! # AES-256-GCM
//!
//! Authenticated encryption for two things: the note payload published next
//! to every commitment (so the owner can recover amount and salt when
//! re-scanning), and sealed proof requests (see [`super::sealing`]).
//!
//! Both callers bind ciphertext to context through AAD. A note is bound to
//! its commitment bytes; a proof request is bound to the digest of its public
//! inputs. Moving a ciphertext to another commitment or request makes
//! decryption fail.
//!
//! Nonces are 96 random bits from `OsRng`. Every key here is either derived
//! per-request (sealing) or encrypts one short note per top-up, far below
//! the birthday bound.
//!
//! Wire format: `nonce (12) ‖ ciphertext ‖ tag (16)`.

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Nonce,
};
use rand::RngCore;
use thiserror::Error;

use crate::config::{AES_KEY_LENGTH, AES_NONCE_LENGTH};

/// GCM authentication tag length.
pub const TAG_LENGTH: usize = 16;

/// Encryption failures. Deliberately undetailed: "wrong key" and "tampered
/// ciphertext" look identical from the outside.
#[derive(Debug, Error)]
pub enum EncryptionError {
    #[error("encryption failed")]
    EncryptFailed,

    #[error("decryption failed -- wrong key, wrong context or corrupted ciphertext")]
    DecryptFailed,

    #[error("ciphertext too short: must be at least {} bytes", AES_NONCE_LENGTH + TAG_LENGTH)]
    CiphertextTooShort,
}

/// Encrypt `plaintext` bound to `aad`. Returns `nonce ‖ ciphertext`.
///
/// ```
/// use umbra_protocol::crypto::encryption::{open, seal};
///
/// let key = [0x42u8; 32];
/// let sealed = seal(&key, b"amount and salt", b"commitment").unwrap();
/// assert_eq!(open(&key, &sealed, b"commitment").unwrap(), b"amount and salt");
/// assert!(open(&key, &sealed, b"another commitment").is_err());
/// ```
pub fn seal(
    key: &[u8; AES_KEY_LENGTH],
    plaintext: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>, EncryptionError> {
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| EncryptionError::EncryptFailed)?;

    let mut nonce_bytes = [0u8; AES_NONCE_LENGTH];
    rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);

    let ciphertext = cipher
        .encrypt(
            Nonce::from_slice(&nonce_bytes),
            Payload {
                msg: plaintext,
                aad,
            },
        )
        .map_err(|_| EncryptionError::EncryptFailed)?;

    let mut out = Vec::with_capacity(AES_NONCE_LENGTH + ciphertext.len());
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Inverse of [`seal`]. Fails unless key, AAD and bytes are all intact.
pub fn open(
    key: &[u8; AES_KEY_LENGTH],
    data: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>, EncryptionError> {
    if data.len() < AES_NONCE_LENGTH + TAG_LENGTH {
        return Err(EncryptionError::CiphertextTooShort);
    }
    let (nonce_bytes, ciphertext) = data.split_at(AES_NONCE_LENGTH);
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| EncryptionError::DecryptFailed)?;

    cipher
        .decrypt(
            Nonce::from_slice(nonce_bytes),
            Payload {
                msg: ciphertext,
                aad,
            },
        )
        .map_err(|_| EncryptionError::DecryptFailed)
}
