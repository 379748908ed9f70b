//! Authenticated encryption with AES-256-GCM
//!
//! The ciphertext returned by [`seal`] carries the 16-byte GCM tag appended
//! to it, and [`open`] expects the same combined form. No associated data is
//! authenticated.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};

use crate::error::{ErrorCategory, ErrorKind, QrsealError, Result};
use crate::kdf::KEY_LEN;

/// Length of nonce in bytes
pub const NONCE_LEN: usize = 12;

/// Length of the GCM authentication tag in bytes
pub const TAG_LEN: usize = 16;

/// Encrypt `plaintext`, returning ciphertext with the tag appended.
///
/// The (key, nonce) pair must never be used twice.
pub fn seal(key: &[u8; KEY_LEN], nonce: &[u8; NONCE_LEN], plaintext: &[u8]) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    cipher
        .encrypt(Nonce::from_slice(nonce), plaintext)
        .map_err(|_| {
            // Only reachable for inputs far beyond what GCM permits.
            QrsealError::with_kind(
                ErrorCategory::Internal,
                ErrorKind::InternalInvariant,
                "encryption failed",
            )
        })
}

/// Decrypt and verify `ciphertext` (which includes the trailing tag).
///
/// Every failure, whether a wrong key, a wrong nonce, a flipped bit, or
/// input too short to hold a tag, yields the same error.
pub fn open(key: &[u8; KEY_LEN], nonce: &[u8; NONCE_LEN], ciphertext: &[u8]) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| authentication_failed())
}

pub(crate) fn authentication_failed() -> QrsealError {
    QrsealError::with_kind(
        ErrorCategory::User,
        ErrorKind::AuthenticationFailed,
        "authentication failed",
    )
}
