//! Raw-key alternative scheme
//!
//! Instead of a password, the user keeps a random 256-bit key (as base64
//! text). There is no salt and no KDF, and the payload carries no
//! identifiers: it is base64 of `nonce(12) || ciphertext-with-tag`.
//! This format is never mixed with the password payload.

use base64::{Engine, engine::general_purpose::STANDARD};
use tracing::debug;
use zeroize::Zeroizing;

use crate::cipher::{self, NONCE_LEN, TAG_LEN};
use crate::error::{ErrorCategory, ErrorKind, QrsealError, Result};
use crate::flow::{self, AUTHENTICATION_FAILURE, FORMAT_FAILURE};
use crate::kdf::KEY_LEN;

/// A 256-bit AES key, wiped from memory on drop.
pub struct RawKey(Zeroizing<[u8; KEY_LEN]>);

impl RawKey {
    /// Generate a fresh key from the operating system's secure random generator.
    pub fn generate() -> Result<Self> {
        Ok(Self(Zeroizing::new(flow::fresh_bytes::<KEY_LEN>()?)))
    }

    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(Zeroizing::new(bytes))
    }

    /// Parse a key from base64 text. Surrounding whitespace is ignored.
    pub fn from_base64(text: &[u8]) -> Result<Self> {
        let decoded = Zeroizing::new(
            STANDARD
                .decode(text.trim_ascii())
                .map_err(|_| key_format())?,
        );
        let bytes: [u8; KEY_LEN] = decoded
            .as_slice()
            .try_into()
            .map_err(|_| key_format())?;
        Ok(Self::from_bytes(bytes))
    }

    pub fn to_base64(&self) -> Zeroizing<String> {
        Zeroizing::new(STANDARD.encode(&self.0[..]))
    }

    fn bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

/// Encrypt a message under a raw key with a random nonce.
pub fn seal_message(key: &RawKey, message: &str) -> Result<String> {
    flow::check_message(message)?;
    let nonce = flow::fresh_bytes::<NONCE_LEN>()?;
    seal_message_deterministic(key, message, &nonce)
}

/// Encrypt with a caller-chosen nonce. ONLY for reproducible test vectors.
pub fn seal_message_deterministic(
    key: &RawKey,
    message: &str,
    nonce: &[u8; NONCE_LEN],
) -> Result<String> {
    flow::check_message(message)?;
    let ciphertext = cipher::seal(key.bytes(), nonce, message.as_bytes())?;

    let mut body = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    body.extend_from_slice(nonce);
    body.extend_from_slice(&ciphertext);
    debug!(body_len = body.len(), "sealed message with raw key");
    Ok(STANDARD.encode(body))
}

/// Decrypt a raw-key payload.
pub fn open_message(key: &RawKey, text: &str) -> Result<String> {
    let text = text.trim();
    if text.is_empty() {
        return Err(QrsealError::with_kind(
            ErrorCategory::User,
            ErrorKind::EmptyPayload,
            "no payload to decrypt",
        ));
    }

    let body = STANDARD.decode(text).map_err(|e| {
        QrsealError::with_kind_and_source(
            ErrorCategory::User,
            ErrorKind::PayloadDecode,
            format!("base64 decoding failed: {}", e),
            e,
        )
        .with_context(FORMAT_FAILURE)
    })?;
    if body.len() < NONCE_LEN + TAG_LEN {
        return Err(QrsealError::with_kind(
            ErrorCategory::User,
            ErrorKind::PayloadInvalid,
            "input too short to hold a nonce and authentication tag",
        )
        .with_context(FORMAT_FAILURE));
    }

    let (nonce, ciphertext) = body.split_at(NONCE_LEN);
    let nonce: &[u8; NONCE_LEN] = nonce.try_into().map_err(|_| {
        QrsealError::with_kind(
            ErrorCategory::Internal,
            ErrorKind::InternalInvariant,
            "nonce split produced the wrong length",
        )
    })?;
    let plaintext = cipher::open(key.bytes(), nonce, ciphertext)
        .map_err(|e| e.with_context(AUTHENTICATION_FAILURE))?;

    String::from_utf8(plaintext).map_err(|e| {
        QrsealError::with_kind_and_source(
            ErrorCategory::User,
            ErrorKind::PlaintextEncoding,
            "decrypted message is not valid UTF-8",
            e,
        )
        .with_context(FORMAT_FAILURE)
    })
}

fn key_format() -> QrsealError {
    QrsealError::with_kind(
        ErrorCategory::User,
        ErrorKind::KeyFormat,
        format!("key must be base64 encoding exactly {} bytes", KEY_LEN),
    )
}
