//! End-to-end encrypt and decrypt of text messages under a password
//!
//! Encryption: fresh salt and nonce, PBKDF2 key, AES-256-GCM, payload.
//! Decryption runs the same steps backwards. Each call owns all of its key
//! material; nothing is shared between calls.

use rand::RngCore;
use rand::rngs::OsRng;
use tracing::debug;

use crate::cipher::{self, NONCE_LEN};
use crate::error::{ErrorCategory, ErrorKind, QrsealError, Result};
use crate::kdf::{self, SALT_LEN};
use crate::payload::{self, CipherId, KdfId, PAYLOAD_VERSION, Payload};

/// Context attached to every payload format failure.
pub const FORMAT_FAILURE: &str = "payload is not a recognized encrypted message";

/// Context attached to every authentication failure.
pub const AUTHENTICATION_FAILURE: &str = "wrong password or corrupted data";

/// Fill an array from the operating system's secure random generator.
pub fn fresh_bytes<const N: usize>() -> Result<[u8; N]> {
    fill_from(&mut OsRng)
}

/// Fill an array from `rng`. There is no fallback: if the generator
/// fails, so does the caller.
pub fn fill_from<R: RngCore, const N: usize>(rng: &mut R) -> Result<[u8; N]> {
    let mut bytes = [0u8; N];
    rng.try_fill_bytes(&mut bytes).map_err(|e| {
        QrsealError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::RandomSourceUnavailable,
            format!("secure random generator unavailable: {}", e),
            e,
        )
    })?;
    Ok(bytes)
}

/// Encrypt a message under a password using a random salt and nonce.
pub fn encrypt_message(message: &str, password: &[u8]) -> Result<Payload> {
    encrypt_message_with_rng(message, password, &mut OsRng)
}

pub(crate) fn encrypt_message_with_rng<R: RngCore>(
    message: &str,
    password: &[u8],
    rng: &mut R,
) -> Result<Payload> {
    check_message(message)?;
    check_password(password)?;

    let salt = fill_from::<R, SALT_LEN>(rng)?;
    let nonce = fill_from::<R, NONCE_LEN>(rng)?;

    encrypt_message_deterministic(message, password, &salt, &nonce)
}

/// Encrypt a message under a password using the provided salt and nonce.
///
/// This function is ONLY for generating reproducible test vectors.
/// NEVER use this in production - always use `encrypt_message()` which
/// generates a random salt and nonce.
pub fn encrypt_message_deterministic(
    message: &str,
    password: &[u8],
    salt: &[u8; SALT_LEN],
    nonce: &[u8; NONCE_LEN],
) -> Result<Payload> {
    check_message(message)?;
    check_password(password)?;

    let key = kdf::derive_key(password, salt);
    let ciphertext = cipher::seal(&key, nonce, message.as_bytes())?;

    let sealed = Payload {
        version: PAYLOAD_VERSION,
        kdf: KdfId::Pbkdf2Sha256,
        cipher: CipherId::AesGcm,
        salt: *salt,
        nonce: *nonce,
        ciphertext,
    };
    debug!(
        message_len = message.len(),
        ciphertext_len = sealed.ciphertext.len(),
        "sealed message"
    );
    Ok(sealed)
}

/// Parse untrusted payload text and decrypt it with a password.
///
/// Failures surface as exactly one of: a validation error (nothing to
/// decrypt, or no password), a format error, or an authentication error.
/// The authentication error is the same whether the password was wrong or
/// the payload was tampered with.
pub fn decrypt_payload(text: &str, password: &[u8]) -> Result<String> {
    if text.trim().is_empty() {
        return Err(QrsealError::with_kind(
            ErrorCategory::User,
            ErrorKind::EmptyPayload,
            "no payload to decrypt",
        ));
    }
    check_password(password)?;

    let parsed = payload::parse(text).map_err(|e| e.with_context(FORMAT_FAILURE))?;
    open_payload(&parsed, password)
}

/// Decrypt an already parsed payload with a password.
pub fn open_payload(sealed: &Payload, password: &[u8]) -> Result<String> {
    // Only one KDF and one cipher exist today; the matches keep new
    // identifiers from being silently run through the wrong primitive.
    let key = match sealed.kdf {
        KdfId::Pbkdf2Sha256 => kdf::derive_key(password, &sealed.salt),
    };
    let plaintext = match sealed.cipher {
        CipherId::AesGcm => cipher::open(&key, &sealed.nonce, &sealed.ciphertext)
            .map_err(|e| e.with_context(AUTHENTICATION_FAILURE))?,
    };
    debug!(plaintext_len = plaintext.len(), "opened payload");

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

pub(crate) fn check_message(message: &str) -> Result<()> {
    if message.trim().is_empty() {
        return Err(QrsealError::with_kind(
            ErrorCategory::User,
            ErrorKind::EmptyMessage,
            "please enter a message",
        ));
    }
    Ok(())
}

pub(crate) fn check_password(password: &[u8]) -> Result<()> {
    if password.is_empty() {
        return Err(QrsealError::with_kind(
            ErrorCategory::User,
            ErrorKind::EmptyPassword,
            "please enter a password",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorClass;
    use base64::{Engine, engine::general_purpose::STANDARD};

    const MESSAGE: &str = "meet at dawn";
    const PASSWORD: &[u8] = b"correct-horse-battery-staple";

    #[test]
    fn test_roundtrip() {
        let sealed = encrypt_message(MESSAGE, PASSWORD).unwrap();
        let text = sealed.to_text().unwrap();
        assert_eq!(decrypt_payload(&text, PASSWORD).unwrap(), MESSAGE);
    }

    #[test]
    fn test_payload_shape() {
        let text = encrypt_message(MESSAGE, PASSWORD)
            .unwrap()
            .to_text()
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();

        assert_eq!(value["v"], 1);
        assert_eq!(value["kdf"], "PBKDF2-SHA256-100k");
        assert_eq!(value["alg"], "AES-GCM");
        let salt = STANDARD.decode(value["salt"].as_str().unwrap()).unwrap();
        let iv = STANDARD.decode(value["iv"].as_str().unwrap()).unwrap();
        let ct = STANDARD.decode(value["ct"].as_str().unwrap()).unwrap();
        assert_eq!(salt.len(), SALT_LEN);
        assert_eq!(iv.len(), NONCE_LEN);
        assert_eq!(ct.len(), MESSAGE.len() + cipher::TAG_LEN);
    }

    #[test]
    fn test_wrong_password() {
        let text = encrypt_message(MESSAGE, PASSWORD)
            .unwrap()
            .to_text()
            .unwrap();
        let err = decrypt_payload(&text, b"wrong-password").unwrap_err();

        assert_eq!(err.kind, Some(ErrorKind::AuthenticationFailed));
        assert_eq!(err.class(), Some(ErrorClass::Authentication));
        assert_eq!(err.to_string(), AUTHENTICATION_FAILURE);
    }

    #[test]
    fn test_tamper_looks_like_wrong_password() {
        let mut sealed = encrypt_message(MESSAGE, PASSWORD).unwrap();
        let wrong_password = decrypt_payload(&sealed.to_text().unwrap(), b"nope").unwrap_err();

        let last = sealed.ciphertext.len() - 1;
        sealed.ciphertext[0] ^= 0x01;
        sealed.ciphertext[last] ^= 0x80;
        let tampered = decrypt_payload(&sealed.to_text().unwrap(), PASSWORD).unwrap_err();

        assert_eq!(tampered.kind, wrong_password.kind);
        assert_eq!(tampered.to_string(), wrong_password.to_string());
    }

    #[test]
    fn test_tampered_salt_and_nonce() {
        let sealed = encrypt_message(MESSAGE, PASSWORD).unwrap();

        let mut salt_flip = sealed.clone();
        salt_flip.salt[3] ^= 0x10;
        let err = open_payload(&salt_flip, PASSWORD).unwrap_err();
        assert_eq!(err.kind, Some(ErrorKind::AuthenticationFailed));

        let mut nonce_flip = sealed;
        nonce_flip.nonce[11] ^= 0x01;
        let err = open_payload(&nonce_flip, PASSWORD).unwrap_err();
        assert_eq!(err.kind, Some(ErrorKind::AuthenticationFailed));
    }

    #[test]
    fn test_fresh_salt_and_nonce_each_time() {
        let a = encrypt_message(MESSAGE, PASSWORD).unwrap();
        let b = encrypt_message(MESSAGE, PASSWORD).unwrap();

        assert_ne!(a.salt, b.salt);
        assert_ne!(a.nonce, b.nonce);
        assert_ne!(a.ciphertext, b.ciphertext);
    }

    /// Yields `budget` bytes of 0x11, then fails.
    struct FlakyRng {
        budget: usize,
    }

    impl RngCore for FlakyRng {
        fn next_u32(&mut self) -> u32 {
            unimplemented!()
        }

        fn next_u64(&mut self) -> u64 {
            unimplemented!()
        }

        fn fill_bytes(&mut self, _dest: &mut [u8]) {
            unimplemented!()
        }

        fn try_fill_bytes(&mut self, dest: &mut [u8]) -> std::result::Result<(), rand::Error> {
            if dest.len() > self.budget {
                return Err(rand::Error::new(std::io::Error::other("entropy pool gone")));
            }
            self.budget -= dest.len();
            dest.fill(0x11);
            Ok(())
        }
    }

    #[test]
    fn test_random_source_failure_is_fatal() {
        // Fails on the salt, then on the nonce after a good salt.
        for budget in [0, SALT_LEN] {
            let err = encrypt_message_with_rng(MESSAGE, PASSWORD, &mut FlakyRng { budget })
                .expect_err("no payload without randomness");
            assert_eq!(err.kind, Some(ErrorKind::RandomSourceUnavailable));
            assert_eq!(err.class(), Some(ErrorClass::RandomSource));
            assert_eq!(err.category, ErrorCategory::Internal);
        }
    }

    #[test]
    fn test_salt_and_nonce_come_from_rng() {
        let mut rng = FlakyRng {
            budget: SALT_LEN + NONCE_LEN,
        };
        let sealed = encrypt_message_with_rng(MESSAGE, PASSWORD, &mut rng).unwrap();
        assert_eq!(sealed.salt, [0x11; SALT_LEN]);
        assert_eq!(sealed.nonce, [0x11; NONCE_LEN]);
        assert_eq!(rng.budget, 0);

        let text = sealed.to_text().unwrap();
        assert_eq!(decrypt_payload(&text, PASSWORD).unwrap(), MESSAGE);
    }

    #[test]
    fn test_validation_precedes_randomness() {
        let err = encrypt_message_with_rng("", PASSWORD, &mut FlakyRng { budget: 0 }).unwrap_err();
        assert_eq!(err.kind, Some(ErrorKind::EmptyMessage));
    }

    #[test]
    fn test_deterministic_encryption() {
        let salt = [1u8; SALT_LEN];
        let nonce = [2u8; NONCE_LEN];

        let a = encrypt_message_deterministic(MESSAGE, PASSWORD, &salt, &nonce).unwrap();
        let b = encrypt_message_deterministic(MESSAGE, PASSWORD, &salt, &nonce).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_validation() {
        let err = encrypt_message("", PASSWORD).unwrap_err();
        assert_eq!(err.kind, Some(ErrorKind::EmptyMessage));
        let err = encrypt_message(" \n\t", PASSWORD).unwrap_err();
        assert_eq!(err.kind, Some(ErrorKind::EmptyMessage));
        let err = encrypt_message(MESSAGE, b"").unwrap_err();
        assert_eq!(err.kind, Some(ErrorKind::EmptyPassword));
        assert_eq!(err.class(), Some(ErrorClass::Validation));

        let err = decrypt_payload("  \n", PASSWORD).unwrap_err();
        assert_eq!(err.kind, Some(ErrorKind::EmptyPayload));
        let err = decrypt_payload("{}", b"").unwrap_err();
        assert_eq!(err.kind, Some(ErrorKind::EmptyPassword));
    }

    #[test]
    fn test_message_is_not_trimmed() {
        let message = "  padded\n";
        let text = encrypt_message(message, PASSWORD)
            .unwrap()
            .to_text()
            .unwrap();
        assert_eq!(decrypt_payload(&text, PASSWORD).unwrap(), message);
    }

    #[test]
    fn test_garbage_is_a_format_error() {
        let err = decrypt_payload("hello world", PASSWORD).unwrap_err();
        assert_eq!(err.class(), Some(ErrorClass::Format));
        assert_eq!(err.to_string(), FORMAT_FAILURE);
    }

    #[test]
    fn test_non_utf8_plaintext() {
        let salt = [3u8; SALT_LEN];
        let nonce = [4u8; NONCE_LEN];
        let key = kdf::derive_key(PASSWORD, &salt);
        let sealed = Payload {
            version: PAYLOAD_VERSION,
            kdf: KdfId::Pbkdf2Sha256,
            cipher: CipherId::AesGcm,
            salt,
            nonce,
            ciphertext: cipher::seal(&key, &nonce, &[0xff, 0xfe, 0x00]).unwrap(),
        };

        let err = open_payload(&sealed, PASSWORD).unwrap_err();
        assert_eq!(err.kind, Some(ErrorKind::PlaintextEncoding));
    }

    #[test]
    fn test_concurrent_calls() {
        let handles: Vec<_> = (0..4)
            .map(|i| {
                std::thread::spawn(move || {
                    let message = format!("message {}", i);
                    let password = format!("password {}", i);
                    let text = encrypt_message(&message, password.as_bytes())
                        .unwrap()
                        .to_text()
                        .unwrap();
                    let opened = decrypt_payload(&text, password.as_bytes()).unwrap();
                    assert_eq!(opened, message);
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
    }
}
