//! Versioned, self-describing payload text
//!
//! A payload is a compact JSON object carrying everything needed to decrypt
//! given the password:
//!
//! ```text
//! {"v":1,"alg":"AES-GCM","kdf":"PBKDF2-SHA256-100k","salt":"..","iv":"..","ct":".."}
//! ```
//!
//! Binary members use standard padded base64. The text never contains
//! newlines, so it can be handed to a QR encoder as-is.

use base64::{Engine, engine::general_purpose::STANDARD};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::cipher::{NONCE_LEN, TAG_LEN};
use crate::error::{ErrorCategory, ErrorKind, QrsealError, Result};
use crate::kdf::SALT_LEN;

/// The only payload version this build reads and writes.
pub const PAYLOAD_VERSION: u32 = 1;

/// Byte-mode capacity of a version 40 QR symbol at error correction level M.
pub const QR_BYTE_CAPACITY: usize = 2331;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KdfId {
    /// PBKDF2-HMAC-SHA256, 100,000 rounds, 256-bit output.
    Pbkdf2Sha256,
}

impl KdfId {
    pub fn as_str(self) -> &'static str {
        match self {
            KdfId::Pbkdf2Sha256 => "PBKDF2-SHA256-100k",
        }
    }

    fn from_id(id: &str) -> Result<Self> {
        match id {
            "PBKDF2-SHA256-100k" => Ok(KdfId::Pbkdf2Sha256),
            other => Err(unsupported_algorithm("key derivation", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CipherId {
    /// AES-256-GCM with a 128-bit tag appended to the ciphertext.
    AesGcm,
}

impl CipherId {
    pub fn as_str(self) -> &'static str {
        match self {
            CipherId::AesGcm => "AES-GCM",
        }
    }

    fn from_id(id: &str) -> Result<Self> {
        match id {
            "AES-GCM" => Ok(CipherId::AesGcm),
            other => Err(unsupported_algorithm("cipher", other)),
        }
    }
}

/// A parsed (or about to be serialized) encrypted message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    pub version: u32,
    pub kdf: KdfId,
    pub cipher: CipherId,
    pub salt: [u8; SALT_LEN],
    pub nonce: [u8; NONCE_LEN],
    /// Ciphertext with the authentication tag appended.
    pub ciphertext: Vec<u8>,
}

impl Payload {
    /// Serializes the payload; see [`serialize`].
    pub fn to_text(&self) -> Result<String> {
        serialize(self)
    }
}

#[derive(Serialize)]
struct WirePayload<'a> {
    v: u32,
    alg: &'a str,
    kdf: &'a str,
    salt: String,
    iv: String,
    ct: String,
}

/// Serialize a payload into its text form.
///
/// Only [`PAYLOAD_VERSION`] can be written.
pub fn serialize(payload: &Payload) -> Result<String> {
    if payload.version != PAYLOAD_VERSION {
        return Err(QrsealError::with_kind(
            ErrorCategory::Internal,
            ErrorKind::UnsupportedVersion,
            format!("cannot write payload version {}", payload.version),
        ));
    }
    let wire = WirePayload {
        v: PAYLOAD_VERSION,
        alg: payload.cipher.as_str(),
        kdf: payload.kdf.as_str(),
        salt: STANDARD.encode(payload.salt),
        iv: STANDARD.encode(payload.nonce),
        ct: STANDARD.encode(&payload.ciphertext),
    };
    serde_json::to_string(&wire).map_err(|e| {
        QrsealError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::InternalInvariant,
            format!("failed to serialize payload: {}", e),
            e,
        )
    })
}

/// Parse payload text, typically as produced by a QR decoder.
///
/// The text is untrusted. Surrounding whitespace is ignored, unknown members
/// are ignored, and anything else that is off fails with a format error.
/// No decryption or authentication happens here.
pub fn parse(text: &str) -> Result<Payload> {
    let value: Value = serde_json::from_str(text.trim()).map_err(|e| {
        QrsealError::with_kind_and_source(
            ErrorCategory::User,
            ErrorKind::PayloadInvalid,
            "input unrecognized as an encrypted payload",
            e,
        )
    })?;
    let Value::Object(fields) = value else {
        return Err(invalid("input unrecognized as an encrypted payload"));
    };

    // The version decides how everything else is read, so check it first.
    let version = fields
        .get("v")
        .ok_or_else(|| missing_field("v"))?
        .as_u64()
        .ok_or_else(|| invalid("payload version is not a non-negative integer"))?;
    if version != u64::from(PAYLOAD_VERSION) {
        return Err(QrsealError::with_kind(
            ErrorCategory::User,
            ErrorKind::UnsupportedVersion,
            format!("payload version {} is not a version we support", version),
        ));
    }

    let cipher = CipherId::from_id(required_str(&fields, "alg")?)?;
    let kdf = KdfId::from_id(required_str(&fields, "kdf")?)?;
    let salt = decode_fixed::<SALT_LEN>(&fields, "salt")?;
    let nonce = decode_fixed::<NONCE_LEN>(&fields, "iv")?;
    let ciphertext = decode_field(&fields, "ct")?;
    if ciphertext.len() < TAG_LEN {
        return Err(invalid(
            "ciphertext is too short to hold an authentication tag",
        ));
    }

    Ok(Payload {
        version: PAYLOAD_VERSION,
        kdf,
        cipher,
        salt,
        nonce,
        ciphertext,
    })
}

/// Whether `text` fits in the largest QR symbol at error correction level M.
pub fn fits_in_qr(text: &str) -> bool {
    text.len() <= QR_BYTE_CAPACITY
}

fn required_str<'a>(fields: &'a Map<String, Value>, name: &str) -> Result<&'a str> {
    fields
        .get(name)
        .ok_or_else(|| missing_field(name))?
        .as_str()
        .ok_or_else(|| invalid(format!("payload field \"{}\" is not a string", name)))
}

fn decode_field(fields: &Map<String, Value>, name: &str) -> Result<Vec<u8>> {
    let encoded = required_str(fields, name)?;
    STANDARD.decode(encoded).map_err(|e| {
        QrsealError::with_kind_and_source(
            ErrorCategory::User,
            ErrorKind::PayloadDecode,
            format!("base64 decoding of payload field \"{}\" failed: {}", name, e),
            e,
        )
    })
}

fn decode_fixed<const N: usize>(fields: &Map<String, Value>, name: &str) -> Result<[u8; N]> {
    let bytes = decode_field(fields, name)?;
    let len = bytes.len();
    bytes.try_into().map_err(|_| {
        invalid(format!(
            "payload field \"{}\" must be {} bytes, got {}",
            name, N, len
        ))
    })
}

fn invalid(msg: impl Into<String>) -> QrsealError {
    QrsealError::with_kind(ErrorCategory::User, ErrorKind::PayloadInvalid, msg)
}

fn missing_field(name: &str) -> QrsealError {
    QrsealError::with_kind(
        ErrorCategory::User,
        ErrorKind::MissingField,
        format!("payload is missing required field \"{}\"", name),
    )
}

fn unsupported_algorithm(what: &str, id: &str) -> QrsealError {
    QrsealError::with_kind(
        ErrorCategory::User,
        ErrorKind::UnsupportedAlgorithm,
        format!("unsupported {} algorithm \"{}\"", what, id),
    )
}
