//! The secret a payload is sealed under: a password or a raw key
//!
//! The CLI picks a [`Scheme`] up front, and the secret is decoded for that
//! scheme as soon as it is read. A raw key that is not valid base64 for 32
//! bytes is rejected here, before any payload is looked at.

use std::io::Read;

use zeroize::Zeroizing;

use crate::error::{ErrorCategory, ErrorKind, QrsealError, Result};
use crate::flow;
use crate::rawkey::{self, RawKey};

/// Which secret the user holds, and therefore which payload format is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    /// Versioned JSON payload, key derived from a password.
    Password,
    /// Bare base64 payload under a 256-bit key supplied as base64 text.
    RawKey,
}

impl Scheme {
    pub fn prompt(self) -> &'static str {
        match self {
            Scheme::Password => "Password (qrseal): ",
            Scheme::RawKey => "Key (qrseal): ",
        }
    }
}

pub enum Secret {
    /// Password bytes exactly as entered; never trimmed or normalized.
    Password(Zeroizing<Vec<u8>>),
    Key(RawKey),
}

impl Secret {
    /// Interpret raw input bytes for `scheme`.
    pub fn decode(scheme: Scheme, bytes: Zeroizing<Vec<u8>>) -> Result<Self> {
        match scheme {
            Scheme::Password => Ok(Secret::Password(bytes)),
            Scheme::RawKey => RawKey::from_base64(&bytes).map(Secret::Key),
        }
    }

    pub fn scheme(&self) -> Scheme {
        match self {
            Secret::Password(_) => Scheme::Password,
            Secret::Key(_) => Scheme::RawKey,
        }
    }

    /// Encrypt `message` into payload text for this secret's scheme.
    pub fn seal(&self, message: &str) -> Result<String> {
        match self {
            Secret::Password(password) => flow::encrypt_message(message, password)?.to_text(),
            Secret::Key(key) => rawkey::seal_message(key, message),
        }
    }

    /// Decrypt payload text produced under this secret's scheme.
    pub fn open(&self, text: &str) -> Result<String> {
        match self {
            Secret::Password(password) => flow::decrypt_payload(text, password),
            Secret::Key(key) => rawkey::open_message(key, text),
        }
    }
}

/// Somewhere the user's secret comes from.
pub trait SecretSource {
    fn read_secret_bytes(&mut self) -> Result<Zeroizing<Vec<u8>>>;
}

/// Everything a reader yields until EOF, e.g. stdin with `--passphrase-stdin`.
pub struct PipedSecret<R> {
    reader: R,
}

impl<R: Read> PipedSecret<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }
}

impl<R: Read> SecretSource for PipedSecret<R> {
    fn read_secret_bytes(&mut self) -> Result<Zeroizing<Vec<u8>>> {
        let mut bytes = Zeroizing::new(Vec::new());
        self.reader.read_to_end(&mut bytes).map_err(|e| {
            QrsealError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::Io,
                format!("failed to read secret from input: {}", e),
                e,
            )
        })?;
        Ok(bytes)
    }
}

/// No-echo prompt on the controlling terminal. UTF-8 only; use
/// `--passphrase-stdin` for arbitrary bytes.
pub struct TerminalPrompt {
    scheme: Scheme,
}

impl TerminalPrompt {
    pub fn new(scheme: Scheme) -> Self {
        Self { scheme }
    }
}

impl SecretSource for TerminalPrompt {
    fn read_secret_bytes(&mut self) -> Result<Zeroizing<Vec<u8>>> {
        let entered = rpassword::prompt_password(self.scheme.prompt()).map_err(|e| {
            QrsealError::with_kind_and_source(
                ErrorCategory::User,
                ErrorKind::PassphraseUnavailable,
                format!("no terminal to prompt for a secret on: {}", e),
                e,
            )
        })?;
        Ok(Zeroizing::new(entered.into_bytes()))
    }
}

/// Read from `source` and decode for `scheme`.
pub fn read_secret(source: &mut dyn SecretSource, scheme: Scheme) -> Result<Secret> {
    let bytes = source.read_secret_bytes()?;
    Secret::decode(scheme, bytes)
}
