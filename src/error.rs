use std::error::Error as StdError;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorCategory {
    /// Any failure that cannot be confidently attributed to any other error
    /// category in this enum.
    ///
    /// Use of Internal is never a guarantee the error is not, for example,
    /// due to a user error - merely that it cannot be confidently determined
    /// by the code.
    Internal,

    /// The user provided invalid input or performed an action that is
    /// unsupported or impossible to complete.
    User,
}

/// Coarse classes callers map to user-facing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorClass {
    /// Input rejected before any cryptography ran; the user corrects it.
    Validation,
    /// Payload text could not be understood as an encrypted message.
    Format,
    /// Integrity check failed: wrong secret, tampering, or corruption.
    Authentication,
    /// The secure random generator is unavailable. Fatal.
    RandomSource,
    /// Reading or writing files, stdin/stdout, or the terminal failed.
    Io,
    /// A condition the code does not expect to reach.
    Internal,
}

/// Fine-grained condition flags for consumers that want to branch on error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The message to encrypt was empty or only whitespace.
    EmptyMessage,
    /// The password was empty.
    EmptyPassword,
    /// There was no payload text to decrypt.
    EmptyPayload,
    /// A raw key was not base64 for exactly 32 bytes.
    KeyFormat,
    /// The payload text is not a record we recognize.
    PayloadInvalid,
    /// A binary field of the payload was not valid base64.
    PayloadDecode,
    /// The payload carries a version this build does not understand.
    UnsupportedVersion,
    /// A required payload field was absent.
    MissingField,
    /// The payload names a KDF or cipher we do not implement.
    UnsupportedAlgorithm,
    /// The payload authenticated but the plaintext is not UTF-8.
    PlaintextEncoding,
    /// Authentication failed due to an incorrect password or key, tampering,
    /// or corruption.
    AuthenticationFailed,
    /// The operating system's secure random generator failed.
    RandomSourceUnavailable,
    /// Passphrase could not be obtained from the configured reader.
    PassphraseUnavailable,
    /// Interaction with the filesystem, stdin/stdout, or other I/O failed.
    Io,
    /// Unexpected state reached within qrseal logic.
    InternalInvariant,
}

impl ErrorKind {
    pub fn class(self) -> ErrorClass {
        match self {
            ErrorKind::EmptyMessage
            | ErrorKind::EmptyPassword
            | ErrorKind::EmptyPayload
            | ErrorKind::KeyFormat => ErrorClass::Validation,
            ErrorKind::PayloadInvalid
            | ErrorKind::PayloadDecode
            | ErrorKind::UnsupportedVersion
            | ErrorKind::MissingField
            | ErrorKind::UnsupportedAlgorithm
            | ErrorKind::PlaintextEncoding => ErrorClass::Format,
            ErrorKind::AuthenticationFailed => ErrorClass::Authentication,
            ErrorKind::RandomSourceUnavailable => ErrorClass::RandomSource,
            ErrorKind::PassphraseUnavailable | ErrorKind::Io => ErrorClass::Io,
            ErrorKind::InternalInvariant => ErrorClass::Internal,
        }
    }
}

#[derive(Debug, Error)]
#[error("{msg}")]
pub struct QrsealError {
    /// Broad error category, always provided.
    pub category: ErrorCategory,
    /// Optional specific condition tag for consumers that need to
    /// branch their behavior. Any code consuming errors MUST handle
    /// the absence of a defined kind.
    pub kind: Option<ErrorKind>,
    #[source]
    source: Option<Box<dyn StdError + Send + Sync + 'static>>,
    msg: String,
}

impl QrsealError {
    /// Creates a new error with a required category and display message.
    pub fn new(category: ErrorCategory, msg: impl Into<String>) -> Self {
        Self {
            category,
            kind: None,
            source: None,
            msg: msg.into(),
        }
    }

    /// Creates a new error that also tags the failure with a kind.
    pub fn with_kind(category: ErrorCategory, kind: ErrorKind, msg: impl Into<String>) -> Self {
        Self {
            category,
            kind: Some(kind),
            source: None,
            msg: msg.into(),
        }
    }

    /// Creates a new error that retains the originating source error.
    pub fn with_source(
        category: ErrorCategory,
        msg: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self {
            category,
            kind: None,
            source: Some(Box::new(source)),
            msg: msg.into(),
        }
    }

    /// Creates a new error that carries both a kind tag and the originating source error.
    pub fn with_kind_and_source(
        category: ErrorCategory,
        kind: ErrorKind,
        msg: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self {
            category,
            kind: Some(kind),
            source: Some(Box::new(source)),
            msg: msg.into(),
        }
    }

    /// The user-facing message carried by the error.
    pub fn message(&self) -> &str {
        &self.msg
    }

    /// The coarse class of this error, if it carries a kind.
    pub fn class(&self) -> Option<ErrorClass> {
        self.kind.map(ErrorKind::class)
    }

    /// Returns the preserved source error if present.
    pub fn source_error(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        self.source.as_deref()
    }

    /// Wraps the current error with a higher-level message while preserving the original as source.
    pub fn with_context(self, msg: impl Into<String>) -> Self {
        let category = self.category;
        let kind = self.kind;
        Self {
            category,
            kind,
            source: Some(Box::new(self)),
            msg: msg.into(),
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, QrsealError>;
