//! Message and payload file operations
//!
//! Glue between files on disk and the encryption flows. A payload file holds
//! exactly the text that would be put into a QR code; a message file holds
//! the UTF-8 plaintext.

use crate::error::{ErrorCategory, ErrorKind, QrsealError, Result};
use crate::payload;
use crate::secret::{self, Scheme, SecretSource};
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use tracing::{debug, warn};

/// Encrypt the message in `input_path`, returning payload text.
///
/// A warning is logged when the payload is too large for one QR code;
/// the payload is still returned.
pub fn encrypt_file(
    input_path: &Path,
    scheme: Scheme,
    source: &mut dyn SecretSource,
) -> Result<String> {
    let message = read_text(input_path)?;
    let secret = secret::read_secret(source, scheme)?;
    let text = secret
        .seal(&message)
        .map_err(|e| e.with_context("encryption failed"))?;

    if !payload::fits_in_qr(&text) {
        warn!(
            payload_len = text.len(),
            capacity = payload::QR_BYTE_CAPACITY,
            "payload is too large for a single QR code"
        );
    }
    debug!(path = %input_path.display(), payload_len = text.len(), "encrypted message file");
    Ok(text)
}

/// Decrypt the payload text in `input_path`, returning the message.
pub fn decrypt_file(
    input_path: &Path,
    scheme: Scheme,
    source: &mut dyn SecretSource,
) -> Result<String> {
    let text = read_text(input_path)?;
    let secret = secret::read_secret(source, scheme)?;
    secret
        .open(&text)
        .map_err(|e| e.with_context("failed to decrypt"))
}

/// Replace the message in an existing payload file, keeping the secret
///
/// This function:
/// 1. Decrypts the existing payload at `crypt_path` to validate the secret
/// 2. Reads the new message from `plain_path`
/// 3. Encrypts the new message with the validated secret
/// 4. Atomically writes to `crypt_path` (tempfile + fsync + rename)
///
/// The atomic write ensures that either the old file or the new file exists,
/// never a partial/corrupted file. Validating first prevents accidentally
/// changing the password.
pub fn update_file(
    plain_path: &Path,
    crypt_path: &Path,
    scheme: Scheme,
    source: &mut dyn SecretSource,
) -> Result<()> {
    let existing = read_text(crypt_path)?;
    let secret = secret::read_secret(source, scheme)?;

    // Validate the secret by decrypting the existing payload (discard plaintext)
    secret
        .open(&existing)
        .map_err(|e| e.with_context("failed to decrypt"))?;

    let crypt_dir = match crypt_path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let mut temp_file = tempfile::NamedTempFile::new_in(crypt_dir)
        .map_err(|e| io_failure("failed to create tempfile", e))?;
    let message = read_text(plain_path)?;
    let text = secret
        .seal(&message)
        .map_err(|e| e.with_context("failed to encrypt"))?;

    temp_file
        .write_all(text.as_bytes())
        .map_err(|e| io_failure("failed to write to tempfile", e))?;
    // Flush and fsync() such that the rename later, if it succeeds, will
    // always point to a valid file.
    temp_file
        .flush()
        .map_err(|e| io_failure("failed to flush tempfile", e))?;
    temp_file
        .as_file()
        .sync_all()
        .map_err(|e| io_failure("failed to sync file prior to rename", e))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = temp_file
            .as_file()
            .metadata()
            .map_err(|e| io_failure("failed to get tempfile metadata", e))?
            .permissions();
        perms.set_mode(0o600);
        temp_file
            .as_file()
            .set_permissions(perms)
            .map_err(|e| io_failure("failed to set tempfile permissions", e))?;
    }
    temp_file.persist(crypt_path).map_err(|e| {
        QrsealError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            format!("failed to rename to target file {}", crypt_path.display()),
            e,
        )
    })?;
    debug!(path = %crypt_path.display(), "replaced payload file");
    Ok(())
}

/// Write file with secure permissions (0o600 on Unix)
pub fn write_file_secure(path: &Path, contents: &[u8]) -> Result<()> {
    #[cfg(unix)]
    {
        use std::fs::OpenOptions;
        use std::os::unix::fs::OpenOptionsExt;

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .map_err(|e| {
                QrsealError::with_kind_and_source(
                    ErrorCategory::User,
                    ErrorKind::Io,
                    format!("failed to open {}", path.display()),
                    e,
                )
            })?;

        file.write_all(contents)
            .map_err(|e| io_failure(format!("failed to write {}", path.display()), e))?;
        Ok(())
    }

    #[cfg(not(unix))]
    {
        fs::write(path, contents).map_err(|e| {
            QrsealError::with_kind_and_source(
                ErrorCategory::User,
                ErrorKind::Io,
                format!("failed to write {}", path.display()),
                e,
            )
        })?;
        Ok(())
    }
}

fn read_text(path: &Path) -> Result<String> {
    let bytes = fs::read(path).map_err(|e| read_error(path, e))?;
    String::from_utf8(bytes).map_err(|e| {
        QrsealError::with_kind_and_source(
            ErrorCategory::User,
            ErrorKind::Io,
            format!("{} is not valid UTF-8", path.display()),
            e,
        )
    })
}

fn read_error(path: &Path, err: io::Error) -> QrsealError {
    let category = if err.kind() == io::ErrorKind::NotFound {
        ErrorCategory::User
    } else {
        ErrorCategory::Internal
    };
    QrsealError::with_kind_and_source(
        category,
        ErrorKind::Io,
        format!("failed to read from {}", path.display()),
        err,
    )
}

fn io_failure(msg: impl Into<String>, err: io::Error) -> QrsealError {
    QrsealError::with_kind_and_source(ErrorCategory::Internal, ErrorKind::Io, msg, err)
}
