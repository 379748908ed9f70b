//! Password-based key derivation
//!
//! PBKDF2-HMAC-SHA256 with a fixed iteration count, producing a key sized
//! for AES-256. Derivation is deterministic in (password, salt), which is
//! what lets decryption recover the key from the salt carried in the payload.

use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;
use zeroize::Zeroizing;

/// Length of salt in bytes
pub const SALT_LEN: usize = 16;

/// Length of derived key in bytes
pub const KEY_LEN: usize = 32;

/// PBKDF2 iteration count
pub const PBKDF2_ROUNDS: u32 = 100_000;

/// Derive a 32-byte key from a password and salt using PBKDF2-SHA256.
///
/// Any byte string is accepted as a password, including the empty one;
/// rejecting weak passwords is the caller's business.
pub fn derive_key(password: &[u8], salt: &[u8; SALT_LEN]) -> Zeroizing<[u8; KEY_LEN]> {
    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    pbkdf2_hmac::<Sha256>(password, salt, PBKDF2_ROUNDS, &mut key[..]);
    key
}
