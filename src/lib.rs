//! qrseal - Password-based encryption of short messages into QR-sized text payloads

#![forbid(unsafe_code)]

pub mod cipher;
pub mod error;
pub mod file_ops;
pub mod flow;
pub mod kdf;
pub mod payload;
pub mod rawkey;
pub mod secret;
