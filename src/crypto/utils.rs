//! Utility functions for cryptographic operations.

use rand::RngCore;
use thiserror::Error;
use zeroize::{Zeroize, Zeroizing};

use super::aes::{AES_IV_SIZE, AES_KEY_SIZE};

#[derive(Debug, Error)]
pub enum UtilError {
    #[error("Invalid hex string")]
    InvalidHex,
    #[error("Key must be 32 bytes, got {0}")]
    InvalidKeyLength(usize),
}

/// Generate a random 12-byte IV.
pub fn generate_iv() -> [u8; AES_IV_SIZE] {
    let mut iv = [0u8; AES_IV_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut iv);
    iv
}

/// Parse a hex-encoded 32-byte key, tolerating surrounding whitespace.
pub fn key_from_hex(hex_str: &str) -> Result<Zeroizing<Vec<u8>>, UtilError> {
    let bytes = Zeroizing::new(hex::decode(hex_str.trim()).map_err(|_| UtilError::InvalidHex)?);
    if bytes.len() != AES_KEY_SIZE {
        return Err(UtilError::InvalidKeyLength(bytes.len()));
    }
    Ok(bytes)
}

/// Zeroize sensitive data in a byte slice.
pub fn clear_bytes(buf: &mut [u8]) {
    buf.zeroize();
}
