//! AES-256-GCM page encryption.
//!
//! Pages are encrypted in place with a detached tag so the ciphertext keeps
//! the exact size of the padded payload. The caller stores IV and tag in the
//! page header and supplies the associated data that binds the page to its
//! position.

use aes_gcm::{
    aead::{AeadInPlace, KeyInit},
    Aes256Gcm, Nonce, Tag,
};
use thiserror::Error;

use super::utils::generate_iv;

/// AES-256-GCM key size in bytes (256 bits).
pub const AES_KEY_SIZE: usize = 32;

/// AES-GCM IV size in bytes (96 bits).
pub const AES_IV_SIZE: usize = 12;

/// AES-GCM authentication tag size in bytes (128 bits).
pub const AES_TAG_SIZE: usize = 16;

#[derive(Debug, Error)]
pub enum AesError {
    #[error("Encryption failed")]
    EncryptionFailed,
    #[error("Decryption failed")]
    DecryptionFailed,
    #[error("Invalid key size")]
    InvalidKeySize,
}

/// Symmetric cipher shared by every page of a mount.
#[derive(Clone)]
pub struct PageCipher {
    cipher: Aes256Gcm,
}

impl std::fmt::Debug for PageCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PageCipher(..)")
    }
}

impl PageCipher {
    /// Build a cipher from a 32-byte key.
    pub fn new(key: &[u8]) -> Result<Self, AesError> {
        if key.len() != AES_KEY_SIZE {
            return Err(AesError::InvalidKeySize);
        }
        let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| AesError::InvalidKeySize)?;
        Ok(Self { cipher })
    }

    /// Encrypt `buf` in place under a fresh random IV.
    ///
    /// Returns the IV and the detached tag.
    pub fn seal_in_place(
        &self,
        aad: &[u8],
        buf: &mut [u8],
    ) -> Result<([u8; AES_IV_SIZE], [u8; AES_TAG_SIZE]), AesError> {
        let iv = generate_iv();
        let tag = self
            .cipher
            .encrypt_in_place_detached(Nonce::from_slice(&iv), aad, buf)
            .map_err(|_| AesError::EncryptionFailed)?;

        let mut tag_bytes = [0u8; AES_TAG_SIZE];
        tag_bytes.copy_from_slice(tag.as_slice());
        Ok((iv, tag_bytes))
    }

    /// Decrypt `buf` in place, verifying `tag` against `aad`.
    pub fn open_in_place(
        &self,
        iv: &[u8; AES_IV_SIZE],
        tag: &[u8; AES_TAG_SIZE],
        aad: &[u8],
        buf: &mut [u8],
    ) -> Result<(), AesError> {
        self.cipher
            .decrypt_in_place_detached(Nonce::from_slice(iv), aad, buf, Tag::from_slice(tag))
            .map_err(|_| AesError::DecryptionFailed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cipher() -> PageCipher {
        PageCipher::new(&[7u8; AES_KEY_SIZE]).unwrap()
    }

    #[test]
    fn test_seal_open_roundtrip() {
        let c = cipher();
        let mut buf = b"page payload".to_vec();
        let (iv, tag) = c.seal_in_place(b"aad", &mut buf).unwrap();
        assert_ne!(&buf, b"page payload");
        assert_eq!(buf.len(), 12);

        c.open_in_place(&iv, &tag, b"aad", &mut buf).unwrap();
        assert_eq!(&buf, b"page payload");
    }

    #[test]
    fn test_open_rejects_wrong_aad() {
        let c = cipher();
        let mut buf = vec![1u8; 64];
        let (iv, tag) = c.seal_in_place(b"page-0", &mut buf).unwrap();
        assert!(c.open_in_place(&iv, &tag, b"page-1", &mut buf).is_err());
    }

    #[test]
    fn test_open_rejects_wrong_key() {
        let mut buf = vec![9u8; 32];
        let (iv, tag) = cipher().seal_in_place(b"", &mut buf).unwrap();
        let other = PageCipher::new(&[8u8; AES_KEY_SIZE]).unwrap();
        assert!(other.open_in_place(&iv, &tag, b"", &mut buf).is_err());
    }

    #[test]
    fn test_invalid_key_size() {
        assert!(matches!(
            PageCipher::new(&[0u8; 16]),
            Err(AesError::InvalidKeySize)
        ));
    }

    #[test]
    fn test_fresh_iv_per_seal() {
        let c = cipher();
        let mut a = vec![0u8; 16];
        let mut b = vec![0u8; 16];
        let (iv_a, _) = c.seal_in_place(b"", &mut a).unwrap();
        let (iv_b, _) = c.seal_in_place(b"", &mut b).unwrap();
        assert_ne!(iv_a, iv_b);
        assert_ne!(a, b);
    }
}
