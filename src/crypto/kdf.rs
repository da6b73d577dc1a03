//! Passphrase to page key derivation.
//!
//! Derivation path:
//!   passphrase
//!     -> Argon2id(salt="metafs-v1", 19 MiB, t=2, p=1) -> 32-byte stretched secret
//!     -> HKDF-SHA256(salt="metafs-v1", info="metafs-page-key-v1")
//!     -> 32-byte AES-256 page key

use argon2::{Algorithm, Argon2, Params, Version};
use hkdf::Hkdf;
use sha2::Sha256;
use thiserror::Error;
use zeroize::Zeroizing;

use super::aes::AES_KEY_SIZE;

/// Common salt for all metafs derivations.
const KDF_SALT: &[u8] = b"metafs-v1";

/// HKDF info for the content page key.
const PAGE_KEY_INFO: &[u8] = b"metafs-page-key-v1";

/// Argon2id memory cost in KiB.
const ARGON2_MEM_KIB: u32 = 19 * 1024;
const ARGON2_ITERATIONS: u32 = 2;
const ARGON2_PARALLELISM: u32 = 1;

#[derive(Debug, Error)]
pub enum KdfError {
    #[error("Passphrase must not be empty")]
    EmptyInput,
    #[error("Passphrase stretching failed: {0}")]
    Stretch(argon2::Error),
    #[error("HKDF derivation failed")]
    DerivationFailed,
}

/// Run the passphrase through Argon2id.
fn stretch(passphrase: &[u8]) -> Result<Zeroizing<Vec<u8>>, KdfError> {
    let params = Params::new(
        ARGON2_MEM_KIB,
        ARGON2_ITERATIONS,
        ARGON2_PARALLELISM,
        Some(AES_KEY_SIZE),
    )
    .map_err(KdfError::Stretch)?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut secret = Zeroizing::new(vec![0u8; AES_KEY_SIZE]);
    argon2
        .hash_password_into(passphrase, KDF_SALT, &mut secret)
        .map_err(KdfError::Stretch)?;
    Ok(secret)
}

/// Derive the 32-byte page encryption key from a passphrase.
pub fn derive_page_key(passphrase: &[u8]) -> Result<Zeroizing<Vec<u8>>, KdfError> {
    if passphrase.is_empty() {
        return Err(KdfError::EmptyInput);
    }

    let secret = stretch(passphrase)?;
    let hk = Hkdf::<Sha256>::new(Some(KDF_SALT), &secret);
    let mut okm = Zeroizing::new(vec![0u8; AES_KEY_SIZE]);
    hk.expand(PAGE_KEY_INFO, &mut okm)
        .map_err(|_| KdfError::DerivationFailed)?;
    Ok(okm)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derivation_is_deterministic() {
        let a = derive_page_key(b"correct horse").unwrap();
        let b = derive_page_key(b"correct horse").unwrap();
        assert_eq!(a.as_slice(), b.as_slice());
        assert_eq!(a.len(), AES_KEY_SIZE);
    }

    #[test]
    fn test_different_passphrases_differ() {
        let a = derive_page_key(b"one").unwrap();
        let b = derive_page_key(b"two").unwrap();
        assert_ne!(a.as_slice(), b.as_slice());
    }

    #[test]
    fn test_key_is_not_plain_hkdf_of_passphrase() {
        let hk = Hkdf::<Sha256>::new(Some(KDF_SALT), b"correct horse");
        let mut unstretched = [0u8; AES_KEY_SIZE];
        hk.expand(PAGE_KEY_INFO, &mut unstretched).unwrap();

        let key = derive_page_key(b"correct horse").unwrap();
        assert_ne!(key.as_slice(), &unstretched[..]);
    }

    #[test]
    fn test_empty_passphrase_rejected() {
        assert!(matches!(derive_page_key(b""), Err(KdfError::EmptyInput)));
    }
}
