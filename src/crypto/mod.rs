//! Crypto primitives used by the page codec.
//!
//! Content pages are sealed with AES-256-GCM. The key comes either from a
//! hex key file or from a passphrase stretched with Argon2id and expanded
//! with HKDF-SHA256.

pub mod aes;
pub mod kdf;
pub mod utils;

pub use aes::{AesError, PageCipher, AES_IV_SIZE, AES_KEY_SIZE, AES_TAG_SIZE};
pub use kdf::derive_page_key;
pub use utils::{clear_bytes, key_from_hex};
