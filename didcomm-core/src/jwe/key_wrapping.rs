//! Key wrapping algorithms for JWE.
//!
//! The content encryption key is wrapped per recipient with AES-256 Key Wrap
//! (RFC 3394) under the key encryption key derived by key agreement.

use aes::cipher::generic_array::GenericArray;
use aes_kw::KekAes256;
use zeroize::Zeroize;

use super::error::{JweError, Result};
use super::key_agreement::KeyEncryptionKey;

/// Overhead added by AES-KW to the wrapped key.
const KW_OVERHEAD: usize = 8;

/// A content encryption key.
#[derive(Zeroize)]
#[zeroize(drop)]
pub struct ContentEncryptionKey {
    /// The raw key material
    pub(crate) key: Vec<u8>,
}

impl ContentEncryptionKey {
    /// Creates a new content encryption key.
    #[must_use]
    pub fn new(key: Vec<u8>) -> Self {
        Self { key }
    }

    /// Gets the raw key bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.key
    }
}

impl std::fmt::Debug for ContentEncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentEncryptionKey").finish_non_exhaustive()
    }
}

fn kek_cipher(kek: &KeyEncryptionKey) -> Result<KekAes256> {
    let bytes = kek.as_bytes();
    if bytes.len() != 32 {
        return Err(JweError::KeyWrap(
            "Key encryption key must be 32 bytes".to_string(),
        ));
    }
    Ok(KekAes256::new(GenericArray::from_slice(bytes)))
}

/// Wraps a content encryption key using AES-KW.
///
/// # Errors
///
/// Returns an error if the key encryption key is not 32 bytes or the content
/// key is not a multiple of 8 bytes.
pub fn wrap_key(kek: &KeyEncryptionKey, cek: &ContentEncryptionKey) -> Result<Vec<u8>> {
    let cek = cek.as_bytes();
    if cek.len() < 16 || cek.len() % 8 != 0 {
        return Err(JweError::KeyWrap(
            "Content encryption key must be a multiple of 8 bytes".to_string(),
        ));
    }

    let mut wrapped = vec![0u8; cek.len() + KW_OVERHEAD];
    kek_cipher(kek)?
        .wrap(cek, &mut wrapped)
        .map_err(|_| JweError::KeyWrap("Failed to wrap key".to_string()))?;
    Ok(wrapped)
}

/// Unwraps a content encryption key using AES-KW.
///
/// # Errors
///
/// Returns an error if the wrapped key is malformed or its integrity check fails.
pub fn unwrap_key(kek: &KeyEncryptionKey, wrapped_key: &[u8]) -> Result<ContentEncryptionKey> {
    if wrapped_key.len() < 16 + KW_OVERHEAD || wrapped_key.len() % 8 != 0 {
        return Err(JweError::KeyWrap("Invalid wrapped key length".to_string()));
    }

    let mut key = vec![0u8; wrapped_key.len() - KW_OVERHEAD];
    kek_cipher(kek)?
        .unwrap(wrapped_key, &mut key)
        .map_err(|_| JweError::KeyWrap("Failed to unwrap key".to_string()))?;
    Ok(ContentEncryptionKey::new(key))
}
