//! Key derivation for JWE key agreement.
//!
//! Both `ECDH-ES+A256KW` and `ECDH-1PU+A256KW` derive a 256-bit key encryption
//! key from the ECDH output with the Concat KDF of NIST SP 800-56A (single
//! SHA-256 round), as profiled by RFC 7518 §4.6.2. ECDH-1PU concatenates the
//! ephemeral-static and static-static secrets (`Z = Ze || Zs`) and binds the
//! content authentication tag into `SuppPubInfo`.

use sha2::{Digest, Sha256};
use zeroize::{Zeroize, Zeroizing};

use super::error::{JweError, Result};
use super::KeyAgreementAlgorithm;

/// Output size of the Concat KDF in bits (A256KW).
const KEY_DATA_LEN_BITS: u32 = 256;

/// A key encryption key derived from ECDH.
#[derive(Zeroize)]
#[zeroize(drop)]
pub struct KeyEncryptionKey {
    /// The raw key material
    pub(crate) key: Vec<u8>,
}

impl KeyEncryptionKey {
    /// Creates a new key encryption key.
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

impl std::fmt::Debug for KeyEncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyEncryptionKey").finish_non_exhaustive()
    }
}

/// Derives a key encryption key for `ECDH-ES+A256KW`.
///
/// # Arguments
///
/// * `shared_secret` - The ECDH output `Z`
/// * `apu` - Decoded `apu` header value (empty when absent)
/// * `apv` - Decoded `apv` header value
///
/// # Errors
///
/// Returns an error if any input is too long to be length-prefixed.
pub fn derive_key_encryption_key_es(
    shared_secret: &[u8],
    apu: &[u8],
    apv: &[u8],
) -> Result<KeyEncryptionKey> {
    concat_kdf(
        shared_secret,
        KeyAgreementAlgorithm::EcdhEsA256kw,
        apu,
        apv,
        None,
    )
}

/// Derives a key encryption key for `ECDH-1PU+A256KW`.
///
/// # Arguments
///
/// * `ephemeral_secret` - `Ze`, agreement between the ephemeral key and the recipient
/// * `static_secret` - `Zs`, agreement between the sender's static key and the recipient
/// * `apu` - Decoded `apu` header value (the sender key id)
/// * `apv` - Decoded `apv` header value
/// * `cc_tag` - Authentication tag of the already encrypted content
///
/// # Errors
///
/// Returns an error if any input is too long to be length-prefixed.
pub fn derive_key_encryption_key_1pu(
    ephemeral_secret: &[u8],
    static_secret: &[u8],
    apu: &[u8],
    apv: &[u8],
    cc_tag: &[u8],
) -> Result<KeyEncryptionKey> {
    let mut z = Zeroizing::new(Vec::with_capacity(ephemeral_secret.len() + static_secret.len()));
    z.extend_from_slice(ephemeral_secret);
    z.extend_from_slice(static_secret);

    concat_kdf(
        &z,
        KeyAgreementAlgorithm::Ecdh1puA256kw,
        apu,
        apv,
        Some(cc_tag),
    )
}

/// Computes the `apv` value: SHA-256 over the sorted recipient key ids joined by `.`.
#[must_use]
pub fn compute_apv<S: AsRef<str>>(kids: &[S]) -> Vec<u8> {
    let mut sorted: Vec<&str> = kids.iter().map(AsRef::as_ref).collect();
    sorted.sort_unstable();
    Sha256::digest(sorted.join(".").as_bytes()).to_vec()
}

fn concat_kdf(
    z: &[u8],
    alg: KeyAgreementAlgorithm,
    apu: &[u8],
    apv: &[u8],
    cc_tag: Option<&[u8]>,
) -> Result<KeyEncryptionKey> {
    let mut hasher = Sha256::new();
    hasher.update(1u32.to_be_bytes());
    hasher.update(z);
    update_length_prefixed(&mut hasher, alg.as_str().as_bytes())?;
    update_length_prefixed(&mut hasher, apu)?;
    update_length_prefixed(&mut hasher, apv)?;
    hasher.update(KEY_DATA_LEN_BITS.to_be_bytes());
    if let Some(tag) = cc_tag {
        update_length_prefixed(&mut hasher, tag)?;
    }

    Ok(KeyEncryptionKey::new(hasher.finalize().to_vec()))
}

fn update_length_prefixed(hasher: &mut Sha256, data: &[u8]) -> Result<()> {
    let len = u32::try_from(data.len())
        .map_err(|_| JweError::KeyAgreement("KDF input too long".to_string()))?;
    hasher.update(len.to_be_bytes());
    hasher.update(data);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kdf_is_deterministic() {
        let z = [7u8; 32];
        let kek1 = derive_key_encryption_key_es(&z, b"", b"apv").unwrap();
        let kek2 = derive_key_encryption_key_es(&z, b"", b"apv").unwrap();
        assert_eq!(kek1.as_bytes(), kek2.as_bytes());
        assert_eq!(kek1.as_bytes().len(), 32);
    }

    #[test]
    fn test_kdf_binds_party_info() {
        let z = [7u8; 32];
        let base = derive_key_encryption_key_es(&z, b"", b"apv").unwrap();
        let other_apv = derive_key_encryption_key_es(&z, b"", b"other").unwrap();
        let other_apu = derive_key_encryption_key_es(&z, b"apu", b"apv").unwrap();
        assert_ne!(base.as_bytes(), other_apv.as_bytes());
        assert_ne!(base.as_bytes(), other_apu.as_bytes());
    }

    #[test]
    fn test_1pu_binds_tag_and_static_secret() {
        let ze = [1u8; 32];
        let zs = [2u8; 32];
        let kek = derive_key_encryption_key_1pu(&ze, &zs, b"skid", b"apv", b"tag").unwrap();
        let other_tag = derive_key_encryption_key_1pu(&ze, &zs, b"skid", b"apv", b"gat").unwrap();
        let other_zs = derive_key_encryption_key_1pu(&ze, &ze, b"skid", b"apv", b"tag").unwrap();
        assert_ne!(kek.as_bytes(), other_tag.as_bytes());
        assert_ne!(kek.as_bytes(), other_zs.as_bytes());

        let es = derive_key_encryption_key_es(&ze, b"skid", b"apv").unwrap();
        assert_ne!(kek.as_bytes(), es.as_bytes());
    }

    #[test]
    fn test_compute_apv_is_order_independent() {
        let a = compute_apv(&["did:example:bob#key-2", "did:example:bob#key-1"]);
        let b = compute_apv(&["did:example:bob#key-1", "did:example:bob#key-2"]);
        assert_eq!(a, b);
        assert_eq!(a.len(), 32);

        let expected = Sha256::digest(b"did:example:bob#key-1.did:example:bob#key-2").to_vec();
        assert_eq!(a, expected);
    }

    #[test]
    fn test_kek_debug_is_redacted() {
        let kek = KeyEncryptionKey::new(vec![0xAB; 32]);
        let debug = format!("{kek:?}");
        assert!(!debug.contains("171"));
    }
}
