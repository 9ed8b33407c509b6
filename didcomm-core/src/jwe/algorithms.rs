//! Cryptographic algorithms for JWE operations.
//!
//! This module provides implementations of the cryptographic primitives required for
//! JWE (JSON Web Encryption) in DIDComm v2, including:
//! - ECDH key agreement (X25519 and NIST curves)
//! - Ephemeral key generation
//! - Content encryption (AES-256-GCM, AES-256-CBC-HMAC-SHA-512, XChaCha20-Poly1305)
//!
//! Shared secrets and private keys are returned wrapped in [`Zeroizing`]. Nonces
//! are always random and authentication tags are compared in constant time.

use aes::cipher::{generic_array::GenericArray, BlockDecrypt, BlockEncrypt};
use aes::Aes256;
use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce};
use chacha20poly1305::{XChaCha20Poly1305, XNonce};
use hmac::{Hmac, Mac};
use p256::elliptic_curve::sec1::ToEncodedPoint;
use rand_core::{OsRng, RngCore};
use sha2::Sha512;
use x25519_dalek::{PublicKey as X25519PublicKey, StaticSecret};
use zeroize::Zeroizing;

use super::{
    error::{JweError, Result},
    ContentEncryptionAlgorithm, EcdhCurve,
};

type HmacSha512 = Hmac<Sha512>;

/// The size of an AES block in bytes.
const AES_BLOCK_SIZE: usize = 16;

/// The size of an AES-256 key in bytes.
const AES_256_KEY_SIZE: usize = 32;

/// Tag size for the AEAD ciphers (GCM, XChaCha20-Poly1305).
const AEAD_TAG_SIZE: usize = 16;

/// Tag size for A256CBC-HS512 (HMAC-SHA-512 truncated to 256 bits).
const CBC_HMAC_TAG_SIZE: usize = 32;

/// Generates a random key (or nonce) of the specified size.
///
/// Uses the operating system's secure random number generator.
#[must_use]
pub fn generate_random_key(size: usize) -> Vec<u8> {
    let mut key = vec![0u8; size];
    OsRng.fill_bytes(&mut key);
    key
}

/// Performs ECDH key agreement using the specified curve.
///
/// `public_key` is the raw X25519 key or a SEC1-encoded NIST point
/// (compressed or uncompressed).
///
/// # Errors
///
/// Returns an error if the key material is invalid for the curve or the
/// agreement produces a non-contributory secret.
pub fn ecdh_key_agreement(
    curve: EcdhCurve,
    private_key: &[u8],
    public_key: &[u8],
) -> Result<Zeroizing<Vec<u8>>> {
    match curve {
        EcdhCurve::X25519 => x25519_key_agreement(private_key, public_key),
        EcdhCurve::P256 => p256_key_agreement(private_key, public_key),
        EcdhCurve::P384 => p384_key_agreement(private_key, public_key),
        EcdhCurve::P521 => p521_key_agreement(private_key, public_key),
    }
}

/// Generates an ephemeral keypair for the specified curve.
///
/// Returns `(private, public)`; NIST public keys are uncompressed SEC1 points.
#[must_use]
pub fn generate_ephemeral_keypair(curve: EcdhCurve) -> (Zeroizing<Vec<u8>>, Vec<u8>) {
    match curve {
        EcdhCurve::X25519 => generate_x25519_ephemeral(),
        EcdhCurve::P256 => generate_p256_ephemeral(),
        EcdhCurve::P384 => generate_p384_ephemeral(),
        EcdhCurve::P521 => generate_p521_ephemeral(),
    }
}

fn x25519_key_agreement(private_key: &[u8], public_key: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
    let private: Zeroizing<[u8; 32]> = Zeroizing::new(
        private_key
            .try_into()
            .map_err(|_| JweError::InvalidKey("X25519 private key must be 32 bytes".to_string()))?,
    );
    let public: [u8; 32] = public_key
        .try_into()
        .map_err(|_| JweError::InvalidKey("X25519 public key must be 32 bytes".to_string()))?;

    let secret = StaticSecret::from(*private);
    let shared = secret.diffie_hellman(&X25519PublicKey::from(public));
    if !shared.was_contributory() {
        return Err(JweError::KeyAgreement(
            "X25519 agreement produced a non-contributory secret".to_string(),
        ));
    }
    Ok(Zeroizing::new(shared.as_bytes().to_vec()))
}

fn generate_x25519_ephemeral() -> (Zeroizing<Vec<u8>>, Vec<u8>) {
    let secret = StaticSecret::random_from_rng(OsRng);
    let public = X25519PublicKey::from(&secret);
    (
        Zeroizing::new(secret.to_bytes().to_vec()),
        public.as_bytes().to_vec(),
    )
}

macro_rules! nist_curve_ops {
    ($agree:ident, $generate:ident, $krate:ident, $label:literal) => {
        fn $agree(private_key: &[u8], public_key: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
            let secret = $krate::SecretKey::from_slice(private_key).map_err(|_| {
                JweError::InvalidKey(concat!("Invalid ", $label, " private key").to_string())
            })?;
            let public = $krate::PublicKey::from_sec1_bytes(public_key).map_err(|_| {
                JweError::InvalidKey(concat!("Invalid ", $label, " public key").to_string())
            })?;

            let shared =
                $krate::ecdh::diffie_hellman(secret.to_nonzero_scalar(), public.as_affine());
            Ok(Zeroizing::new(shared.raw_secret_bytes().to_vec()))
        }

        fn $generate() -> (Zeroizing<Vec<u8>>, Vec<u8>) {
            let secret = $krate::SecretKey::random(&mut OsRng);
            let public = secret
                .public_key()
                .to_encoded_point(false)
                .as_bytes()
                .to_vec();
            (Zeroizing::new(secret.to_bytes().to_vec()), public)
        }
    };
}

nist_curve_ops!(p256_key_agreement, generate_p256_ephemeral, p256, "P-256");
nist_curve_ops!(p384_key_agreement, generate_p384_ephemeral, p384, "P-384");
nist_curve_ops!(p521_key_agreement, generate_p521_ephemeral, p521, "P-521");

/// Encrypts content with the given algorithm, returning `(ciphertext, tag)`.
///
/// # Errors
///
/// Returns an error if the key or IV length does not match the algorithm.
pub fn encrypt_content(
    enc: ContentEncryptionAlgorithm,
    key: &[u8],
    iv: &[u8],
    aad: &[u8],
    plaintext: &[u8],
) -> Result<(Vec<u8>, Vec<u8>)> {
    match enc {
        ContentEncryptionAlgorithm::A256Gcm => encrypt_aes_gcm(key, iv, aad, plaintext),
        ContentEncryptionAlgorithm::Xc20P => encrypt_xchacha20poly1305(key, iv, aad, plaintext),
        ContentEncryptionAlgorithm::A256CbcHs512 => encrypt_aes_cbc_hmac(key, iv, aad, plaintext),
    }
}

/// Decrypts content with the given algorithm.
///
/// # Errors
///
/// Returns [`JweError::AuthenticationFailed`] if the tag does not verify, or
/// another error for malformed inputs.
pub fn decrypt_content(
    enc: ContentEncryptionAlgorithm,
    key: &[u8],
    iv: &[u8],
    aad: &[u8],
    ciphertext: &[u8],
    tag: &[u8],
) -> Result<Vec<u8>> {
    match enc {
        ContentEncryptionAlgorithm::A256Gcm => decrypt_aes_gcm(key, iv, aad, ciphertext, tag),
        ContentEncryptionAlgorithm::Xc20P => {
            decrypt_xchacha20poly1305(key, iv, aad, ciphertext, tag)
        }
        ContentEncryptionAlgorithm::A256CbcHs512 => {
            decrypt_aes_cbc_hmac(key, iv, aad, ciphertext, tag)
        }
    }
}

/// Encrypts data using AES-256-GCM.
///
/// # Errors
///
/// Returns an error if the key is not 32 bytes or the nonce is not 12 bytes.
pub fn encrypt_aes_gcm(
    key: &[u8],
    nonce: &[u8],
    aad: &[u8],
    plaintext: &[u8],
) -> Result<(Vec<u8>, Vec<u8>)> {
    if key.len() != AES_256_KEY_SIZE {
        return Err(JweError::InvalidKey("Invalid AES-256 key length".to_string()));
    }
    if nonce.len() != 12 {
        return Err(JweError::InvalidKey("Invalid nonce length".to_string()));
    }

    let cipher =
        Aes256Gcm::new_from_slice(key).map_err(|e| JweError::Encryption(e.to_string()))?;
    let sealed = cipher
        .encrypt(Nonce::from_slice(nonce), Payload { msg: plaintext, aad })
        .map_err(|e| JweError::Encryption(e.to_string()))?;
    Ok(split_tag(sealed))
}

/// Decrypts data using AES-256-GCM.
///
/// # Errors
///
/// Returns an error if the key, nonce or tag length is invalid or the tag does not verify.
pub fn decrypt_aes_gcm(
    key: &[u8],
    nonce: &[u8],
    aad: &[u8],
    ciphertext: &[u8],
    tag: &[u8],
) -> Result<Vec<u8>> {
    if key.len() != AES_256_KEY_SIZE {
        return Err(JweError::InvalidKey("Invalid AES-256 key length".to_string()));
    }
    if nonce.len() != 12 {
        return Err(JweError::Decryption("Invalid nonce length".to_string()));
    }
    if tag.len() != AEAD_TAG_SIZE {
        return Err(JweError::Decryption(
            "Invalid authentication tag length".to_string(),
        ));
    }

    let cipher =
        Aes256Gcm::new_from_slice(key).map_err(|e| JweError::Decryption(e.to_string()))?;
    let sealed = join_tag(ciphertext, tag);
    cipher
        .decrypt(Nonce::from_slice(nonce), Payload { msg: &sealed, aad })
        .map_err(|_| JweError::AuthenticationFailed)
}

/// Encrypts data using XChaCha20-Poly1305.
///
/// # Errors
///
/// Returns an error if the key is not 32 bytes or the nonce is not 24 bytes.
pub fn encrypt_xchacha20poly1305(
    key: &[u8],
    nonce: &[u8],
    aad: &[u8],
    plaintext: &[u8],
) -> Result<(Vec<u8>, Vec<u8>)> {
    if key.len() != 32 {
        return Err(JweError::InvalidKey("Invalid key length".to_string()));
    }
    if nonce.len() != 24 {
        return Err(JweError::InvalidKey("Invalid nonce length".to_string()));
    }

    let cipher = XChaCha20Poly1305::new_from_slice(key)
        .map_err(|e| JweError::Encryption(e.to_string()))?;
    let sealed = cipher
        .encrypt(XNonce::from_slice(nonce), Payload { msg: plaintext, aad })
        .map_err(|e| JweError::Encryption(e.to_string()))?;
    Ok(split_tag(sealed))
}

/// Decrypts data using XChaCha20-Poly1305.
///
/// # Errors
///
/// Returns an error if the key, nonce or tag length is invalid or the tag does not verify.
pub fn decrypt_xchacha20poly1305(
    key: &[u8],
    nonce: &[u8],
    aad: &[u8],
    ciphertext: &[u8],
    tag: &[u8],
) -> Result<Vec<u8>> {
    if key.len() != 32 {
        return Err(JweError::InvalidKey("Invalid key length".to_string()));
    }
    if nonce.len() != 24 {
        return Err(JweError::Decryption("Invalid nonce length".to_string()));
    }
    if tag.len() != AEAD_TAG_SIZE {
        return Err(JweError::Decryption(
            "Invalid authentication tag length".to_string(),
        ));
    }

    let cipher = XChaCha20Poly1305::new_from_slice(key)
        .map_err(|e| JweError::Decryption(e.to_string()))?;
    let sealed = join_tag(ciphertext, tag);
    cipher
        .decrypt(XNonce::from_slice(nonce), Payload { msg: &sealed, aad })
        .map_err(|_| JweError::AuthenticationFailed)
}

/// Encrypts content using AES-256-CBC with HMAC-SHA-512 (RFC 7518 §5.2.5).
///
/// The 64-byte key is split into a MAC key (first half) and an encryption key
/// (second half). The tag is the first 32 bytes of
/// `HMAC(MAC_KEY, AAD || IV || ciphertext || AL)`.
///
/// # Errors
///
/// Returns an error if the key is not 64 bytes or the IV is not 16 bytes.
pub fn encrypt_aes_cbc_hmac(
    key: &[u8],
    iv: &[u8],
    aad: &[u8],
    plaintext: &[u8],
) -> Result<(Vec<u8>, Vec<u8>)> {
    if key.len() != 2 * AES_256_KEY_SIZE {
        return Err(JweError::InvalidKey(
            "A256CBC-HS512 requires a 64 byte key".to_string(),
        ));
    }
    if iv.len() != AES_BLOCK_SIZE {
        return Err(JweError::InvalidKey("Invalid IV length".to_string()));
    }

    let (mac_key, enc_key) = key.split_at(AES_256_KEY_SIZE);
    let cipher = Aes256::new_from_slice(enc_key).map_err(|e| JweError::Encryption(e.to_string()))?;

    // PKCS#7 padding
    let padding_len = AES_BLOCK_SIZE - (plaintext.len() % AES_BLOCK_SIZE);
    let mut padded = Zeroizing::new(plaintext.to_vec());
    #[allow(clippy::cast_possible_truncation)]
    padded.resize(plaintext.len() + padding_len, padding_len as u8);

    let mut ciphertext = Vec::with_capacity(padded.len());
    let mut prev_block = [0u8; AES_BLOCK_SIZE];
    prev_block.copy_from_slice(iv);

    for chunk in padded.chunks_exact(AES_BLOCK_SIZE) {
        let mut block = [0u8; AES_BLOCK_SIZE];
        for ((b, p), c) in block.iter_mut().zip(prev_block.iter()).zip(chunk) {
            *b = p ^ c;
        }
        cipher.encrypt_block(GenericArray::from_mut_slice(&mut block));
        ciphertext.extend_from_slice(&block);
        prev_block = block;
    }

    let mac = cbc_hmac(mac_key, aad, iv, &ciphertext)?;
    let tag = mac.finalize().into_bytes()[..CBC_HMAC_TAG_SIZE].to_vec();

    Ok((ciphertext, tag))
}

/// Decrypts content using AES-256-CBC with HMAC-SHA-512.
///
/// The tag is verified before any block is decrypted.
///
/// # Errors
///
/// Returns [`JweError::AuthenticationFailed`] if the tag does not verify, or
/// another error for malformed inputs or padding.
pub fn decrypt_aes_cbc_hmac(
    key: &[u8],
    iv: &[u8],
    aad: &[u8],
    ciphertext: &[u8],
    tag: &[u8],
) -> Result<Vec<u8>> {
    if key.len() != 2 * AES_256_KEY_SIZE {
        return Err(JweError::InvalidKey(
            "A256CBC-HS512 requires a 64 byte key".to_string(),
        ));
    }
    if iv.len() != AES_BLOCK_SIZE {
        return Err(JweError::Decryption("Invalid IV length".to_string()));
    }
    if tag.len() != CBC_HMAC_TAG_SIZE {
        return Err(JweError::Decryption(
            "Invalid authentication tag length".to_string(),
        ));
    }
    if ciphertext.is_empty() || ciphertext.len() % AES_BLOCK_SIZE != 0 {
        return Err(JweError::Decryption(
            "Ciphertext is not a whole number of blocks".to_string(),
        ));
    }

    let (mac_key, enc_key) = key.split_at(AES_256_KEY_SIZE);
    cbc_hmac(mac_key, aad, iv, ciphertext)?
        .verify_truncated_left(tag)
        .map_err(|_| JweError::AuthenticationFailed)?;

    let cipher = Aes256::new_from_slice(enc_key).map_err(|e| JweError::Decryption(e.to_string()))?;

    let mut plaintext = Vec::with_capacity(ciphertext.len());
    let mut prev_block = [0u8; AES_BLOCK_SIZE];
    prev_block.copy_from_slice(iv);

    for chunk in ciphertext.chunks_exact(AES_BLOCK_SIZE) {
        let mut block = [0u8; AES_BLOCK_SIZE];
        block.copy_from_slice(chunk);
        cipher.decrypt_block(GenericArray::from_mut_slice(&mut block));
        for (b, p) in block.iter_mut().zip(prev_block.iter()) {
            *b ^= p;
        }
        plaintext.extend_from_slice(&block);
        prev_block.copy_from_slice(chunk);
    }

    let padding_len = usize::from(
        *plaintext
            .last()
            .ok_or_else(|| JweError::Decryption("Empty plaintext".to_string()))?,
    );
    if padding_len == 0
        || padding_len > AES_BLOCK_SIZE
        || plaintext[plaintext.len() - padding_len..]
            .iter()
            .any(|&b| usize::from(b) != padding_len)
    {
        return Err(JweError::Decryption("Invalid padding".to_string()));
    }
    plaintext.truncate(plaintext.len() - padding_len);

    Ok(plaintext)
}

fn cbc_hmac(mac_key: &[u8], aad: &[u8], iv: &[u8], ciphertext: &[u8]) -> Result<HmacSha512> {
    let mut mac = <HmacSha512 as Mac>::new_from_slice(mac_key)
        .map_err(|e| JweError::InvalidKey(format!("HMAC initialization failed: {e}")))?;
    let aad_bits = (aad.len() as u64) * 8;
    mac.update(aad);
    mac.update(iv);
    mac.update(ciphertext);
    mac.update(&aad_bits.to_be_bytes());
    Ok(mac)
}

fn split_tag(mut sealed: Vec<u8>) -> (Vec<u8>, Vec<u8>) {
    let tag = sealed.split_off(sealed.len() - AEAD_TAG_SIZE);
    (sealed, tag)
}

fn join_tag(ciphertext: &[u8], tag: &[u8]) -> Vec<u8> {
    let mut sealed = Vec::with_capacity(ciphertext.len() + tag.len());
    sealed.extend_from_slice(ciphertext);
    sealed.extend_from_slice(tag);
    sealed
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_CURVES: [EcdhCurve; 4] = [
        EcdhCurve::X25519,
        EcdhCurve::P256,
        EcdhCurve::P384,
        EcdhCurve::P521,
    ];

    #[test]
    fn test_key_agreement_all_curves() {
        for curve in ALL_CURVES {
            let (priv_a, pub_a) = generate_ephemeral_keypair(curve);
            let (priv_b, pub_b) = generate_ephemeral_keypair(curve);

            let shared_a = ecdh_key_agreement(curve, &priv_a, &pub_b).unwrap();
            let shared_b = ecdh_key_agreement(curve, &priv_b, &pub_a).unwrap();

            assert_eq!(*shared_a, *shared_b, "{curve}");
        }
    }

    #[test]
    fn test_x25519_rejects_low_order_point() {
        let (private, _) = generate_ephemeral_keypair(EcdhCurve::X25519);
        let result = ecdh_key_agreement(EcdhCurve::X25519, &private, &[0u8; 32]);
        assert!(matches!(result, Err(JweError::KeyAgreement(_))));
    }

    #[test]
    fn test_invalid_key_material_nist() {
        let invalid_key = vec![0; 32];
        for curve in [EcdhCurve::P256, EcdhCurve::P384, EcdhCurve::P521] {
            let result = ecdh_key_agreement(curve, &invalid_key, &invalid_key);
            assert!(matches!(result, Err(JweError::InvalidKey(_))), "{curve}");
        }
    }

    #[test]
    fn test_cross_curve_public_key_rejected() {
        let (private, _) = generate_ephemeral_keypair(EcdhCurve::P256);
        let (_, public) = generate_ephemeral_keypair(EcdhCurve::P384);
        assert!(ecdh_key_agreement(EcdhCurve::P256, &private, &public).is_err());
    }

    #[test]
    fn test_content_encryption_roundtrip() {
        let aad = b"additional data";
        let plaintext = b"test message";

        for enc in [
            ContentEncryptionAlgorithm::A256Gcm,
            ContentEncryptionAlgorithm::Xc20P,
            ContentEncryptionAlgorithm::A256CbcHs512,
        ] {
            let key = generate_random_key(enc.key_size());
            let iv = generate_random_key(enc.iv_size());

            let (ciphertext, tag) = encrypt_content(enc, &key, &iv, aad, plaintext).unwrap();
            let decrypted = decrypt_content(enc, &key, &iv, aad, &ciphertext, &tag).unwrap();
            assert_eq!(decrypted, plaintext, "{enc}");

            let wrong_aad = decrypt_content(enc, &key, &iv, b"other", &ciphertext, &tag);
            assert!(matches!(wrong_aad, Err(JweError::AuthenticationFailed)), "{enc}");
        }
    }

    #[test]
    fn test_content_tamper_detection() {
        let aad = b"additional data";
        for enc in [
            ContentEncryptionAlgorithm::A256Gcm,
            ContentEncryptionAlgorithm::Xc20P,
            ContentEncryptionAlgorithm::A256CbcHs512,
        ] {
            let key = generate_random_key(enc.key_size());
            let iv = generate_random_key(enc.iv_size());
            let (mut ciphertext, tag) =
                encrypt_content(enc, &key, &iv, aad, b"test message").unwrap();

            ciphertext[0] ^= 1;

            let result = decrypt_content(enc, &key, &iv, aad, &ciphertext, &tag);
            assert!(matches!(result, Err(JweError::AuthenticationFailed)), "{enc}");
        }
    }

    #[test]
    fn test_invalid_key_material() {
        let aad = b"additional data";
        let plaintext = b"test message";

        let result = encrypt_aes_gcm(&generate_random_key(16), &generate_random_key(12), aad, plaintext);
        assert!(result.is_err());

        let result = encrypt_aes_gcm(&generate_random_key(32), &generate_random_key(8), aad, plaintext);
        assert!(result.is_err());

        let result =
            encrypt_xchacha20poly1305(&generate_random_key(32), &generate_random_key(12), aad, plaintext);
        assert!(result.is_err());

        // A256CBC-HS512 needs the full 64 byte composite key
        let result =
            encrypt_aes_cbc_hmac(&generate_random_key(32), &generate_random_key(16), aad, plaintext);
        assert!(result.is_err());
    }

    #[test]
    fn test_aes_cbc_hmac_padding() {
        let key = generate_random_key(64);
        let iv = generate_random_key(16);
        let aad = b"additional data";

        for len in 0..=33 {
            let plaintext = vec![0x42; len];
            let (ciphertext, tag) = encrypt_aes_cbc_hmac(&key, &iv, aad, &plaintext).unwrap();
            assert_eq!(ciphertext.len() % 16, 0);
            assert!(ciphertext.len() > len);
            let decrypted = decrypt_aes_cbc_hmac(&key, &iv, aad, &ciphertext, &tag).unwrap();
            assert_eq!(decrypted, plaintext);
        }
    }

    #[test]
    fn test_aes_cbc_hmac_truncated_tag() {
        let key = generate_random_key(64);
        let iv = generate_random_key(16);
        let (ciphertext, tag) = encrypt_aes_cbc_hmac(&key, &iv, b"", b"abc").unwrap();
        assert_eq!(tag.len(), 32);

        let result = decrypt_aes_cbc_hmac(&key, &iv, b"", &ciphertext, &tag[..16]);
        assert!(matches!(result, Err(JweError::Decryption(_))));
    }
}
