//! Common types for JWE operations.
//!
//! This module provides the core types used for JSON Web Encryption (JWE)
//! operations in the `DIDComm` v2 protocol, including key agreement algorithms,
//! content encryption algorithms, and curve types.

use serde::{Deserialize, Serialize};

/// Key agreement algorithms supported for JWE.
///
/// - `ECDH-ES+A256KW` provides anonymous encryption (`AnonCrypt`)
/// - `ECDH-1PU+A256KW` provides authenticated encryption (`AuthCrypt`)
/// - Both use AES key wrapping for the content encryption key
///
/// # Examples
///
/// ```rust
/// use didcomm_core::jwe::types::KeyAgreementAlgorithm;
///
/// let alg = KeyAgreementAlgorithm::EcdhEsA256kw;
/// assert_eq!(alg.as_str(), "ECDH-ES+A256KW");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyAgreementAlgorithm {
    /// ECDH-ES with AES key wrap (`AnonCrypt`)
    #[serde(rename = "ECDH-ES+A256KW")]
    EcdhEsA256kw,
    /// ECDH-1PU with AES key wrap (`AuthCrypt`)
    #[serde(rename = "ECDH-1PU+A256KW")]
    Ecdh1puA256kw,
}

impl KeyAgreementAlgorithm {
    /// The JOSE `alg` identifier.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::EcdhEsA256kw => "ECDH-ES+A256KW",
            Self::Ecdh1puA256kw => "ECDH-1PU+A256KW",
        }
    }
}

/// Content encryption algorithms supported for JWE.
///
/// These algorithms encrypt the actual message content using the randomly
/// generated content encryption key shared by all recipients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContentEncryptionAlgorithm {
    /// AES-256-CBC with HMAC-SHA-512 for authentication
    #[serde(rename = "A256CBC-HS512")]
    A256CbcHs512,
    /// AES-256-GCM
    #[serde(rename = "A256GCM")]
    A256Gcm,
    /// XChaCha20-Poly1305
    #[serde(rename = "XC20P")]
    Xc20P,
}

impl ContentEncryptionAlgorithm {
    /// Size of the content encryption key in bytes.
    #[must_use]
    pub fn key_size(self) -> usize {
        match self {
            Self::A256CbcHs512 => 64,
            Self::A256Gcm | Self::Xc20P => 32,
        }
    }

    /// Size of the initialization vector / nonce in bytes.
    #[must_use]
    pub fn iv_size(self) -> usize {
        match self {
            Self::A256CbcHs512 => 16,
            Self::A256Gcm => 12,
            Self::Xc20P => 24,
        }
    }
}

impl std::fmt::Display for ContentEncryptionAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::A256CbcHs512 => write!(f, "A256CBC-HS512"),
            Self::A256Gcm => write!(f, "A256GCM"),
            Self::Xc20P => write!(f, "XC20P"),
        }
    }
}

/// Elliptic curves supported for ECDH key agreement.
///
/// `X25519` is the default curve for `DIDComm`; NIST curves are supported for
/// compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EcdhCurve {
    /// X25519 curve (Curve25519)
    X25519,
    /// NIST P-256 curve
    #[serde(rename = "P-256")]
    P256,
    /// NIST P-384 curve
    #[serde(rename = "P-384")]
    P384,
    /// NIST P-521 curve
    #[serde(rename = "P-521")]
    P521,
}

impl EcdhCurve {
    /// Size of a single coordinate (or of the X25519 key) in bytes.
    #[must_use]
    pub fn coordinate_size(self) -> usize {
        match self {
            Self::X25519 | Self::P256 => 32,
            Self::P384 => 48,
            Self::P521 => 66,
        }
    }
}

impl std::fmt::Display for EcdhCurve {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::X25519 => write!(f, "X25519"),
            Self::P256 => write!(f, "P-256"),
            Self::P384 => write!(f, "P-384"),
            Self::P521 => write!(f, "P-521"),
        }
    }
}
