//! Algorithm suites for packing.
//!
//! Each packing mode has a closed family of algorithm suites. The suite chosen
//! by the caller (or the default) determines the JOSE `alg`/`enc` values of the
//! resulting envelope.

use serde::{Deserialize, Serialize};

use crate::jwe::ContentEncryptionAlgorithm;
use crate::jwk::Curve;

/// Authenticated encryption suites.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuthcryptAlg {
    /// `ECDH-1PU+A256KW` with `A256CBC-HS512`
    #[default]
    #[serde(rename = "ECDH-1PU+A256KW/A256CBC-HS512")]
    Ecdh1puA256kwA256cbcHs512,
}

impl AuthcryptAlg {
    /// The content encryption algorithm of this suite.
    #[must_use]
    pub fn content_encryption(self) -> ContentEncryptionAlgorithm {
        match self {
            Self::Ecdh1puA256kwA256cbcHs512 => ContentEncryptionAlgorithm::A256CbcHs512,
        }
    }

    /// Looks up the suite for an envelope's `enc`.
    #[must_use]
    pub fn from_content_encryption(enc: ContentEncryptionAlgorithm) -> Option<Self> {
        match enc {
            ContentEncryptionAlgorithm::A256CbcHs512 => Some(Self::Ecdh1puA256kwA256cbcHs512),
            ContentEncryptionAlgorithm::A256Gcm | ContentEncryptionAlgorithm::Xc20P => None,
        }
    }
}

/// Anonymous encryption suites.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnoncryptAlg {
    /// `ECDH-ES+A256KW` with `XC20P`
    #[default]
    #[serde(rename = "ECDH-ES+A256KW/XC20P")]
    EcdhEsA256kwXc20p,
    /// `ECDH-ES+A256KW` with `A256GCM`
    #[serde(rename = "ECDH-ES+A256KW/A256GCM")]
    EcdhEsA256kwA256gcm,
    /// `ECDH-ES+A256KW` with `A256CBC-HS512`
    #[serde(rename = "ECDH-ES+A256KW/A256CBC-HS512")]
    EcdhEsA256kwA256cbcHs512,
}

impl AnoncryptAlg {
    /// The content encryption algorithm of this suite.
    #[must_use]
    pub fn content_encryption(self) -> ContentEncryptionAlgorithm {
        match self {
            Self::EcdhEsA256kwXc20p => ContentEncryptionAlgorithm::Xc20P,
            Self::EcdhEsA256kwA256gcm => ContentEncryptionAlgorithm::A256Gcm,
            Self::EcdhEsA256kwA256cbcHs512 => ContentEncryptionAlgorithm::A256CbcHs512,
        }
    }

    /// Looks up the suite for an envelope's `enc`.
    #[must_use]
    pub fn from_content_encryption(enc: ContentEncryptionAlgorithm) -> Self {
        match enc {
            ContentEncryptionAlgorithm::Xc20P => Self::EcdhEsA256kwXc20p,
            ContentEncryptionAlgorithm::A256Gcm => Self::EcdhEsA256kwA256gcm,
            ContentEncryptionAlgorithm::A256CbcHs512 => Self::EcdhEsA256kwA256cbcHs512,
        }
    }
}

/// Signature algorithms.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignAlg {
    /// Ed25519
    #[default]
    EdDSA,
    /// ECDSA over P-256 with SHA-256
    #[serde(rename = "ES256")]
    Es256,
    /// ECDSA over secp256k1 with SHA-256
    #[serde(rename = "ES256K")]
    Es256k,
}

impl SignAlg {
    /// The JOSE `alg` identifier.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::EdDSA => "EdDSA",
            Self::Es256 => "ES256",
            Self::Es256k => "ES256K",
        }
    }

    /// The curve signing keys for this algorithm live on.
    #[must_use]
    pub fn curve(self) -> Curve {
        match self {
            Self::EdDSA => Curve::Ed25519,
            Self::Es256 => Curve::P256,
            Self::Es256k => Curve::Secp256k1,
        }
    }

    /// The algorithm a key on `curve` signs with, if any.
    #[must_use]
    pub fn for_curve(curve: Curve) -> Option<Self> {
        match curve {
            Curve::Ed25519 => Some(Self::EdDSA),
            Curve::P256 => Some(Self::Es256),
            Curve::Secp256k1 => Some(Self::Es256k),
            Curve::X25519 | Curve::P384 | Curve::P521 => None,
        }
    }
}

impl std::fmt::Display for SignAlg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
