//! JWS (JSON Web Signature) implementation for `DIDComm`.
//!
//! Signed messages use the general JSON serialization of RFC 7515. The signing
//! input is `BASE64URL(protected) || '.' || BASE64URL(payload)`; the signer's
//! key id travels in the unprotected per-signature header.
//!
//! # Examples
//!
//! ```rust
//! use didcomm_core::algorithms::SignAlg;
//! use didcomm_core::jwk::{Curve, Jwk};
//! use didcomm_core::jws::JwsMessage;
//!
//! let key = Jwk::generate(Curve::Ed25519);
//! let jws = JwsMessage::sign(b"{}", "did:example:alice#key-1", SignAlg::EdDSA, &key).unwrap();
//! jws.verify(0, &key.to_public()).unwrap();
//! ```

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::algorithms::SignAlg;
use crate::jwk::{Jwk, JwkError};

/// Media type of a signed DIDComm message.
pub const SIGNED_MESSAGE_TYPE: &str = "application/didcomm-signed+json";

/// Errors that can occur during JWS operations.
#[derive(Debug, Error)]
pub enum JwsError {
    /// Key material does not fit the algorithm
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Structurally invalid JWS
    #[error("Invalid JWS format: {0}")]
    Format(String),

    /// Base64 decoding error
    #[error("Base64 error: {0}")]
    Base64(#[from] base64::DecodeError),

    /// JSON error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The signature does not verify
    #[error("Signature verification failed")]
    InvalidSignature,
}

impl From<JwkError> for JwsError {
    fn from(err: JwkError) -> Self {
        Self::InvalidKey(err.to_string())
    }
}

/// Result type for JWS operations.
pub type Result<T> = std::result::Result<T, JwsError>;

/// Protected header of one signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwsProtectedHeader {
    /// Media type
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typ: Option<String>,
    /// Signature algorithm
    pub alg: SignAlg,
}

/// Unprotected header of one signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwsSignatureHeader {
    /// The signer's key id
    pub kid: String,
}

/// One signature over the payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwsSignature {
    /// The protected header (base64url-encoded)
    pub protected: String,
    /// The signature (base64url-encoded)
    pub signature: String,
    /// The unprotected header
    pub header: JwsSignatureHeader,
}

/// A JWS in general JSON serialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwsMessage {
    /// The payload (base64url-encoded)
    pub payload: String,
    /// The signatures
    pub signatures: Vec<JwsSignature>,
}

impl JwsMessage {
    /// Signs `payload` with a single key.
    ///
    /// # Errors
    ///
    /// Returns [`JwsError::InvalidKey`] if `key` is not a private key on the
    /// curve required by `alg`.
    pub fn sign(payload: &[u8], kid: &str, alg: SignAlg, key: &Jwk) -> Result<Self> {
        let header = JwsProtectedHeader {
            typ: Some(SIGNED_MESSAGE_TYPE.to_string()),
            alg,
        };
        let protected = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header)?);
        let payload = URL_SAFE_NO_PAD.encode(payload);

        let signing_input = format!("{protected}.{payload}");
        let signature = sign_bytes(alg, key, signing_input.as_bytes())?;

        Ok(Self {
            payload,
            signatures: vec![JwsSignature {
                protected,
                signature: URL_SAFE_NO_PAD.encode(signature),
                header: JwsSignatureHeader {
                    kid: kid.to_string(),
                },
            }],
        })
    }

    /// The decoded payload.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload is not valid base64url.
    pub fn payload_bytes(&self) -> Result<Vec<u8>> {
        Ok(URL_SAFE_NO_PAD.decode(&self.payload)?)
    }

    /// The decoded protected header of signature `index`.
    ///
    /// # Errors
    ///
    /// Returns [`JwsError::Format`] if there is no such signature or the
    /// header is malformed.
    pub fn protected_header(&self, index: usize) -> Result<JwsProtectedHeader> {
        let signature = self.signature(index)?;
        let bytes = URL_SAFE_NO_PAD.decode(&signature.protected)?;
        serde_json::from_slice(&bytes)
            .map_err(|e| JwsError::Format(format!("Malformed protected header: {e}")))
    }

    /// Verifies signature `index` against the public key `key`.
    ///
    /// # Errors
    ///
    /// Returns [`JwsError::InvalidSignature`] if the signature does not verify
    /// and [`JwsError::InvalidKey`] if the key does not match the algorithm.
    pub fn verify(&self, index: usize, key: &Jwk) -> Result<()> {
        let header = self.protected_header(index)?;
        let signature = self.signature(index)?;
        let signing_input = format!("{}.{}", signature.protected, self.payload);
        let sig = URL_SAFE_NO_PAD.decode(&signature.signature)?;
        verify_bytes(header.alg, key, signing_input.as_bytes(), &sig)
    }

    fn signature(&self, index: usize) -> Result<&JwsSignature> {
        self.signatures
            .get(index)
            .ok_or_else(|| JwsError::Format(format!("No signature at index {index}")))
    }
}

fn check_curve(alg: SignAlg, key: &Jwk) -> Result<()> {
    if key.crv != alg.curve() {
        return Err(JwsError::InvalidKey(format!(
            "{alg} requires a {} key, got {}",
            alg.curve(),
            key.crv
        )));
    }
    Ok(())
}

fn sign_bytes(alg: SignAlg, key: &Jwk, input: &[u8]) -> Result<Vec<u8>> {
    use p256::ecdsa::signature::Signer;

    check_curve(alg, key)?;
    let private = key.private_key_bytes()?;

    match alg {
        SignAlg::EdDSA => {
            let seed: [u8; 32] = private
                .as_slice()
                .try_into()
                .map_err(|_| JwsError::InvalidKey("Ed25519 key must be 32 bytes".to_string()))?;
            let signing_key = ed25519_dalek::SigningKey::from_bytes(&seed);
            Ok(signing_key.sign(input).to_bytes().to_vec())
        }
        SignAlg::Es256 => {
            let signing_key = p256::ecdsa::SigningKey::from_slice(&private)
                .map_err(|e| JwsError::InvalidKey(e.to_string()))?;
            let signature: p256::ecdsa::Signature = signing_key.sign(input);
            Ok(signature.to_bytes().to_vec())
        }
        SignAlg::Es256k => {
            let signing_key = k256::ecdsa::SigningKey::from_slice(&private)
                .map_err(|e| JwsError::InvalidKey(e.to_string()))?;
            let signature: k256::ecdsa::Signature = signing_key.sign(input);
            Ok(signature.to_bytes().to_vec())
        }
    }
}

fn verify_bytes(alg: SignAlg, key: &Jwk, input: &[u8], signature: &[u8]) -> Result<()> {
    use p256::ecdsa::signature::Verifier;

    check_curve(alg, key)?;
    let public = key.public_key_bytes()?;

    match alg {
        SignAlg::EdDSA => {
            let public: [u8; 32] = public
                .as_slice()
                .try_into()
                .map_err(|_| JwsError::InvalidKey("Ed25519 key must be 32 bytes".to_string()))?;
            let verifying_key = ed25519_dalek::VerifyingKey::from_bytes(&public)
                .map_err(|e| JwsError::InvalidKey(e.to_string()))?;
            let signature = ed25519_dalek::Signature::from_slice(signature)
                .map_err(|_| JwsError::InvalidSignature)?;
            verifying_key
                .verify_strict(input, &signature)
                .map_err(|_| JwsError::InvalidSignature)
        }
        SignAlg::Es256 => {
            let verifying_key = p256::ecdsa::VerifyingKey::from_sec1_bytes(&public)
                .map_err(|e| JwsError::InvalidKey(e.to_string()))?;
            let signature = p256::ecdsa::Signature::from_slice(signature)
                .map_err(|_| JwsError::InvalidSignature)?;
            verifying_key
                .verify(input, &signature)
                .map_err(|_| JwsError::InvalidSignature)
        }
        SignAlg::Es256k => {
            let verifying_key = k256::ecdsa::VerifyingKey::from_sec1_bytes(&public)
                .map_err(|e| JwsError::InvalidKey(e.to_string()))?;
            let signature = k256::ecdsa::Signature::from_slice(signature)
                .map_err(|_| JwsError::InvalidSignature)?;
            verifying_key
                .verify(input, &signature)
                .map_err(|_| JwsError::InvalidSignature)
        }
    }
}
