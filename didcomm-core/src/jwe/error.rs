//! Error types for JWE operations.
//!
//! [`JweError`] stays local to the wire format. The packer and unpacker convert
//! it into [`crate::Error`], where key problems become `NoCompatibleCrypto`,
//! malformed input becomes `ParseError` and failed decryption `InvalidState`.

use base64::DecodeError;
use std::error::Error as StdError;
use std::fmt;

/// Result type for JWE operations.
pub type Result<T> = std::result::Result<T, JweError>;

/// Errors that can occur during JWE operations.
///
/// # Examples
///
/// ```
/// use didcomm_core::jwe::error::JweError;
///
/// let error = JweError::InvalidKey("Key length must be 32 bytes".to_string());
/// assert_eq!(
///     error.to_string(),
///     "Invalid key: Key length must be 32 bytes"
/// );
/// ```
#[derive(Debug)]
pub enum JweError {
    /// Error during key agreement operation
    KeyAgreement(String),

    /// Error wrapping or unwrapping the content encryption key
    KeyWrap(String),

    /// Error processing the JWE header
    Header(String),

    /// Invalid key material
    InvalidKey(String),

    /// Error during encryption operation
    Encryption(String),

    /// Error during decryption operation
    Decryption(String),

    /// Authentication failed during decryption
    AuthenticationFailed,

    /// Base64 encoding/decoding error
    Base64(&'static str, DecodeError),

    /// JSON serialization/deserialization error
    Serialization(serde_json::Error),

    /// Invalid curve specified for operation
    InvalidCurve(String),

    /// Invalid message format
    InvalidFormat(String),
}

impl fmt::Display for JweError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::KeyAgreement(msg) => write!(f, "Key agreement error: {msg}"),
            Self::KeyWrap(msg) => write!(f, "Key wrap error: {msg}"),
            Self::Header(msg) => write!(f, "Header error: {msg}"),
            Self::InvalidKey(msg) => write!(f, "Invalid key: {msg}"),
            Self::Encryption(msg) => write!(f, "Encryption error: {msg}"),
            Self::Decryption(msg) => write!(f, "Decryption error: {msg}"),
            Self::AuthenticationFailed => write!(f, "Authentication failed"),
            Self::Base64(ctx, err) => write!(f, "Base64 error in {ctx}: {err}"),
            Self::Serialization(err) => write!(f, "Serialization error: {err}"),
            Self::InvalidCurve(msg) => write!(f, "Invalid curve: {msg}"),
            Self::InvalidFormat(msg) => write!(f, "Invalid format: {msg}"),
        }
    }
}

impl StdError for JweError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Base64(_, err) => Some(err),
            Self::Serialization(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DecodeError> for JweError {
    fn from(err: DecodeError) -> Self {
        Self::Base64("decode", err)
    }
}

impl From<crate::jwk::JwkError> for JweError {
    fn from(err: crate::jwk::JwkError) -> Self {
        match err {
            crate::jwk::JwkError::UnsupportedCurve(..) => Self::InvalidCurve(err.to_string()),
            _ => Self::InvalidKey(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for JweError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err)
    }
}
