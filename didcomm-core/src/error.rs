//! Error types for the didcomm-core crate.

use thiserror::Error;

use crate::jwe::error::JweError;
use crate::jwk::JwkError;
use crate::jws::JwsError;

/// Error type for the DIDComm core library.
///
/// Every failure of a pack or unpack operation surfaces as one of these
/// variants. There is no partial success: an error from any layer aborts the
/// whole operation.
#[derive(Debug, Error)]
pub enum Error {
    /// A DID could not be resolved to a DID Document
    #[error("DID not found: {0}")]
    DidNotFound(String),

    /// No secret (private key) is available for the requested DID or key id
    #[error("Secret not found: {0}")]
    SecretNotFound(String),

    /// Key types or curves do not match the selected algorithm
    #[error("No compatible crypto: {0}")]
    NoCompatibleCrypto(String),

    /// Malformed or structurally invalid envelope or message
    #[error("Parse error: {0}")]
    Parse(String),

    /// Malformed input properties
    #[error("Validation error: {0}")]
    Validation(String),

    /// The requested operation is impossible given the available data
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// A resolver failed for reasons other than a missing entry
    #[error("I/O error: {0}")]
    Io(String),
}

/// Coarse classification of [`Error`] values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// See [`Error::DidNotFound`]
    DidNotFound,
    /// See [`Error::SecretNotFound`]
    SecretNotFound,
    /// See [`Error::NoCompatibleCrypto`]
    NoCompatibleCrypto,
    /// See [`Error::Parse`]
    ParseError,
    /// See [`Error::Validation`]
    ValidationError,
    /// See [`Error::InvalidState`]
    InvalidState,
    /// See [`Error::Io`]
    IoError,
}

impl Error {
    /// Returns the kind of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::DidNotFound(_) => ErrorKind::DidNotFound,
            Self::SecretNotFound(_) => ErrorKind::SecretNotFound,
            Self::NoCompatibleCrypto(_) => ErrorKind::NoCompatibleCrypto,
            Self::Parse(_) => ErrorKind::ParseError,
            Self::Validation(_) => ErrorKind::ValidationError,
            Self::InvalidState(_) => ErrorKind::InvalidState,
            Self::Io(_) => ErrorKind::IoError,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

impl From<base64::DecodeError> for Error {
    fn from(err: base64::DecodeError) -> Self {
        Self::Parse(format!("Invalid base64: {err}"))
    }
}

impl From<JweError> for Error {
    fn from(err: JweError) -> Self {
        match err {
            JweError::InvalidKey(_) | JweError::InvalidCurve(_) => {
                Self::NoCompatibleCrypto(err.to_string())
            }
            JweError::Header(_)
            | JweError::InvalidFormat(_)
            | JweError::Base64(..)
            | JweError::Serialization(_) => Self::Parse(err.to_string()),
            JweError::KeyAgreement(_)
            | JweError::KeyWrap(_)
            | JweError::Encryption(_)
            | JweError::Decryption(_)
            | JweError::AuthenticationFailed => Self::InvalidState(err.to_string()),
        }
    }
}

impl From<JwsError> for Error {
    fn from(err: JwsError) -> Self {
        match err {
            JwsError::InvalidKey(_) => Self::NoCompatibleCrypto(err.to_string()),
            JwsError::Format(_) | JwsError::Base64(_) | JwsError::Serialization(_) => {
                Self::Parse(err.to_string())
            }
            JwsError::InvalidSignature => Self::InvalidState(err.to_string()),
        }
    }
}

impl From<JwkError> for Error {
    fn from(err: JwkError) -> Self {
        Self::NoCompatibleCrypto(err.to_string())
    }
}

/// Result type for the DIDComm core library
pub type Result<T> = std::result::Result<T, Error>;
