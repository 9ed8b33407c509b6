//! JWE (JSON Web Encryption) implementation for `DIDComm`.
//!
//! This module provides the JWE layer used for `DIDComm` v2 encrypted
//! messages, supporting both `AnonCrypt` and `AuthCrypt` modes with multiple
//! recipients sharing one content encryption key.
//!
//! The implementation follows RFC 7516 (JSON Web Encryption, general JSON
//! serialization) and RFC 7518, with ECDH-1PU from the IETF draft used by
//! `DIDComm` authcrypt.
//!
//! # Features
//!
//! - Support for `ECDH-ES+A256KW` and `ECDH-1PU+A256KW` key agreement
//! - Multiple content encryption algorithms (`A256CBC-HS512`, `A256GCM`, `XC20P`)
//! - Support for `X25519` and NIST curves (`P-256`, `P-384`, `P-521`)
//! - Multiple recipient support with a single ephemeral key
//! - APU/APV parameters bound into the Concat KDF
//!
//! # Examples
//!
//! ```rust
//! use didcomm_core::jwe::{ContentEncryptionAlgorithm, EcdhCurve, JweMessage, RecipientKey};
//! use didcomm_core::jwk::{Curve, Jwk};
//!
//! let bob = Jwk::generate(Curve::X25519);
//! let bob_public = bob.public_key_bytes().unwrap();
//!
//! let jwe = JweMessage::encrypt_anoncrypt(
//!     b"Hello, DIDComm!",
//!     EcdhCurve::X25519,
//!     &[RecipientKey { kid: "did:example:bob#key-1", public_key: &bob_public }],
//!     ContentEncryptionAlgorithm::Xc20P,
//! )
//! .unwrap();
//!
//! let bob_private = bob.private_key_bytes().unwrap();
//! let plaintext = jwe.decrypt("did:example:bob#key-1", &bob_private, None).unwrap();
//! assert_eq!(plaintext, b"Hello, DIDComm!");
//! ```
//!
//! # Security Considerations
//!
//! - Key material is zeroized when dropped
//! - Ephemeral keys and nonces come from the operating system RNG
//! - Authentication tags are verified before any plaintext is returned

pub mod algorithms;
pub mod error;
pub mod header;
pub mod key_agreement;
pub mod key_wrapping;
pub mod message;
pub mod types;

pub use self::error::JweError;
pub use self::header::JweHeader;
pub use self::message::{JweMessage, JweRecipient, JweRecipientHeader, RecipientKey, SenderKey};
pub use self::types::{ContentEncryptionAlgorithm, EcdhCurve, KeyAgreementAlgorithm};
