//! Core `DIDComm` v2 envelope layer.
//!
//! This crate turns plaintext `DIDComm` messages into wire envelopes and back:
//!
//! - Authcrypt: authenticated encryption with sender identity (`ECDH-1PU+A256KW`)
//! - Anoncrypt: anonymous encryption (`ECDH-ES+A256KW`)
//! - Signed: JWS over the canonical plaintext, optionally anoncrypted
//! - Forward: routing envelopes that rewrap a message for a mediator
//!
//! Keys are never configured directly. Public keys come from a [`DidResolver`]
//! and private keys from a [`SecretsResolver`]; both are consulted on every
//! call.
//!
//! # Architecture
//!
//! - `message`: plaintext message model and canonical serialization
//! - `jwk`, `jwe`, `jws`: JOSE wire formats and cryptographic primitives
//! - `did`, `secrets`: resolver interfaces and in-memory implementations
//! - `keys`: key resolution and curve negotiation
//! - `pack`, `unpack`: the packing pipeline
//! - `error`: error types and handling
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use didcomm_core::prelude::*;
//!
//! async fn example(
//!     did_resolver: Arc<dyn DidResolver>,
//!     secrets_resolver: Arc<dyn SecretsResolver>,
//! ) -> Result<()> {
//!     let message = Message::build(MessageProps {
//!         id: Some("1234567890".to_string()),
//!         type_: Some("https://example.com/protocols/ping/1.0/ping".to_string()),
//!         from: Some("did:example:alice".to_string()),
//!         to: Some(vec!["did:example:bob".to_string()]),
//!         ..MessageProps::default()
//!     })?;
//!
//!     let packer = MessagePacker::new(did_resolver.clone(), secrets_resolver.clone());
//!     let packed = packer.authcrypt(&message, &AuthcryptOpts::default()).await?;
//!
//!     let unpacker = MessageUnpacker::new(did_resolver, secrets_resolver);
//!     let (unpacked, metadata) = unpacker.unpack(&packed.data, &UnpackOpts::default()).await?;
//!     assert_eq!(unpacked, message);
//!     assert_eq!(metadata.authcrypt_from.as_deref(), Some("did:example:alice"));
//!     Ok(())
//! }
//! ```
//!
//! # Security Considerations
//!
//! - Use authcrypt when the recipient must authenticate the sender
//! - Use anoncrypt when sender privacy is required, and anoncrypt of a signed
//!   message when non-repudiation is required as well
//! - Check [`UnpackMetadata`] (or set the `expect_*` options) before trusting
//!   a message's `from`
//! - Private keys are zeroized when dropped and never logged

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod algorithms;
pub mod did;
pub mod envelope;
pub mod error;
pub mod jwe;
pub mod jwk;
pub mod jws;
pub mod keys;
pub mod message;
pub mod pack;
pub mod prelude;
pub mod secrets;
pub mod types;
pub mod unpack;
pub mod utils;

#[cfg(test)]
pub(crate) mod tests;

pub use algorithms::{AnoncryptAlg, AuthcryptAlg, SignAlg};
pub use did::{CompositeDidResolver, DidDoc, DidResolver, StaticDidResolver, VerificationMethod};
pub use error::{Error, ErrorKind, Result};
pub use message::{Attachment, AttachmentData, Message, MessageProps};
pub use pack::{AnoncryptOpts, AnoncryptSignedOpts, AuthcryptOpts, MessagePacker, SignOpts};
pub use secrets::{CompositeSecretsResolver, DidSecrets, Secret, SecretsResolver, StaticSecretsResolver};
pub use types::{PackedMessage, PackingType};
pub use unpack::{MessageUnpacker, UnpackMetadata, UnpackOpts};
