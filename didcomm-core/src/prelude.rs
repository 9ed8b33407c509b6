//! Prelude module for commonly used types and traits.
//!
//! Import everything from this module with `use didcomm_core::prelude::*`.
//!
//! # Example
//!
//! ```rust
//! use didcomm_core::prelude::*;
//!
//! async fn example(packer: &MessagePacker, message: &Message) -> Result<PackedMessage> {
//!     packer.anoncrypt(message, &AnoncryptOpts::default()).await
//! }
//! ```

// Re-export error types
pub use crate::error::{Error, ErrorKind, Result};

// Re-export resolver traits
pub use crate::did::{DidDoc, DidResolver, VerificationMethod};
pub use crate::secrets::{DidSecrets, Secret, SecretsResolver};

// Re-export message types
pub use crate::message::{Attachment, AttachmentData, AttachmentProps, Message, MessageProps};
pub use crate::types::{PackedMessage, PackingType};

// Re-export algorithm suites and keys
pub use crate::algorithms::{AnoncryptAlg, AuthcryptAlg, SignAlg};
pub use crate::jwk::{Curve, Jwk};

// Re-export the pipeline
pub use crate::pack::{AnoncryptOpts, AnoncryptSignedOpts, AuthcryptOpts, MessagePacker, SignOpts};
pub use crate::unpack::{MessageUnpacker, UnpackMetadata, UnpackOpts};
