//! Packing result types.

use serde::{Deserialize, Serialize};

/// The kind of envelope produced by a pack operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PackingType {
    /// Signed, not encrypted
    #[default]
    Signed,
    /// Authenticated encryption with sender identity
    Authcrypt,
    /// Anonymous encryption without sender identity
    Anoncrypt,
    /// Signed, then anonymously encrypted
    AnoncryptSigned,
}

/// A packed `DIDComm` envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackedMessage {
    /// The envelope JSON.
    pub data: String,
    /// The type of packing used.
    pub packing: PackingType,
    /// Sender key agreement key id (authcrypt only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_kid: Option<String>,
    /// Signing key id (signed modes only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sign_by_kid: Option<String>,
    /// Every recipient key id the content key was wrapped for.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub to_kids: Vec<String>,
}
