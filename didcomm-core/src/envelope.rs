//! Envelope classification.
//!
//! An incoming string is one of three shapes: a JWE (`ciphertext` and
//! `recipients`), a JWS (`signatures`), or a plaintext message.

use std::collections::HashSet;

use serde_json::Value;

use crate::error::{Error, Result};
use crate::jwe::JweMessage;
use crate::jws::JwsMessage;
use crate::message::Message;

/// A parsed envelope layer.
#[derive(Debug, Clone)]
pub enum Envelope {
    /// JWE general JSON serialization
    Encrypted(JweMessage),
    /// JWS general JSON serialization
    Signed(JwsMessage),
    /// Plaintext message
    Plain(Message),
}

impl Envelope {
    /// Classifies and parses `data` by its shape.
    ///
    /// # Errors
    ///
    /// Returns `Error::Parse` if the input is not a JSON object, does not
    /// match the shape it claims, or is a JWE listing a recipient `kid` twice.
    pub fn parse(data: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(data)?;
        let Value::Object(object) = &value else {
            return Err(Error::Parse("Envelope must be a JSON object".to_string()));
        };

        if object.contains_key("signatures") {
            let jws: JwsMessage = serde_json::from_value(value)
                .map_err(|e| Error::Parse(format!("Malformed JWS: {e}")))?;
            if jws.signatures.is_empty() {
                return Err(Error::Parse("JWS has no signatures".to_string()));
            }
            return Ok(Self::Signed(jws));
        }

        if object.contains_key("ciphertext") || object.contains_key("recipients") {
            let jwe: JweMessage = serde_json::from_value(value)
                .map_err(|e| Error::Parse(format!("Malformed JWE: {e}")))?;
            if jwe.recipients.is_empty() {
                return Err(Error::Parse("JWE has no recipients".to_string()));
            }
            let mut kids = HashSet::new();
            if let Some(kid) = jwe.recipient_kids().find(|kid| !kids.insert(*kid)) {
                return Err(Error::Parse(format!("JWE lists recipient {kid} more than once")));
            }
            return Ok(Self::Encrypted(jwe));
        }

        Message::parse(data).map(Self::Plain)
    }

    /// Short name of the layer, for logs and error messages.
    #[must_use]
    pub fn layer_name(&self) -> &'static str {
        match self {
            Self::Encrypted(_) => "encrypted",
            Self::Signed(_) => "signed",
            Self::Plain(_) => "plaintext",
        }
    }
}
