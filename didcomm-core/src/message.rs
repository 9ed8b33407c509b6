//! DIDComm plaintext message model.
//!
//! A [`Message`] is built once from [`MessageProps`] (or parsed from its
//! plaintext form) and is immutable afterwards. Its serialized form is
//! canonical: headers are always emitted in a fixed order with custom headers
//! in insertion order, so a signature computed over [`Message::as_plain`]
//! verifies against the same bytes on the receiving side.
//!
//! # Examples
//!
//! ```rust
//! use didcomm_core::message::{Message, MessageProps};
//! use serde_json::json;
//!
//! let message = Message::build(MessageProps {
//!     id: Some("1234567890".into()),
//!     type_: Some("https://example.com/protocols/lets_do_lunch/1.0/proposal".into()),
//!     from: Some("did:example:alice".into()),
//!     to: Some(vec!["did:example:bob".into()]),
//!     body: Some(json!({"messagespecificattribute": "and its value"})),
//!     ..MessageProps::default()
//! })
//! .unwrap();
//!
//! let plain = message.as_plain().unwrap();
//! assert_eq!(Message::parse(&plain).unwrap(), message);
//! ```

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::fmt;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::utils::validate_did;

/// Media type of a plaintext DIDComm message.
pub const PLAINTEXT_MESSAGE_TYPE: &str = "application/didcomm-plain+json";

/// Message type URI of routing forward messages.
pub const FORWARD_MESSAGE_TYPE: &str = "https://didcomm.org/routing/2.0/forward";

/// Header names owned by the message schema.
const RESERVED_HEADERS: [&str; 9] = [
    "id",
    "typ",
    "type",
    "from",
    "to",
    "created_time",
    "expires_time",
    "body",
    "attachments",
];

/// Properties a [`Message`] is built from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageProps {
    /// Message id, unique to the sender
    pub id: Option<String>,
    /// Message type URI
    pub type_: Option<String>,
    /// Sender DID (no fragment)
    pub from: Option<String>,
    /// Recipient DIDs (no fragments)
    pub to: Option<Vec<String>>,
    /// Creation time, UNIX epoch seconds
    pub created_time: Option<u64>,
    /// Expiry time, UNIX epoch seconds
    pub expires_time: Option<u64>,
    /// Custom headers in emission order
    pub custom_headers: Vec<(String, Value)>,
    /// Application-specific body; defaults to an empty object
    pub body: Option<Value>,
    /// Attachments
    pub attachments: Vec<AttachmentProps>,
}

/// Raw attachment data as it appears on the wire.
///
/// Exactly one of `base64`, `json` or `links` must be set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttachmentDataProps {
    /// Base64url-encoded content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base64: Option<String>,
    /// Inline JSON content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json: Option<Value>,
    /// Links to external content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub links: Option<Vec<String>>,
    /// JWS over the content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jws: Option<Value>,
    /// Hash of the content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
}

/// Validated attachment data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "AttachmentDataProps", into = "AttachmentDataProps")]
pub enum AttachmentData {
    /// Base64url-encoded content
    Base64 {
        /// The content
        base64: String,
        /// Optional JWS over the content
        jws: Option<Value>,
        /// Optional content hash
        hash: Option<String>,
    },
    /// Inline JSON content
    Json {
        /// The content
        json: Value,
        /// Optional JWS over the content
        jws: Option<Value>,
        /// Optional content hash
        hash: Option<String>,
    },
    /// Externally hosted content
    Links {
        /// Where the content can be fetched
        links: Vec<String>,
        /// Mandatory content hash
        hash: String,
        /// Optional JWS over the content
        jws: Option<Value>,
    },
}

impl TryFrom<AttachmentDataProps> for AttachmentData {
    type Error = Error;

    fn try_from(props: AttachmentDataProps) -> Result<Self> {
        let AttachmentDataProps {
            base64,
            json,
            links,
            jws,
            hash,
        } = props;

        match (base64, json, links) {
            (Some(base64), None, None) => Ok(Self::Base64 { base64, jws, hash }),
            (None, Some(json), None) => Ok(Self::Json { json, jws, hash }),
            (None, None, Some(links)) => {
                let hash = hash.ok_or_else(|| {
                    Error::Validation("Links attachment data requires a hash".to_string())
                })?;
                Ok(Self::Links { links, hash, jws })
            }
            (None, None, None) => Err(Error::Validation(
                "Attachment data has no content variant".to_string(),
            )),
            _ => Err(Error::Validation(
                "Attachment data has more than one content variant".to_string(),
            )),
        }
    }
}

impl From<AttachmentData> for AttachmentDataProps {
    fn from(data: AttachmentData) -> Self {
        match data {
            AttachmentData::Base64 { base64, jws, hash } => Self {
                base64: Some(base64),
                jws,
                hash,
                ..Self::default()
            },
            AttachmentData::Json { json, jws, hash } => Self {
                json: Some(json),
                jws,
                hash,
                ..Self::default()
            },
            AttachmentData::Links { links, hash, jws } => Self {
                links: Some(links),
                jws,
                hash: Some(hash),
                ..Self::default()
            },
        }
    }
}

/// Properties an [`Attachment`] is built from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttachmentProps {
    /// Attachment id, unique within the message
    pub id: Option<String>,
    /// Human readable description
    pub description: Option<String>,
    /// File name hint
    pub filename: Option<String>,
    /// Media type of the content
    pub media_type: Option<String>,
    /// Format of the content
    pub format: Option<String>,
    /// Last modification time, UNIX epoch seconds
    pub lastmod_time: Option<u64>,
    /// Content size in bytes
    pub byte_count: Option<u64>,
    /// The content
    pub data: AttachmentDataProps,
}

/// A message attachment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    /// Attachment id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Human readable description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// File name hint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    /// Media type of the content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    /// Format of the content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    /// Last modification time, UNIX epoch seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lastmod_time: Option<u64>,
    /// Content size in bytes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub byte_count: Option<u64>,
    /// The content
    pub data: AttachmentData,
}

impl TryFrom<AttachmentProps> for Attachment {
    type Error = Error;

    fn try_from(props: AttachmentProps) -> Result<Self> {
        Ok(Self {
            id: props.id,
            description: props.description,
            filename: props.filename,
            media_type: props.media_type,
            format: props.format,
            lastmod_time: props.lastmod_time,
            byte_count: props.byte_count,
            data: props.data.try_into()?,
        })
    }
}

/// A DIDComm plaintext message.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    id: String,
    type_: String,
    from: Option<String>,
    to: Option<Vec<String>>,
    created_time: Option<u64>,
    expires_time: Option<u64>,
    custom_headers: Vec<(String, Value)>,
    body: Value,
    attachments: Vec<Attachment>,
}

impl Message {
    /// Builds a message from its properties.
    ///
    /// # Errors
    ///
    /// Returns `Error::Validation` if a required property is missing or any
    /// property is malformed.
    pub fn build(props: MessageProps) -> Result<Self> {
        let attachments = props
            .attachments
            .into_iter()
            .map(Attachment::try_from)
            .collect::<Result<Vec<_>>>()?;

        let message = Self {
            id: props
                .id
                .ok_or_else(|| Error::Validation("Message id is required".to_string()))?,
            type_: props
                .type_
                .ok_or_else(|| Error::Validation("Message type is required".to_string()))?,
            from: props.from,
            to: props.to,
            created_time: props.created_time,
            expires_time: props.expires_time,
            custom_headers: props.custom_headers,
            body: props.body.unwrap_or_else(|| json!({})),
            attachments,
        };
        message.validate()?;
        Ok(message)
    }

    /// Parses a message from its plaintext JSON form.
    ///
    /// # Errors
    ///
    /// Returns `Error::Parse` on malformed JSON or a structurally invalid message.
    pub fn parse(plaintext: &str) -> Result<Self> {
        Ok(serde_json::from_str(plaintext)?)
    }

    /// Builds a routing forward message carrying `envelope` for `next`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Validation` if `next` is not a DID, or `Error::Parse` if
    /// `envelope` is not JSON.
    pub fn forward(next: &str, envelope: &str) -> Result<Self> {
        validate_did(next)?;
        let envelope: Value = serde_json::from_str(envelope)?;
        Self::build(MessageProps {
            id: Some(Uuid::new_v4().to_string()),
            type_: Some(FORWARD_MESSAGE_TYPE.to_string()),
            body: Some(json!({ "next": next })),
            attachments: vec![AttachmentProps {
                id: Some(Uuid::new_v4().to_string()),
                media_type: Some("application/json".to_string()),
                data: AttachmentDataProps {
                    json: Some(envelope),
                    ..AttachmentDataProps::default()
                },
                ..AttachmentProps::default()
            }],
            ..MessageProps::default()
        })
    }

    /// Whether this is a routing forward message.
    #[must_use]
    pub fn is_forward(&self) -> bool {
        self.type_ == FORWARD_MESSAGE_TYPE
    }

    /// Extracts `(next, inner envelope)` from a forward message.
    ///
    /// Returns `Ok(None)` for any other message type.
    ///
    /// # Errors
    ///
    /// Returns `Error::Parse` if the message claims to be a forward message but
    /// lacks a `next` DID or a single inline attachment.
    pub fn forward_payload(&self) -> Result<Option<(String, String)>> {
        if !self.is_forward() {
            return Ok(None);
        }

        let next = self
            .body
            .get("next")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::Parse("Forward message body has no next".to_string()))?;

        let [attachment] = self.attachments.as_slice() else {
            return Err(Error::Parse(
                "Forward message must carry exactly one attachment".to_string(),
            ));
        };

        let inner = match &attachment.data {
            AttachmentData::Json { json, .. } => serde_json::to_string(json)?,
            AttachmentData::Base64 { base64, .. } => {
                String::from_utf8(URL_SAFE_NO_PAD.decode(base64)?).map_err(|e| {
                    Error::Parse(format!("Forwarded envelope is not UTF-8: {e}"))
                })?
            }
            AttachmentData::Links { .. } => {
                return Err(Error::Parse(
                    "Forwarded envelope must be attached inline".to_string(),
                ))
            }
        };

        Ok(Some((next.to_string(), inner)))
    }

    /// Message id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Message type URI.
    #[must_use]
    pub fn type_(&self) -> &str {
        &self.type_
    }

    /// Sender DID.
    #[must_use]
    pub fn from(&self) -> Option<&str> {
        self.from.as_deref()
    }

    /// Recipient DIDs.
    #[must_use]
    pub fn to(&self) -> Option<&[String]> {
        self.to.as_deref()
    }

    /// Creation time, UNIX epoch seconds.
    #[must_use]
    pub fn created_time(&self) -> Option<u64> {
        self.created_time
    }

    /// Expiry time, UNIX epoch seconds.
    #[must_use]
    pub fn expires_time(&self) -> Option<u64> {
        self.expires_time
    }

    /// Custom headers in insertion order.
    #[must_use]
    pub fn custom_headers(&self) -> &[(String, Value)] {
        &self.custom_headers
    }

    /// All headers (everything except `body` and `attachments`) in canonical order.
    #[must_use]
    pub fn headers(&self) -> Vec<(String, Value)> {
        let mut headers = vec![
            ("id".to_string(), json!(self.id)),
            ("typ".to_string(), json!(PLAINTEXT_MESSAGE_TYPE)),
            ("type".to_string(), json!(self.type_)),
        ];
        if let Some(from) = &self.from {
            headers.push(("from".to_string(), json!(from)));
        }
        if let Some(to) = &self.to {
            headers.push(("to".to_string(), json!(to)));
        }
        if let Some(created_time) = self.created_time {
            headers.push(("created_time".to_string(), json!(created_time)));
        }
        if let Some(expires_time) = self.expires_time {
            headers.push(("expires_time".to_string(), json!(expires_time)));
        }
        headers.extend(self.custom_headers.iter().cloned());
        headers
    }

    /// Message body.
    #[must_use]
    pub fn body(&self) -> &Value {
        &self.body
    }

    /// Attachments.
    #[must_use]
    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }

    /// Canonical plaintext JSON form.
    ///
    /// # Errors
    ///
    /// Returns `Error::Parse` if serialization fails.
    pub fn as_plain(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(Error::Validation("Message id must not be empty".to_string()));
        }
        if self.type_.is_empty() {
            return Err(Error::Validation("Message type must not be empty".to_string()));
        }

        if let Some(from) = &self.from {
            validate_did(from)?;
        }

        if let Some(to) = &self.to {
            if to.is_empty() {
                return Err(Error::Validation("Message to must not be empty".to_string()));
            }
            let mut seen = HashSet::new();
            for did in to {
                validate_did(did)?;
                if !seen.insert(did.as_str()) {
                    return Err(Error::Validation(format!("Duplicate recipient {did}")));
                }
            }
        }

        for (name, _) in &self.custom_headers {
            if name.is_empty() || RESERVED_HEADERS.contains(&name.as_str()) {
                return Err(Error::Validation(format!(
                    "Invalid custom header name: {name:?}"
                )));
            }
        }

        if !self.body.is_object() {
            return Err(Error::Validation("Message body must be an object".to_string()));
        }

        let mut ids = HashSet::new();
        for id in self.attachments.iter().filter_map(|a| a.id.as_deref()) {
            if !ids.insert(id) {
                return Err(Error::Validation(format!("Duplicate attachment id {id}")));
            }
        }

        Ok(())
    }
}

impl Serialize for Message {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("id", &self.id)?;
        map.serialize_entry("typ", PLAINTEXT_MESSAGE_TYPE)?;
        map.serialize_entry("type", &self.type_)?;
        if let Some(from) = &self.from {
            map.serialize_entry("from", from)?;
        }
        if let Some(to) = &self.to {
            map.serialize_entry("to", to)?;
        }
        if let Some(created_time) = &self.created_time {
            map.serialize_entry("created_time", created_time)?;
        }
        if let Some(expires_time) = &self.expires_time {
            map.serialize_entry("expires_time", expires_time)?;
        }
        for (name, value) in &self.custom_headers {
            map.serialize_entry(name, value)?;
        }
        map.serialize_entry("body", &self.body)?;
        if !self.attachments.is_empty() {
            map.serialize_entry("attachments", &self.attachments)?;
        }
        map.end()
    }
}

/// `to` may be a single DID or a list.
#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

struct MessageVisitor;

impl<'de> Visitor<'de> for MessageVisitor {
    type Value = Message;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a DIDComm plaintext message object")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<Message, A::Error> {
        let mut id = None;
        let mut typ: Option<String> = None;
        let mut type_ = None;
        let mut from = None;
        let mut to = None;
        let mut created_time = None;
        let mut expires_time = None;
        let mut body = None;
        let mut attachments = None;
        let mut custom_headers = Vec::new();

        macro_rules! set_once {
            ($slot:ident, $value:expr, $name:literal) => {{
                if $slot.is_some() {
                    return Err(de::Error::duplicate_field($name));
                }
                $slot = Some($value);
            }};
        }

        while let Some(key) = map.next_key::<String>()? {
            match key.as_str() {
                "id" => set_once!(id, map.next_value::<String>()?, "id"),
                "typ" => set_once!(typ, map.next_value::<String>()?, "typ"),
                "type" => set_once!(type_, map.next_value::<String>()?, "type"),
                "from" => set_once!(from, map.next_value::<String>()?, "from"),
                "to" => {
                    let value = match map.next_value::<OneOrMany>()? {
                        OneOrMany::One(did) => vec![did],
                        OneOrMany::Many(dids) => dids,
                    };
                    set_once!(to, value, "to");
                }
                "created_time" => set_once!(created_time, map.next_value::<u64>()?, "created_time"),
                "expires_time" => set_once!(expires_time, map.next_value::<u64>()?, "expires_time"),
                "body" => set_once!(body, map.next_value::<Value>()?, "body"),
                "attachments" => {
                    set_once!(attachments, map.next_value::<Vec<Attachment>>()?, "attachments");
                }
                _ => custom_headers.push((key, map.next_value::<Value>()?)),
            }
        }

        if let Some(typ) = typ {
            if typ != PLAINTEXT_MESSAGE_TYPE {
                return Err(de::Error::invalid_value(
                    de::Unexpected::Str(&typ),
                    &PLAINTEXT_MESSAGE_TYPE,
                ));
            }
        }

        let message = Message {
            id: id.ok_or_else(|| de::Error::missing_field("id"))?,
            type_: type_.ok_or_else(|| de::Error::missing_field("type"))?,
            from,
            to,
            created_time,
            expires_time,
            custom_headers,
            body: body.ok_or_else(|| de::Error::missing_field("body"))?,
            attachments: attachments.unwrap_or_default(),
        };
        message.validate().map_err(de::Error::custom)?;
        Ok(message)
    }
}

impl<'de> Deserialize<'de> for Message {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_map(MessageVisitor)
    }
}
