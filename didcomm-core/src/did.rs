//! DID resolution interface.
//!
//! The core never resolves DIDs itself. Callers supply a [`DidResolver`]
//! implementation; the core only reads key-agreement and authentication
//! verification methods from the returned [`DidDoc`].
//!
//! # Examples
//!
//! ```rust
//! use didcomm_core::did::{DidDoc, DidResolver, StaticDidResolver};
//!
//! # async fn example() -> didcomm_core::Result<()> {
//! let resolver = StaticDidResolver::new([DidDoc::new("did:example:alice")]);
//! let doc = resolver.resolve("did:example:alice").await?;
//! assert!(doc.key_agreements().is_empty());
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{Error, ErrorKind, Result};
use crate::jwk::Jwk;

/// A verification method carrying a public JWK.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationMethod {
    /// Key id (DID URL with fragment)
    pub id: String,
    /// Controlling DID
    pub controller: String,
    /// The public key
    #[serde(rename = "publicKeyJwk")]
    pub public_key_jwk: Jwk,
}

/// The parts of a DID Document the envelope layer consumes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DidDoc {
    /// The DID
    pub id: String,

    /// Key agreement methods in preference order
    #[serde(rename = "keyAgreement", default)]
    pub key_agreement: Vec<VerificationMethod>,

    /// Authentication methods in preference order
    #[serde(default)]
    pub authentication: Vec<VerificationMethod>,

    /// Mediator route keys
    #[serde(rename = "routeKeys", default)]
    pub route_keys: Vec<String>,
}

impl DidDoc {
    /// Creates an empty document for `did`.
    #[must_use]
    pub fn new(did: impl Into<String>) -> Self {
        Self {
            id: did.into(),
            key_agreement: Vec::new(),
            authentication: Vec::new(),
            route_keys: Vec::new(),
        }
    }

    /// All key agreement methods.
    #[must_use]
    pub fn key_agreements(&self) -> &[VerificationMethod] {
        &self.key_agreement
    }

    /// The key agreement method with id `kid`.
    #[must_use]
    pub fn key_agreement(&self, kid: &str) -> Option<&VerificationMethod> {
        self.key_agreement.iter().find(|vm| vm.id == kid)
    }

    /// All authentication methods.
    #[must_use]
    pub fn authentications(&self) -> &[VerificationMethod] {
        &self.authentication
    }

    /// The authentication method with id `kid`.
    #[must_use]
    pub fn authentication(&self, kid: &str) -> Option<&VerificationMethod> {
        self.authentication.iter().find(|vm| vm.id == kid)
    }

    /// Mediator route keys.
    #[must_use]
    pub fn route_keys(&self) -> &[String] {
        &self.route_keys
    }
}

/// Resolves DIDs to DID Documents.
#[async_trait]
pub trait DidResolver: Send + Sync {
    /// Resolves a DID to its DID Document.
    ///
    /// # Arguments
    /// * `did` - The DID to resolve (e.g., "did:example:123")
    ///
    /// # Errors
    /// - `Error::DidNotFound` if the DID is unknown
    /// - `Error::Io` if resolution failed for another reason
    async fn resolve(&self, did: &str) -> Result<DidDoc>;
}

/// Tries several resolvers in order.
///
/// A `DidNotFound` from one resolver moves on to the next; any other error
/// is returned immediately.
#[derive(Clone, Default)]
pub struct CompositeDidResolver {
    resolvers: Vec<Arc<dyn DidResolver>>,
}

impl CompositeDidResolver {
    /// Creates a composite over `resolvers`.
    #[must_use]
    pub fn new(resolvers: Vec<Arc<dyn DidResolver>>) -> Self {
        Self { resolvers }
    }
}

#[async_trait]
impl DidResolver for CompositeDidResolver {
    async fn resolve(&self, did: &str) -> Result<DidDoc> {
        for resolver in &self.resolvers {
            match resolver.resolve(did).await {
                Err(err) if err.kind() == ErrorKind::DidNotFound => continue,
                result => return result,
            }
        }
        Err(Error::DidNotFound(did.to_string()))
    }
}

/// In-memory resolver over a fixed set of documents.
#[derive(Debug, Clone, Default)]
pub struct StaticDidResolver {
    docs: HashMap<String, DidDoc>,
}

impl StaticDidResolver {
    /// Creates a resolver that knows `docs`.
    #[must_use]
    pub fn new(docs: impl IntoIterator<Item = DidDoc>) -> Self {
        Self {
            docs: docs.into_iter().map(|doc| (doc.id.clone(), doc)).collect(),
        }
    }
}

#[async_trait]
impl DidResolver for StaticDidResolver {
    async fn resolve(&self, did: &str) -> Result<DidDoc> {
        self.docs
            .get(did)
            .cloned()
            .ok_or_else(|| Error::DidNotFound(did.to_string()))
    }
}
