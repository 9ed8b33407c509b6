//! Secrets resolution interface.
//!
//! Private key material is supplied by a [`SecretsResolver`]. The returned
//! [`DidSecrets`] mirrors the shape of a DID Document with private JWKs in
//! place of public ones.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{Error, ErrorKind, Result};
use crate::jwk::Jwk;

/// A private key bound to a key id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Secret {
    /// Key id (DID URL with fragment)
    pub id: String,
    /// The private key
    #[serde(rename = "privateKeyJwk")]
    pub private_key_jwk: Jwk,
}

/// Private keys held for one DID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DidSecrets {
    /// The DID
    pub did: String,

    /// Key agreement secrets in preference order
    #[serde(rename = "keyAgreement", default)]
    pub key_agreement: Vec<Secret>,

    /// Authentication secrets in preference order
    #[serde(default)]
    pub authentication: Vec<Secret>,
}

impl DidSecrets {
    /// Creates an empty secrets set for `did`.
    #[must_use]
    pub fn new(did: impl Into<String>) -> Self {
        Self {
            did: did.into(),
            key_agreement: Vec::new(),
            authentication: Vec::new(),
        }
    }

    /// All key agreement secrets.
    #[must_use]
    pub fn key_agreements(&self) -> &[Secret] {
        &self.key_agreement
    }

    /// The key agreement secret with id `kid`.
    #[must_use]
    pub fn key_agreement(&self, kid: &str) -> Option<&Secret> {
        self.key_agreement.iter().find(|s| s.id == kid)
    }

    /// All authentication secrets.
    #[must_use]
    pub fn authentications(&self) -> &[Secret] {
        &self.authentication
    }

    /// The authentication secret with id `kid`.
    #[must_use]
    pub fn authentication(&self, kid: &str) -> Option<&Secret> {
        self.authentication.iter().find(|s| s.id == kid)
    }
}

/// Resolves the private keys held locally for a DID.
#[async_trait]
pub trait SecretsResolver: Send + Sync {
    /// Resolves the secrets of `did`.
    ///
    /// # Errors
    /// - `Error::SecretNotFound` if no secrets are held for the DID
    /// - `Error::Io` if the secrets store failed
    async fn resolve(&self, did: &str) -> Result<DidSecrets>;
}

/// Tries several secrets resolvers in order.
///
/// A `SecretNotFound` from one resolver moves on to the next; any other error
/// is returned immediately.
#[derive(Clone, Default)]
pub struct CompositeSecretsResolver {
    resolvers: Vec<Arc<dyn SecretsResolver>>,
}

impl CompositeSecretsResolver {
    /// Creates a composite over `resolvers`.
    #[must_use]
    pub fn new(resolvers: Vec<Arc<dyn SecretsResolver>>) -> Self {
        Self { resolvers }
    }
}

#[async_trait]
impl SecretsResolver for CompositeSecretsResolver {
    async fn resolve(&self, did: &str) -> Result<DidSecrets> {
        for resolver in &self.resolvers {
            match resolver.resolve(did).await {
                Err(err) if err.kind() == ErrorKind::SecretNotFound => continue,
                result => return result,
            }
        }
        Err(Error::SecretNotFound(did.to_string()))
    }
}

/// In-memory secrets resolver.
#[derive(Debug, Clone, Default)]
pub struct StaticSecretsResolver {
    secrets: HashMap<String, DidSecrets>,
}

impl StaticSecretsResolver {
    /// Creates a resolver holding `secrets`.
    #[must_use]
    pub fn new(secrets: impl IntoIterator<Item = DidSecrets>) -> Self {
        Self {
            secrets: secrets.into_iter().map(|s| (s.did.clone(), s)).collect(),
        }
    }
}

#[async_trait]
impl SecretsResolver for StaticSecretsResolver {
    async fn resolve(&self, did: &str) -> Result<DidSecrets> {
        self.secrets
            .get(did)
            .cloned()
            .ok_or_else(|| Error::SecretNotFound(did.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jwk::Curve;

    fn secrets(did: &str) -> DidSecrets {
        DidSecrets {
            authentication: vec![Secret {
                id: format!("{did}#key-ed25519-1"),
                private_key_jwk: Jwk::generate(Curve::Ed25519),
            }],
            ..DidSecrets::new(did)
        }
    }

    #[test]
    fn test_accessors() {
        let secrets = secrets("did:example:alice");
        assert!(secrets.key_agreements().is_empty());
        assert_eq!(secrets.authentications().len(), 1);
        assert!(secrets.authentication("did:example:alice#key-ed25519-1").is_some());
        assert!(secrets.key_agreement("did:example:alice#key-ed25519-1").is_none());
    }

    #[test]
    fn test_debug_does_not_leak_private_key() {
        let secrets = secrets("did:example:alice");
        let d = secrets.authentication[0].private_key_jwk.d.clone().unwrap();
        assert!(!format!("{secrets:?}").contains(&d));
    }

    #[tokio::test]
    async fn test_composite_secrets_resolver() {
        let composite = CompositeSecretsResolver::new(vec![
            Arc::new(StaticSecretsResolver::new([secrets("did:example:alice")])),
            Arc::new(StaticSecretsResolver::new([secrets("did:example:bob")])),
        ]);

        assert_eq!(composite.resolve("did:example:bob").await.unwrap().did, "did:example:bob");

        let err = composite.resolve("did:example:carol").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SecretNotFound);
    }
}
