//! Key registry: turns DIDs into usable key material.
//!
//! The registry resolves public keys from DID Documents and private keys from
//! the secrets resolver, on every call. It never caches.
//!
//! Curve negotiation happens here as well: all recipients of one envelope
//! must share a key agreement curve, and for authcrypt the sender's static
//! key must be on that curve too.

use futures::future::try_join_all;
use std::sync::Arc;
use tracing::debug;

use crate::algorithms::SignAlg;
use crate::did::{DidResolver, VerificationMethod};
use crate::error::{Error, ErrorKind, Result};
use crate::jwe::EcdhCurve;
use crate::jwk::{Curve, Jwk};
use crate::secrets::{Secret, SecretsResolver};
use crate::utils::did_or_url;

/// What a resolved key may be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCapability {
    /// ECDH key agreement
    KeyAgreement,
    /// Signing
    Authentication,
}

/// A key resolved for one operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedKey {
    /// The controlling DID
    pub did: String,
    /// The key id (DID URL)
    pub kid: String,
    /// Public or private key material
    pub jwk: Jwk,
    /// Intended use
    pub capability: KeyCapability,
}

impl ResolvedKey {
    fn from_method(did: &str, vm: &VerificationMethod, capability: KeyCapability) -> Self {
        Self {
            did: did.to_string(),
            kid: vm.id.clone(),
            jwk: vm.public_key_jwk.clone(),
            capability,
        }
    }

    fn from_secret(did: &str, secret: &Secret, capability: KeyCapability) -> Self {
        Self {
            did: did.to_string(),
            kid: secret.id.clone(),
            jwk: secret.private_key_jwk.clone(),
            capability,
        }
    }

    /// The ECDH curve of this key, if it is a key agreement key.
    #[must_use]
    pub fn ecdh_curve(&self) -> Option<EcdhCurve> {
        self.jwk.crv.ecdh_curve()
    }
}

/// Resolves keys through the configured DID and secrets resolvers.
#[derive(Clone)]
pub struct KeyRegistry {
    did_resolver: Arc<dyn DidResolver>,
    secrets_resolver: Arc<dyn SecretsResolver>,
}

impl KeyRegistry {
    /// Creates a registry over the given resolvers.
    #[must_use]
    pub fn new(
        did_resolver: Arc<dyn DidResolver>,
        secrets_resolver: Arc<dyn SecretsResolver>,
    ) -> Self {
        Self {
            did_resolver,
            secrets_resolver,
        }
    }

    /// Resolves private key agreement keys for each DID or DID URL.
    ///
    /// A DID URL selects the single key it names; a bare DID yields all of the
    /// DID's key agreement secrets.
    ///
    /// # Errors
    ///
    /// Returns `Error::SecretNotFound` if any entry has no matching secret.
    pub async fn resolve_encryption_keys<S: AsRef<str>>(
        &self,
        dids: &[S],
    ) -> Result<Vec<ResolvedKey>> {
        let per_did = try_join_all(
            dids.iter()
                .map(|did| self.resolve_key_agreement_secrets(did.as_ref())),
        )
        .await?;
        Ok(per_did.into_iter().flatten().collect())
    }

    /// Resolves the private key agreement keys of an authcrypt sender.
    ///
    /// # Errors
    ///
    /// Returns `Error::SecretNotFound` if the sender holds no matching secret.
    pub async fn resolve_sender_key_agreement(&self, from: &str) -> Result<Vec<ResolvedKey>> {
        self.resolve_key_agreement_secrets(from).await
    }

    async fn resolve_key_agreement_secrets(&self, did_or_kid: &str) -> Result<Vec<ResolvedKey>> {
        let (did, kid) = did_or_url(did_or_kid);
        let secrets = self.secrets_resolver.resolve(did).await?;

        let keys: Vec<ResolvedKey> = match kid {
            Some(kid) => secrets
                .key_agreement(kid)
                .map(|s| ResolvedKey::from_secret(did, s, KeyCapability::KeyAgreement))
                .into_iter()
                .collect(),
            None => secrets
                .key_agreements()
                .iter()
                .map(|s| ResolvedKey::from_secret(did, s, KeyCapability::KeyAgreement))
                .collect(),
        };

        if keys.is_empty() {
            return Err(Error::SecretNotFound(format!(
                "No key agreement secret for {did_or_kid}"
            )));
        }
        Ok(keys)
    }

    /// Resolves the signing key for `did` (or the key a DID URL names).
    ///
    /// With `alg` set, the key must be on that algorithm's curve. Otherwise an
    /// Ed25519 key is preferred, then the first key on any signing curve.
    ///
    /// # Errors
    ///
    /// - `Error::SecretNotFound` if no authentication secret is held
    /// - `Error::NoCompatibleCrypto` if no key fits a supported algorithm
    pub async fn resolve_signing_key(
        &self,
        did_or_kid: &str,
        alg: Option<SignAlg>,
    ) -> Result<(ResolvedKey, SignAlg)> {
        let (did, kid) = did_or_url(did_or_kid);
        let secrets = self.secrets_resolver.resolve(did).await?;

        let candidates: Vec<&Secret> = match kid {
            Some(kid) => secrets.authentication(kid).into_iter().collect(),
            None => secrets.authentications().iter().collect(),
        };
        if candidates.is_empty() {
            return Err(Error::SecretNotFound(format!(
                "No authentication secret for {did_or_kid}"
            )));
        }

        let chosen = match alg {
            Some(alg) => candidates
                .iter()
                .find(|s| s.private_key_jwk.crv == alg.curve())
                .map(|s| (*s, alg)),
            None => candidates
                .iter()
                .find(|s| s.private_key_jwk.crv == Curve::Ed25519)
                .map(|s| (*s, SignAlg::EdDSA))
                .or_else(|| {
                    candidates.iter().find_map(|s| {
                        SignAlg::for_curve(s.private_key_jwk.crv).map(|alg| (*s, alg))
                    })
                }),
        };

        let (secret, alg) = chosen.ok_or_else(|| {
            Error::NoCompatibleCrypto(format!(
                "No authentication key of {did_or_kid} matches a supported signing algorithm"
            ))
        })?;

        debug!(kid = %secret.id, alg = %alg, "resolved signing key");
        Ok((
            ResolvedKey::from_secret(did, secret, KeyCapability::Authentication),
            alg,
        ))
    }

    /// Resolves the public key agreement keys of every recipient concurrently.
    ///
    /// The result holds one candidate list per recipient, in input order.
    ///
    /// # Errors
    ///
    /// Returns `Error::DidNotFound` if a DID (or named key) cannot be resolved.
    pub async fn resolve_recipient_keys<S: AsRef<str>>(
        &self,
        recipients: &[S],
    ) -> Result<Vec<Vec<ResolvedKey>>> {
        try_join_all(
            recipients
                .iter()
                .map(|recipient| self.resolve_public_key_agreement(recipient.as_ref())),
        )
        .await
    }

    async fn resolve_public_key_agreement(&self, did_or_kid: &str) -> Result<Vec<ResolvedKey>> {
        let (did, kid) = did_or_url(did_or_kid);
        let doc = self.did_resolver.resolve(did).await?;

        let keys: Vec<ResolvedKey> = match kid {
            Some(kid) => doc
                .key_agreement(kid)
                .map(|vm| ResolvedKey::from_method(did, vm, KeyCapability::KeyAgreement))
                .into_iter()
                .collect(),
            None => doc
                .key_agreements()
                .iter()
                .map(|vm| ResolvedKey::from_method(did, vm, KeyCapability::KeyAgreement))
                .collect(),
        };

        if keys.is_empty() {
            return Err(Error::DidNotFound(format!(
                "No key agreement key for {did_or_kid}"
            )));
        }
        Ok(keys)
    }

    /// Resolves the public key of an authcrypt sender from its `skid`.
    ///
    /// # Errors
    ///
    /// Returns `Error::DidNotFound` if the DID or the key is unknown.
    pub async fn resolve_sender_public_key(&self, skid: &str) -> Result<ResolvedKey> {
        let (did, _) = did_or_url(skid);
        let doc = self.did_resolver.resolve(did).await?;
        doc.key_agreement(skid)
            .map(|vm| ResolvedKey::from_method(did, vm, KeyCapability::KeyAgreement))
            .ok_or_else(|| Error::DidNotFound(format!("Sender key {skid} not found")))
    }

    /// Resolves the public authentication key `kid` of a signer.
    ///
    /// # Errors
    ///
    /// Returns `Error::DidNotFound` if the DID or the key is unknown.
    pub async fn resolve_verification_key(&self, kid: &str) -> Result<ResolvedKey> {
        let (did, _) = did_or_url(kid);
        let doc = self.did_resolver.resolve(did).await?;
        doc.authentication(kid)
            .map(|vm| ResolvedKey::from_method(did, vm, KeyCapability::Authentication))
            .ok_or_else(|| Error::DidNotFound(format!("Signing key {kid} not found")))
    }

    /// Looks up a locally held key agreement secret for `kid`.
    ///
    /// Returns `Ok(None)` when no secret is held; resolver failures other than
    /// not-found propagate.
    ///
    /// # Errors
    ///
    /// Returns the secrets resolver's error for anything but `SecretNotFound`.
    pub async fn find_decryption_key(&self, kid: &str) -> Result<Option<ResolvedKey>> {
        let (did, _) = did_or_url(kid);
        match self.secrets_resolver.resolve(did).await {
            Ok(secrets) => Ok(secrets
                .key_agreement(kid)
                .map(|s| ResolvedKey::from_secret(did, s, KeyCapability::KeyAgreement))),
            Err(err) if err.kind() == ErrorKind::SecretNotFound => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Whether any secrets are held locally for `did`.
    ///
    /// # Errors
    ///
    /// Returns the secrets resolver's error for anything but `SecretNotFound`.
    pub async fn has_secrets(&self, did: &str) -> Result<bool> {
        match self.secrets_resolver.resolve(did).await {
            Ok(secrets) => Ok(!secrets.key_agreements().is_empty()),
            Err(err) if err.kind() == ErrorKind::SecretNotFound => Ok(false),
            Err(err) => Err(err),
        }
    }
}

/// Picks a curve all recipients share and the keys to encrypt to.
///
/// The first recipient's key order is the curve preference order. Every key
/// each recipient holds on the chosen curve is returned.
///
/// # Errors
///
/// Returns `Error::NoCompatibleCrypto` if the recipients share no curve.
pub fn select_anoncrypt_keys(
    recipients: &[Vec<ResolvedKey>],
) -> Result<(EcdhCurve, Vec<ResolvedKey>)> {
    let preferred = recipients
        .first()
        .map(|keys| keys.iter().filter_map(ResolvedKey::ecdh_curve).collect::<Vec<_>>())
        .unwrap_or_default();

    let curve = preferred
        .into_iter()
        .find(|curve| all_support(recipients, *curve))
        .ok_or_else(|| {
            Error::NoCompatibleCrypto("Recipients share no key agreement curve".to_string())
        })?;

    debug!(%curve, "selected anoncrypt curve");
    Ok((curve, keys_on_curve(recipients, curve)))
}

/// Picks the sender key and the recipient keys for authcrypt.
///
/// The first sender key whose curve every recipient supports wins.
///
/// # Errors
///
/// Returns `Error::NoCompatibleCrypto` if no sender key fits all recipients.
pub fn select_authcrypt_keys(
    sender_keys: &[ResolvedKey],
    recipients: &[Vec<ResolvedKey>],
) -> Result<(ResolvedKey, EcdhCurve, Vec<ResolvedKey>)> {
    let (sender, curve) = sender_keys
        .iter()
        .find_map(|key| {
            key.ecdh_curve()
                .filter(|curve| all_support(recipients, *curve))
                .map(|curve| (key, curve))
        })
        .ok_or_else(|| {
            Error::NoCompatibleCrypto(
                "No sender key agreement key matches the recipients' curves".to_string(),
            )
        })?;

    debug!(skid = %sender.kid, %curve, "selected authcrypt sender key");
    Ok((sender.clone(), curve, keys_on_curve(recipients, curve)))
}

fn all_support(recipients: &[Vec<ResolvedKey>], curve: EcdhCurve) -> bool {
    !recipients.is_empty()
        && recipients
            .iter()
            .all(|keys| keys.iter().any(|k| k.ecdh_curve() == Some(curve)))
}

fn keys_on_curve(recipients: &[Vec<ResolvedKey>], curve: EcdhCurve) -> Vec<ResolvedKey> {
    recipients
        .iter()
        .flatten()
        .filter(|k| k.ecdh_curve() == Some(curve))
        .cloned()
        .collect()
}
