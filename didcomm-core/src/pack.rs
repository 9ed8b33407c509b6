//! Message packing.
//!
//! [`MessagePacker`] turns a [`Message`] into an authcrypt, anoncrypt,
//! anoncrypt-of-signed or signed envelope. All key material is resolved through
//! the [`KeyRegistry`] on each call.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::debug;

use crate::algorithms::{AnoncryptAlg, AuthcryptAlg, SignAlg};
use crate::did::DidResolver;
use crate::error::{Error, Result};
use crate::jwe::{EcdhCurve, JweMessage, RecipientKey, SenderKey};
use crate::jws::JwsMessage;
use crate::keys::{select_anoncrypt_keys, select_authcrypt_keys, KeyRegistry, ResolvedKey};
use crate::message::Message;
use crate::secrets::SecretsResolver;
use crate::types::{PackedMessage, PackingType};
use crate::utils::{did_or_url, validate_did};

/// Options for [`MessagePacker::authcrypt`].
#[derive(Debug, Clone, Default)]
pub struct AuthcryptOpts {
    /// Sender DID or key id; defaults to the message's `from`
    pub from: Option<String>,
    /// Recipient DIDs or key ids; default to the message's `to`
    pub to: Option<Vec<String>>,
    /// Encryption suite
    pub alg: AuthcryptAlg,
}

/// Options for [`MessagePacker::anoncrypt`].
#[derive(Debug, Clone, Default)]
pub struct AnoncryptOpts {
    /// Recipient DIDs or key ids; default to the message's `to`
    pub to: Option<Vec<String>>,
    /// Encryption suite
    pub alg: AnoncryptAlg,
}

/// Options for [`MessagePacker::anoncrypt_signed`].
#[derive(Debug, Clone, Default)]
pub struct AnoncryptSignedOpts {
    /// Signer DID or key id; defaults to the message's `from`
    pub from: Option<String>,
    /// Recipient DIDs or key ids; default to the message's `to`
    pub to: Option<Vec<String>>,
    /// Encryption suite
    pub anoncrypt_alg: AnoncryptAlg,
    /// Signature algorithm; chosen from the signer's keys when unset
    pub sign_alg: Option<SignAlg>,
}

/// Options for [`MessagePacker::sign`].
#[derive(Debug, Clone, Default)]
pub struct SignOpts {
    /// Signer DID or key id; defaults to the message's `from`
    pub from: Option<String>,
    /// Signature algorithm; chosen from the signer's keys when unset
    pub alg: Option<SignAlg>,
}

/// Packs messages into `DIDComm` envelopes.
#[derive(Clone)]
pub struct MessagePacker {
    registry: KeyRegistry,
}

impl MessagePacker {
    /// Creates a packer over the given resolvers.
    #[must_use]
    pub fn new(
        did_resolver: Arc<dyn DidResolver>,
        secrets_resolver: Arc<dyn SecretsResolver>,
    ) -> Self {
        Self {
            registry: KeyRegistry::new(did_resolver, secrets_resolver),
        }
    }

    /// Packs `message` with authenticated encryption (ECDH-1PU).
    ///
    /// # Errors
    ///
    /// - `Error::InvalidState` if there is no sender or no recipient
    /// - `Error::DidNotFound` / `Error::SecretNotFound` if keys cannot be resolved
    /// - `Error::NoCompatibleCrypto` if sender and recipients share no curve
    pub async fn authcrypt(&self, message: &Message, opts: &AuthcryptOpts) -> Result<PackedMessage> {
        let from = sender(message, opts.from.as_deref(), "authcrypt")?;
        let to = recipients(message, opts.to.as_deref(), "authcrypt")?;

        let (sender_keys, recipient_keys) = futures::try_join!(
            self.registry.resolve_sender_key_agreement(from),
            self.registry.resolve_recipient_keys(&to),
        )?;
        let (sender_key, curve, keys) = select_authcrypt_keys(&sender_keys, &recipient_keys)?;

        let plaintext = message.as_plain()?;
        let sender_private = sender_key.jwk.private_key_bytes()?;
        let public_keys = public_key_material(&keys)?;
        let jwe = JweMessage::encrypt_authcrypt(
            plaintext.as_bytes(),
            curve,
            SenderKey {
                kid: &sender_key.kid,
                private_key: &sender_private,
            },
            &recipient_keys_of(&public_keys),
            opts.alg.content_encryption(),
        )?;

        debug!(
            id = message.id(),
            skid = %sender_key.kid,
            recipients = keys.len(),
            %curve,
            "packed authcrypt message"
        );

        Ok(PackedMessage {
            data: serde_json::to_string(&jwe)?,
            packing: PackingType::Authcrypt,
            from_kid: Some(sender_key.kid),
            sign_by_kid: None,
            to_kids: keys.into_iter().map(|k| k.kid).collect(),
        })
    }

    /// Packs `message` with anonymous encryption (ECDH-ES).
    ///
    /// # Errors
    ///
    /// - `Error::InvalidState` if there is no recipient
    /// - `Error::DidNotFound` if a recipient cannot be resolved
    /// - `Error::NoCompatibleCrypto` if the recipients share no curve
    pub async fn anoncrypt(&self, message: &Message, opts: &AnoncryptOpts) -> Result<PackedMessage> {
        let to = recipients(message, opts.to.as_deref(), "anoncrypt")?;
        let plaintext = message.as_plain()?;
        let (data, to_kids) = self.encrypt_anonymously(&plaintext, &to, opts.alg).await?;

        debug!(id = message.id(), recipients = to_kids.len(), "packed anoncrypt message");

        Ok(PackedMessage {
            data,
            packing: PackingType::Anoncrypt,
            from_kid: None,
            sign_by_kid: None,
            to_kids,
        })
    }

    /// Signs `message`, then anonymously encrypts the signed envelope.
    ///
    /// # Errors
    ///
    /// Fails as [`MessagePacker::sign`] and [`MessagePacker::anoncrypt`] do.
    pub async fn anoncrypt_signed(
        &self,
        message: &Message,
        opts: &AnoncryptSignedOpts,
    ) -> Result<PackedMessage> {
        let from = sender(message, opts.from.as_deref(), "anoncrypt_signed")?;
        let to = recipients(message, opts.to.as_deref(), "anoncrypt_signed")?;

        let (jws, sign_kid) = self.sign_plaintext(message, from, opts.sign_alg).await?;
        let (data, to_kids) = self
            .encrypt_anonymously(&jws, &to, opts.anoncrypt_alg)
            .await?;

        debug!(
            id = message.id(),
            kid = %sign_kid,
            recipients = to_kids.len(),
            "packed anoncrypt of signed message"
        );

        Ok(PackedMessage {
            data,
            packing: PackingType::AnoncryptSigned,
            from_kid: None,
            sign_by_kid: Some(sign_kid),
            to_kids,
        })
    }

    /// Signs `message` without encrypting it.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidState` if there is no signer
    /// - `Error::SecretNotFound` if the signer holds no authentication secret
    /// - `Error::NoCompatibleCrypto` if no signing key fits the algorithm
    pub async fn sign(&self, message: &Message, opts: &SignOpts) -> Result<PackedMessage> {
        let from = sender(message, opts.from.as_deref(), "sign")?;
        let (data, sign_kid) = self.sign_plaintext(message, from, opts.alg).await?;

        debug!(id = message.id(), kid = %sign_kid, "packed signed message");

        Ok(PackedMessage {
            data,
            packing: PackingType::Signed,
            from_kid: None,
            sign_by_kid: Some(sign_kid),
            to_kids: Vec::new(),
        })
    }

    /// Wraps an envelope in a forward message for `next` and anoncrypts it to
    /// `mediators`.
    ///
    /// # Errors
    ///
    /// - `Error::Validation` if `next` is not a DID
    /// - `Error::Parse` if `envelope` is not JSON
    /// - `Error::InvalidState` if `mediators` is empty
    /// - any error of [`MessagePacker::anoncrypt`]
    pub async fn wrap_in_forward(
        &self,
        envelope: &str,
        next: &str,
        mediators: &[String],
        alg: AnoncryptAlg,
    ) -> Result<PackedMessage> {
        let forward = Message::forward(next, envelope)?;
        let to = recipients(&forward, Some(mediators), "forward")?;
        let (data, to_kids) = self
            .encrypt_anonymously(&forward.as_plain()?, &to, alg)
            .await?;

        debug!(id = forward.id(), next, mediators = to.len(), "wrapped envelope in forward");

        Ok(PackedMessage {
            data,
            packing: PackingType::Anoncrypt,
            from_kid: None,
            sign_by_kid: None,
            to_kids,
        })
    }

    async fn sign_plaintext(
        &self,
        message: &Message,
        from: &str,
        alg: Option<SignAlg>,
    ) -> Result<(String, String)> {
        let (key, alg) = self.registry.resolve_signing_key(from, alg).await?;
        let plaintext = message.as_plain()?;
        let jws = JwsMessage::sign(plaintext.as_bytes(), &key.kid, alg, &key.jwk)?;
        Ok((serde_json::to_string(&jws)?, key.kid))
    }

    async fn encrypt_anonymously(
        &self,
        plaintext: &str,
        to: &[String],
        alg: AnoncryptAlg,
    ) -> Result<(String, Vec<String>)> {
        let recipient_keys = self.registry.resolve_recipient_keys(to).await?;
        let (curve, keys) = select_anoncrypt_keys(&recipient_keys)?;
        let jwe = encrypt_anoncrypt(plaintext.as_bytes(), curve, &keys, alg)?;
        Ok((
            serde_json::to_string(&jwe)?,
            keys.into_iter().map(|k| k.kid).collect(),
        ))
    }
}

fn encrypt_anoncrypt(
    plaintext: &[u8],
    curve: EcdhCurve,
    keys: &[ResolvedKey],
    alg: AnoncryptAlg,
) -> Result<JweMessage> {
    let public_keys = public_key_material(keys)?;
    Ok(JweMessage::encrypt_anoncrypt(
        plaintext,
        curve,
        &recipient_keys_of(&public_keys),
        alg.content_encryption(),
    )?)
}

fn public_key_material(keys: &[ResolvedKey]) -> Result<Vec<(&str, Vec<u8>)>> {
    keys.iter()
        .map(|k| Ok::<_, Error>((k.kid.as_str(), k.jwk.public_key_bytes()?)))
        .collect()
}

fn recipient_keys_of<'a>(material: &'a [(&'a str, Vec<u8>)]) -> Vec<RecipientKey<'a>> {
    material
        .iter()
        .map(|(kid, public_key)| RecipientKey {
            kid,
            public_key,
        })
        .collect()
}

/// The sender for `mode`: the explicit option, else the message's `from`.
///
/// An explicit sender must belong to the same DID as the message's `from`.
fn sender<'a>(message: &'a Message, from: Option<&'a str>, mode: &str) -> Result<&'a str> {
    let sender = from.or(message.from()).ok_or_else(|| {
        Error::InvalidState(format!("{mode} requires a sender (from)"))
    })?;

    let (did, _) = did_or_url(sender);
    validate_did(did)?;
    if let Some(message_from) = message.from() {
        if message_from != did {
            return Err(Error::Validation(format!(
                "Sender {sender} does not match message from {message_from}"
            )));
        }
    }
    Ok(sender)
}

/// The recipients for `mode`: the explicit option, else the message's `to`.
fn recipients(message: &Message, to: Option<&[String]>, mode: &str) -> Result<Vec<String>> {
    let to = to
        .or(message.to())
        .filter(|to| !to.is_empty())
        .ok_or_else(|| Error::InvalidState(format!("{mode} requires at least one recipient")))?;

    let mut seen = HashSet::new();
    for recipient in to {
        validate_did(did_or_url(recipient).0)?;
        if !seen.insert(recipient.as_str()) {
            return Err(Error::Validation(format!("Duplicate recipient {recipient}")));
        }
    }
    Ok(to.to_vec())
}
