//! Message unpacking.
//!
//! [`MessageUnpacker`] peels an envelope layer by layer. At most one encrypted
//! layer (outermost) and one signed layer are accepted. A forward message
//! addressed to a locally known DID is unwrapped once.

use std::sync::Arc;

use futures::future::try_join_all;
use tracing::{debug, warn};

use crate::algorithms::{AnoncryptAlg, AuthcryptAlg, SignAlg};
use crate::did::DidResolver;
use crate::envelope::Envelope;
use crate::error::{Error, Result};
use crate::jwe::{JweMessage, KeyAgreementAlgorithm};
use crate::jws::JwsMessage;
use crate::keys::KeyRegistry;
use crate::message::Message;
use crate::secrets::SecretsResolver;

/// Options for [`MessageUnpacker::unpack`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnpackOpts {
    /// Every recipient entry with a local secret must decrypt to the same plaintext
    pub expect_decryptable_by_all_keys: bool,
    /// Unwrap a forward message whose `next` is a locally known DID
    pub unwrap_rewrapping: bool,
    /// Fail unless the message was signed
    pub expect_signed: bool,
    /// Fail unless the message was authcrypted
    pub expect_authcrypted: bool,
    /// Fail unless the message was anoncrypted
    pub expect_anoncrypted: bool,
}

impl Default for UnpackOpts {
    fn default() -> Self {
        Self {
            expect_decryptable_by_all_keys: false,
            unwrap_rewrapping: true,
            expect_signed: false,
            expect_authcrypted: false,
            expect_anoncrypted: false,
        }
    }
}

/// What unpacking established about a message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnpackMetadata {
    /// The message was encrypted
    pub encrypted: bool,
    /// The sender is authenticated (authcrypt or signature)
    pub authenticated: bool,
    /// The message was signed
    pub non_repudiation: bool,
    /// The message was anoncrypted
    pub anonymous_sender: bool,
    /// The message arrived inside a forward message that was unwrapped
    pub rewrapped: bool,
    /// DID of the authcrypt sender
    pub authcrypt_from: Option<String>,
    /// DID of the signer
    pub sign_from: Option<String>,
    /// DIDs whose keys decrypted the message
    pub verified_to: Vec<String>,
    /// Authcrypt sender key id
    pub encrypted_from_kid: Option<String>,
    /// Every recipient key id in the envelope
    pub encrypted_to_kids: Vec<String>,
    /// Signing key id
    pub sign_from_kid: Option<String>,
    /// Authcrypt suite
    pub enc_alg_auth: Option<AuthcryptAlg>,
    /// Anoncrypt suite
    pub enc_alg_anon: Option<AnoncryptAlg>,
    /// Signature algorithm
    pub sign_alg: Option<SignAlg>,
    /// The raw signed envelope
    pub signed_message: Option<String>,
}

/// Unpacks `DIDComm` envelopes.
#[derive(Clone)]
pub struct MessageUnpacker {
    registry: KeyRegistry,
}

impl MessageUnpacker {
    /// Creates an unpacker over the given resolvers.
    #[must_use]
    pub fn new(
        did_resolver: Arc<dyn DidResolver>,
        secrets_resolver: Arc<dyn SecretsResolver>,
    ) -> Self {
        Self {
            registry: KeyRegistry::new(did_resolver, secrets_resolver),
        }
    }

    /// Unpacks `envelope` into its plaintext message.
    ///
    /// # Errors
    ///
    /// - `Error::Parse` for malformed envelopes or an illegal layer sequence
    /// - `Error::SecretNotFound` if no recipient entry has a local secret
    /// - `Error::DidNotFound` if the sender or signer cannot be resolved
    /// - `Error::InvalidState` if decryption or verification fails, or an
    ///   `expect_*` option is not met
    pub async fn unpack(&self, envelope: &str, opts: &UnpackOpts) -> Result<(Message, UnpackMetadata)> {
        let mut metadata = UnpackMetadata::default();
        let mut message = self.unpack_layers(envelope, opts, &mut metadata).await?;

        if opts.unwrap_rewrapping {
            if let Some(inner) = self.forwarded_to_us(&message).await? {
                debug!(id = message.id(), "unwrapping forward message");
                let mut inner_metadata = UnpackMetadata {
                    rewrapped: true,
                    ..UnpackMetadata::default()
                };
                message = self.unpack_layers(&inner, opts, &mut inner_metadata).await?;
                metadata = inner_metadata;
            }
        }

        check_sender(&message, &metadata)?;
        check_expectations(&metadata, opts)?;
        Ok((message, metadata))
    }

    async fn unpack_layers(
        &self,
        envelope: &str,
        opts: &UnpackOpts,
        metadata: &mut UnpackMetadata,
    ) -> Result<Message> {
        let mut data = envelope.to_string();
        let mut seen_encrypted = false;
        let mut seen_signed = false;

        loop {
            let layer = Envelope::parse(&data)?;
            debug!(layer = layer.layer_name(), "unpacking layer");

            match layer {
                Envelope::Plain(message) => return Ok(message),
                Envelope::Encrypted(jwe) => {
                    if seen_encrypted || seen_signed {
                        return Err(Error::Parse(
                            "Encrypted layer must be the single outermost layer".to_string(),
                        ));
                    }
                    seen_encrypted = true;
                    data = self.decrypt(&jwe, opts, metadata).await?;
                }
                Envelope::Signed(jws) => {
                    if seen_signed {
                        return Err(Error::Parse("Repeated signed layer".to_string()));
                    }
                    seen_signed = true;
                    data = self.verify(&jws, &data, metadata).await?;
                }
            }
        }
    }

    async fn decrypt(
        &self,
        jwe: &JweMessage,
        opts: &UnpackOpts,
        metadata: &mut UnpackMetadata,
    ) -> Result<String> {
        let header = jwe.header()?;
        let kids: Vec<&str> = jwe.recipient_kids().collect();

        let candidates: Vec<_> = try_join_all(
            kids.iter().map(|kid| self.registry.find_decryption_key(kid)),
        )
        .await?
        .into_iter()
        .flatten()
        .collect();
        if candidates.is_empty() {
            return Err(Error::SecretNotFound(format!(
                "No local secret for any of {}",
                kids.join(", ")
            )));
        }

        let sender = match header.alg {
            KeyAgreementAlgorithm::Ecdh1puA256kw => {
                let alg = AuthcryptAlg::from_content_encryption(header.enc).ok_or_else(|| {
                    Error::NoCompatibleCrypto(format!("ECDH-1PU with {} is not supported", header.enc))
                })?;
                let skid = header
                    .skid
                    .as_deref()
                    .ok_or_else(|| Error::Parse("Authcrypt header has no skid".to_string()))?;
                let key = self.registry.resolve_sender_public_key(skid).await?;
                metadata.enc_alg_auth = Some(alg);
                Some(key)
            }
            KeyAgreementAlgorithm::EcdhEsA256kw => {
                metadata.enc_alg_anon = Some(AnoncryptAlg::from_content_encryption(header.enc));
                None
            }
        };
        let sender_public = sender
            .as_ref()
            .map(|key| key.jwk.public_key_bytes())
            .transpose()?;

        let mut plaintext: Option<Vec<u8>> = None;
        let mut verified_to = Vec::new();
        for key in &candidates {
            let private = key.jwk.private_key_bytes()?;
            match jwe.decrypt(&key.kid, &private, sender_public.as_deref()) {
                Ok(decrypted) => {
                    // All entries share one ciphertext and tag.
                    plaintext.get_or_insert(decrypted);
                    if !verified_to.contains(&key.did) {
                        verified_to.push(key.did.clone());
                    }
                    if !opts.expect_decryptable_by_all_keys {
                        break;
                    }
                }
                Err(err) if opts.expect_decryptable_by_all_keys => {
                    return Err(Error::InvalidState(format!(
                        "Unable to decrypt for {}: {err}",
                        key.kid
                    )));
                }
                Err(err) => warn!(kid = %key.kid, "decryption failed: {err}"),
            }
        }

        let plaintext = plaintext.ok_or_else(|| {
            Error::InvalidState("Unable to decrypt with any local key".to_string())
        })?;

        metadata.encrypted = true;
        metadata.encrypted_to_kids = kids.iter().map(ToString::to_string).collect();
        metadata.verified_to = verified_to;
        match sender {
            Some(key) => {
                metadata.authenticated = true;
                metadata.authcrypt_from = Some(key.did);
                metadata.encrypted_from_kid = Some(key.kid);
            }
            None => metadata.anonymous_sender = true,
        }

        String::from_utf8(plaintext)
            .map_err(|e| Error::Parse(format!("Decrypted payload is not UTF-8: {e}")))
    }

    async fn verify(
        &self,
        jws: &JwsMessage,
        raw: &str,
        metadata: &mut UnpackMetadata,
    ) -> Result<String> {
        for (index, signature) in jws.signatures.iter().enumerate() {
            let header = jws.protected_header(index)?;
            let kid = &signature.header.kid;
            let key = self.registry.resolve_verification_key(kid).await?;
            jws.verify(index, &key.jwk).map_err(|e| {
                Error::InvalidState(format!("Signature by {kid} does not verify: {e}"))
            })?;

            if metadata.sign_from.is_none() {
                metadata.sign_from = Some(key.did);
                metadata.sign_from_kid = Some(kid.clone());
                metadata.sign_alg = Some(header.alg);
            }
        }

        metadata.authenticated = true;
        metadata.non_repudiation = true;
        metadata.signed_message = Some(raw.to_string());

        String::from_utf8(jws.payload_bytes()?)
            .map_err(|e| Error::Parse(format!("Signed payload is not UTF-8: {e}")))
    }

    /// The inner envelope of a forward message whose `next` has local secrets.
    async fn forwarded_to_us(&self, message: &Message) -> Result<Option<String>> {
        let Some((next, inner)) = message.forward_payload()? else {
            return Ok(None);
        };
        if self.registry.has_secrets(&next).await? {
            Ok(Some(inner))
        } else {
            Ok(None)
        }
    }
}

/// An authenticated sender must be the DID named in the message's `from`.
fn check_sender(message: &Message, metadata: &UnpackMetadata) -> Result<()> {
    let Some(from) = message.from() else {
        return Ok(());
    };
    for sender in [&metadata.authcrypt_from, &metadata.sign_from].into_iter().flatten() {
        if sender != from {
            return Err(Error::InvalidState(format!(
                "Message from {from} was authenticated as {sender}"
            )));
        }
    }
    Ok(())
}

fn check_expectations(metadata: &UnpackMetadata, opts: &UnpackOpts) -> Result<()> {
    if opts.expect_signed && !metadata.non_repudiation {
        return Err(Error::InvalidState("Message is not signed".to_string()));
    }
    if opts.expect_authcrypted && metadata.authcrypt_from.is_none() {
        return Err(Error::InvalidState("Message is not authcrypted".to_string()));
    }
    if opts.expect_anoncrypted && !(metadata.encrypted && metadata.anonymous_sender) {
        return Err(Error::InvalidState("Message is not anoncrypted".to_string()));
    }
    Ok(())
}
