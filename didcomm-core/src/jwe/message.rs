//! JWE message structure and encryption/decryption flow.
//!
//! Messages use the general JSON serialization: one protected header shared by
//! all recipients, and one `encrypted_key` per recipient key id.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use super::{
    algorithms::{
        decrypt_content, ecdh_key_agreement, encrypt_content, generate_ephemeral_keypair,
        generate_random_key,
    },
    error::{JweError, Result},
    header::JweHeader,
    key_agreement::{
        compute_apv, derive_key_encryption_key_1pu, derive_key_encryption_key_es,
    },
    key_wrapping::{unwrap_key, wrap_key, ContentEncryptionKey},
    ContentEncryptionAlgorithm, EcdhCurve, KeyAgreementAlgorithm,
};
use crate::jwk::Jwk;

/// Per-recipient unprotected header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JweRecipientHeader {
    /// The recipient key id
    pub kid: String,
}

/// A recipient of a JWE message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JweRecipient {
    /// The per-recipient header
    pub header: JweRecipientHeader,
    /// The encrypted key for this recipient (base64url-encoded)
    pub encrypted_key: String,
}

/// A complete JWE message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JweMessage {
    /// The protected header (base64url-encoded)
    pub protected: String,
    /// The recipients of the message
    pub recipients: Vec<JweRecipient>,
    /// The initialization vector (base64url-encoded)
    pub iv: String,
    /// The ciphertext (base64url-encoded)
    pub ciphertext: String,
    /// The authentication tag (base64url-encoded)
    pub tag: String,
}

/// A recipient public key to encrypt for.
#[derive(Debug, Clone, Copy)]
pub struct RecipientKey<'a> {
    /// The key id placed in the recipient header
    pub kid: &'a str,
    /// Raw X25519 key or uncompressed SEC1 point
    pub public_key: &'a [u8],
}

/// Sender static key for ECDH-1PU.
#[derive(Debug, Clone, Copy)]
pub struct SenderKey<'a> {
    /// The sender key id (`skid`)
    pub kid: &'a str,
    /// The sender's private key
    pub private_key: &'a [u8],
}

impl JweMessage {
    /// Encrypts a message using ECDH-ES+A256KW (anoncrypt) for multiple recipients.
    ///
    /// All recipients must hold keys on `curve`; a single ephemeral key is used
    /// for all of them.
    ///
    /// # Errors
    ///
    /// Returns an error if there are no recipients or any key is invalid.
    pub fn encrypt_anoncrypt(
        plaintext: &[u8],
        curve: EcdhCurve,
        recipient_keys: &[RecipientKey<'_>],
        enc: ContentEncryptionAlgorithm,
    ) -> Result<Self> {
        Self::encrypt(plaintext, curve, None, recipient_keys, enc)
    }

    /// Encrypts a message using ECDH-1PU+A256KW (authcrypt) for multiple recipients.
    ///
    /// The content is encrypted first; its tag is bound into every recipient's
    /// key encryption key.
    ///
    /// # Errors
    ///
    /// Returns an error if there are no recipients or any key is invalid.
    pub fn encrypt_authcrypt(
        plaintext: &[u8],
        curve: EcdhCurve,
        sender: SenderKey<'_>,
        recipient_keys: &[RecipientKey<'_>],
        enc: ContentEncryptionAlgorithm,
    ) -> Result<Self> {
        Self::encrypt(plaintext, curve, Some(sender), recipient_keys, enc)
    }

    fn encrypt(
        plaintext: &[u8],
        curve: EcdhCurve,
        sender: Option<SenderKey<'_>>,
        recipient_keys: &[RecipientKey<'_>],
        enc: ContentEncryptionAlgorithm,
    ) -> Result<Self> {
        if recipient_keys.is_empty() {
            return Err(JweError::InvalidFormat(
                "At least one recipient is required".to_string(),
            ));
        }

        let (ephemeral_private, ephemeral_public) = generate_ephemeral_keypair(curve);
        let epk = Jwk::from_public_bytes(curve.into(), &ephemeral_public)?;

        let kids: Vec<&str> = recipient_keys.iter().map(|r| r.kid).collect();
        let apv = compute_apv(&kids);
        let header = match sender {
            Some(sender) => JweHeader::new_authcrypt(enc, epk, sender.kid, &apv),
            None => JweHeader::new_anoncrypt(enc, epk, &apv),
        };
        let protected = header.encode()?;
        let apu = header.apu_bytes()?;

        let cek = ContentEncryptionKey::new(generate_random_key(enc.key_size()));
        let iv = generate_random_key(enc.iv_size());
        let (ciphertext, tag) =
            encrypt_content(enc, cek.as_bytes(), &iv, protected.as_bytes(), plaintext)?;

        let mut recipients = Vec::with_capacity(recipient_keys.len());
        for recipient in recipient_keys {
            let ze = ecdh_key_agreement(curve, &ephemeral_private, recipient.public_key)?;
            let kek = match sender {
                Some(sender) => {
                    let zs = ecdh_key_agreement(curve, sender.private_key, recipient.public_key)?;
                    derive_key_encryption_key_1pu(&ze, &zs, &apu, &apv, &tag)?
                }
                None => derive_key_encryption_key_es(&ze, &apu, &apv)?,
            };

            recipients.push(JweRecipient {
                header: JweRecipientHeader {
                    kid: recipient.kid.to_string(),
                },
                encrypted_key: URL_SAFE_NO_PAD.encode(wrap_key(&kek, &cek)?),
            });
        }

        Ok(Self {
            protected,
            recipients,
            iv: URL_SAFE_NO_PAD.encode(iv),
            ciphertext: URL_SAFE_NO_PAD.encode(ciphertext),
            tag: URL_SAFE_NO_PAD.encode(tag),
        })
    }

    /// Decodes and validates the protected header.
    ///
    /// # Errors
    ///
    /// Returns an error if the header is malformed or internally inconsistent.
    pub fn header(&self) -> Result<JweHeader> {
        let header: JweHeader = self.protected.parse()?;
        header.validate()?;
        Ok(header)
    }

    /// Returns the recipient entry for `kid`, if any.
    #[must_use]
    pub fn recipient(&self, kid: &str) -> Option<&JweRecipient> {
        self.recipients.iter().find(|r| r.header.kid == kid)
    }

    /// Recipient key ids in envelope order.
    pub fn recipient_kids(&self) -> impl Iterator<Item = &str> {
        self.recipients.iter().map(|r| r.header.kid.as_str())
    }

    /// Decrypts the message as the recipient `kid`.
    ///
    /// `sender_public_key` is required for ECDH-1PU and ignored for ECDH-ES.
    ///
    /// # Errors
    ///
    /// Returns [`JweError::AuthenticationFailed`] or [`JweError::KeyWrap`] if the
    /// envelope was tampered with or is not addressed to this key.
    pub fn decrypt(
        &self,
        kid: &str,
        recipient_private_key: &[u8],
        sender_public_key: Option<&[u8]>,
    ) -> Result<Vec<u8>> {
        let header = self.header()?;
        let recipient = self.recipient(kid).ok_or_else(|| {
            JweError::InvalidFormat(format!("No recipient entry for key {kid}"))
        })?;

        let curve = header.epk.ecdh_curve()?;
        let epk = header.epk.public_key_bytes()?;
        let apu = header.apu_bytes()?;
        let apv = header.apv_bytes()?;

        let encrypted_key = decode("encrypted_key", &recipient.encrypted_key)?;
        let iv = decode("iv", &self.iv)?;
        let ciphertext = decode("ciphertext", &self.ciphertext)?;
        let tag = decode("tag", &self.tag)?;

        let ze = ecdh_key_agreement(curve, recipient_private_key, &epk)?;
        let kek = match header.alg {
            KeyAgreementAlgorithm::EcdhEsA256kw => derive_key_encryption_key_es(&ze, &apu, &apv)?,
            KeyAgreementAlgorithm::Ecdh1puA256kw => {
                let sender_public_key = sender_public_key.ok_or_else(|| {
                    JweError::Header("ECDH-1PU requires the sender public key".to_string())
                })?;
                let zs = ecdh_key_agreement(curve, recipient_private_key, sender_public_key)?;
                derive_key_encryption_key_1pu(&ze, &zs, &apu, &apv, &tag)?
            }
        };

        let cek = unwrap_key(&kek, &encrypted_key)?;
        if cek.as_bytes().len() != header.enc.key_size() {
            return Err(JweError::Decryption(format!(
                "Content key has wrong length for {}",
                header.enc
            )));
        }

        decrypt_content(
            header.enc,
            cek.as_bytes(),
            &iv,
            self.protected.as_bytes(),
            &ciphertext,
            &tag,
        )
    }
}

fn decode(field: &'static str, value: &str) -> Result<Vec<u8>> {
    URL_SAFE_NO_PAD
        .decode(value)
        .map_err(|e| JweError::Base64(field, e))
}
