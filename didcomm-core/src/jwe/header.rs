//! JWE protected header.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::{ContentEncryptionAlgorithm, KeyAgreementAlgorithm};
use crate::jwe::error::{JweError, Result};
use crate::jwk::Jwk;

/// Media type of an encrypted DIDComm message.
pub const ENCRYPTED_MESSAGE_TYPE: &str = "application/didcomm-encrypted+json";

/// The protected header of a JWE.
///
/// A single header is shared by every recipient: one ephemeral key, one `apv`
/// computed over all recipient key ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JweHeader {
    /// Media type
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typ: Option<String>,

    /// The key agreement algorithm
    pub alg: KeyAgreementAlgorithm,

    /// The content encryption algorithm
    pub enc: ContentEncryptionAlgorithm,

    /// The ephemeral public key
    pub epk: Jwk,

    /// The sender key ID (authcrypt only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skid: Option<String>,

    /// The agreement `PartyUInfo` (base64url of `skid`, authcrypt only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apu: Option<String>,

    /// The agreement `PartyVInfo` (base64url of the recipient key id digest)
    pub apv: String,
}

impl JweHeader {
    /// Creates a new JWE header for anoncrypt (ECDH-ES+A256KW).
    #[must_use]
    pub fn new_anoncrypt(enc: ContentEncryptionAlgorithm, epk: Jwk, apv: &[u8]) -> Self {
        Self {
            typ: Some(ENCRYPTED_MESSAGE_TYPE.to_string()),
            alg: KeyAgreementAlgorithm::EcdhEsA256kw,
            enc,
            epk,
            skid: None,
            apu: None,
            apv: URL_SAFE_NO_PAD.encode(apv),
        }
    }

    /// Creates a new JWE header for authcrypt (ECDH-1PU+A256KW).
    #[must_use]
    pub fn new_authcrypt(
        enc: ContentEncryptionAlgorithm,
        epk: Jwk,
        skid: &str,
        apv: &[u8],
    ) -> Self {
        Self {
            typ: Some(ENCRYPTED_MESSAGE_TYPE.to_string()),
            alg: KeyAgreementAlgorithm::Ecdh1puA256kw,
            enc,
            epk,
            skid: Some(skid.to_string()),
            apu: Some(URL_SAFE_NO_PAD.encode(skid.as_bytes())),
            apv: URL_SAFE_NO_PAD.encode(apv),
        }
    }

    /// Serializes the header to its base64url-encoded protected form.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn encode(&self) -> Result<String> {
        let json = serde_json::to_vec(self)?;
        Ok(URL_SAFE_NO_PAD.encode(json))
    }

    /// Decoded `apu` bytes, empty when absent.
    ///
    /// # Errors
    ///
    /// Returns an error if `apu` is not valid base64url.
    pub fn apu_bytes(&self) -> Result<Vec<u8>> {
        match &self.apu {
            Some(apu) => URL_SAFE_NO_PAD
                .decode(apu)
                .map_err(|e| JweError::Base64("apu", e)),
            None => Ok(Vec::new()),
        }
    }

    /// Decoded `apv` bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if `apv` is not valid base64url.
    pub fn apv_bytes(&self) -> Result<Vec<u8>> {
        URL_SAFE_NO_PAD
            .decode(&self.apv)
            .map_err(|e| JweError::Base64("apv", e))
    }

    /// Checks the header fields required by its key agreement algorithm.
    ///
    /// For `ECDH-1PU` the `skid` must be present and `apu` must decode to it.
    ///
    /// # Errors
    ///
    /// Returns [`JweError::Header`] on inconsistent fields.
    pub fn validate(&self) -> Result<()> {
        match self.alg {
            KeyAgreementAlgorithm::EcdhEsA256kw => {
                if self.skid.is_some() {
                    return Err(JweError::Header(
                        "skid is not allowed with ECDH-ES".to_string(),
                    ));
                }
            }
            KeyAgreementAlgorithm::Ecdh1puA256kw => {
                let skid = self
                    .skid
                    .as_deref()
                    .ok_or_else(|| JweError::Header("ECDH-1PU requires skid".to_string()))?;
                if self.apu_bytes()? != skid.as_bytes() {
                    return Err(JweError::Header("apu does not match skid".to_string()));
                }
            }
        }
        Ok(())
    }
}

impl FromStr for JweHeader {
    type Err = JweError;

    fn from_str(s: &str) -> Result<Self> {
        let bytes = URL_SAFE_NO_PAD
            .decode(s)
            .map_err(|e| JweError::Base64("protected header", e))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| JweError::Header(format!("Malformed protected header: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jwk::Curve;

    fn epk() -> Jwk {
        Jwk::generate(Curve::X25519).to_public()
    }

    #[test]
    fn test_header_anoncrypt() {
        let header = JweHeader::new_anoncrypt(ContentEncryptionAlgorithm::Xc20P, epk(), b"digest");

        assert_eq!(header.alg, KeyAgreementAlgorithm::EcdhEsA256kw);
        assert_eq!(header.enc, ContentEncryptionAlgorithm::Xc20P);
        assert!(header.skid.is_none());
        assert!(header.apu.is_none());
        assert_eq!(header.apv_bytes().unwrap(), b"digest");
        assert!(header.validate().is_ok());
    }

    #[test]
    fn test_header_authcrypt() {
        let header = JweHeader::new_authcrypt(
            ContentEncryptionAlgorithm::A256CbcHs512,
            epk(),
            "did:example:alice#key-x25519-1",
            b"digest",
        );

        assert_eq!(header.alg, KeyAgreementAlgorithm::Ecdh1puA256kw);
        assert_eq!(header.skid.as_deref(), Some("did:example:alice#key-x25519-1"));
        assert_eq!(header.apu_bytes().unwrap(), b"did:example:alice#key-x25519-1");
        assert!(header.validate().is_ok());
    }

    #[test]
    fn test_header_serialization() {
        let header = JweHeader::new_anoncrypt(ContentEncryptionAlgorithm::A256Gcm, epk(), b"x");

        let encoded = header.encode().unwrap();
        let decoded: JweHeader = encoded.parse().unwrap();
        assert_eq!(decoded, header);

        let json: serde_json::Value =
            serde_json::from_slice(&URL_SAFE_NO_PAD.decode(&encoded).unwrap()).unwrap();
        assert_eq!(json["alg"], "ECDH-ES+A256KW");
        assert_eq!(json["enc"], "A256GCM");
        assert_eq!(json["typ"], ENCRYPTED_MESSAGE_TYPE);
        assert_eq!(json["epk"]["crv"], "X25519");
        assert!(json["epk"].get("d").is_none());
    }

    #[test]
    fn test_apu_mismatch_rejected() {
        let mut header = JweHeader::new_authcrypt(
            ContentEncryptionAlgorithm::A256CbcHs512,
            epk(),
            "did:example:alice#key-1",
            b"digest",
        );
        header.apu = Some(URL_SAFE_NO_PAD.encode("did:example:mallory#key-1"));
        assert!(matches!(header.validate(), Err(JweError::Header(_))));

        header.skid = None;
        assert!(matches!(header.validate(), Err(JweError::Header(_))));
    }

    #[test]
    fn test_malformed_header() {
        assert!(matches!(
            "not base64!".parse::<JweHeader>(),
            Err(JweError::Base64(..))
        ));
        let garbage = URL_SAFE_NO_PAD.encode(r#"{"alg":"none"}"#);
        assert!(matches!(garbage.parse::<JweHeader>(), Err(JweError::Header(_))));
    }
}
