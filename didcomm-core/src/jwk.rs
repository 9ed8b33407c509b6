//! JSON Web Key representation of public and private key material.
//!
//! DID documents and secrets carry keys as JWKs (`OKP` for X25519/Ed25519,
//! `EC` for NIST curves and secp256k1). This module converts between JWKs and
//! the raw byte encodings the JWE and JWS primitives operate on.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use p256::elliptic_curve::sec1::ToEncodedPoint;
use rand_core::OsRng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use zeroize::Zeroizing;

use crate::jwe::EcdhCurve;

/// Errors converting JWK material.
#[derive(Debug, Error)]
pub enum JwkError {
    /// The curve cannot be used for the requested operation
    #[error("Unsupported curve for {0}: {1}")]
    UnsupportedCurve(&'static str, Curve),

    /// The key material is malformed
    #[error("Invalid key material: {0}")]
    InvalidKey(String),

    /// A private key was required but the JWK only holds a public key
    #[error("JWK has no private key component")]
    MissingPrivateKey,
}

/// Result type for JWK conversions.
pub type Result<T> = std::result::Result<T, JwkError>;

/// Curves a JWK can be defined on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Curve {
    /// X25519 (key agreement)
    X25519,
    /// Ed25519 (signatures)
    Ed25519,
    /// NIST P-256
    #[serde(rename = "P-256")]
    P256,
    /// NIST P-384
    #[serde(rename = "P-384")]
    P384,
    /// NIST P-521
    #[serde(rename = "P-521")]
    P521,
    /// secp256k1 (signatures)
    #[serde(rename = "secp256k1")]
    Secp256k1,
}

impl Curve {
    /// The JWK `kty` for keys on this curve.
    #[must_use]
    pub fn key_type(self) -> &'static str {
        match self {
            Self::X25519 | Self::Ed25519 => "OKP",
            Self::P256 | Self::P384 | Self::P521 | Self::Secp256k1 => "EC",
        }
    }

    /// The matching ECDH curve, if keys on this curve can do key agreement.
    #[must_use]
    pub fn ecdh_curve(self) -> Option<EcdhCurve> {
        match self {
            Self::X25519 => Some(EcdhCurve::X25519),
            Self::P256 => Some(EcdhCurve::P256),
            Self::P384 => Some(EcdhCurve::P384),
            Self::P521 => Some(EcdhCurve::P521),
            Self::Ed25519 | Self::Secp256k1 => None,
        }
    }

    fn coordinate_size(self) -> usize {
        match self {
            Self::X25519 | Self::Ed25519 | Self::P256 | Self::Secp256k1 => 32,
            Self::P384 => 48,
            Self::P521 => 66,
        }
    }
}

impl From<EcdhCurve> for Curve {
    fn from(curve: EcdhCurve) -> Self {
        match curve {
            EcdhCurve::X25519 => Self::X25519,
            EcdhCurve::P256 => Self::P256,
            EcdhCurve::P384 => Self::P384,
            EcdhCurve::P521 => Self::P521,
        }
    }
}

impl std::fmt::Display for Curve {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::X25519 => "X25519",
            Self::Ed25519 => "Ed25519",
            Self::P256 => "P-256",
            Self::P384 => "P-384",
            Self::P521 => "P-521",
            Self::Secp256k1 => "secp256k1",
        };
        f.write_str(name)
    }
}

/// A JSON Web Key on one of the supported curves.
///
/// `d` is present only for private keys. The `Debug` output never contains it.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwk {
    /// Key type (`OKP` or `EC`)
    pub kty: String,

    /// The curve
    pub crv: Curve,

    /// The x coordinate / public key (base64url-encoded)
    pub x: String,

    /// The y coordinate (base64url-encoded, EC keys only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<String>,

    /// The private key (base64url-encoded)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub d: Option<String>,
}

impl std::fmt::Debug for Jwk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Jwk")
            .field("kty", &self.kty)
            .field("crv", &self.crv)
            .field("x", &self.x)
            .field("y", &self.y)
            .field("d", &self.d.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl Jwk {
    /// Builds a public JWK from a raw public key.
    ///
    /// OKP keys take the 32 raw bytes; EC keys take an uncompressed SEC1 point.
    ///
    /// # Errors
    ///
    /// Returns [`JwkError::InvalidKey`] if the encoding does not match the curve.
    pub fn from_public_bytes(crv: Curve, public_key: &[u8]) -> Result<Self> {
        let size = crv.coordinate_size();
        let (x, y) = match crv.key_type() {
            "OKP" => {
                if public_key.len() != size {
                    return Err(JwkError::InvalidKey(format!(
                        "{crv} public key must be {size} bytes"
                    )));
                }
                (URL_SAFE_NO_PAD.encode(public_key), None)
            }
            _ => {
                if public_key.len() != 1 + 2 * size || public_key[0] != 0x04 {
                    return Err(JwkError::InvalidKey(format!(
                        "{crv} public key must be an uncompressed point"
                    )));
                }
                let (x, y) = public_key[1..].split_at(size);
                (
                    URL_SAFE_NO_PAD.encode(x),
                    Some(URL_SAFE_NO_PAD.encode(y)),
                )
            }
        };

        Ok(Self {
            kty: crv.key_type().to_string(),
            crv,
            x,
            y,
            d: None,
        })
    }

    /// Generates a new private JWK on the given curve.
    #[must_use]
    pub fn generate(crv: Curve) -> Self {
        let (private, public) = match crv {
            Curve::X25519 => {
                let secret = x25519_dalek::StaticSecret::random_from_rng(OsRng);
                let public = x25519_dalek::PublicKey::from(&secret);
                (secret.to_bytes().to_vec(), public.as_bytes().to_vec())
            }
            Curve::Ed25519 => {
                let signing = ed25519_dalek::SigningKey::generate(&mut OsRng);
                (
                    signing.to_bytes().to_vec(),
                    signing.verifying_key().to_bytes().to_vec(),
                )
            }
            Curve::P256 => ec_keypair::<p256::NistP256>(),
            Curve::P384 => ec_keypair::<p384::NistP384>(),
            Curve::P521 => ec_keypair::<p521::NistP521>(),
            Curve::Secp256k1 => ec_keypair::<k256::Secp256k1>(),
        };
        let private = Zeroizing::new(private);

        // Fresh keys always have the right shape for their curve.
        let (x, y) = match crv.key_type() {
            "OKP" => (URL_SAFE_NO_PAD.encode(&public), None),
            _ => {
                let (x, y) = public[1..].split_at(crv.coordinate_size());
                (URL_SAFE_NO_PAD.encode(x), Some(URL_SAFE_NO_PAD.encode(y)))
            }
        };

        Self {
            kty: crv.key_type().to_string(),
            crv,
            x,
            y,
            d: Some(URL_SAFE_NO_PAD.encode(&*private)),
        }
    }

    /// Returns this key without its private component.
    #[must_use]
    pub fn to_public(&self) -> Self {
        Self {
            d: None,
            ..self.clone()
        }
    }

    /// Whether the JWK carries a private key.
    #[must_use]
    pub fn is_private(&self) -> bool {
        self.d.is_some()
    }

    /// The ECDH curve of this key.
    ///
    /// # Errors
    ///
    /// Returns [`JwkError::UnsupportedCurve`] for signature-only curves.
    pub fn ecdh_curve(&self) -> Result<EcdhCurve> {
        self.crv
            .ecdh_curve()
            .ok_or(JwkError::UnsupportedCurve("key agreement", self.crv))
    }

    /// The public key as raw bytes (OKP) or an uncompressed SEC1 point (EC).
    ///
    /// # Errors
    ///
    /// Returns [`JwkError::InvalidKey`] if coordinates are missing or malformed.
    pub fn public_key_bytes(&self) -> Result<Vec<u8>> {
        let size = self.crv.coordinate_size();
        let x = decode_component("x", &self.x, size)?;

        if self.crv.key_type() == "OKP" {
            return Ok(x);
        }

        let y = self
            .y
            .as_deref()
            .ok_or_else(|| JwkError::InvalidKey("EC key is missing y".to_string()))?;
        let y = decode_component("y", y, size)?;

        let mut point = Vec::with_capacity(1 + 2 * size);
        point.push(0x04);
        point.extend_from_slice(&x);
        point.extend_from_slice(&y);
        Ok(point)
    }

    /// The private scalar / seed bytes.
    ///
    /// # Errors
    ///
    /// Returns [`JwkError::MissingPrivateKey`] for public keys.
    pub fn private_key_bytes(&self) -> Result<Zeroizing<Vec<u8>>> {
        let d = self.d.as_deref().ok_or(JwkError::MissingPrivateKey)?;
        decode_component("d", d, self.crv.coordinate_size()).map(Zeroizing::new)
    }
}

fn decode_component(name: &str, value: &str, size: usize) -> Result<Vec<u8>> {
    let bytes = URL_SAFE_NO_PAD
        .decode(value)
        .map_err(|e| JwkError::InvalidKey(format!("{name}: {e}")))?;
    if bytes.len() != size {
        return Err(JwkError::InvalidKey(format!(
            "{name} must be {size} bytes, got {}",
            bytes.len()
        )));
    }
    Ok(bytes)
}

fn ec_keypair<C>() -> (Vec<u8>, Vec<u8>)
where
    C: p256::elliptic_curve::CurveArithmetic,
    p256::elliptic_curve::AffinePoint<C>: p256::elliptic_curve::sec1::FromEncodedPoint<C>
        + ToEncodedPoint<C>,
    p256::elliptic_curve::FieldBytesSize<C>: p256::elliptic_curve::sec1::ModulusSize,
{
    let secret = p256::elliptic_curve::SecretKey::<C>::random(&mut OsRng);
    let public = secret
        .public_key()
        .to_encoded_point(false)
        .as_bytes()
        .to_vec();
    (secret.to_bytes().to_vec(), public)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_all_curves() {
        for crv in [
            Curve::X25519,
            Curve::Ed25519,
            Curve::P256,
            Curve::P384,
            Curve::P521,
            Curve::Secp256k1,
        ] {
            let jwk = Jwk::generate(crv);
            assert!(jwk.is_private());
            assert_eq!(jwk.kty, crv.key_type());

            let public = jwk.public_key_bytes().unwrap();
            let rebuilt = Jwk::from_public_bytes(crv, &public).unwrap();
            assert_eq!(rebuilt, jwk.to_public(), "{crv}");
            assert_eq!(jwk.private_key_bytes().unwrap().len(), crv.coordinate_size());
        }
    }

    #[test]
    fn test_json_shape() {
        let jwk: Jwk = serde_json::from_str(
            r#"{"kty":"OKP","crv":"X25519","x":"avH0O2Y4tqLAq8y9zpianr8ajii5m4F_mICrzNlatXs"}"#,
        )
        .unwrap();
        assert_eq!(jwk.crv, Curve::X25519);
        assert_eq!(jwk.ecdh_curve().unwrap(), EcdhCurve::X25519);
        assert_eq!(jwk.public_key_bytes().unwrap().len(), 32);

        let json = serde_json::to_value(&jwk).unwrap();
        assert!(json.get("d").is_none());
        assert!(json.get("y").is_none());
    }

    #[test]
    fn test_signature_curves_reject_ecdh() {
        let jwk = Jwk::generate(Curve::Ed25519);
        assert!(matches!(
            jwk.ecdh_curve(),
            Err(JwkError::UnsupportedCurve(_, Curve::Ed25519))
        ));
    }

    #[test]
    fn test_debug_redacts_private_key() {
        let jwk = Jwk::generate(Curve::P256);
        let d = jwk.d.clone().unwrap();
        assert!(!format!("{jwk:?}").contains(&d));
    }

    #[test]
    fn test_invalid_material() {
        let mut jwk = Jwk::generate(Curve::P256).to_public();
        jwk.y = None;
        assert!(jwk.public_key_bytes().is_err());
        assert!(matches!(
            jwk.private_key_bytes(),
            Err(JwkError::MissingPrivateKey)
        ));

        assert!(Jwk::from_public_bytes(Curve::X25519, &[0u8; 31]).is_err());
        assert!(Jwk::from_public_bytes(Curve::P256, &[0u8; 65]).is_err());
    }
}
