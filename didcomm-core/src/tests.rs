//! Shared test fixtures and end-to-end pack/unpack tests.

use std::sync::{Arc, Once};

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use pretty_assertions::assert_eq;
use serde_json::json;

use crate::algorithms::{AnoncryptAlg, SignAlg};
use crate::did::{DidDoc, StaticDidResolver, VerificationMethod};
use crate::error::ErrorKind;
use crate::jwe::{ContentEncryptionAlgorithm, EcdhCurve, JweMessage, RecipientKey};
use crate::jwk::{Curve, Jwk};
use crate::jws::JwsMessage;
use crate::keys::KeyRegistry;
use crate::message::{AttachmentDataProps, AttachmentProps, Message, MessageProps};
use crate::pack::{AnoncryptOpts, AnoncryptSignedOpts, AuthcryptOpts, MessagePacker, SignOpts};
use crate::secrets::{DidSecrets, Secret, StaticSecretsResolver};
use crate::unpack::{MessageUnpacker, UnpackOpts};

static TRACING: Once = Once::new();

/// Installs a test-writer tracing subscriber once per test binary.
pub(crate) fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing::Level::DEBUG)
            .try_init();
    });
}

/// A DID Document together with the secrets behind it.
#[derive(Debug, Clone)]
pub(crate) struct Identity {
    pub doc: DidDoc,
    pub secrets: DidSecrets,
}

impl Identity {
    /// Adds a key agreement key on `crv` named `#<fragment>`.
    pub fn with_key_agreement(mut self, crv: Curve, fragment: &str) -> Self {
        let (vm, secret) = key_pair(&self.doc.id, crv, fragment);
        self.doc.key_agreement.push(vm);
        self.secrets.key_agreement.push(secret);
        self
    }

    /// Replaces all key agreement keys with a single key on `crv`.
    pub fn only_key_agreement(mut self, crv: Curve, fragment: &str) -> Self {
        self.doc.key_agreement.clear();
        self.secrets.key_agreement.clear();
        self.with_key_agreement(crv, fragment)
    }
}

fn key_pair(did: &str, crv: Curve, fragment: &str) -> (VerificationMethod, Secret) {
    let jwk = Jwk::generate(crv);
    let id = format!("{did}#{fragment}");
    (
        VerificationMethod {
            id: id.clone(),
            controller: did.to_string(),
            public_key_jwk: jwk.to_public(),
        },
        Secret {
            id,
            private_key_jwk: jwk,
        },
    )
}

/// Generates an identity with X25519 and P-256 key agreement keys and
/// Ed25519, P-256 and secp256k1 authentication keys.
pub(crate) fn identity(did: &str) -> Identity {
    let mut identity = Identity {
        doc: DidDoc::new(did),
        secrets: DidSecrets::new(did),
    }
    .with_key_agreement(Curve::X25519, "key-x25519-1")
    .with_key_agreement(Curve::P256, "key-p256-1");

    for (crv, fragment) in [
        (Curve::Ed25519, "key-ed25519-1"),
        (Curve::P256, "key-p256-sig-1"),
        (Curve::Secp256k1, "key-secp256k1-1"),
    ] {
        let (vm, secret) = key_pair(did, crv, fragment);
        identity.doc.authentication.push(vm);
        identity.secrets.authentication.push(secret);
    }
    identity
}

fn resolvers(
    known: &[&Identity],
    own: &[&Identity],
) -> (Arc<StaticDidResolver>, Arc<StaticSecretsResolver>) {
    (
        Arc::new(StaticDidResolver::new(known.iter().map(|i| i.doc.clone()))),
        Arc::new(StaticSecretsResolver::new(own.iter().map(|i| i.secrets.clone()))),
    )
}

/// A registry that knows and holds the secrets of `identities`.
pub(crate) fn registry_for(identities: &[&Identity]) -> KeyRegistry {
    let (dids, secrets) = resolvers(identities, identities);
    KeyRegistry::new(dids, secrets)
}

/// A packer that knows and holds the secrets of `identities`.
pub(crate) fn packer_for(identities: &[&Identity]) -> MessagePacker {
    let (dids, secrets) = resolvers(identities, identities);
    MessagePacker::new(dids, secrets)
}

/// An unpacker that resolves `known` DIDs and holds the secrets of `own`.
pub(crate) fn unpacker_for(known: &[&Identity], own: &[&Identity]) -> MessageUnpacker {
    let (dids, secrets) = resolvers(known, own);
    MessageUnpacker::new(dids, secrets)
}

/// A representative message; an empty `to` leaves the header out.
pub(crate) fn sample_message(from: &str, to: &[&str]) -> Message {
    Message::build(MessageProps {
        id: Some("1234567890".to_string()),
        type_: Some("https://example.com/protocols/lets_do_lunch/1.0/proposal".to_string()),
        from: Some(from.to_string()),
        to: (!to.is_empty()).then(|| to.iter().map(ToString::to_string).collect()),
        created_time: Some(1_516_269_022),
        expires_time: Some(1_516_385_931),
        custom_headers: vec![("example-header-1".to_string(), json!("example-header-1-value"))],
        body: Some(json!({"messagespecificattribute": "and its value"})),
        attachments: vec![AttachmentProps {
            id: Some("23".to_string()),
            description: Some("example b64 encoded attachment".to_string()),
            media_type: Some("application/json".to_string()),
            data: AttachmentDataProps {
                json: Some(json!({"foo": "bar"})),
                ..AttachmentDataProps::default()
            },
            ..AttachmentProps::default()
        }],
    })
    .unwrap()
}

fn flip_last_byte(b64: &str) -> String {
    let mut bytes = URL_SAFE_NO_PAD.decode(b64).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0x01;
    URL_SAFE_NO_PAD.encode(bytes)
}

#[tokio::test]
async fn test_authcrypt_round_trip() {
    init_tracing();
    let alice = identity("did:example:alice");
    let bob = identity("did:example:bob");
    let carol = identity("did:example:carol");

    let message = sample_message("did:example:alice", &["did:example:bob", "did:example:carol"]);
    let packed = packer_for(&[&alice, &bob, &carol])
        .authcrypt(&message, &AuthcryptOpts::default())
        .await
        .unwrap();

    for recipient in [&bob, &carol] {
        let unpacker = unpacker_for(&[&alice, &bob, &carol], &[recipient]);
        let (unpacked, metadata) = unpacker
            .unpack(&packed.data, &UnpackOpts::default())
            .await
            .unwrap();

        assert_eq!(unpacked, message);
        assert!(metadata.encrypted);
        assert!(metadata.authenticated);
        assert!(!metadata.anonymous_sender);
        assert!(!metadata.non_repudiation);
        assert_eq!(metadata.authcrypt_from.as_deref(), Some("did:example:alice"));
        assert_eq!(metadata.encrypted_from_kid, packed.from_kid);
        assert_eq!(metadata.encrypted_to_kids, packed.to_kids);
        assert_eq!(metadata.verified_to, vec![recipient.doc.id.clone()]);
        assert!(metadata.enc_alg_auth.is_some());
    }
}

#[tokio::test]
async fn test_authcrypt_on_nist_curve() {
    let alice = identity("did:example:alice").only_key_agreement(Curve::P256, "key-p256-1");
    let bob = identity("did:example:bob");

    let message = sample_message("did:example:alice", &["did:example:bob"]);
    let packed = packer_for(&[&alice, &bob])
        .authcrypt(&message, &AuthcryptOpts::default())
        .await
        .unwrap();
    assert_eq!(packed.to_kids, vec!["did:example:bob#key-p256-1".to_string()]);

    let (unpacked, metadata) = unpacker_for(&[&alice, &bob], &[&bob])
        .unpack(&packed.data, &UnpackOpts::default())
        .await
        .unwrap();
    assert_eq!(unpacked, message);
    assert_eq!(metadata.authcrypt_from.as_deref(), Some("did:example:alice"));
}

#[tokio::test]
async fn test_authcrypt_with_sender_key_id() {
    let alice = identity("did:example:alice");
    let bob = identity("did:example:bob");

    let message = sample_message("did:example:alice", &["did:example:bob"]);
    let packed = packer_for(&[&alice, &bob])
        .authcrypt(
            &message,
            &AuthcryptOpts {
                from: Some("did:example:alice#key-p256-1".to_string()),
                ..AuthcryptOpts::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(packed.from_kid.as_deref(), Some("did:example:alice#key-p256-1"));
    assert_eq!(packed.to_kids, vec!["did:example:bob#key-p256-1".to_string()]);
}

#[tokio::test]
async fn test_anoncrypt_hides_sender() {
    init_tracing();
    let bob = identity("did:example:bob");

    let message = sample_message("did:example:alice", &["did:example:bob"]);
    for alg in [
        AnoncryptAlg::EcdhEsA256kwXc20p,
        AnoncryptAlg::EcdhEsA256kwA256gcm,
        AnoncryptAlg::EcdhEsA256kwA256cbcHs512,
    ] {
        let packed = packer_for(&[&bob])
            .anoncrypt(
                &message,
                &AnoncryptOpts {
                    alg,
                    ..AnoncryptOpts::default()
                },
            )
            .await
            .unwrap();

        assert!(!packed.data.contains("did:example:alice"));
        let jwe: JweMessage = serde_json::from_str(&packed.data).unwrap();
        let protected = URL_SAFE_NO_PAD.decode(&jwe.protected).unwrap();
        assert!(!String::from_utf8(protected).unwrap().contains("did:example:alice"));

        let (unpacked, metadata) = unpacker_for(&[&bob], &[&bob])
            .unpack(&packed.data, &UnpackOpts::default())
            .await
            .unwrap();
        assert_eq!(unpacked, message);
        assert!(metadata.anonymous_sender);
        assert!(!metadata.authenticated);
        assert!(metadata.authcrypt_from.is_none());
        assert!(metadata.encrypted_from_kid.is_none());
        assert_eq!(metadata.enc_alg_anon, Some(alg));
    }
}

#[test]
fn test_canonical_serialization_is_idempotent() -> anyhow::Result<()> {
    let message = sample_message("did:example:alice", &["did:example:bob"]);
    let plain = message.as_plain()?;
    let reparsed = Message::parse(&plain)?;
    assert_eq!(reparsed.as_plain()?, plain);
    assert_eq!(reparsed, message);
    Ok(())
}

#[tokio::test]
async fn test_tampered_ciphertext_is_invalid_state() {
    let alice = identity("did:example:alice");
    let bob = identity("did:example:bob");

    let message = sample_message("did:example:alice", &["did:example:bob"]);
    let packed = packer_for(&[&alice, &bob])
        .authcrypt(&message, &AuthcryptOpts::default())
        .await
        .unwrap();
    let unpacker = unpacker_for(&[&alice, &bob], &[&bob]);

    let original: JweMessage = serde_json::from_str(&packed.data).unwrap();
    let mut tampered_ciphertext = original.clone();
    tampered_ciphertext.ciphertext = flip_last_byte(&original.ciphertext);
    let mut tampered_tag = original.clone();
    tampered_tag.tag = flip_last_byte(&original.tag);
    let mut tampered_iv = original;
    tampered_iv.iv = flip_last_byte(&tampered_iv.iv);

    for jwe in [tampered_ciphertext, tampered_tag, tampered_iv] {
        let data = serde_json::to_string(&jwe).unwrap();
        let err = unpacker
            .unpack(&data, &UnpackOpts::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }
}

#[tokio::test]
async fn test_tampered_signature_is_invalid_state() {
    let alice = identity("did:example:alice");
    let message = sample_message("did:example:alice", &["did:example:bob"]);

    for alg in [SignAlg::EdDSA, SignAlg::Es256, SignAlg::Es256k] {
        let packed = packer_for(&[&alice])
            .sign(
                &message,
                &SignOpts {
                    alg: Some(alg),
                    ..SignOpts::default()
                },
            )
            .await
            .unwrap();

        let unpacker = unpacker_for(&[&alice], &[]);
        let (unpacked, metadata) = unpacker
            .unpack(&packed.data, &UnpackOpts::default())
            .await
            .unwrap();
        assert_eq!(unpacked, message);
        assert_eq!(metadata.sign_alg, Some(alg));
        assert_eq!(metadata.sign_from.as_deref(), Some("did:example:alice"));

        let mut jws: JwsMessage = serde_json::from_str(&packed.data).unwrap();
        jws.signatures[0].signature = flip_last_byte(&jws.signatures[0].signature);
        let err = unpacker
            .unpack(&serde_json::to_string(&jws).unwrap(), &UnpackOpts::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }
}

#[tokio::test]
async fn test_illegal_layering_is_parse_error() {
    let alice = identity("did:example:alice");
    let bob = identity("did:example:bob");
    let packer = packer_for(&[&alice, &bob]);
    let unpacker = unpacker_for(&[&alice, &bob], &[&bob]);

    let message = sample_message("did:example:alice", &["did:example:bob"]);
    let signed = packer.sign(&message, &SignOpts::default()).await.unwrap();
    let anoncrypted = packer
        .anoncrypt(&message, &AnoncryptOpts::default())
        .await
        .unwrap();

    let signing_key = &alice.secrets.authentication[0];
    let sign = |payload: &str| {
        let jws = JwsMessage::sign(
            payload.as_bytes(),
            &signing_key.id,
            SignAlg::EdDSA,
            &signing_key.private_key_jwk,
        )
        .unwrap();
        serde_json::to_string(&jws).unwrap()
    };
    let bob_public = bob.doc.key_agreements()[0].public_key_jwk.public_key_bytes().unwrap();
    let encrypt = |payload: &str| {
        let jwe = JweMessage::encrypt_anoncrypt(
            payload.as_bytes(),
            EcdhCurve::X25519,
            &[RecipientKey {
                kid: &bob.doc.key_agreements()[0].id,
                public_key: &bob_public,
            }],
            ContentEncryptionAlgorithm::Xc20P,
        )
        .unwrap();
        serde_json::to_string(&jwe).unwrap()
    };

    let cases = [
        ("signed twice", sign(&signed.data)),
        ("encrypted twice", encrypt(&anoncrypted.data)),
        ("encrypted inside signed", sign(&anoncrypted.data)),
        ("three layers", encrypt(&sign(&signed.data))),
    ];
    for (name, data) in cases {
        let err = unpacker
            .unpack(&data, &UnpackOpts::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ParseError, "{name}");
    }
}

#[tokio::test]
async fn test_anoncrypt_signed() {
    let alice = identity("did:example:alice");
    let bob = identity("did:example:bob");

    let message = sample_message("did:example:alice", &["did:example:bob"]);
    let packed = packer_for(&[&alice, &bob])
        .anoncrypt_signed(&message, &AnoncryptSignedOpts::default())
        .await
        .unwrap();
    assert_eq!(
        packed.sign_by_kid.as_deref(),
        Some("did:example:alice#key-ed25519-1")
    );
    assert!(!packed.data.contains("did:example:alice"));

    let unpacker = unpacker_for(&[&alice, &bob], &[&bob]);
    let opts = UnpackOpts {
        expect_signed: true,
        expect_anoncrypted: true,
        ..UnpackOpts::default()
    };
    let (unpacked, metadata) = unpacker.unpack(&packed.data, &opts).await.unwrap();

    assert_eq!(unpacked, message);
    assert!(metadata.encrypted);
    assert!(metadata.anonymous_sender);
    assert!(metadata.non_repudiation);
    assert!(metadata.authenticated);
    assert!(metadata.authcrypt_from.is_none());
    assert_eq!(metadata.sign_from.as_deref(), Some("did:example:alice"));
    assert_eq!(metadata.sign_from_kid, packed.sign_by_kid);
    assert_eq!(metadata.sign_alg, Some(SignAlg::EdDSA));
    assert!(!metadata.rewrapped);

    let signed: JwsMessage = serde_json::from_str(metadata.signed_message.as_deref().unwrap()).unwrap();
    assert_eq!(signed.payload_bytes().unwrap(), message.as_plain().unwrap().into_bytes());

    let err = unpacker
        .unpack(
            &packed.data,
            &UnpackOpts {
                expect_authcrypted: true,
                ..UnpackOpts::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);

    let minimal = Message::build(MessageProps {
        id: Some("1".to_string()),
        type_: Some("https://example.com/protocols/ping/1.0/ping".to_string()),
        from: Some("did:example:alice".to_string()),
        to: Some(vec!["did:example:bob".to_string()]),
        body: Some(json!({"x": 1})),
        ..MessageProps::default()
    })
    .unwrap();
    let packed = packer_for(&[&alice, &bob])
        .anoncrypt_signed(&minimal, &AnoncryptSignedOpts::default())
        .await
        .unwrap();
    let (unpacked, metadata) = unpacker.unpack(&packed.data, &opts).await.unwrap();
    assert_eq!(unpacked, minimal);
    assert!(unpacked.attachments().is_empty());
    assert!(metadata.non_repudiation);
    assert!(!metadata.rewrapped);
}

#[tokio::test]
async fn test_decryptable_by_all_keys() {
    let bob = identity("did:example:bob").with_key_agreement(Curve::X25519, "key-x25519-2");

    let message = sample_message("did:example:alice", &["did:example:bob"]);
    let packed = packer_for(&[&bob])
        .anoncrypt(&message, &AnoncryptOpts::default())
        .await
        .unwrap();
    assert_eq!(packed.to_kids.len(), 2);

    let unpacker = unpacker_for(&[&bob], &[&bob]);
    let all_keys = UnpackOpts {
        expect_decryptable_by_all_keys: true,
        ..UnpackOpts::default()
    };
    let (unpacked, metadata) = unpacker.unpack(&packed.data, &all_keys).await.unwrap();
    assert_eq!(unpacked, message);
    assert_eq!(metadata.verified_to, vec!["did:example:bob".to_string()]);

    let mut jwe: JweMessage = serde_json::from_str(&packed.data).unwrap();
    jwe.recipients[0].encrypted_key = flip_last_byte(&jwe.recipients[0].encrypted_key);
    let corrupted = serde_json::to_string(&jwe).unwrap();

    let (unpacked, _) = unpacker
        .unpack(&corrupted, &UnpackOpts::default())
        .await
        .unwrap();
    assert_eq!(unpacked, message);

    let err = unpacker.unpack(&corrupted, &all_keys).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);
}

#[tokio::test]
async fn test_duplicate_recipient_entries_are_rejected() {
    let bob = identity("did:example:bob").only_key_agreement(Curve::X25519, "key-x25519-1");

    let message = sample_message("did:example:alice", &["did:example:bob"]);
    let packed = packer_for(&[&bob])
        .anoncrypt(&message, &AnoncryptOpts::default())
        .await
        .unwrap();
    assert_eq!(packed.to_kids.len(), 1);

    let mut jwe: JweMessage = serde_json::from_str(&packed.data).unwrap();
    let mut copy = jwe.recipients[0].clone();
    copy.encrypted_key = flip_last_byte(&copy.encrypted_key);
    jwe.recipients.push(copy);
    let duplicated = serde_json::to_string(&jwe).unwrap();

    let unpacker = unpacker_for(&[&bob], &[&bob]);
    for opts in [
        UnpackOpts::default(),
        UnpackOpts {
            expect_decryptable_by_all_keys: true,
            ..UnpackOpts::default()
        },
    ] {
        let err = unpacker.unpack(&duplicated, &opts).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ParseError);
    }
}

#[tokio::test]
async fn test_no_local_secret() {
    let alice = identity("did:example:alice");
    let bob = identity("did:example:bob");
    let carol = identity("did:example:carol");

    let message = sample_message("did:example:alice", &["did:example:bob"]);
    let packed = packer_for(&[&alice, &bob])
        .authcrypt(&message, &AuthcryptOpts::default())
        .await
        .unwrap();

    let err = unpacker_for(&[&alice, &bob, &carol], &[&carol])
        .unpack(&packed.data, &UnpackOpts::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SecretNotFound);
}

#[tokio::test]
async fn test_forward_unwrapping() {
    init_tracing();
    let bob = identity("did:example:bob");
    let mediator = identity("did:example:mediator");
    let packer = packer_for(&[&bob, &mediator]);

    let message = sample_message("did:example:alice", &["did:example:bob"]);
    let inner = packer
        .anoncrypt(&message, &AnoncryptOpts::default())
        .await
        .unwrap();
    let wrapped = packer
        .wrap_in_forward(
            &inner.data,
            "did:example:bob",
            &["did:example:mediator".to_string()],
            AnoncryptAlg::default(),
        )
        .await
        .unwrap();

    let both = unpacker_for(&[&bob, &mediator], &[&bob, &mediator]);
    let (unpacked, metadata) = both
        .unpack(&wrapped.data, &UnpackOpts::default())
        .await
        .unwrap();
    assert_eq!(unpacked, message);
    assert!(metadata.rewrapped);
    assert_eq!(metadata.encrypted_to_kids, inner.to_kids);

    let (forward, metadata) = both
        .unpack(
            &wrapped.data,
            &UnpackOpts {
                unwrap_rewrapping: false,
                ..UnpackOpts::default()
            },
        )
        .await
        .unwrap();
    assert!(forward.is_forward());
    assert!(!metadata.rewrapped);

    let mediator_only = unpacker_for(&[&bob, &mediator], &[&mediator]);
    let (forward, metadata) = mediator_only
        .unpack(&wrapped.data, &UnpackOpts::default())
        .await
        .unwrap();
    let (next, envelope) = forward.forward_payload().unwrap().unwrap();
    assert_eq!(next, "did:example:bob");
    assert!(!metadata.rewrapped);

    let (unpacked, _) = unpacker_for(&[&bob], &[&bob])
        .unpack(&envelope, &UnpackOpts::default())
        .await
        .unwrap();
    assert_eq!(unpacked, message);
}

#[tokio::test]
async fn test_signer_must_match_from() {
    let alice = identity("did:example:alice");
    let mallory = identity("did:example:mallory");

    let message = sample_message("did:example:alice", &["did:example:bob"]);
    let key = &mallory.secrets.authentication[0];
    let forged = JwsMessage::sign(
        message.as_plain().unwrap().as_bytes(),
        &key.id,
        SignAlg::EdDSA,
        &key.private_key_jwk,
    )
    .unwrap();

    let err = unpacker_for(&[&alice, &mallory], &[])
        .unpack(&serde_json::to_string(&forged).unwrap(), &UnpackOpts::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);
}

#[tokio::test]
async fn test_plaintext_expectations() {
    let message = sample_message("did:example:alice", &["did:example:bob"]);
    let unpacker = unpacker_for(&[], &[]);

    let (unpacked, metadata) = unpacker
        .unpack(&message.as_plain().unwrap(), &UnpackOpts::default())
        .await
        .unwrap();
    assert_eq!(unpacked, message);
    assert!(!metadata.encrypted);
    assert!(!metadata.authenticated);

    for opts in [
        UnpackOpts {
            expect_signed: true,
            ..UnpackOpts::default()
        },
        UnpackOpts {
            expect_authcrypted: true,
            ..UnpackOpts::default()
        },
        UnpackOpts {
            expect_anoncrypted: true,
            ..UnpackOpts::default()
        },
    ] {
        let err = unpacker
            .unpack(&message.as_plain().unwrap(), &opts)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }
}
