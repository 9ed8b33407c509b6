//! DID and DID URL helpers.

use crate::error::{Error, Result};

/// Validates a DID (or DID URL without fragment) used in message headers.
///
/// # Arguments
/// * `did` - The DID string to validate
///
/// # Errors
/// * `Error::Validation` - If the string is not of the form `did:<method>:<id>`
///   or carries a fragment
pub fn validate_did(did: &str) -> Result<()> {
    let mut parts = did.splitn(3, ':');
    let (Some("did"), Some(method), Some(id)) = (parts.next(), parts.next(), parts.next()) else {
        return Err(Error::Validation(format!("Invalid DID format: {did}")));
    };
    if method.is_empty() || id.is_empty() {
        return Err(Error::Validation(format!("Invalid DID format: {did}")));
    }
    if did.contains('#') {
        return Err(Error::Validation(format!(
            "DID must not contain a fragment: {did}"
        )));
    }
    Ok(())
}

/// Splits a DID URL into its DID and optional fragment key id.
///
/// `did:example:alice#key-1` yields `("did:example:alice", Some("did:example:alice#key-1"))`.
#[must_use]
pub fn did_or_url(did_or_url: &str) -> (&str, Option<&str>) {
    match did_or_url.split_once('#') {
        Some((did, _)) => (did, Some(did_or_url)),
        None => (did_or_url, None),
    }
}
