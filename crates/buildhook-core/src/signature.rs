//! Webhook signature verification.
//!
//! Providers sign the raw request body with HMAC-SHA256 keyed by the shared
//! webhook secret and send `sha256=<hex digest>` in a header.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the body signature.
pub const SIGNATURE_HEADER: &str = "X-Hub-Signature-256";

/// Prefix of the signature header value.
pub const SIGNATURE_PREFIX: &str = "sha256=";

/// Rejected webhook signature.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("missing signature header")]
    Missing,

    #[error("signature mismatch")]
    Mismatch,
}

/// Check `header_value` against the HMAC of `body` under `secret`.
///
/// Comparison is constant-time. Malformed headers yield `false`.
pub fn verify(body: &[u8], header_value: &str, secret: &str) -> bool {
    let Some(sig_hex) = header_value.strip_prefix(SIGNATURE_PREFIX) else {
        return false;
    };

    let Ok(sig_bytes) = hex::decode(sig_hex) else {
        return false;
    };

    let Some(mac) = keyed_mac(body, secret) else {
        return false;
    };

    mac.verify_slice(&sig_bytes).is_ok()
}

fn keyed_mac(body: &[u8], secret: &str) -> Option<HmacSha256> {
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return None;
    };
    mac.update(body);
    Some(mac)
}

/// Verify an optional header, distinguishing a missing one from a bad one.
pub fn check(body: &[u8], header_value: Option<&str>, secret: &str) -> Result<(), SignatureError> {
    let header_value = header_value
        .filter(|h| !h.is_empty())
        .ok_or(SignatureError::Missing)?;

    if verify(body, header_value, secret) {
        Ok(())
    } else {
        Err(SignatureError::Mismatch)
    }
}

/// Produce the header value a provider would send for `body`.
///
/// HMAC accepts keys of any length, so this is `None` only if the key is
/// rejected outright.
pub fn sign(body: &[u8], secret: &str) -> Option<String> {
    let mac = keyed_mac(body, secret)?;
    Some(format!(
        "{}{}",
        SIGNATURE_PREFIX,
        hex::encode(mac.finalize().into_bytes())
    ))
}
