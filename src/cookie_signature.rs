//! Express-session compatible cookie signing
//!
//! Wire format: `s:` + value + `.` + base64(hmac_sha256(value, secret))
//! with base64 padding stripped, byte-compatible with the Node.js
//! cookie-signature library. Verification walks an ordered secret list so
//! the signing secret can rotate without invalidating outstanding
//! sessions: new cookies are always signed with the first secret.

use base64::{engine::general_purpose::STANDARD, Engine};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Marker prefix carried by signed cookie values
pub const SIGNED_PREFIX: &str = "s:";

/// Sign a session id with the given secret.
///
/// Returns the full wire value including the `s:` marker.
pub fn sign(value: &str, secret: &str) -> String {
    format!("{}{}.{}", SIGNED_PREFIX, value, signature_of(value, secret))
}

/// HMAC-SHA256 signature in unpadded standard base64, as Node produces it
fn signature_of(value: &str, secret: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(value.as_bytes());
    STANDARD
        .encode(mac.finalize().into_bytes())
        .trim_end_matches('=')
        .to_string()
}

/// Verify a signed wire value against one secret.
///
/// Returns the embedded session id when the marker is present and the
/// signature matches; `None` for anything else. An unsigned or tampered
/// value is never an error, just an absent id.
pub fn unsign(signed_value: &str, secret: &str) -> Option<String> {
    let without_prefix = signed_value.strip_prefix(SIGNED_PREFIX)?;

    let dot_pos = without_prefix.rfind('.')?;
    let value = &without_prefix[..dot_pos];
    let provided = &without_prefix[dot_pos + 1..];

    let expected = signature_of(value, secret);

    if constant_time_eq(&expected, provided) {
        Some(value.to_string())
    } else {
        None
    }
}

/// Verify against each candidate secret in order, first match wins
pub fn unsign_with_secrets(signed_value: &str, secrets: &[String]) -> Option<String> {
    secrets
        .iter()
        .find_map(|secret| unsign(signed_value, secret))
}

/// Constant-time comparison to prevent signature timing attacks
fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut diff = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        diff |= x ^ y;
    }
    diff == 0
}
