//! Webhook payload signing
//!
//! HMAC-SHA256 over the canonical payload bytes, hex-encoded. The signature
//! is computed once per event and reused verbatim on every delivery attempt,
//! so receivers can deduplicate on it.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Computes the hex-encoded HMAC-SHA256 signature for a payload
pub fn sign_payload(secret: &str, payload: &[u8]) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

/// Renders the `X-Webhook-Signature` header value: `sha256={hex}`
pub fn signature_header(signature_hex: &str) -> String {
    format!("sha256={}", signature_hex)
}

/// Verifies a hex signature against a payload in constant time
///
/// Receiver-side helper: recompute over the raw body and compare.
pub fn verify_signature(secret: &str, payload: &[u8], provided_hex: &str) -> bool {
    let expected = sign_payload(secret, payload);
    constant_time_eq(expected.as_bytes(), provided_hex.as_bytes())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;

    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }

    result == 0
}
