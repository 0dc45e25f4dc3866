//! Webhook signature verification.
//!
//! The signature header looks like `t=1700000000,v1=<hex>[,v1=<hex>...]`.
//! Each `v1` is an HMAC-SHA256 of `"{t}.{payload}"` keyed with the webhook
//! secret; one match is enough.

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;

use super::PaymentError;

/// Signatures older than this are rejected as replays.
pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

/// Verify a webhook payload against its signature header at time `now`.
///
/// # Errors
///
/// Returns `PaymentError::InvalidSignature` if the header is malformed, the
/// timestamp is outside `tolerance_secs`, or no signature matches.
pub fn verify_signature(
    secret: &SecretString,
    payload: &str,
    header: &str,
    tolerance_secs: i64,
    now: i64,
) -> Result<(), PaymentError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = Some(value),
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }

    let timestamp =
        timestamp.ok_or_else(|| PaymentError::InvalidSignature("Missing timestamp".to_string()))?;
    let ts: i64 = timestamp
        .parse()
        .map_err(|_| PaymentError::InvalidSignature("Invalid timestamp".to_string()))?;

    // An absurd `t=` must not overflow the subtraction.
    let within = now
        .checked_sub(ts)
        .map(i64::unsigned_abs)
        .is_some_and(|age| age <= tolerance_secs.unsigned_abs());
    if !within {
        return Err(PaymentError::InvalidSignature(
            "Timestamp outside tolerance".to_string(),
        ));
    }
    if signatures.is_empty() {
        return Err(PaymentError::InvalidSignature(
            "Missing v1 signature".to_string(),
        ));
    }

    let expected = sign(secret, timestamp, payload)?;
    if signatures
        .iter()
        .any(|candidate| constant_time_compare(&expected, candidate))
    {
        Ok(())
    } else {
        Err(PaymentError::InvalidSignature(
            "Signature mismatch".to_string(),
        ))
    }
}

/// Hex HMAC-SHA256 of `"{timestamp}.{payload}"`.
///
/// # Errors
///
/// Returns `PaymentError::InvalidSignature` if the key is unusable.
pub fn sign(secret: &SecretString, timestamp: &str, payload: &str) -> Result<String, PaymentError> {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.expose_secret().as_bytes())
        .map_err(|e| PaymentError::InvalidSignature(e.to_string()))?;
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(payload.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result: u8 = 0;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }

    result == 0
}
