// SPDX-FileCopyrightText: 2026 Tipflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Webhook signature verification.
//!
//! The processor signs each delivery with a `t=<unix>,v1=<hex>` header
//! where `v1` is HMAC-SHA256 over `"{t}.{body}"` with the shared webhook
//! secret. Verification checks the timestamp against a tolerance window
//! first (replay prevention), then the MAC in constant time.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Why a webhook delivery failed verification.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    /// The header is missing pieces or not in `t=...,v1=...` form.
    #[error("malformed signature header")]
    Malformed,

    /// The signed timestamp is outside the tolerance window.
    #[error("signature timestamp outside tolerance window")]
    TimestampOutOfTolerance,

    /// The MAC does not match the payload.
    #[error("signature mismatch")]
    Mismatch,
}

/// Verify a webhook delivery.
///
/// `header` is the raw signature header value, `payload` the exact raw
/// request body, `tolerance_secs` the maximum allowed clock skew in
/// either direction.
pub fn verify_signature(
    payload: &[u8],
    header: &str,
    secret: &str,
    now: DateTime<Utc>,
    tolerance_secs: i64,
) -> Result<(), SignatureError> {
    let (timestamp, provided_mac) = parse_header(header)?;

    let age = now.timestamp() - timestamp;
    if age.abs() > tolerance_secs {
        return Err(SignatureError::TimestampOutOfTolerance);
    }

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| SignatureError::Malformed)?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);

    mac.verify_slice(&provided_mac)
        .map_err(|_| SignatureError::Mismatch)
}

/// Split `t=<unix>,v1=<hex>` into its parts. Unknown elements are
/// ignored so the processor can add schemes without breaking us.
fn parse_header(header: &str) -> Result<(i64, Vec<u8>), SignatureError> {
    let mut timestamp = None;
    let mut mac = None;

    for element in header.split(',') {
        match element.trim().split_once('=') {
            Some(("t", value)) => {
                timestamp = Some(value.parse::<i64>().map_err(|_| SignatureError::Malformed)?);
            }
            Some(("v1", value)) => {
                mac = Some(hex::decode(value).map_err(|_| SignatureError::Malformed)?);
            }
            _ => {}
        }
    }

    match (timestamp, mac) {
        (Some(t), Some(m)) => Ok((t, m)),
        _ => Err(SignatureError::Malformed),
    }
}

/// Compute the signature header for a payload. Used by outbound tests and
/// the test harness; the production path only verifies.
pub fn sign_payload(payload: &[u8], secret: &str, at: DateTime<Utc>) -> String {
    let timestamp = at.timestamp();
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts any key length");
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    format!("t={timestamp},v1={}", hex::encode(mac.finalize().into_bytes()))
}
