//! Webhook signature verification
//!
//! Providers sign each delivery with a header of the form
//! `t=<unix-seconds>,v1=<hex-hmac>` where the digest is
//! `HMAC-SHA256(secret, "<t>.<raw body>")`.
//!
//! Verification operates on the exact bytes received. Parsed or re-serialized
//! JSON is never an acceptable input because serialization is not guaranteed
//! to reproduce the signed byte sequence.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Default replay window in seconds
pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

/// Signature verification failures
///
/// All variants map to an authentication rejection. None of them carry the
/// secret or the computed digest.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    /// Header missing, empty, or not `t=...,v1=...`
    #[error("Malformed signature header: {0}")]
    Malformed(String),

    /// Timestamp outside the replay window
    #[error("Signature timestamp outside tolerance ({skew_secs}s skew, max {tolerance_secs}s)")]
    Expired { skew_secs: i64, tolerance_secs: i64 },

    /// No `v1` digest matched
    #[error("Signature mismatch")]
    Mismatch,

    /// Secret could not be used as an HMAC key
    #[error("Invalid signing secret")]
    InvalidSecret,
}

/// Parsed `t=...,v1=...` header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeader {
    pub timestamp: i64,
    /// Decoded `v1` digests (a provider rotating secrets may send several)
    pub digests: Vec<Vec<u8>>,
}

impl SignatureHeader {
    /// Parse a signature header
    ///
    /// Unknown keys are ignored. At least one hex `v1` digest and exactly one
    /// integer `t` are required.
    pub fn parse(header: &str) -> Result<Self, SignatureError> {
        let mut timestamp = None;
        let mut digests = Vec::new();

        for part in header.split(',') {
            let Some((key, value)) = part.trim().split_once('=') else {
                return Err(SignatureError::Malformed(format!(
                    "segment without '=': {:?}",
                    part.trim()
                )));
            };

            match key.trim() {
                "t" => {
                    if timestamp.is_some() {
                        return Err(SignatureError::Malformed("duplicate timestamp".to_string()));
                    }
                    let parsed = value.trim().parse::<i64>().map_err(|_| {
                        SignatureError::Malformed("timestamp is not an integer".to_string())
                    })?;
                    timestamp = Some(parsed);
                }
                "v1" => {
                    let digest = hex::decode(value.trim()).map_err(|_| {
                        SignatureError::Malformed("v1 digest is not hex".to_string())
                    })?;
                    digests.push(digest);
                }
                _ => {}
            }
        }

        let timestamp =
            timestamp.ok_or_else(|| SignatureError::Malformed("missing timestamp".to_string()))?;
        if digests.is_empty() {
            return Err(SignatureError::Malformed("missing v1 digest".to_string()));
        }

        Ok(Self { timestamp, digests })
    }
}

/// Verify a signature header against the raw request body using the current time
pub fn verify_signature(
    raw_body: &[u8],
    header: &str,
    secret: &str,
    tolerance_secs: i64,
) -> Result<(), SignatureError> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0);
    verify_signature_at(raw_body, header, secret, tolerance_secs, now)
}

/// Verify a signature header against the raw request body at a given time
///
/// Digest comparison is constant-time (`Mac::verify_slice`).
///
/// # Examples
///
/// ```
/// use lexline_common::api::signature::{sign_payload, verify_signature_at};
///
/// let body = br#"{"conversation_id":"conv_1"}"#;
/// let header = sign_payload(body, "whsec_test", 1_700_000_000);
///
/// assert!(verify_signature_at(body, &header, "whsec_test", 300, 1_700_000_100).is_ok());
/// assert!(verify_signature_at(body, &header, "whsec_test", 300, 1_700_000_400).is_err());
/// assert!(verify_signature_at(b"{}", &header, "whsec_test", 300, 1_700_000_000).is_err());
/// ```
pub fn verify_signature_at(
    raw_body: &[u8],
    header: &str,
    secret: &str,
    tolerance_secs: i64,
    now_unix: i64,
) -> Result<(), SignatureError> {
    let parsed = SignatureHeader::parse(header)?;

    let skew = (now_unix - parsed.timestamp).abs();
    if skew > tolerance_secs {
        return Err(SignatureError::Expired {
            skew_secs: skew,
            tolerance_secs,
        });
    }

    let mac = keyed_mac(secret, parsed.timestamp, raw_body)?;

    let matched = parsed
        .digests
        .iter()
        .any(|digest| mac.clone().verify_slice(digest).is_ok());

    if matched {
        Ok(())
    } else {
        Err(SignatureError::Mismatch)
    }
}

/// Produce a `t=...,v1=...` header for a body
///
/// Used by clients that re-sign forwarded deliveries and by tests.
pub fn sign_payload(raw_body: &[u8], secret: &str, timestamp: i64) -> String {
    let digest = match keyed_mac(secret, timestamp, raw_body) {
        Ok(mac) => hex::encode(mac.finalize().into_bytes()),
        Err(_) => String::new(),
    };
    format!("t={},v1={}", timestamp, digest)
}

fn keyed_mac(secret: &str, timestamp: i64, raw_body: &[u8]) -> Result<HmacSha256, SignatureError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| SignatureError::InvalidSecret)?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(raw_body);
    Ok(mac)
}
