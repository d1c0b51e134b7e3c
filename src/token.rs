//! Bearer credential wire format.
//!
//! DESIGN
//! ======
//! Tokens are JWT-shaped: `header.payload.signature`, each segment base64url
//! without padding. The client only ever reads the payload claims to decide
//! locally whether a persisted token is worth sending to `/me`; signature
//! verification belongs to whoever issued the token.

use std::time::{SystemTime, UNIX_EPOCH};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};

/// Errors produced while decoding a token's embedded claims.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    /// The token does not have exactly three dot-separated segments.
    #[error("malformed token: expected 3 segments, found {0}")]
    Segments(usize),

    /// The payload segment is not valid base64url.
    #[error("malformed token payload: {0}")]
    Base64(String),

    /// The payload decoded but is not a JSON object with an integer `exp`.
    #[error("malformed token claims: {0}")]
    Claims(String),
}

/// Claims embedded in a token payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Expiry, seconds since the Unix epoch.
    pub exp: u64,
    /// Subject (user id), if the issuer includes it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    /// Issued-at, seconds since the Unix epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<u64>,
    /// Unique token id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
}

impl Claims {
    /// A token is expired once `now` reaches its `exp`.
    #[must_use]
    pub fn is_expired_at(&self, now: u64) -> bool {
        self.exp <= now
    }

    /// Seconds of validity left at `now` (zero once expired).
    #[must_use]
    pub fn remaining_at(&self, now: u64) -> u64 {
        self.exp.saturating_sub(now)
    }
}

/// Decode the claims of a token without verifying its signature.
///
/// # Errors
///
/// Returns [`TokenError`] when the token is not three segments, the payload
/// is not base64url, or the payload JSON has no integer `exp`.
pub fn decode_claims(token: &str) -> Result<Claims, TokenError> {
    let segments: Vec<&str> = token.trim().split('.').collect();
    if segments.len() != 3 {
        return Err(TokenError::Segments(segments.len()));
    }
    let raw = decode_segment(segments[1])?;
    serde_json::from_slice::<Claims>(&raw).map_err(|e| TokenError::Claims(e.to_string()))
}

/// Whether a token is unusable at `now`: malformed tokens count as expired.
#[must_use]
pub fn is_expired_at(token: &str, now: u64) -> bool {
    decode_claims(token).map_or(true, |claims| claims.is_expired_at(now))
}

/// Encode a single token segment.
pub(crate) fn encode_segment(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

pub(crate) fn decode_segment(segment: &str) -> Result<Vec<u8>, TokenError> {
    URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|e| TokenError::Base64(e.to_string()))
}

/// Current wall-clock time in seconds since the Unix epoch.
#[must_use]
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs())
}

/// Short, non-reversible label for a token, safe to put in logs.
#[must_use]
pub fn fingerprint(token: &str) -> String {
    let tail: String = token
        .chars()
        .rev()
        .take(6)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    format!("…{tail}")
}

#[cfg(test)]
#[path = "token_test.rs"]
mod tests;
