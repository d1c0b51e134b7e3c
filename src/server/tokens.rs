//! Token issuing and verification for the development API.
//!
//! Tokens use the same JWT shape the client decodes. The signature segment is
//! HMAC-SHA256 over `header "." payload`, keyed with the server secret, and
//! is checked in constant time.

use std::fmt::Write;

use hmac::{Hmac, Mac};
use rand::Rng;
use sha2::Sha256;

use crate::token::{Claims, decode_claims, decode_segment, encode_segment};

type HmacSha256 = Hmac<Sha256>;

const HEADER_JSON: &[u8] = br#"{"alg":"HS256","typ":"JWT"}"#;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TokenRejection {
    #[error("token malformed")]
    Malformed,
    #[error("token signature invalid")]
    BadSignature,
    #[error("token expired")]
    Expired,
}

pub(crate) fn bytes_to_hex(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(s, "{b:02x}");
    }
    s
}

/// Generate a random 32-byte hex signing secret.
#[must_use]
pub fn random_secret() -> String {
    let bytes: [u8; 32] = rand::rng().random();
    bytes_to_hex(&bytes)
}

fn random_jti() -> String {
    let bytes: [u8; 12] = rand::rng().random();
    bytes_to_hex(&bytes)
}

#[derive(Debug, Clone)]
pub struct TokenIssuer {
    secret: String,
    ttl_secs: u64,
}

impl TokenIssuer {
    #[must_use]
    pub fn new(secret: impl Into<String>, ttl_secs: u64) -> Self {
        Self { secret: secret.into(), ttl_secs }
    }

    #[must_use]
    pub fn ttl_secs(&self) -> u64 {
        self.ttl_secs
    }

    /// Issue a token for `subject`, valid for the configured TTL from `now`.
    #[must_use]
    pub fn issue_at(&self, subject: &str, now: u64) -> String {
        let claims = Claims {
            exp: now.saturating_add(self.ttl_secs),
            sub: Some(subject.to_owned()),
            iat: Some(now),
            jti: Some(random_jti()),
        };
        // Claims only holds strings and integers; serialization cannot fail.
        let payload = serde_json::to_vec(&claims).unwrap_or_default();
        let signing_input = format!("{}.{}", encode_segment(HEADER_JSON), encode_segment(&payload));
        let signature = encode_segment(&self.mac(&signing_input).finalize().into_bytes());
        format!("{signing_input}.{signature}")
    }

    /// Check signature and expiry, returning the claims.
    ///
    /// # Errors
    ///
    /// [`TokenRejection`] describing the first check that failed.
    pub fn verify_at(&self, token: &str, now: u64) -> Result<Claims, TokenRejection> {
        let (signing_input, signature) = token.rsplit_once('.').ok_or(TokenRejection::Malformed)?;
        let claims = decode_claims(token).map_err(|_| TokenRejection::Malformed)?;
        let signature = decode_segment(signature).map_err(|_| TokenRejection::Malformed)?;
        self.mac(signing_input)
            .verify_slice(&signature)
            .map_err(|_| TokenRejection::BadSignature)?;
        if claims.is_expired_at(now) {
            return Err(TokenRejection::Expired);
        }
        Ok(claims)
    }

    fn mac(&self, signing_input: &str) -> HmacSha256 {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .unwrap_or_else(|_| unreachable!("HMAC accepts keys of any length"));
        mac.update(signing_input.as_bytes());
        mac
    }
}

#[cfg(test)]
#[path = "tokens_test.rs"]
mod tests;
