//! Configuration parsed from environment variables.
//!
//! Both configs are built from a key lookup function so tests can feed a map
//! instead of mutating the process environment.

use std::path::PathBuf;

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:3001/api";
pub const DEFAULT_ROTATION_HEADER: &str = "x-new-token";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

pub const DEFAULT_PORT: u16 = 3001;
pub const DEFAULT_TOKEN_TTL_SECS: u64 = 3600;
pub const DEFAULT_RENEW_WITHIN_SECS: u64 = 900;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpTimeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

// =============================================================================
// CLIENT
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL of the authentication API, without trailing slash.
    pub api_url: String,
    /// File backing the token store.
    pub token_file: PathBuf,
    /// Response header that carries a rotated token.
    pub rotation_header: String,
    /// Role that bypasses permission membership checks.
    pub admin_role: String,
    pub timeouts: HttpTimeouts,
}

impl ClientConfig {
    /// Build client config from the process environment.
    ///
    /// Optional:
    /// - `LICITAI_API_URL`: default `http://127.0.0.1:3001/api`
    /// - `LICITAI_TOKEN_FILE`: default `$HOME/.licitai/token`
    /// - `LICITAI_ROTATION_HEADER`: default `x-new-token`
    /// - `LICITAI_ADMIN_ROLE`: default `admin`
    /// - `LICITAI_REQUEST_TIMEOUT_SECS`: default 30
    /// - `LICITAI_CONNECT_TIMEOUT_SECS`: default 10
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a numeric variable does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// # Errors
    ///
    /// See [`ClientConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_url = lookup("LICITAI_API_URL")
            .unwrap_or_else(|| DEFAULT_API_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        let token_file = lookup("LICITAI_TOKEN_FILE").map_or_else(|| default_token_file(&lookup), PathBuf::from);
        let rotation_header = lookup("LICITAI_ROTATION_HEADER")
            .unwrap_or_else(|| DEFAULT_ROTATION_HEADER.to_string())
            .to_ascii_lowercase();
        let admin_role = lookup("LICITAI_ADMIN_ROLE").unwrap_or_else(|| crate::session::DEFAULT_ADMIN_ROLE.to_string());
        let timeouts = HttpTimeouts {
            request_secs: parse_or(&lookup, "LICITAI_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS)?,
            connect_secs: parse_or(&lookup, "LICITAI_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS)?,
        };

        Ok(Self { api_url, token_file, rotation_header, admin_role, timeouts })
    }
}

fn default_token_file<F>(lookup: &F) -> PathBuf
where
    F: Fn(&str) -> Option<String>,
{
    lookup("HOME")
        .filter(|home| !home.is_empty())
        .map_or_else(std::env::temp_dir, PathBuf::from)
        .join(".licitai")
        .join("token")
}

// =============================================================================
// DEV SERVER
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub port: u16,
    /// Signing secret for issued tokens.
    pub token_secret: String,
    pub token_ttl_secs: u64,
    /// Tokens with less than this much life left are renewed on use.
    pub renew_within_secs: u64,
    pub rotation_header: String,
}

impl ServerConfig {
    /// Build dev-server config from the process environment.
    ///
    /// Optional:
    /// - `PORT`: default 3001
    /// - `LICITAI_TOKEN_SECRET`: random per process when unset
    /// - `LICITAI_TOKEN_TTL_SECS`: default 3600
    /// - `LICITAI_RENEW_WITHIN_SECS`: default 900
    /// - `LICITAI_ROTATION_HEADER`: default `x-new-token`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a numeric variable does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// # Errors
    ///
    /// See [`ServerConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let token_secret = lookup("LICITAI_TOKEN_SECRET")
            .filter(|s| !s.is_empty())
            .unwrap_or_else(crate::server::tokens::random_secret);
        Ok(Self {
            port: parse_or(&lookup, "PORT", DEFAULT_PORT)?,
            token_secret,
            token_ttl_secs: parse_or(&lookup, "LICITAI_TOKEN_TTL_SECS", DEFAULT_TOKEN_TTL_SECS)?,
            renew_within_secs: parse_or(&lookup, "LICITAI_RENEW_WITHIN_SECS", DEFAULT_RENEW_WITHIN_SECS)?,
            rotation_header: lookup("LICITAI_ROTATION_HEADER")
                .unwrap_or_else(|| DEFAULT_ROTATION_HEADER.to_string())
                .to_ascii_lowercase(),
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
