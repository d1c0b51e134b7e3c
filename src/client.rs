//! Authenticated API client: the request authenticator.
//!
//! SYSTEM CONTEXT
//! ==============
//! Every call the application makes to the backend goes through
//! [`ApiClient::execute`]. It is the only place that attaches the bearer
//! credential, adopts rotated credentials, and reacts to 401.
//!
//! TRADE-OFFS
//! ==========
//! The token is read when a request is dispatched. Two requests sent back to
//! back carry the same token even if the first response rotates it; the
//! server tolerates the previous token for a grace window, so no queuing is
//! done around rotation.
//!
//! A 401 from any endpoint tears the session down. There is no attempt to
//! refresh and retry first.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::config::ClientConfig;
use crate::context::SessionContext;
use crate::session::SessionStatus;
use crate::token::fingerprint;
use crate::types::{AuthPayload, Credentials, ProfilePayload, RefreshPayload, Registration};

/// Errors produced by API calls.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The request never produced a response (connect, timeout, TLS).
    #[error("API request failed: {0}")]
    Network(String),

    /// The server answered 401. The session has already been torn down.
    #[error("unauthorized: {message}")]
    Unauthorized { message: String },

    /// Any other non-success status.
    #[error("API response error: status {status}: {message}")]
    Status { status: u16, message: String },

    /// A success response whose body did not match the expected shape.
    #[error("API response parse failed: {0}")]
    Decode(String),

    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
}

impl ApiError {
    /// Message suitable for showing to the person who submitted a form.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Unauthorized { message } | Self::Status { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

/// Authentication endpoints consumed by the session layer.
#[async_trait::async_trait]
pub trait AuthApi: Send + Sync {
    /// `POST /login`.
    async fn login(&self, credentials: &Credentials) -> Result<AuthPayload, ApiError>;

    /// `POST /register`.
    async fn register(&self, registration: &Registration) -> Result<AuthPayload, ApiError>;

    /// `GET /me` with an explicit bearer token. A replacement token in the
    /// rotation header comes back in `rotated_token`.
    async fn me(&self, token: &str) -> Result<ProfilePayload, ApiError>;

    /// `POST /refresh` with the session's current token.
    async fn refresh(&self) -> Result<RefreshPayload, ApiError>;
}

// =============================================================================
// CLIENT
// =============================================================================

#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    rotation_header: HeaderName,
    ctx: SessionContext,
}

impl ApiClient {
    /// Build a client with the configured timeouts.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::HttpClientBuild`] if the HTTP client or the rotation
    /// header name is invalid.
    pub fn new(config: &ClientConfig, ctx: SessionContext) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeouts.request_secs))
            .connect_timeout(Duration::from_secs(config.timeouts.connect_secs))
            .build()
            .map_err(|e| ApiError::HttpClientBuild(e.to_string()))?;
        Self::with_http(http, &config.api_url, &config.rotation_header, ctx)
    }

    /// Build a client around an existing `reqwest::Client`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::HttpClientBuild`] if `rotation_header` is not a
    /// valid header name.
    pub fn with_http(
        http: reqwest::Client,
        base_url: &str,
        rotation_header: &str,
        ctx: SessionContext,
    ) -> Result<Self, ApiError> {
        let rotation_header = HeaderName::from_bytes(rotation_header.as_bytes())
            .map_err(|e| ApiError::HttpClientBuild(format!("rotation header {rotation_header:?}: {e}")))?;
        Ok(Self { http, base_url: base_url.trim_end_matches('/').to_string(), rotation_header, ctx })
    }

    #[must_use]
    pub fn context(&self) -> &SessionContext {
        &self.ctx
    }

    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Start a request against `path`; send it with [`ApiClient::execute`].
    #[must_use]
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http.request(method, self.url(path))
    }

    /// Send a request with the session's current token attached.
    ///
    /// Statuses other than 401 are returned to the caller untouched.
    ///
    /// # Errors
    ///
    /// [`ApiError::Network`] when no response arrives;
    /// [`ApiError::Unauthorized`] on 401, after logging the session out.
    pub async fn execute(&self, request: RequestBuilder) -> Result<Response, ApiError> {
        let token = self.ctx.token();
        self.dispatch(request, token).await
    }

    /// `GET path`, decoding a JSON body.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::execute`]; non-success statuses become
    /// [`ApiError::Status`] and bad bodies [`ApiError::Decode`].
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let response = self.execute(self.request(Method::GET, path)).await?;
        read_json(response).await
    }

    /// `POST path` with a JSON body, decoding a JSON body.
    ///
    /// # Errors
    ///
    /// Same as [`ApiClient::get_json`].
    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + Sync + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .execute(self.request(Method::POST, path).json(body))
            .await?;
        read_json(response).await
    }

    async fn dispatch(&self, request: RequestBuilder, token: Option<String>) -> Result<Response, ApiError> {
        let request = match token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };
        let response = request
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            let url = response.url().path().to_owned();
            let body = response.text().await.unwrap_or_default();
            let message = error_message(status, &body);
            tracing::warn!(path = %url, %message, "authorization denied; logging out");
            self.ctx.logout();
            return Err(ApiError::Unauthorized { message });
        }
        if status.is_success() {
            self.adopt_rotated_token(response.headers());
        }
        Ok(response)
    }

    fn rotation_from<'h>(&self, headers: &'h HeaderMap) -> Option<&'h str> {
        headers
            .get(&self.rotation_header)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }

    fn adopt_rotated_token(&self, headers: &HeaderMap) {
        let Some(token) = self.rotation_from(headers) else {
            return;
        };
        if self.ctx.status() != SessionStatus::Authenticated {
            tracing::debug!(token = %fingerprint(token), "rotation header ignored; session not authenticated");
            return;
        }
        if self.ctx.token().as_deref() == Some(token) {
            return;
        }
        if let Err(e) = self.ctx.rotate_token(token.to_owned()) {
            tracing::debug!(error = %e, "rotation header ignored");
        }
    }
}

#[async_trait::async_trait]
impl AuthApi for ApiClient {
    async fn login(&self, credentials: &Credentials) -> Result<AuthPayload, ApiError> {
        self.post_json("/login", credentials).await
    }

    async fn register(&self, registration: &Registration) -> Result<AuthPayload, ApiError> {
        self.post_json("/register", registration).await
    }

    async fn me(&self, token: &str) -> Result<ProfilePayload, ApiError> {
        let response = self
            .dispatch(self.request(Method::GET, "/me"), Some(token.to_owned()))
            .await?;
        let rotated_token = self
            .rotation_from(response.headers())
            .filter(|rotated| *rotated != token)
            .map(str::to_owned);
        let mut profile: ProfilePayload = read_json(response).await?;
        profile.rotated_token = rotated_token;
        Ok(profile)
    }

    async fn refresh(&self) -> Result<RefreshPayload, ApiError> {
        self.post_json("/refresh", &serde_json::json!({})).await
    }
}

// =============================================================================
// RESPONSE HELPERS
// =============================================================================

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| ApiError::Network(e.to_string()))?;
    if !status.is_success() {
        return Err(ApiError::Status { status: status.as_u16(), message: error_message(status, &body) });
    }
    serde_json::from_str(&body).map_err(|e| ApiError::Decode(e.to_string()))
}

/// Human-readable failure message from an error body: the JSON `error` or
/// `message` field, else the raw body, else the status reason.
pub(crate) fn error_message(status: StatusCode, body: &str) -> String {
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(body) {
        for key in ["error", "message"] {
            if let Some(text) = map.get(key).and_then(Value::as_str) {
                return text.to_owned();
            }
        }
    }
    let trimmed = body.trim();
    if !trimmed.is_empty() {
        return trimmed.to_owned();
    }
    status
        .canonical_reason()
        .map_or_else(|| status.as_u16().to_string(), str::to_owned)
}

#[cfg(test)]
#[path = "client_test.rs"]
mod tests;
