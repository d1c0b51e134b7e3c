//! Auth routes: login, registration, profile, refresh.

use axum::extract::{FromRef, State};
use axum::http::{HeaderValue, StatusCode, header::AUTHORIZATION};
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;
use uuid::Uuid;

use super::ServerState;
use super::accounts::{Account, DirectoryError};
use super::tokens::TokenRejection;
use crate::token::{Claims, unix_now};
use crate::types::{AuthPayload, Credentials, RefreshPayload, Registration};

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

// =============================================================================
// AUTH EXTRACTOR
// =============================================================================

/// Account resolved from a valid bearer token.
/// Use as a handler parameter to require authentication.
pub struct BearerAccount {
    pub account: Account,
    pub claims: Claims,
}

impl<S> axum::extract::FromRequestParts<S> for BearerAccount
where
    ServerState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut axum::http::request::Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .unwrap_or_default();
        if token.is_empty() {
            return Err(error_response(StatusCode::UNAUTHORIZED, "missing bearer token"));
        }

        let state = ServerState::from_ref(state);
        let claims = state
            .issuer
            .verify_at(token, unix_now())
            .map_err(|e: TokenRejection| error_response(StatusCode::UNAUTHORIZED, &e.to_string()))?;
        let account_id = claims
            .sub
            .as_deref()
            .and_then(|sub| Uuid::parse_str(sub).ok())
            .ok_or_else(|| error_response(StatusCode::UNAUTHORIZED, "token subject invalid"))?;
        let account = state
            .directory
            .find(account_id)
            .await
            .ok_or_else(|| error_response(StatusCode::UNAUTHORIZED, "account no longer exists"))?;

        Ok(Self { account, claims })
    }
}

/// Attach a fresh token in the rotation header when the presented one is
/// inside the renewal window.
fn with_sliding_renewal(state: &ServerState, auth: &BearerAccount, mut response: Response) -> Response {
    let now = unix_now();
    if auth.claims.remaining_at(now) > state.renew_within_secs {
        return response;
    }
    let fresh = state.issuer.issue_at(&auth.account.id.to_string(), now);
    match HeaderValue::from_str(&fresh) {
        Ok(value) => {
            response
                .headers_mut()
                .insert(state.rotation_header.clone(), value);
            tracing::debug!(account = %auth.account.id, "issued sliding renewal token");
        }
        Err(e) => tracing::error!(error = %e, "renewal token not a valid header value"),
    }
    response
}

fn auth_payload(state: &ServerState, account: Account) -> AuthPayload {
    let token = state.issuer.issue_at(&account.id.to_string(), unix_now());
    let profile = account.profile();
    AuthPayload { token, user: profile.user, organization: profile.organization, permissions: profile.permissions }
}

// =============================================================================
// HANDLERS
// =============================================================================

/// `POST /login`: verify credentials and issue a token.
pub async fn login(State(state): State<ServerState>, Json(credentials): Json<Credentials>) -> Response {
    match state
        .directory
        .authenticate(&credentials.email, &credentials.password)
        .await
    {
        Some(account) => {
            tracing::info!(email = %account.email, "login succeeded");
            Json(auth_payload(&state, account)).into_response()
        }
        None => {
            tracing::info!(email = %credentials.email, "login rejected");
            error_response(StatusCode::UNAUTHORIZED, "Credenciais inválidas")
        }
    }
}

/// `POST /register`: create account + organization and issue a token.
pub async fn register(State(state): State<ServerState>, Json(registration): Json<Registration>) -> Response {
    match state.directory.register(&registration).await {
        Ok(account) => {
            tracing::info!(email = %account.email, "account registered");
            (StatusCode::CREATED, Json(auth_payload(&state, account))).into_response()
        }
        Err(e @ DirectoryError::EmailTaken(_)) => error_response(StatusCode::CONFLICT, &e.to_string()),
        Err(e @ DirectoryError::MissingField(_)) => error_response(StatusCode::UNPROCESSABLE_ENTITY, &e.to_string()),
    }
}

/// `GET /me`: current user, organization and permissions.
pub async fn me(State(state): State<ServerState>, auth: BearerAccount) -> Response {
    let response = Json(auth.account.profile()).into_response();
    with_sliding_renewal(&state, &auth, response)
}

/// `POST /refresh`: explicit token renewal.
pub async fn refresh(State(state): State<ServerState>, auth: BearerAccount) -> Json<RefreshPayload> {
    let token = state
        .issuer
        .issue_at(&auth.account.id.to_string(), unix_now());
    Json(RefreshPayload { token })
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
