//! Development stub of the authentication API.
//!
//! SYSTEM CONTEXT
//! ==============
//! The production backend is external. This router implements the same
//! contract in memory so the CLI and the end-to-end tests have something
//! real to talk to: `/login`, `/register`, `/me`, `/refresh` under `/api`,
//! plus `/health`.

pub mod accounts;
pub mod auth;
pub mod tokens;

use std::sync::Arc;

use axum::Router;
use axum::http::HeaderName;
use axum::response::Json;
use axum::routing::{get, post};
use serde_json::{Value, json};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::{ConfigError, ServerConfig};
use accounts::Directory;
use tokens::TokenIssuer;

/// Shared state injected into handlers via the `State` extractor.
#[derive(Clone)]
pub struct ServerState {
    pub issuer: Arc<TokenIssuer>,
    pub directory: Directory,
    pub rotation_header: HeaderName,
    pub renew_within_secs: u64,
}

impl ServerState {
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the rotation header name is invalid.
    pub fn new(config: &ServerConfig, directory: Directory) -> Result<Self, ConfigError> {
        let rotation_header =
            HeaderName::from_bytes(config.rotation_header.as_bytes()).map_err(|_| ConfigError::Invalid {
                key: "LICITAI_ROTATION_HEADER",
                value: config.rotation_header.clone(),
            })?;
        Ok(Self {
            issuer: Arc::new(TokenIssuer::new(config.token_secret.clone(), config.token_ttl_secs)),
            directory,
            rotation_header,
            renew_within_secs: config.renew_within_secs,
        })
    }
}

fn api_routes() -> Router<ServerState> {
    Router::new()
        .route("/health", get(health))
        .route("/login", post(auth::login))
        .route("/register", post(auth::register))
        .route("/me", get(auth::me))
        .route("/refresh", post(auth::refresh))
}

/// Full router: API under `/api`, health also at the root.
pub fn app(state: ServerState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers([state.rotation_header.clone()]);

    Router::new()
        .route("/health", get(health))
        .nest("/api", api_routes())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Bind `0.0.0.0:port` and serve until the process exits.
///
/// # Errors
///
/// Returns an I/O error if binding or serving fails.
pub async fn serve(config: &ServerConfig, state: ServerState) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?;
    tracing::info!(
        port = config.port,
        ttl_secs = state.issuer.ttl_secs(),
        renew_within_secs = state.renew_within_secs,
        "licitai auth stub listening"
    );
    axum::serve(listener, app(state)).await
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
