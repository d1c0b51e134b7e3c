//! Shared fixtures for unit tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::Router;

use crate::client::{ApiError, AuthApi};
use crate::context::SessionContext;
use crate::store::MemoryTokenStore;
use crate::token::encode_segment;
use crate::types::{AuthPayload, Credentials, Organization, ProfilePayload, RefreshPayload, Registration, User};

/// Serve `router` on an ephemeral local port and return its base URL.
pub async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("test server");
    });
    format!("http://{addr}")
}

/// Unsigned JWT-shaped token expiring at `exp`.
#[must_use]
pub fn token_expiring_at(exp: u64, jti: &str) -> String {
    format!(
        "{}.{}.{}",
        encode_segment(br#"{"alg":"none","typ":"JWT"}"#),
        encode_segment(format!(r#"{{"exp":{exp},"jti":"{jti}"}}"#).as_bytes()),
        encode_segment(b"test")
    )
}

#[must_use]
pub fn admin_user() -> User {
    User { nome: "Admin".into(), nivel_acesso: Some("admin".into()), ..User::default() }
}

#[must_use]
pub fn acme() -> Organization {
    Organization { razao_social: "Acme".into(), ..Organization::default() }
}

/// Context over a fresh in-memory store, returned alongside the store.
#[must_use]
pub fn memory_context() -> (SessionContext, Arc<MemoryTokenStore>) {
    let store = Arc::new(MemoryTokenStore::new());
    (SessionContext::new(store.clone()), store)
}

/// Scripted [`AuthApi`] that counts every call.
pub struct MockAuthApi {
    pub login_result: std::sync::Mutex<Option<Result<AuthPayload, ApiError>>>,
    pub me_result: std::sync::Mutex<Option<Result<ProfilePayload, ApiError>>>,
    pub refresh_result: std::sync::Mutex<Option<Result<RefreshPayload, ApiError>>>,
    pub login_calls: AtomicUsize,
    pub register_calls: AtomicUsize,
    pub me_calls: AtomicUsize,
    pub refresh_calls: AtomicUsize,
    pub last_me_token: std::sync::Mutex<Option<String>>,
}

impl MockAuthApi {
    #[must_use]
    pub fn new() -> Self {
        Self {
            login_result: std::sync::Mutex::new(None),
            me_result: std::sync::Mutex::new(None),
            refresh_result: std::sync::Mutex::new(None),
            login_calls: AtomicUsize::new(0),
            register_calls: AtomicUsize::new(0),
            me_calls: AtomicUsize::new(0),
            refresh_calls: AtomicUsize::new(0),
            last_me_token: std::sync::Mutex::new(None),
        }
    }

    #[must_use]
    pub fn with_login(self, result: Result<AuthPayload, ApiError>) -> Self {
        *self.login_result.lock().expect("mock mutex") = Some(result);
        self
    }

    #[must_use]
    pub fn with_me(self, result: Result<ProfilePayload, ApiError>) -> Self {
        *self.me_result.lock().expect("mock mutex") = Some(result);
        self
    }

    #[must_use]
    pub fn with_refresh(self, result: Result<RefreshPayload, ApiError>) -> Self {
        *self.refresh_result.lock().expect("mock mutex") = Some(result);
        self
    }

    pub fn total_calls(&self) -> usize {
        self.login_calls.load(Ordering::SeqCst)
            + self.register_calls.load(Ordering::SeqCst)
            + self.me_calls.load(Ordering::SeqCst)
            + self.refresh_calls.load(Ordering::SeqCst)
    }
}

fn take<T>(slot: &std::sync::Mutex<Option<Result<T, ApiError>>>) -> Result<T, ApiError> {
    slot.lock()
        .expect("mock mutex")
        .take()
        .unwrap_or_else(|| Err(ApiError::Network("no scripted response".into())))
}

#[async_trait::async_trait]
impl AuthApi for MockAuthApi {
    async fn login(&self, _credentials: &Credentials) -> Result<AuthPayload, ApiError> {
        self.login_calls.fetch_add(1, Ordering::SeqCst);
        take(&self.login_result)
    }

    async fn register(&self, _registration: &Registration) -> Result<AuthPayload, ApiError> {
        self.register_calls.fetch_add(1, Ordering::SeqCst);
        take(&self.login_result)
    }

    async fn me(&self, token: &str) -> Result<ProfilePayload, ApiError> {
        self.me_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_me_token.lock().expect("mock mutex") = Some(token.to_owned());
        take(&self.me_result)
    }

    async fn refresh(&self) -> Result<RefreshPayload, ApiError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        take(&self.refresh_result)
    }
}
