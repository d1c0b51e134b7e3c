//! Login, registration, refresh and logout flows.
//!
//! Each flow drives the session context through the state machine actions
//! and returns a typed result to the caller. Submission failures are the
//! caller's to display; the session itself always ends in a renderable state.

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::client::{ApiError, AuthApi};
use crate::context::SessionContext;
use crate::session::SessionError;
use crate::types::{AuthPayload, Credentials, Registration, User};

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The server refused the submission (bad credentials, validation).
    #[error("{message}")]
    Rejected { status: u16, message: String },

    /// The request could not be completed.
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Session(#[from] SessionError),
}

impl AuthError {
    fn from_submission(error: ApiError) -> Self {
        match error {
            ApiError::Unauthorized { message } => Self::Rejected { status: 401, message },
            ApiError::Status { status, message } if (400..500).contains(&status) => Self::Rejected { status, message },
            other => Self::Api(other),
        }
    }
}

#[derive(Clone)]
pub struct AuthService {
    ctx: SessionContext,
    api: Arc<dyn AuthApi>,
}

impl AuthService {
    #[must_use]
    pub fn new(ctx: SessionContext, api: Arc<dyn AuthApi>) -> Self {
        Self { ctx, api }
    }

    #[must_use]
    pub fn context(&self) -> &SessionContext {
        &self.ctx
    }

    /// Submit credentials; on success the session is authenticated and the
    /// token persisted.
    ///
    /// # Errors
    ///
    /// [`AuthError::Rejected`] for 4xx answers, [`AuthError::Api`] otherwise.
    /// Either way the session ends anonymous and not loading.
    pub async fn login(&self, credentials: &Credentials) -> Result<User, AuthError> {
        self.ctx.begin_loading();
        let result = self.api.login(credentials).await;
        self.settle("login", &credentials.email, result)
    }

    /// Create an account and sign into it.
    ///
    /// # Errors
    ///
    /// Same as [`AuthService::login`].
    pub async fn register(&self, registration: &Registration) -> Result<User, AuthError> {
        self.ctx.begin_loading();
        let result = self.api.register(registration).await;
        self.settle("register", &registration.email, result)
    }

    /// Ask the server for a fresh token and adopt it.
    ///
    /// # Errors
    ///
    /// [`AuthError::Session`] when not authenticated (no request is sent);
    /// [`AuthError::Api`] when the call fails. A 401 has already logged the
    /// session out by the time it is returned.
    pub async fn refresh(&self) -> Result<(), AuthError> {
        if !self.ctx.snapshot().is_authenticated() {
            return Err(SessionError::NotAuthenticated.into());
        }
        let payload = self.api.refresh().await?;
        self.ctx.rotate_token(payload.token)?;
        Ok(())
    }

    pub fn logout(&self) {
        self.ctx.logout();
    }

    /// # Errors
    ///
    /// See [`SessionContext::update_user`].
    pub fn update_user(&self, patch: &Map<String, Value>) -> Result<(), AuthError> {
        Ok(self.ctx.update_user(patch)?)
    }

    /// # Errors
    ///
    /// See [`SessionContext::update_organization`].
    pub fn update_organization(&self, patch: &Map<String, Value>) -> Result<(), AuthError> {
        Ok(self.ctx.update_organization(patch)?)
    }

    fn settle(&self, flow: &'static str, email: &str, result: Result<AuthPayload, ApiError>) -> Result<User, AuthError> {
        match result {
            Ok(payload) => {
                let user = payload.user.clone();
                self.ctx
                    .login_succeeded(payload.user, payload.organization, payload.token, payload.permissions);
                Ok(user)
            }
            Err(e) => {
                tracing::info!(flow, %email, error = %e, "authentication failed");
                self.ctx.login_failed();
                Err(AuthError::from_submission(e))
            }
        }
    }
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
