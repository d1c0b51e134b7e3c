//! Shared session handle.
//!
//! DESIGN
//! ======
//! `SessionContext` is the explicit, injectable replacement for a global auth
//! provider. Clones share one [`Session`] held in a `watch` channel, so any
//! component can read a synchronous snapshot or subscribe to transitions.
//! Every action that the state machine defines with a persistence side
//! effect (login, rotation, logout) writes through to the [`TokenStore`]
//! here.
//!
//! Store failures are logged and swallowed: the in-memory session stays the
//! source of truth and nothing in this layer is fatal.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::{Map, Value};
use tokio::sync::watch;

use crate::session::{DEFAULT_ADMIN_ROLE, Session, SessionError, SessionStatus};
use crate::store::TokenStore;
use crate::token::fingerprint;
use crate::types::{Organization, User};

#[derive(Clone)]
pub struct SessionContext {
    inner: Arc<Inner>,
}

struct Inner {
    state: watch::Sender<Session>,
    store: Arc<dyn TokenStore>,
    admin_role: String,
    bootstrapped: AtomicBool,
}

impl SessionContext {
    #[must_use]
    pub fn new(store: Arc<dyn TokenStore>) -> Self {
        Self::with_admin_role(store, DEFAULT_ADMIN_ROLE)
    }

    #[must_use]
    pub fn with_admin_role(store: Arc<dyn TokenStore>, admin_role: impl Into<String>) -> Self {
        let (state, _) = watch::channel(Session::new());
        Self {
            inner: Arc::new(Inner {
                state,
                store,
                admin_role: admin_role.into(),
                bootstrapped: AtomicBool::new(false),
            }),
        }
    }

    // =========================================================================
    // READS
    // =========================================================================

    #[must_use]
    pub fn snapshot(&self) -> Session {
        self.inner.state.borrow().clone()
    }

    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.inner.state.borrow().status()
    }

    /// Token to attach to the next outbound request, read at call time.
    #[must_use]
    pub fn token(&self) -> Option<String> {
        self.inner.state.borrow().token().map(str::to_owned)
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.inner.state.subscribe()
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn TokenStore> {
        &self.inner.store
    }

    #[must_use]
    pub fn admin_role(&self) -> &str {
        &self.inner.admin_role
    }

    #[must_use]
    pub fn has_permission(&self, capability: &str) -> bool {
        self.inner
            .state
            .borrow()
            .has_permission(capability, &self.inner.admin_role)
    }

    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.inner.state.borrow().has_role(role)
    }

    #[must_use]
    pub fn has_any_role<I, S>(&self, roles: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.inner.state.borrow().has_any_role(roles)
    }

    // =========================================================================
    // ACTIONS
    // =========================================================================

    pub fn begin_loading(&self) {
        self.inner.state.send_modify(Session::begin_loading);
    }

    pub fn login_succeeded(
        &self,
        user: User,
        organization: Option<Organization>,
        token: String,
        permissions: Vec<String>,
    ) {
        self.save_token(&token);
        tracing::info!(user = %user.nome, token = %fingerprint(&token), "session authenticated");
        self.inner
            .state
            .send_modify(|session| session.login_succeeded(user, organization, token, permissions));
    }

    /// Tear the session down to anonymous and clear the store. Idempotent.
    pub fn logout(&self) {
        self.clear_token();
        let was = self.status();
        self.inner.state.send_modify(Session::logout);
        if was == SessionStatus::Authenticated {
            tracing::info!("session logged out");
        }
    }

    /// Login/register rejected: settle anonymous, not loading.
    pub fn login_failed(&self) {
        self.clear_token();
        self.inner.state.send_modify(Session::logout);
    }

    /// # Errors
    ///
    /// See [`Session::update_user`].
    pub fn update_user(&self, patch: &Map<String, Value>) -> Result<(), SessionError> {
        self.apply(|session| session.update_user(patch))
    }

    /// # Errors
    ///
    /// See [`Session::update_organization`].
    pub fn update_organization(&self, patch: &Map<String, Value>) -> Result<(), SessionError> {
        self.apply(|session| session.update_organization(patch))
    }

    /// Adopt a server-issued replacement token and persist it.
    ///
    /// # Errors
    ///
    /// [`SessionError::NotAuthenticated`] outside `Authenticated`; the store
    /// is not touched in that case.
    pub fn rotate_token(&self, token: String) -> Result<(), SessionError> {
        let fp = fingerprint(&token);
        self.apply(|session| session.rotate_token(token.clone()))?;
        self.save_token(&token);
        tracing::debug!(token = %fp, "session token rotated");
        Ok(())
    }

    /// Claim the one-per-process bootstrap slot. Returns `false` if it was
    /// already taken.
    pub(crate) fn claim_bootstrap(&self) -> bool {
        !self.inner.bootstrapped.swap(true, Ordering::SeqCst)
    }

    // Only publishes when the action succeeded, so failed actions leave
    // subscribers unnotified and the state unchanged.
    fn apply<F>(&self, action: F) -> Result<(), SessionError>
    where
        F: FnOnce(&mut Session) -> Result<(), SessionError>,
    {
        let mut result = Ok(());
        self.inner.state.send_if_modified(|session| {
            result = action(session);
            result.is_ok()
        });
        result
    }

    fn save_token(&self, token: &str) {
        if let Err(e) = self.inner.store.save(token) {
            tracing::warn!(error = %e, "failed to persist session token");
        }
    }

    fn clear_token(&self) {
        if let Err(e) = self.inner.store.clear() {
            tracing::warn!(error = %e, "failed to clear persisted session token");
        }
    }
}

#[cfg(test)]
#[path = "context_test.rs"]
mod tests;
