//! Session state machine.
//!
//! SYSTEM CONTEXT
//! ==============
//! Route guards and permission checks read the session; the request
//! authenticator, bootstrapper and auth flows drive it through the actions
//! below. The transitions here are pure: persistence side effects live in
//! [`crate::context::SessionContext`].
//!
//! ```text
//! Uninitialized --(no token | expired | profile fetch fails)--> Anonymous
//! Uninitialized --(valid token + profile)---------------------> Authenticated
//! Anonymous ----(login/register)------------------------------> Authenticated
//! Authenticated --(logout | 401)------------------------------> Anonymous
//! Authenticated --(rotation | profile/org update)-------------> Authenticated
//! ```

use std::collections::BTreeSet;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::types::{Organization, User, merge_shallow};

pub const DEFAULT_ADMIN_ROLE: &str = "admin";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("action requires an authenticated session")]
    NotAuthenticated,
    #[error("patch produces an invalid {target}: {reason}")]
    InvalidPatch { target: &'static str, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Uninitialized,
    Anonymous,
    Authenticated,
}

/// In-memory authentication and authorization state for the current user.
///
/// Fields are private so the only way in is through the actions, which keep
/// `is_authenticated => user and token present` true.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Session {
    status: SessionStatus,
    is_loading: bool,
    user: Option<User>,
    organization: Option<Organization>,
    token: Option<String>,
    permissions: BTreeSet<String>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// Fresh process-start session: uninitialized and loading.
    #[must_use]
    pub fn new() -> Self {
        Self {
            status: SessionStatus::Uninitialized,
            is_loading: true,
            user: None,
            organization: None,
            token: None,
            permissions: BTreeSet::new(),
        }
    }

    // =========================================================================
    // ACCESSORS
    // =========================================================================

    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.status
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.status == SessionStatus::Authenticated
    }

    #[must_use]
    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    #[must_use]
    pub fn organization(&self) -> Option<&Organization> {
        self.organization.as_ref()
    }

    #[must_use]
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    #[must_use]
    pub fn permissions(&self) -> &BTreeSet<String> {
        &self.permissions
    }

    // =========================================================================
    // ACTIONS
    // =========================================================================

    /// Mark a login/register submission in flight. State is otherwise kept.
    pub fn begin_loading(&mut self) {
        self.is_loading = true;
    }

    pub fn login_succeeded(
        &mut self,
        user: User,
        organization: Option<Organization>,
        token: String,
        permissions: impl IntoIterator<Item = String>,
    ) {
        self.status = SessionStatus::Authenticated;
        self.is_loading = false;
        self.user = Some(user);
        self.organization = organization;
        self.token = Some(token);
        self.permissions = permissions.into_iter().collect();
    }

    /// Reset to anonymous from any state, clearing every field.
    pub fn logout(&mut self) {
        self.status = SessionStatus::Anonymous;
        self.is_loading = false;
        self.user = None;
        self.organization = None;
        self.token = None;
        self.permissions.clear();
    }

    /// Shallow-merge `patch` into the current user.
    ///
    /// # Errors
    ///
    /// [`SessionError::NotAuthenticated`] outside `Authenticated`;
    /// [`SessionError::InvalidPatch`] if the merged object no longer parses.
    pub fn update_user(&mut self, patch: &Map<String, Value>) -> Result<(), SessionError> {
        let current = self.authenticated_user()?;
        let merged = merge_shallow(current, patch)
            .map_err(|e| SessionError::InvalidPatch { target: "user", reason: e.to_string() })?;
        self.user = Some(merged);
        Ok(())
    }

    /// Shallow-merge `patch` into the current organization. A session without
    /// an organization merges into an empty one.
    ///
    /// # Errors
    ///
    /// Same as [`Session::update_user`].
    pub fn update_organization(&mut self, patch: &Map<String, Value>) -> Result<(), SessionError> {
        self.authenticated_user()?;
        let current = self.organization.clone().unwrap_or_default();
        let merged = merge_shallow(&current, patch)
            .map_err(|e| SessionError::InvalidPatch { target: "organization", reason: e.to_string() })?;
        self.organization = Some(merged);
        Ok(())
    }

    /// Replace the token, leaving user, organization and permissions alone.
    ///
    /// # Errors
    ///
    /// [`SessionError::NotAuthenticated`] outside `Authenticated`.
    pub fn rotate_token(&mut self, token: String) -> Result<(), SessionError> {
        self.authenticated_user()?;
        self.token = Some(token);
        Ok(())
    }

    fn authenticated_user(&self) -> Result<&User, SessionError> {
        match (&self.status, &self.user) {
            (SessionStatus::Authenticated, Some(user)) => Ok(user),
            _ => Err(SessionError::NotAuthenticated),
        }
    }

    // =========================================================================
    // AUTHORIZATION
    // =========================================================================

    /// Capability check with administrator bypass.
    #[must_use]
    pub fn has_permission(&self, capability: &str, admin_role: &str) -> bool {
        let Some(user) = &self.user else {
            return false;
        };
        if user.role() == Some(admin_role) {
            return true;
        }
        self.permissions.contains(capability)
    }

    /// Whether the user's role is `role`.
    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.has_any_role([role])
    }

    /// Whether the user's role is one of `roles`.
    #[must_use]
    pub fn has_any_role<I, S>(&self, roles: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let Some(role) = self.user.as_ref().and_then(User::role) else {
            return false;
        };
        roles.into_iter().any(|candidate| candidate.as_ref() == role)
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
