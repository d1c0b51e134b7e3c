//! Route-guard decisions.
//!
//! SYSTEM CONTEXT
//! ==============
//! Protected routes must behave identically: render nothing while the
//! session is still loading, send anonymous visitors to `/login`, and refuse
//! authenticated users that lack the route's capability or role.

use crate::session::Session;

pub const LOGIN_PATH: &str = "/login";

/// What a protected route needs from the session.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Requirement {
    /// Any authenticated user.
    #[default]
    Authenticated,
    /// A capability (admin bypass applies).
    Permission(String),
    /// One of the listed roles.
    AnyRole(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Wait,
    RedirectToLogin,
    Forbidden,
    Allow,
}

#[must_use]
pub fn decide(session: &Session, requirement: &Requirement, admin_role: &str) -> GuardDecision {
    if session.is_loading() {
        return GuardDecision::Wait;
    }
    if !session.is_authenticated() {
        return GuardDecision::RedirectToLogin;
    }
    let allowed = match requirement {
        Requirement::Authenticated => true,
        Requirement::Permission(capability) => session.has_permission(capability, admin_role),
        Requirement::AnyRole(roles) => session.has_any_role(roles),
    };
    if allowed { GuardDecision::Allow } else { GuardDecision::Forbidden }
}

/// Whether a settled, anonymous session should be sent to the login page.
#[must_use]
pub fn should_redirect_unauth(session: &Session) -> bool {
    !session.is_loading() && session.user().is_none()
}

#[cfg(test)]
#[path = "guard_test.rs"]
mod tests;
