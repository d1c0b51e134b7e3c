//! One-time session restore at process start.
//!
//! SYSTEM CONTEXT
//! ==============
//! Runs before any protected content renders. A persisted token is only
//! sent to `/me` after its embedded expiry has been checked locally, so a
//! stale token never costs a round trip. Every failure degrades to
//! `Anonymous`; nothing here is reported to the caller as an error.

use crate::client::AuthApi;
use crate::context::SessionContext;
use crate::session::SessionStatus;
use crate::token::{decode_claims, fingerprint, unix_now};

/// Why a bootstrap ended where it did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootstrapOutcome {
    /// Bootstrap already ran in this process; the session was left as is.
    AlreadyRan(SessionStatus),
    NoToken,
    /// The persisted token was expired or did not decode.
    TokenRejected,
    /// The profile fetch failed; carries the error text for logging.
    ProfileFailed(String),
    Restored,
}

impl BootstrapOutcome {
    #[must_use]
    pub fn status(&self) -> SessionStatus {
        match self {
            Self::AlreadyRan(status) => *status,
            Self::Restored => SessionStatus::Authenticated,
            Self::NoToken | Self::TokenRejected | Self::ProfileFailed(_) => SessionStatus::Anonymous,
        }
    }
}

/// Restore the session from the token store, once per process.
pub async fn bootstrap(ctx: &SessionContext, api: &dyn AuthApi) -> BootstrapOutcome {
    bootstrap_at(ctx, api, unix_now()).await
}

/// Internal: bootstrap with an explicit clock (for testing).
pub(crate) async fn bootstrap_at(ctx: &SessionContext, api: &dyn AuthApi, now: u64) -> BootstrapOutcome {
    if !ctx.claim_bootstrap() {
        return BootstrapOutcome::AlreadyRan(ctx.status());
    }

    let Some(token) = ctx.store().load() else {
        tracing::debug!("no persisted token; starting anonymous");
        ctx.logout();
        return BootstrapOutcome::NoToken;
    };

    match decode_claims(&token) {
        Ok(claims) if !claims.is_expired_at(now) => {}
        Ok(claims) => {
            tracing::info!(token = %fingerprint(&token), exp = claims.exp, "persisted token expired");
            ctx.logout();
            return BootstrapOutcome::TokenRejected;
        }
        Err(e) => {
            tracing::warn!(error = %e, "persisted token malformed");
            ctx.logout();
            return BootstrapOutcome::TokenRejected;
        }
    }

    match api.me(&token).await {
        Ok(profile) => {
            let token = match profile.rotated_token {
                Some(rotated) => {
                    tracing::debug!(token = %fingerprint(&rotated), "adopting token rotated during restore");
                    rotated
                }
                None => token,
            };
            ctx.login_succeeded(profile.user, profile.organization, token, profile.permissions);
            BootstrapOutcome::Restored
        }
        Err(e) => {
            tracing::warn!(error = %e, "profile fetch failed; starting anonymous");
            ctx.logout();
            BootstrapOutcome::ProfileFailed(e.to_string())
        }
    }
}

#[cfg(test)]
#[path = "bootstrap_test.rs"]
mod tests;
