//! `licitai`: client-side authentication session for the procurement platform.
//!
//! The session state machine, its persisted token, the request authenticator
//! that keeps both in sync with the backend, and an in-memory development
//! server that speaks the same authentication contract.

pub mod auth;
pub mod bootstrap;
pub mod client;
pub mod config;
pub mod context;
pub mod db;
pub mod guard;
pub mod server;
pub mod session;
pub mod store;
pub mod token;
pub mod types;

#[cfg(test)]
mod test_helpers;
