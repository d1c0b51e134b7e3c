//! Wire DTOs for the authentication API.
//!
//! DESIGN
//! ======
//! Profile objects carry a few typed fields the session logic reads (`nome`,
//! `nivel_acesso`, `razao_social`) and keep everything else in a flattened
//! map, so unknown backend fields survive both round-trips and shallow
//! merges untouched.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Authenticated user profile.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Display name.
    #[serde(default)]
    pub nome: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Access level; compared against the administrator role.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nivel_acesso: Option<String>,
    /// Remaining backend fields (`id`, `cargo`, ...), preserved verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl User {
    #[must_use]
    pub fn role(&self) -> Option<&str> {
        self.nivel_acesso.as_deref()
    }
}

/// Organization the user belongs to.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Organization {
    /// Legal name.
    #[serde(default)]
    pub razao_social: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cnpj: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `POST /login` request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// `POST /register` request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Registration {
    pub nome: String,
    pub email: String,
    pub password: String,
    pub razao_social: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cnpj: Option<String>,
}

/// Response of `/login` and `/register`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthPayload {
    pub token: String,
    pub user: User,
    #[serde(default)]
    pub organization: Option<Organization>,
    #[serde(default)]
    pub permissions: Vec<String>,
}

/// Response of `GET /me`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfilePayload {
    pub user: User,
    #[serde(default)]
    pub organization: Option<Organization>,
    #[serde(default)]
    pub permissions: Vec<String>,
    /// Replacement token from the rotation header of the response, if any.
    #[serde(skip)]
    pub rotated_token: Option<String>,
}

/// Response of `POST /refresh`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshPayload {
    pub token: String,
}

/// Shallow-merge `patch` into `current`: top-level keys in `patch` replace
/// the corresponding keys, nested values are not merged.
pub(crate) fn merge_shallow<T>(current: &T, patch: &Map<String, Value>) -> Result<T, serde_json::Error>
where
    T: Serialize + DeserializeOwned,
{
    let mut merged = match serde_json::to_value(current)? {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    for (key, value) in patch {
        merged.insert(key.clone(), value.clone());
    }
    serde_json::from_value(Value::Object(merged))
}

#[cfg(test)]
#[path = "types_test.rs"]
mod tests;
