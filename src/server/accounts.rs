//! In-memory account directory for the development API.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::tokens::bytes_to_hex;
use crate::types::{Organization, ProfilePayload, Registration, User};

pub const DEMO_PASSWORD: &str = "demo123";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DirectoryError {
    #[error("email already registered: {0}")]
    EmailTaken(String),
    #[error("missing required field: {0}")]
    MissingField(&'static str),
}

#[derive(Debug, Clone)]
pub struct Account {
    pub id: Uuid,
    pub email: String,
    password_hash: String,
    pub user: User,
    pub organization: Option<Organization>,
    pub permissions: Vec<String>,
}

impl Account {
    #[must_use]
    pub fn profile(&self) -> ProfilePayload {
        ProfilePayload {
            user: self.user.clone(),
            organization: self.organization.clone(),
            permissions: self.permissions.clone(),
            rotated_token: None,
        }
    }
}

fn hash_password(password: &str) -> String {
    bytes_to_hex(&Sha256::digest(password.as_bytes()))
}

fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

fn account(nome: &str, email: &str, role: &str, org: &str, permissions: &[&str]) -> Account {
    let id = Uuid::new_v4();
    let mut extra = Map::new();
    extra.insert("id".to_owned(), Value::String(id.to_string()));
    Account {
        id,
        email: normalize_email(email),
        password_hash: hash_password(DEMO_PASSWORD),
        user: User { nome: nome.to_owned(), email: Some(email.to_owned()), nivel_acesso: Some(role.to_owned()), extra },
        organization: Some(Organization { razao_social: org.to_owned(), ..Organization::default() }),
        permissions: permissions.iter().map(|p| (*p).to_owned()).collect(),
    }
}

/// Accounts keyed by normalized email.
#[derive(Clone, Default)]
pub struct Directory {
    accounts: Arc<RwLock<HashMap<String, Account>>>,
}

impl Directory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Directory seeded with the demo accounts (password `demo123`).
    #[must_use]
    pub fn with_demo_accounts() -> Self {
        let seeded = [
            account("Admin", "admin@demo.com", "admin", "Acme", &[]),
            account("Carla Compras", "comprador@demo.com", "comprador", "Acme", &["licitacoes", "fornecedores"]),
        ];
        let accounts = seeded
            .into_iter()
            .map(|a| (a.email.clone(), a))
            .collect();
        Self { accounts: Arc::new(RwLock::new(accounts)) }
    }

    pub async fn authenticate(&self, email: &str, password: &str) -> Option<Account> {
        let accounts = self.accounts.read().await;
        accounts
            .get(&normalize_email(email))
            .filter(|a| a.password_hash == hash_password(password))
            .cloned()
    }

    pub async fn find(&self, id: Uuid) -> Option<Account> {
        let accounts = self.accounts.read().await;
        accounts.values().find(|a| a.id == id).cloned()
    }

    /// Create an account owning a new organization. The registrant is the
    /// organization's administrator.
    ///
    /// # Errors
    ///
    /// [`DirectoryError::MissingField`] for blank fields,
    /// [`DirectoryError::EmailTaken`] for a duplicate email.
    pub async fn register(&self, registration: &Registration) -> Result<Account, DirectoryError> {
        for (name, value) in [
            ("nome", &registration.nome),
            ("email", &registration.email),
            ("password", &registration.password),
            ("razao_social", &registration.razao_social),
        ] {
            if value.trim().is_empty() {
                return Err(DirectoryError::MissingField(name));
            }
        }

        let email = normalize_email(&registration.email);
        let mut accounts = self.accounts.write().await;
        if accounts.contains_key(&email) {
            return Err(DirectoryError::EmailTaken(email));
        }

        let mut created = account(&registration.nome, &registration.email, "admin", &registration.razao_social, &[]);
        created.password_hash = hash_password(&registration.password);
        if let Some(org) = created.organization.as_mut() {
            org.cnpj.clone_from(&registration.cnpj);
        }
        accounts.insert(email, created.clone());
        Ok(created)
    }
}

#[cfg(test)]
#[path = "accounts_test.rs"]
mod tests;
