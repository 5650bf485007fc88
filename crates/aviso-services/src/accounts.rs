//! Account registry — operator logins and their roles.
//!
//! Two roles:
//! - Admin:   manages the peer list and accounts, sends notices
//! - Client:  sends notices and replies only
//!
//! Passwords are kept as a hex BLAKE3 digest. Inactive accounts stay listed
//! but never verify.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    #[default]
    Client,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub username: String,
    pub display_name: String,
    pub role: Role,
    pub password_digest: String,
    #[serde(default = "active_default")]
    pub active: bool,
}

fn active_default() -> bool {
    true
}

impl Account {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccountError {
    #[error("account {0:?} already exists")]
    DuplicateUser(String),
    #[error("no account named {0:?}")]
    UnknownUser(String),
    #[error("invalid account: {0}")]
    InvalidAccount(&'static str),
}

/// Hex BLAKE3 digest of a password.
pub fn password_digest(password: &str) -> String {
    hex::encode(blake3::hash(password.as_bytes()).as_bytes())
}

/// Accounts keyed by username. Clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct AccountRegistry {
    accounts: Arc<DashMap<String, Account>>,
}

impl AccountRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load persisted accounts. Later duplicates replace earlier ones.
    pub fn from_accounts(accounts: Vec<Account>) -> Self {
        let registry = Self::new();
        for account in accounts {
            registry.accounts.insert(account.username.clone(), account);
        }
        registry
    }

    pub fn create(
        &self,
        username: &str,
        display_name: &str,
        password: &str,
        role: Role,
    ) -> Result<(), AccountError> {
        let username = username.trim();
        if username.is_empty() {
            return Err(AccountError::InvalidAccount("username must not be empty"));
        }
        if password.is_empty() {
            return Err(AccountError::InvalidAccount("password must not be empty"));
        }
        let display_name = match display_name.trim() {
            "" => username,
            name => name,
        };

        match self.accounts.entry(username.to_string()) {
            Entry::Occupied(_) => Err(AccountError::DuplicateUser(username.to_string())),
            Entry::Vacant(slot) => {
                slot.insert(Account {
                    username: username.to_string(),
                    display_name: display_name.to_string(),
                    role,
                    password_digest: password_digest(password),
                    active: true,
                });
                tracing::info!(user = %username, ?role, "account created");
                Ok(())
            }
        }
    }

    pub fn remove(&self, username: &str) -> Result<Account, AccountError> {
        let (_, account) = self
            .accounts
            .remove(username)
            .ok_or_else(|| AccountError::UnknownUser(username.to_string()))?;
        tracing::info!(user = %username, "account removed");
        Ok(account)
    }

    /// The account, if the password matches and the account is active.
    pub fn verify(&self, username: &str, password: &str) -> Option<Account> {
        let account = self.accounts.get(username)?;
        if !account.active || account.password_digest != password_digest(password) {
            tracing::debug!(user = %username, "login rejected");
            return None;
        }
        Some(account.clone())
    }

    pub fn change_password(&self, username: &str, password: &str) -> Result<(), AccountError> {
        if password.is_empty() {
            return Err(AccountError::InvalidAccount("password must not be empty"));
        }
        let mut account = self
            .accounts
            .get_mut(username)
            .ok_or_else(|| AccountError::UnknownUser(username.to_string()))?;
        account.password_digest = password_digest(password);
        Ok(())
    }

    pub fn set_active(&self, username: &str, active: bool) -> Result<(), AccountError> {
        let mut account = self
            .accounts
            .get_mut(username)
            .ok_or_else(|| AccountError::UnknownUser(username.to_string()))?;
        account.active = active;
        tracing::info!(user = %username, active, "account state changed");
        Ok(())
    }

    pub fn get(&self, username: &str) -> Option<Account> {
        self.accounts.get(username).map(|a| a.clone())
    }

    /// All accounts sorted by username.
    pub fn list(&self) -> Vec<Account> {
        let mut accounts: Vec<Account> = self.accounts.iter().map(|e| e.value().clone()).collect();
        accounts.sort_by(|a, b| a.username.cmp(&b.username));
        accounts
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Seed the stock `admin` and `cliente` logins into an empty registry.
    /// Returns whether anything was added.
    pub fn ensure_defaults(&self) -> bool {
        if !self.is_empty() {
            return false;
        }
        let defaults = [
            ("admin", "Administrador", "admin123", Role::Admin),
            ("cliente", "Cliente", "cliente123", Role::Client),
        ];
        for (user, name, password, role) in defaults {
            // Racing seeders may both get here; the loser sees DuplicateUser.
            let _ = self.create(user, name, password, role);
        }
        tracing::warn!("seeded default accounts; change their passwords");
        true
    }
}
