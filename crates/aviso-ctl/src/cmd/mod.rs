//! CLI command modules.

pub mod accounts;
pub mod backup;
pub mod peers;
pub mod probe;
pub mod send;

use anyhow::{bail, Context, Result};

use aviso_core::config::AvisoConfig;
use aviso_services::{
    Account, AccountRegistry, Directory, JsonFileStore, PersistenceStore, StoredState,
};

/// `--user` / `--password` as given on the command line.
#[derive(Debug, Default)]
pub struct Credentials {
    pub user: Option<String>,
    pub password: Option<String>,
}

impl Credentials {
    /// The verified account, or None when no login was given.
    pub fn login(&self, accounts: &AccountRegistry) -> Result<Option<Account>> {
        match (&self.user, &self.password) {
            (Some(user), Some(password)) => accounts
                .verify(user, password)
                .map(Some)
                .context("login failed: wrong user, password, or disabled account"),
            (Some(_), None) => bail!("--user requires --password"),
            (None, Some(_)) => bail!("--password requires --user"),
            (None, None) => Ok(None),
        }
    }

    /// Peer and account management needs an administrator.
    pub fn require_admin(&self, accounts: &AccountRegistry) -> Result<Account> {
        let Some(account) = self.login(accounts)? else {
            bail!("admin login required: pass --user and --password");
        };
        if !account.is_admin() {
            bail!("{} is not an administrator", account.username);
        }
        Ok(account)
    }
}

/// Peers and accounts as stored on disk, opened for one command.
pub struct State {
    store: JsonFileStore,
    pub directory: Directory,
    pub accounts: AccountRegistry,
}

impl State {
    pub fn open(config: &AvisoConfig) -> Result<Self> {
        let store = JsonFileStore::new(&config.store.path);
        let (directory, accounts) = store
            .load()
            .with_context(|| format!("failed to read {}", store.path().display()))?
            .restore()
            .context("stored state is inconsistent")?;
        accounts.ensure_defaults();
        Ok(Self {
            store,
            directory,
            accounts,
        })
    }

    pub fn path(&self) -> &std::path::Path {
        self.store.path()
    }

    pub fn save(&self) -> Result<()> {
        self.store
            .save(&StoredState::capture(&self.directory, &self.accounts))
            .with_context(|| format!("failed to write {}", self.store.path().display()))
    }
}
