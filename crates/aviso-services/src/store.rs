//! Persistence stores — where the peer list and accounts live between runs.
//!
//! The core never decides when to save; callers load once at startup and
//! save after edits or at shutdown.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};

use crate::accounts::{Account, AccountRegistry};
use crate::directory::{Directory, DirectoryError};
use crate::peer::Peer;

/// Everything persisted, as one document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredState {
    #[serde(default)]
    pub peers: Vec<Peer>,
    #[serde(default)]
    pub accounts: Vec<Account>,
}

impl StoredState {
    /// Capture the current directory and accounts.
    pub fn capture(directory: &Directory, accounts: &AccountRegistry) -> Self {
        Self {
            peers: directory.records(),
            accounts: accounts.list(),
        }
    }

    /// Rebuild live registries from the stored records.
    pub fn restore(self) -> Result<(Directory, AccountRegistry), StoreError> {
        let directory = Directory::from_records(self.peers)?;
        Ok((directory, AccountRegistry::from_accounts(self.accounts)))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to read {0}: {1}")]
    Read(PathBuf, std::io::Error),
    #[error("failed to write {0}: {1}")]
    Write(PathBuf, std::io::Error),
    #[error("corrupt state file {0}: {1}")]
    Corrupt(PathBuf, serde_json::Error),
    #[error("failed to serialize state: {0}")]
    Serialize(serde_json::Error),
    #[error("stored peers are inconsistent: {0}")]
    Directory(#[from] DirectoryError),
}

pub trait PersistenceStore: Send + Sync {
    fn load(&self) -> Result<StoredState, StoreError>;
    fn save(&self, state: &StoredState) -> Result<(), StoreError>;
}

/// Pretty-printed JSON at a fixed path.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PersistenceStore for JsonFileStore {
    /// A missing file is an empty state.
    fn load(&self) -> Result<StoredState, StoreError> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "no state file yet");
                return Ok(StoredState::default());
            }
            Err(e) => return Err(StoreError::Read(self.path.clone(), e)),
        };
        serde_json::from_str(&text).map_err(|e| StoreError::Corrupt(self.path.clone(), e))
    }

    /// Write to a sibling temp file, then rename over the target.
    fn save(&self, state: &StoredState) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::Write(parent.to_path_buf(), e))?;
        }
        let text = serde_json::to_string_pretty(state).map_err(StoreError::Serialize)?;

        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, text).map_err(|e| StoreError::Write(tmp.clone(), e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| StoreError::Write(self.path.clone(), e))?;

        tracing::debug!(
            path = %self.path.display(),
            peers = state.peers.len(),
            accounts = state.accounts.len(),
            "state saved"
        );
        Ok(())
    }
}

/// Keeps the state in memory. Clones share it.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<StoredState>>,
}

impl MemoryStore {
    pub fn new(state: StoredState) -> Self {
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }
}

impl PersistenceStore for MemoryStore {
    fn load(&self) -> Result<StoredState, StoreError> {
        Ok(self.state.lock().unwrap_or_else(PoisonError::into_inner).clone())
    }

    fn save(&self, state: &StoredState) -> Result<(), StoreError> {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state.clone();
        Ok(())
    }
}
