//! State backups — a timestamped copy of peers and accounts.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Local};

use aviso_services::{JsonFileStore, PersistenceStore, StoredState};

use super::State;

/// `respaldo_YYYYmmdd_HHMMSS.json` under `dir`.
pub fn backup_path(dir: &Path, at: DateTime<Local>) -> PathBuf {
    dir.join(format!("respaldo_{}.json", at.format("%Y%m%d_%H%M%S")))
}

/// Write the current state next to the state file, or into `dir`.
pub fn cmd_backup(state: &State, dir: Option<&str>) -> Result<()> {
    let dir = match dir {
        Some(dir) => PathBuf::from(dir),
        None => state
            .path()
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default(),
    };
    let path = write_backup(state, &dir, Local::now())?;
    println!("Backup written to {}", path.display());
    Ok(())
}

fn write_backup(state: &State, dir: &Path, at: DateTime<Local>) -> Result<PathBuf> {
    let store = JsonFileStore::new(backup_path(dir, at));
    store
        .save(&StoredState::capture(&state.directory, &state.accounts))
        .with_context(|| format!("failed to write {}", store.path().display()))?;
    Ok(store.path().to_path_buf())
}
