//! Device directory — the named peers this node can send notices to.
//!
//! One ordered list behind a single `RwLock`. Readers get copies
//! (`snapshot`, `resolve`), so a snapshot is always a consistent point in
//! time and nobody holds a reference into the live list across an await.
//!
//! Liveness updates are ordered by observation time, not arrival order: an
//! update is applied only if its `at` is not older than the stored
//! `last_checked`. A slow probe that started earlier cannot overwrite a
//! fresher result.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};

use crate::peer::{normalize_address, Liveness, Peer};
use crate::send_target::TargetSelector;
use crate::sender::{SendError, SendObserver};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DirectoryError {
    #[error("peer {0:?} not found")]
    NotFound(String),
    #[error("peer {0:?} already exists")]
    DuplicateName(String),
    #[error("peer name must not be empty")]
    InvalidName,
    #[error("invalid peer address {0:?}")]
    InvalidAddress(String),
}

/// Shared handle to the peer list. Clones see the same peers.
#[derive(Debug, Clone, Default)]
pub struct Directory {
    peers: Arc<RwLock<Vec<Peer>>>,
}

impl Directory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from persisted records, keeping their order and liveness.
    pub fn from_records(peers: Vec<Peer>) -> Result<Self, DirectoryError> {
        let mut list: Vec<Peer> = Vec::with_capacity(peers.len());
        for mut peer in peers {
            peer.name = valid_name(&peer.name)?;
            peer.address = normalize_address(&peer.address)
                .ok_or_else(|| DirectoryError::InvalidAddress(peer.address.clone()))?;
            if list.iter().any(|p| p.name == peer.name) {
                return Err(DirectoryError::DuplicateName(peer.name));
            }
            list.push(peer);
        }
        Ok(Self {
            peers: Arc::new(RwLock::new(list)),
        })
    }

    /// Register a peer. Names are unique; a bare host gets the default port.
    pub fn add(&self, name: &str, address: &str) -> Result<(), DirectoryError> {
        let name = valid_name(name)?;
        let address = normalize_address(address)
            .ok_or_else(|| DirectoryError::InvalidAddress(address.to_string()))?;

        let mut peers = self.write();
        if peers.iter().any(|p| p.name == name) {
            return Err(DirectoryError::DuplicateName(name));
        }
        tracing::info!(peer = %name, %address, "peer added");
        peers.push(Peer::new(name, address));
        Ok(())
    }

    /// Remove a peer, returning its last record.
    pub fn remove(&self, name: &str) -> Result<Peer, DirectoryError> {
        let mut peers = self.write();
        let index = position(&peers, name)?;
        let removed = peers.remove(index);
        tracing::info!(peer = %name, "peer removed");
        Ok(removed)
    }

    /// Rename a peer in one step. Position, address and liveness carry over.
    pub fn rename(&self, old: &str, new: &str) -> Result<(), DirectoryError> {
        let new = valid_name(new)?;
        let mut peers = self.write();
        let index = position(&peers, old)?;
        if old != new && peers.iter().any(|p| p.name == new) {
            return Err(DirectoryError::DuplicateName(new));
        }
        let mut peer = peers.remove(index);
        peer.name = new;
        tracing::info!(from = %old, to = %peer.name, "peer renamed");
        peers.insert(index, peer);
        Ok(())
    }

    /// Point a peer at a new address. Liveness starts over.
    pub fn set_address(&self, name: &str, address: &str) -> Result<(), DirectoryError> {
        let address = normalize_address(address)
            .ok_or_else(|| DirectoryError::InvalidAddress(address.to_string()))?;
        let mut peers = self.write();
        let index = position(&peers, name)?;
        let peer = &mut peers[index];
        peer.address = address;
        peer.liveness = Liveness::Unknown;
        peer.last_checked = None;
        Ok(())
    }

    /// Record a liveness observation made at `at`.
    ///
    /// Absent names are ignored. Returns whether the update was applied.
    pub fn update_liveness(&self, name: &str, state: Liveness, at: DateTime<Utc>) -> bool {
        let mut peers = self.write();
        let Some(peer) = peers.iter_mut().find(|p| p.name == name) else {
            tracing::trace!(peer = %name, "liveness update for removed peer");
            return false;
        };
        if peer.last_checked.is_some_and(|seen| at < seen) {
            tracing::trace!(peer = %name, ?state, "stale liveness update ignored");
            return false;
        }
        if peer.liveness != state {
            tracing::debug!(peer = %name, from = ?peer.liveness, to = ?state, "liveness changed");
        }
        peer.liveness = state;
        peer.last_checked = Some(at);
        true
    }

    pub fn get(&self, name: &str) -> Option<Peer> {
        self.read().iter().find(|p| p.name == name).cloned()
    }

    /// Point-in-time copy of every peer in insertion order.
    pub fn snapshot(&self) -> Vec<Peer> {
        self.read().clone()
    }

    /// Records for the persistence collaborator.
    pub fn records(&self) -> Vec<Peer> {
        self.snapshot()
    }

    /// Peers a selector refers to, in snapshot order.
    pub fn resolve(&self, selector: &TargetSelector) -> Result<Vec<Peer>, DirectoryError> {
        let peers = self.read();
        match selector {
            TargetSelector::SinglePeer(name) => peers
                .iter()
                .find(|p| &p.name == name)
                .cloned()
                .map(|p| vec![p])
                .ok_or_else(|| DirectoryError::NotFound(name.clone())),
            TargetSelector::AllPeers => Ok(peers.clone()),
            TargetSelector::AllLivePeers => {
                Ok(peers.iter().filter(|p| p.is_online()).cloned().collect())
            }
        }
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Number of peers currently marked online.
    pub fn online_count(&self) -> usize {
        self.read().iter().filter(|p| p.is_online()).count()
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<Peer>> {
        self.peers.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<Peer>> {
        self.peers.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Send outcomes double as liveness observations: a peer that answered at
/// all is online, one that could not be reached is offline.
impl SendObserver for Directory {
    fn observe(&self, peer: &Peer, outcome: &Result<(), SendError>, at: DateTime<Utc>) {
        let state = match outcome {
            Ok(()) => Liveness::Online,
            Err(e) if e.peer_answered() => Liveness::Online,
            Err(SendError::InvalidNotice(_)) => return,
            Err(_) => Liveness::Offline,
        };
        self.update_liveness(&peer.name, state, at);
    }
}

fn valid_name(name: &str) -> Result<String, DirectoryError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(DirectoryError::InvalidName);
    }
    Ok(name.to_string())
}

fn position(peers: &[Peer], name: &str) -> Result<usize, DirectoryError> {
    peers
        .iter()
        .position(|p| p.name == name)
        .ok_or_else(|| DirectoryError::NotFound(name.to_string()))
}
