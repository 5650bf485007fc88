//! Send targeting — one peer, every peer, or every peer last seen online.

use std::fmt;

/// Which directory entries a notice goes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetSelector {
    /// One peer by name. Resolving an absent name is an error.
    SinglePeer(String),

    /// Every registered peer, whatever its liveness.
    AllPeers,

    /// Peers whose last liveness observation was online.
    AllLivePeers,
}

impl TargetSelector {
    pub fn peer(name: impl Into<String>) -> Self {
        Self::SinglePeer(name.into())
    }
}

impl fmt::Display for TargetSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SinglePeer(name) => write!(f, "peer {name:?}"),
            Self::AllPeers => f.write_str("all peers"),
            Self::AllLivePeers => f.write_str("all live peers"),
        }
    }
}
