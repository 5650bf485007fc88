//! Peer records — named, addressable nodes that can receive notices.

use std::net::{IpAddr, SocketAddr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use aviso_core::DEFAULT_PORT;

/// Last-known reachability of a peer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Liveness {
    /// Never probed or sent to.
    #[default]
    Unknown,
    Online,
    Offline,
}

/// One directory entry.
///
/// Callers only ever hold copies; the directory owns the live record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Peer {
    /// Directory key. Unique.
    pub name: String,

    /// `host:port` the peer's listener is reachable on.
    pub address: String,

    #[serde(default)]
    pub liveness: Liveness,

    /// Observation time of the current `liveness`. None until first probe.
    #[serde(default)]
    pub last_checked: Option<DateTime<Utc>>,
}

impl Peer {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            liveness: Liveness::Unknown,
            last_checked: None,
        }
    }

    pub fn is_online(&self) -> bool {
        self.liveness == Liveness::Online
    }
}

/// Normalize a user-supplied address to `host:port`.
///
/// A bare host or IP gets the default notice port. Returns None for input
/// that cannot name a TCP endpoint.
pub fn normalize_address(input: &str) -> Option<String> {
    let input = input.trim();
    if input.is_empty() || input.contains(char::is_whitespace) {
        return None;
    }
    if let Ok(addr) = input.parse::<SocketAddr>() {
        return Some(addr.to_string());
    }
    if let Ok(ip) = input.parse::<IpAddr>() {
        return Some(SocketAddr::new(ip, DEFAULT_PORT).to_string());
    }
    match input.rsplit_once(':') {
        Some((host, port)) => {
            if host.is_empty() || host.contains(':') || port.parse::<u16>().is_err() {
                return None;
            }
            Some(format!("{host}:{port}"))
        }
        None => Some(format!("{input}:{DEFAULT_PORT}")),
    }
}
