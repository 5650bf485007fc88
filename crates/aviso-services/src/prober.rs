//! Liveness prober — bare TCP connects against every directory entry.
//!
//! A probe only opens and drops a connection; the listener treats that as a
//! silent close and sends nothing back.

use std::time::Duration;

use futures::future::join_all;
use tokio::net::TcpStream;
use tokio::sync::broadcast;

use aviso_core::{Clock, SharedClock};

use crate::directory::Directory;
use crate::peer::Liveness;

/// Counts from one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProbeSummary {
    pub online: usize,
    pub offline: usize,
}

impl ProbeSummary {
    pub fn total(&self) -> usize {
        self.online + self.offline
    }
}

/// Online iff a connection to `address` opens within `timeout`.
pub async fn probe(address: &str, timeout: Duration) -> Liveness {
    match tokio::time::timeout(timeout, TcpStream::connect(address)).await {
        Ok(Ok(_stream)) => Liveness::Online,
        Ok(Err(e)) => {
            tracing::trace!(%address, error = %e, "probe failed");
            Liveness::Offline
        }
        Err(_) => {
            tracing::trace!(%address, "probe timed out");
            Liveness::Offline
        }
    }
}

/// Probe every peer concurrently and record the results.
///
/// Each result lands in the directory as soon as its probe finishes, so a
/// slow peer does not hold back the others. Updates carry the sweep's start
/// time, so a result from this sweep never replaces one observed later by a
/// send or another sweep.
pub async fn probe_all(directory: &Directory, clock: &dyn Clock, timeout: Duration) -> ProbeSummary {
    let started = clock.now();
    let peers = directory.snapshot();

    let results = join_all(peers.iter().map(|peer| async move {
        let state = probe(&peer.address, timeout).await;
        directory.update_liveness(&peer.name, state, started);
        state
    }))
    .await;

    let mut summary = ProbeSummary::default();
    for state in results {
        match state {
            Liveness::Online => summary.online += 1,
            _ => summary.offline += 1,
        }
    }

    tracing::debug!(online = summary.online, offline = summary.offline, "probe sweep finished");
    summary
}

/// Sweep every `interval` until `shutdown` fires. The first sweep runs
/// immediately.
pub async fn probe_loop(
    directory: Directory,
    clock: SharedClock,
    interval: Duration,
    timeout: Duration,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                tracing::info!("prober shutting down");
                return;
            }

            _ = ticker.tick() => {
                probe_all(&directory, clock.as_ref(), timeout).await;
            }
        }
    }
}
