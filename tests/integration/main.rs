//! Aviso integration test harness.
//!
//! Every test runs real TCP exchanges over loopback: a listener bound to
//! 127.0.0.1:0, senders and probers pointed at it, and dead ports obtained
//! by binding and immediately dropping a socket.
//!
//!   cargo test --test integration
//!
//! Each test owns the listeners it starts and stops them before returning.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::net::TcpListener;

use aviso_core::{Notice, SystemClock};
use aviso_services::{DeliveryHandler, DeliveryOutcome, ListenerHandle, NoticeListener};

mod exchange;
mod fanout;
mod liveness;
mod persistence;

// ── Harness ───────────────────────────────────────────────────────────────────

/// Timeout used for sends that are expected to succeed.
pub const SEND_TIMEOUT: Duration = Duration::from_secs(2);

/// Start a listener on an ephemeral loopback port.
pub async fn start_listener(handler: Arc<dyn DeliveryHandler>) -> Result<ListenerHandle> {
    NoticeListener::bind("127.0.0.1:0", handler, SystemClock::shared(), Duration::from_secs(2))
        .await
        .context("failed to bind test listener")?
        .spawn()
        .context("failed to spawn test listener")
}

/// An address nothing listens on.
pub async fn dead_address() -> Result<String> {
    let socket = TcpListener::bind("127.0.0.1:0").await?;
    Ok(socket.local_addr()?.to_string())
}

/// Delivery handler that remembers every notice it was given.
#[derive(Default)]
pub struct Recorder {
    pub seen: Mutex<Vec<(Notice, SocketAddr)>>,
}

impl Recorder {
    pub fn texts(&self) -> Vec<String> {
        self.seen
            .lock()
            .unwrap()
            .iter()
            .map(|(n, _)| n.text().to_string())
            .collect()
    }

    pub fn count(&self) -> usize {
        self.seen.lock().unwrap().len()
    }
}

impl DeliveryHandler for Recorder {
    fn deliver(&self, notice: Notice, origin: SocketAddr) -> DeliveryOutcome {
        self.seen.lock().unwrap().push((notice, origin));
        DeliveryOutcome::Ok
    }
}
