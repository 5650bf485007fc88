//! Notice sender — one connection, one notice, one acknowledgement.
//!
//! The whole exchange (connect, write, half-close, ack read) runs against a
//! single deadline taken when the connect starts. A slow peer cannot stretch
//! the bound by trickling bytes.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::{timeout_at, Instant};

use aviso_core::wire::{self, MAX_ACK_FRAME, MAX_NOTICE_FRAME};
use aviso_core::{CodecError, Notice, SharedClock, SystemClock};

use crate::peer::Peer;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SendError {
    #[error("timed out")]
    Timeout,
    #[error("connection refused")]
    ConnectionRefused,
    #[error("malformed acknowledgement: {0}")]
    MalformedAck(String),
    #[error("peer rejected notice: {0}")]
    AckNotOk(String),
    #[error("transport error: {0}")]
    Io(String),
    #[error("invalid notice: {0}")]
    InvalidNotice(String),
}

impl SendError {
    /// The peer accepted the connection and wrote something back.
    pub fn peer_answered(&self) -> bool {
        matches!(self, Self::AckNotOk(_) | Self::MalformedAck(_))
    }
}

impl From<io::Error> for SendError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::ConnectionRefused => Self::ConnectionRefused,
            io::ErrorKind::TimedOut => Self::Timeout,
            _ => Self::Io(e.to_string()),
        }
    }
}

/// Receives the terminal outcome of every send that reached the network.
pub trait SendObserver: Send + Sync {
    fn observe(&self, peer: &Peer, outcome: &Result<(), SendError>, at: DateTime<Utc>);
}

#[derive(Clone)]
pub struct NoticeSender {
    observer: Option<Arc<dyn SendObserver>>,
    clock: SharedClock,
}

impl Default for NoticeSender {
    fn default() -> Self {
        Self::new(SystemClock::shared())
    }
}

impl NoticeSender {
    pub fn new(clock: SharedClock) -> Self {
        Self {
            observer: None,
            clock,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn SendObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Deliver `notice` to `peer`. Succeeds only on an ok acknowledgement.
    pub async fn send(
        &self,
        peer: &Peer,
        notice: &Notice,
        timeout: Duration,
    ) -> Result<(), SendError> {
        let payload = wire::encode_notice(notice)
            .map_err(|e| SendError::InvalidNotice(e.to_string()))?;
        if payload.len() > MAX_NOTICE_FRAME {
            return Err(SendError::InvalidNotice(format!(
                "{} bytes exceeds the {MAX_NOTICE_FRAME} byte limit",
                payload.len()
            )));
        }

        let started = self.clock.now();
        let outcome = exchange(&peer.address, &payload, timeout).await;

        match &outcome {
            Ok(()) => tracing::debug!(peer = %peer.name, address = %peer.address, "notice delivered"),
            Err(e) => tracing::warn!(peer = %peer.name, address = %peer.address, error = %e, "send failed"),
        }
        if let Some(observer) = &self.observer {
            observer.observe(peer, &outcome, started);
        }
        outcome
    }
}

async fn exchange(address: &str, payload: &[u8], timeout: Duration) -> Result<(), SendError> {
    let deadline = Instant::now() + timeout;

    let mut stream = timeout_at(deadline, TcpStream::connect(address))
        .await
        .map_err(|_| SendError::Timeout)??;

    timeout_at(deadline, wire::write_frame(&mut stream, payload))
        .await
        .map_err(|_| SendError::Timeout)?
        .map_err(transport_error)?;

    // Half-close: the peer sees EOF after our single frame.
    timeout_at(deadline, stream.shutdown())
        .await
        .map_err(|_| SendError::Timeout)??;

    let raw = timeout_at(deadline, wire::read_frame(&mut stream, MAX_ACK_FRAME))
        .await
        .map_err(|_| SendError::Timeout)?
        .map_err(ack_error)?;

    let ack = wire::decode_ack(&raw).map_err(|e| SendError::MalformedAck(e.to_string()))?;
    if ack.is_ok() {
        Ok(())
    } else {
        Err(SendError::AckNotOk(ack.detail))
    }
}

fn transport_error(e: CodecError) -> SendError {
    match e {
        CodecError::Io(io) => io.into(),
        other => SendError::Io(other.to_string()),
    }
}

fn ack_error(e: CodecError) -> SendError {
    match e {
        CodecError::Io(io) => io.into(),
        CodecError::Closed => SendError::MalformedAck("connection closed without acknowledgement".into()),
        other => SendError::MalformedAck(other.to_string()),
    }
}
