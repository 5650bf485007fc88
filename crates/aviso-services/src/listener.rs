//! Notice listener — accepts connections, one notice per connection.
//!
//! Each accepted connection runs in its own task and walks
//! `AwaitingPayload → Decoding → Delivering → AwaitingAckWrite → Closed`.
//! Malformed input still gets an error acknowledgement; nothing a client
//! sends can stop the accept loop. Stopping the listener drops only the
//! listening socket, so connections already accepted run to completion.

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use socket2::{Domain, Protocol, Socket, Type};
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use aviso_core::wire::{self, MAX_NOTICE_FRAME};
use aviso_core::{Ack, CodecError, Notice, SharedClock};

/// Result of handing a notice to the delivery handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Ok,
    Error(String),
}

impl DeliveryOutcome {
    fn into_ack(self) -> Ack {
        match self {
            Self::Ok => Ack::ok(),
            Self::Error(detail) => Ack::error(detail),
        }
    }
}

/// Receives every successfully decoded notice.
///
/// Called on the blocking pool; it may take its time without stalling
/// other connections.
pub trait DeliveryHandler: Send + Sync + 'static {
    fn deliver(&self, notice: Notice, origin: SocketAddr) -> DeliveryOutcome;
}

impl<F> DeliveryHandler for F
where
    F: Fn(Notice, SocketAddr) -> DeliveryOutcome + Send + Sync + 'static,
{
    fn deliver(&self, notice: Notice, origin: SocketAddr) -> DeliveryOutcome {
        self(notice, origin)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    #[error("cannot resolve listen address {0:?}")]
    Resolve(String),
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
}

/// Per-connection progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    AwaitingPayload,
    Decoding,
    Delivering,
    AwaitingAckWrite,
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::AwaitingPayload => "awaiting-payload",
            Self::Decoding => "decoding",
            Self::Delivering => "delivering",
            Self::AwaitingAckWrite => "awaiting-ack-write",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

pub struct NoticeListener {
    listener: TcpListener,
    handler: Arc<dyn DeliveryHandler>,
    clock: SharedClock,
    io_timeout: Duration,
}

impl NoticeListener {
    /// Bind `addr` (`host:port`) with SO_REUSEADDR set.
    pub async fn bind(
        addr: &str,
        handler: Arc<dyn DeliveryHandler>,
        clock: SharedClock,
        io_timeout: Duration,
    ) -> Result<Self, ListenerError> {
        let addr = tokio::net::lookup_host(addr)
            .await
            .ok()
            .and_then(|mut addrs| addrs.next())
            .ok_or_else(|| ListenerError::Resolve(addr.to_string()))?;

        let listener = listen_socket(addr).map_err(|source| ListenerError::Bind { addr, source })?;
        tracing::info!(addr = %addr, "notice listener bound");

        Ok(Self {
            listener,
            handler,
            clock,
            io_timeout,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept until `shutdown` fires.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        loop {
            tokio::select! {
                signal = shutdown.recv() => {
                    match signal {
                        Err(broadcast::error::RecvError::Closed) => {
                            tracing::info!("listener handle dropped, closing notice listener");
                        }
                        _ => tracing::info!("notice listener shutting down"),
                    }
                    return;
                }

                result = self.listener.accept() => {
                    let (stream, origin) = match result {
                        Ok(r) => r,
                        Err(e) => {
                            tracing::warn!(error = %e, "accept failed");
                            tokio::time::sleep(Duration::from_millis(50)).await;
                            continue;
                        }
                    };
                    let conn = Connection {
                        origin,
                        handler: self.handler.clone(),
                        clock: self.clock.clone(),
                        io_timeout: self.io_timeout,
                        state: ConnectionState::AwaitingPayload,
                    };
                    tokio::spawn(conn.serve(stream));
                }
            }
        }
    }

    /// Run the accept loop in a background task.
    pub fn spawn(self) -> std::io::Result<ListenerHandle> {
        let local_addr = self.local_addr()?;
        let (shutdown, rx) = broadcast::channel(1);
        let task = tokio::spawn(self.run(rx));
        Ok(ListenerHandle {
            local_addr,
            shutdown,
            task,
        })
    }
}

/// Handle to a spawned listener.
///
/// Dropping the handle closes the listening socket just like
/// [`ListenerHandle::stop`], only without waiting for the accept loop to end.
pub struct ListenerHandle {
    local_addr: SocketAddr,
    shutdown: broadcast::Sender<()>,
    task: JoinHandle<()>,
}

impl ListenerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Close the listening socket. Returns once it is closed; accepted
    /// connections keep going in their own tasks.
    pub async fn stop(self) {
        let _ = self.shutdown.send(());
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "listener task ended abnormally");
        }
    }
}

fn listen_socket(addr: SocketAddr) -> std::io::Result<TcpListener> {
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(128)?;
    TcpListener::from_std(socket.into())
}

// ── Connection ────────────────────────────────────────────────────────────────

struct Connection {
    origin: SocketAddr,
    handler: Arc<dyn DeliveryHandler>,
    clock: SharedClock,
    io_timeout: Duration,
    state: ConnectionState,
}

impl Connection {
    fn advance(&mut self, next: ConnectionState) {
        tracing::trace!(origin = %self.origin, from = %self.state, to = %next, "connection state");
        self.state = next;
    }

    async fn serve(mut self, mut stream: TcpStream) {
        let ack = match self.receive(&mut stream).await {
            Some(ack) => ack,
            None => {
                self.advance(ConnectionState::Closed);
                return;
            }
        };

        self.advance(ConnectionState::AwaitingAckWrite);
        let write = async {
            wire::write_frame(&mut stream, &wire::encode_ack(&ack)).await?;
            stream.shutdown().await?;
            Ok::<_, CodecError>(())
        };
        match tokio::time::timeout(self.io_timeout, write).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!(origin = %self.origin, error = %e, "ack write failed"),
            Err(_) => tracing::warn!(origin = %self.origin, "ack write timed out"),
        }
        self.advance(ConnectionState::Closed);
    }

    /// Read, decode and deliver. None means the peer left without sending
    /// anything and gets no reply.
    async fn receive(&mut self, stream: &mut TcpStream) -> Option<Ack> {
        let raw = match tokio::time::timeout(
            self.io_timeout,
            wire::read_frame(stream, MAX_NOTICE_FRAME),
        )
        .await
        {
            Ok(Ok(raw)) => raw,
            Ok(Err(CodecError::Closed)) => {
                tracing::debug!(origin = %self.origin, "connection closed without payload");
                return None;
            }
            Ok(Err(e)) => {
                tracing::warn!(origin = %self.origin, error = %e, "bad notice frame");
                return Some(Ack::error(e.to_string()));
            }
            Err(_) => {
                tracing::warn!(origin = %self.origin, "timed out waiting for notice");
                return Some(Ack::error("timed out waiting for notice"));
            }
        };

        self.advance(ConnectionState::Decoding);
        let notice = match wire::decode_notice(&raw, self.clock.now()) {
            Ok(n) => n,
            Err(e) => {
                tracing::warn!(origin = %self.origin, error = %e, "undecodable notice");
                return Some(Ack::error(e.to_string()));
            }
        };

        self.advance(ConnectionState::Delivering);
        tracing::info!(origin = %self.origin, kind = notice.kind().as_wire(), "notice received");
        let handler = self.handler.clone();
        let origin = self.origin;
        let outcome = match tokio::task::spawn_blocking(move || handler.deliver(notice, origin)).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(origin = %self.origin, error = %e, "delivery handler failed");
                DeliveryOutcome::Error("delivery failed".to_string())
            }
        };
        Some(outcome.into_ack())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use aviso_core::{AckStatus, SystemClock};
    use chrono::Utc;
    use tokio::io::AsyncWriteExt;

    async fn start(handler: Arc<dyn DeliveryHandler>) -> ListenerHandle {
        NoticeListener::bind("127.0.0.1:0", handler, SystemClock::shared(), Duration::from_secs(2))
            .await
            .unwrap()
            .spawn()
            .unwrap()
    }

    async fn exchange(addr: SocketAddr, payload: &[u8]) -> Ack {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        wire::write_frame(&mut stream, payload).await.unwrap();
        stream.shutdown().await.unwrap();
        let raw = wire::read_frame(&mut stream, wire::MAX_ACK_FRAME).await.unwrap();
        wire::decode_ack(&raw).unwrap()
    }

    #[tokio::test]
    async fn delivers_and_acks() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let handle = start(Arc::new(move |notice: Notice, _origin: SocketAddr| {
            assert_eq!(notice.text(), "hola");
            seen.fetch_add(1, Ordering::SeqCst);
            DeliveryOutcome::Ok
        }))
        .await;

        let payload = wire::encode_notice(&Notice::new("hola", Utc::now())).unwrap();
        let ack = exchange(handle.local_addr(), &payload).await;
        assert_eq!(ack, Ack::ok());
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        handle.stop().await;
    }

    #[tokio::test]
    async fn malformed_json_gets_error_ack() {
        let handle = start(Arc::new(|_: Notice, _: SocketAddr| DeliveryOutcome::Ok)).await;

        let ack = exchange(handle.local_addr(), b"{not json").await;
        assert_eq!(ack.status, AckStatus::Error);

        let ack = exchange(handle.local_addr(), br#"{"mensaje": "  "}"#).await;
        assert_eq!(ack.status, AckStatus::Error);

        // The loop is still accepting.
        let payload = wire::encode_notice(&Notice::new("again", Utc::now())).unwrap();
        assert!(exchange(handle.local_addr(), &payload).await.is_ok());
        handle.stop().await;
    }

    #[tokio::test]
    async fn handler_error_and_panic_become_error_acks() {
        let handle = start(Arc::new(|notice: Notice, _: SocketAddr| {
            if notice.text() == "boom" {
                panic!("presenter crashed");
            }
            DeliveryOutcome::Error("inbox full".into())
        }))
        .await;

        let payload = wire::encode_notice(&Notice::new("hi", Utc::now())).unwrap();
        assert_eq!(exchange(handle.local_addr(), &payload).await, Ack::error("inbox full"));

        let payload = wire::encode_notice(&Notice::new("boom", Utc::now())).unwrap();
        let ack = exchange(handle.local_addr(), &payload).await;
        assert_eq!(ack.status, AckStatus::Error);
        handle.stop().await;
    }

    #[tokio::test]
    async fn long_handler_error_still_reaches_sender_as_rejection() {
        let handle = start(Arc::new(|_: Notice, _: SocketAddr| {
            DeliveryOutcome::Error("x".repeat(5000))
        }))
        .await;
        let peer = crate::peer::Peer::new("verbose", handle.local_addr().to_string());

        let err = crate::sender::NoticeSender::default()
            .send(&peer, &Notice::new("hola", Utc::now()), Duration::from_secs(2))
            .await
            .unwrap_err();
        match err {
            crate::sender::SendError::AckNotOk(detail) => {
                assert!(detail.len() > 4000);
                assert!(detail.chars().all(|c| c == 'x'));
            }
            other => panic!("expected AckNotOk, got {other:?}"),
        }
        handle.stop().await;
    }

    #[tokio::test]
    async fn dropping_the_handle_closes_the_socket() {
        let handle = start(Arc::new(|_: Notice, _: SocketAddr| DeliveryOutcome::Ok)).await;
        let addr = handle.local_addr();
        drop(handle);

        let mut refused = false;
        for _ in 0..50 {
            if TcpStream::connect(addr).await.is_err() {
                refused = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(refused, "listener still accepting after its handle was dropped");
    }

    #[tokio::test]
    async fn bare_connect_is_ignored() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let handle = start(Arc::new(move |_: Notice, _: SocketAddr| {
            seen.fetch_add(1, Ordering::SeqCst);
            DeliveryOutcome::Ok
        }))
        .await;

        drop(TcpStream::connect(handle.local_addr()).await.unwrap());
        let payload = wire::encode_notice(&Notice::new("after probe", Utc::now())).unwrap();
        assert!(exchange(handle.local_addr(), &payload).await.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        handle.stop().await;
    }

    #[tokio::test]
    async fn oversize_frame_is_rejected() {
        let handle = start(Arc::new(|_: Notice, _: SocketAddr| DeliveryOutcome::Ok)).await;

        let mut stream = TcpStream::connect(handle.local_addr()).await.unwrap();
        stream.write_all(&u32::MAX.to_be_bytes()).await.unwrap();
        let raw = wire::read_frame(&mut stream, wire::MAX_ACK_FRAME).await.unwrap();
        assert_eq!(wire::decode_ack(&raw).unwrap().status, AckStatus::Error);
        handle.stop().await;
    }

    #[tokio::test]
    async fn stop_closes_listening_socket() {
        let handle = start(Arc::new(|_: Notice, _: SocketAddr| DeliveryOutcome::Ok)).await;
        let addr = handle.local_addr();
        handle.stop().await;

        let err = TcpStream::connect(addr).await.unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::ConnectionRefused);
    }

    #[test]
    fn state_names() {
        assert_eq!(ConnectionState::AwaitingAckWrite.to_string(), "awaiting-ack-write");
    }
}
