use crate::*;

use std::time::Instant;

use aviso_core::wire::{self, MAX_ACK_FRAME};
use aviso_core::{Ack, NoticeKind};
use aviso_services::{NoticeSender, Peer, SendError};
use chrono::Utc;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

/// Sender and listener agree end to end; the handler runs exactly once.
#[tokio::test]
async fn test_send_hola_is_delivered_once() -> Result<()> {
    let recorder = Arc::new(Recorder::default());
    let handle = start_listener(recorder.clone()).await?;
    let peer = Peer::new("local", handle.local_addr().to_string());

    let notice = Notice::new("hola", Utc::now())
        .with_origin("recepcion")
        .with_kind(NoticeKind::Reply);
    NoticeSender::default().send(&peer, &notice, SEND_TIMEOUT).await?;

    assert_eq!(recorder.count(), 1);
    let (received, origin) = recorder.seen.lock().unwrap()[0].clone();
    assert_eq!(received, notice);
    assert!(origin.ip().is_loopback());

    handle.stop().await;
    Ok(())
}

/// A non-JSON payload earns an error ack, which the sender reports as
/// `AckNotOk`.
#[tokio::test]
async fn test_non_json_payload_is_rejected_with_error_ack() -> Result<()> {
    let recorder = Arc::new(Recorder::default());
    let handle = start_listener(recorder.clone()).await?;

    let mut stream = TcpStream::connect(handle.local_addr()).await?;
    wire::write_frame(&mut stream, b"hola, sin json").await?;
    stream.shutdown().await?;
    let raw = wire::read_frame(&mut stream, MAX_ACK_FRAME).await?;
    let ack = wire::decode_ack(&raw)?;
    assert!(!ack.is_ok());
    assert!(!ack.detail.is_empty());
    assert_eq!(recorder.count(), 0);

    // Same thing through the sender: a peer that answers with an error ack.
    let fake = TcpListener::bind("127.0.0.1:0").await?;
    let peer = Peer::new("picky", fake.local_addr()?.to_string());
    let server = tokio::spawn(async move {
        let (mut stream, _) = fake.accept().await.unwrap();
        let _ = wire::read_frame(&mut stream, wire::MAX_NOTICE_FRAME).await;
        let ack = wire::encode_ack(&Ack::error("payload is not JSON"));
        wire::write_frame(&mut stream, &ack).await.unwrap();
    });
    let err = NoticeSender::default()
        .send(&peer, &Notice::new("hola", Utc::now()), SEND_TIMEOUT)
        .await
        .unwrap_err();
    assert_eq!(err, SendError::AckNotOk("payload is not JSON".into()));
    server.await?;

    handle.stop().await;
    Ok(())
}

/// A peer that accepts and never answers costs at most the timeout.
#[tokio::test]
async fn test_silent_peer_times_out() -> Result<()> {
    let silent = TcpListener::bind("127.0.0.1:0").await?;
    let peer = Peer::new("silent", silent.local_addr()?.to_string());
    let hold = tokio::spawn(async move {
        let (stream, _) = silent.accept().await.unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
        drop(stream);
    });

    let started = Instant::now();
    let err = NoticeSender::default()
        .send(&peer, &Notice::new("hola", Utc::now()), Duration::from_millis(500))
        .await
        .unwrap_err();
    assert_eq!(err, SendError::Timeout);
    assert!(started.elapsed() < Duration::from_millis(1500), "took {:?}", started.elapsed());

    hold.abort();
    Ok(())
}

/// Stopping the listener refuses new connections but lets an accepted one
/// finish its exchange.
#[tokio::test]
async fn test_stop_lets_in_flight_exchange_finish() -> Result<()> {
    let slow = Arc::new(move |notice: Notice, _: SocketAddr| {
        std::thread::sleep(Duration::from_millis(300));
        assert_eq!(notice.text(), "despacio");
        DeliveryOutcome::Ok
    });
    let handle = start_listener(slow).await?;
    let addr = handle.local_addr();
    let peer = Peer::new("slow", addr.to_string());

    let in_flight = tokio::spawn(async move {
        NoticeSender::default()
            .send(&peer, &Notice::new("despacio", Utc::now()), SEND_TIMEOUT)
            .await
    });
    // Let the connection be accepted before stopping.
    tokio::time::sleep(Duration::from_millis(100)).await;
    handle.stop().await;

    assert_eq!(in_flight.await?, Ok(()));
    assert!(TcpStream::connect(addr).await.is_err());
    Ok(())
}

/// Many clients at once, each with its own connection.
#[tokio::test]
async fn test_concurrent_senders_are_all_delivered() -> Result<()> {
    let recorder = Arc::new(Recorder::default());
    let handle = start_listener(recorder.clone()).await?;
    let peer = Peer::new("local", handle.local_addr().to_string());

    let sends: Vec<_> = (0..16)
        .map(|i| {
            let peer = peer.clone();
            tokio::spawn(async move {
                NoticeSender::default()
                    .send(&peer, &Notice::new(format!("aviso {i}"), Utc::now()), SEND_TIMEOUT)
                    .await
            })
        })
        .collect();
    for send in sends {
        send.await??;
    }

    let mut texts = recorder.texts();
    texts.sort();
    assert_eq!(texts.len(), 16);
    assert!(texts.contains(&"aviso 0".to_string()));
    assert!(texts.contains(&"aviso 15".to_string()));

    handle.stop().await;
    Ok(())
}
