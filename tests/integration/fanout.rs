use crate::*;

use aviso_core::Clock;
use aviso_services::{Directory, DirectoryError, Dispatcher, Liveness, SendError, TargetSelector};
use chrono::Utc;

fn dispatcher(directory: &Directory) -> Dispatcher {
    Dispatcher::new(directory.clone(), SystemClock::shared())
}

/// Two unreachable peers: both fail, reported in directory order.
#[tokio::test]
async fn test_two_unreachable_peers_fail_in_order() -> Result<()> {
    let directory = Directory::new();
    directory.add("A", &dead_address().await?)?;
    directory.add("B", &dead_address().await?)?;

    let result = dispatcher(&directory)
        .dispatch(&Notice::new("hola", Utc::now()), &TargetSelector::AllPeers, SEND_TIMEOUT)
        .await?;

    assert_eq!(result.target_count, 2);
    assert_eq!(result.succeeded, 0);
    assert_eq!(result.failed, 2);
    assert_eq!(result.failures[0], ("A".to_string(), SendError::ConnectionRefused));
    assert_eq!(result.failures[1], ("B".to_string(), SendError::ConnectionRefused));
    Ok(())
}

/// Broadcast to an empty directory is a no-op, not an error.
#[tokio::test]
async fn test_empty_directory_dispatch() -> Result<()> {
    let result = dispatcher(&Directory::new())
        .dispatch(&Notice::new("hola", Utc::now()), &TargetSelector::AllPeers, SEND_TIMEOUT)
        .await?;
    assert_eq!((result.target_count, result.succeeded, result.failed), (0, 0, 0));
    assert!(result.failures.is_empty());
    Ok(())
}

/// Mixed targets: the live listener gets the notice, the dead peer fails,
/// and the counts add up.
#[tokio::test]
async fn test_partial_failure_is_counted_not_raised() -> Result<()> {
    let recorder = Arc::new(Recorder::default());
    let handle = start_listener(recorder.clone()).await?;

    let directory = Directory::new();
    directory.add("dead-1", &dead_address().await?)?;
    directory.add("live", &handle.local_addr().to_string())?;
    directory.add("dead-2", &dead_address().await?)?;

    let result = dispatcher(&directory)
        .dispatch(&Notice::new("a todos", Utc::now()), &TargetSelector::AllPeers, SEND_TIMEOUT)
        .await?;

    assert_eq!(result.target_count, 3);
    assert_eq!(result.succeeded, 1);
    assert_eq!(result.failed, 2);
    assert_eq!(result.succeeded + result.failed, result.target_count);
    let failed: Vec<_> = result.failures.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(failed, ["dead-1", "dead-2"]);
    assert_eq!(recorder.texts(), ["a todos"]);

    // Send outcomes fed liveness back into the directory.
    assert_eq!(directory.get("live").unwrap().liveness, Liveness::Online);
    assert_eq!(directory.get("dead-1").unwrap().liveness, Liveness::Offline);

    handle.stop().await;
    Ok(())
}

/// `AllLivePeers` only reaches peers last seen online.
#[tokio::test]
async fn test_all_live_peers_skips_offline() -> Result<()> {
    let recorder = Arc::new(Recorder::default());
    let handle = start_listener(recorder.clone()).await?;

    let directory = Directory::new();
    directory.add("live", &handle.local_addr().to_string())?;
    directory.add("dead", &dead_address().await?)?;
    let now = SystemClock.now();
    directory.update_liveness("live", Liveness::Online, now);
    directory.update_liveness("dead", Liveness::Offline, now);

    let result = dispatcher(&directory)
        .dispatch(&Notice::new("solo vivos", Utc::now()), &TargetSelector::AllLivePeers, SEND_TIMEOUT)
        .await?;
    assert_eq!(result.target_count, 1);
    assert_eq!(result.succeeded, 1);
    assert_eq!(recorder.count(), 1);

    handle.stop().await;
    Ok(())
}

/// Unknown single peer is the only way dispatch itself fails.
#[tokio::test]
async fn test_single_unknown_peer_is_not_found() -> Result<()> {
    let directory = Directory::new();
    directory.add("A", &dead_address().await?)?;

    let err = dispatcher(&directory)
        .dispatch(&Notice::new("hola", Utc::now()), &TargetSelector::peer("Z"), SEND_TIMEOUT)
        .await
        .unwrap_err();
    assert_eq!(err, DirectoryError::NotFound("Z".into()));
    Ok(())
}
