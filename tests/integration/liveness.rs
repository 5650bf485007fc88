use crate::*;

use aviso_core::clock::ManualClock;
use aviso_services::{probe_all, probe_loop, Directory, Liveness};
use chrono::{TimeZone, Utc};
use tokio::sync::broadcast;

/// A probe against a real listener marks it online and does not count as a
/// delivery.
#[tokio::test]
async fn test_probe_all_against_listener() -> Result<()> {
    let recorder = Arc::new(Recorder::default());
    let handle = start_listener(recorder.clone()).await?;

    let directory = Directory::new();
    directory.add("up", &handle.local_addr().to_string())?;
    directory.add("down", &dead_address().await?)?;

    let at = Utc.with_ymd_and_hms(2024, 9, 2, 7, 30, 0).unwrap();
    let summary = probe_all(&directory, &ManualClock::new(at), Duration::from_secs(1)).await;

    assert_eq!((summary.online, summary.offline), (1, 1));
    let up = directory.get("up").unwrap();
    assert_eq!(up.liveness, Liveness::Online);
    assert_eq!(up.last_checked, Some(at));
    assert_eq!(directory.get("down").unwrap().liveness, Liveness::Offline);

    // Give the listener a moment to see the bare close.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(recorder.count(), 0);

    handle.stop().await;
    Ok(())
}

/// Concurrent updates arriving out of order settle on the newest
/// observation.
#[tokio::test]
async fn test_out_of_order_liveness_updates() -> Result<()> {
    let directory = Directory::new();
    directory.add("A", "10.1.1.1")?;
    let base = Utc.with_ymd_and_hms(2024, 9, 2, 8, 0, 0).unwrap();

    let updates: Vec<_> = [7, 2, 9, 1, 5, 8, 3]
        .into_iter()
        .map(|secs| {
            let directory = directory.clone();
            tokio::spawn(async move {
                let state = if secs == 9 { Liveness::Online } else { Liveness::Offline };
                directory.update_liveness("A", state, base + chrono::Duration::seconds(secs));
            })
        })
        .collect();
    for update in updates {
        update.await?;
    }

    let a = directory.get("A").unwrap();
    assert_eq!(a.liveness, Liveness::Online);
    assert_eq!(a.last_checked, Some(base + chrono::Duration::seconds(9)));
    Ok(())
}

/// The background loop sweeps right away and keeps running until shut down.
#[tokio::test]
async fn test_probe_loop_refreshes_directory() -> Result<()> {
    let handle = start_listener(Arc::new(Recorder::default())).await?;
    let directory = Directory::new();
    directory.add("up", &handle.local_addr().to_string())?;

    let (shutdown, rx) = broadcast::channel(1);
    let task = tokio::spawn(probe_loop(
        directory.clone(),
        SystemClock::shared(),
        Duration::from_secs(60),
        Duration::from_secs(1),
        rx,
    ));

    let mut online = false;
    for _ in 0..50 {
        if directory.get("up").unwrap().is_online() {
            online = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(online, "first sweep never marked the peer online");

    shutdown.send(())?;
    tokio::time::timeout(Duration::from_secs(1), task).await??;
    handle.stop().await;
    Ok(())
}
