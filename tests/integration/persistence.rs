use crate::*;

use std::path::PathBuf;

use aviso_core::canned;
use aviso_core::clock::ManualClock;
use aviso_services::{
    AccountRegistry, Directory, Dispatcher, Inbox, JsonFileStore, Liveness, PersistenceStore,
    StoredState, TargetSelector,
};
use chrono::{TimeZone, Utc};

fn temp_state(name: &str) -> PathBuf {
    std::env::temp_dir()
        .join(format!("aviso-it-{}-{}", name, std::process::id()))
        .join("state.json")
}

/// Peers, liveness and accounts survive a save/load through the JSON store.
#[tokio::test]
async fn test_state_survives_restart() -> Result<()> {
    let path = temp_state("restart");
    let _ = std::fs::remove_dir_all(path.parent().unwrap());
    let store = JsonFileStore::new(&path);

    let handle = start_listener(Arc::new(Recorder::default())).await?;
    let directory = Directory::new();
    directory.add("Recepcion", &handle.local_addr().to_string())?;
    directory.add("Bodega", &dead_address().await?)?;
    let accounts = AccountRegistry::new();
    accounts.ensure_defaults();

    Dispatcher::new(directory.clone(), SystemClock::shared())
        .dispatch(&Notice::new("hola", Utc::now()), &TargetSelector::AllPeers, SEND_TIMEOUT)
        .await?;
    store.save(&StoredState::capture(&directory, &accounts))?;
    handle.stop().await;

    let (directory, accounts) = store.load()?.restore()?;
    let names: Vec<_> = directory.snapshot().into_iter().map(|p| p.name).collect();
    assert_eq!(names, ["Recepcion", "Bodega"]);
    assert_eq!(directory.get("Recepcion").unwrap().liveness, Liveness::Online);
    assert_eq!(directory.get("Bodega").unwrap().liveness, Liveness::Offline);
    assert!(accounts.verify("admin", "admin123").is_some());

    // The file is plain JSON with the peer list on top.
    let raw: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path)?)?;
    assert_eq!(raw["peers"][0]["name"], "Recepcion");
    assert_eq!(raw["peers"][1]["liveness"], "offline");

    let _ = std::fs::remove_dir_all(path.parent().unwrap());
    Ok(())
}

/// A canned notice sent over the wire lands in the inbox and closes itself
/// ten seconds after receipt; an ordinary one stays.
#[tokio::test]
async fn test_inbox_auto_close_over_the_wire() -> Result<()> {
    let start = Utc.with_ymd_and_hms(2024, 9, 2, 9, 0, 0).unwrap();
    let clock = Arc::new(ManualClock::new(start));
    let inbox = Inbox::new(clock.clone());
    let handle = start_listener(Arc::new(inbox.clone())).await?;

    let directory = Directory::new();
    directory.add("self", &handle.local_addr().to_string())?;
    let dispatcher = Dispatcher::new(directory, SystemClock::shared());

    let quick = canned::notice("cafe", Utc::now()).context("missing canned notice")?;
    let plain = Notice::new("Revisar el correo", Utc::now()).with_origin("admin");
    for notice in [&quick, &plain] {
        let result = dispatcher.dispatch(notice, &TargetSelector::peer("self"), SEND_TIMEOUT).await?;
        assert!(result.all_succeeded());
    }
    assert_eq!(inbox.len(), 2);

    assert_eq!(inbox.dismiss_expired(start + chrono::Duration::seconds(5)), 0);
    assert_eq!(inbox.dismiss_expired(start + chrono::Duration::seconds(11)), 1);
    let left = inbox.list();
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].notice.text(), "Revisar el correo");
    assert_eq!(left[0].notice.origin(), Some("admin"));

    handle.stop().await;
    Ok(())
}
