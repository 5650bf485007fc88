//! avisod — Aviso notice daemon.
//!
//! Listens for notices, keeps them in an inbox, and probes the peer list in
//! the background. Peer edits made with `aviso-ctl` while the daemon runs are
//! kept: on shutdown only liveness is written back into the state file.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use aviso_core::config::AvisoConfig;
use aviso_core::{Clock, SystemClock};
use aviso_services::{
    probe_loop, DeliveryHandler, Directory, Inbox, JsonFileStore, NoticeListener, PersistenceStore,
    StoredState,
};

mod presenter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Load config
    if let Err(e) = AvisoConfig::write_default_if_missing() {
        tracing::warn!(error = %e, "failed to write default config");
    }
    let config = AvisoConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to load config, using defaults");
        AvisoConfig::default()
    });
    tracing::info!(node = %config.node.name, "avisod starting");

    // Stored peers and accounts
    let store = JsonFileStore::new(&config.store.path);
    let (directory, accounts) = store
        .load()
        .context("failed to load state")?
        .restore()
        .context("failed to restore state")?;
    if accounts.ensure_defaults() {
        store
            .save(&StoredState::capture(&directory, &accounts))
            .context("failed to save seeded accounts")?;
    }
    tracing::info!(
        path = %store.path().display(),
        peers = directory.len(),
        accounts = accounts.len(),
        "state loaded"
    );

    let clock = SystemClock::shared();
    let inbox = Inbox::new(clock.clone()).with_presenter(Arc::new(presenter::LogPresenter));

    // ── Shutdown channel ─────────────────────────────────────────────────────
    let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(1);

    {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("shutdown signal received");
            let _ = shutdown.send(());
        });
    }

    // ── Spawn tasks ──────────────────────────────────────────────────────────

    let handler: Arc<dyn DeliveryHandler> = Arc::new(inbox.clone());
    let listener = NoticeListener::bind(
        &config.network.listen_addr(),
        handler,
        clock.clone(),
        config.network.io_timeout(),
    )
    .await
    .context("failed to start notice listener")?;
    let mut listener_task = tokio::spawn(listener.run(shutdown_tx.subscribe()));

    let prober_task = config.probe.interval().map(|interval| {
        tracing::info!(interval_secs = interval.as_secs(), "background probing enabled");
        tokio::spawn(probe_loop(
            directory.clone(),
            clock.clone(),
            interval,
            config.probe.timeout(),
            shutdown_tx.subscribe(),
        ))
    });

    let mut sweeper_task = {
        let inbox = inbox.clone();
        let clock = clock.clone();
        let mut shutdown = shutdown_tx.subscribe();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));
            loop {
                tokio::select! {
                    _ = shutdown.recv() => return,
                    _ = interval.tick() => {
                        let closed = inbox.dismiss_expired(clock.now());
                        if closed > 0 {
                            tracing::debug!(closed, remaining = inbox.len(), "auto-closed notices");
                        }
                    }
                }
            }
        })
    };

    // ── Wait for exit ────────────────────────────────────────────────────────

    let mut shutdown_rx = shutdown_tx.subscribe();

    tokio::select! {
        _ = shutdown_rx.recv()    => tracing::info!("shutting down"),
        r = &mut listener_task    => tracing::error!("listener exited: {:?}", r),
        r = &mut sweeper_task     => tracing::error!("inbox sweeper exited: {:?}", r),
    }
    let _ = shutdown_tx.send(());
    for task in [listener_task, sweeper_task].into_iter().chain(prober_task) {
        if !task.is_finished() {
            let _ = task.await;
        }
    }

    save_liveness(&store, &directory).context("failed to save state")?;
    tracing::info!(unread = inbox.len(), "avisod stopped");
    Ok(())
}

/// Write this run's liveness into the stored peers, leaving everything else
/// in the file as it is now.
fn save_liveness(store: &JsonFileStore, directory: &Directory) -> Result<()> {
    let mut state = store.load()?;
    for stored in &mut state.peers {
        if let Some(live) = directory.get(&stored.name) {
            if live.address == stored.address {
                stored.liveness = live.liveness;
                stored.last_checked = live.last_checked;
            }
        }
    }
    store.save(&state)?;
    Ok(())
}
