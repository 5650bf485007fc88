//! On-demand liveness sweep.

use anyhow::Result;

use aviso_core::config::AvisoConfig;
use aviso_core::SystemClock;
use aviso_services::probe_all;

use super::peers::cmd_peers_list;
use super::State;

pub async fn cmd_probe(state: &State, config: &AvisoConfig) -> Result<()> {
    if state.directory.is_empty() {
        println!("No peers to probe.");
        return Ok(());
    }

    let summary = probe_all(&state.directory, &SystemClock, config.probe.timeout()).await;
    state.save()?;

    println!("Probed {} peers: {} online, {} offline", summary.total(), summary.online, summary.offline);
    println!();
    cmd_peers_list(state)
}
