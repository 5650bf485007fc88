//! Peer list commands.

use anyhow::Result;
use chrono::Local;

use aviso_services::Liveness;

use super::State;

pub fn cmd_peers_list(state: &State) -> Result<()> {
    let peers = state.directory.snapshot();
    if peers.is_empty() {
        println!("No peers registered. Add one with: aviso-ctl peers add <name> <address>");
        return Ok(());
    }

    println!("═══════════════════════════════════════");
    println!("  Peers ({}, {} online)", peers.len(), state.directory.online_count());
    println!("═══════════════════════════════════════");

    for p in &peers {
        let icon = match p.liveness {
            Liveness::Online => "●",
            Liveness::Offline => "○",
            Liveness::Unknown => "?",
        };
        let checked = p
            .last_checked
            .map(|at| at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "never".to_string());
        println!("  {} {:<24} {:<24} checked {}", icon, p.name, p.address, checked);
    }

    Ok(())
}

pub fn cmd_peers_add(state: &State, name: &str, address: &str) -> Result<()> {
    state.directory.add(name, address)?;
    state.save()?;
    if let Some(peer) = state.directory.get(name.trim()) {
        println!("Added {} at {}", peer.name, peer.address);
    }
    Ok(())
}

pub fn cmd_peers_remove(state: &State, name: &str) -> Result<()> {
    let peer = state.directory.remove(name)?;
    state.save()?;
    println!("Removed {} ({})", peer.name, peer.address);
    Ok(())
}

pub fn cmd_peers_rename(state: &State, old: &str, new: &str) -> Result<()> {
    state.directory.rename(old, new)?;
    state.save()?;
    println!("Renamed {} to {}", old, new.trim());
    Ok(())
}

pub fn cmd_peers_set_address(state: &State, name: &str, address: &str) -> Result<()> {
    state.directory.set_address(name, address)?;
    state.save()?;
    if let Some(peer) = state.directory.get(name) {
        println!("{} now at {}", peer.name, peer.address);
    }
    Ok(())
}
