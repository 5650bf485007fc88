//! aviso-ctl — command-line interface for Aviso.
//!
//! Works directly on the state file the daemon uses; sends go straight to
//! the peers.

mod cmd;

use std::path::PathBuf;

use anyhow::{Context, Result};

use aviso_core::config::AvisoConfig;
use aviso_services::TargetSelector;

use cmd::send::SendOptions;
use cmd::{Credentials, State};

fn print_usage() {
    println!("Usage: aviso-ctl [--config <path>] <command>");
    println!();
    println!("Commands:");
    println!("  peers                               List peers and their liveness");
    println!("  peers add <name> <address>          Register a peer (port defaults to 8888)");
    println!("  peers remove <name>                 Remove a peer");
    println!("  peers rename <old> <new>            Rename a peer");
    println!("  peers set-address <name> <address>  Change a peer's address");
    println!("  probe                               Check which peers are reachable");
    println!("  send <peer> <message...>            Send a notice to one peer");
    println!("  send-all <message...>               Send a notice to every peer");
    println!("  send-live <message...>              Send a notice to peers last seen online");
    println!("  quick                               List quick notices");
    println!("  accounts                            List accounts");
    println!("  accounts add <user> <name> <password> [admin|cliente]");
    println!("  accounts remove <user>");
    println!("  accounts passwd <user> <password>");
    println!("  accounts enable|disable <user>");
    println!("  backup [dir]                        Save respaldo_<timestamp>.json (default: next to the state file)");
    println!("  config                              Show the effective configuration");
    println!();
    println!("Send options:");
    println!("  --quick <key>          Send a quick notice instead of a message");
    println!("  --auto-close           Receiver closes the notice after 10 seconds");
    println!("  --reply                Mark the notice as a reply");
    println!("  --user <u> --password <p>   Sign the notice with an account's name");
    println!();
    println!("Changing peers or accounts needs an admin login (--user/--password).");
    println!();
    println!("Options:");
    println!("  --config <path>   Config file (default: {})", AvisoConfig::file_path().display());
}

fn load_config(path: Option<PathBuf>) -> Result<AvisoConfig> {
    let Some(path) = path else {
        return AvisoConfig::load().context("failed to load config");
    };
    let mut config = AvisoConfig::load_from(&path)
        .with_context(|| format!("failed to load config from {}", path.display()))?;
    config.apply_overrides(|key| std::env::var(key).ok());
    Ok(config)
}

fn cmd_config(config: &AvisoConfig) -> Result<()> {
    println!("═══════════════════════════════════════");
    println!("  Aviso configuration");
    println!("═══════════════════════════════════════");
    println!("  Node name     : {}", config.node.name);
    println!("  Listen        : {}", config.network.listen_addr());
    println!("  Send timeout  : {} ms", config.dispatch.send_timeout_ms);
    println!("  Probe timeout : {} ms", config.probe.timeout_ms);
    match config.probe.interval() {
        Some(i) => println!("  Probe every   : {} s", i.as_secs()),
        None => println!("  Probe every   : never"),
    }
    println!("  State file    : {}", config.store.path.display());
    Ok(())
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();

    // Options may appear anywhere; everything else is positional.
    let mut config_path = None;
    let mut send = SendOptions::default();
    let mut creds = Credentials::default();
    let mut remaining: Vec<&str> = Vec::new();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--config" => {
                i += 1;
                config_path = Some(PathBuf::from(args.get(i).context("--config requires a value")?));
            }
            "--quick" => {
                i += 1;
                send.quick = Some(args.get(i).context("--quick requires a key")?.clone());
            }
            "--user" => {
                i += 1;
                creds.user = Some(args.get(i).context("--user requires a value")?.clone());
            }
            "--password" => {
                i += 1;
                creds.password = Some(args.get(i).context("--password requires a value")?.clone());
            }
            "--auto-close" => send.auto_close = true,
            "--reply" => send.reply = true,
            _ => remaining.push(&args[i]),
        }
        i += 1;
    }

    match remaining.as_slice() {
        ["help"] | ["--help"] | ["-h"] => {
            print_usage();
            return Ok(());
        }
        ["quick"] => return cmd::send::cmd_quick_list(),
        _ => {}
    }

    let config = load_config(config_path)?;
    if let ["config"] = remaining.as_slice() {
        return cmd_config(&config);
    }
    let state = State::open(&config)?;

    // Peer and account changes are admin-only.
    if let ["peers" | "accounts", _, ..] = remaining.as_slice() {
        creds.require_admin(&state.accounts)?;
    }

    match remaining.as_slice() {
        ["peers"] | []                           => cmd::peers::cmd_peers_list(&state),
        ["peers", "add", name, address]          => cmd::peers::cmd_peers_add(&state, name, address),
        ["peers", "remove", name]                => cmd::peers::cmd_peers_remove(&state, name),
        ["peers", "rename", old, new]            => cmd::peers::cmd_peers_rename(&state, old, new),
        ["peers", "set-address", name, address]  => cmd::peers::cmd_peers_set_address(&state, name, address),
        ["probe"]                                => cmd::probe::cmd_probe(&state, &config).await,
        ["backup"]                               => cmd::backup::cmd_backup(&state, None),
        ["backup", dir]                          => cmd::backup::cmd_backup(&state, Some(*dir)),
        ["send", peer, message @ ..] => {
            send.text = message_text(message);
            cmd::send::cmd_send(&state, &config, TargetSelector::peer(*peer), &send, &creds).await
        }
        ["send-all", message @ ..] => {
            send.text = message_text(message);
            cmd::send::cmd_send(&state, &config, TargetSelector::AllPeers, &send, &creds).await
        }
        ["send-live", message @ ..] => {
            send.text = message_text(message);
            cmd::send::cmd_send(&state, &config, TargetSelector::AllLivePeers, &send, &creds).await
        }
        ["accounts"]                             => cmd::accounts::cmd_accounts_list(&state),
        ["accounts", "add", user, name, password] => {
            cmd::accounts::cmd_accounts_add(&state, user, name, password, "cliente")
        }
        ["accounts", "add", user, name, password, role] => {
            cmd::accounts::cmd_accounts_add(&state, user, name, password, role)
        }
        ["accounts", "remove", user]             => cmd::accounts::cmd_accounts_remove(&state, user),
        ["accounts", "passwd", user, password]   => cmd::accounts::cmd_accounts_passwd(&state, user, password),
        ["accounts", "enable", user]             => cmd::accounts::cmd_accounts_set_active(&state, user, true),
        ["accounts", "disable", user]            => cmd::accounts::cmd_accounts_set_active(&state, user, false),
        other => {
            eprintln!("Unknown command: {}", other.join(" "));
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    }
}

/// Positional words joined back into one message; None if there are none.
fn message_text(words: &[&str]) -> Option<String> {
    (!words.is_empty()).then(|| words.join(" "))
}
