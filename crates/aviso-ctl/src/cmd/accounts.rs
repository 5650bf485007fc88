//! Account management commands.

use anyhow::{bail, Result};

use aviso_services::Role;

use super::State;

pub fn cmd_accounts_list(state: &State) -> Result<()> {
    let accounts = state.accounts.list();

    println!("═══════════════════════════════════════");
    println!("  Accounts ({})", accounts.len());
    println!("═══════════════════════════════════════");

    for a in &accounts {
        let role = match a.role {
            Role::Admin => "admin",
            Role::Client => "cliente",
        };
        let status = if a.active { "" } else { " (disabled)" };
        println!("  {:<16} {:<24} {}{}", a.username, a.display_name, role, status);
    }

    Ok(())
}

pub fn cmd_accounts_add(
    state: &State,
    username: &str,
    display_name: &str,
    password: &str,
    role: &str,
) -> Result<()> {
    let role = match role {
        "admin" => Role::Admin,
        "cliente" | "client" => Role::Client,
        other => bail!("unknown role {other:?} (admin or cliente)"),
    };
    state.accounts.create(username, display_name, password, role)?;
    state.save()?;
    println!("Created account {}", username.trim());
    Ok(())
}

pub fn cmd_accounts_remove(state: &State, username: &str) -> Result<()> {
    state.accounts.remove(username)?;
    state.save()?;
    println!("Removed account {username}");
    Ok(())
}

pub fn cmd_accounts_passwd(state: &State, username: &str, password: &str) -> Result<()> {
    state.accounts.change_password(username, password)?;
    state.save()?;
    println!("Password changed for {username}");
    Ok(())
}

pub fn cmd_accounts_set_active(state: &State, username: &str, active: bool) -> Result<()> {
    state.accounts.set_active(username, active)?;
    state.save()?;
    println!("{} {}", if active { "Enabled" } else { "Disabled" }, username);
    Ok(())
}
