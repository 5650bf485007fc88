//! Send commands — one peer, every peer, or every live peer.

use anyhow::{bail, Context, Result};
use chrono::Utc;

use aviso_core::config::AvisoConfig;
use aviso_core::{canned, Notice, NoticeKind, SystemClock};
use aviso_services::{Dispatcher, TargetSelector};

use super::{Credentials, State};

/// What to send and as whom.
#[derive(Debug, Default)]
pub struct SendOptions {
    pub text: Option<String>,
    pub quick: Option<String>,
    pub auto_close: bool,
    pub reply: bool,
}

impl SendOptions {
    fn build(&self, state: &State, config: &AvisoConfig, creds: &Credentials) -> Result<Notice> {
        let now = Utc::now();
        let notice = match (&self.quick, &self.text) {
            (Some(key), None) => canned::notice(key, now)
                .with_context(|| format!("unknown quick notice {key:?}; see `aviso-ctl quick`"))?,
            (None, Some(text)) => {
                let kind = if self.reply { NoticeKind::Reply } else { NoticeKind::AdHoc };
                Notice::new(text.as_str(), now)
                    .with_kind(kind)
                    .with_auto_close(self.auto_close)
            }
            (Some(_), Some(_)) => bail!("give either --quick or a message, not both"),
            (None, None) => bail!("nothing to send"),
        };
        if !notice.has_text() {
            bail!("message is empty");
        }
        // Logged-in display name, or this node's name.
        let origin = match creds.login(&state.accounts)? {
            Some(account) => account.display_name,
            None => config.node.name.clone(),
        };
        Ok(notice.with_origin(origin))
    }
}

pub async fn cmd_send(
    state: &State,
    config: &AvisoConfig,
    selector: TargetSelector,
    opts: &SendOptions,
    creds: &Credentials,
) -> Result<()> {
    let notice = opts.build(state, config, creds)?;
    let dispatcher = Dispatcher::new(state.directory.clone(), SystemClock::shared());

    let result = dispatcher
        .dispatch(&notice, &selector, config.dispatch.send_timeout())
        .await?;
    // Liveness learned from the sends.
    state.save()?;

    if result.target_count == 0 {
        println!("No peers matched {selector}.");
        return Ok(());
    }

    println!(
        "Sent to {}/{} ({} failed)",
        result.succeeded, result.target_count, result.failed
    );
    for (name, err) in &result.failures {
        println!("  ✗ {name}: {err}");
    }

    if result.all_succeeded() {
        Ok(())
    } else {
        bail!("{} of {} sends failed", result.failed, result.target_count)
    }
}

pub fn cmd_quick_list() -> Result<()> {
    println!("═══════════════════════════════════════");
    println!("  Quick notices");
    println!("═══════════════════════════════════════");
    for (key, text) in canned::CANNED {
        println!("  {key:<20} {text}");
    }
    Ok(())
}
