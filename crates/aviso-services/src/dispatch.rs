//! Fan-out dispatcher — sends one notice to every peer a selector names.
//!
//! One task per target, all started before any is awaited. The call returns
//! only when every target has finished, with failures listed in directory
//! order regardless of which peer answered first.

use std::sync::Arc;
use std::time::Duration;

use aviso_core::{Notice, SharedClock};

use crate::directory::{Directory, DirectoryError};
use crate::send_target::TargetSelector;
use crate::sender::{NoticeSender, SendError};

/// Aggregate outcome of one fan-out. `succeeded + failed == target_count`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchResult {
    pub target_count: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub failures: Vec<(String, SendError)>,
}

impl DispatchResult {
    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }
}

#[derive(Clone)]
pub struct Dispatcher {
    directory: Directory,
    sender: NoticeSender,
}

impl Dispatcher {
    /// Sends made through this dispatcher feed liveness back into `directory`.
    pub fn new(directory: Directory, clock: SharedClock) -> Self {
        let sender = NoticeSender::new(clock).with_observer(Arc::new(directory.clone()));
        Self { directory, sender }
    }

    pub fn directory(&self) -> &Directory {
        &self.directory
    }

    /// Send `notice` to every peer `selector` resolves to.
    ///
    /// Only an unknown single peer fails the call; per-peer failures are
    /// reported in the result.
    pub async fn dispatch(
        &self,
        notice: &Notice,
        selector: &TargetSelector,
        timeout: Duration,
    ) -> Result<DispatchResult, DirectoryError> {
        let targets = self.directory.resolve(selector)?;
        tracing::info!(selector = %selector, count = targets.len(), "dispatching notice");

        let handles: Vec<_> = targets
            .into_iter()
            .map(|peer| {
                let sender = self.sender.clone();
                let notice = notice.clone();
                let name = peer.name.clone();
                let task = tokio::spawn(async move { sender.send(&peer, &notice, timeout).await });
                (name, task)
            })
            .collect();

        let mut result = DispatchResult {
            target_count: handles.len(),
            ..Default::default()
        };
        for (name, task) in handles {
            let outcome = task.await.unwrap_or_else(|e| {
                tracing::error!(peer = %name, error = %e, "send task failed");
                Err(SendError::Io(format!("send task failed: {e}")))
            });
            match outcome {
                Ok(()) => result.succeeded += 1,
                Err(e) => {
                    result.failed += 1;
                    result.failures.push((name, e));
                }
            }
        }

        tracing::info!(
            selector = %selector,
            succeeded = result.succeeded,
            failed = result.failed,
            "dispatch finished"
        );
        Ok(result)
    }
}
