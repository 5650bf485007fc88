//! Inbox — received notices, newest last, for whoever displays them.
//!
//! Notices flagged `auto_close` drop out ten seconds after receipt; the
//! rest stay until cleared or pushed out by capacity.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Duration, Utc};

use aviso_core::{Notice, SharedClock};

use crate::listener::{DeliveryHandler, DeliveryOutcome};

/// Seconds an auto-close notice stays visible.
pub const AUTO_CLOSE_SECS: i64 = 10;

const DEFAULT_CAPACITY: usize = 256;

/// Shows notices to a human. Must not block for long.
pub trait DeliveryPresenter: Send + Sync {
    fn show(&self, notice: &Notice, origin: SocketAddr);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboxEntry {
    pub notice: Notice,
    pub origin: SocketAddr,
    pub received_at: DateTime<Utc>,
}

impl InboxEntry {
    fn expired(&self, now: DateTime<Utc>) -> bool {
        self.notice.auto_close() && now - self.received_at > Duration::seconds(AUTO_CLOSE_SECS)
    }
}

/// Clones share the same entries.
#[derive(Clone)]
pub struct Inbox {
    entries: Arc<Mutex<VecDeque<InboxEntry>>>,
    capacity: usize,
    presenter: Option<Arc<dyn DeliveryPresenter>>,
    clock: SharedClock,
}

impl Inbox {
    pub fn new(clock: SharedClock) -> Self {
        Self {
            entries: Arc::new(Mutex::new(VecDeque::new())),
            capacity: DEFAULT_CAPACITY,
            presenter: None,
            clock,
        }
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    pub fn with_presenter(mut self, presenter: Arc<dyn DeliveryPresenter>) -> Self {
        self.presenter = Some(presenter);
        self
    }

    /// Record a notice and pass it to the presenter.
    pub fn push(&self, notice: Notice, origin: SocketAddr) {
        if let Some(presenter) = &self.presenter {
            presenter.show(&notice, origin);
        }
        let entry = InboxEntry {
            notice,
            origin,
            received_at: self.clock.now(),
        };
        let mut entries = self.lock();
        if entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    /// Oldest first.
    pub fn list(&self) -> Vec<InboxEntry> {
        self.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Drop auto-close notices older than the close delay. Returns how many
    /// were removed.
    pub fn dismiss_expired(&self, now: DateTime<Utc>) -> usize {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|e| !e.expired(now));
        before - entries.len()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<InboxEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl DeliveryHandler for Inbox {
    fn deliver(&self, notice: Notice, origin: SocketAddr) -> DeliveryOutcome {
        tracing::debug!(%origin, auto_close = notice.auto_close(), "notice added to inbox");
        self.push(notice, origin);
        DeliveryOutcome::Ok
    }
}
