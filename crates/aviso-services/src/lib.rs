//! aviso-services — the peer directory and everything that moves notices:
//! sender, listener, prober, fan-out dispatcher, plus accounts, stores and
//! the inbox.

pub mod accounts;
pub mod directory;
pub mod dispatch;
pub mod inbox;
pub mod listener;
pub mod peer;
pub mod prober;
pub mod send_target;
pub mod sender;
pub mod store;

pub use accounts::{Account, AccountError, AccountRegistry, Role};
pub use directory::{Directory, DirectoryError};
pub use dispatch::{DispatchResult, Dispatcher};
pub use inbox::{DeliveryPresenter, Inbox, InboxEntry};
pub use listener::{DeliveryHandler, DeliveryOutcome, ListenerError, ListenerHandle, NoticeListener};
pub use peer::{normalize_address, Liveness, Peer};
pub use prober::{probe, probe_all, probe_loop, ProbeSummary};
pub use send_target::TargetSelector;
pub use sender::{NoticeSender, SendError, SendObserver};
pub use store::{JsonFileStore, MemoryStore, PersistenceStore, StoreError, StoredState};
