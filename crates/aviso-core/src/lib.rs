//! aviso-core — shared notice types, wire codec, configuration and clock.
//! All other Aviso crates depend on this one.

pub mod canned;
pub mod clock;
pub mod config;
pub mod notice;
pub mod wire;

pub use clock::{Clock, SharedClock, SystemClock};
pub use notice::{Ack, AckStatus, Notice, NoticeKind};
pub use wire::{CodecError, DEFAULT_PORT};
