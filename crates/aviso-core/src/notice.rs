//! Notice schema — the unit of content broadcast between nodes, and the
//! receiver's acknowledgement.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What kind of notice this is. Carried on the wire as the `tipo` string.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum NoticeKind {
    /// Free text typed by an operator.
    #[default]
    AdHoc,
    /// One of the predefined quick notices.
    Canned,
    /// Answer to a notice received earlier.
    Reply,
}

impl NoticeKind {
    /// Wire string for `tipo`.
    pub fn as_wire(&self) -> &'static str {
        match self {
            Self::AdHoc => "aviso",
            Self::Canned => "aviso_rapido",
            Self::Reply => "respuesta",
        }
    }

    /// Parse a `tipo` string. Unknown values fall back to `AdHoc` so newer
    /// senders stay readable.
    pub fn from_wire(value: &str) -> Self {
        match value {
            "aviso_rapido" => Self::Canned,
            "respuesta" => Self::Reply,
            _ => Self::AdHoc,
        }
    }
}

/// A notice. Immutable once built; fields are exposed through accessors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    text: String,
    created_at: DateTime<Utc>,
    origin: Option<String>,
    auto_close: bool,
    kind: NoticeKind,
}

impl Notice {
    /// Create an ad-hoc notice. Text is validated at encode time, not here.
    pub fn new(text: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            text: text.into(),
            created_at,
            origin: None,
            auto_close: false,
            kind: NoticeKind::AdHoc,
        }
    }

    /// Create a canned quick notice. These close themselves on the receiver.
    pub fn canned(text: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self::new(text, created_at)
            .with_kind(NoticeKind::Canned)
            .with_auto_close(true)
    }

    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    pub fn with_auto_close(mut self, auto_close: bool) -> Self {
        self.auto_close = auto_close;
        self
    }

    pub fn with_kind(mut self, kind: NoticeKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn origin(&self) -> Option<&str> {
        self.origin.as_deref()
    }

    pub fn auto_close(&self) -> bool {
        self.auto_close
    }

    pub fn kind(&self) -> NoticeKind {
        self.kind
    }

    /// True when the text carries something other than whitespace.
    pub fn has_text(&self) -> bool {
        !self.text.trim().is_empty()
    }
}

/// Acknowledgement status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AckStatus {
    Ok,
    Error,
}

/// Receiver's reply to one notice.
///
/// Wire shape: `{"status": "ok"|"error", "mensaje": string}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    pub status: AckStatus,
    #[serde(rename = "mensaje", default)]
    pub detail: String,
}

impl Ack {
    /// Detail text sent with every successful acknowledgement.
    pub const RECEIVED: &'static str = "Aviso recibido";

    pub fn ok() -> Self {
        Self {
            status: AckStatus::Ok,
            detail: Self::RECEIVED.to_string(),
        }
    }

    pub fn error(detail: impl Into<String>) -> Self {
        Self {
            status: AckStatus::Error,
            detail: detail.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == AckStatus::Ok
    }
}
