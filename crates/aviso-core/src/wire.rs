//! Aviso wire format — what travels over one TCP exchange.
//!
//! A connection carries exactly two frames: one notice from the client and
//! one acknowledgement from the server. Each frame is a 4-byte big-endian
//! payload length followed by that many bytes of UTF-8 JSON.
//!
//! Notice JSON:
//!   {"mensaje": str, "timestamp": RFC3339, "tipo": str, "auto_cerrar": bool, "origen"?: str}
//!
//! Acknowledgement JSON:
//!   {"status": "ok"|"error", "mensaje": str}
//!
//! Field names are part of the protocol. Do not rename them.

use bytes::{BufMut, Bytes, BytesMut};
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::notice::{Ack, Notice, NoticeKind};

/// TCP port a listener binds when none is configured.
pub const DEFAULT_PORT: u16 = 8888;

/// Size of the length prefix in front of every frame.
pub const FRAME_HEADER_LEN: usize = 4;

/// Largest notice payload a receiver accepts.
pub const MAX_NOTICE_FRAME: usize = 64 * 1024;

/// Largest acknowledgement payload a sender accepts.
pub const MAX_ACK_FRAME: usize = 4 * 1024;

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("notice text is empty")]
    EmptyText,
    #[error("malformed notice payload: {0}")]
    MalformedPayload(String),
    #[error("malformed acknowledgement: {0}")]
    MalformedAck(String),
    #[error("frame of {len} bytes exceeds limit of {max}")]
    FrameTooLarge { len: usize, max: usize },
    #[error("connection closed before the frame was complete")]
    Truncated,
    #[error("connection closed without sending a frame")]
    Closed,
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

// ── Notice payload ────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct NoticeOut<'a> {
    mensaje: &'a str,
    timestamp: String,
    tipo: &'static str,
    auto_cerrar: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    origen: Option<&'a str>,
}

#[derive(Deserialize)]
struct NoticeIn {
    mensaje: String,
    #[serde(default)]
    timestamp: Option<String>,
    #[serde(default)]
    tipo: Option<String>,
    #[serde(default)]
    auto_cerrar: bool,
    #[serde(default)]
    origen: Option<String>,
}

/// Encode a notice as its JSON payload (without the frame header).
///
/// Fails with `EmptyText` before producing any bytes if the text is blank.
pub fn encode_notice(notice: &Notice) -> Result<Vec<u8>, CodecError> {
    if !notice.has_text() {
        return Err(CodecError::EmptyText);
    }
    let out = NoticeOut {
        mensaje: notice.text(),
        timestamp: format_timestamp(notice.created_at()),
        tipo: notice.kind().as_wire(),
        auto_cerrar: notice.auto_close(),
        origen: notice.origin(),
    };
    serde_json::to_vec(&out).map_err(|e| CodecError::MalformedPayload(e.to_string()))
}

/// Decode a notice payload.
///
/// `received_at` stands in for `created_at` when the sender omitted the
/// timestamp.
pub fn decode_notice(data: &[u8], received_at: DateTime<Utc>) -> Result<Notice, CodecError> {
    let raw: NoticeIn =
        serde_json::from_slice(data).map_err(|e| CodecError::MalformedPayload(e.to_string()))?;

    if raw.mensaje.trim().is_empty() {
        return Err(CodecError::MalformedPayload("empty mensaje".into()));
    }

    let created_at = match raw.timestamp.as_deref() {
        Some(ts) => parse_timestamp(ts)
            .ok_or_else(|| CodecError::MalformedPayload(format!("bad timestamp {ts:?}")))?,
        None => received_at,
    };

    let mut notice = Notice::new(raw.mensaje, created_at)
        .with_auto_close(raw.auto_cerrar)
        .with_kind(raw.tipo.as_deref().map(NoticeKind::from_wire).unwrap_or_default());
    if let Some(origin) = raw.origen {
        notice = notice.with_origin(origin);
    }
    Ok(notice)
}

// ── Acknowledgement payload ───────────────────────────────────────────────────

/// Encode an acknowledgement. The detail is cut at a char boundary until
/// the payload fits `MAX_ACK_FRAME`, so a long error never turns into an
/// unreadable ack.
pub fn encode_ack(ack: &Ack) -> Vec<u8> {
    // Two plain fields; serialization cannot fail.
    let mut bytes = serde_json::to_vec(ack).unwrap_or_default();
    let mut detail = ack.detail.as_str();
    while bytes.len() > MAX_ACK_FRAME && !detail.is_empty() {
        let excess = bytes.len() - MAX_ACK_FRAME;
        let mut cut = detail.len().saturating_sub(excess);
        while !detail.is_char_boundary(cut) {
            cut -= 1;
        }
        detail = &detail[..cut];
        let shortened = Ack {
            status: ack.status,
            detail: detail.to_string(),
        };
        bytes = serde_json::to_vec(&shortened).unwrap_or_default();
    }
    bytes
}

pub fn decode_ack(data: &[u8]) -> Result<Ack, CodecError> {
    serde_json::from_slice(data).map_err(|e| CodecError::MalformedAck(e.to_string()))
}

// ── Timestamps ────────────────────────────────────────────────────────────────

/// RFC3339 in UTC with a `Z` suffix. Sub-second digits appear only when
/// needed, so the same instant always formats to the same string.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Parse RFC3339. Offset-less ISO-8601 strings are read as UTC.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(at) = DateTime::parse_from_rfc3339(value) {
        return Some(at.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

// ── Framing ───────────────────────────────────────────────────────────────────

/// Prefix a payload with its big-endian u32 length.
pub fn frame(payload: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(FRAME_HEADER_LEN + payload.len());
    buf.put_u32(payload.len() as u32);
    buf.put_slice(payload);
    buf.freeze()
}

/// Write one frame and flush.
pub async fn write_frame<W>(writer: &mut W, payload: &[u8]) -> Result<(), CodecError>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(&frame(payload)).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one frame whose payload must not exceed `max` bytes.
///
/// A peer that closes before sending any byte yields `Closed`; one that
/// stops partway yields `Truncated`.
pub async fn read_frame<R>(reader: &mut R, max: usize) -> Result<Vec<u8>, CodecError>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; FRAME_HEADER_LEN];
    let first = reader.read(&mut header).await?;
    if first == 0 {
        return Err(CodecError::Closed);
    }
    reader
        .read_exact(&mut header[first..])
        .await
        .map_err(eof_as_truncated)?;

    let len = u32::from_be_bytes(header) as usize;
    if len > max {
        return Err(CodecError::FrameTooLarge { len, max });
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await.map_err(eof_as_truncated)?;
    Ok(payload)
}

fn eof_as_truncated(e: std::io::Error) -> CodecError {
    if e.kind() == std::io::ErrorKind::UnexpectedEof {
        CodecError::Truncated
    } else {
        CodecError::Io(e)
    }
}
