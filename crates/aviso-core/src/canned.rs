//! Quick notices — the stock texts operators send with one command.
//!
//! Canned notices always auto-close on the receiving side.

use chrono::{DateTime, Utc};

use crate::notice::Notice;

/// `(key, text)` pairs, in menu order.
pub const CANNED: &[(&str, &str)] = &[
    ("urgente", "¡ATENCIÓN URGENTE! Necesito ayuda inmediatamente."),
    ("emergencia", "¡EMERGENCIA! Situación crítica."),
    ("alerta", "¡ALERTA! Requiere atención inmediata."),
    ("completado", "Tarea completada exitosamente."),
    ("listo", "Todo está listo para continuar."),
    ("tiempo", "¡Se agota el tiempo! Apúrate."),
    ("cafe", "¡Hora del café! ¿Te unes?"),
    ("almuerzo", "Es hora del almuerzo. ¿Vamos?"),
    ("pregunta", "Tengo una pregunta importante."),
    ("llamada", "Necesito hablar contigo urgente."),
    ("celebrar", "¡Tenemos algo que celebrar!"),
    ("me-voy", "Me voy a casa. ¡Hasta mañana!"),
    ("emergencia-general", "¡EMERGENCIA! Todos deben prestar atención."),
    ("reunion", "Reunión inmediata en sala principal."),
    ("fin-del-dia", "Fin de jornada laboral. ¡Hasta mañana!"),
];

/// Text for a quick-notice key. Keys are case-insensitive.
pub fn lookup(key: &str) -> Option<&'static str> {
    CANNED
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(key))
        .map(|(_, text)| *text)
}

/// Build the canned notice for `key`.
pub fn notice(key: &str, created_at: DateTime<Utc>) -> Option<Notice> {
    lookup(key).map(|text| Notice::canned(text, created_at))
}
