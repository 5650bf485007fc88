//! Headless presenter — the daemon has no window, so notices go to the log.

use std::net::SocketAddr;

use aviso_core::Notice;
use aviso_services::DeliveryPresenter;

pub struct LogPresenter;

impl DeliveryPresenter for LogPresenter {
    fn show(&self, notice: &Notice, origin: SocketAddr) {
        tracing::info!(
            from = notice.origin().unwrap_or("-"),
            %origin,
            kind = notice.kind().as_wire(),
            sent_at = %notice.created_at(),
            auto_close = notice.auto_close(),
            "AVISO: {}",
            notice.text()
        );
    }
}
