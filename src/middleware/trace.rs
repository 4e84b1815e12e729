//! Request tracing.

use std::net::SocketAddr;
use std::time::Instant;

use tracing::{info, info_span, Span};

/// Span wrapping everything logged while one request is handled.
pub(crate) fn request_span(method: &str, path: &str) -> Span {
    info_span!("request", method, path)
}

/// Times one request and emits its access event when finished.
pub(crate) struct AccessLog {
    peer: SocketAddr,
    started: Instant,
}

impl AccessLog {
    pub(crate) fn start(peer: SocketAddr) -> Self {
        Self { peer, started: Instant::now() }
    }

    /// Must be called inside the request span so the event carries method and path.
    ///
    /// Always `info`: failures already logged their cause at error level.
    pub(crate) fn finish(self, status: u16) {
        let latency_ms = self.started.elapsed().as_secs_f64() * 1000.0;
        info!(peer = %self.peer, status, latency_ms, "request completed");
    }
}
