//! Telemetry utilities for line timing and session spans.

use std::time::Instant;

/// Guard for timing the processing of one program line.
///
/// Records line latency when dropped.
pub struct LineTimer {
    start: Instant,
}

impl LineTimer {
    /// Start timing a line.
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for LineTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for LineTimer {
    fn drop(&mut self) {
        let duration = self.start.elapsed().as_secs_f64();
        crate::metrics::record_line(duration);
    }
}

/// Standardized span constructors.
pub mod spans {
    use std::net::SocketAddr;
    use tracing::{Span, info_span};

    /// Create a span for a client session.
    pub fn session(id: u64, addr: &SocketAddr) -> Span {
        info_span!("session", id, addr = %addr)
    }
}
