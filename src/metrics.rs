//! Prometheus metrics collection for scpid.
//!
//! Exposed on an HTTP endpoint when `server.metrics_port` is set. All
//! recording helpers are no-ops until [`init`] has run, so the dispatcher
//! and the gateway can call them unconditionally.
//!
//! - `scpi_statements_total{class}` - statements executed, common vs. tree
//! - `scpi_statement_errors_total{error}` - failed statements by error kind
//! - `scpi_line_duration_seconds` - time to process one program line
//! - `scpi_pending_operations` - operations currently in flight
//! - `scpi_sessions_total` / `scpi_session_active` - client sessions
//! - `scpi_framing_errors_total{error}` - sessions closed by the line codec

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::sync::OnceLock;

/// Global Prometheus registry for all metrics.
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

pub fn registry() -> &'static Registry {
    REGISTRY.get_or_init(Registry::new)
}

// ========================================================================
// Counters (monotonic increasing)
// ========================================================================

/// Statements executed successfully, by class.
pub static STATEMENTS: OnceLock<IntCounterVec> = OnceLock::new();

/// Failed statements by error kind.
pub static STATEMENT_ERRORS: OnceLock<IntCounterVec> = OnceLock::new();

/// Sessions accepted.
pub static SESSIONS: OnceLock<IntCounter> = OnceLock::new();

/// Sessions closed because of a framing error.
pub static FRAMING_ERRORS: OnceLock<IntCounterVec> = OnceLock::new();

// ========================================================================
// Gauges and histograms
// ========================================================================

/// 1 while a session is attached.
pub static SESSION_ACTIVE: OnceLock<IntGauge> = OnceLock::new();

/// Operations in flight.
pub static PENDING_OPERATIONS: OnceLock<IntGauge> = OnceLock::new();

/// Line processing latency.
pub static LINE_LATENCY: OnceLock<Histogram> = OnceLock::new();

/// Initialize the Prometheus metrics registry.
///
/// Must be called once at startup before any metrics are recorded.
pub fn init() {
    let r = registry();

    // Helper macro to register metric
    macro_rules! register {
        ($metric:ident, $init:expr) => {
            let m = $init.expect(concat!(stringify!($metric), " creation failed"));
            if let Err(e) = r.register(Box::new(m.clone())) {
                tracing::warn!(error = %e, concat!("Failed to register metric ", stringify!($metric)));
            }
            let _ = $metric.set(m);
        };
    }

    register!(STATEMENTS, IntCounterVec::new(Opts::new("scpi_statements_total", "SCPI statements executed"), &["class"]));
    register!(STATEMENT_ERRORS, IntCounterVec::new(Opts::new("scpi_statement_errors_total", "SCPI statements failed by error kind"), &["error"]));
    register!(SESSIONS, IntCounter::new("scpi_sessions_total", "Client sessions accepted"));
    register!(FRAMING_ERRORS, IntCounterVec::new(Opts::new("scpi_framing_errors_total", "Sessions closed by a framing error"), &["error"]));
    register!(SESSION_ACTIVE, IntGauge::new("scpi_session_active", "Whether a client session is attached"));
    register!(PENDING_OPERATIONS, IntGauge::new("scpi_pending_operations", "Operations currently in flight"));
    register!(LINE_LATENCY, Histogram::with_opts(
        HistogramOpts::new("scpi_line_duration_seconds", "Program line processing latency")
            .buckets(vec![0.00001, 0.00005, 0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05])));
}

/// Gather all metrics and encode them in Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = registry().gather();
    let mut buffer = vec![];
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode Prometheus metrics");
        return String::new();
    }
    match String::from_utf8(buffer) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "Prometheus metrics were not valid UTF-8");
            String::new()
        }
    }
}

// ============================================================================
// Helper functions for metric updates
// ============================================================================

/// Record a successful statement.
///
/// Labelled by class only; headers as written by clients are unbounded.
#[inline]
pub fn record_statement(header: &str) {
    let class = if header.starts_with('*') { "common" } else { "tree" };
    if let Some(c) = STATEMENTS.get() {
        c.with_label_values(&[class]).inc();
    }
}

/// Record a failed statement.
#[inline]
pub fn record_statement_error(error: &str) {
    if let Some(c) = STATEMENT_ERRORS.get() {
        c.with_label_values(&[error]).inc();
    }
}

/// Record the processing time of one line.
#[inline]
pub fn record_line(duration_secs: f64) {
    if let Some(h) = LINE_LATENCY.get() {
        h.observe(duration_secs);
    }
}

/// Update the in-flight operation gauge.
#[inline]
pub fn set_pending_operations(count: usize) {
    if let Some(g) = PENDING_OPERATIONS.get() {
        g.set(count as i64);
    }
}

/// Record a session being attached.
#[inline]
pub fn session_opened() {
    if let Some(c) = SESSIONS.get() {
        c.inc();
    }
    if let Some(g) = SESSION_ACTIVE.get() {
        g.set(1);
    }
}

/// Record a session being detached.
#[inline]
pub fn session_closed() {
    if let Some(g) = SESSION_ACTIVE.get() {
        g.set(0);
    }
}

/// Record a session closed by the line codec.
#[inline]
pub fn record_framing_error(error: &str) {
    if let Some(c) = FRAMING_ERRORS.get() {
        c.with_label_values(&[error]).inc();
    }
}
