//! Prometheus scrape endpoint.
//!
//! The listener is bound in `main` so a port that is taken fails startup;
//! serving then runs on its own task.

use axum::{Router, routing::get};
use std::net::SocketAddr;
use tokio::net::TcpListener;

/// A bound `/metrics` endpoint that has not started serving yet.
pub struct MetricsServer {
    listener: TcpListener,
    addr: SocketAddr,
}

impl MetricsServer {
    /// Bind `0.0.0.0:port`.
    pub async fn bind(port: u16) -> std::io::Result<Self> {
        let listener = TcpListener::bind(SocketAddr::from(([0, 0, 0, 0], port))).await?;
        let addr = listener.local_addr()?;
        Ok(Self { listener, addr })
    }

    /// The bound address (useful when bound to port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Serve scrapes until the task is dropped.
    pub async fn run(self) {
        tracing::info!(addr = %self.addr, "Metrics endpoint listening");
        if let Err(e) = axum::serve(self.listener, router()).await {
            tracing::error!(addr = %self.addr, error = %e, "Metrics endpoint failed");
        }
    }
}

fn router() -> Router {
    Router::new().route("/metrics", get(|| async { crate::metrics::gather_metrics() }))
}
