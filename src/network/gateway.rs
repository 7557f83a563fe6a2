//! Gateway - TCP listener that accepts client sessions.
//!
//! An instrument has a single remote-control channel, so sessions are
//! served one at a time: the next connection is accepted only after the
//! current session ends. Pending connections wait in the listen backlog.

use crate::instrument::Event;
use crate::network::Connection;
use crate::telemetry::spans;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{Instrument, error, info, instrument};

/// The Gateway accepts incoming TCP connections and serves them in turn.
pub struct Gateway {
    listener: TcpListener,
    events: mpsc::UnboundedSender<Event>,
    max_line_len: usize,
}

impl Gateway {
    /// Bind the gateway to the specified address.
    pub async fn bind(
        addr: SocketAddr,
        events: mpsc::UnboundedSender<Event>,
        max_line_len: usize,
    ) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        info!(%addr, "Listener bound");

        Ok(Self {
            listener,
            events,
            max_line_len,
        })
    }

    /// Run the gateway, accepting sessions until the dispatcher stops.
    #[instrument(skip(self), name = "gateway")]
    pub async fn run(self) -> anyhow::Result<()> {
        let mut next_id: u64 = 0;

        loop {
            if self.events.is_closed() {
                anyhow::bail!("dispatcher stopped");
            }

            let (stream, addr) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    error!(error = %e, "Failed to accept connection");
                    continue;
                }
            };
            if let Err(e) = stream.set_nodelay(true) {
                error!(%addr, error = %e, "Failed to set TCP_NODELAY");
            }

            next_id += 1;
            let connection = Connection::new(stream, addr, self.events.clone(), self.max_line_len);
            if let Err(e) = connection
                .run()
                .instrument(spans::session(next_id, &addr))
                .await
            {
                error!(session = next_id, %addr, error = %e, "Session error");
            }
            info!(session = next_id, %addr, "Session closed");
        }
    }
}
