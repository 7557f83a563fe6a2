//! Connection - serves one client session.
//!
//! ```text
//!   socket ──LineCodec──▶ Event::Input ──▶ DispatcherActor
//!      ▲                                        │
//!      └──────LineCodec◀── out_rx ◀── OutputSink┘
//! ```
//!
//! The session attaches its output channel to the actor on start and
//! detaches on exit, whatever the exit reason. On a clean EOF the answers
//! to lines already read are written out first.

use crate::instrument::Event;
use crate::metrics;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use scpi_proto::{LineCodec, ProtocolError};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tokio_util::codec::Framed;
use tracing::{debug, info, warn};

/// Upper bound on waiting for outstanding answers after the client's EOF.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// A client session.
pub struct Connection {
    addr: SocketAddr,
    stream: TcpStream,
    events: mpsc::UnboundedSender<Event>,
    max_line_len: usize,
}

impl Connection {
    /// Create a new session handler.
    pub fn new(
        stream: TcpStream,
        addr: SocketAddr,
        events: mpsc::UnboundedSender<Event>,
        max_line_len: usize,
    ) -> Self {
        Self {
            addr,
            stream,
            events,
            max_line_len,
        }
    }

    /// Run the session until the client disconnects or framing fails.
    pub async fn run(self) -> anyhow::Result<()> {
        info!(addr = %self.addr, "Session attached");
        metrics::session_opened();

        let (out_tx, out_rx) = mpsc::unbounded_channel();
        if self.events.send(Event::Attach(out_tx)).is_err() {
            anyhow::bail!("dispatcher is not running");
        }

        let framed = Framed::new(self.stream, LineCodec::with_max_len(self.max_line_len));
        let result = serve(framed, &self.events, out_rx).await;

        let _ = self.events.send(Event::Detach);
        metrics::session_closed();
        result
    }
}

async fn serve(
    framed: Framed<TcpStream, LineCodec>,
    events: &mpsc::UnboundedSender<Event>,
    mut out_rx: mpsc::UnboundedReceiver<String>,
) -> anyhow::Result<()> {
    let (mut writer, mut reader) = framed.split();

    loop {
        tokio::select! {
            frame = reader.next() => match frame {
                Some(Ok(line)) => {
                    debug!(%line, "Received line");
                    if events.send(Event::Input(line)).is_err() {
                        anyhow::bail!("dispatcher is not running");
                    }
                }
                Some(Err(e)) => {
                    warn!(error = %e, "Framing error, closing session");
                    metrics::record_framing_error(framing_error_kind(&e));
                    return Err(e.into());
                }
                None => {
                    info!("Client disconnected");
                    return drain(&mut writer, events, &mut out_rx).await;
                }
            },
            Some(line) = out_rx.recv() => {
                debug!(%line, "Sending line");
                writer.send(line).await?;
            }
        }
    }
}

/// Deliver the answers to lines already forwarded before detaching.
///
/// Waits for the actor to handle everything sent so far, bounded by
/// [`DRAIN_TIMEOUT`]. Answers still deferred after that are dropped.
async fn drain(
    writer: &mut SplitSink<Framed<TcpStream, LineCodec>, String>,
    events: &mpsc::UnboundedSender<Event>,
    out_rx: &mut mpsc::UnboundedReceiver<String>,
) -> anyhow::Result<()> {
    let (ack_tx, ack_rx) = oneshot::channel();
    if events.send(Event::Flush(ack_tx)).is_err() {
        anyhow::bail!("dispatcher is not running");
    }
    if timeout(DRAIN_TIMEOUT, ack_rx).await.is_err() {
        warn!("Dispatcher did not flush in time, dropping remaining output");
    }

    while let Ok(line) = out_rx.try_recv() {
        debug!(%line, "Sending line");
        writer.send(line).await?;
    }
    Ok(())
}

fn framing_error_kind(e: &ProtocolError) -> &'static str {
    match e {
        ProtocolError::Io(_) => "io",
        ProtocolError::InvalidUtf8 { .. } => "invalid_utf8",
        ProtocolError::LineTooLong { .. } => "line_too_long",
        ProtocolError::IllegalControlChar(_) => "control_char",
        _ => "other",
    }
}
