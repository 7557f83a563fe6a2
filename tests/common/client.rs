//! Test SCPI client.
//!
//! Sends program lines and reads response lines with timeouts.

use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::time::timeout;

/// A test SCPI client.
pub struct TestClient {
    reader: BufReader<OwnedReadHalf>,
    writer: BufWriter<OwnedWriteHalf>,
}

impl TestClient {
    /// Connect to a test server.
    pub async fn connect(address: &str) -> anyhow::Result<Self> {
        let stream = TcpStream::connect(address).await?;

        let (read_half, write_half) = stream.into_split();
        let reader = BufReader::new(read_half);
        let writer = BufWriter::new(write_half);

        Ok(Self { reader, writer })
    }

    /// Send a raw program line.
    pub async fn send_raw(&mut self, line: &str) -> anyhow::Result<()> {
        self.writer.write_all(line.as_bytes()).await?;
        if !line.ends_with('\n') {
            self.writer.write_all(b"\n").await?;
        }
        self.writer.flush().await?;
        Ok(())
    }

    /// Close the sending direction; the server sees EOF.
    pub async fn shutdown_write(&mut self) -> anyhow::Result<()> {
        self.writer.shutdown().await?;
        Ok(())
    }

    /// Receive a single response line.
    pub async fn recv(&mut self) -> anyhow::Result<String> {
        self.recv_timeout(Duration::from_secs(5)).await
    }

    /// Receive a response line with a timeout.
    pub async fn recv_timeout(&mut self, dur: Duration) -> anyhow::Result<String> {
        let mut line = String::new();
        let n = timeout(dur, self.reader.read_line(&mut line)).await??;
        if n == 0 {
            anyhow::bail!("connection closed");
        }
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }

    /// Send a line and return the next response line.
    pub async fn query(&mut self, line: &str) -> anyhow::Result<String> {
        self.send_raw(line).await?;
        self.recv().await
    }

    /// Receive lines until the given predicate returns true.
    #[allow(dead_code)]
    pub async fn recv_until<F>(&mut self, mut predicate: F) -> anyhow::Result<Vec<String>>
    where
        F: FnMut(&str) -> bool,
    {
        let mut lines = Vec::new();
        loop {
            let line = self.recv().await?;
            let done = predicate(&line);
            lines.push(line);
            if done {
                break;
            }
        }
        Ok(lines)
    }

    /// Check that nothing arrives within `dur`.
    pub async fn expect_silence(&mut self, dur: Duration) -> anyhow::Result<()> {
        match self.recv_timeout(dur).await {
            Err(e) if e.is::<tokio::time::error::Elapsed>() => Ok(()),
            Err(e) => Err(e),
            Ok(line) => anyhow::bail!("unexpected line: {line}"),
        }
    }

    /// Wait for the server to close the connection.
    pub async fn expect_closed(&mut self) -> anyhow::Result<()> {
        let mut line = String::new();
        match timeout(Duration::from_secs(5), self.reader.read_line(&mut line)).await? {
            Ok(0) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::ConnectionReset => Ok(()),
            Err(e) => Err(e.into()),
            Ok(_) => anyhow::bail!("expected close, got: {}", line.trim_end()),
        }
    }
}
