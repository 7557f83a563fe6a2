//! Test server management.
//!
//! Spawns and manages scpid instances for integration testing.

use std::process::{Child, Command};
use std::time::Duration;
use tempfile::TempDir;
use tokio::time::sleep;

/// Command tree used by the integration tests.
pub const INSTRUMENT: &str = r#"
[identity]
manufacturer = "Acme"
model = "VNA-1"
serial = "0001"
firmware = "1.0"

[[parameter]]
path = "SENSe:FREQuency:STARt"
kind = "double"
default = 1e6

[[parameter]]
path = "SENSe:FREQuency:STOP"
kind = "double"
default = 6e9

[[parameter]]
path = "SENSe:SWEep:POINts"
kind = "uint"
default = 201

[[parameter]]
path = "OUTPut"
kind = "bool"
default = false

[[parameter]]
path = "SYSTem:TEMPerature"
kind = "double"
default = 42.5
settable = false

[[operation]]
path = "SWEep:STARt"
duration_ms = 300
"#;

/// A test server instance.
pub struct TestServer {
    child: Child,
    port: u16,
    _dir: TempDir,
}

impl TestServer {
    /// Spawn a daemon serving the standard test instrument.
    pub async fn spawn() -> anyhow::Result<Self> {
        Self::spawn_with(INSTRUMENT, 1024).await
    }

    /// Spawn a daemon with a custom instrument section and line limit.
    pub async fn spawn_with(instrument: &str, max_line_len: usize) -> anyhow::Result<Self> {
        let port = free_port()?;
        let dir = tempfile::tempdir()?;

        let config_path = dir.path().join("scpid.toml");
        let config_content = format!(
            r#"
[server]
listen = "127.0.0.1:{port}"
metrics_port = 0
max_line_len = {max_line_len}
{instrument}
"#
        );
        std::fs::write(&config_path, config_content)?;

        let child = Command::new(env!("CARGO_BIN_EXE_scpid"))
            .arg(&config_path)
            .spawn()?;

        let server = Self {
            child,
            port,
            _dir: dir,
        };

        // Wait for server to start listening
        server.wait_until_ready().await?;

        Ok(server)
    }

    /// Wait until the server is accepting connections.
    ///
    /// The probe connection is a full session; it ends as soon as it is
    /// dropped.
    async fn wait_until_ready(&self) -> anyhow::Result<()> {
        for _ in 0..50 {
            if tokio::net::TcpStream::connect(("127.0.0.1", self.port))
                .await
                .is_ok()
            {
                return Ok(());
            }
            sleep(Duration::from_millis(100)).await;
        }
        anyhow::bail!("Server failed to start within 5 seconds")
    }

    /// Get the server address.
    pub fn address(&self) -> String {
        format!("127.0.0.1:{}", self.port)
    }

    /// Create a new test client connected to this server.
    pub async fn connect(&self) -> anyhow::Result<super::client::TestClient> {
        super::client::TestClient::connect(&self.address()).await
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// Ask the OS for a currently unused local port.
fn free_port() -> anyhow::Result<u16> {
    let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}
