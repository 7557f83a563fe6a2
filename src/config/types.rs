//! Core configuration types and loading.

use serde::Deserialize;
use std::net::SocketAddr;
use std::path::Path;
use thiserror::Error;

use super::defaults::{default_error_queue_depth, default_max_line_len, default_true};

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Daemon configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Listener and limits.
    pub server: ServerConfig,
    /// `*IDN?` identification fields.
    pub identity: IdentityConfig,
    /// Bound parameters exposed in the command tree.
    #[serde(default, rename = "parameter")]
    pub parameters: Vec<ParameterBlock>,
    /// Simulated long-running operations.
    #[serde(default, rename = "operation")]
    pub operations: Vec<OperationBlock>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Address to bind to (e.g., "127.0.0.1:5025").
    pub listen: SocketAddr,
    /// Prometheus metrics HTTP port. Unset or 0 disables the endpoint.
    pub metrics_port: Option<u16>,
    /// Maximum accepted line length in bytes (default: 1024).
    #[serde(default = "default_max_line_len")]
    pub max_line_len: usize,
    /// Capacity of the SCPI error queue (default: 20).
    #[serde(default = "default_error_queue_depth")]
    pub error_queue_depth: usize,
}

/// Instrument identification, answered by `*IDN?`.
#[derive(Debug, Clone, Deserialize)]
pub struct IdentityConfig {
    pub manufacturer: String,
    pub model: String,
    pub serial: String,
    pub firmware: String,
}

impl IdentityConfig {
    /// The `*IDN?` response line.
    pub fn idn(&self) -> String {
        format!(
            "{},{},{},{}",
            self.manufacturer, self.model, self.serial, self.firmware
        )
    }
}

/// Value type of a bound parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterKind {
    Double,
    Uint,
    Bool,
}

impl ParameterKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Double => "double",
            Self::Uint => "uint",
            Self::Bool => "bool",
        }
    }
}

/// A typed parameter value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParameterValue {
    Double(f64),
    Uint(u32),
    Bool(bool),
}

/// A `[[parameter]]` block.
#[derive(Debug, Clone, Deserialize)]
pub struct ParameterBlock {
    /// Mnemonic path of the leaf (e.g., "SENSe:FREQuency:STARt").
    pub path: String,
    pub kind: ParameterKind,
    /// Initial value and `*RST` value. Zero / false when unset.
    pub default: Option<toml::Value>,
    #[serde(default = "default_true")]
    pub gettable: bool,
    #[serde(default = "default_true")]
    pub settable: bool,
}

impl ParameterBlock {
    /// The default converted to the declared kind.
    ///
    /// Returns `None` if the configured default does not fit the kind.
    pub fn initial_value(&self) -> Option<ParameterValue> {
        use toml::Value;

        match (self.kind, &self.default) {
            (ParameterKind::Double, None) => Some(ParameterValue::Double(0.0)),
            (ParameterKind::Double, Some(Value::Float(f))) => Some(ParameterValue::Double(*f)),
            (ParameterKind::Double, Some(Value::Integer(i))) => {
                Some(ParameterValue::Double(*i as f64))
            }
            (ParameterKind::Uint, None) => Some(ParameterValue::Uint(0)),
            (ParameterKind::Uint, Some(Value::Integer(i))) => {
                u32::try_from(*i).ok().map(ParameterValue::Uint)
            }
            (ParameterKind::Bool, None) => Some(ParameterValue::Bool(false)),
            (ParameterKind::Bool, Some(Value::Boolean(b))) => Some(ParameterValue::Bool(*b)),
            _ => None,
        }
    }
}

/// An `[[operation]]` block: an executable leaf that stays pending for
/// `duration_ms` after each invocation.
#[derive(Debug, Clone, Deserialize)]
pub struct OperationBlock {
    /// Mnemonic path of the leaf (e.g., "SWEep:STARt").
    pub path: String,
    pub duration_ms: u64,
}

/// Split a leaf path into its parent node path and leaf name.
///
/// `SENSe:FREQuency:STARt` becomes `("SENSe:FREQuency", "STARt")`; a
/// single segment lives at the root.
pub fn split_leaf_path(path: &str) -> (&str, &str) {
    let path = path.trim_start_matches(':');
    path.rsplit_once(':').unwrap_or(("", path))
}
