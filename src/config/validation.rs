//! Configuration validation.
//!
//! Validates configuration at startup to catch common errors early.

use super::{Config, split_leaf_path};
use scpi_proto::mnemonic;
use thiserror::Error;

/// Validation errors for configuration.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("identity.{0} is required")]
    MissingIdentity(&'static str),
    #[error("identity.{0} must not contain ',' or a line break")]
    InvalidIdentity(&'static str),
    #[error("server.max_line_len must be at least 16, got {0}")]
    MaxLineLenTooSmall(usize),
    #[error("server.error_queue_depth must be greater than 0")]
    ZeroErrorQueueDepth,
    #[error("invalid command path '{0}'")]
    InvalidPath(String),
    #[error("command path '{0}' is declared more than once")]
    DuplicatePath(String),
    #[error("parameter '{path}': default is not a valid {kind}")]
    DefaultKindMismatch { path: String, kind: &'static str },
    #[error("operation '{0}': duration_ms must be greater than 0")]
    ZeroDuration(String),
}

/// Validate a configuration, returning all errors found.
pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    // Identity
    let identity = &config.identity;
    for (field, value) in [
        ("manufacturer", &identity.manufacturer),
        ("model", &identity.model),
        ("serial", &identity.serial),
        ("firmware", &identity.firmware),
    ] {
        if value.is_empty() {
            errors.push(ValidationError::MissingIdentity(field));
        } else if value.contains([',', '\r', '\n']) {
            errors.push(ValidationError::InvalidIdentity(field));
        }
    }

    // Limits
    if config.server.max_line_len < 16 {
        errors.push(ValidationError::MaxLineLenTooSmall(config.server.max_line_len));
    }
    if config.server.error_queue_depth == 0 {
        errors.push(ValidationError::ZeroErrorQueueDepth);
    }

    // Command paths
    let paths: Vec<&str> = config
        .parameters
        .iter()
        .map(|p| p.path.as_str())
        .chain(config.operations.iter().map(|o| o.path.as_str()))
        .collect();

    for (i, path) in paths.iter().enumerate() {
        if !is_valid_path(path) {
            errors.push(ValidationError::InvalidPath(path.to_string()));
            continue;
        }
        if paths[..i].iter().any(|earlier| same_path(earlier, path)) {
            errors.push(ValidationError::DuplicatePath(path.to_string()));
        }
    }

    // Parameter defaults
    for param in &config.parameters {
        if param.initial_value().is_none() {
            errors.push(ValidationError::DefaultKindMismatch {
                path: param.path.clone(),
                kind: param.kind.as_str(),
            });
        }
    }

    // Operations
    for op in &config.operations {
        if op.duration_ms == 0 {
            errors.push(ValidationError::ZeroDuration(op.path.clone()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Every segment must be a registrable name; common-command leaves
/// (`*XYZ`) are reserved for the daemon itself.
fn is_valid_path(path: &str) -> bool {
    let (_, leaf) = split_leaf_path(path);
    let segments: Vec<&str> = path.trim_start_matches(':').split(':').collect();
    !leaf.starts_with('*') && segments.iter().all(|s| mnemonic::is_valid_name(s))
}

/// Two leaf paths address the same leaf if every segment pair collides.
fn same_path(a: &str, b: &str) -> bool {
    let a: Vec<&str> = a.trim_start_matches(':').split(':').collect();
    let b: Vec<&str> = b.trim_start_matches(':').split(':').collect();
    a.len() == b.len() && a.iter().zip(&b).all(|(x, y)| mnemonic::collides(x, y))
}
