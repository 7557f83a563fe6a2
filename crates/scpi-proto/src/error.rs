//! Error types for the SCPI core.
//!
//! [`ScpiError`] covers everything that can go wrong while registering
//! namespace entries or dispatching a statement. Every dispatch error is
//! recoverable: the dispatcher turns it into an `ERROR` line, latches the
//! matching event status flag and queues it for `SYSTem:ERRor?`.
//!
//! [`ProtocolError`] covers line framing on the transport side.

use crate::status::EventStatus;
use thiserror::Error;

/// Convenience type alias for Results using [`ScpiError`].
pub type Result<T, E = ScpiError> = std::result::Result<T, E>;

/// Errors raised by tree registration and statement dispatch.
#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum ScpiError {
    /// A sibling node or leaf already answers to this name (either form).
    #[error("name collision: {name}")]
    NameCollision {
        /// The rejected name.
        name: String,
    },

    /// The name is empty or contains a reserved character.
    #[error("invalid name: {name:?}")]
    InvalidName {
        /// The rejected name.
        name: String,
    },

    /// The statement could not be split into header and parameters.
    #[error("syntax error: {statement}")]
    Syntax {
        /// The offending statement text.
        statement: String,
    },

    /// A path segment did not match any node or leaf.
    #[error("undefined header: {path}")]
    PathNotFound {
        /// The path as written by the sender.
        path: String,
    },

    /// The leaf has no execute callback.
    #[error("{command} is not executable")]
    NotExecutable {
        /// The resolved leaf path.
        command: String,
    },

    /// The leaf has no query callback.
    #[error("{command} is not queryable")]
    NotQueryable {
        /// The resolved leaf path.
        command: String,
    },

    /// A required argument was not supplied.
    #[error("missing argument {index}")]
    MissingArgument {
        /// Zero-based argument position.
        index: usize,
    },

    /// An argument could not be converted to the bound type.
    #[error("cannot convert {value:?} to {expected}")]
    ArgumentParse {
        /// The raw argument token.
        value: String,
        /// The type the leaf expected.
        expected: &'static str,
    },

    /// The leaf's own logic rejected the operation.
    #[error("{0}")]
    Execution(String),

    /// The leaf reported a device-level failure.
    #[error("{0}")]
    Device(String),

    /// A completion query arrived while a previous one was still deferred.
    #[error("query interrupted")]
    QueryInterrupted,
}

impl ScpiError {
    /// Shorthand for a callback-reported failure.
    pub fn execution(msg: impl Into<String>) -> Self {
        Self::Execution(msg.into())
    }

    /// Shorthand for a device-dependent failure.
    pub fn device(msg: impl Into<String>) -> Self {
        Self::Device(msg.into())
    }

    /// Get a static error code string for metrics labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NameCollision { .. } => "name_collision",
            Self::InvalidName { .. } => "invalid_name",
            Self::Syntax { .. } => "syntax",
            Self::PathNotFound { .. } => "path_not_found",
            Self::NotExecutable { .. } => "not_executable",
            Self::NotQueryable { .. } => "not_queryable",
            Self::MissingArgument { .. } => "missing_argument",
            Self::ArgumentParse { .. } => "argument_parse",
            Self::Execution(_) => "execution",
            Self::Device(_) => "device",
            Self::QueryInterrupted => "query_interrupted",
        }
    }

    /// The event status flag latched when this error ends a statement.
    ///
    /// Registration errors never reach the register and map to the empty set.
    pub fn status_flag(&self) -> EventStatus {
        match self {
            Self::NameCollision { .. } | Self::InvalidName { .. } => EventStatus::empty(),
            Self::Syntax { .. }
            | Self::PathNotFound { .. }
            | Self::NotExecutable { .. }
            | Self::NotQueryable { .. }
            | Self::MissingArgument { .. }
            | Self::ArgumentParse { .. } => EventStatus::CME,
            Self::Execution(_) => EventStatus::EXE,
            Self::Device(_) => EventStatus::DDE,
            Self::QueryInterrupted => EventStatus::QYE,
        }
    }

    /// SCPI error number and standard description used in the error queue.
    pub fn scpi_code(&self) -> (i16, &'static str) {
        match self {
            Self::NameCollision { .. } | Self::InvalidName { .. } => (-100, "Command error"),
            Self::Syntax { .. } => (-102, "Syntax error"),
            Self::PathNotFound { .. } => (-113, "Undefined header"),
            Self::NotExecutable { .. } | Self::NotQueryable { .. } => (-100, "Command error"),
            Self::MissingArgument { .. } => (-109, "Missing parameter"),
            Self::ArgumentParse { .. } => (-104, "Data type error"),
            Self::Execution(_) => (-200, "Execution error"),
            Self::Device(_) => (-300, "Device-specific error"),
            Self::QueryInterrupted => (-410, "Query INTERRUPTED"),
        }
    }
}

/// Errors raised while framing transport lines.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProtocolError {
    /// I/O error during reading or writing.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Line was not valid UTF-8.
    #[error("invalid UTF-8 in line at byte {byte_pos}: {details}")]
    InvalidUtf8 {
        /// Byte position where validation failed.
        byte_pos: usize,
        /// Decoder message.
        details: String,
    },

    /// Line exceeded the configured maximum length.
    #[error("line too long: {actual} bytes (limit: {limit})")]
    LineTooLong {
        /// Actual length seen so far.
        actual: usize,
        /// Maximum allowed length.
        limit: usize,
    },

    /// Illegal control character in a line.
    #[error("illegal control character: {0:?}")]
    IllegalControlChar(char),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_errors_latch_command_error() {
        let err = ScpiError::PathNotFound {
            path: "SYST:FOO".into(),
        };
        assert_eq!(err.status_flag(), EventStatus::CME);
        assert_eq!(err.scpi_code().0, -113);
        assert_eq!(err.error_code(), "path_not_found");
    }

    #[test]
    fn test_callback_errors_keep_message_verbatim() {
        let err = ScpiError::execution("sweep already running");
        assert_eq!(err.to_string(), "sweep already running");
        assert_eq!(err.status_flag(), EventStatus::EXE);

        let err = ScpiError::device("synthesizer unlocked");
        assert_eq!(err.status_flag(), EventStatus::DDE);
        assert_eq!(err.scpi_code().0, -300);
    }

    #[test]
    fn test_registration_errors_have_no_flag() {
        let err = ScpiError::NameCollision {
            name: "FREQ".into(),
        };
        assert!(err.status_flag().is_empty());
    }
}
