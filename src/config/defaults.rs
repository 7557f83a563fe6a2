//! Default value functions for configuration.

/// Returns `true` (for serde defaults).
pub fn default_true() -> bool {
    true
}

pub fn default_max_line_len() -> usize {
    scpi_proto::DEFAULT_MAX_LINE_LEN
}

pub fn default_error_queue_depth() -> usize {
    scpi_proto::status::DEFAULT_ERROR_QUEUE_DEPTH
}
