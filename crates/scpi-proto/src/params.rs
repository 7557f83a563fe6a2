//! Argument conversion and bound parameter storage.

use crate::error::{Result, ScpiError};
use parking_lot::Mutex;
use std::sync::Arc;

/// Externally owned storage for a bound parameter.
///
/// The tree holds a clone of the cell inside the synthesized leaf; the
/// application keeps its own clone and reads or writes the value directly.
/// The tree never decides when the value goes away.
#[derive(Debug, Default)]
pub struct ParamCell<T> {
    inner: Arc<Mutex<T>>,
}

impl<T> Clone for ParamCell<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Copy> ParamCell<T> {
    /// Create a cell holding `value`.
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(Mutex::new(value)),
        }
    }

    /// Read the current value.
    #[inline]
    pub fn get(&self) -> T {
        *self.inner.lock()
    }

    /// Replace the current value.
    #[inline]
    pub fn set(&self, value: T) {
        *self.inner.lock() = value;
    }
}

fn arg(args: &[String], index: usize) -> Result<&str> {
    args.get(index)
        .map(String::as_str)
        .ok_or(ScpiError::MissingArgument { index })
}

fn parse_error(value: &str, expected: &'static str) -> ScpiError {
    ScpiError::ArgumentParse {
        value: value.to_string(),
        expected,
    }
}

/// Convert argument `index` to a double.
pub fn arg_to_double(args: &[String], index: usize) -> Result<f64> {
    let raw = arg(args, index)?;
    raw.parse::<f64>().map_err(|_| parse_error(raw, "double"))
}

/// Convert argument `index` to an unsigned 64-bit integer.
pub fn arg_to_u64(args: &[String], index: usize) -> Result<u64> {
    let raw = arg(args, index)?;
    raw.parse::<u64>()
        .map_err(|_| parse_error(raw, "unsigned integer"))
}

/// Convert argument `index` to an unsigned 32-bit integer.
pub fn arg_to_u32(args: &[String], index: usize) -> Result<u32> {
    let raw = arg(args, index)?;
    raw.parse::<u32>()
        .map_err(|_| parse_error(raw, "unsigned integer"))
}

/// Convert argument `index` to a signed 64-bit integer.
pub fn arg_to_i64(args: &[String], index: usize) -> Result<i64> {
    let raw = arg(args, index)?;
    raw.parse::<i64>().map_err(|_| parse_error(raw, "integer"))
}

/// Convert argument `index` to a boolean.
///
/// Accepts `TRUE`, `ON`, `1` and `FALSE`, `OFF`, `0` in any letter case.
pub fn arg_to_bool(args: &[String], index: usize) -> Result<bool> {
    let raw = arg(args, index)?;
    if ["TRUE", "ON", "1"].iter().any(|s| raw.eq_ignore_ascii_case(s)) {
        Ok(true)
    } else if ["FALSE", "OFF", "0"].iter().any(|s| raw.eq_ignore_ascii_case(s)) {
        Ok(false)
    } else {
        Err(parse_error(raw, "boolean"))
    }
}
