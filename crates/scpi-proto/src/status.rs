//! IEEE-488.2 status model.
//!
//! The standard event status register (ESR) is a byte of sticky flags. A
//! flag is latched by the condition that owns it and stays set until the
//! register is read-and-cleared (`*ESR?`) or cleared (`*CLS`).
//!
//! Alongside the register sits the SCPI error queue, a bounded FIFO of
//! `code,"description"` entries drained by `SYSTem:ERRor?`.

use bitflags::bitflags;
use std::collections::VecDeque;

bitflags! {
    /// Standard event status register bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct EventStatus: u8 {
        /// Operation complete
        const OPC = 0x01;
        /// Device wants to become controller of the bus
        const RQC = 0x02;
        /// Query error
        const QYE = 0x04;
        /// Device-dependent error
        const DDE = 0x08;
        /// Execution error
        const EXE = 0x10;
        /// Command error
        const CME = 0x20;
        /// User request
        const URQ = 0x40;
        /// Power on
        const PON = 0x80;
    }
}

/// Sticky event status register.
#[derive(Debug, Clone, Default)]
pub struct StatusRegister {
    esr: EventStatus,
}

impl StatusRegister {
    /// Latch one or more flags.
    #[inline]
    pub fn set(&mut self, flags: EventStatus) {
        self.esr.insert(flags);
    }

    /// Clear one or more flags.
    #[inline]
    pub fn clear(&mut self, flags: EventStatus) {
        self.esr.remove(flags);
    }

    /// Check whether every flag in `flags` is set.
    #[inline]
    pub fn get(&self, flags: EventStatus) -> bool {
        self.esr.contains(flags)
    }

    /// Current register contents without clearing.
    #[inline]
    pub fn flags(&self) -> EventStatus {
        self.esr
    }

    /// Integer value of the register without clearing.
    #[inline]
    pub fn value(&self) -> u8 {
        self.esr.bits()
    }

    /// Return the register value and reset every flag.
    pub fn read_and_clear(&mut self) -> u8 {
        let value = self.esr.bits();
        self.esr = EventStatus::empty();
        value
    }
}

/// Default number of entries held by the error queue.
pub const DEFAULT_ERROR_QUEUE_DEPTH: usize = 20;

const QUEUE_OVERFLOW: (i16, &str) = (-350, "Queue overflow");

/// One queued error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorEntry {
    /// SCPI error number (negative for standard errors).
    pub code: i16,
    /// Human-readable description.
    pub message: String,
}

impl std::fmt::Display for ErrorEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Embedded double quotes would terminate the SCPI string early
        write!(f, "{},\"{}\"", self.code, self.message.replace('"', "'"))
    }
}

/// Bounded FIFO of errors.
///
/// When full, the newest entry is replaced by `-350,"Queue overflow"` and
/// further errors are discarded until the queue is drained.
#[derive(Debug, Clone)]
pub struct ErrorQueue {
    entries: VecDeque<ErrorEntry>,
    depth: usize,
}

impl Default for ErrorQueue {
    fn default() -> Self {
        Self::with_depth(DEFAULT_ERROR_QUEUE_DEPTH)
    }
}

impl ErrorQueue {
    /// Create a queue that holds at most `depth` entries (minimum 1).
    pub fn with_depth(depth: usize) -> Self {
        let depth = depth.max(1);
        Self {
            entries: VecDeque::with_capacity(depth),
            depth,
        }
    }

    /// Append an error.
    pub fn push(&mut self, code: i16, message: impl Into<String>) {
        if self.entries.len() < self.depth {
            self.entries.push_back(ErrorEntry {
                code,
                message: message.into(),
            });
            return;
        }
        if let Some(last) = self.entries.back_mut() {
            if last.code != QUEUE_OVERFLOW.0 {
                *last = ErrorEntry {
                    code: QUEUE_OVERFLOW.0,
                    message: QUEUE_OVERFLOW.1.to_string(),
                };
            }
        }
    }

    /// Remove and return the oldest entry.
    pub fn pop(&mut self) -> Option<ErrorEntry> {
        self.entries.pop_front()
    }

    /// Render the oldest entry for `SYSTem:ERRor?`, or `0,"No error"`.
    pub fn next_line(&mut self) -> String {
        match self.pop() {
            Some(entry) => entry.to_string(),
            None => "0,\"No error\"".to_string(),
        }
    }

    /// Number of queued entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
