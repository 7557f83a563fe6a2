//! Input queue and output sinks.
//!
//! The dispatcher is fed through an [`InputQueue`] that any thread may push
//! to, and emits response lines into an [`OutputSink`] supplied by the
//! transport layer.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

/// Receiver of output lines.
pub trait OutputSink: Send {
    /// Deliver one output line (without terminator).
    fn emit(&mut self, line: String);
}

/// Sink that collects lines in memory.
///
/// Clones share the same buffer, so a test can keep one clone and hand the
/// other to the dispatcher.
#[derive(Debug, Clone, Default)]
pub struct Capture {
    lines: Arc<Mutex<Vec<String>>>,
}

impl Capture {
    /// Create an empty capture buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove and return every line captured so far.
    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.lines.lock())
    }

    /// Copy of the captured lines.
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }
}

impl OutputSink for Capture {
    fn emit(&mut self, line: String) {
        self.lines.lock().push(line);
    }
}

/// Sink wrapping a closure.
pub struct FnSink<F>(pub F);

impl<F> OutputSink for FnSink<F>
where
    F: FnMut(String) + Send,
{
    fn emit(&mut self, line: String) {
        (self.0)(line)
    }
}

/// Sink that drops every line.
#[derive(Debug, Clone, Copy, Default)]
pub struct Discard;

impl OutputSink for Discard {
    fn emit(&mut self, _line: String) {}
}

#[cfg(feature = "tokio")]
impl OutputSink for tokio::sync::mpsc::UnboundedSender<String> {
    fn emit(&mut self, line: String) {
        if self.send(line).is_err() {
            tracing::debug!("Output receiver closed, line dropped");
        }
    }
}

/// Shared FIFO of pending input lines.
///
/// The lock is the single synchronization point between producers and the
/// processing loop; it is held only for one push or pop.
#[derive(Debug, Clone, Default)]
pub struct InputQueue {
    lines: Arc<Mutex<VecDeque<String>>>,
}

impl InputQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a line at the tail.
    pub fn push(&self, line: impl Into<String>) {
        self.lines.lock().push_back(line.into());
    }

    /// Take the line at the head.
    pub fn pop(&self) -> Option<String> {
        self.lines.lock().pop_front()
    }

    /// Number of queued lines.
    pub fn len(&self) -> usize {
        self.lines.lock().len()
    }

    /// Check whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.lines.lock().is_empty()
    }
}
