//! The root dispatcher.
//!
//! [`Dispatcher`] owns the namespace, the input queue and the device state.
//! Lines pushed with [`Dispatcher::input`] are only queued; [`Dispatcher::process`]
//! drains the queue statement by statement:
//!
//! ```text
//! queue ──pop──▶ split_line ──▶ Statement::parse ──▶ resolve ──▶ Command
//!                                                                  │
//!                      OutputSink ◀── render / "ERROR" ◀───────────┘
//! ```
//!
//! Long-running work marks its node operation-pending and reports completion
//! later through [`Dispatcher::set_operation_pending`]. Once the whole tree is
//! quiescent the dispatcher latches OPC for an armed `*OPC`, answers a deferred
//! `*OPC?` with `1`, and resumes a queue suspended by `*WAI`.

use crate::command::{Call, CommandResult, Kind, Response};
use crate::common;
use crate::error::{Result, ScpiError};
use crate::node::{NodeId, Tree};
use crate::sink::{InputQueue, OutputSink};
use crate::statement::{split_line, Anchor, Statement};
use crate::status::{ErrorQueue, EventStatus, StatusRegister, DEFAULT_ERROR_QUEUE_DEPTH};
use std::collections::VecDeque;
use tracing::{debug, trace};

/// Output line for any failed statement.
pub const ERROR_RESPONSE: &str = "ERROR";

/// Callback told about every finished statement (header as written, outcome).
pub type StatementObserver =
    Box<dyn FnMut(&str, std::result::Result<&Response, &ScpiError>) + Send>;

/// Status register, error queue and completion bookkeeping.
#[derive(Debug, Clone, Default)]
pub struct DeviceState {
    pub(crate) status: StatusRegister,
    pub(crate) errors: ErrorQueue,
    /// `*OPC` seen while operations were pending
    pub(crate) opc_armed: bool,
    /// `*OPC?` waiting to be answered
    pub(crate) opc_query_scheduled: bool,
    /// `*WAI` holding the queue
    pub(crate) wai_executing: bool,
}

impl DeviceState {
    fn with_error_queue_depth(depth: usize) -> Self {
        Self {
            errors: ErrorQueue::with_depth(depth),
            ..Self::default()
        }
    }

    /// The event status register.
    pub fn status(&self) -> &StatusRegister {
        &self.status
    }

    /// Mutable access to the event status register.
    pub fn status_mut(&mut self) -> &mut StatusRegister {
        &mut self.status
    }

    /// The SCPI error queue.
    pub fn errors(&self) -> &ErrorQueue {
        &self.errors
    }

    /// Mutable access to the SCPI error queue.
    pub fn errors_mut(&mut self) -> &mut ErrorQueue {
        &mut self.errors
    }

    /// Check whether a `*OPC?` answer is deferred.
    pub fn opc_query_scheduled(&self) -> bool {
        self.opc_query_scheduled
    }

    /// Check whether `*OPC` is waiting for completion.
    pub fn opc_armed(&self) -> bool {
        self.opc_armed
    }

    /// Check whether `*WAI` is holding the queue.
    pub fn wai_executing(&self) -> bool {
        self.wai_executing
    }

    /// Latch the error's flag and queue it.
    pub fn record(&mut self, err: &ScpiError) {
        self.status.set(err.status_flag());
        let (code, description) = err.scpi_code();
        self.errors.push(code, format!("{description}; {err}"));
    }

    /// `*CLS`: clear the register and the error queue, disarm `*OPC`/`*OPC?`.
    pub fn clear(&mut self) {
        self.status.read_and_clear();
        self.errors.clear();
        self.opc_armed = false;
        self.opc_query_scheduled = false;
    }
}

/// Root of the namespace and driver of the statement queue.
pub struct Dispatcher {
    tree: Tree,
    state: DeviceState,
    queue: InputQueue,
    /// Statements of the line being processed, including any held by `*WAI`
    statements: VecDeque<String>,
    /// Node of the last resolved leaf, for relative statements
    context: NodeId,
    sink: Box<dyn OutputSink>,
    observer: Option<StatementObserver>,
    draining: bool,
}

impl Dispatcher {
    /// Create a dispatcher with the common commands registered.
    pub fn new(sink: impl OutputSink + 'static) -> Self {
        Self::with_error_queue_depth(sink, DEFAULT_ERROR_QUEUE_DEPTH)
    }

    /// Create a dispatcher whose error queue holds `depth` entries.
    pub fn with_error_queue_depth(sink: impl OutputSink + 'static, depth: usize) -> Self {
        let mut tree = Tree::new();
        // Registering into an empty tree cannot collide; a failure here is a
        // bug in the common command table.
        common::register(&mut tree).expect("common command table has a name collision");

        Self {
            tree,
            state: DeviceState::with_error_queue_depth(depth),
            queue: InputQueue::new(),
            statements: VecDeque::new(),
            context: NodeId::ROOT,
            sink: Box::new(sink),
            observer: None,
            draining: false,
        }
    }

    /// The namespace.
    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    /// Mutable namespace access for registration.
    ///
    /// Structural changes must not overlap with [`Dispatcher::process`]; use
    /// [`Dispatcher::remove`] for subtrees that may hold pending operations.
    pub fn tree_mut(&mut self) -> &mut Tree {
        &mut self.tree
    }

    /// Device state (register, error queue, completion flags).
    pub fn state(&self) -> &DeviceState {
        &self.state
    }

    /// Mutable device state, e.g. to latch PON at startup.
    pub fn state_mut(&mut self) -> &mut DeviceState {
        &mut self.state
    }

    /// A producer handle to the input queue.
    pub fn input_queue(&self) -> InputQueue {
        self.queue.clone()
    }

    /// Replace the output sink.
    pub fn set_sink(&mut self, sink: impl OutputSink + 'static) {
        self.sink = Box::new(sink);
    }

    /// Install a callback told about every finished statement.
    pub fn set_observer(&mut self, observer: StatementObserver) {
        self.observer = Some(observer);
    }

    /// Queue a line for processing. Does not process.
    pub fn input(&self, line: impl Into<String>) {
        self.queue.push(line);
    }

    /// Check whether `*WAI` is holding the queue.
    pub fn is_waiting(&self) -> bool {
        self.state.wai_executing
    }

    /// Number of queued lines plus statements held back by `*WAI`.
    pub fn backlog(&self) -> usize {
        self.queue.len() + self.statements.len()
    }

    /// Read the event status register and clear it.
    pub fn read_and_clear_status(&mut self) -> u8 {
        self.state.status.read_and_clear()
    }

    /// Drain the queue until it is empty or `*WAI` suspends it.
    ///
    /// Re-entrant calls (from completion notifications raised while
    /// draining) return immediately; the outer loop picks up the work.
    pub fn process(&mut self) {
        if self.draining {
            return;
        }
        self.draining = true;

        loop {
            if self.state.wai_executing {
                trace!(backlog = self.backlog(), "Queue held by *WAI");
                break;
            }
            if let Some(text) = self.statements.pop_front() {
                self.run_statement(&text);
                continue;
            }
            let Some(line) = self.queue.pop() else { break };
            trace!(%line, "Processing line");
            self.context = NodeId::ROOT;
            self.statements
                .extend(split_line(&line).into_iter().map(str::to_string));
        }

        self.draining = false;
    }

    /// Set a node's own pending flag.
    ///
    /// Clearing the last pending operation in the tree completes `*OPC`,
    /// answers a deferred `*OPC?` and releases `*WAI`. Returns `false` for
    /// unknown nodes.
    pub fn set_operation_pending(&mut self, node: NodeId, pending: bool) -> bool {
        match self.tree.set_operation_pending(node, pending) {
            None => false,
            Some(changed) => {
                if changed && !pending {
                    self.some_operation_completed();
                }
                true
            }
        }
    }

    /// Remove a subtree, re-checking completion if it held pending work.
    pub fn remove(&mut self, parent: NodeId, child: NodeId) -> bool {
        let was_pending = self.tree.is_operation_pending(child);
        let removed = self.tree.remove(parent, child);
        if removed && was_pending {
            self.some_operation_completed();
        }
        removed
    }

    /// Re-evaluate quiescence after some node finished an operation.
    pub fn some_operation_completed(&mut self) {
        if self.tree.is_operation_pending(NodeId::ROOT) {
            return;
        }
        debug!("All operations complete");
        if self.state.opc_armed {
            self.state.opc_armed = false;
            self.state.status.set(EventStatus::OPC);
        }
        if self.state.opc_query_scheduled {
            self.state.opc_query_scheduled = false;
            self.emit("1".to_string());
        }
        if self.state.wai_executing {
            self.state.wai_executing = false;
            self.process();
        }
    }

    fn emit(&mut self, line: String) {
        trace!(%line, "Output");
        self.sink.emit(line);
    }

    fn run_statement(&mut self, text: &str) {
        debug!(statement = %text.trim(), "Dispatching statement");

        let (header, result, pending) = match Statement::parse(text) {
            Err(e) => (text.trim().to_string(), Err(e), None),
            Ok(stmt) => match self.resolve(&stmt) {
                Err(e) => (stmt.header.to_string(), Err(e), None),
                Ok((node, index)) => {
                    self.context = node;
                    let kind = if stmt.query { Kind::Query } else { Kind::Execute };
                    let (result, pending) = self.invoke(node, index, kind, stmt.owned_args());
                    (stmt.header.to_string(), result, pending.map(|p| (node, p)))
                }
            },
        };

        if let Some(observer) = self.observer.as_mut() {
            observer(&header, result.as_ref());
        }

        // A completion answers an earlier line, so it goes out before this
        // statement's own response. Starting an operation emits nothing.
        if let Some((node, false)) = pending {
            self.set_operation_pending(node, false);
        }

        match result {
            Ok(response) => {
                if let Some(line) = response.render() {
                    self.emit(line);
                }
            }
            Err(e) => {
                debug!(%header, error = %e, code = e.scpi_code().0, "Statement failed");
                self.state.record(&e);
                self.emit(ERROR_RESPONSE.to_string());
            }
        }

        if let Some((node, true)) = pending {
            self.set_operation_pending(node, true);
        }
    }

    fn resolve(&self, stmt: &Statement<'_>) -> Result<(NodeId, usize)> {
        let not_found = || ScpiError::PathNotFound {
            path: stmt.header.to_string(),
        };

        let mut node = match stmt.anchor {
            Anchor::Relative if self.tree.contains(self.context) => self.context,
            _ => NodeId::ROOT,
        };
        let (leaf, path) = stmt.segments.split_last().ok_or_else(not_found)?;
        for segment in path {
            node = self.tree.child(node, segment).ok_or_else(not_found)?;
        }
        let index = self.tree.command_index(node, leaf).ok_or_else(not_found)?;
        Ok((node, index))
    }

    fn qualified_name(&self, node: NodeId, index: usize) -> String {
        let name = self
            .tree
            .commands(node)
            .get(index)
            .map(|c| c.name())
            .unwrap_or_default();
        match self.tree.path_of(node) {
            prefix if prefix.is_empty() => name.to_string(),
            prefix => format!("{prefix}:{name}"),
        }
    }

    fn invoke(
        &mut self,
        node: NodeId,
        index: usize,
        kind: Kind,
        raw_args: Vec<String>,
    ) -> (CommandResult, Option<bool>) {
        let qualified = self.qualified_name(node, index);
        let Some(command) = self.tree.command_mut(node, index) else {
            return (Err(ScpiError::PathNotFound { path: qualified }), None);
        };
        let args = command.normalize_args(raw_args);
        let Some(mut handler) = command.take_handler(kind) else {
            let err = match kind {
                Kind::Execute => ScpiError::NotExecutable { command: qualified },
                Kind::Query => ScpiError::NotQueryable { command: qualified },
            };
            return (Err(err), None);
        };

        let (result, pending) = {
            let mut call = Call::new(&args, node, &self.tree, &mut self.state);
            let result = handler(&mut call);
            (result, call.pending_request())
        };

        if let Some(command) = self.tree.command_mut(node, index) {
            command.restore_handler(kind, handler);
        }
        (result, pending)
    }
}
