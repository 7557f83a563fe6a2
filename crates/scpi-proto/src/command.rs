//! Command leaves.
//!
//! A [`Command`] is the addressable end of a path. It carries two
//! independent callbacks, one for the command form (`PATH args`) and one
//! for the query form (`PATH? args`). Either, both or neither may be set;
//! an inert leaf still occupies its name in the namespace.

use crate::dispatcher::DeviceState;
use crate::error::{Result, ScpiError};
use crate::node::{NodeId, Tree};

/// Outcome of a successful statement.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Response {
    /// Executed, nothing to report.
    #[default]
    Empty,
    /// Boolean answer `FALSE`.
    False,
    /// Boolean answer `TRUE`.
    True,
    /// Free-form answer, sent verbatim.
    Text(String),
}

impl Response {
    /// Canonical output line, `None` for [`Response::Empty`].
    pub fn render(&self) -> Option<String> {
        match self {
            Self::Empty => None,
            Self::False => Some("FALSE".to_string()),
            Self::True => Some("TRUE".to_string()),
            Self::Text(text) => Some(text.clone()),
        }
    }
}

impl From<bool> for Response {
    fn from(value: bool) -> Self {
        if value { Self::True } else { Self::False }
    }
}

impl From<String> for Response {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for Response {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

/// Result type for leaf callbacks.
pub type CommandResult = Result<Response>;

/// Leaf callback.
pub type Handler = Box<dyn FnMut(&mut Call<'_>) -> CommandResult + Send>;

/// Which callback a statement selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    /// Statement without the query marker.
    Execute,
    /// Statement ending in `?`.
    Query,
}

/// Context handed to a leaf callback.
///
/// Gives read access to the tree and to the device state (status register,
/// error queue). Operation-pending requests are recorded here and applied
/// by the dispatcher after the callback returns and its output is emitted.
pub struct Call<'a> {
    args: &'a [String],
    node: NodeId,
    tree: &'a Tree,
    state: &'a mut DeviceState,
    pending: Option<bool>,
}

impl<'a> Call<'a> {
    /// Build a call context for the leaf living under `node`.
    pub fn new(args: &'a [String], node: NodeId, tree: &'a Tree, state: &'a mut DeviceState) -> Self {
        Self {
            args,
            node,
            tree,
            state,
            pending: None,
        }
    }

    /// Argument tokens, already trimmed and case-normalized.
    #[inline]
    pub fn args(&self) -> &[String] {
        self.args
    }

    /// The node that owns the invoked leaf.
    #[inline]
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Read-only view of the namespace.
    #[inline]
    pub fn tree(&self) -> &Tree {
        self.tree
    }

    /// Device state: status register and error queue.
    #[inline]
    pub fn state(&mut self) -> &mut DeviceState {
        self.state
    }

    /// Mark the owning node operation-pending (or complete).
    ///
    /// The last request wins when called more than once.
    pub fn set_operation_pending(&mut self, pending: bool) {
        self.pending = Some(pending);
    }

    /// The pending request recorded by the callback, if any.
    pub fn pending_request(&self) -> Option<bool> {
        self.pending
    }
}

/// A named, executable and/or queryable leaf.
pub struct Command {
    name: String,
    execute: Option<Handler>,
    query: Option<Handler>,
    uppercase_args: bool,
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.name)
            .field("executable", &self.executable())
            .field("queryable", &self.queryable())
            .field("uppercase_args", &self.uppercase_args)
            .finish()
    }
}

impl Command {
    /// Create an inert leaf. Arguments are upper-cased by default.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            execute: None,
            query: None,
            uppercase_args: true,
        }
    }

    /// Attach the command-form callback.
    pub fn on_execute<F>(mut self, f: F) -> Self
    where
        F: FnMut(&mut Call<'_>) -> CommandResult + Send + 'static,
    {
        self.execute = Some(Box::new(f));
        self
    }

    /// Attach the query-form callback.
    pub fn on_query<F>(mut self, f: F) -> Self
    where
        F: FnMut(&mut Call<'_>) -> CommandResult + Send + 'static,
    {
        self.query = Some(Box::new(f));
        self
    }

    /// Hand arguments to the callbacks verbatim (file names, free text).
    pub fn preserve_case(mut self) -> Self {
        self.uppercase_args = false;
        self
    }

    /// The registered (mnemonic) name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Check whether the leaf has a command-form callback.
    #[inline]
    pub fn executable(&self) -> bool {
        self.execute.is_some()
    }

    /// Check whether the leaf has a query-form callback.
    #[inline]
    pub fn queryable(&self) -> bool {
        self.query.is_some()
    }

    /// Check whether arguments are upper-cased before dispatch.
    #[inline]
    pub fn uppercase_args(&self) -> bool {
        self.uppercase_args
    }

    /// Apply the leaf's case normalization to raw argument tokens.
    pub fn normalize_args(&self, args: Vec<String>) -> Vec<String> {
        if self.uppercase_args {
            args.into_iter().map(|a| a.to_uppercase()).collect()
        } else {
            args
        }
    }

    /// Run the command-form callback.
    pub fn execute(&mut self, call: &mut Call<'_>) -> CommandResult {
        match self.execute.as_mut() {
            Some(f) => f(call),
            None => Err(ScpiError::NotExecutable {
                command: self.name.clone(),
            }),
        }
    }

    /// Run the query-form callback.
    pub fn query(&mut self, call: &mut Call<'_>) -> CommandResult {
        match self.query.as_mut() {
            Some(f) => f(call),
            None => Err(ScpiError::NotQueryable {
                command: self.name.clone(),
            }),
        }
    }

    /// Detach a callback so it can run while the tree is borrowed.
    pub(crate) fn take_handler(&mut self, kind: Kind) -> Option<Handler> {
        match kind {
            Kind::Execute => self.execute.take(),
            Kind::Query => self.query.take(),
        }
    }

    /// Put back a callback detached by [`Command::take_handler`].
    pub(crate) fn restore_handler(&mut self, kind: Kind, handler: Handler) {
        match kind {
            Kind::Execute => self.execute = Some(handler),
            Kind::Query => self.query = Some(handler),
        }
    }
}
