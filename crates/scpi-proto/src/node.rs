//! The namespace tree.
//!
//! Nodes live in an arena owned by [`Tree`] and are addressed by copyable
//! [`NodeId`]s. A node exclusively owns its child nodes and its command
//! leaves; the parent link is a plain index used for renaming checks and
//! for walking towards the root. Slots of removed subtrees are never
//! reused, so a stale id simply resolves to nothing.
//!
//! Sibling names are unique across nodes and leaves combined, in either
//! mnemonic form (see [`crate::mnemonic`]).

use crate::command::{Command, Response};
use crate::error::{Result, ScpiError};
use crate::mnemonic;
use crate::params::{arg_to_bool, arg_to_double, arg_to_u32, ParamCell};
use tracing::warn;

/// Hook invoked after a bound parameter has been assigned.
pub type OnSet = Box<dyn FnMut() + Send>;

/// Index of a node in its [`Tree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    /// The root of every tree.
    pub const ROOT: NodeId = NodeId(0);
}

#[derive(Debug)]
struct Node {
    name: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    commands: Vec<Command>,
    pending: bool,
}

impl Node {
    fn new(name: String, parent: Option<NodeId>) -> Self {
        Self {
            name,
            parent,
            children: Vec::new(),
            commands: Vec::new(),
            pending: false,
        }
    }
}

/// Arena of namespace nodes rooted at [`NodeId::ROOT`].
#[derive(Debug)]
pub struct Tree {
    nodes: Vec<Option<Node>>,
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

impl Tree {
    /// Create a tree holding only the (unnamed) root.
    pub fn new() -> Self {
        Self {
            nodes: vec![Some(Node::new(String::new(), None))],
        }
    }

    fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0).and_then(Option::as_ref)
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0).and_then(Option::as_mut)
    }

    /// Check whether `id` refers to a live node.
    pub fn contains(&self, id: NodeId) -> bool {
        self.node(id).is_some()
    }

    /// Name of a node.
    pub fn name(&self, id: NodeId) -> Option<&str> {
        self.node(id).map(|n| n.name.as_str())
    }

    /// Parent of a node (`None` for the root and for unknown ids).
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).and_then(|n| n.parent)
    }

    /// Direct child nodes.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    /// Leaves registered directly under a node.
    pub fn commands(&self, id: NodeId) -> &[Command] {
        self.node(id).map(|n| n.commands.as_slice()).unwrap_or(&[])
    }

    /// Colon-joined path of a node from the root (empty for the root).
    pub fn path_of(&self, id: NodeId) -> String {
        let mut parts = Vec::new();
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            let Some(node) = self.node(current) else { break };
            if node.parent.is_some() {
                parts.push(node.name.as_str());
            }
            cursor = node.parent;
        }
        parts.reverse();
        parts.join(":")
    }

    /// Check whether `name` collides with any child node or leaf of `parent`,
    /// ignoring the node `except` (used when renaming).
    fn name_collision(&self, parent: NodeId, name: &str, except: Option<NodeId>) -> bool {
        let Some(node) = self.node(parent) else {
            return false;
        };
        let node_hit = node
            .children
            .iter()
            .filter(|&&child| Some(child) != except)
            .filter_map(|&child| self.name(child))
            .any(|sibling| mnemonic::collides(sibling, name));
        let leaf_hit = node
            .commands
            .iter()
            .any(|cmd| mnemonic::collides(cmd.name(), name));
        node_hit || leaf_hit
    }

    fn check_insert(&self, parent: NodeId, name: &str) -> Result<()> {
        if !mnemonic::is_valid_name(name) {
            return Err(ScpiError::InvalidName {
                name: name.to_string(),
            });
        }
        if !self.contains(parent) {
            return Err(ScpiError::PathNotFound {
                path: format!("{parent:?}"),
            });
        }
        if self.name_collision(parent, name, None) {
            warn!(parent = %self.path_of(parent), %name, "Name collision, registration rejected");
            return Err(ScpiError::NameCollision {
                name: name.to_string(),
            });
        }
        Ok(())
    }

    /// Create a child node under `parent`.
    pub fn add_node(&mut self, parent: NodeId, name: impl Into<String>) -> Result<NodeId> {
        let name = name.into();
        self.check_insert(parent, &name)?;

        let id = NodeId(self.nodes.len());
        self.nodes.push(Some(Node::new(name, Some(parent))));
        if let Some(node) = self.node_mut(parent) {
            node.children.push(id);
        }
        Ok(id)
    }

    /// Register a leaf under `parent`.
    pub fn add_command(&mut self, parent: NodeId, command: Command) -> Result<()> {
        self.check_insert(parent, command.name())?;
        if let Some(node) = self.node_mut(parent) {
            node.commands.push(command);
        }
        Ok(())
    }

    /// Detach and destroy the subtree rooted at `child`.
    ///
    /// Returns `false` (and changes nothing) unless `child` is a direct
    /// child of `parent`.
    pub fn remove(&mut self, parent: NodeId, child: NodeId) -> bool {
        let Some(node) = self.node_mut(parent) else {
            return false;
        };
        let Some(pos) = node.children.iter().position(|&c| c == child) else {
            return false;
        };
        node.children.remove(pos);

        let mut stack = vec![child];
        while let Some(id) = stack.pop() {
            if let Some(removed) = self.nodes.get_mut(id.0).and_then(Option::take) {
                stack.extend(removed.children);
            }
        }
        true
    }

    /// Remove the leaf under `parent` that answers to `name`.
    pub fn remove_command(&mut self, parent: NodeId, name: &str) -> bool {
        let Some(node) = self.node_mut(parent) else {
            return false;
        };
        match node
            .commands
            .iter()
            .position(|cmd| mnemonic::collides(cmd.name(), name))
        {
            Some(pos) => {
                node.commands.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Rename a node, rejecting names that collide with its siblings.
    ///
    /// Paths below the node follow the new name; nothing else changes.
    pub fn change_name(&mut self, id: NodeId, new_name: impl Into<String>) -> bool {
        let new_name = new_name.into();
        let Some(node) = self.node(id) else {
            return false;
        };
        if node.name == new_name {
            return true;
        }
        if !mnemonic::is_valid_name(&new_name) {
            return false;
        }
        if let Some(parent) = node.parent {
            if self.name_collision(parent, &new_name, Some(id)) {
                warn!(node = %self.path_of(id), %new_name, "Rename rejected, name collision");
                return false;
            }
        }
        if let Some(node) = self.node_mut(id) {
            node.name = new_name;
        }
        true
    }

    /// Child node of `parent` addressed by an input segment.
    pub fn child(&self, parent: NodeId, segment: &str) -> Option<NodeId> {
        self.children(parent)
            .iter()
            .copied()
            .find(|&c| self.name(c).is_some_and(|name| mnemonic::matches(name, segment)))
    }

    /// Index of the leaf under `node` addressed by an input segment.
    pub fn command_index(&self, node: NodeId, segment: &str) -> Option<usize> {
        self.commands(node)
            .iter()
            .position(|cmd| mnemonic::matches(cmd.name(), segment))
    }

    pub(crate) fn command_mut(&mut self, node: NodeId, index: usize) -> Option<&mut Command> {
        self.node_mut(node).and_then(|n| n.commands.get_mut(index))
    }

    /// Resolve a node path such as `SENS:FREQ` from the root.
    pub fn find(&self, path: &str) -> Option<NodeId> {
        path.trim_start_matches(':')
            .split(':')
            .filter(|s| !s.is_empty())
            .try_fold(NodeId::ROOT, |node, segment| self.child(node, segment))
    }

    /// Resolve a node path, creating missing nodes with the names as written.
    ///
    /// Fails if a segment collides with an existing leaf.
    pub fn ensure_path(&mut self, path: &str) -> Result<NodeId> {
        let mut node = NodeId::ROOT;
        for segment in path.trim_start_matches(':').split(':').filter(|s| !s.is_empty()) {
            node = match self.child(node, segment) {
                Some(existing) => existing,
                None => self.add_node(node, segment)?,
            };
        }
        Ok(node)
    }

    /// Check whether a node or any descendant has an operation pending.
    pub fn is_operation_pending(&self, id: NodeId) -> bool {
        let Some(node) = self.node(id) else {
            return false;
        };
        node.pending || node.children.iter().any(|&c| self.is_operation_pending(c))
    }

    /// Set the node-local pending flag.
    ///
    /// Returns `Some(true)` when the flag changed, `Some(false)` when it
    /// already had that value and `None` for unknown nodes. Completion
    /// handling is up to the caller (see `Dispatcher::set_operation_pending`).
    pub(crate) fn set_operation_pending(&mut self, id: NodeId, pending: bool) -> Option<bool> {
        let node = self.node_mut(id)?;
        let changed = node.pending != pending;
        node.pending = pending;
        Some(changed)
    }

    /// Every statement form reachable in the tree, depth-first.
    ///
    /// Queryable leaves are listed as `PATH?`, executable ones as `PATH`.
    pub fn command_list(&self) -> Vec<String> {
        let mut list = Vec::new();
        self.collect_commands(NodeId::ROOT, String::new(), &mut list);
        list
    }

    fn collect_commands(&self, id: NodeId, prefix: String, list: &mut Vec<String>) {
        let Some(node) = self.node(id) else { return };
        for cmd in &node.commands {
            if cmd.queryable() {
                list.push(format!("{prefix}{}?", cmd.name()));
            }
            if cmd.executable() {
                list.push(format!("{prefix}{}", cmd.name()));
            }
        }
        for &child in &node.children {
            if let Some(name) = self.name(child) {
                self.collect_commands(child, format!("{prefix}{name}:"), list);
            }
        }
    }

    /// Bind a double to a get/set leaf.
    pub fn add_double_parameter(
        &mut self,
        parent: NodeId,
        name: impl Into<String>,
        value: ParamCell<f64>,
        gettable: bool,
        settable: bool,
        on_set: Option<OnSet>,
    ) -> Result<()> {
        self.add_parameter(parent, name.into(), value, gettable, settable, on_set, arg_to_double, |v| {
            Response::Text(v.to_string())
        })
    }

    /// Bind an unsigned integer to a get/set leaf.
    pub fn add_unsigned_int_parameter(
        &mut self,
        parent: NodeId,
        name: impl Into<String>,
        value: ParamCell<u32>,
        gettable: bool,
        settable: bool,
        on_set: Option<OnSet>,
    ) -> Result<()> {
        self.add_parameter(parent, name.into(), value, gettable, settable, on_set, arg_to_u32, |v| {
            Response::Text(v.to_string())
        })
    }

    /// Bind a boolean to a get/set leaf.
    pub fn add_bool_parameter(
        &mut self,
        parent: NodeId,
        name: impl Into<String>,
        value: ParamCell<bool>,
        gettable: bool,
        settable: bool,
        on_set: Option<OnSet>,
    ) -> Result<()> {
        self.add_parameter(parent, name.into(), value, gettable, settable, on_set, arg_to_bool, |v: bool| {
            Response::from(v)
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn add_parameter<T>(
        &mut self,
        parent: NodeId,
        name: String,
        value: ParamCell<T>,
        gettable: bool,
        settable: bool,
        mut on_set: Option<OnSet>,
        parse: fn(&[String], usize) -> Result<T>,
        render: fn(T) -> Response,
    ) -> Result<()>
    where
        T: Copy + Send + 'static,
    {
        let mut command = Command::new(name);
        if settable {
            let target = value.clone();
            command = command.on_execute(move |call| {
                // Parse before touching the cell so a bad token leaves it as-is
                let parsed = parse(call.args(), 0)?;
                target.set(parsed);
                if let Some(hook) = on_set.as_mut() {
                    hook();
                }
                Ok(Response::Empty)
            });
        }
        if gettable {
            command = command.on_query(move |_| Ok(render(value.get())));
        }
        self.add_command(parent, command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_find() {
        let mut tree = Tree::new();
        let sense = tree.add_node(NodeId::ROOT, "SENSe").unwrap();
        let freq = tree.add_node(sense, "FREQuency").unwrap();

        assert_eq!(tree.find("SENS:FREQ"), Some(freq));
        assert_eq!(tree.find(":sense:frequency"), Some(freq));
        assert_eq!(tree.find("SENS:FREQU"), None);
        assert_eq!(tree.path_of(freq), "SENSe:FREQuency");
        assert_eq!(tree.parent(freq), Some(sense));
    }

    #[test]
    fn test_collision_rejected_without_change() {
        let mut tree = Tree::new();
        let sense = tree.add_node(NodeId::ROOT, "SENSe").unwrap();
        tree.add_command(sense, Command::new("STARt")).unwrap();

        assert!(matches!(
            tree.add_node(NodeId::ROOT, "SENS"),
            Err(ScpiError::NameCollision { .. })
        ));
        assert!(matches!(
            tree.add_node(sense, "start"),
            Err(ScpiError::NameCollision { .. })
        ));
        assert!(matches!(
            tree.add_command(sense, Command::new("STAR")),
            Err(ScpiError::NameCollision { .. })
        ));

        assert_eq!(tree.children(NodeId::ROOT).len(), 1);
        assert!(tree.children(sense).is_empty());
        assert_eq!(tree.commands(sense).len(), 1);
    }

    #[test]
    fn test_invalid_names() {
        let mut tree = Tree::new();
        assert!(matches!(
            tree.add_node(NodeId::ROOT, "A:B"),
            Err(ScpiError::InvalidName { .. })
        ));
        assert!(matches!(
            tree.add_command(NodeId::ROOT, Command::new("")),
            Err(ScpiError::InvalidName { .. })
        ));
    }

    #[test]
    fn test_remove_subtree() {
        let mut tree = Tree::new();
        let a = tree.add_node(NodeId::ROOT, "A").unwrap();
        let b = tree.add_node(a, "B").unwrap();
        let other = tree.add_node(NodeId::ROOT, "C").unwrap();

        assert!(!tree.remove(other, a));
        assert!(tree.remove(NodeId::ROOT, a));
        assert!(!tree.contains(a));
        assert!(!tree.contains(b));
        assert!(!tree.remove(NodeId::ROOT, a));

        // The name is free again
        assert!(tree.add_node(NodeId::ROOT, "A").is_ok());
    }

    #[test]
    fn test_change_name() {
        let mut tree = Tree::new();
        let a = tree.add_node(NodeId::ROOT, "CALCulate").unwrap();
        let child = tree.add_node(a, "MARKer").unwrap();
        tree.add_node(NodeId::ROOT, "TRACe").unwrap();

        assert!(!tree.change_name(a, "TRAC"));
        assert_eq!(tree.name(a), Some("CALCulate"));

        // Renaming to a form of its own name is not a collision
        assert!(tree.change_name(a, "CALC"));
        assert!(tree.change_name(a, "MATH"));
        assert_eq!(tree.find("MATH:MARK"), Some(child));
    }

    #[test]
    fn test_ensure_path() {
        let mut tree = Tree::new();
        let a = tree.ensure_path("SOURce:POWer").unwrap();
        let b = tree.ensure_path(":SOUR:POW").unwrap();
        assert_eq!(a, b);

        tree.add_command(NodeId::ROOT, Command::new("TRIGger")).unwrap();
        assert!(tree.ensure_path("TRIG:SOURce").is_err());
    }

    #[test]
    fn test_pending_propagates_to_ancestors() {
        let mut tree = Tree::new();
        let a = tree.add_node(NodeId::ROOT, "A").unwrap();
        let b = tree.add_node(a, "B").unwrap();
        let c = tree.add_node(NodeId::ROOT, "C").unwrap();

        assert_eq!(tree.set_operation_pending(b, true), Some(true));
        assert!(tree.is_operation_pending(NodeId::ROOT));
        assert!(tree.is_operation_pending(a));
        assert!(!tree.is_operation_pending(c));

        // Clearing an ancestor does not hide a pending descendant
        assert_eq!(tree.set_operation_pending(a, false), Some(false));
        assert!(tree.is_operation_pending(a));

        assert_eq!(tree.set_operation_pending(b, false), Some(true));
        assert!(!tree.is_operation_pending(NodeId::ROOT));
    }

    #[test]
    fn test_command_list() {
        let mut tree = Tree::new();
        let sys = tree.add_node(NodeId::ROOT, "SYSTem").unwrap();
        tree.add_command(
            sys,
            Command::new("ERRor").on_query(|_| Ok(Response::Empty)),
        )
        .unwrap();
        tree.add_command(
            NodeId::ROOT,
            Command::new("*RST").on_execute(|_| Ok(Response::Empty)),
        )
        .unwrap();

        assert_eq!(tree.command_list(), vec!["*RST", "SYSTem:ERRor?"]);
    }

    #[test]
    fn test_bound_parameter_leaves() {
        let mut tree = Tree::new();
        let cell = ParamCell::new(0.0);
        tree.add_double_parameter(NodeId::ROOT, "LEVel", cell, true, false, None)
            .unwrap();

        let leaf = &tree.commands(NodeId::ROOT)[0];
        assert!(leaf.queryable());
        assert!(!leaf.executable());
    }
}
