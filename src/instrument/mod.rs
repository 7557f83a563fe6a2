//! The simulated instrument: a command tree built from configuration and
//! the actor task that owns it.
//!
//! Besides the common commands every dispatcher carries, the instrument
//! registers `*IDN?`, `*RST`, one get/set leaf per `[[parameter]]` block and
//! one executable leaf per `[[operation]]` block.

mod actor;

pub use actor::{DispatcherActor, Event};

use crate::config::{Config, ParameterKind, ParameterValue, split_leaf_path};
use scpi_proto::{Command, Dispatcher, Discard, NodeId, ParamCell, Response, ScpiError};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::debug;

/// Errors raised while building the command tree.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("cannot register '{path}': {source}")]
    Registration {
        path: String,
        #[source]
        source: ScpiError,
    },
    #[error("parameter '{path}': default is not a valid {kind}")]
    InvalidDefault { path: String, kind: &'static str },
}

impl BuildError {
    fn registration(path: &str) -> impl FnOnce(ScpiError) -> Self + '_ {
        move |source| Self::Registration {
            path: path.to_string(),
            source,
        }
    }
}

/// Storage of a configured parameter together with its reset value.
#[derive(Clone)]
enum Binding {
    Double(ParamCell<f64>, f64),
    Uint(ParamCell<u32>, u32),
    Bool(ParamCell<bool>, bool),
}

impl Binding {
    fn reset(&self) {
        match self {
            Self::Double(cell, value) => cell.set(*value),
            Self::Uint(cell, value) => cell.set(*value),
            Self::Bool(cell, value) => cell.set(*value),
        }
    }
}

/// Build the instrument's dispatcher.
///
/// Operation leaves report their start to `events`; the actor owning the
/// dispatcher completes them once their duration has elapsed. Output goes
/// nowhere until a session attaches.
pub fn build(config: &Config, events: mpsc::UnboundedSender<Event>) -> Result<Dispatcher, BuildError> {
    let mut scpi = Dispatcher::with_error_queue_depth(Discard, config.server.error_queue_depth);
    let tree = scpi.tree_mut();

    let idn = config.identity.idn();
    tree.add_command(
        NodeId::ROOT,
        Command::new("*IDN").on_query(move |_| Ok(Response::Text(idn.clone()))),
    )
    .map_err(BuildError::registration("*IDN"))?;

    let mut bindings = Vec::with_capacity(config.parameters.len());
    for param in &config.parameters {
        let invalid = || BuildError::InvalidDefault {
            path: param.path.clone(),
            kind: param.kind.as_str(),
        };
        let initial = param.initial_value().ok_or_else(invalid)?;

        let (parent_path, name) = split_leaf_path(&param.path);
        let parent = tree
            .ensure_path(parent_path)
            .map_err(BuildError::registration(&param.path))?;

        let binding = match (param.kind, initial) {
            (ParameterKind::Double, ParameterValue::Double(v)) => {
                let cell = ParamCell::new(v);
                tree.add_double_parameter(parent, name, cell.clone(), param.gettable, param.settable, None)
                    .map(|_| Binding::Double(cell, v))
            }
            (ParameterKind::Uint, ParameterValue::Uint(v)) => {
                let cell = ParamCell::new(v);
                tree.add_unsigned_int_parameter(parent, name, cell.clone(), param.gettable, param.settable, None)
                    .map(|_| Binding::Uint(cell, v))
            }
            (ParameterKind::Bool, ParameterValue::Bool(v)) => {
                let cell = ParamCell::new(v);
                tree.add_bool_parameter(parent, name, cell.clone(), param.gettable, param.settable, None)
                    .map(|_| Binding::Bool(cell, v))
            }
            _ => return Err(invalid()),
        }
        .map_err(BuildError::registration(&param.path))?;

        debug!(path = %param.path, kind = param.kind.as_str(), "Parameter registered");
        bindings.push(binding);
    }

    tree.add_command(
        NodeId::ROOT,
        Command::new("*RST").on_execute(move |_| {
            bindings.iter().for_each(Binding::reset);
            Ok(Response::Empty)
        }),
    )
    .map_err(BuildError::registration("*RST"))?;

    for op in &config.operations {
        let (parent_path, name) = split_leaf_path(&op.path);
        let parent = tree
            .ensure_path(parent_path)
            .map_err(BuildError::registration(&op.path))?;

        let duration = Duration::from_millis(op.duration_ms);
        let events = events.clone();
        tree.add_command(
            parent,
            Command::new(name).on_execute(move |call| {
                let node = call.node();
                events
                    .send(Event::OperationStarted { node, duration })
                    .map_err(|_| ScpiError::device("instrument is shutting down"))?;
                call.set_operation_pending(true);
                Ok(Response::Empty)
            }),
        )
        .map_err(BuildError::registration(&op.path))?;

        debug!(path = %op.path, duration_ms = op.duration_ms, "Operation registered");
    }

    Ok(scpi)
}
