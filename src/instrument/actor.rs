//! Dispatcher actor.
//!
//! A single task owns the [`Dispatcher`] and serializes everything that
//! touches it: input lines from the attached session, operation timers and
//! session attach/detach. Nothing else holds a reference to the tree, so
//! `process()` never runs concurrently with itself or with a structural
//! change.

use crate::config::Config;
use crate::instrument::{BuildError, build};
use crate::metrics;
use crate::telemetry::LineTimer;
use scpi_proto::{Discard, Dispatcher, EventStatus, NodeId, Response, ScpiError};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, instrument, warn};

/// Events that can be sent to the dispatcher actor.
#[derive(Debug)]
pub enum Event {
    /// A program line from the attached session.
    Input(String),
    /// An operation leaf under `node` started; complete it after `duration`.
    OperationStarted { node: NodeId, duration: Duration },
    /// A timer for an operation under `node` expired.
    OperationComplete(NodeId),
    /// Route output to a new session.
    Attach(mpsc::UnboundedSender<String>),
    /// The session went away; output is dropped until the next attach.
    Detach,
    /// Acknowledged once every earlier event has been handled.
    Flush(oneshot::Sender<()>),
}

/// Owner of the instrument's dispatcher.
pub struct DispatcherActor {
    dispatcher: Dispatcher,
    /// Operations still running, per node
    in_flight: HashMap<NodeId, usize>,
    events: mpsc::UnboundedSender<Event>,
}

impl DispatcherActor {
    /// Build the instrument from `config` and spawn its actor task.
    ///
    /// Returns the sender used by sessions to talk to the actor. The
    /// power-on flag is latched before the first event is handled.
    pub fn spawn(config: &Config) -> Result<mpsc::UnboundedSender<Event>, BuildError> {
        let (tx, rx) = mpsc::unbounded_channel();

        let mut dispatcher = build(config, tx.clone())?;
        dispatcher.state_mut().status_mut().set(EventStatus::PON);
        dispatcher.set_observer(Box::new(
            |header: &str, outcome: Result<&Response, &ScpiError>| match outcome {
                Ok(_) => metrics::record_statement(header),
                Err(e) => metrics::record_statement_error(e.error_code()),
            },
        ));
        info!(
            commands = dispatcher.tree().command_list().len(),
            "Instrument ready"
        );

        let actor = Self {
            dispatcher,
            in_flight: HashMap::new(),
            events: tx.clone(),
        };

        tokio::spawn(async move {
            actor.run(rx).await;
        });

        Ok(tx)
    }

    /// Run the actor's event loop.
    #[instrument(skip_all, name = "dispatcher")]
    pub async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Event>) {
        while let Some(event) = rx.recv().await {
            self.handle_event(event);
        }
        debug!("Event channel closed, dispatcher stopped");
    }

    fn handle_event(&mut self, event: Event) {
        match event {
            Event::Input(line) => {
                let _timer = LineTimer::new();
                self.dispatcher.input(line);
                self.dispatcher.process();
            }
            Event::OperationStarted { node, duration } => {
                *self.in_flight.entry(node).or_default() += 1;
                metrics::set_pending_operations(self.pending_total());

                let events = self.events.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(duration).await;
                    let _ = events.send(Event::OperationComplete(node));
                });
            }
            Event::OperationComplete(node) => self.complete(node),
            Event::Attach(sink) => {
                if self.dispatcher.is_waiting() {
                    debug!(backlog = self.dispatcher.backlog(), "Session attached while *WAI holds the queue");
                }
                self.dispatcher.set_sink(sink);
            }
            Event::Detach => self.dispatcher.set_sink(Discard),
            Event::Flush(ack) => {
                let _ = ack.send(());
            }
        }
    }

    fn complete(&mut self, node: NodeId) {
        let Some(count) = self.in_flight.get_mut(&node) else {
            warn!(?node, "Completion for an operation that is not running");
            return;
        };
        *count -= 1;
        if *count == 0 {
            self.in_flight.remove(&node);
            debug!(node = %self.dispatcher.tree().path_of(node), "Operation complete");
            self.dispatcher.set_operation_pending(node, false);
        }
        metrics::set_pending_operations(self.pending_total());
    }

    fn pending_total(&self) -> usize {
        self.in_flight.values().sum()
    }
}
