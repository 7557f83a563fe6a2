//! # scpi-proto
//!
//! A SCPI command interpreter core: a hierarchical namespace of nodes and
//! command leaves addressed by colon-delimited paths, query/command
//! duality, operation-complete tracking and the IEEE-488.2 event status
//! register.
//!
//! ## Features
//!
//! - Mnemonic path matching (`SENS:FREQ?` and `:sense:frequency?` resolve
//!   to the same leaf)
//! - Bound double, unsigned and boolean parameters with generated get/set leaves
//! - `*OPC`, `*OPC?`, `*WAI`, `*ESR?`, `*CLS`, `*LST?` and `SYSTem:ERRor?`
//! - A thread-safe input queue and pluggable output sinks
//! - Optional Tokio line codec
//!
//! ## Quick Start
//!
//! ```rust
//! use scpi_proto::{Capture, Dispatcher, NodeId, ParamCell};
//!
//! let out = Capture::new();
//! let mut scpi = Dispatcher::new(out.clone());
//!
//! let level = ParamCell::new(-10.0);
//! let source = scpi.tree_mut().ensure_path("SOURce:POWer").unwrap();
//! scpi.tree_mut()
//!     .add_double_parameter(source, "LEVel", level.clone(), true, true, None)
//!     .unwrap();
//!
//! scpi.input(":SOUR:POW:LEV -3.5;LEV?");
//! scpi.process();
//!
//! assert_eq!(level.get(), -3.5);
//! assert_eq!(out.take(), vec!["-3.5"]);
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod command;
mod common;
pub mod dispatcher;
pub mod error;
#[cfg(feature = "tokio")]
pub mod line;
pub mod mnemonic;
pub mod node;
pub mod params;
pub mod sink;
pub mod statement;
pub mod status;

pub use self::command::{Call, Command, CommandResult, Handler, Kind, Response};
pub use self::dispatcher::{DeviceState, Dispatcher, StatementObserver, ERROR_RESPONSE};
pub use self::error::{ProtocolError, Result, ScpiError};
#[cfg(feature = "tokio")]
pub use self::line::{LineCodec, DEFAULT_MAX_LINE_LEN};
pub use self::node::{NodeId, OnSet, Tree};
pub use self::params::{
    arg_to_bool, arg_to_double, arg_to_i64, arg_to_u32, arg_to_u64, ParamCell,
};
pub use self::sink::{Capture, Discard, FnSink, InputQueue, OutputSink};
pub use self::statement::{split_line, Anchor, Statement};
pub use self::status::{ErrorEntry, ErrorQueue, EventStatus, StatusRegister};
