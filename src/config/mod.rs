//! Configuration loading and management.
//!
//! This module is split into logical submodules:
//! - [`types`]: Config struct definitions (Config, ServerConfig, IdentityConfig,
//!   ParameterBlock, OperationBlock)
//! - [`validation`]: startup checks that report every problem at once
//! - `defaults`: serde default functions

mod defaults;
mod types;
mod validation;

pub use types::{Config, ParameterKind, ParameterValue, split_leaf_path};
pub use validation::validate;
