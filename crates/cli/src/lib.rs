//! Command line front end of the placement engine.
//!
//! Provides commands for:
//! - Resolving the nodes of a container
//! - Ordering those nodes for an object
//! - Checking a policy without a netmap

pub mod commands;
pub mod config;

pub use commands::{Command, CommandResult};
pub use config::CliConfig;
