//! Operator CLI for toolgate.
//!
//! The binary is a thin composition root: [`bootstrap`] opens the JSON
//! gateway document, wires it into a [`toolgate_mcp::GatewayService`] and
//! hands the resulting [`CliContext`] to the command handlers.

#![deny(unsafe_code)]
#![deny(unused_crate_dependencies)]

// Used by the binary only
use dotenvy as _;
use tracing_subscriber as _;

pub mod bootstrap;
pub mod commands;
pub mod emitter;
pub mod error;
pub mod handlers;
pub mod parser;
pub mod presentation;
pub mod store;

// Re-export primary types for convenient access
pub use bootstrap::{CliConfig, CliContext, bootstrap, bootstrap_with};
pub use commands::{Commands, ServerCommand, TokenCommand};
pub use emitter::LogEmitter;
pub use error::{CliError, exit_code_for};
pub use parser::Cli;
pub use store::{GatewayDocument, JsonFileStore};
