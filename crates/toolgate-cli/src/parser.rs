//! Main CLI parser and top-level argument handling.
//!
//! This module defines the root CLI structure with global options.

use std::path::PathBuf;

use clap::Parser;

use crate::commands::Commands;

/// Command-line interface for the toolgate gateway.
#[derive(Parser)]
#[command(name = "toolgate")]
#[command(about = "Operate an MCP tool gateway: servers, tools, permissions and tokens")]
#[command(version)]
pub struct Cli {
    /// Path to the gateway document (defaults to the platform data directory)
    #[arg(long = "config", env = "TOOLGATE_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose/debug output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}
