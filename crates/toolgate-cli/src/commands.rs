//! Main commands enum and subcommand groups.

use std::path::PathBuf;

use clap::Subcommand;
use toolgate_core::Scope;

/// Available gateway commands.
///
/// Server and tool commands act on one owner's configuration; the owner's
/// server order is the tool resolution order.
#[derive(Subcommand)]
pub enum Commands {
    /// Manage configured servers
    Server {
        #[command(subcommand)]
        command: ServerCommand,
    },

    /// List the tools an owner can reach
    Tools {
        /// Owner whose servers are listed
        #[arg(long)]
        owner: String,
        /// Only show servers this token may use
        #[arg(long)]
        token: Option<String>,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Call a tool on behalf of a token
    Call {
        /// Owner whose servers resolve the tool
        #[arg(long)]
        owner: String,
        /// Tool name
        #[arg(long)]
        tool: String,
        /// Arguments as a JSON object
        #[arg(long)]
        args: Option<String>,
        /// Access token id
        #[arg(long, env = "TOOLGATE_TOKEN")]
        token: String,
    },

    /// Connect a server and show its tools
    Start {
        #[arg(long)]
        owner: String,
        #[arg(long)]
        server: String,
    },

    /// Disconnect a server
    Stop {
        #[arg(long)]
        owner: String,
        #[arg(long)]
        server: String,
    },

    /// Show a server's runtime state
    Status {
        #[arg(long)]
        owner: String,
        #[arg(long)]
        server: String,
    },

    /// Rebuild an owner's tool permissions from the live catalogs
    Sync {
        #[arg(long)]
        owner: String,
    },

    /// Enable a tool for an owner
    Enable {
        #[arg(long)]
        owner: String,
        #[arg(long)]
        server: String,
        #[arg(long)]
        tool: String,
    },

    /// Disable a tool for an owner
    Disable {
        #[arg(long)]
        owner: String,
        #[arg(long)]
        server: String,
        #[arg(long)]
        tool: String,
    },

    /// Show an owner's stored tool permissions
    Permissions {
        #[arg(long)]
        owner: String,
    },

    /// Manage access tokens
    Token {
        #[command(subcommand)]
        command: TokenCommand,
    },

    /// Connect auto-start servers and keep them up until Ctrl-C
    Run,
}

/// Server configuration commands.
#[derive(Subcommand)]
pub enum ServerCommand {
    /// List an owner's servers with their state
    List {
        #[arg(long)]
        owner: String,
    },
    /// Add a server from a JSON config file and grant it to existing tokens
    Add {
        /// Path to a server config (`id`, `name`, `transport`, ...)
        file: PathBuf,
        /// Append the server to this owner's list
        #[arg(long)]
        owner: Option<String>,
    },
    /// Remove a server and revoke it from every token
    Remove {
        /// Server id
        server: String,
    },
}

/// Access token commands.
#[derive(Subcommand)]
pub enum TokenCommand {
    /// Issue a new token
    Issue {
        /// Client the token is issued to
        #[arg(long)]
        client: String,
        /// Server the token may reach (repeatable)
        #[arg(long = "server")]
        servers: Vec<String>,
        /// Granted scope (repeatable): server_management, log_access, application
        #[arg(long = "scope")]
        scopes: Vec<Scope>,
    },
    /// List all tokens
    List,
    /// Show one token
    Show { token: String },
    /// Grant a server to a token
    Grant {
        token: String,
        #[arg(long)]
        server: String,
    },
    /// Revoke a server from a token
    Revoke {
        token: String,
        #[arg(long)]
        server: String,
    },
    /// Replace a token's scopes
    Scopes {
        token: String,
        #[arg(long = "scope")]
        scopes: Vec<Scope>,
    },
    /// Delete a token
    Delete { token: String },
}
