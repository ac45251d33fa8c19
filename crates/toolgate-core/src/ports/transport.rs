//! Transport traits and error types.
//!
//! A `TransportConnector` turns a `ServerConfig` into a live, handshaken
//! `ToolTransport`. The connection manager owns the returned handle.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{ServerConfig, ToolDescriptor, ToolResult};

/// Arguments passed to `tools/call`.
pub type ToolArguments = HashMap<String, serde_json::Value>;

/// Errors that can occur while talking to a backend.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// The config cannot produce a connection (missing command/url, etc.).
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Failed to spawn server process: {0}")]
    Spawn(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The transport was closed while the request was in flight.
    #[error("Connection closed")]
    Closed,

    #[error("Timeout waiting for server response")]
    Timeout,

    /// The backend answered with a JSON-RPC error.
    #[error("Server returned error: code={code}, message={message}")]
    Rpc { code: i64, message: String },
}

impl TransportError {
    /// Whether a connect attempt that failed with this error may be retried.
    pub const fn is_retryable(&self) -> bool {
        !matches!(self, Self::Config(_))
    }

    /// Whether this error means the connection itself is no longer usable.
    pub const fn is_connection_fault(&self) -> bool {
        matches!(
            self,
            Self::Spawn(_) | Self::Io(_) | Self::Http(_) | Self::Closed | Self::Timeout
        )
    }
}

impl From<std::io::Error> for TransportError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

impl From<serde_json::Error> for TransportError {
    fn from(e: serde_json::Error) -> Self {
        Self::Protocol(e.to_string())
    }
}

/// A live connection to one backend.
///
/// Implementations must be safe to call concurrently. After `close`, every
/// in-flight and future call fails with `TransportError::Closed`.
#[async_trait]
pub trait ToolTransport: Send + Sync {
    /// List the tools the backend currently reports.
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, TransportError>;

    /// Invoke a tool.
    async fn call_tool(
        &self,
        name: &str,
        arguments: ToolArguments,
    ) -> Result<ToolResult, TransportError>;

    /// Close the connection. Idempotent.
    async fn close(&self);
}

/// Opens transports for server configurations.
#[async_trait]
pub trait TransportConnector: Send + Sync {
    /// Open and handshake one connection. Exactly one attempt, no retry.
    async fn connect(
        &self,
        config: &ServerConfig,
    ) -> Result<Arc<dyn ToolTransport>, TransportError>;
}
