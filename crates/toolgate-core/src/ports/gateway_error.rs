//! Gateway error types.
//!
//! Callers get a typed error that separates "can't reach the backend" from
//! "not allowed" from "doesn't exist", so the outer layer can render or
//! retry appropriately.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{StoreError, TransportError};
use crate::domain::ServerId;

/// Errors surfaced by gateway operations.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// The server config cannot produce a connection. Never retried.
    #[error("Invalid configuration for server {server_id}: {message}")]
    Config { server_id: ServerId, message: String },

    /// Connecting failed after all retry attempts.
    #[error("Failed to connect to server {server_id}: {message}")]
    Connect { server_id: ServerId, message: String },

    /// No server, tool or owner with the given name.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The tool resolved but is disabled for this owner.
    #[error("Tool '{tool_name}' is disabled on server {server_id}")]
    PermissionDenied {
        server_id: ServerId,
        tool_name: String,
    },

    /// The token does not grant the target server/scope.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The backend rejected the call itself. Passed through verbatim.
    #[error("Server {server_id} returned an error: {message}")]
    Backend { server_id: ServerId, message: String },

    #[error(transparent)]
    Store(#[from] StoreError),

    /// Internal gateway error.
    #[error("Internal gateway error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Map a transport failure observed while using a connection.
    ///
    /// Connection faults become `Connect`; JSON-RPC errors become `Backend`.
    pub fn from_transport(server_id: &str, error: TransportError) -> Self {
        let server_id = server_id.to_string();
        match error {
            TransportError::Config(message) => Self::Config { server_id, message },
            TransportError::Rpc { code, message } => Self::Backend {
                server_id,
                message: format!("{message} (code {code})"),
            },
            TransportError::Protocol(message) => Self::Backend { server_id, message },
            other => Self::Connect {
                server_id,
                message: other.to_string(),
            },
        }
    }

    /// The error category for this error.
    pub fn category(&self) -> ErrorCategory {
        ErrorCategory::from(self)
    }
}

/// Categories of gateway errors for outer-layer handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Configuration,
    /// The backend could not be reached. Retrying later may help.
    Connectivity,
    NotFound,
    Permission,
    Authorization,
    Backend,
    Storage,
    Internal,
}

impl From<&GatewayError> for ErrorCategory {
    fn from(error: &GatewayError) -> Self {
        match error {
            GatewayError::Config { .. } => Self::Configuration,
            GatewayError::Connect { .. } => Self::Connectivity,
            GatewayError::NotFound(_) | GatewayError::Store(StoreError::NotFound(_)) => {
                Self::NotFound
            }
            GatewayError::PermissionDenied { .. } => Self::Permission,
            GatewayError::Unauthorized(_) => Self::Authorization,
            GatewayError::Backend { .. } => Self::Backend,
            GatewayError::Store(_) => Self::Storage,
            GatewayError::Internal(_) => Self::Internal,
        }
    }
}

/// User-safe error information for events.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayErrorInfo {
    /// ID of the server (if known).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_id: Option<ServerId>,

    /// User-friendly error message.
    pub message: String,

    /// Error category for outer-layer handling.
    pub category: ErrorCategory,
}

impl GatewayErrorInfo {
    /// Create error info from a gateway error.
    pub fn from_error(server_id: Option<&str>, error: &GatewayError) -> Self {
        Self {
            server_id: server_id.map(ToString::to_string),
            message: error.to_string(),
            category: error.category(),
        }
    }
}
