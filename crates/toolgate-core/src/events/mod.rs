//! Canonical event union for gateway events.
//!
//! # Wire Format
//!
//! Events are serialized with a `type` tag:
//!
//! ```json
//! { "type": "server_started", "serverId": "fs", "serverName": "Filesystem", "toolCount": 3 }
//! ```

use serde::{Deserialize, Serialize};

use crate::domain::{Scope, ServerConfig, ServerId};
use crate::ports::GatewayErrorInfo;

/// Summary of a server for event payloads.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerSummary {
    pub id: ServerId,
    pub name: String,
    /// Transport label (`local`, `remote-sse`, `remote-streamable`).
    pub transport: String,
}

impl From<&ServerConfig> for ServerSummary {
    fn from(config: &ServerConfig) -> Self {
        Self {
            id: config.id.clone(),
            name: config.name.clone(),
            transport: config.transport.label().to_string(),
        }
    }
}

/// Gateway events.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppEvent {
    // ========== Server Events ==========
    /// A server connected and completed the handshake.
    ServerStarted {
        #[serde(rename = "serverId")]
        server_id: ServerId,
        #[serde(rename = "serverName")]
        server_name: String,
        #[serde(rename = "toolCount")]
        tool_count: usize,
    },

    /// A server connection was closed on request.
    ServerStopped {
        #[serde(rename = "serverId")]
        server_id: ServerId,
        #[serde(rename = "serverName")]
        server_name: String,
    },

    /// A server failed to connect or faulted during use.
    ServerError {
        /// User-safe error information.
        error: GatewayErrorInfo,
    },

    /// A server was added to the configuration.
    ServerAdded { server: ServerSummary },

    /// A server was removed from the configuration.
    ServerRemoved {
        #[serde(rename = "serverId")]
        server_id: ServerId,
    },

    // ========== Permission Events ==========
    /// An owner's permission overlay was rebuilt.
    PermissionsSynchronized {
        #[serde(rename = "ownerId")]
        owner_id: String,
        /// Servers that failed to connect and kept their previous entries.
        #[serde(rename = "skippedServers")]
        skipped_servers: Vec<ServerId>,
    },

    /// An operator toggled a tool.
    ToolPermissionChanged {
        #[serde(rename = "ownerId")]
        owner_id: String,
        #[serde(rename = "serverId")]
        server_id: ServerId,
        #[serde(rename = "toolName")]
        tool_name: String,
        enabled: bool,
    },

    // ========== Token Events ==========
    /// A token's server grants or scopes changed.
    TokenGrantsChanged {
        #[serde(rename = "tokenId")]
        token_id: String,
        #[serde(rename = "serverIds")]
        server_ids: Vec<ServerId>,
        scopes: Vec<Scope>,
    },
}

impl AppEvent {
    /// Create a server started event.
    pub fn server_started(
        server_id: impl Into<ServerId>,
        server_name: impl Into<String>,
        tool_count: usize,
    ) -> Self {
        Self::ServerStarted {
            server_id: server_id.into(),
            server_name: server_name.into(),
            tool_count,
        }
    }

    /// Create a server stopped event.
    pub fn server_stopped(server_id: impl Into<ServerId>, server_name: impl Into<String>) -> Self {
        Self::ServerStopped {
            server_id: server_id.into(),
            server_name: server_name.into(),
        }
    }

    /// Create a server error event.
    pub const fn server_error(error: GatewayErrorInfo) -> Self {
        Self::ServerError { error }
    }

    /// Create a server added event.
    pub const fn server_added(server: ServerSummary) -> Self {
        Self::ServerAdded { server }
    }

    /// Create a server removed event.
    pub fn server_removed(server_id: impl Into<ServerId>) -> Self {
        Self::ServerRemoved {
            server_id: server_id.into(),
        }
    }

    /// Create a permissions synchronized event.
    pub fn permissions_synchronized(
        owner_id: impl Into<String>,
        skipped_servers: Vec<ServerId>,
    ) -> Self {
        Self::PermissionsSynchronized {
            owner_id: owner_id.into(),
            skipped_servers,
        }
    }

    /// Create a tool permission changed event.
    pub fn tool_permission_changed(
        owner_id: impl Into<String>,
        server_id: impl Into<ServerId>,
        tool_name: impl Into<String>,
        enabled: bool,
    ) -> Self {
        Self::ToolPermissionChanged {
            owner_id: owner_id.into(),
            server_id: server_id.into(),
            tool_name: tool_name.into(),
            enabled,
        }
    }

    /// Create a token grants changed event.
    pub fn token_grants_changed(
        token_id: impl Into<String>,
        server_ids: Vec<ServerId>,
        scopes: Vec<Scope>,
    ) -> Self {
        Self::TokenGrantsChanged {
            token_id: token_id.into(),
            server_ids,
            scopes,
        }
    }

    /// Get the event name for routing.
    pub const fn event_name(&self) -> &'static str {
        match self {
            Self::ServerStarted { .. } => "server:started",
            Self::ServerStopped { .. } => "server:stopped",
            Self::ServerError { .. } => "server:error",
            Self::ServerAdded { .. } => "server:added",
            Self::ServerRemoved { .. } => "server:removed",
            Self::PermissionsSynchronized { .. } => "permissions:synchronized",
            Self::ToolPermissionChanged { .. } => "permissions:tool_changed",
            Self::TokenGrantsChanged { .. } => "token:grants_changed",
        }
    }
}
