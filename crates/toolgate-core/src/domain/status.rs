//! Runtime connection state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ServerId, ToolDescriptor};

/// Runtime status of one backend connection.
///
/// `Error` is never terminal: the next connect request starts over.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    /// No connection exists
    #[default]
    Stopped,
    /// A connect pass is in flight
    Starting,
    /// Connected and handshaken
    Running,
    /// Closing the transport
    Stopping,
    /// Connect retries were exhausted or the transport faulted during use
    Error(String),
}

impl ConnectionStatus {
    /// Whether a live transport is available.
    pub const fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }

    /// Short label without the error payload.
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Stopped => "stopped",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Error(_) => "error",
        }
    }
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error(message) => write!(f, "error: {message}"),
            other => f.write_str(other.label()),
        }
    }
}

/// Snapshot of one server's runtime state for status listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerRuntimeInfo {
    pub server_id: ServerId,
    pub status: ConnectionStatus,

    /// Tools reported by the live connection (empty unless running).
    #[serde(default)]
    pub tools: Vec<ToolDescriptor>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_connected_at: Option<DateTime<Utc>>,

    /// Transport connect attempts made by the most recent connect pass.
    pub connect_attempts: u32,
}

impl ServerRuntimeInfo {
    /// Snapshot for a server that has never been touched.
    pub fn stopped(server_id: impl Into<ServerId>) -> Self {
        Self {
            server_id: server_id.into(),
            status: ConnectionStatus::Stopped,
            tools: Vec::new(),
            last_error: None,
            last_connected_at: None,
            connect_attempts: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_display() {
        assert_eq!(ConnectionStatus::Running.to_string(), "running");
        assert_eq!(
            ConnectionStatus::Error("spawn failed".into()).to_string(),
            "error: spawn failed"
        );
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&ConnectionStatus::Stopped).unwrap();
        assert_eq!(json, "\"stopped\"");
        let json = serde_json::to_string(&ConnectionStatus::Error("boom".into())).unwrap();
        assert_eq!(json, r#"{"error":"boom"}"#);
    }
}
