//! Owners: the entities that configure servers.

use serde::{Deserialize, Serialize};

use super::ServerId;

/// An entity (e.g. an agent definition) that configures a set of servers.
///
/// The order of `mcp_servers` is the tool resolution order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Owner {
    pub id: String,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub mcp_servers: Vec<ServerId>,
}

impl Owner {
    /// Create an owner with servers in resolution order.
    pub fn new(id: impl Into<String>, mcp_servers: Vec<ServerId>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            mcp_servers,
        }
    }

    /// Whether the owner configures the given server.
    pub fn has_server(&self, server_id: &str) -> bool {
        self.mcp_servers.iter().any(|s| s == server_id)
    }
}
