//! Per-owner tool catalog and first-match tool resolution.

use std::sync::Arc;

use serde::Serialize;
use toolgate_core::{
    GatewayError, GatewayStore, ServerConfig, ServerId, ToolArguments, ToolDescriptor, ToolResult,
};

use crate::manager::ConnectionManager;
use crate::permissions::PermissionOverlay;

/// Live tools of one server, in the owner's configuration order.
#[derive(Debug, Clone, Serialize)]
pub struct ServerCatalog {
    pub server_id: ServerId,
    pub server_name: String,
    pub tools: Vec<ToolDescriptor>,
}

/// Merges the catalogs of an owner's servers and routes tool calls.
///
/// When two servers expose the same tool name the one listed first in the
/// owner's configuration wins, every time.
pub struct ToolCatalogAggregator {
    store: Arc<dyn GatewayStore>,
    manager: Arc<ConnectionManager>,
    overlay: Arc<PermissionOverlay>,
}

impl ToolCatalogAggregator {
    pub fn new(
        store: Arc<dyn GatewayStore>,
        manager: Arc<ConnectionManager>,
        overlay: Arc<PermissionOverlay>,
    ) -> Self {
        Self {
            store,
            manager,
            overlay,
        }
    }

    /// Live catalog of every reachable server configured for the owner.
    ///
    /// Servers that fail to connect are skipped.
    pub async fn list_tools(&self, owner_id: &str) -> Result<Vec<ServerCatalog>, GatewayError> {
        self.collect(owner_id, |_| true).await
    }

    /// Like [`list_tools`](Self::list_tools), restricted to `allowed` servers.
    ///
    /// Servers outside `allowed` are never connected.
    pub async fn list_tools_in(
        &self,
        owner_id: &str,
        allowed: &[ServerId],
    ) -> Result<Vec<ServerCatalog>, GatewayError> {
        self.collect(owner_id, |id| allowed.iter().any(|a| a == id))
            .await
    }

    async fn collect(
        &self,
        owner_id: &str,
        include: impl Fn(&str) -> bool + Send + Sync,
    ) -> Result<Vec<ServerCatalog>, GatewayError> {
        let configs = self.store.server_configs(owner_id).await?;
        let mut catalogs = Vec::with_capacity(configs.len());

        for config in configs.into_iter().filter(|c| include(&c.id)) {
            match self.manager.list_tools(&config).await {
                Ok(tools) => catalogs.push(ServerCatalog {
                    server_id: config.id,
                    server_name: config.name,
                    tools,
                }),
                Err(e) => tracing::warn!(
                    owner_id = %owner_id,
                    server_id = %config.id,
                    error = %e,
                    "Skipping unreachable server"
                ),
            }
        }

        Ok(catalogs)
    }

    /// Config of the first server, in configuration order, exposing `tool_name`.
    pub async fn resolve(
        &self,
        owner_id: &str,
        tool_name: &str,
    ) -> Result<ServerConfig, GatewayError> {
        self.resolve_where(owner_id, tool_name, |_| true).await
    }

    /// Like [`resolve`](Self::resolve), restricted to `allowed` servers.
    ///
    /// Servers outside `allowed` are never connected, even when they come
    /// first in the owner's configuration.
    pub async fn resolve_in(
        &self,
        owner_id: &str,
        tool_name: &str,
        allowed: &[ServerId],
    ) -> Result<ServerConfig, GatewayError> {
        self.resolve_where(owner_id, tool_name, |id| allowed.iter().any(|a| a == id))
            .await
    }

    async fn resolve_where(
        &self,
        owner_id: &str,
        tool_name: &str,
        include: impl Fn(&str) -> bool + Send + Sync,
    ) -> Result<ServerConfig, GatewayError> {
        let configs = self.store.server_configs(owner_id).await?;
        for config in configs.into_iter().filter(|c| include(&c.id)) {
            match self.manager.list_tools(&config).await {
                Ok(tools) if tools.iter().any(|t| t.name == tool_name) => return Ok(config),
                Ok(_) => {}
                Err(e) => tracing::debug!(
                    owner_id = %owner_id,
                    server_id = %config.id,
                    error = %e,
                    "Server unavailable during tool resolution"
                ),
            }
        }

        Err(GatewayError::NotFound(format!("tool '{tool_name}'")))
    }

    /// Id of the server that handles `tool_name` for the owner.
    pub async fn find_server_for_tool(
        &self,
        owner_id: &str,
        tool_name: &str,
    ) -> Result<ServerId, GatewayError> {
        self.resolve(owner_id, tool_name).await.map(|c| c.id)
    }

    /// Resolve and call a tool.
    pub async fn call_tool(
        &self,
        owner_id: &str,
        tool_name: &str,
        arguments: ToolArguments,
    ) -> Result<ToolResult, GatewayError> {
        let config = self.resolve(owner_id, tool_name).await?;
        self.call_on(owner_id, &config, tool_name, arguments).await
    }

    /// Call a tool on an already resolved server.
    ///
    /// A disabled tool fails with `PermissionDenied` before the transport is
    /// touched.
    pub async fn call_on(
        &self,
        owner_id: &str,
        config: &ServerConfig,
        tool_name: &str,
        arguments: ToolArguments,
    ) -> Result<ToolResult, GatewayError> {
        if !self
            .overlay
            .is_enabled(owner_id, &config.id, tool_name)
            .await?
        {
            return Err(GatewayError::PermissionDenied {
                server_id: config.id.clone(),
                tool_name: tool_name.to_string(),
            });
        }

        tracing::debug!(
            owner_id = %owner_id,
            server_id = %config.id,
            tool_name = %tool_name,
            "Calling tool"
        );
        self.manager.call_tool(config, tool_name, arguments).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::RetryPolicy;
    use crate::test_utils::{FakeConnector, MemoryStore};
    use std::time::Duration;
    use toolgate_core::TransportConnector;

    struct Fixture {
        store: Arc<MemoryStore>,
        connector: Arc<FakeConnector>,
        overlay: Arc<PermissionOverlay>,
        aggregator: ToolCatalogAggregator,
    }

    fn fixture(store: MemoryStore, connector: FakeConnector) -> Fixture {
        let store = Arc::new(store);
        let connector = Arc::new(connector);
        let manager = Arc::new(ConnectionManager::new(
            Arc::clone(&connector) as Arc<dyn TransportConnector>,
            RetryPolicy::new(1, Duration::from_millis(1)),
        ));
        let dyn_store = Arc::clone(&store) as Arc<dyn GatewayStore>;
        let overlay = Arc::new(PermissionOverlay::new(
            Arc::clone(&dyn_store),
            Arc::clone(&manager),
        ));
        let aggregator = ToolCatalogAggregator::new(dyn_store, manager, Arc::clone(&overlay));
        Fixture {
            store,
            connector,
            overlay,
            aggregator,
        }
    }

    #[tokio::test]
    async fn test_first_configured_server_wins() {
        let f = fixture(
            MemoryStore::new().with_owner("agent", &["a", "b"]),
            FakeConnector::new()
                .with_server("a", &["search"])
                .with_server("b", &["search", "fetch"]),
        );

        for _ in 0..3 {
            assert_eq!(
                f.aggregator
                    .find_server_for_tool("agent", "search")
                    .await
                    .unwrap(),
                "a"
            );
        }
        assert_eq!(
            f.aggregator
                .find_server_for_tool("agent", "fetch")
                .await
                .unwrap(),
            "b"
        );
    }

    #[tokio::test]
    async fn test_removing_first_server_resolves_to_next() {
        let f = fixture(
            MemoryStore::new().with_owner("agent", &["a", "b"]),
            FakeConnector::new()
                .with_server("a", &["search"])
                .with_server("b", &["search"]),
        );
        f.overlay.synchronize("agent").await.unwrap();

        f.store.set_owner_servers("agent", &["b"]);
        f.overlay.synchronize("agent").await.unwrap();

        assert_eq!(
            f.aggregator
                .find_server_for_tool("agent", "search")
                .await
                .unwrap(),
            "b"
        );
        assert!(f.store.stored_permissions("agent").entries("a").is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_server_is_skipped() {
        let f = fixture(
            MemoryStore::new().with_owner("agent", &["down", "b"]),
            FakeConnector::new().with_server("b", &["fetch"]),
        );

        let catalogs = f.aggregator.list_tools("agent").await.unwrap();
        assert_eq!(catalogs.len(), 1);
        assert_eq!(catalogs[0].server_id, "b");
        assert_eq!(catalogs[0].server_name, "B");
    }

    #[tokio::test]
    async fn test_unknown_tool_is_not_found() {
        let f = fixture(
            MemoryStore::new().with_owner("agent", &["a"]),
            FakeConnector::new().with_server("a", &["search"]),
        );
        let err = f
            .aggregator
            .call_tool("agent", "missing", ToolArguments::new())
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_disabled_tool_never_reaches_transport() {
        let f = fixture(
            MemoryStore::new().with_owner("agent", &["a"]),
            FakeConnector::new().with_server("a", &["search"]),
        );
        f.overlay
            .set_tool_enabled("agent", "a", "search", false)
            .await
            .unwrap();

        let err = f
            .aggregator
            .call_tool("agent", "search", ToolArguments::new())
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::PermissionDenied { .. }));

        let transport = f.connector.last_transport("a").unwrap();
        assert!(transport.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_call_is_forwarded_to_resolved_server() {
        let f = fixture(
            MemoryStore::new().with_owner("agent", &["a", "b"]),
            FakeConnector::new()
                .with_server("a", &["search"])
                .with_server("b", &["fetch"]),
        );
        let result = f
            .aggregator
            .call_tool("agent", "fetch", ToolArguments::new())
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.data.unwrap()["server"], "b");
    }
}
