//! High-level gateway service.
//!
//! This is the surface the outer transport layer (HTTP, IPC, CLI) calls. It
//! composes the connection manager, catalog aggregator, permission overlay
//! and access gateway, and emits events for state changes.

use std::sync::Arc;

use serde::Serialize;
use toolgate_core::{
    AccessGateway, AccessToken, AppEvent, AppEventEmitter, GatewayError, GatewayErrorInfo,
    GatewaySettings, GatewayStore, Scope, ServerConfig, ServerId, ServerRuntimeInfo, ServerSummary,
    TokenRepository, ToolArguments, ToolPermissions, ToolResult, TransportConnector,
};

use crate::aggregator::{ServerCatalog, ToolCatalogAggregator};
use crate::manager::ConnectionManager;
use crate::permissions::{PermissionOverlay, SyncReport};
use crate::retry::RetryPolicy;

/// Server configuration with its runtime state.
#[derive(Debug, Clone, Serialize)]
pub struct ServerInfo {
    pub config: ServerConfig,
    pub runtime: ServerRuntimeInfo,
}

/// Gateway facade with injected store, token repository and connector.
pub struct GatewayService {
    store: Arc<dyn GatewayStore>,
    manager: Arc<ConnectionManager>,
    overlay: Arc<PermissionOverlay>,
    aggregator: ToolCatalogAggregator,
    gateway: AccessGateway,
    emitter: Arc<dyn AppEventEmitter>,
}

impl GatewayService {
    /// Create a new gateway service with injected dependencies.
    pub fn new(
        store: Arc<dyn GatewayStore>,
        tokens: Arc<dyn TokenRepository>,
        connector: Arc<dyn TransportConnector>,
        settings: &GatewaySettings,
        emitter: Arc<dyn AppEventEmitter>,
    ) -> Self {
        let manager = Arc::new(ConnectionManager::new(
            connector,
            RetryPolicy::from_settings(settings),
        ));
        let overlay = Arc::new(PermissionOverlay::new(
            Arc::clone(&store),
            Arc::clone(&manager),
        ));
        let aggregator = ToolCatalogAggregator::new(
            Arc::clone(&store),
            Arc::clone(&manager),
            Arc::clone(&overlay),
        );

        Self {
            store,
            manager,
            overlay,
            aggregator,
            gateway: AccessGateway::new(tokens),
            emitter,
        }
    }

    /// Connect every auto-start server. Failures are logged, not returned.
    pub async fn initialize(&self) -> Result<(), GatewayError> {
        for config in self.store.all_servers().await? {
            if !config.auto_start {
                continue;
            }
            if config.disabled {
                tracing::info!(
                    server_id = %config.id,
                    server_name = %config.name,
                    "Skipping auto-start for disabled server"
                );
                continue;
            }
            if let Err(e) = self.start(&config).await {
                tracing::warn!(
                    server_id = %config.id,
                    server_name = %config.name,
                    error = %e,
                    "Failed to auto-start MCP server"
                );
            }
        }
        Ok(())
    }

    /// The access gateway for token management.
    pub const fn access(&self) -> &AccessGateway {
        &self.gateway
    }

    async fn owned_config(
        &self,
        owner_id: &str,
        server_id: &str,
    ) -> Result<ServerConfig, GatewayError> {
        self.store
            .server_configs(owner_id)
            .await?
            .into_iter()
            .find(|c| c.id == server_id)
            .ok_or_else(|| {
                GatewayError::NotFound(format!("server {server_id} for owner {owner_id}"))
            })
    }

    // =========================================================================
    // Tools
    // =========================================================================

    /// Live catalog of the owner's reachable servers.
    pub async fn list_tools(&self, owner_id: &str) -> Result<Vec<ServerCatalog>, GatewayError> {
        self.aggregator.list_tools(owner_id).await
    }

    /// Catalog restricted to servers the token may reach as an application.
    pub async fn list_tools_for_token(
        &self,
        owner_id: &str,
        token_id: &str,
    ) -> Result<Vec<ServerCatalog>, GatewayError> {
        let granted = self
            .gateway
            .granted_servers(token_id, Scope::Application)
            .await?;
        self.aggregator.list_tools_in(owner_id, &granted).await
    }

    /// Resolve a tool for the owner and call it on behalf of a token.
    ///
    /// A token that grants none of the owner's servers is rejected before
    /// anything is connected. Otherwise the tool resolves first-match over the
    /// owner's servers the token grants under `Application`; other servers
    /// are never connected, so a tool only they expose is `NotFound`.
    pub async fn call_tool(
        &self,
        owner_id: &str,
        tool_name: &str,
        arguments: ToolArguments,
        token_id: &str,
    ) -> Result<ToolResult, GatewayError> {
        let granted = self
            .gateway
            .granted_servers(token_id, Scope::Application)
            .await?;
        let owner = self.store.owner(owner_id).await?;
        if !owner.mcp_servers.iter().any(|id| granted.contains(id)) {
            return Err(GatewayError::Unauthorized(format!(
                "token grants no servers of owner {owner_id}"
            )));
        }

        let config = self
            .aggregator
            .resolve_in(owner_id, tool_name, &granted)
            .await?;

        self.aggregator
            .call_on(owner_id, &config, tool_name, arguments)
            .await
    }

    // =========================================================================
    // Server Lifecycle
    // =========================================================================

    async fn start(&self, config: &ServerConfig) -> Result<ServerRuntimeInfo, GatewayError> {
        match self.manager.list_tools(config).await {
            Ok(tools) => {
                self.emitter.emit(AppEvent::server_started(
                    &config.id,
                    &config.name,
                    tools.len(),
                ));
                Ok(self.manager.runtime_info(&config.id).await)
            }
            Err(e) => {
                self.emitter.emit(AppEvent::server_error(GatewayErrorInfo::from_error(
                    Some(&config.id),
                    &e,
                )));
                Err(e)
            }
        }
    }

    /// Connect a server and fetch its catalog.
    pub async fn start_server(
        &self,
        owner_id: &str,
        server_id: &str,
    ) -> Result<ServerRuntimeInfo, GatewayError> {
        let config = self.owned_config(owner_id, server_id).await?;
        self.start(&config).await
    }

    /// Stop a server. Returns `false` if it was not running.
    pub async fn stop_server(&self, owner_id: &str, server_id: &str) -> Result<bool, GatewayError> {
        let config = self.owned_config(owner_id, server_id).await?;
        let stopped = self.manager.stop(&config.id).await;
        if stopped {
            self.emitter
                .emit(AppEvent::server_stopped(&config.id, &config.name));
        }
        Ok(stopped)
    }

    /// Runtime state of one of the owner's servers.
    pub async fn get_server_status(
        &self,
        owner_id: &str,
        server_id: &str,
    ) -> Result<ServerRuntimeInfo, GatewayError> {
        let config = self.owned_config(owner_id, server_id).await?;
        Ok(self.manager.runtime_info(&config.id).await)
    }

    /// Every server of the owner with its runtime state, in configuration order.
    pub async fn list_servers_with_status(
        &self,
        owner_id: &str,
    ) -> Result<Vec<ServerInfo>, GatewayError> {
        let configs = self.store.server_configs(owner_id).await?;
        let mut infos = Vec::with_capacity(configs.len());
        for config in configs {
            let runtime = self.manager.runtime_info(&config.id).await;
            infos.push(ServerInfo { config, runtime });
        }
        Ok(infos)
    }

    /// Ids of servers with a live connection, sorted.
    pub async fn connected_servers(&self) -> Vec<ServerId> {
        self.manager.connected_servers().await
    }

    // =========================================================================
    // Permissions
    // =========================================================================

    /// Rebuild the owner's permission overlay from the live catalogs.
    pub async fn synchronize_permissions(&self, owner_id: &str) -> Result<SyncReport, GatewayError> {
        let report = self.overlay.synchronize(owner_id).await?;
        self.emitter.emit(AppEvent::permissions_synchronized(
            owner_id,
            report.skipped_servers.clone(),
        ));
        Ok(report)
    }

    /// Enable or disable one tool for the owner.
    pub async fn set_tool_enabled(
        &self,
        owner_id: &str,
        server_id: &str,
        tool_name: &str,
        enabled: bool,
    ) -> Result<(), GatewayError> {
        let config = self.owned_config(owner_id, server_id).await?;
        self.overlay
            .set_tool_enabled(owner_id, &config.id, tool_name, enabled)
            .await?;
        self.emitter.emit(AppEvent::tool_permission_changed(
            owner_id, &config.id, tool_name, enabled,
        ));
        Ok(())
    }

    /// The owner's stored overlay.
    pub async fn permissions(&self, owner_id: &str) -> Result<ToolPermissions, GatewayError> {
        self.overlay.permissions(owner_id).await
    }

    // =========================================================================
    // Configuration Changes
    // =========================================================================

    /// A server was added: grant it to every existing token.
    pub async fn server_created(
        &self,
        config: &ServerConfig,
    ) -> Result<Vec<AccessToken>, GatewayError> {
        let changed = self.gateway.grant_server_to_all(&config.id).await?;
        self.emitter
            .emit(AppEvent::server_added(ServerSummary::from(config)));
        self.emit_grant_changes(&changed);
        tracing::info!(
            server_id = %config.id,
            tokens = changed.len(),
            "Granted new server to existing tokens"
        );
        Ok(changed)
    }

    /// A server was deleted: stop it and revoke it from every token.
    pub async fn server_deleted(&self, server_id: &str) -> Result<Vec<AccessToken>, GatewayError> {
        self.manager.stop(server_id).await;
        let changed = self.gateway.revoke_server_from_all(server_id).await?;
        self.emitter.emit(AppEvent::server_removed(server_id));
        self.emit_grant_changes(&changed);
        tracing::info!(
            server_id = %server_id,
            tokens = changed.len(),
            "Revoked deleted server from tokens"
        );
        Ok(changed)
    }

    fn emit_grant_changes(&self, tokens: &[AccessToken]) {
        for token in tokens {
            self.emitter.emit(AppEvent::token_grants_changed(
                &token.id,
                token.server_ids.clone(),
                token.scopes.clone(),
            ));
        }
    }

    // =========================================================================
    // Shutdown
    // =========================================================================

    /// Stop all servers.
    pub async fn shutdown(&self) {
        self.manager.stop_all().await;
    }
}
