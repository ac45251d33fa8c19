//! Durable per-owner tool permissions layered over live catalogs.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use toolgate_core::{GatewayError, GatewayStore, ServerId, ToolPermissions};

use crate::manager::ConnectionManager;

/// Result of one synchronization pass.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub owner_id: String,
    pub permissions: ToolPermissions,
    /// Configured servers that could not be reached; their entries were kept.
    pub skipped_servers: Vec<ServerId>,
    /// Whether the stored overlay changed.
    pub changed: bool,
}

/// Keeps each owner's enable flags in step with the live catalogs.
///
/// Synchronization and toggles for one owner run one at a time, so a toggle
/// made during a sync is never lost. Different owners never contend.
pub struct PermissionOverlay {
    store: Arc<dyn GatewayStore>,
    manager: Arc<ConnectionManager>,
    owner_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl PermissionOverlay {
    pub fn new(store: Arc<dyn GatewayStore>, manager: Arc<ConnectionManager>) -> Self {
        Self {
            store,
            manager,
            owner_locks: Mutex::new(HashMap::new()),
        }
    }

    fn owner_lock(&self, owner_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self
            .owner_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(owner_id.to_string()).or_default())
    }

    /// Rebuild and persist the owner's overlay from the live catalogs.
    ///
    /// Servers that fail to connect are skipped and keep their previous
    /// entries; a connectivity failure is never treated as tool removal.
    pub async fn synchronize(&self, owner_id: &str) -> Result<SyncReport, GatewayError> {
        let lock = self.owner_lock(owner_id);
        let _guard = lock.lock().await;
        self.synchronize_locked(owner_id).await
    }

    async fn synchronize_locked(&self, owner_id: &str) -> Result<SyncReport, GatewayError> {
        let configs = self.store.server_configs(owner_id).await?;
        let previous = self.store.tool_permissions(owner_id).await?;

        let configured: Vec<ServerId> = configs.iter().map(|c| c.id.clone()).collect();
        let mut live = BTreeMap::new();
        let mut skipped_servers = Vec::new();

        for config in &configs {
            match self.manager.list_tools(config).await {
                Ok(tools) => {
                    live.insert(config.id.clone(), tools);
                }
                Err(e) => {
                    tracing::warn!(
                        owner_id = %owner_id,
                        server_id = %config.id,
                        error = %e,
                        "Skipping server during permission sync"
                    );
                    skipped_servers.push(config.id.clone());
                }
            }
        }

        let permissions = previous.reconcile(&configured, &live);
        let changed = permissions != previous;
        if changed {
            self.store
                .save_tool_permissions(owner_id, &permissions)
                .await?;
        }

        tracing::info!(
            owner_id = %owner_id,
            servers = configured.len(),
            skipped = skipped_servers.len(),
            changed,
            "Tool permissions synchronized"
        );

        Ok(SyncReport {
            owner_id: owner_id.to_string(),
            permissions,
            skipped_servers,
            changed,
        })
    }

    /// Whether a tool may be called. Tools without an entry are enabled.
    pub async fn is_enabled(
        &self,
        owner_id: &str,
        server_id: &str,
        tool_name: &str,
    ) -> Result<bool, GatewayError> {
        Ok(self
            .store
            .tool_permissions(owner_id)
            .await?
            .is_enabled(server_id, tool_name)
            .unwrap_or(true))
    }

    /// Record an operator choice for one tool.
    ///
    /// A tool without an entry triggers one synchronization first; if it is
    /// still unknown afterwards the call fails with `NotFound`.
    pub async fn set_tool_enabled(
        &self,
        owner_id: &str,
        server_id: &str,
        tool_name: &str,
        enabled: bool,
    ) -> Result<(), GatewayError> {
        let lock = self.owner_lock(owner_id);
        let _guard = lock.lock().await;

        let mut permissions = self.store.tool_permissions(owner_id).await?;
        if !permissions.set_enabled(server_id, tool_name, enabled) {
            tracing::debug!(
                owner_id = %owner_id,
                server_id = %server_id,
                tool_name = %tool_name,
                "No permission entry, synchronizing first"
            );
            permissions = self.synchronize_locked(owner_id).await?.permissions;
            if !permissions.set_enabled(server_id, tool_name, enabled) {
                return Err(GatewayError::NotFound(format!(
                    "tool '{tool_name}' on server {server_id}"
                )));
            }
        }

        self.store
            .save_tool_permissions(owner_id, &permissions)
            .await?;
        tracing::info!(
            owner_id = %owner_id,
            server_id = %server_id,
            tool_name = %tool_name,
            enabled,
            "Tool permission changed"
        );
        Ok(())
    }

    /// The stored overlay for display.
    pub async fn permissions(&self, owner_id: &str) -> Result<ToolPermissions, GatewayError> {
        Ok(self.store.tool_permissions(owner_id).await?)
    }
}
