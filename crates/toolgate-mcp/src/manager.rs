//! Backend connection lifecycle management.
//!
//! One slot exists per server id. Connect passes for a server are serialized
//! through the slot's connect lock so concurrent callers share a single
//! attempt; slots for different servers never contend.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use toolgate_core::{
    ConnectionStatus, GatewayError, ServerConfig, ServerId, ServerRuntimeInfo, ToolArguments,
    ToolDescriptor, ToolResult, ToolTransport, TransportConnector, TransportError,
};

use crate::retry::RetryPolicy;

/// Mutable runtime state of one server.
#[derive(Default)]
struct SlotState {
    status: ConnectionStatus,
    transport: Option<Arc<dyn ToolTransport>>,
    /// Catalog from the most recent successful listing.
    tools: Vec<ToolDescriptor>,
    /// Config the current (or last attempted) connection was built from.
    config: Option<ServerConfig>,
    last_error: Option<String>,
    last_connected_at: Option<DateTime<Utc>>,
    attempts: u32,
    /// Bumped each time a connect pass completes.
    generation: u64,
    last_outcome: Option<Result<(), GatewayError>>,
}

struct ServerSlot {
    connect_lock: tokio::sync::Mutex<()>,
    state: Mutex<SlotState>,
}

impl ServerSlot {
    fn new() -> Self {
        Self {
            connect_lock: tokio::sync::Mutex::new(()),
            state: Mutex::new(SlotState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, SlotState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_live_for(state: &SlotState, config: &ServerConfig) -> bool {
        state.status.is_running()
            && state.transport.is_some()
            && state.config.as_ref() == Some(config)
    }
}

/// Owns every backend connection of one gateway instance.
pub struct ConnectionManager {
    connector: Arc<dyn TransportConnector>,
    policy: RetryPolicy,
    slots: RwLock<HashMap<ServerId, Arc<ServerSlot>>>,
}

impl ConnectionManager {
    /// Create a manager with no connections.
    pub fn new(connector: Arc<dyn TransportConnector>, policy: RetryPolicy) -> Self {
        Self {
            connector,
            policy,
            slots: RwLock::new(HashMap::new()),
        }
    }

    async fn slot(&self, server_id: &str) -> Arc<ServerSlot> {
        if let Some(slot) = self.slots.read().await.get(server_id) {
            return Arc::clone(slot);
        }
        let mut slots = self.slots.write().await;
        Arc::clone(
            slots
                .entry(server_id.to_string())
                .or_insert_with(|| Arc::new(ServerSlot::new())),
        )
    }

    async fn existing_slot(&self, server_id: &str) -> Option<Arc<ServerSlot>> {
        self.slots.read().await.get(server_id).cloned()
    }

    /// Make sure a live connection built from `config` exists.
    ///
    /// A running connection built from the same config is reused. If a
    /// connect pass is already in flight the caller waits for it and gets
    /// its outcome. A running connection built from a different config is
    /// closed and rebuilt.
    pub async fn ensure_connected(&self, config: &ServerConfig) -> Result<(), GatewayError> {
        if config.disabled {
            return Err(GatewayError::Config {
                server_id: config.id.clone(),
                message: "server is disabled".to_string(),
            });
        }

        let slot = self.slot(&config.id).await;

        let seen_generation = {
            let state = slot.state();
            if ServerSlot::is_live_for(&state, config) {
                return Ok(());
            }
            state.generation
        };

        let _connect = slot.connect_lock.lock().await;

        let stale = {
            let mut state = slot.state();

            // A pass for this config finished while we waited: share it
            if state.generation != seen_generation && state.config.as_ref() == Some(config) {
                match &state.last_outcome {
                    Some(Err(e)) => return Err(e.clone()),
                    Some(Ok(())) if state.status.is_running() => return Ok(()),
                    _ => {}
                }
            }
            if ServerSlot::is_live_for(&state, config) {
                return Ok(());
            }

            state.status = ConnectionStatus::Starting;
            state.config = Some(config.clone());
            state.attempts = 0;
            state.tools.clear();
            state.transport.take()
        };

        if let Some(stale) = stale {
            tracing::debug!(server_id = %config.id, "Closing stale connection");
            stale.close().await;
        }

        let attempts = AtomicU32::new(0);
        let result = self
            .policy
            .execute(|| {
                attempts.fetch_add(1, Ordering::SeqCst);
                let connector = Arc::clone(&self.connector);
                async move { connector.connect(config).await }
            })
            .await;

        let mut state = slot.state();
        state.generation += 1;
        state.attempts = attempts.load(Ordering::SeqCst);

        match result {
            Ok(transport) => {
                state.status = ConnectionStatus::Running;
                state.transport = Some(transport);
                state.last_error = None;
                state.last_connected_at = Some(Utc::now());
                state.last_outcome = Some(Ok(()));
                tracing::info!(
                    server_id = %config.id,
                    server_name = %config.name,
                    transport = config.transport.label(),
                    attempts = state.attempts,
                    "MCP server connected"
                );
                Ok(())
            }
            Err(e) => {
                let error = connect_error(&config.id, e);
                let message = error.to_string();
                state.status = ConnectionStatus::Error(message.clone());
                state.last_error = Some(message);
                state.last_outcome = Some(Err(error.clone()));
                tracing::warn!(
                    server_id = %config.id,
                    attempts = state.attempts,
                    error = %error,
                    "MCP server failed to connect"
                );
                Err(error)
            }
        }
    }

    /// Stop a server. Returns `false` if it was already stopped.
    ///
    /// Calls in flight on the connection fail with a connection error.
    pub async fn stop(&self, server_id: &str) -> bool {
        let Some(slot) = self.existing_slot(server_id).await else {
            return false;
        };
        let _connect = slot.connect_lock.lock().await;

        let transport = {
            let mut state = slot.state();
            if state.status == ConnectionStatus::Stopped {
                return false;
            }
            state.status = ConnectionStatus::Stopping;
            state.tools.clear();
            state.transport.take()
        };

        if let Some(transport) = transport {
            transport.close().await;
        }

        {
            let mut state = slot.state();
            state.status = ConnectionStatus::Stopped;
            state.config = None;
            state.last_outcome = None;
        }

        tracing::info!(server_id = %server_id, "MCP server stopped");
        true
    }

    /// Stop every server.
    pub async fn stop_all(&self) {
        let server_ids: Vec<ServerId> = self.slots.read().await.keys().cloned().collect();
        for server_id in server_ids {
            self.stop(&server_id).await;
        }
    }

    /// Current status. Unknown servers are stopped.
    pub async fn status(&self, server_id: &str) -> ConnectionStatus {
        match self.existing_slot(server_id).await {
            Some(slot) => slot.state().status.clone(),
            None => ConnectionStatus::Stopped,
        }
    }

    /// Runtime snapshot of one server.
    pub async fn runtime_info(&self, server_id: &str) -> ServerRuntimeInfo {
        let Some(slot) = self.existing_slot(server_id).await else {
            return ServerRuntimeInfo::stopped(server_id);
        };
        let state = slot.state();
        ServerRuntimeInfo {
            server_id: server_id.to_string(),
            status: state.status.clone(),
            tools: state.tools.clone(),
            last_error: state.last_error.clone(),
            last_connected_at: state.last_connected_at,
            connect_attempts: state.attempts,
        }
    }

    /// Ids of servers with a live connection, sorted.
    pub async fn connected_servers(&self) -> Vec<ServerId> {
        let slots = self.slots.read().await;
        let mut ids: Vec<ServerId> = slots
            .iter()
            .filter(|(_, slot)| slot.state().status.is_running())
            .map(|(id, _)| id.clone())
            .collect();
        drop(slots);
        ids.sort();
        ids
    }

    /// Fetch the live catalog, connecting first if needed.
    pub async fn list_tools(
        &self,
        config: &ServerConfig,
    ) -> Result<Vec<ToolDescriptor>, GatewayError> {
        let (slot, transport) = self.transport(config).await?;
        match transport.list_tools().await {
            Ok(tools) => {
                let mut state = slot.state();
                if state
                    .transport
                    .as_ref()
                    .is_some_and(|t| Arc::ptr_eq(t, &transport))
                {
                    state.tools.clone_from(&tools);
                }
                Ok(tools)
            }
            Err(e) => Err(self.observe_fault(&config.id, &slot, &transport, e).await),
        }
    }

    /// Forward a tool call, connecting first if needed.
    pub async fn call_tool(
        &self,
        config: &ServerConfig,
        tool_name: &str,
        arguments: ToolArguments,
    ) -> Result<ToolResult, GatewayError> {
        let (slot, transport) = self.transport(config).await?;
        match transport.call_tool(tool_name, arguments).await {
            Ok(result) => Ok(result),
            Err(e) => Err(self.observe_fault(&config.id, &slot, &transport, e).await),
        }
    }

    async fn transport(
        &self,
        config: &ServerConfig,
    ) -> Result<(Arc<ServerSlot>, Arc<dyn ToolTransport>), GatewayError> {
        self.ensure_connected(config).await?;
        let slot = self.slot(&config.id).await;
        let transport = slot.state().transport.clone();
        transport.map(|t| (slot, t)).ok_or_else(|| GatewayError::Connect {
            server_id: config.id.clone(),
            message: TransportError::Closed.to_string(),
        })
    }

    /// Map a failure seen while using a connection.
    ///
    /// Connection faults move the slot to `Error` and drop the transport, so
    /// the next use reconnects. Backend errors leave the connection running.
    async fn observe_fault(
        &self,
        server_id: &str,
        slot: &ServerSlot,
        transport: &Arc<dyn ToolTransport>,
        error: TransportError,
    ) -> GatewayError {
        if error.is_connection_fault() {
            let faulted = {
                let mut state = slot.state();
                let current = state
                    .transport
                    .as_ref()
                    .is_some_and(|t| Arc::ptr_eq(t, transport));
                if current {
                    state.status = ConnectionStatus::Error(error.to_string());
                    state.last_error = Some(error.to_string());
                    state.tools.clear();
                    state.transport.take()
                } else {
                    None
                }
            };

            if let Some(faulted) = faulted {
                tracing::warn!(server_id = %server_id, error = %error, "MCP connection faulted");
                faulted.close().await;
            }
        }

        GatewayError::from_transport(server_id, error)
    }
}

fn connect_error(server_id: &str, error: TransportError) -> GatewayError {
    match error {
        TransportError::Config(message) => GatewayError::Config {
            server_id: server_id.to_string(),
            message,
        },
        other => GatewayError::Connect {
            server_id: server_id.to_string(),
            message: other.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::FakeConnector;
    use std::time::Duration;

    fn manager(connector: &Arc<FakeConnector>) -> Arc<ConnectionManager> {
        Arc::new(ConnectionManager::new(
            Arc::clone(connector) as Arc<dyn TransportConnector>,
            RetryPolicy::new(3, Duration::from_millis(1000)),
        ))
    }

    fn config(id: &str) -> ServerConfig {
        ServerConfig::local(id, id.to_uppercase(), "fake-mcp", Vec::new())
    }

    #[tokio::test]
    async fn test_server_not_running() {
        let manager = manager(&Arc::new(FakeConnector::new()));
        assert_eq!(manager.status("missing").await, ConnectionStatus::Stopped);
        assert!(!manager.stop("missing").await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_ensure_connected_connects_once() {
        let connector = Arc::new(
            FakeConnector::new()
                .with_server("a", &["search"])
                .with_delay(Duration::from_millis(50)),
        );
        let manager = manager(&connector);
        let config = config("a");

        let calls = (0..8).map(|_| {
            let manager = Arc::clone(&manager);
            let config = config.clone();
            tokio::spawn(async move { manager.ensure_connected(&config).await })
        });
        for result in futures_util::future::join_all(calls).await {
            result.unwrap().unwrap();
        }

        assert_eq!(connector.connects("a"), 1);
        assert_eq!(manager.status("a").await, ConnectionStatus::Running);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_then_recover() {
        let connector = Arc::new(FakeConnector::new().with_server("a", &["search"]));
        connector.fail_next("a", 3);
        let manager = manager(&connector);

        let err = manager.ensure_connected(&config("a")).await.unwrap_err();
        assert!(matches!(err, GatewayError::Connect { .. }));
        assert!(matches!(
            manager.status("a").await,
            ConnectionStatus::Error(_)
        ));
        let info = manager.runtime_info("a").await;
        assert_eq!(info.connect_attempts, 3);
        assert!(info.last_error.is_some());

        // The fault is fixed; the next call starts again from attempt 0
        manager.ensure_connected(&config("a")).await.unwrap();
        assert_eq!(connector.connects("a"), 4);
        assert_eq!(manager.runtime_info("a").await.connect_attempts, 1);
        assert!(manager.status("a").await.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_waiters_share_failed_outcome() {
        let connector = Arc::new(
            FakeConnector::new()
                .with_server("a", &["search"])
                .with_delay(Duration::from_millis(10)),
        );
        connector.fail_next("a", 3);
        let manager = manager(&connector);

        let calls = (0..4).map(|_| {
            let manager = Arc::clone(&manager);
            tokio::spawn(async move { manager.ensure_connected(&config("a")).await })
        });
        for result in futures_util::future::join_all(calls).await {
            assert!(result.unwrap().is_err());
        }
        assert_eq!(connector.connects("a"), 3);
    }

    #[tokio::test]
    async fn test_config_error_is_not_retried() {
        let connector = Arc::new(FakeConnector::new());
        let manager = manager(&connector);
        let broken = ServerConfig::remote_streamable("web", "Web", "");

        let err = manager.ensure_connected(&broken).await.unwrap_err();
        assert!(matches!(err, GatewayError::Config { .. }));
        assert_eq!(manager.runtime_info("web").await.connect_attempts, 1);
    }

    #[tokio::test]
    async fn test_disabled_server_is_never_connected() {
        let connector = Arc::new(FakeConnector::new().with_server("a", &["search"]));
        let manager = manager(&connector);

        let err = manager
            .ensure_connected(&config("a").with_disabled(true))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Config { .. }));
        assert_eq!(connector.connects("a"), 0);
    }

    #[tokio::test]
    async fn test_config_change_reconnects() {
        let connector = Arc::new(FakeConnector::new().with_server("a", &["search"]));
        let manager = manager(&connector);

        manager.ensure_connected(&config("a")).await.unwrap();
        manager.ensure_connected(&config("a")).await.unwrap();
        assert_eq!(connector.connects("a"), 1);
        let first = connector.last_transport("a").unwrap();

        let changed = config("a").with_env("TOKEN", "rotated");
        manager.ensure_connected(&changed).await.unwrap();
        assert_eq!(connector.connects("a"), 2);
        assert!(first.closed.is_cancelled());
    }

    #[tokio::test]
    async fn test_stop_during_call_fails_with_connection_error() {
        let connector = Arc::new(FakeConnector::new().with_server("a", &["hang"]));
        let manager = manager(&connector);
        manager.ensure_connected(&config("a")).await.unwrap();

        let call = {
            let manager = Arc::clone(&manager);
            tokio::spawn(async move {
                manager
                    .call_tool(&config("a"), "hang", ToolArguments::new())
                    .await
            })
        };
        // Let the call reach the transport
        while connector
            .last_transport("a")
            .is_none_or(|t| t.calls.lock().unwrap().is_empty())
        {
            tokio::task::yield_now().await;
        }

        assert!(manager.stop("a").await);
        let result = call.await.unwrap();
        assert!(matches!(result, Err(GatewayError::Connect { .. })));
        assert_eq!(manager.status("a").await, ConnectionStatus::Stopped);
        assert!(!manager.stop("a").await);
    }

    #[tokio::test]
    async fn test_backend_error_keeps_connection_running() {
        let connector = Arc::new(FakeConnector::new().with_server("a", &["fail", "crash"]));
        let manager = manager(&connector);

        let err = manager
            .call_tool(&config("a"), "fail", ToolArguments::new())
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Backend { .. }));
        assert!(manager.status("a").await.is_running());

        let err = manager
            .call_tool(&config("a"), "crash", ToolArguments::new())
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Connect { .. }));
        assert!(matches!(
            manager.status("a").await,
            ConnectionStatus::Error(_)
        ));

        // Next use reconnects
        manager
            .call_tool(&config("a"), "other", ToolArguments::new())
            .await
            .unwrap();
        assert_eq!(connector.connects("a"), 2);
    }

    #[tokio::test]
    async fn test_list_tools_caches_catalog_for_status() {
        let connector = Arc::new(FakeConnector::new().with_server("a", &["x", "y"]));
        let manager = manager(&connector);

        let tools = manager.list_tools(&config("a")).await.unwrap();
        assert_eq!(tools.len(), 2);
        assert_eq!(manager.runtime_info("a").await.tools.len(), 2);
        assert_eq!(manager.connected_servers().await, vec!["a".to_string()]);

        manager.stop_all().await;
        assert!(manager.connected_servers().await.is_empty());
        assert!(manager.runtime_info("a").await.tools.is_empty());
    }
}
