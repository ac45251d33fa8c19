//! In-memory fakes of the gateway ports shared by the unit tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use toolgate_core::{
    AccessToken, AppEvent, AppEventEmitter, GatewayStore, Owner, ServerConfig, StoreError,
    TokenRepository, ToolArguments, ToolDescriptor, ToolPermissions, ToolResult, ToolTransport,
    TransportConnector, TransportError,
};

// ============================================================================
// Transport
// ============================================================================

/// Transport answering from a fixed catalog.
///
/// `call_tool` echoes `{"server": id, "tool": name}`. A tool named `hang`
/// blocks until the transport is closed; a tool named `fail` returns a
/// JSON-RPC error; a tool named `crash` returns `Closed`.
pub struct FakeTransport {
    pub server_id: String,
    pub tools: Vec<ToolDescriptor>,
    pub calls: Mutex<Vec<String>>,
    pub closed: CancellationToken,
}

impl FakeTransport {
    pub fn new(server_id: &str, tools: &[&str]) -> Self {
        Self {
            server_id: server_id.to_string(),
            tools: tools.iter().map(|t| ToolDescriptor::new(*t)).collect(),
            calls: Mutex::new(Vec::new()),
            closed: CancellationToken::new(),
        }
    }
}

#[async_trait]
impl ToolTransport for FakeTransport {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, TransportError> {
        if self.closed.is_cancelled() {
            return Err(TransportError::Closed);
        }
        Ok(self.tools.clone())
    }

    async fn call_tool(
        &self,
        name: &str,
        _arguments: ToolArguments,
    ) -> Result<ToolResult, TransportError> {
        self.calls.lock().unwrap().push(name.to_string());
        match name {
            "hang" => {
                self.closed.cancelled().await;
                Err(TransportError::Closed)
            }
            "fail" => Err(TransportError::Rpc {
                code: -32000,
                message: "backend exploded".into(),
            }),
            "crash" => Err(TransportError::Closed),
            _ => Ok(ToolResult::success(
                serde_json::json!({"server": self.server_id, "tool": name}),
            )),
        }
    }

    async fn close(&self) {
        self.closed.cancel();
    }
}

// ============================================================================
// Connector
// ============================================================================

/// Connector producing [`FakeTransport`]s from a catalog per server id.
#[derive(Default)]
pub struct FakeConnector {
    catalogs: Mutex<HashMap<String, Vec<String>>>,
    failures: Mutex<HashMap<String, u32>>,
    connects: Mutex<HashMap<String, u32>>,
    delay: Option<Duration>,
    pub total_connects: AtomicU32,
    pub transports: Mutex<Vec<Arc<FakeTransport>>>,
}

impl FakeConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every connect sleeps for `delay` first.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    #[must_use]
    pub fn with_server(self, server_id: &str, tools: &[&str]) -> Self {
        self.set_tools(server_id, tools);
        self
    }

    pub fn set_tools(&self, server_id: &str, tools: &[&str]) {
        self.catalogs.lock().unwrap().insert(
            server_id.to_string(),
            tools.iter().map(ToString::to_string).collect(),
        );
    }

    /// The next `count` connects to `server_id` fail with a spawn error.
    pub fn fail_next(&self, server_id: &str, count: u32) {
        self.failures
            .lock()
            .unwrap()
            .insert(server_id.to_string(), count);
    }

    /// Make `server_id` unreachable until [`set_tools`](Self::set_tools).
    pub fn remove_server(&self, server_id: &str) {
        self.catalogs.lock().unwrap().remove(server_id);
    }

    pub fn connects(&self, server_id: &str) -> u32 {
        self.connects
            .lock()
            .unwrap()
            .get(server_id)
            .copied()
            .unwrap_or(0)
    }

    pub fn last_transport(&self, server_id: &str) -> Option<Arc<FakeTransport>> {
        self.transports
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|t| t.server_id == server_id)
            .cloned()
    }
}

#[async_trait]
impl TransportConnector for FakeConnector {
    async fn connect(
        &self,
        config: &ServerConfig,
    ) -> Result<Arc<dyn ToolTransport>, TransportError> {
        config.validate().map_err(TransportError::Config)?;
        self.total_connects.fetch_add(1, Ordering::SeqCst);
        *self
            .connects
            .lock()
            .unwrap()
            .entry(config.id.clone())
            .or_default() += 1;

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        {
            let mut failures = self.failures.lock().unwrap();
            if let Some(remaining) = failures.get_mut(&config.id)
                && *remaining > 0
            {
                *remaining -= 1;
                return Err(TransportError::Spawn("simulated spawn failure".into()));
            }
        }

        let tools = self
            .catalogs
            .lock()
            .unwrap()
            .get(&config.id)
            .cloned()
            .ok_or_else(|| TransportError::Http("connection refused".into()))?;
        let tools: Vec<&str> = tools.iter().map(String::as_str).collect();
        let transport = Arc::new(FakeTransport::new(&config.id, &tools));
        self.transports.lock().unwrap().push(Arc::clone(&transport));
        Ok(transport)
    }
}

// ============================================================================
// Store
// ============================================================================

/// In-memory gateway store.
#[derive(Default)]
pub struct MemoryStore {
    pub servers: Mutex<Vec<ServerConfig>>,
    pub owners: Mutex<HashMap<String, Owner>>,
    pub permissions: Mutex<HashMap<String, ToolPermissions>>,
    pub saves: AtomicU32,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add local servers and one owner listing them in order.
    #[must_use]
    pub fn with_owner(self, owner_id: &str, server_ids: &[&str]) -> Self {
        for id in server_ids {
            if !self.servers.lock().unwrap().iter().any(|s| s.id == *id) {
                self.servers
                    .lock()
                    .unwrap()
                    .push(ServerConfig::local(*id, id.to_uppercase(), "fake-mcp", Vec::new()));
            }
        }
        self.set_owner_servers(owner_id, server_ids);
        self
    }

    pub fn set_owner_servers(&self, owner_id: &str, server_ids: &[&str]) {
        self.owners.lock().unwrap().insert(
            owner_id.to_string(),
            Owner::new(owner_id, server_ids.iter().map(ToString::to_string).collect()),
        );
    }

    pub fn update_server(&self, config: ServerConfig) {
        let mut servers = self.servers.lock().unwrap();
        match servers.iter_mut().find(|s| s.id == config.id) {
            Some(existing) => *existing = config,
            None => servers.push(config),
        }
    }

    pub fn stored_permissions(&self, owner_id: &str) -> ToolPermissions {
        self.permissions
            .lock()
            .unwrap()
            .get(owner_id)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl GatewayStore for MemoryStore {
    async fn owner(&self, owner_id: &str) -> Result<Owner, StoreError> {
        self.owners
            .lock()
            .unwrap()
            .get(owner_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("owner {owner_id}")))
    }

    async fn server_configs(&self, owner_id: &str) -> Result<Vec<ServerConfig>, StoreError> {
        let owner = self.owner(owner_id).await?;
        let servers = self.servers.lock().unwrap();
        Ok(owner
            .mcp_servers
            .iter()
            .filter_map(|id| servers.iter().find(|s| &s.id == id).cloned())
            .collect())
    }

    async fn all_servers(&self) -> Result<Vec<ServerConfig>, StoreError> {
        Ok(self.servers.lock().unwrap().clone())
    }

    async fn tool_permissions(&self, owner_id: &str) -> Result<ToolPermissions, StoreError> {
        Ok(self.stored_permissions(owner_id))
    }

    async fn save_tool_permissions(
        &self,
        owner_id: &str,
        permissions: &ToolPermissions,
    ) -> Result<(), StoreError> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        self.permissions
            .lock()
            .unwrap()
            .insert(owner_id.to_string(), permissions.clone());
        Ok(())
    }
}

// ============================================================================
// Tokens
// ============================================================================

/// In-memory token repository.
#[derive(Default)]
pub struct MemoryTokens {
    tokens: Mutex<BTreeMap<String, AccessToken>>,
}

impl MemoryTokens {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenRepository for MemoryTokens {
    async fn get(&self, token_id: &str) -> Result<Option<AccessToken>, StoreError> {
        Ok(self.tokens.lock().unwrap().get(token_id).cloned())
    }

    async fn list(&self) -> Result<Vec<AccessToken>, StoreError> {
        Ok(self.tokens.lock().unwrap().values().cloned().collect())
    }

    async fn save(&self, token: &AccessToken) -> Result<(), StoreError> {
        self.tokens
            .lock()
            .unwrap()
            .insert(token.id.clone(), token.clone());
        Ok(())
    }

    async fn delete(&self, token_id: &str) -> Result<bool, StoreError> {
        Ok(self.tokens.lock().unwrap().remove(token_id).is_some())
    }
}

// ============================================================================
// Events
// ============================================================================

/// Emitter that records every event.
#[derive(Clone, Default)]
pub struct RecordingEmitter {
    pub events: Arc<Mutex<Vec<AppEvent>>>,
}

impl RecordingEmitter {
    pub fn names(&self) -> Vec<&'static str> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(AppEvent::event_name)
            .collect()
    }
}

impl AppEventEmitter for RecordingEmitter {
    fn emit(&self, event: AppEvent) {
        self.events.lock().unwrap().push(event);
    }
}
