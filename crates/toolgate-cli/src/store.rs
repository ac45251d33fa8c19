//! JSON-file backed configuration store.
//!
//! The whole gateway state (settings, servers, owners, tokens and permission
//! overlays) lives in one JSON document. Every mutation rewrites the file
//! through a temporary sibling and a rename, so a crash never leaves a
//! half-written document behind.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use toolgate_core::{
    AccessToken, EnvelopeError, GatewaySettings, GatewayStore, Owner, SensitiveField,
    ServerConfig, ServerId, StoreError, TokenRepository, ToolPermissions,
    classify_sensitive_field,
};

/// On-disk layout of the gateway state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayDocument {
    pub settings: GatewaySettings,
    pub servers: Vec<ServerConfig>,
    pub owners: Vec<Owner>,
    pub tokens: Vec<AccessToken>,
    /// Permission overlays keyed by owner id.
    pub permissions: BTreeMap<String, ToolPermissions>,
}

impl GatewayDocument {
    fn check_unique_ids(&self) -> Result<(), StoreError> {
        let mut seen = HashSet::new();
        for server in &self.servers {
            if !seen.insert(server.id.as_str()) {
                return Err(StoreError::Conflict(format!("server {}", server.id)));
            }
        }
        let mut seen = HashSet::new();
        for owner in &self.owners {
            if !seen.insert(owner.id.as_str()) {
                return Err(StoreError::Conflict(format!("owner {}", owner.id)));
            }
        }
        Ok(())
    }

    fn server(&self, server_id: &str) -> Option<&ServerConfig> {
        self.servers.iter().find(|s| s.id == server_id)
    }
}

/// A sensitive field that cannot be used as stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldIssue {
    pub server_id: ServerId,
    pub field: String,
    pub kind: FieldIssueKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldIssueKind {
    /// A well-formed encrypted envelope. This store holds plaintext only.
    Encrypted,
    /// Looks like an envelope but is too short to be one.
    Corrupt(EnvelopeError),
}

/// Find sensitive fields that hold encrypted or damaged values.
pub fn sensitive_field_issues(servers: &[ServerConfig]) -> Vec<FieldIssue> {
    let mut issues = Vec::new();
    for server in servers {
        for (field, raw) in server.sensitive_fields() {
            let kind = match classify_sensitive_field(raw) {
                Ok(SensitiveField::LegacyPlaintext) => continue,
                Ok(SensitiveField::Envelope { .. }) => FieldIssueKind::Encrypted,
                Err(e) => FieldIssueKind::Corrupt(e),
            };
            issues.push(FieldIssue {
                server_id: server.id.clone(),
                field,
                kind,
            });
        }
    }
    issues
}

/// [`GatewayStore`] and [`TokenRepository`] over a single JSON file.
pub struct JsonFileStore {
    path: PathBuf,
    doc: RwLock<GatewayDocument>,
}

impl JsonFileStore {
    /// Open the store, starting from an empty document if the file is missing.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let doc = match tokio::fs::read_to_string(&path).await {
            Ok(text) => serde_json::from_str::<GatewayDocument>(&text).map_err(|e| {
                StoreError::Internal(format!("Invalid document {}: {e}", path.display()))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No gateway document yet, starting empty");
                GatewayDocument::default()
            }
            Err(e) => {
                return Err(StoreError::Internal(format!(
                    "Failed to read {}: {e}",
                    path.display()
                )));
            }
        };

        doc.check_unique_ids()?;

        for issue in sensitive_field_issues(&doc.servers) {
            match issue.kind {
                FieldIssueKind::Encrypted => tracing::warn!(
                    server_id = %issue.server_id,
                    field = %issue.field,
                    "Field holds an encrypted value; store plaintext to use this server"
                ),
                FieldIssueKind::Corrupt(e) => tracing::warn!(
                    server_id = %issue.server_id,
                    field = %issue.field,
                    error = %e,
                    "Field holds a damaged encrypted value"
                ),
            }
        }

        tracing::debug!(
            path = %path.display(),
            servers = doc.servers.len(),
            owners = doc.owners.len(),
            tokens = doc.tokens.len(),
            "Loaded gateway document"
        );

        Ok(Self {
            path,
            doc: RwLock::new(doc),
        })
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Settings section of the document.
    pub async fn settings(&self) -> GatewaySettings {
        self.doc.read().await.settings.clone()
    }

    /// Look up a server by id.
    pub async fn server(&self, server_id: &str) -> Result<ServerConfig, StoreError> {
        self.doc
            .read()
            .await
            .server(server_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("server {server_id}")))
    }

    /// Add a server and append it to `owner_id`'s list, creating the owner
    /// when needed.
    pub async fn add_server(
        &self,
        config: ServerConfig,
        owner_id: Option<&str>,
    ) -> Result<(), StoreError> {
        self.mutate(|doc| {
            if doc.server(&config.id).is_some() {
                return Err(StoreError::Conflict(format!("server {}", config.id)));
            }
            if let Some(owner_id) = owner_id {
                match doc.owners.iter_mut().find(|o| o.id == owner_id) {
                    Some(owner) => {
                        if !owner.has_server(&config.id) {
                            owner.mcp_servers.push(config.id.clone());
                        }
                    }
                    None => doc
                        .owners
                        .push(Owner::new(owner_id, vec![config.id.clone()])),
                }
            }
            doc.servers.push(config);
            Ok(())
        })
        .await
    }

    /// Remove a server and drop it from every owner's list.
    pub async fn remove_server(&self, server_id: &str) -> Result<ServerConfig, StoreError> {
        self.mutate(|doc| {
            let index = doc
                .servers
                .iter()
                .position(|s| s.id == server_id)
                .ok_or_else(|| StoreError::NotFound(format!("server {server_id}")))?;
            for owner in &mut doc.owners {
                owner.mcp_servers.retain(|id| id != server_id);
            }
            Ok(doc.servers.remove(index))
        })
        .await
    }

    /// Apply `change` to a copy of the document, persist it, then publish it.
    async fn mutate<T: Send>(
        &self,
        change: impl FnOnce(&mut GatewayDocument) -> Result<T, StoreError> + Send,
    ) -> Result<T, StoreError> {
        let mut guard = self.doc.write().await;
        let mut next = guard.clone();
        let out = change(&mut next)?;
        self.persist(&next).await?;
        *guard = next;
        Ok(out)
    }

    async fn persist(&self, doc: &GatewayDocument) -> Result<(), StoreError> {
        let text = serde_json::to_string_pretty(doc)
            .map_err(|e| StoreError::Internal(format!("Failed to serialize document: {e}")))?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| io_error(parent, &e))?;
            }
        }

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, text)
            .await
            .map_err(|e| io_error(&tmp, &e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| io_error(&self.path, &e))?;
        Ok(())
    }
}

fn io_error(path: &Path, error: &std::io::Error) -> StoreError {
    StoreError::Internal(format!("{}: {error}", path.display()))
}

#[async_trait]
impl GatewayStore for JsonFileStore {
    async fn owner(&self, owner_id: &str) -> Result<Owner, StoreError> {
        self.doc
            .read()
            .await
            .owners
            .iter()
            .find(|o| o.id == owner_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("owner {owner_id}")))
    }

    async fn server_configs(&self, owner_id: &str) -> Result<Vec<ServerConfig>, StoreError> {
        let owner = self.owner(owner_id).await?;
        let doc = self.doc.read().await;
        let mut configs = Vec::with_capacity(owner.mcp_servers.len());
        for server_id in &owner.mcp_servers {
            match doc.server(server_id) {
                Some(config) => configs.push(config.clone()),
                None => tracing::warn!(
                    owner_id = %owner_id,
                    server_id = %server_id,
                    "Owner references an unknown server"
                ),
            }
        }
        Ok(configs)
    }

    async fn all_servers(&self) -> Result<Vec<ServerConfig>, StoreError> {
        Ok(self.doc.read().await.servers.clone())
    }

    async fn tool_permissions(&self, owner_id: &str) -> Result<ToolPermissions, StoreError> {
        Ok(self
            .doc
            .read()
            .await
            .permissions
            .get(owner_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn save_tool_permissions(
        &self,
        owner_id: &str,
        permissions: &ToolPermissions,
    ) -> Result<(), StoreError> {
        self.mutate(|doc| {
            doc.permissions
                .insert(owner_id.to_string(), permissions.clone());
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl TokenRepository for JsonFileStore {
    async fn get(&self, token_id: &str) -> Result<Option<AccessToken>, StoreError> {
        Ok(self
            .doc
            .read()
            .await
            .tokens
            .iter()
            .find(|t| t.id == token_id)
            .cloned())
    }

    async fn list(&self) -> Result<Vec<AccessToken>, StoreError> {
        Ok(self.doc.read().await.tokens.clone())
    }

    async fn save(&self, token: &AccessToken) -> Result<(), StoreError> {
        self.mutate(|doc| {
            match doc.tokens.iter_mut().find(|t| t.id == token.id) {
                Some(existing) => existing.clone_from(token),
                None => doc.tokens.push(token.clone()),
            }
            Ok(())
        })
        .await
    }

    async fn delete(&self, token_id: &str) -> Result<bool, StoreError> {
        self.mutate(|doc| {
            let before = doc.tokens.len();
            doc.tokens.retain(|t| t.id != token_id);
            Ok(doc.tokens.len() != before)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use toolgate_core::{PermissionEntry, Scope, ToolDescriptor};

    // Standard base64 of 40 bytes: IV, tag and 8 bytes of ciphertext
    const ENVELOPE: &str = "AAECAwQFBgcICQoLDA0ODxAREhMUFRYXGBkaGxwdHh8gISIjJCUmJw==";

    async fn open_in(dir: &TempDir) -> JsonFileStore {
        JsonFileStore::open(dir.path().join("gateway.json"))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_missing_file_opens_empty() {
        let dir = TempDir::new().unwrap();
        let store = open_in(&dir).await;
        assert!(store.all_servers().await.unwrap().is_empty());
        assert!(store.list().await.unwrap().is_empty());
        assert_eq!(store.settings().await, GatewaySettings::default());
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn test_server_configs_follow_owner_order() {
        let dir = TempDir::new().unwrap();
        let store = open_in(&dir).await;
        store
            .add_server(ServerConfig::local("b", "B", "node", vec![]), Some("agent"))
            .await
            .unwrap();
        store
            .add_server(ServerConfig::local("a", "A", "npx", vec![]), Some("agent"))
            .await
            .unwrap();

        let ids: Vec<_> = store
            .server_configs("agent")
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(ids, vec!["b", "a"]);

        let err = store.server_configs("nobody").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_duplicate_server_is_a_conflict() {
        let dir = TempDir::new().unwrap();
        let store = open_in(&dir).await;
        let config = ServerConfig::local("a", "A", "npx", vec![]);
        store.add_server(config.clone(), None).await.unwrap();
        let err = store.add_server(config, None).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
        assert_eq!(store.all_servers().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_state_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let store = open_in(&dir).await;
        store
            .add_server(ServerConfig::local("a", "A", "npx", vec![]), Some("agent"))
            .await
            .unwrap();
        let token = AccessToken::issue("client", vec!["a".into()], vec![Scope::Application]);
        store.save(&token).await.unwrap();

        let mut permissions = ToolPermissions::new();
        permissions.insert(
            "a",
            vec![PermissionEntry::from_tool(&ToolDescriptor::new("search"), false)],
        );
        store
            .save_tool_permissions("agent", &permissions)
            .await
            .unwrap();

        let reopened = open_in(&dir).await;
        assert_eq!(reopened.get(&token.id).await.unwrap(), Some(token));
        assert_eq!(
            reopened.tool_permissions("agent").await.unwrap(),
            permissions
        );
        assert_eq!(reopened.owner("agent").await.unwrap().mcp_servers, vec!["a"]);
        assert!(!dir.path().join("gateway.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_remove_server_detaches_owners() {
        let dir = TempDir::new().unwrap();
        let store = open_in(&dir).await;
        store
            .add_server(ServerConfig::local("a", "A", "npx", vec![]), Some("agent"))
            .await
            .unwrap();
        store
            .add_server(ServerConfig::local("b", "B", "npx", vec![]), Some("agent"))
            .await
            .unwrap();

        let removed = store.remove_server("a").await.unwrap();
        assert_eq!(removed.name, "A");
        assert_eq!(store.owner("agent").await.unwrap().mcp_servers, vec!["b"]);
        assert!(matches!(
            store.remove_server("a").await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_token_save_replaces_and_delete_reports() {
        let dir = TempDir::new().unwrap();
        let store = open_in(&dir).await;
        let mut token = AccessToken::issue("client", vec![], vec![Scope::LogAccess]);
        store.save(&token).await.unwrap();
        token.grant_server("a");
        store.save(&token).await.unwrap();

        assert_eq!(store.list().await.unwrap(), vec![token.clone()]);
        assert!(store.delete(&token.id).await.unwrap());
        assert!(!store.delete(&token.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_duplicate_ids_in_file_are_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("gateway.json");
        let server = serde_json::json!({
            "id": "a",
            "name": "A",
            "transport": {"type": "local", "command": "npx"}
        });
        let doc = serde_json::json!({"servers": [server.clone(), server]});
        std::fs::write(&path, doc.to_string()).unwrap();

        let err = JsonFileStore::open(&path).await.err().unwrap();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[test]
    fn test_sensitive_field_issues() {
        let servers = vec![
            ServerConfig::local("plain", "Plain", "npx", vec![]).with_env("KEY", "secret"),
            ServerConfig::remote_streamable("enc", "Enc", "https://example.com/mcp")
                .with_bearer_token(ENVELOPE),
            // 24 bytes: an IV and part of a tag
            ServerConfig::local("bad", "Bad", "AAECAwQFBgcICQoLDA0ODxAREhMUFRYX", vec![]),
        ];

        let issues = sensitive_field_issues(&servers);
        assert_eq!(issues.len(), 2);
        assert_eq!(issues[0].server_id, "enc");
        assert_eq!(issues[0].field, "bearer_token");
        assert_eq!(issues[0].kind, FieldIssueKind::Encrypted);
        assert_eq!(issues[1].server_id, "bad");
        assert_eq!(
            issues[1].kind,
            FieldIssueKind::Corrupt(EnvelopeError::Truncated { len: 24 })
        );
    }

    #[test]
    fn test_open_is_usable_outside_async_tests() {
        let dir = TempDir::new().unwrap();
        let store = tokio_test::block_on(open_in(&dir));
        assert!(tokio_test::block_on(store.all_servers()).unwrap().is_empty());
    }
}
