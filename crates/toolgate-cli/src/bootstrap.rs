//! CLI bootstrap - the composition root.
//!
//! This module is the ONLY place where infrastructure is wired together
//! for the CLI adapter:
//! - JSON-file store for servers, owners, overlays and tokens
//! - MCP connector for the three transports (via toolgate-mcp)
//! - Gateway service (via toolgate-mcp)
//!
//! Command handlers receive the composed [`CliContext`] and delegate to it.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use toolgate_core::{
    GatewaySettings, GatewayStore, TokenRepository, TransportConnector, validate_settings,
};
use toolgate_mcp::{GatewayService, McpConnector};

use crate::emitter::LogEmitter;
use crate::error::CliError;
use crate::store::JsonFileStore;

/// Bootstrap configuration for the CLI.
#[derive(Debug, Clone)]
pub struct CliConfig {
    /// Path to the gateway document.
    pub config_path: PathBuf,
}

impl CliConfig {
    /// Use `path` if given, otherwise the platform default.
    pub fn resolve(path: Option<PathBuf>) -> Result<Self, CliError> {
        let config_path = match path {
            Some(path) => path,
            None => default_config_path()?,
        };
        Ok(Self { config_path })
    }
}

/// `<data dir>/toolgate/gateway.json`.
pub fn default_config_path() -> Result<PathBuf, CliError> {
    let data_dir = dirs::data_dir()
        .ok_or_else(|| CliError::Config("Cannot determine system data directory".to_string()))?;
    Ok(data_dir.join("toolgate").join("gateway.json"))
}

/// Fully composed application context for CLI commands.
pub struct CliContext {
    /// The gateway facade.
    pub service: Arc<GatewayService>,
    /// Backing store, for configuration edits the service does not own.
    pub store: Arc<JsonFileStore>,
}

impl CliContext {
    /// Access the gateway service.
    pub fn service(&self) -> &GatewayService {
        &self.service
    }

    /// Access the store.
    pub fn store(&self) -> &JsonFileStore {
        &self.store
    }
}

/// Bootstrap the CLI application.
///
/// Opens the gateway document, validates its settings and wires the
/// service with an MCP connector and a log emitter.
pub async fn bootstrap(config: CliConfig) -> Result<CliContext> {
    let store = Arc::new(
        JsonFileStore::open(&config.config_path)
            .await
            .map_err(CliError::from)?,
    );

    let settings = store.settings().await;
    validate_settings(&settings).map_err(CliError::from)?;

    let connector: Arc<dyn TransportConnector> = Arc::new(McpConnector::new(&settings));
    Ok(bootstrap_with(store, connector, &settings))
}

/// Bootstrap with a custom connector (for testing).
pub fn bootstrap_with(
    store: Arc<JsonFileStore>,
    connector: Arc<dyn TransportConnector>,
    settings: &GatewaySettings,
) -> CliContext {
    let service = Arc::new(GatewayService::new(
        Arc::clone(&store) as Arc<dyn GatewayStore>,
        Arc::clone(&store) as Arc<dyn TokenRepository>,
        connector,
        settings,
        Arc::new(LogEmitter),
    ));
    CliContext { service, store }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_path_wins() {
        let config = CliConfig::resolve(Some(PathBuf::from("/tmp/gw.json"))).unwrap();
        assert_eq!(config.config_path, PathBuf::from("/tmp/gw.json"));
    }

    #[tokio::test]
    async fn test_invalid_settings_fail_bootstrap() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gateway.json");
        std::fs::write(&path, r#"{"settings":{"max_connect_attempts":0}}"#).unwrap();

        let err = bootstrap(CliConfig::resolve(Some(path)).unwrap())
            .await
            .err()
            .unwrap();
        let cli = err.downcast_ref::<CliError>().unwrap();
        assert_eq!(cli.exit_code(), 78);
    }

    #[tokio::test]
    async fn test_bootstrap_on_empty_document() {
        let dir = tempfile::tempdir().unwrap();
        let config = CliConfig::resolve(Some(dir.path().join("gateway.json"))).unwrap();
        let ctx = bootstrap(config).await.unwrap();
        assert!(ctx.service().access().tokens().await.unwrap().is_empty());
    }
}
