//! Configuration store trait and error types.
//!
//! The store owns server configurations, owners and their persisted
//! permission overlays. The gateway only reads configs and writes overlays.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{Owner, ServerConfig, ToolPermissions};

/// Domain-specific errors for store operations.
///
/// This error type abstracts away storage implementation details.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The requested record was not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A record with the same identity already exists.
    #[error("Already exists: {0}")]
    Conflict(String),

    /// Storage backend error (filesystem, serialization, etc.).
    #[error("Storage error: {0}")]
    Internal(String),
}

/// Read/write interface to the configuration collaborator.
///
/// # Design Rules
///
/// - `server_configs` returns servers in the owner's configured order
/// - Sensitive fields arrive already decrypted
/// - `save_tool_permissions` replaces the owner's overlay wholesale
#[async_trait]
pub trait GatewayStore: Send + Sync {
    /// Get an owner by id.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the owner does not exist
    async fn owner(&self, owner_id: &str) -> Result<Owner, StoreError>;

    /// Server configurations for an owner, in configuration order.
    async fn server_configs(&self, owner_id: &str) -> Result<Vec<ServerConfig>, StoreError>;

    /// Every configured server, regardless of owner.
    async fn all_servers(&self) -> Result<Vec<ServerConfig>, StoreError>;

    /// The owner's persisted permission overlay (empty if never synchronized).
    async fn tool_permissions(&self, owner_id: &str) -> Result<ToolPermissions, StoreError>;

    /// Replace the owner's persisted permission overlay.
    async fn save_tool_permissions(
        &self,
        owner_id: &str,
        permissions: &ToolPermissions,
    ) -> Result<(), StoreError>;
}
