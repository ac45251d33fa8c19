//! Access token persistence.

use async_trait::async_trait;

use super::StoreError;
use crate::domain::AccessToken;

/// Repository trait for access tokens.
///
/// Tokens are looked up by their opaque id. Implementations must persist
/// grant changes made through `save` atomically per token.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TokenRepository: Send + Sync {
    /// Get a token by id. Returns `None` for unknown ids.
    async fn get(&self, token_id: &str) -> Result<Option<AccessToken>, StoreError>;

    /// List all tokens.
    async fn list(&self) -> Result<Vec<AccessToken>, StoreError>;

    /// Insert or replace a token.
    async fn save(&self, token: &AccessToken) -> Result<(), StoreError>;

    /// Delete a token. Returns `false` if it did not exist.
    async fn delete(&self, token_id: &str) -> Result<bool, StoreError>;
}
