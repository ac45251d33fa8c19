//! Token-scoped access checks and grant management.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::domain::{AccessToken, Scope, ServerId};
use crate::ports::{GatewayError, StoreError, TokenRepository};

/// Answers "may this token reach server S under scope X" and manages grants.
///
/// Grant mutations are read-modify-write against the repository and are
/// serialized through one lock so concurrent grants never lose an update.
pub struct AccessGateway {
    tokens: Arc<dyn TokenRepository>,
    write_lock: Mutex<()>,
}

impl AccessGateway {
    /// Create a new gateway over a token repository.
    pub fn new(tokens: Arc<dyn TokenRepository>) -> Self {
        Self {
            tokens,
            write_lock: Mutex::new(()),
        }
    }

    /// Whether `token_id` grants `server_id` under `scope`.
    ///
    /// Unknown tokens are simply not authorized.
    pub async fn authorize(
        &self,
        token_id: &str,
        server_id: &str,
        scope: Scope,
    ) -> Result<bool, StoreError> {
        Ok(self
            .tokens
            .get(token_id)
            .await?
            .is_some_and(|token| token.allows(server_id, scope)))
    }

    /// Servers the token may reach under `scope`. Empty for unknown tokens.
    pub async fn granted_servers(
        &self,
        token_id: &str,
        scope: Scope,
    ) -> Result<Vec<ServerId>, StoreError> {
        Ok(match self.tokens.get(token_id).await? {
            Some(token) if token.scopes.contains(&scope) => token.server_ids,
            _ => Vec::new(),
        })
    }

    /// Look up a token.
    pub async fn token(&self, token_id: &str) -> Result<AccessToken, GatewayError> {
        self.tokens
            .get(token_id)
            .await?
            .ok_or_else(|| GatewayError::NotFound(format!("token {token_id}")))
    }

    /// List all tokens.
    pub async fn tokens(&self) -> Result<Vec<AccessToken>, StoreError> {
        self.tokens.list().await
    }

    /// Issue a new token with a random id.
    pub async fn issue_token(
        &self,
        owner_client_id: &str,
        server_ids: Vec<ServerId>,
        scopes: Vec<Scope>,
    ) -> Result<AccessToken, StoreError> {
        let token = AccessToken::issue(owner_client_id, server_ids, scopes);
        self.tokens.save(&token).await?;
        tracing::info!(
            owner_client_id = %owner_client_id,
            server_count = token.server_ids.len(),
            "Issued access token"
        );
        Ok(token)
    }

    /// Append a server to a token's grant list.
    pub async fn grant_server(
        &self,
        token_id: &str,
        server_id: &str,
    ) -> Result<AccessToken, GatewayError> {
        self.mutate(token_id, |token| token.grant_server(server_id))
            .await
    }

    /// Remove a server from a token's grant list.
    pub async fn revoke_server(
        &self,
        token_id: &str,
        server_id: &str,
    ) -> Result<AccessToken, GatewayError> {
        self.mutate(token_id, |token| token.revoke_server(server_id))
            .await
    }

    /// Replace a token's scope set.
    pub async fn replace_scopes(
        &self,
        token_id: &str,
        scopes: Vec<Scope>,
    ) -> Result<AccessToken, GatewayError> {
        self.mutate(token_id, move |token| {
            let before = token.scopes.clone();
            token.replace_scopes(scopes);
            token.scopes != before
        })
        .await
    }

    /// Delete a token.
    pub async fn revoke_token(&self, token_id: &str) -> Result<(), GatewayError> {
        let _guard = self.write_lock.lock().await;
        if self.tokens.delete(token_id).await? {
            tracing::info!(token_id = %token_id, "Revoked access token");
            Ok(())
        } else {
            Err(GatewayError::NotFound(format!("token {token_id}")))
        }
    }

    /// Grant a newly created server to every existing token.
    ///
    /// New servers are opt-out for already-issued tokens. Returns the tokens
    /// that changed.
    pub async fn grant_server_to_all(
        &self,
        server_id: &str,
    ) -> Result<Vec<AccessToken>, StoreError> {
        self.mutate_all(|token| token.grant_server(server_id)).await
    }

    /// Remove a deleted server from every token. Returns the tokens that changed.
    pub async fn revoke_server_from_all(
        &self,
        server_id: &str,
    ) -> Result<Vec<AccessToken>, StoreError> {
        self.mutate_all(|token| token.revoke_server(server_id)).await
    }

    async fn mutate(
        &self,
        token_id: &str,
        change: impl FnOnce(&mut AccessToken) -> bool + Send,
    ) -> Result<AccessToken, GatewayError> {
        let _guard = self.write_lock.lock().await;
        let mut token = self.token(token_id).await?;
        if change(&mut token) {
            self.tokens.save(&token).await?;
            tracing::debug!(token_id = %token_id, "Updated token grants");
        }
        Ok(token)
    }

    async fn mutate_all(
        &self,
        mut change: impl FnMut(&mut AccessToken) -> bool + Send,
    ) -> Result<Vec<AccessToken>, StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut changed = Vec::new();
        for mut token in self.tokens.list().await? {
            if change(&mut token) {
                self.tokens.save(&token).await?;
                changed.push(token);
            }
        }
        Ok(changed)
    }
}
