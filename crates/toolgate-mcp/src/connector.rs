//! Builds live transports from server configurations.

use std::sync::Arc;

use async_trait::async_trait;
use toolgate_core::{
    GatewaySettings, ServerConfig, ToolTransport, TransportConnector, TransportError,
    TransportKind,
};

use crate::client::sse::SseChannel;
use crate::client::stdio::StdioChannel;
use crate::client::streamable::StreamableHttpChannel;
use crate::client::{HandshakeOptions, McpClient};
use crate::env::{EnvProvider, SystemEnv, merged_env};

/// [`TransportConnector`] speaking MCP over stdio, SSE and streamable HTTP.
///
/// One connect is one attempt; retries are the caller's concern.
pub struct McpConnector {
    http: reqwest::Client,
    options: HandshakeOptions,
    env: Arc<dyn EnvProvider>,
}

impl McpConnector {
    /// Create a connector using the process environment.
    pub fn new(settings: &GatewaySettings) -> Self {
        Self::with_env(settings, Arc::new(SystemEnv))
    }

    /// Create a connector with an injected environment.
    pub fn with_env(settings: &GatewaySettings, env: Arc<dyn EnvProvider>) -> Self {
        Self {
            http: reqwest::Client::new(),
            options: HandshakeOptions::from_settings(settings),
            env,
        }
    }

    async fn connect_sse(
        &self,
        server_id: &str,
        url: &str,
        bearer_token: Option<&str>,
    ) -> Result<Arc<dyn ToolTransport>, TransportError> {
        // The endpoint wait counts against the handshake budget too
        let channel = tokio::time::timeout(
            self.options.timeout,
            SseChannel::connect(server_id, self.http.clone(), url, bearer_token),
        )
        .await
        .map_err(|_| TransportError::Timeout)??;

        let client = McpClient::handshake(server_id, channel, &self.options).await?;
        Ok(Arc::new(client))
    }
}

#[async_trait]
impl TransportConnector for McpConnector {
    async fn connect(
        &self,
        config: &ServerConfig,
    ) -> Result<Arc<dyn ToolTransport>, TransportError> {
        config.validate().map_err(TransportError::Config)?;
        let transport = config.resolved_transport().map_err(TransportError::Config)?;

        tracing::debug!(
            server_id = %config.id,
            transport = transport.label(),
            "Connecting to MCP server"
        );

        match transport {
            TransportKind::Local { command, args, env } => {
                let command =
                    command.ok_or_else(|| TransportError::Config("missing command".to_string()))?;
                let env = merged_env(self.env.as_ref(), &env);
                let channel = StdioChannel::spawn(&config.id, &command, &args, &env)?;
                let client = McpClient::handshake(&config.id, channel, &self.options).await?;
                Ok(Arc::new(client))
            }
            TransportKind::RemoteSse { url, bearer_token } => {
                let url = url.ok_or_else(|| TransportError::Config("missing url".to_string()))?;
                self.connect_sse(&config.id, &url, bearer_token.as_deref())
                    .await
            }
            TransportKind::RemoteStreamable { url, bearer_token } => {
                let url = url.ok_or_else(|| TransportError::Config("missing url".to_string()))?;
                let channel = StreamableHttpChannel::new(
                    self.http.clone(),
                    &url,
                    bearer_token.as_deref(),
                    self.options.timeout,
                )?;
                let client = McpClient::handshake(&config.id, channel, &self.options).await?;
                Ok(Arc::new(client))
            }
        }
    }
}
