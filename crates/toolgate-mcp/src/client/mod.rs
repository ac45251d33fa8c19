//! MCP client over pluggable JSON-RPC channels.
//!
//! Every transport kind provides an [`RpcChannel`]; [`McpClient`] layers the
//! MCP handshake, tool listing and tool calls on top of it, so protocol
//! behavior is identical across stdio, SSE and streamable HTTP.

mod pending;
pub mod protocol;
pub mod sse;
mod sse_buffer;
pub mod stdio;
pub mod streamable;

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use toolgate_core::{
    GatewaySettings, ToolArguments, ToolDescriptor, ToolResult, ToolTransport, TransportError,
};

use protocol::{InitializeResult, ListToolsPage, ServerCapabilities};

/// Request/notify primitive implemented by each transport.
#[async_trait]
pub trait RpcChannel: Send + Sync {
    /// Send a request and wait for its result.
    async fn request(&self, method: &str, params: Option<Value>) -> Result<Value, TransportError>;

    /// Send a notification.
    async fn notify(&self, method: &str, params: Option<Value>) -> Result<(), TransportError>;

    /// Record the protocol version negotiated during initialize.
    fn set_protocol_version(&self, _version: &str) {}

    /// Tear the channel down. In-flight requests fail with `Closed`.
    async fn shutdown(&self);
}

/// Parameters of the initialize handshake.
#[derive(Debug, Clone)]
pub struct HandshakeOptions {
    pub protocol_version: String,
    pub client_name: String,
    pub timeout: Duration,
}

impl HandshakeOptions {
    pub fn from_settings(settings: &GatewaySettings) -> Self {
        Self {
            protocol_version: settings.effective_protocol_version().to_string(),
            client_name: settings.effective_client_name().to_string(),
            timeout: settings.effective_handshake_timeout(),
        }
    }
}

/// A handshaken MCP session over one channel.
pub struct McpClient<C> {
    server_id: String,
    channel: C,
    capabilities: ServerCapabilities,
}

impl<C: RpcChannel> McpClient<C> {
    /// Run the initialize handshake. The channel is shut down on failure.
    pub async fn handshake(
        server_id: &str,
        channel: C,
        options: &HandshakeOptions,
    ) -> Result<Self, TransportError> {
        let init = tokio::time::timeout(options.timeout, Self::initialize(&channel, options)).await;

        let result = match init {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                channel.shutdown().await;
                return Err(e);
            }
            Err(_) => {
                channel.shutdown().await;
                return Err(TransportError::Timeout);
            }
        };

        tracing::debug!(
            server_id = %server_id,
            protocol_version = %result.protocol_version,
            server_name = ?result.server_info.as_ref().map(|i| &i.name),
            server_version = ?result.server_info.as_ref().and_then(|i| i.version.as_ref()),
            "MCP session initialized"
        );

        Ok(Self {
            server_id: server_id.to_string(),
            channel,
            capabilities: result.capabilities,
        })
    }

    async fn initialize(
        channel: &C,
        options: &HandshakeOptions,
    ) -> Result<InitializeResult, TransportError> {
        let params = json!({
            "protocolVersion": options.protocol_version,
            "clientInfo": {
                "name": options.client_name,
                "version": env!("CARGO_PKG_VERSION")
            },
            "capabilities": {}
        });

        let value = channel.request("initialize", Some(params)).await?;
        let result: InitializeResult = serde_json::from_value(value)?;
        channel.set_protocol_version(&result.protocol_version);

        // Send initialized notification
        channel.notify("notifications/initialized", None).await?;

        Ok(result)
    }
}

#[async_trait]
impl<C: RpcChannel> ToolTransport for McpClient<C> {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, TransportError> {
        // Check if server supports tools
        if self.capabilities.tools.is_none() {
            return Ok(Vec::new());
        }

        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;
        let mut seen_cursors = HashSet::new();

        loop {
            let params = cursor.as_ref().map(|c| json!({ "cursor": c }));
            let value = self.channel.request("tools/list", params).await?;
            let page: ListToolsPage = serde_json::from_value(value)?;
            tools.extend(page.tools.into_iter().map(ToolDescriptor::from));

            match page.next_cursor {
                Some(next) if seen_cursors.insert(next.clone()) => cursor = Some(next),
                Some(next) => {
                    tracing::warn!(
                        server_id = %self.server_id,
                        cursor = %next,
                        "Repeated tools/list cursor"
                    );
                    break;
                }
                None => break,
            }
        }

        Ok(tools)
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: ToolArguments,
    ) -> Result<ToolResult, TransportError> {
        let params = json!({
            "name": name,
            "arguments": arguments
        });

        let result = self.channel.request("tools/call", Some(params)).await?;

        // MCP returns content array with text/image items
        let content = result.get("content").cloned().unwrap_or_else(|| json!([]));
        let is_error = result
            .get("isError")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        if is_error {
            let message = content
                .as_array()
                .map(|items| {
                    items
                        .iter()
                        .filter_map(|item| item.get("text").and_then(Value::as_str))
                        .collect::<Vec<_>>()
                        .join("\n")
                })
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| "Unknown error".to_string());

            Ok(ToolResult::error(message))
        } else {
            Ok(ToolResult::success(content))
        }
    }

    async fn close(&self) {
        self.channel.shutdown().await;
    }
}
