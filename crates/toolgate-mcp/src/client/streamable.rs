//! Streamable HTTP channel.
//!
//! Each message is its own `POST`. The server answers with either a JSON
//! body or an event stream carrying the response; the session id it hands
//! out on initialize is echoed on every later request and the session is
//! ended with a `DELETE` on shutdown.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::{StatusCode, Url};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use toolgate_core::TransportError;

use super::RpcChannel;
use super::protocol::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};
use super::sse_buffer::{SseDecoder, is_event_stream_content_type};
use crate::http::{
    MCP_SESSION_ID_HEADER, apply_session_header, apply_streamable_http_client_post_headers,
    apply_streamable_http_protocol_version_header, http_error, with_bearer,
};

#[derive(Default)]
struct SessionState {
    session_id: Option<String>,
    protocol_version: Option<String>,
}

/// Channel to a remote server over streamable HTTP.
pub struct StreamableHttpChannel {
    http: reqwest::Client,
    url: Url,
    bearer_token: Option<String>,
    session: Mutex<SessionState>,
    next_id: AtomicU64,
    cancel: CancellationToken,
    /// Upper bound on the session `DELETE` sent by `shutdown`.
    close_timeout: Duration,
}

impl StreamableHttpChannel {
    /// Create the channel. No request is made until the handshake.
    pub fn new(
        http: reqwest::Client,
        url: &str,
        bearer_token: Option<&str>,
        close_timeout: Duration,
    ) -> Result<Self, TransportError> {
        let url =
            Url::parse(url).map_err(|e| TransportError::Config(format!("Invalid url {url}: {e}")))?;
        Ok(Self {
            http,
            url,
            bearer_token: bearer_token.map(ToString::to_string),
            session: Mutex::new(SessionState::default()),
            next_id: AtomicU64::new(1),
            cancel: CancellationToken::new(),
            close_timeout,
        })
    }

    fn session(&self) -> std::sync::MutexGuard<'_, SessionState> {
        self.session
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn build(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let (session_id, protocol_version) = {
            let session = self.session();
            (session.session_id.clone(), session.protocol_version.clone())
        };
        let request = with_bearer(request, self.bearer_token.as_deref());
        let request = apply_session_header(request, session_id.as_deref());
        apply_streamable_http_protocol_version_header(request, protocol_version.as_deref())
    }

    async fn post(&self, body: String) -> Result<reqwest::Response, TransportError> {
        if self.cancel.is_cancelled() {
            return Err(TransportError::Closed);
        }

        let request = self.build(apply_streamable_http_client_post_headers(
            self.http.post(self.url.clone()).body(body),
        ));

        let response = tokio::select! {
            () = self.cancel.cancelled() => return Err(TransportError::Closed),
            response = request.send() => response.map_err(http_error)?,
        };

        if let Some(session_id) = response
            .headers()
            .get(MCP_SESSION_ID_HEADER)
            .and_then(|v| v.to_str().ok())
        {
            self.session().session_id = Some(session_id.to_string());
        }

        let status = response.status();
        if status == StatusCode::NOT_FOUND && self.session().session_id.is_some() {
            return Err(TransportError::Http("MCP session expired".to_string()));
        }
        if !status.is_success() {
            return Err(TransportError::Http(format!("POST returned {status}")));
        }

        Ok(response)
    }

    /// Read the response to `id` from an event-stream body.
    async fn read_event_stream(
        &self,
        response: reqwest::Response,
        id: u64,
    ) -> Result<JsonRpcResponse, TransportError> {
        let mut stream = response.bytes_stream();
        let mut decoder = SseDecoder::default();

        loop {
            let chunk = tokio::select! {
                () = self.cancel.cancelled() => return Err(TransportError::Closed),
                chunk = stream.next() => chunk,
            };
            let ended = chunk.is_none();
            let events = match chunk {
                Some(chunk) => decoder.push(&chunk.map_err(http_error)?),
                None => decoder.finish(),
            };

            for event in events.into_iter().filter(|e| e.event == "message") {
                let response: JsonRpcResponse = serde_json::from_str(&event.data)?;
                if response.response_id() == Some(id) {
                    return Ok(response);
                }
                tracing::debug!(method = ?response.method, "Skipping unrelated stream message");
            }

            // A cut-off stream is a broken exchange, not a backend answer
            if ended {
                return Err(TransportError::Io(
                    "event stream ended without a response".to_string(),
                ));
            }
        }
    }
}

#[async_trait]
impl RpcChannel for StreamableHttpChannel {
    async fn request(&self, method: &str, params: Option<Value>) -> Result<Value, TransportError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let body = serde_json::to_string(&JsonRpcRequest::new(id, method, params))?;
        let response = self.post(body).await?;

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        let response = if is_event_stream_content_type(&content_type) {
            self.read_event_stream(response, id).await?
        } else {
            let bytes = tokio::select! {
                () = self.cancel.cancelled() => return Err(TransportError::Closed),
                bytes = response.bytes() => bytes.map_err(http_error)?,
            };
            serde_json::from_slice(&bytes)?
        };

        response.into_result()
    }

    async fn notify(&self, method: &str, params: Option<Value>) -> Result<(), TransportError> {
        let body = serde_json::to_string(&JsonRpcNotification::new(method, params))?;
        self.post(body).await.map(|_| ())
    }

    fn set_protocol_version(&self, version: &str) {
        self.session().protocol_version = Some(version.to_string());
    }

    async fn shutdown(&self) {
        if self.cancel.is_cancelled() {
            return;
        }
        self.cancel.cancel();

        let has_session = self.session().session_id.is_some();
        if has_session {
            // Best-effort session teardown
            let request = self.build(self.http.delete(self.url.clone()));
            match tokio::time::timeout(self.close_timeout, request.send()).await {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => tracing::debug!(error = %e, "Failed to end MCP session"),
                Err(_) => tracing::debug!(
                    timeout_ms = u64::try_from(self.close_timeout.as_millis()).unwrap_or(u64::MAX),
                    "Timed out ending MCP session"
                ),
            }
        }
    }
}
