//! Legacy HTTP+SSE channel.
//!
//! The client holds a `GET` event stream open. The server first sends an
//! `endpoint` event naming the URL to `POST` messages to; responses then
//! arrive as `message` events on the stream and are routed by id.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Url;
use reqwest::header::ACCEPT;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use toolgate_core::TransportError;

use super::RpcChannel;
use super::pending::PendingRequests;
use super::protocol::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};
use super::sse_buffer::SseDecoder;
use crate::http::{http_error, with_bearer};

/// Channel to a remote server over the HTTP+SSE transport.
pub struct SseChannel {
    http: reqwest::Client,
    endpoint: Url,
    bearer_token: Option<String>,
    pending: Arc<PendingRequests>,
    cancel: CancellationToken,
}

impl SseChannel {
    /// Open the event stream and wait for the `endpoint` event.
    pub async fn connect(
        server_id: &str,
        http: reqwest::Client,
        url: &str,
        bearer_token: Option<&str>,
    ) -> Result<Self, TransportError> {
        let base =
            Url::parse(url).map_err(|e| TransportError::Config(format!("Invalid url {url}: {e}")))?;

        let request = with_bearer(
            http.get(base.clone()).header(ACCEPT, "text/event-stream"),
            bearer_token,
        );
        let response = request.send().await.map_err(http_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Http(format!(
                "SSE stream request returned {status}"
            )));
        }

        let mut stream = response.bytes_stream();
        let mut decoder = SseDecoder::default();

        let endpoint = loop {
            let chunk = stream
                .next()
                .await
                .ok_or_else(|| {
                    TransportError::Protocol("SSE stream ended before endpoint event".to_string())
                })?
                .map_err(http_error)?;

            if let Some(event) = decoder
                .push(&chunk)
                .into_iter()
                .find(|e| e.event == "endpoint")
            {
                break base.join(event.data.trim()).map_err(|e| {
                    TransportError::Protocol(format!("Invalid endpoint '{}': {e}", event.data))
                })?;
            }
        };

        tracing::debug!(server_id = %server_id, endpoint = %endpoint, "SSE endpoint received");

        let cancel = CancellationToken::new();
        let pending = Arc::new(PendingRequests::new(cancel.clone()));

        {
            let pending = Arc::clone(&pending);
            let cancel = cancel.clone();
            let server_id = server_id.to_string();
            tokio::spawn(async move {
                loop {
                    let chunk = tokio::select! {
                        () = cancel.cancelled() => break,
                        chunk = stream.next() => chunk,
                    };
                    let events = match chunk {
                        Some(Ok(bytes)) => decoder.push(&bytes),
                        Some(Err(e)) => {
                            tracing::debug!(server_id = %server_id, error = %e, "SSE stream failed");
                            break;
                        }
                        None => {
                            tracing::debug!(server_id = %server_id, "SSE stream ended");
                            break;
                        }
                    };
                    for event in events.into_iter().filter(|e| e.event == "message") {
                        match serde_json::from_str::<JsonRpcResponse>(&event.data) {
                            Ok(response) => pending.complete(response),
                            Err(e) => tracing::debug!(
                                server_id = %server_id,
                                error = %e,
                                "Skipping malformed SSE message"
                            ),
                        }
                    }
                }
                pending.fail_all();
            });
        }

        Ok(Self {
            http,
            endpoint,
            bearer_token: bearer_token.map(ToString::to_string),
            pending,
            cancel,
        })
    }

    async fn post(&self, body: String) -> Result<(), TransportError> {
        let request = with_bearer(
            self.http
                .post(self.endpoint.clone())
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(body),
            self.bearer_token.as_deref(),
        );

        let response = tokio::select! {
            () = self.cancel.cancelled() => return Err(TransportError::Closed),
            response = request.send() => response.map_err(http_error)?,
        };

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(TransportError::Http(format!("POST to endpoint returned {status}")))
        }
    }
}

#[async_trait]
impl RpcChannel for SseChannel {
    async fn request(&self, method: &str, params: Option<Value>) -> Result<Value, TransportError> {
        let (id, rx) = self.pending.register()?;
        let body = serde_json::to_string(&JsonRpcRequest::new(id, method, params))?;

        if let Err(e) = self.post(body).await {
            self.pending.cancel(id);
            return Err(e);
        }

        self.pending.wait(id, rx).await?.into_result()
    }

    async fn notify(&self, method: &str, params: Option<Value>) -> Result<(), TransportError> {
        if self.cancel.is_cancelled() {
            return Err(TransportError::Closed);
        }
        let body = serde_json::to_string(&JsonRpcNotification::new(method, params))?;
        self.post(body).await
    }

    async fn shutdown(&self) {
        self.pending.fail_all();
    }
}
