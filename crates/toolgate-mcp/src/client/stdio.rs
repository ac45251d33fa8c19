//! Local subprocess channel: newline-delimited JSON-RPC over stdio.

use std::collections::BTreeMap;
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use toolgate_core::TransportError;

use super::RpcChannel;
use super::pending::PendingRequests;
use super::protocol::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};

/// Channel to a spawned server process.
///
/// A reader task routes stdout lines to waiting requests; stderr is drained
/// into debug logs. The child is killed on shutdown and on drop.
pub struct StdioChannel {
    stdin: Mutex<Option<ChildStdin>>,
    child: Mutex<Option<Child>>,
    pending: Arc<PendingRequests>,
    cancel: CancellationToken,
}

impl StdioChannel {
    /// Spawn `command` with exactly the given environment.
    ///
    /// `env` is the complete child environment; the caller merges the
    /// inherited environment in beforehand.
    pub fn spawn(
        server_id: &str,
        command: &str,
        args: &[String],
        env: &BTreeMap<String, String>,
    ) -> Result<Self, TransportError> {
        let mut child = Command::new(command)
            .args(args)
            .env_clear()
            .envs(env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                TransportError::Spawn(format!("Failed to spawn '{command}': {e}\nArgs: {args:?}"))
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| TransportError::Spawn("Failed to get stdin".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| TransportError::Spawn("Failed to get stdout".to_string()))?;

        let cancel = CancellationToken::new();
        let pending = Arc::new(PendingRequests::new(cancel.clone()));

        {
            let pending = Arc::clone(&pending);
            let cancel = cancel.clone();
            let server_id = server_id.to_string();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stdout).lines();
                loop {
                    let line = tokio::select! {
                        () = cancel.cancelled() => break,
                        line = lines.next_line() => line,
                    };
                    match line {
                        Ok(Some(line)) => {
                            let trimmed = line.trim();
                            if trimmed.is_empty() {
                                continue;
                            }
                            match serde_json::from_str::<JsonRpcResponse>(trimmed) {
                                Ok(response) => pending.complete(response),
                                // Not valid JSON-RPC, might be launcher output, skip it
                                Err(_) => tracing::debug!(
                                    server_id = %server_id,
                                    line = trimmed,
                                    "Skipping non-JSON-RPC output"
                                ),
                            }
                        }
                        Ok(None) => {
                            tracing::debug!(server_id = %server_id, "Server closed stdout");
                            break;
                        }
                        Err(e) => {
                            tracing::debug!(server_id = %server_id, error = %e, "Stdout read failed");
                            break;
                        }
                    }
                }
                pending.fail_all();
            });
        }

        if let Some(stderr) = child.stderr.take() {
            let server_id = server_id.to_string();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    tracing::debug!(server_id = %server_id, stderr = %line, "Server stderr");
                }
            });
        }

        Ok(Self {
            stdin: Mutex::new(Some(stdin)),
            child: Mutex::new(Some(child)),
            pending,
            cancel,
        })
    }

    async fn write_line(&self, line: String) -> Result<(), TransportError> {
        let mut guard = self.stdin.lock().await;
        let stdin = guard.as_mut().ok_or(TransportError::Closed)?;
        stdin.write_all(line.as_bytes()).await?;
        stdin.write_all(b"\n").await?;
        stdin.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl RpcChannel for StdioChannel {
    async fn request(&self, method: &str, params: Option<Value>) -> Result<Value, TransportError> {
        let (id, rx) = self.pending.register()?;
        let line = serde_json::to_string(&JsonRpcRequest::new(id, method, params))?;

        if let Err(e) = self.write_line(line).await {
            self.pending.cancel(id);
            return Err(e);
        }

        self.pending.wait(id, rx).await?.into_result()
    }

    async fn notify(&self, method: &str, params: Option<Value>) -> Result<(), TransportError> {
        if self.cancel.is_cancelled() {
            return Err(TransportError::Closed);
        }
        let line = serde_json::to_string(&JsonRpcNotification::new(method, params))?;
        self.write_line(line).await
    }

    async fn shutdown(&self) {
        self.pending.fail_all();

        // Drop stdin to signal EOF
        self.stdin.lock().await.take();

        // Kill the process if still running
        if let Some(mut child) = self.child.lock().await.take() {
            let _ = child.kill().await;
        }
    }
}
