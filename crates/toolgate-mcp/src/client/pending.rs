//! Routing of responses to in-flight requests by id.
//!
//! Used by transports where responses arrive on a shared inbound stream
//! (stdio stdout, the legacy SSE event stream).

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use toolgate_core::TransportError;

use super::protocol::JsonRpcResponse;

/// In-flight requests waiting for a response.
pub struct PendingRequests {
    next_id: AtomicU64,
    waiting: Mutex<HashMap<u64, oneshot::Sender<JsonRpcResponse>>>,
    closed: CancellationToken,
}

impl PendingRequests {
    pub fn new(closed: CancellationToken) -> Self {
        Self {
            next_id: AtomicU64::new(1),
            waiting: Mutex::new(HashMap::new()),
            closed,
        }
    }

    /// Allocate an id and register a waiter for it.
    pub fn register(&self) -> Result<(u64, oneshot::Receiver<JsonRpcResponse>), TransportError> {
        if self.closed.is_cancelled() {
            return Err(TransportError::Closed);
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        self.lock().insert(id, tx);
        Ok((id, rx))
    }

    /// Deliver a response to its waiter. Unknown ids are logged and dropped.
    pub fn complete(&self, response: JsonRpcResponse) {
        let Some(id) = response.response_id() else {
            tracing::debug!(method = ?response.method, "Ignoring server-initiated message");
            return;
        };
        match self.lock().remove(&id) {
            Some(tx) => {
                let _ = tx.send(response);
            }
            None => tracing::debug!(id, "Response for unknown request id"),
        }
    }

    /// Forget a waiter (e.g. after its send failed).
    pub fn cancel(&self, id: u64) {
        self.lock().remove(&id);
    }

    /// Wait for the response to `id`, failing with `Closed` when the
    /// transport shuts down first.
    pub async fn wait(
        &self,
        id: u64,
        rx: oneshot::Receiver<JsonRpcResponse>,
    ) -> Result<JsonRpcResponse, TransportError> {
        tokio::select! {
            response = rx => response.map_err(|_| TransportError::Closed),
            () = self.closed.cancelled() => {
                self.cancel(id);
                Err(TransportError::Closed)
            }
        }
    }

    /// Fail every waiter. Dropping the senders wakes them with `Closed`.
    pub fn fail_all(&self) {
        self.closed.cancel();
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<u64, oneshot::Sender<JsonRpcResponse>>> {
        // A poisoned map only means a waiter panicked; the map itself is intact.
        self.waiting
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}
