//! Event emitter that writes gateway events to the log.

use toolgate_core::{AppEvent, AppEventEmitter};

/// Logs every event at `info` with its JSON payload.
#[derive(Debug, Clone, Default)]
pub struct LogEmitter;

impl AppEventEmitter for LogEmitter {
    fn emit(&self, event: AppEvent) {
        match serde_json::to_string(&event) {
            Ok(payload) => tracing::info!(event = event.event_name(), %payload, "Gateway event"),
            Err(e) => tracing::warn!(event = event.event_name(), error = %e, "Unserializable event"),
        }
    }
}
