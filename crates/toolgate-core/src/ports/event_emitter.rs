//! Event emitter trait for broadcasting gateway events.
//!
//! Implementations handle transport details (channels, SSE, logs, etc.).

use crate::events::AppEvent;

/// Trait for emitting gateway events.
///
/// Each outer layer supplies its own implementation; the CLI logs them.
pub trait AppEventEmitter: Send + Sync {
    /// Emit an event. Must not block.
    fn emit(&self, event: AppEvent);
}
