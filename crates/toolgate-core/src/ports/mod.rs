//! Port definitions (trait abstractions) for external systems.
//!
//! Ports define the interfaces that the gateway expects from infrastructure.
//! They contain no implementation details and use only domain types.
//!
//! # Design Rules
//!
//! - No HTTP or process types in any signature
//! - Store traits are minimal and owner-focused
//! - Transports are intent-based: list tools, call a tool, close

pub mod event_emitter;
pub mod gateway_error;
pub mod store;
pub mod token_repository;
pub mod transport;

pub use event_emitter::AppEventEmitter;
pub use gateway_error::{ErrorCategory, GatewayError, GatewayErrorInfo};
pub use store::{GatewayStore, StoreError};
pub use token_repository::TokenRepository;
pub use transport::{ToolArguments, ToolTransport, TransportConnector, TransportError};

#[cfg(test)]
pub use token_repository::MockTokenRepository;
