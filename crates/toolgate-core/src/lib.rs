//! Core domain types and port definitions for toolgate.
//!
//! This crate holds everything the gateway reasons about without touching
//! the outside world: server configurations, the tool catalog model, the
//! permission overlay data and its reconciliation rules, access tokens and
//! scopes, settings, events, and the traits (ports) that adapters implement.
//!
//! Transports, connection management and persistence live in adapter crates.

#![deny(unused_crate_dependencies)]

pub mod domain;
pub mod events;
pub mod ports;
pub mod services;
pub mod settings;

// Re-export commonly used types for convenience
pub use domain::{
    AccessToken, ConnectionStatus, EnvelopeError, InputParam, Owner, PermissionEntry, Scope,
    SensitiveField, ServerConfig, ServerId, ServerRuntimeInfo, ToolDescriptor, ToolPermissions,
    ToolResult, TransportKind, classify_sensitive_field, substitute_placeholders,
};
pub use events::{AppEvent, ServerSummary};
pub use ports::{
    AppEventEmitter, ErrorCategory, GatewayError, GatewayErrorInfo, GatewayStore,
    StoreError, TokenRepository, ToolArguments, ToolTransport, TransportConnector,
    TransportError,
};
pub use services::AccessGateway;
pub use settings::{
    DEFAULT_HANDSHAKE_TIMEOUT_SECS, DEFAULT_MAX_CONNECT_ATTEMPTS, DEFAULT_PROTOCOL_VERSION,
    DEFAULT_RETRY_BASE_DELAY_MS, GatewaySettings, SettingsError, SettingsUpdate,
    validate_settings,
};

#[cfg(test)]
use tokio_test as _;
