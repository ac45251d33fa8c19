//! Backend connections for toolgate.
//!
//! This crate owns everything that talks to tool servers or holds runtime
//! state about them:
//!
//! - [`McpConnector`] builds live MCP sessions over stdio, HTTP+SSE and
//!   streamable HTTP.
//! - [`ConnectionManager`] keeps one connection per server, retrying with
//!   [`RetryPolicy`] and sharing in-flight connects between callers.
//! - [`ToolCatalogAggregator`] merges an owner's catalogs and resolves tool
//!   names first-match in configuration order.
//! - [`PermissionOverlay`] keeps per-owner enable flags in step with the
//!   live catalogs.
//! - [`GatewayService`] is the facade the outer layer calls.

#![deny(unsafe_code)]
#![deny(unused_crate_dependencies)]

pub mod aggregator;
pub(crate) mod client;
pub mod connector;
pub mod env;
pub(crate) mod http;
pub mod manager;
pub mod permissions;
pub mod retry;
pub mod service;

#[cfg(test)]
mod test_utils;

pub use aggregator::{ServerCatalog, ToolCatalogAggregator};
pub use client::HandshakeOptions;
pub use connector::McpConnector;
pub use env::{EnvProvider, SystemEnv};
pub use manager::ConnectionManager;
pub use permissions::{PermissionOverlay, SyncReport};
pub use retry::RetryPolicy;
pub use service::{GatewayService, ServerInfo};

// Used by the integration tests only
#[cfg(test)]
use pretty_assertions as _;
#[cfg(test)]
use wiremock as _;
