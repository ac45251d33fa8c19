//! Domain types for the gateway.
//!
//! These types represent backends, catalogs, permissions and credentials,
//! independent of any infrastructure concerns (transports, storage, etc.).
//!
//! # Design
//!
//! - `ServerConfig` - Identity and connection recipe for one backend
//! - `TransportKind` - Closed union of the supported transports
//! - `ConnectionStatus` - Runtime state of one backend connection
//! - `ToolDescriptor` / `ToolResult` - Live catalog entries and call results
//! - `ToolPermissions` - Per-owner enable/disable overlay
//! - `AccessToken` / `Scope` - Opaque credentials and their grants
//! - `Owner` - The entity that configures servers and holds an overlay

mod owner;
mod permission;
mod secret;
mod server;
mod status;
mod token;
mod tool;

pub use owner::Owner;
pub use permission::{PermissionEntry, ToolPermissions};
pub use secret::{
    AUTH_TAG_LEN, EnvelopeError, IV_LEN, SensitiveField, classify_sensitive_field,
};
pub use server::{InputParam, ServerConfig, ServerId, TransportKind, substitute_placeholders};
pub use status::{ConnectionStatus, ServerRuntimeInfo};
pub use token::{AccessToken, Scope};
pub use tool::{ToolDescriptor, ToolResult};
