//! Command handlers that delegate to the gateway service.
//!
//! Handlers follow the canonical pattern:
//! - Signature: `pub async fn execute(ctx: &CliContext, ...) -> Result<()>`
//! - Thin wrappers that:
//!   1. Parse/validate CLI-specific input
//!   2. Call `GatewayService` methods
//!   3. Format output for the terminal
//!
//! Handlers should NOT contain gateway logic or touch transports.

pub mod call;
pub mod lifecycle;
pub mod permissions;
pub mod run;
pub mod servers;
pub mod tokens;
pub mod tools;
