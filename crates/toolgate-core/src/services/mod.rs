//! Core services that depend only on ports.

mod access_gateway;

pub use access_gateway::AccessGateway;
