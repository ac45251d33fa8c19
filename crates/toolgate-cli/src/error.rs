//! CLI-specific error types and mappings.
//!
//! Gateway and store errors are folded into [`CliError`] so every failure
//! leaves the process with a sysexits-style exit code.

use thiserror::Error;
use toolgate_core::{ErrorCategory, GatewayError, SettingsError, StoreError};

/// CLI-specific error type.
#[derive(Debug, Error)]
pub enum CliError {
    /// Gateway failure that has no better category.
    #[error("{0}")]
    Gateway(String),

    /// Argument parsing error.
    #[error("Invalid arguments: {0}")]
    Arguments(String),

    /// IO error (file not found, permission denied, etc.).
    #[error("IO error: {0}")]
    Io(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Storage error.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Unknown server, tool, owner or token.
    #[error("{0}")]
    NotFound(String),

    /// Token or permission check failed.
    #[error("{0}")]
    Denied(String),

    /// A backend could not be reached.
    #[error("{0}")]
    Unavailable(String),
}

impl CliError {
    /// Map error to appropriate exit code.
    ///
    /// Exit codes follow Unix conventions:
    /// - 0: Success
    /// - 1: General error
    /// - 2: Misuse of shell command (invalid arguments)
    /// - 64-78: Reserved for specific error categories (see sysexits.h)
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Gateway(_) => 1,
            Self::Arguments(_) => 2,    // EX_USAGE
            Self::NotFound(_) => 66,    // EX_NOINPUT
            Self::Unavailable(_) => 69, // EX_UNAVAILABLE
            Self::Io(_) => 74,          // EX_IOERR
            Self::Storage(_) => 73,     // EX_CANTCREAT (closest fit)
            Self::Denied(_) => 77,      // EX_NOPERM
            Self::Config(_) => 78,      // EX_CONFIG
        }
    }
}

impl From<GatewayError> for CliError {
    fn from(err: GatewayError) -> Self {
        let message = err.to_string();
        match err.category() {
            ErrorCategory::Configuration => Self::Config(message),
            ErrorCategory::Connectivity => Self::Unavailable(message),
            ErrorCategory::NotFound => Self::NotFound(message),
            ErrorCategory::Permission | ErrorCategory::Authorization => Self::Denied(message),
            ErrorCategory::Storage => Self::Storage(message),
            ErrorCategory::Backend | ErrorCategory::Internal => Self::Gateway(message),
        }
    }
}

impl From<StoreError> for CliError {
    fn from(err: StoreError) -> Self {
        Self::from(GatewayError::from(err))
    }
}

impl From<SettingsError> for CliError {
    fn from(err: SettingsError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

/// Exit code for an error returned by a handler.
pub fn exit_code_for(err: &anyhow::Error) -> i32 {
    if let Some(cli) = err.downcast_ref::<CliError>() {
        return cli.exit_code();
    }
    if let Some(gateway) = err.downcast_ref::<GatewayError>() {
        return CliError::from(gateway.clone()).exit_code();
    }
    if let Some(store) = err.downcast_ref::<StoreError>() {
        return CliError::from(store.clone()).exit_code();
    }
    1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_errors_map_by_category() {
        let denied = CliError::from(GatewayError::PermissionDenied {
            server_id: "a".into(),
            tool_name: "rm".into(),
        });
        assert_eq!(denied.exit_code(), 77);

        let unauthorized = CliError::from(GatewayError::Unauthorized("no".into()));
        assert_eq!(unauthorized.exit_code(), 77);

        let unreachable = CliError::from(GatewayError::Connect {
            server_id: "a".into(),
            message: "refused".into(),
        });
        assert_eq!(unreachable.exit_code(), 69);

        let missing = CliError::from(StoreError::NotFound("owner x".into()));
        assert_eq!(missing.exit_code(), 66);
        assert_eq!(missing.to_string(), "Not found: owner x");
    }

    #[test]
    fn test_exit_code_for_anyhow_errors() {
        let err = anyhow::Error::new(GatewayError::NotFound("tool 'x'".into()));
        assert_eq!(exit_code_for(&err), 66);

        let err = anyhow::Error::new(CliError::Arguments("bad json".into()));
        assert_eq!(exit_code_for(&err), 2);

        let err = anyhow::anyhow!("something else");
        assert_eq!(exit_code_for(&err), 1);
    }
}
