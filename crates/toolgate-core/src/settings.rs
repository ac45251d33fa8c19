//! Gateway settings and validation.
//!
//! These are pure domain types with no infrastructure dependencies.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default number of connect attempts per connect pass.
pub const DEFAULT_MAX_CONNECT_ATTEMPTS: u32 = 3;

/// Default base delay for exponential connect backoff.
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 1000;

/// Default timeout for the initialize handshake.
pub const DEFAULT_HANDSHAKE_TIMEOUT_SECS: u64 = 30;

/// Protocol version sent in `initialize`.
pub const DEFAULT_PROTOCOL_VERSION: &str = "2025-03-26";

/// Gateway settings.
///
/// All fields are optional to support partial files and graceful defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GatewaySettings {
    /// Connect attempts before a server is marked as errored (1-10).
    pub max_connect_attempts: Option<u32>,

    /// Backoff base: attempt `n` waits `base * 2^n` before the next try.
    pub retry_base_delay_ms: Option<u64>,

    /// Timeout for the initialize handshake only (1-600). Tool calls have
    /// no gateway-imposed timeout.
    pub handshake_timeout_secs: Option<u64>,

    /// Protocol version requested during initialize.
    pub protocol_version: Option<String>,

    /// Client name reported during initialize.
    pub client_name: Option<String>,
}

impl GatewaySettings {
    /// Create settings with sensible defaults.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self {
            max_connect_attempts: Some(DEFAULT_MAX_CONNECT_ATTEMPTS),
            retry_base_delay_ms: Some(DEFAULT_RETRY_BASE_DELAY_MS),
            handshake_timeout_secs: Some(DEFAULT_HANDSHAKE_TIMEOUT_SECS),
            protocol_version: Some(DEFAULT_PROTOCOL_VERSION.to_string()),
            client_name: Some("toolgate".to_string()),
        }
    }

    /// Get the effective connect attempt count (with default fallback).
    #[must_use]
    pub fn effective_max_connect_attempts(&self) -> u32 {
        self.max_connect_attempts
            .unwrap_or(DEFAULT_MAX_CONNECT_ATTEMPTS)
    }

    /// Get the effective backoff base delay.
    #[must_use]
    pub fn effective_retry_base_delay(&self) -> Duration {
        Duration::from_millis(
            self.retry_base_delay_ms
                .unwrap_or(DEFAULT_RETRY_BASE_DELAY_MS),
        )
    }

    /// Get the effective handshake timeout.
    #[must_use]
    pub fn effective_handshake_timeout(&self) -> Duration {
        Duration::from_secs(
            self.handshake_timeout_secs
                .unwrap_or(DEFAULT_HANDSHAKE_TIMEOUT_SECS),
        )
    }

    /// Get the effective protocol version.
    #[must_use]
    pub fn effective_protocol_version(&self) -> &str {
        self.protocol_version
            .as_deref()
            .unwrap_or(DEFAULT_PROTOCOL_VERSION)
    }

    /// Get the effective client name.
    #[must_use]
    pub fn effective_client_name(&self) -> &str {
        self.client_name.as_deref().unwrap_or("toolgate")
    }

    /// Merge an update into this one, only updating fields that are Some.
    pub fn merge(&mut self, other: &SettingsUpdate) {
        if let Some(ref attempts) = other.max_connect_attempts {
            self.max_connect_attempts = *attempts;
        }
        if let Some(ref delay) = other.retry_base_delay_ms {
            self.retry_base_delay_ms = *delay;
        }
        if let Some(ref timeout) = other.handshake_timeout_secs {
            self.handshake_timeout_secs = *timeout;
        }
        if let Some(ref version) = other.protocol_version {
            self.protocol_version.clone_from(version);
        }
        if let Some(ref name) = other.client_name {
            self.client_name.clone_from(name);
        }
    }
}

/// Partial settings update.
///
/// Each field is `Option<Option<T>>`:
/// - `None` = don't change this field
/// - `Some(None)` = reset field to its default
/// - `Some(Some(value))` = set field to value
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettingsUpdate {
    pub max_connect_attempts: Option<Option<u32>>,
    pub retry_base_delay_ms: Option<Option<u64>>,
    pub handshake_timeout_secs: Option<Option<u64>>,
    pub protocol_version: Option<Option<String>>,
    pub client_name: Option<Option<String>>,
}

/// Settings validation error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SettingsError {
    #[error("Max connect attempts must be between 1 and 10, got {0}")]
    InvalidConnectAttempts(u32),

    #[error("Handshake timeout must be between 1 and 600 seconds, got {0}")]
    InvalidHandshakeTimeout(u64),

    #[error("Protocol version cannot be empty")]
    EmptyProtocolVersion,
}

/// Validate settings values.
pub fn validate_settings(settings: &GatewaySettings) -> Result<(), SettingsError> {
    if let Some(attempts) = settings.max_connect_attempts {
        if !(1..=10).contains(&attempts) {
            return Err(SettingsError::InvalidConnectAttempts(attempts));
        }
    }

    if let Some(timeout) = settings.handshake_timeout_secs {
        if !(1..=600).contains(&timeout) {
            return Err(SettingsError::InvalidHandshakeTimeout(timeout));
        }
    }

    if settings
        .protocol_version
        .as_ref()
        .is_some_and(|v| v.trim().is_empty())
    {
        return Err(SettingsError::EmptyProtocolVersion);
    }

    Ok(())
}
