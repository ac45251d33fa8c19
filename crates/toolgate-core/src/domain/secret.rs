//! Shape checks for sensitive configuration fields.
//!
//! The configuration store keeps each sensitive field (command, url, bearer
//! token, env values) as `base64(IV[16] || AuthTag[16] || Ciphertext)` and
//! hands the gateway decrypted values. Rows written before encryption was
//! introduced hold plaintext. This module tells the two apart explicitly so a
//! damaged envelope is reported as corruption instead of being passed
//! through as if it were plaintext.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use thiserror::Error;

use super::{ServerConfig, TransportKind};

/// AES-GCM nonce length in the envelope.
pub const IV_LEN: usize = 16;

/// AES-GCM authentication tag length in the envelope.
pub const AUTH_TAG_LEN: usize = 16;

const MIN_ENVELOPE_LEN: usize = IV_LEN + AUTH_TAG_LEN + 1;

// Base64 text shorter than this cannot hold even the IV, so short tokens that
// happen to be valid base64 (e.g. "node") stay plaintext. Longer plaintext
// that is itself valid standard base64 (an alphanumeric bearer token of 24+
// characters whose length is a multiple of 4) cannot be told apart by shape
// and classifies as an envelope or a truncated one. Callers only warn on
// these, they never reject the value.
const MIN_ENVELOPE_TEXT_LEN: usize = IV_LEN.div_ceil(3) * 4;

/// Classification of one stored sensitive field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SensitiveField {
    /// A well-formed encrypted envelope.
    Envelope {
        iv: [u8; IV_LEN],
        auth_tag: [u8; AUTH_TAG_LEN],
        ciphertext: Vec<u8>,
    },
    /// A value in the legacy plaintext format.
    LegacyPlaintext,
}

/// A field that looks like an envelope but cannot be one.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvelopeError {
    #[error("Encrypted field is truncated: {len} bytes, need at least 33")]
    Truncated { len: usize },
}

/// Classify a stored sensitive field.
///
/// - Not standard base64: legacy plaintext.
/// - Base64 too short to hold an IV: legacy plaintext.
/// - Base64 decoding to at least IV + tag + 1 byte: an envelope.
/// - Anything in between: a truncated envelope.
pub fn classify_sensitive_field(raw: &str) -> Result<SensitiveField, EnvelopeError> {
    if raw.len() < MIN_ENVELOPE_TEXT_LEN {
        return Ok(SensitiveField::LegacyPlaintext);
    }

    let Ok(bytes) = STANDARD.decode(raw) else {
        return Ok(SensitiveField::LegacyPlaintext);
    };

    if bytes.len() < MIN_ENVELOPE_LEN {
        return Err(EnvelopeError::Truncated { len: bytes.len() });
    }

    let mut iv = [0u8; IV_LEN];
    let mut auth_tag = [0u8; AUTH_TAG_LEN];
    iv.copy_from_slice(&bytes[..IV_LEN]);
    auth_tag.copy_from_slice(&bytes[IV_LEN..IV_LEN + AUTH_TAG_LEN]);

    Ok(SensitiveField::Envelope {
        iv,
        auth_tag,
        ciphertext: bytes[IV_LEN + AUTH_TAG_LEN..].to_vec(),
    })
}

impl ServerConfig {
    /// Sensitive fields of this config as `(field name, value)` pairs.
    pub fn sensitive_fields(&self) -> Vec<(String, &str)> {
        match &self.transport {
            TransportKind::Local { command, env, .. } => command
                .as_deref()
                .map(|c| ("command".to_string(), c))
                .into_iter()
                .chain(env.iter().map(|(k, v)| (format!("env.{k}"), v.as_str())))
                .collect(),
            TransportKind::RemoteSse { url, bearer_token }
            | TransportKind::RemoteStreamable { url, bearer_token } => {
                let mut fields = Vec::new();
                if let Some(url) = url {
                    fields.push(("url".to_string(), url.as_str()));
                }
                if let Some(token) = bearer_token {
                    fields.push(("bearer_token".to_string(), token.as_str()));
                }
                fields
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope(ciphertext_len: usize) -> String {
        let bytes: Vec<u8> = (0..IV_LEN + AUTH_TAG_LEN + ciphertext_len)
            .map(|i| u8::try_from(i % 251).unwrap())
            .collect();
        STANDARD.encode(bytes)
    }

    #[test]
    fn test_plaintext_values() {
        for raw in ["npx", "node", "https://example.com/mcp", "ghp_abc-123", ""] {
            assert_eq!(
                classify_sensitive_field(raw),
                Ok(SensitiveField::LegacyPlaintext),
                "{raw}"
            );
        }
    }

    #[test]
    fn test_well_formed_envelope() {
        match classify_sensitive_field(&envelope(5)).unwrap() {
            SensitiveField::Envelope {
                iv,
                auth_tag,
                ciphertext,
            } => {
                assert_eq!(iv[1], 1);
                assert_eq!(auth_tag[0], 16);
                assert_eq!(ciphertext.len(), 5);
            }
            SensitiveField::LegacyPlaintext => panic!("expected envelope"),
        }
    }

    #[test]
    fn test_truncated_envelope_is_an_error() {
        // IV and tag present, ciphertext missing
        assert_eq!(
            classify_sensitive_field(&envelope(0)),
            Err(EnvelopeError::Truncated { len: 32 })
        );
    }

    #[test]
    fn test_base64_shaped_plaintext_is_not_distinguishable() {
        // 44 alphanumeric characters decode to 33 bytes
        let token = "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQR";
        assert!(matches!(
            classify_sensitive_field(token),
            Ok(SensitiveField::Envelope { .. })
        ));

        // 24 characters decode to 18 bytes
        assert_eq!(
            classify_sensitive_field("abcdefghijklmnopqrstuvwx"),
            Err(EnvelopeError::Truncated { len: 18 })
        );

        // Not a multiple of 4 without padding: plaintext
        assert_eq!(
            classify_sensitive_field("abcdefghijklmnopqrstuvwxy"),
            Ok(SensitiveField::LegacyPlaintext)
        );
    }

    #[test]
    fn test_sensitive_fields_of_configs() {
        let local = ServerConfig::local("a", "A", "npx", vec![]).with_env("KEY", "v");
        let names: Vec<_> = local.sensitive_fields().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["command", "env.KEY"]);

        let remote = ServerConfig::remote_sse("b", "B", "https://x").with_bearer_token("t");
        assert_eq!(remote.sensitive_fields().len(), 2);
    }
}
