//! Backend server configuration types.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Identifier of a configured backend server.
pub type ServerId = String;

/// How the gateway reaches one backend.
///
/// Transport selection is an exhaustive match on this union; the wire tag is
/// the `type` field (`local`, `remote-sse`, `remote-streamable`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum TransportKind {
    /// Local subprocess speaking newline-delimited JSON-RPC over stdio.
    Local {
        /// Executable name or path. Flags belong in `args`.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        command: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        args: Vec<String>,
        /// Declared environment, merged over the inherited environment.
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        env: BTreeMap<String, String>,
    },
    /// Remote server using the HTTP+SSE transport (GET stream, POST endpoint).
    RemoteSse {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        url: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        bearer_token: Option<String>,
    },
    /// Remote server using the streamable HTTP transport.
    RemoteStreamable {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        url: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        bearer_token: Option<String>,
    },
}

impl TransportKind {
    /// Short label used in logs and event payloads.
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Local { .. } => "local",
            Self::RemoteSse { .. } => "remote-sse",
            Self::RemoteStreamable { .. } => "remote-streamable",
        }
    }
}

/// A named placeholder substituted into `args`/`env` at connect time.
///
/// Placeholders appear as `${name}`. The supplied `value` wins over `default`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputParam {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl InputParam {
    /// Create a placeholder with a default value.
    pub fn with_default(name: impl Into<String>, default: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: None,
            default: Some(default.into()),
            description: None,
        }
    }

    /// The value to substitute, if any.
    pub fn resolved(&self) -> Option<&str> {
        self.value.as_deref().or(self.default.as_deref())
    }
}

/// Identity and connection recipe for one backend server.
///
/// Owned by the configuration store; the gateway treats it as immutable input
/// and compares it against the config a live connection was built from to
/// detect changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub id: ServerId,

    /// User-friendly name for the server.
    pub name: String,

    pub transport: TransportKind,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub input_params: Vec<InputParam>,

    /// Disabled servers are never connected.
    #[serde(default)]
    pub disabled: bool,

    /// Connect when the gateway starts instead of on first use.
    #[serde(default)]
    pub auto_start: bool,
}

impl ServerConfig {
    /// Create a local (stdio subprocess) server configuration.
    pub fn local(
        id: impl Into<ServerId>,
        name: impl Into<String>,
        command: impl Into<String>,
        args: Vec<String>,
    ) -> Self {
        Self::with_transport(
            id,
            name,
            TransportKind::Local {
                command: Some(command.into()),
                args,
                env: BTreeMap::new(),
            },
        )
    }

    /// Create a remote SSE server configuration.
    pub fn remote_sse(
        id: impl Into<ServerId>,
        name: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self::with_transport(
            id,
            name,
            TransportKind::RemoteSse {
                url: Some(url.into()),
                bearer_token: None,
            },
        )
    }

    /// Create a remote streamable-HTTP server configuration.
    pub fn remote_streamable(
        id: impl Into<ServerId>,
        name: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self::with_transport(
            id,
            name,
            TransportKind::RemoteStreamable {
                url: Some(url.into()),
                bearer_token: None,
            },
        )
    }

    /// Create a configuration from an explicit transport.
    pub fn with_transport(
        id: impl Into<ServerId>,
        name: impl Into<String>,
        transport: TransportKind,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            transport,
            input_params: Vec::new(),
            disabled: false,
            auto_start: false,
        }
    }

    /// Add an environment variable (local servers only).
    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        if let TransportKind::Local { env, .. } = &mut self.transport {
            env.insert(key.into(), value.into());
        }
        self
    }

    /// Set the bearer token (remote servers only).
    #[must_use]
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        match &mut self.transport {
            TransportKind::RemoteSse { bearer_token, .. }
            | TransportKind::RemoteStreamable { bearer_token, .. } => {
                *bearer_token = Some(token.into());
            }
            TransportKind::Local { .. } => {}
        }
        self
    }

    /// Add an input placeholder.
    #[must_use]
    pub fn with_input_param(mut self, param: InputParam) -> Self {
        self.input_params.push(param);
        self
    }

    /// Set auto-start.
    #[must_use]
    pub const fn with_auto_start(mut self, auto_start: bool) -> Self {
        self.auto_start = auto_start;
        self
    }

    /// Set disabled status.
    #[must_use]
    pub const fn with_disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }

    /// Validate that the transport has what it needs to connect.
    ///
    /// Failures here are configuration errors: retrying cannot fix them.
    pub fn validate(&self) -> Result<(), String> {
        match &self.transport {
            TransportKind::Local { command, .. } => {
                let command = command
                    .as_deref()
                    .ok_or_else(|| "Local server requires command".to_string())?;

                if command.trim().is_empty() {
                    return Err("Local server command cannot be empty".to_string());
                }

                // Ensure command has no whitespace (flags/args should be in args array)
                if command.contains(char::is_whitespace) {
                    return Err(
                        "Command must be an executable name/path only (e.g., 'npx'). \
                         Put flags and arguments in the 'args' field."
                            .to_string(),
                    );
                }

                Ok(())
            }
            TransportKind::RemoteSse { url, .. } | TransportKind::RemoteStreamable { url, .. } => {
                let url = url
                    .as_deref()
                    .ok_or_else(|| "Remote server requires url".to_string())?;

                if url.trim().is_empty() {
                    return Err("Remote server url cannot be empty".to_string());
                }

                if !(url.starts_with("http://") || url.starts_with("https://")) {
                    return Err(format!("Remote server url must be http(s): {url}"));
                }

                Ok(())
            }
        }
    }

    /// Return the transport with `${name}` placeholders substituted into
    /// local `args` and `env` values.
    pub fn resolved_transport(&self) -> Result<TransportKind, String> {
        match &self.transport {
            TransportKind::Local { command, args, env } => {
                let args = args
                    .iter()
                    .map(|arg| substitute_placeholders(arg, &self.input_params))
                    .collect::<Result<Vec<_>, _>>()?;
                let env = env
                    .iter()
                    .map(|(key, value)| {
                        substitute_placeholders(value, &self.input_params)
                            .map(|value| (key.clone(), value))
                    })
                    .collect::<Result<BTreeMap<_, _>, _>>()?;
                Ok(TransportKind::Local {
                    command: command.clone(),
                    args,
                    env,
                })
            }
            other => Ok(other.clone()),
        }
    }
}

/// Substitute `${name}` placeholders in `template`.
///
/// An unterminated `${` is kept literally. A placeholder naming an unknown
/// parameter, or one with neither value nor default, is an error.
pub fn substitute_placeholders(template: &str, params: &[InputParam]) -> Result<String, String> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            out.push_str(&rest[start..]);
            return Ok(out);
        };

        let name = &after[..end];
        let value = params
            .iter()
            .find(|p| p.name == name)
            .and_then(InputParam::resolved)
            .ok_or_else(|| format!("Unresolved input parameter: {name}"))?;
        out.push_str(value);
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    Ok(out)
}
