//! Access tokens and capability scopes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ServerId;

/// Capability scope a token may be granted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    /// Start, stop and reconfigure servers.
    ServerManagement,
    /// Read server logs.
    LogAccess,
    /// List and call tools.
    Application,
}

impl Scope {
    /// All scopes, in declaration order.
    pub const ALL: [Self; 3] = [Self::ServerManagement, Self::LogAccess, Self::Application];

    /// Wire name of the scope.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ServerManagement => "server_management",
            Self::LogAccess => "log_access",
            Self::Application => "application",
        }
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Scope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|scope| scope.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("Unknown scope: {s}"))
    }
}

/// An opaque credential and the servers/scopes it grants.
///
/// The id is random and carries no authorizable information; everything
/// the token may do is looked up by id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessToken {
    pub id: String,
    pub owner_client_id: String,
    pub issued_at: DateTime<Utc>,
    #[serde(default)]
    pub server_ids: Vec<ServerId>,
    #[serde(default)]
    pub scopes: Vec<Scope>,
}

impl AccessToken {
    /// Create a token with a freshly generated random id.
    pub fn issue(
        owner_client_id: impl Into<String>,
        server_ids: Vec<ServerId>,
        scopes: Vec<Scope>,
    ) -> Self {
        let mut token = Self {
            // UUID v4 draws from the OS CSPRNG
            id: uuid::Uuid::new_v4().simple().to_string(),
            owner_client_id: owner_client_id.into(),
            issued_at: Utc::now(),
            server_ids: Vec::new(),
            scopes: Vec::new(),
        };
        for server_id in server_ids {
            token.grant_server(&server_id);
        }
        token.replace_scopes(scopes);
        token
    }

    /// Whether this token may reach `server_id` under `scope`.
    pub fn allows(&self, server_id: &str, scope: Scope) -> bool {
        self.server_ids.iter().any(|s| s == server_id) && self.scopes.contains(&scope)
    }

    /// Append a server to the grant list. Returns `false` if already granted.
    pub fn grant_server(&mut self, server_id: &str) -> bool {
        if self.server_ids.iter().any(|s| s == server_id) {
            return false;
        }
        self.server_ids.push(server_id.to_string());
        true
    }

    /// Remove a server from the grant list. Returns `false` if it was absent.
    pub fn revoke_server(&mut self, server_id: &str) -> bool {
        let before = self.server_ids.len();
        self.server_ids.retain(|s| s != server_id);
        self.server_ids.len() != before
    }

    /// Replace the scope set (duplicates removed, order kept).
    pub fn replace_scopes(&mut self, scopes: Vec<Scope>) {
        self.scopes.clear();
        for scope in scopes {
            if !self.scopes.contains(&scope) {
                self.scopes.push(scope);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_generates_unique_ids() {
        let a = AccessToken::issue("client", vec![], vec![]);
        let b = AccessToken::issue("client", vec![], vec![]);
        assert_ne!(a.id, b.id);
        assert_eq!(a.id.len(), 32);
    }

    #[test]
    fn test_allows_requires_server_and_scope() {
        let token = AccessToken::issue("client", vec!["a".into()], vec![Scope::Application]);
        assert!(token.allows("a", Scope::Application));
        assert!(!token.allows("a", Scope::ServerManagement));
        assert!(!token.allows("b", Scope::Application));
    }

    #[test]
    fn test_grant_and_revoke_are_idempotent() {
        let mut token = AccessToken::issue("client", vec!["a".into(), "a".into()], vec![]);
        assert_eq!(token.server_ids, vec!["a".to_string()]);
        assert!(!token.grant_server("a"));
        assert!(token.grant_server("b"));
        assert!(token.revoke_server("a"));
        assert!(!token.revoke_server("a"));
        assert_eq!(token.server_ids, vec!["b".to_string()]);
    }

    #[test]
    fn test_scope_parsing() {
        assert_eq!("application".parse::<Scope>().unwrap(), Scope::Application);
        assert_eq!("LOG_ACCESS".parse::<Scope>().unwrap(), Scope::LogAccess);
        assert!("admin".parse::<Scope>().is_err());
        assert_eq!(
            serde_json::to_string(&Scope::ServerManagement).unwrap(),
            "\"server_management\""
        );
    }
}
