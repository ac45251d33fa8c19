//! Environment provider for local server processes.
//!
//! Local servers run with the inherited environment plus the variables the
//! server declares. Declared keys win on conflict.

use std::collections::BTreeMap;

/// Access to the inherited environment (injectable for testing).
pub trait EnvProvider: Send + Sync {
    /// Get a single variable.
    fn get(&self, key: &str) -> Option<String>;

    /// Every variable with a valid UTF-8 key and value.
    fn vars(&self) -> BTreeMap<String, String>;
}

/// Reads the actual process environment.
pub struct SystemEnv;

impl EnvProvider for SystemEnv {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }

    fn vars(&self) -> BTreeMap<String, String> {
        std::env::vars().collect()
    }
}

/// Test environment with predefined variables.
#[cfg(test)]
#[derive(Default)]
pub struct MockEnv {
    vars: BTreeMap<String, String>,
}

#[cfg(test)]
impl MockEnv {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }
}

#[cfg(test)]
impl EnvProvider for MockEnv {
    fn get(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }

    fn vars(&self) -> BTreeMap<String, String> {
        self.vars.clone()
    }
}

/// Union of the inherited environment and `declared`.
pub fn merged_env(
    provider: &dyn EnvProvider,
    declared: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    let mut env = provider.vars();
    env.extend(declared.iter().map(|(k, v)| (k.clone(), v.clone())));
    env
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declared_keys_win() {
        let inherited = MockEnv::new()
            .with_var("PATH", "/usr/bin")
            .with_var("API_KEY", "from-shell");
        let declared = BTreeMap::from([("API_KEY".to_string(), "from-config".to_string())]);

        let env = merged_env(&inherited, &declared);
        assert_eq!(env.get("PATH").map(String::as_str), Some("/usr/bin"));
        assert_eq!(env.get("API_KEY").map(String::as_str), Some("from-config"));
    }

    #[test]
    fn test_inherited_keys_absent_from_config_survive() {
        let inherited = MockEnv::new().with_var("HOME", "/home/me");
        let env = merged_env(&inherited, &BTreeMap::new());
        assert_eq!(inherited.get("HOME").as_deref(), Some("/home/me"));
        assert_eq!(env.len(), 1);
    }
}
