//! Per-owner tool permission overlay.
//!
//! The overlay is a durable `server_id -> [PermissionEntry]` map layered on
//! top of live catalogs. [`ToolPermissions::reconcile`] is the pure half of
//! synchronization: given the configured servers and the catalogs of the
//! servers that connected, it rebuilds the map while keeping operator choices.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use super::{ServerId, ToolDescriptor};

/// Enable/disable decision for one tool on one server.
///
/// `description` and `input_schema` are display snapshots from the last
/// synchronization in which the tool was seen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionEntry {
    pub tool_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_schema: Option<serde_json::Value>,
    pub enabled: bool,
}

impl PermissionEntry {
    /// Snapshot a live tool with the given flag.
    pub fn from_tool(tool: &ToolDescriptor, enabled: bool) -> Self {
        Self {
            tool_name: tool.name.clone(),
            description: tool.description.clone(),
            input_schema: tool.input_schema.clone(),
            enabled,
        }
    }
}

/// All permission entries of one owner, keyed by server id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ToolPermissions(BTreeMap<ServerId, Vec<PermissionEntry>>);

impl ToolPermissions {
    /// Create an empty overlay.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the overlay against live catalogs.
    ///
    /// `configured` is the owner's server list. `live` holds the catalog of
    /// every configured server that connected during this pass; a configured
    /// server missing from `live` failed to connect and keeps its previous
    /// entries untouched. Keys for servers no longer configured are dropped,
    /// as are entries for tools a live server no longer reports. Existing
    /// `enabled` flags survive; new tools start enabled. A live server that
    /// reports no tools gets no key.
    #[must_use]
    pub fn reconcile(
        &self,
        configured: &[ServerId],
        live: &BTreeMap<ServerId, Vec<ToolDescriptor>>,
    ) -> Self {
        let mut rebuilt = BTreeMap::new();

        for server_id in configured {
            if rebuilt.contains_key(server_id) {
                continue;
            }

            match live.get(server_id) {
                Some(tools) => {
                    let previous = self.0.get(server_id);
                    let mut seen = HashSet::new();
                    let entries: Vec<PermissionEntry> = tools
                        .iter()
                        .filter(|tool| seen.insert(tool.name.as_str()))
                        .map(|tool| {
                            let enabled = previous
                                .and_then(|entries| {
                                    entries.iter().find(|e| e.tool_name == tool.name)
                                })
                                .is_none_or(|e| e.enabled);
                            PermissionEntry::from_tool(tool, enabled)
                        })
                        .collect();

                    if !entries.is_empty() {
                        rebuilt.insert(server_id.clone(), entries);
                    }
                }
                None => {
                    if let Some(previous) = self.0.get(server_id) {
                        rebuilt.insert(server_id.clone(), previous.clone());
                    }
                }
            }
        }

        Self(rebuilt)
    }

    /// The stored flag for a tool, if an entry exists.
    pub fn is_enabled(&self, server_id: &str, tool_name: &str) -> Option<bool> {
        self.find(server_id, tool_name).map(|e| e.enabled)
    }

    /// Set the flag for an existing entry. Returns `false` if no entry exists.
    pub fn set_enabled(&mut self, server_id: &str, tool_name: &str, enabled: bool) -> bool {
        self.0
            .get_mut(server_id)
            .and_then(|entries| entries.iter_mut().find(|e| e.tool_name == tool_name))
            .map(|entry| entry.enabled = enabled)
            .is_some()
    }

    /// Entries for one server.
    pub fn entries(&self, server_id: &str) -> &[PermissionEntry] {
        self.0.get(server_id).map_or(&[], Vec::as_slice)
    }

    /// Server ids that currently have entries.
    pub fn server_ids(&self) -> impl Iterator<Item = &ServerId> {
        self.0.keys()
    }

    /// Iterate over all `(server_id, entries)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&ServerId, &Vec<PermissionEntry>)> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Insert entries for a server, replacing any previous ones.
    pub fn insert(&mut self, server_id: impl Into<ServerId>, entries: Vec<PermissionEntry>) {
        self.0.insert(server_id.into(), entries);
    }

    fn find(&self, server_id: &str, tool_name: &str) -> Option<&PermissionEntry> {
        self.0
            .get(server_id)
            .and_then(|entries| entries.iter().find(|e| e.tool_name == tool_name))
    }
}
