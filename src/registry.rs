//! Database registry.
//!
//! The registry maps case-insensitive database names to their connection
//! settings and permission sets. It is built once at startup, treated as
//! read-only for the life of the process, and replaced wholesale (never
//! mutated in place) when configuration is reloaded.

use crate::error::ConfigError;
use crate::models::{ConnectionSettings, PermissionSet};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// One registered database: identity, permissions, default flag.
#[derive(Debug, Clone)]
pub struct RegistryEntry {
    pub settings: ConnectionSettings,
    pub permissions: PermissionSet,
    pub is_default: bool,
}

/// Immutable mapping from database name to its registered entry.
///
/// Names are unique and case-insensitive; at most one entry is the default.
#[derive(Debug, Default)]
pub struct DatabaseRegistry {
    entries: HashMap<String, RegistryEntry>,
    default_name: Option<String>,
}

impl DatabaseRegistry {
    /// Build a registry from named entries.
    ///
    /// Fails on duplicate names and on more than one default flag; never
    /// silently picks a winner.
    pub fn new(
        entries: impl IntoIterator<Item = (String, RegistryEntry)>,
    ) -> Result<Self, ConfigError> {
        let mut map = HashMap::new();
        let mut default_name: Option<String> = None;

        for (name, entry) in entries {
            let key = name.to_lowercase();
            if entry.is_default {
                if let Some(first) = &default_name {
                    return Err(ConfigError::MultipleDefaults {
                        first: first.clone(),
                        second: key,
                    });
                }
                default_name = Some(key.clone());
            }
            if map.insert(key.clone(), entry).is_some() {
                return Err(ConfigError::DuplicateName { name: key });
            }
        }

        Ok(Self {
            entries: map,
            default_name,
        })
    }

    /// Look up a database by name (case-insensitive).
    pub fn get(&self, name: &str) -> Option<&RegistryEntry> {
        self.entries.get(&name.to_lowercase())
    }

    /// The default database, if one is configured.
    pub fn default_entry(&self) -> Option<(&str, &RegistryEntry)> {
        self.default_name
            .as_deref()
            .and_then(|name| self.entries.get(name).map(|e| (name, e)))
    }

    pub fn default_name(&self) -> Option<&str> {
        self.default_name.as_deref()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(&name.to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registered names, sorted for stable output.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.entries.keys().cloned().collect();
        names.sort();
        names
    }
}

/// Shared handle to the current registry.
///
/// Readers clone the inner `Arc` and keep using the snapshot they loaded;
/// a reload builds a fresh registry and swaps the handle atomically, so
/// in-flight lookups never observe a partially-updated registry.
#[derive(Debug, Clone)]
pub struct RegistryHandle {
    inner: Arc<RwLock<Arc<DatabaseRegistry>>>,
}

impl RegistryHandle {
    pub fn new(registry: DatabaseRegistry) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(registry))),
        }
    }

    /// Get the current registry snapshot.
    pub fn load(&self) -> Arc<DatabaseRegistry> {
        self.inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Replace the registry. Existing snapshots stay valid until dropped.
    pub fn swap(&self, registry: DatabaseRegistry) {
        let mut guard = self
            .inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = Arc::new(registry);
    }
}
