//! Dialect catalog for explicit dependency injection.
//!
//! The [`DialectCatalog`] maps dialect names and aliases to shared
//! [`DialectProfile`]s. It is constructed explicitly and handed to whatever
//! builds work units, so tests can register their own profiles without
//! touching global state.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::dialect::DialectProfile;
use crate::drivers::{DB2, MYSQL, ORACLE, POSTGRES, SQLSERVER};
use crate::error::{RecordError, Result};

/// Registry of dialect profiles by name.
///
/// # Example
///
/// ```rust,ignore
/// let catalog = DialectCatalog::with_builtins();
/// let profile = catalog.require("postgresql")?;
/// assert_eq!(profile.id, "postgres");
/// ```
#[derive(Debug, Default, Clone)]
pub struct DialectCatalog {
    /// Registered profiles by canonical (lowercase) name.
    profiles: HashMap<String, Arc<DialectProfile>>,

    /// Alias → canonical name.
    aliases: HashMap<String, String>,
}

impl DialectCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog with every built-in dialect and its common aliases.
    pub fn with_builtins() -> Self {
        let mut catalog = Self::new();
        catalog.register(DialectProfile::GENERIC, &[]);
        catalog.register(MYSQL, &["mariadb"]);
        catalog.register(POSTGRES, &["postgresql", "pg"]);
        catalog.register(ORACLE, &[]);
        catalog.register(SQLSERVER, &["mssql", "sql_server"]);
        catalog.register(DB2, &[]);
        catalog
    }

    /// Register a profile under its id plus `aliases`. A later registration
    /// with the same id replaces the earlier profile.
    pub fn register(&mut self, profile: DialectProfile, aliases: &[&str]) {
        let name = profile.id.to_ascii_lowercase();
        for alias in aliases {
            self.aliases.insert(alias.to_ascii_lowercase(), name.clone());
        }
        debug!(dialect = %name, aliases = aliases.len(), "dialect registered");
        self.profiles.insert(name, Arc::new(profile));
    }

    /// Canonical name for a dialect name or alias, ignoring ASCII case.
    pub fn normalize(&self, name: &str) -> Option<&str> {
        let lower = name.trim().to_ascii_lowercase();
        if let Some((key, _)) = self.profiles.get_key_value(&lower) {
            return Some(key.as_str());
        }
        self.aliases.get(&lower).map(String::as_str)
    }

    /// Profile for a dialect name or alias.
    pub fn get(&self, name: &str) -> Option<Arc<DialectProfile>> {
        self.normalize(name)
            .and_then(|canonical| self.profiles.get(canonical))
            .cloned()
    }

    /// Like [`get`](Self::get), but an unknown name is a configuration error
    /// listing the available dialects.
    pub fn require(&self, name: &str) -> Result<Arc<DialectProfile>> {
        self.get(name).ok_or_else(|| {
            RecordError::Config(format!(
                "Unknown dialect '{}'. Available dialects: {}",
                name,
                self.names().join(", ")
            ))
        })
    }

    /// Canonical names of registered dialects, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.profiles.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn contains(&self, name: &str) -> bool {
        self.normalize(name).is_some()
    }
}
