//! Configuration types.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::types::Field;

/// Placeholder in an import query replaced by each split's predicate.
pub const CONDITIONS_TOKEN: &str = "$CONDITIONS";

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Dialect name or alias (e.g. "mysql", "postgresql", "mssql").
    #[serde(default = "default_dialect")]
    pub dialect: String,

    /// Import side: reading a query into records.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceConfig>,

    /// Export side: writing records into a table.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sink: Option<SinkConfig>,

    /// Database connection.
    #[serde(default)]
    pub connection: ConnectionConfig,
}

/// Import (source) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Query to import. Must contain `$CONDITIONS` when split.
    pub import_query: String,

    /// Query returning the `(min, max)` of the split column.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounding_query: Option<String>,

    /// Column the import is split on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub split_by: Option<String>,

    /// Number of splits (default: 1).
    #[serde(default = "default_num_splits")]
    pub num_splits: usize,

    /// Add a split reading rows whose split column is NULL.
    #[serde(default)]
    pub include_null_split: bool,

    /// Declared output schema. Inferred from the result set when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Vec<Field>>,
}

/// Export (sink) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    /// Destination schema; empty for the connection's default.
    #[serde(default)]
    pub schema_name: String,

    /// Destination table.
    pub table: String,

    /// Declared input schema of the records to write.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Vec<Field>>,
}

/// Database connection settings.
///
/// The password is never serialized and `Debug` redacts it.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Connection URL (e.g. `mysql://host:3306/shop`).
    #[serde(default)]
    pub url: String,

    /// Username.
    #[serde(default)]
    pub user: String,

    /// Password.
    #[serde(default, skip_serializing)]
    pub password: String,
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("url", &self.url)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

fn default_dialect() -> String {
    "generic".to_string()
}

fn default_num_splits() -> usize {
    1
}
