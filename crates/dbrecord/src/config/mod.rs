//! Configuration loading and validation.

mod types;
mod validation;

pub use types::*;

use std::path::Path;
use std::sync::Arc;

use crate::core::catalog::DialectCatalog;
use crate::dialect::DialectProfile;
use crate::error::Result;

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration against the built-in dialects.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self, &DialectCatalog::with_builtins())
    }

    /// Validate the configuration against a custom catalog.
    pub fn validate_with(&self, catalog: &DialectCatalog) -> Result<()> {
        validation::validate(self, catalog)
    }

    /// The configured dialect profile.
    pub fn profile(&self, catalog: &DialectCatalog) -> Result<Arc<DialectProfile>> {
        catalog.require(&self.dialect)
    }
}
