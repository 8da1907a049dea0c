//! Configuration validation.

use super::{Config, CONDITIONS_TOKEN};
use crate::core::catalog::DialectCatalog;
use crate::core::identifier::validate_identifier;
use crate::error::{RecordError, Result};

/// Validate the configuration.
pub fn validate(config: &Config, catalog: &DialectCatalog) -> Result<()> {
    if !catalog.contains(&config.dialect) {
        return Err(RecordError::Config(format!(
            "dialect '{}' is not known. Available dialects: {}",
            config.dialect,
            catalog.names().join(", ")
        )));
    }

    if let Some(source) = &config.source {
        if source.import_query.trim().is_empty() {
            return Err(RecordError::Config("source.import_query is required".into()));
        }
        if source.num_splits == 0 {
            return Err(RecordError::Config(
                "source.num_splits must be at least 1".into(),
            ));
        }
        if source.num_splits > 1 || source.include_null_split {
            if !source.import_query.contains(CONDITIONS_TOKEN) {
                return Err(RecordError::Config(format!(
                    "source.import_query must contain {} when the import is split",
                    CONDITIONS_TOKEN
                )));
            }
            if source.split_by.as_deref().map_or(true, |c| c.trim().is_empty()) {
                return Err(RecordError::Config(
                    "source.split_by is required when the import is split".into(),
                ));
            }
            if source
                .bounding_query
                .as_deref()
                .map_or(true, |q| q.trim().is_empty())
            {
                return Err(RecordError::Config(
                    "source.bounding_query is required when the import is split".into(),
                ));
            }
        }
    }

    if let Some(sink) = &config.sink {
        validate_identifier(&sink.table)
            .map_err(|e| RecordError::Config(format!("sink.table: {}", e)))?;
        if !sink.schema_name.is_empty() {
            validate_identifier(&sink.schema_name)
                .map_err(|e| RecordError::Config(format!("sink.schema_name: {}", e)))?;
        }
    }

    if config.source.is_none() && config.sink.is_none() {
        return Err(RecordError::Config(
            "at least one of source or sink must be configured".into(),
        ));
    }

    Ok(())
}
