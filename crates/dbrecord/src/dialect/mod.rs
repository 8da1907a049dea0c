//! Dialect profiles and the generic type-mapping engine.
//!
//! A [`DialectProfile`] is a named bundle of override hooks plus identifier
//! escaping. Every operation in this module asks the profile first and falls
//! back to the generic default table when the hook answers `None`:
//!
//! - [`reader`]: column metadata → universal type
//! - [`validator`]: declared schema vs. actual column metadata
//! - [`record`]: cursor columns ↔ record fields
//!
//! Profiles are plain values of function pointers. They hold no state, are
//! selected once per work unit and are shared read-only across units.
//!
//! ```rust,ignore
//! let catalog = DialectCatalog::with_builtins();
//! let profile = catalog.require("mysql")?;
//! let schema = infer_schema(&profile, cursor.metadata())?;
//! ```

pub mod reader;
pub mod record;
pub mod validator;

use std::fmt;

use crate::core::identifier::{escape_with, validate_identifier};
use crate::core::schema::{ColumnMetadata, ColumnType};
use crate::core::traits::{ParamStatement, RowCursor};
use crate::core::types::{Field, UniversalType};
use crate::core::value::Value;
use crate::error::Result;

pub use reader::{infer_schema, infer_type};
pub use record::RecordMarshaller;
pub use validator::{
    validate, validate_schema, CauseAttribute, FailureCollector, FailureKind, FailureList,
    SchemaRole, ValidationFailure,
};

/// Maps a column to a universal type, or declines.
pub type SchemaOverride = fn(&ColumnMetadata) -> Option<UniversalType>;

/// Decides compatibility of a (non-nullable) declared type with a column, or declines.
pub type CompatibilityOverride = fn(&UniversalType, &ColumnMetadata) -> Option<bool>;

/// Reads one field from the current row, or declines.
pub type ReadOverride = fn(&dyn RowCursor, &Field, &ColumnType) -> Option<Result<Value>>;

/// Binds one field value as a statement parameter, or declines.
pub type WriteOverride =
    fn(&mut dyn ParamStatement, &Field, &ColumnType, &Value) -> Option<Result<()>>;

/// Quotes an identifier. Must be pure and idempotent.
pub type EscapeFn = fn(&str) -> String;

/// Named bundle of dialect overrides.
///
/// Build a dialect by overriding only the hooks it needs:
///
/// ```rust,ignore
/// const MY_DIALECT: DialectProfile = DialectProfile {
///     id: "mine",
///     schema_override: my_schema,
///     ..DialectProfile::GENERIC
/// };
/// ```
#[derive(Clone, Copy)]
pub struct DialectProfile {
    /// Stable dialect identifier (e.g., "mysql").
    pub id: &'static str,
    pub schema_override: SchemaOverride,
    pub compatibility_override: CompatibilityOverride,
    pub read_override: ReadOverride,
    pub write_override: WriteOverride,
    pub escape: EscapeFn,
}

impl DialectProfile {
    /// Profile with no overrides and ANSI double-quote escaping.
    pub const GENERIC: DialectProfile = DialectProfile {
        id: "generic",
        schema_override: decline_schema,
        compatibility_override: decline_compatibility,
        read_override: decline_read,
        write_override: decline_write,
        escape: escape_ansi,
    };

    pub fn generic() -> Self {
        Self::GENERIC
    }

    /// Escape an identifier with this dialect's quoting.
    pub fn escape(&self, name: &str) -> String {
        (self.escape)(name)
    }

    /// Validate then escape an identifier.
    pub fn escape_checked(&self, name: &str) -> Result<String> {
        validate_identifier(name)?;
        Ok(self.escape(name))
    }

    /// Escaped `schema.table`. An empty schema yields just the table.
    pub fn qualify(&self, schema: &str, table: &str) -> Result<String> {
        let table = self.escape_checked(table)?;
        if schema.is_empty() {
            return Ok(table);
        }
        Ok(format!("{}.{}", self.escape_checked(schema)?, table))
    }
}

impl Default for DialectProfile {
    fn default() -> Self {
        Self::GENERIC
    }
}

impl fmt::Debug for DialectProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DialectProfile").field("id", &self.id).finish()
    }
}

impl PartialEq for DialectProfile {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

fn decline_schema(_: &ColumnMetadata) -> Option<UniversalType> {
    None
}

fn decline_compatibility(_: &UniversalType, _: &ColumnMetadata) -> Option<bool> {
    None
}

fn decline_read(_: &dyn RowCursor, _: &Field, _: &ColumnType) -> Option<Result<Value>> {
    None
}

fn decline_write(
    _: &mut dyn ParamStatement,
    _: &Field,
    _: &ColumnType,
    _: &Value,
) -> Option<Result<()>> {
    None
}

/// ANSI double-quote escaping, shared by several built-in dialects.
pub fn escape_ansi(name: &str) -> String {
    escape_with(name, '"', '"')
}
