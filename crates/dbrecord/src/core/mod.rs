//! Core abstractions shared by every dialect and driver.
//!
//! - [`types`]: the universal type model (physical + logical types, fields)
//! - [`schema`]: driver column metadata and type codes
//! - [`value`]: runtime values on both sides of the marshaller
//! - [`traits`]: the driver seam (cursors, statements, connections, drivers)
//! - [`identifier`]: identifier validation and quoting
//! - [`catalog`]: dialect registry for dependency injection
//!
//! The core module never talks to a database. Drivers implement the traits
//! in [`traits`]; dialects in `drivers/` decide how their vendor types map
//! onto [`types`].

pub mod catalog;
pub mod identifier;
pub mod schema;
pub mod traits;
pub mod types;
pub mod value;

// Re-export commonly used types for convenience
pub use catalog::DialectCatalog;
pub use schema::{column_types, ColumnMetadata, ColumnType, TypeCode};
pub use traits::{
    Driver, DriverConnection, ParamStatement, PreparedWrite, ResultCursor, RowCursor,
};
pub use types::{find_field, Field, LogicalType, PhysicalType, UniversalType};
pub use value::{Record, SqlNullType, SqlValue, Value};
