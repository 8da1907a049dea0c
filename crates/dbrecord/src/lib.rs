//! # dbrecord
//!
//! Cross-dialect type mapping and record marshalling for relational database
//! connectors.
//!
//! This library maps driver column metadata onto a universal schema and moves
//! values between driver rows and schema-typed records, with support for:
//!
//! - **Schema inference** from result-set column metadata
//! - **Schema validation** of a declared schema against a query or table
//! - **Record marshalling** in both directions (cursor → record, record → statement)
//! - **Dialect profiles** for MySQL, PostgreSQL, Oracle, SQL Server and DB2
//! - **Split imports** over a `$CONDITIONS` query with per-split range predicates
//! - **Work units** that own a connection and stream records through a channel
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use dbrecord::drivers::{MemoryConnection, MemoryDriver};
//! use dbrecord::transfer::SourceUnit;
//! use dbrecord::DialectCatalog;
//! use tokio::sync::mpsc;
//!
//! #[tokio::main]
//! async fn main() -> dbrecord::Result<()> {
//!     let profile = DialectCatalog::with_builtins().require("mysql")?;
//!     let unit = SourceUnit::new(profile, Arc::new(MemoryDriver), "SELECT * FROM users");
//!
//!     let (tx, mut rx) = mpsc::channel(16);
//!     let mut conn = MemoryConnection::new();
//!     let stats = unit.run(&mut conn, tx).await?;
//!     while let Some(batch) = rx.recv().await {
//!         println!("{} records", batch.len());
//!     }
//!     println!("Read {} rows", stats.rows);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod dialect;
pub mod drivers;
pub mod error;
pub mod transfer;

// Re-exports for convenient access
pub use config::{Config, ConnectionConfig, SinkConfig, SourceConfig};
pub use core::{
    ColumnMetadata, DialectCatalog, Field, LogicalType, PhysicalType, Record, SqlValue, TypeCode,
    UniversalType, Value,
};
pub use dialect::{
    infer_schema, validate_schema, DialectProfile, RecordMarshaller, SchemaRole,
    ValidationFailure,
};
pub use drivers::{DriverHandle, DriverRegistry};
pub use error::{RecordError, Result};
pub use transfer::{SinkUnit, SourceUnit, SplitPlan, UnitStats};
