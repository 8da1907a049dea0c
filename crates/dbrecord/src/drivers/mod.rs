//! Driver-side implementations.
//!
//! - [`registry`]: reference-counted, process-wide driver registration
//! - [`memory`]: in-memory driver used by tests and dry runs
//! - one module per database holding its [`DialectProfile`](crate::dialect::DialectProfile)
//!   ([`mysql`], [`postgres`], [`oracle`], [`mssql`], [`db2`])
//!
//! # Adding a database
//!
//! 1. Create a module under `drivers/` with a `dialect.rs` defining a
//!    `DialectProfile` constant; override only the hooks the database needs
//! 2. Register it (and its aliases) in `DialectCatalog::with_builtins()`
//! 3. Gate any live-connection adapter behind a feature flag in `Cargo.toml`

pub(crate) mod common;
pub mod db2;
pub mod memory;
pub mod mssql;
pub mod mysql;
pub mod oracle;
pub mod postgres;
pub mod registry;

pub use db2::DB2;
pub use memory::{MemoryConnection, MemoryCursor, MemoryDriver, MemoryStatement};
pub use mssql::SQLSERVER;
pub use mysql::MYSQL;
pub use oracle::ORACLE;
pub use postgres::POSTGRES;
pub use registry::{DriverHandle, DriverRegistry};
