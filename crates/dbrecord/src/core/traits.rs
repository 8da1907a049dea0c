//! Driver-facing traits the marshalling core is written against.
//!
//! - [`RowCursor`]: typed access to the current row of a result set
//! - [`ParamStatement`]: positional parameter binding on a prepared statement
//! - [`ResultCursor`]: a row-iterating result set with its column metadata
//! - [`DriverConnection`]: one scoped connection owned by a work unit
//! - [`Driver`]: a driver implementation tracked by the driver registry
//!
//! The core never talks to a database directly; drivers implement these
//! traits (see [`crate::drivers::memory`] for an in-memory implementation and
//! the `mysql` feature for the sqlx adapter).

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;

use crate::error::Result;

use super::schema::ColumnMetadata;
use super::value::SqlValue;

/// Typed access to the current row of a result set.
///
/// Indexes are 1-based column ordinals. Every getter returns `Ok(None)` when
/// the value is SQL NULL, and an error when the column cannot be read as the
/// requested type.
pub trait RowCursor {
    fn get_bool(&self, index: usize) -> Result<Option<bool>>;

    fn get_i32(&self, index: usize) -> Result<Option<i32>>;

    fn get_i64(&self, index: usize) -> Result<Option<i64>>;

    fn get_f32(&self, index: usize) -> Result<Option<f32>>;

    fn get_f64(&self, index: usize) -> Result<Option<f64>>;

    fn get_string(&self, index: usize) -> Result<Option<String>>;

    fn get_bytes(&self, index: usize) -> Result<Option<Vec<u8>>>;

    /// Read an exact decimal. `scale` is the scale the caller expects; drivers
    /// may use it as a hint but the returned value keeps its own scale.
    fn get_decimal(&self, index: usize, scale: u32) -> Result<Option<Decimal>>;

    fn get_date(&self, index: usize) -> Result<Option<NaiveDate>>;

    fn get_time(&self, index: usize) -> Result<Option<NaiveTime>>;

    fn get_timestamp(&self, index: usize) -> Result<Option<NaiveDateTime>>;

    fn get_timestamp_tz(&self, index: usize) -> Result<Option<DateTime<FixedOffset>>>;

    /// Driver-native value without conversion.
    fn get_object(&self, index: usize) -> Result<SqlValue>;
}

/// Positional parameter binding on a prepared statement.
///
/// The [`SqlValue`] variant selects the driver setter (int, long, string,
/// bytes, decimal, timestamp, typed NULL, vendor object).
pub trait ParamStatement {
    /// Bind a value at a 1-based parameter index.
    fn bind(&mut self, index: usize, value: SqlValue) -> Result<()>;
}

/// A result set being iterated by one work unit.
#[async_trait]
pub trait ResultCursor: RowCursor + Send {
    /// Column metadata of the result set, in ordinal order.
    fn metadata(&self) -> &[ColumnMetadata];

    /// Advance to the next row. Returns `false` once the result is exhausted.
    async fn next_row(&mut self) -> Result<bool>;
}

/// A statement prepared on a connection and executed once per row.
#[async_trait]
pub trait PreparedWrite: ParamStatement + Send {
    /// Execute with the currently bound parameters and clear them.
    async fn execute(&mut self) -> Result<u64>;
}

/// A connection owned by one work unit for its whole duration.
#[async_trait]
pub trait DriverConnection: Send {
    /// Run a query and return a cursor over its rows.
    async fn query(&mut self, sql: &str) -> Result<Box<dyn ResultCursor + '_>>;

    /// Column metadata of a destination table (`qualified_table` is already escaped).
    async fn table_columns(&mut self, qualified_table: &str) -> Result<Vec<ColumnMetadata>>;

    /// Prepare a parameterized statement.
    async fn prepare(&mut self, sql: &str) -> Result<Box<dyn PreparedWrite + '_>>;

    /// Close the connection. Called exactly once, on every exit path.
    async fn close(&mut self) -> Result<()>;
}

/// A driver implementation tracked by the process-wide driver registry.
///
/// `register` runs when the first work unit acquires the driver and
/// `deregister` when the last one releases it.
pub trait Driver: Send + Sync {
    /// Stable driver identifier (e.g., "mysql").
    fn id(&self) -> &str;

    /// Connection string scheme served by this driver (e.g., "jdbc:mysql").
    fn scheme(&self) -> &str;

    fn register(&self) -> Result<()> {
        Ok(())
    }

    fn deregister(&self) {}
}
