//! SQL Server dialect.

mod dialect;

pub use dialect::{DATETIMEOFFSET, DATETIMEOFFSET_FORMAT, SQLSERVER, SQL_VARIANT};
