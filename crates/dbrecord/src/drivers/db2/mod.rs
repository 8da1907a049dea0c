//! DB2 dialect.

mod dialect;

pub use dialect::DB2;
