//! PostgreSQL dialect.

mod dialect;

pub use dialect::POSTGRES;
