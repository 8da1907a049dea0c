//! Oracle dialect and its vendor type codes.

mod dialect;

pub use dialect::{
    BFILE, BINARY_DOUBLE, BINARY_FLOAT, INTERVAL_DS, INTERVAL_YM, ORACLE, TIMESTAMP_LTZ,
    TIMESTAMP_TZ,
};
