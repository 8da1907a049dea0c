//! SQL Server dialect profile.
//!
//! - `datetimeoffset` is carried as a STRING that keeps its offset
//!   (`2024-03-01 12:30:00.5 +05:30`) and is parsed back into a timestamp
//!   with offset on write
//! - `sql_variant` is carried as a STRING and written through the object wrapper
//! - `geometry`/`geography` are reported as VARBINARY and carried as BYTES
//! - `tinyint` is unsigned (0..=255); it infers INT and writes are range checked
//! - identifiers are quoted with brackets

use chrono::DateTime;

use crate::core::identifier::escape_with;
use crate::core::schema::{ColumnMetadata, ColumnType, TypeCode};
use crate::core::traits::{ParamStatement, RowCursor};
use crate::core::types::{Field, PhysicalType, UniversalType};
use crate::core::value::{SqlValue, Value};
use crate::dialect::DialectProfile;
use crate::drivers::common::{bind_object, is_string, read_as, type_name_in};
use crate::error::{RecordError, Result};

pub const DATETIMEOFFSET: TypeCode = TypeCode(-155);
pub const SQL_VARIANT: TypeCode = TypeCode(-150);

/// Text rendering of `datetimeoffset` values.
pub const DATETIMEOFFSET_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f %:z";

const SPATIAL_TYPES: &[&str] = &["geometry", "geography"];

pub const SQLSERVER: DialectProfile = DialectProfile {
    id: "sqlserver",
    schema_override,
    compatibility_override,
    read_override,
    write_override,
    escape,
};

fn schema_override(col: &ColumnMetadata) -> Option<UniversalType> {
    match col.type_code {
        DATETIMEOFFSET | SQL_VARIANT => Some(UniversalType::string()),
        _ if type_name_in(&col.type_name, SPATIAL_TYPES) => Some(UniversalType::bytes()),
        _ => None,
    }
}

fn compatibility_override(ty: &UniversalType, col: &ColumnMetadata) -> Option<bool> {
    let plain = ty.logical_type().is_none();
    match (ty.physical(), col.type_code) {
        (PhysicalType::String, DATETIMEOFFSET | SQL_VARIANT) if plain => Some(true),
        (PhysicalType::Bytes, _) if plain && type_name_in(&col.type_name, SPATIAL_TYPES) => {
            Some(true)
        }
        _ => None,
    }
}

fn read_override(cur: &dyn RowCursor, field: &Field, col: &ColumnType) -> Option<Result<Value>> {
    if !is_string(field) {
        return None;
    }
    match col.type_code {
        DATETIMEOFFSET => read_as(cur.get_timestamp_tz(col.ordinal), |ts| {
            Value::String(ts.format(DATETIMEOFFSET_FORMAT).to_string())
        }),
        SQL_VARIANT => read_as(cur.get_string(col.ordinal), Value::String),
        _ => None,
    }
}

fn parse_offset_timestamp(field: &Field, text: &str) -> Result<SqlValue> {
    let text = text.trim();
    DateTime::parse_from_str(text, DATETIMEOFFSET_FORMAT)
        .or_else(|_| DateTime::parse_from_rfc3339(text))
        .map(SqlValue::DateTimeOffset)
        .map_err(|e| {
            RecordError::conversion(
                &field.name,
                format!("'{}' is not a datetimeoffset value: {}", text, e),
            )
        })
}

fn write_override(
    stmt: &mut dyn ParamStatement,
    field: &Field,
    col: &ColumnType,
    value: &Value,
) -> Option<Result<()>> {
    match (col.type_code, value) {
        (DATETIMEOFFSET, Value::String(text)) => {
            Some(parse_offset_timestamp(field, text).and_then(|v| stmt.bind(col.ordinal, v)))
        }
        (SQL_VARIANT, Value::String(text)) => bind_object(stmt, col, text),
        (TypeCode::TINYINT, Value::Int(n)) => Some(
            u8::try_from(*n)
                .map(|v| SqlValue::I16(i16::from(v)))
                .map_err(|_| {
                    RecordError::conversion(
                        &field.name,
                        format!("{} is out of range for tinyint (0..=255)", n),
                    )
                })
                .and_then(|param| stmt.bind(col.ordinal, param)),
        ),
        _ => None,
    }
}

fn escape(name: &str) -> String {
    escape_with(name, '[', ']')
}
