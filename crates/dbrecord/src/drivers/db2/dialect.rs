//! DB2 dialect profile.
//!
//! - `DECFLOAT` is read and written as a double
//! - `XML` (reported as SQLXML) is a STRING, written through the object wrapper
//! - the double-byte character types (`GRAPHIC`, `VARGRAPHIC`,
//!   `LONG VARGRAPHIC`, `DBCLOB`) are STRINGs

use crate::core::schema::{ColumnMetadata, ColumnType, TypeCode};
use crate::core::traits::{ParamStatement, RowCursor};
use crate::core::types::{Field, PhysicalType, UniversalType};
use crate::core::value::{SqlValue, Value};
use crate::dialect::DialectProfile;
use crate::drivers::common::{bind_object, is_physical, is_string, read_as, type_name_in};
use crate::error::Result;

const GRAPHIC_TYPES: &[&str] = &["GRAPHIC", "VARGRAPHIC", "LONG VARGRAPHIC", "DBCLOB"];

pub const DB2: DialectProfile = DialectProfile {
    id: "db2",
    schema_override,
    compatibility_override,
    read_override,
    write_override,
    ..DialectProfile::GENERIC
};

fn is_decfloat(type_name: &str) -> bool {
    type_name.eq_ignore_ascii_case("DECFLOAT")
}

fn is_xml(code: TypeCode, type_name: &str) -> bool {
    code == TypeCode::SQLXML || type_name.eq_ignore_ascii_case("XML")
}

fn schema_override(col: &ColumnMetadata) -> Option<UniversalType> {
    if is_decfloat(&col.type_name) {
        return Some(UniversalType::double());
    }
    if is_xml(col.type_code, &col.type_name) || type_name_in(&col.type_name, GRAPHIC_TYPES) {
        return Some(UniversalType::string());
    }
    None
}

fn compatibility_override(ty: &UniversalType, col: &ColumnMetadata) -> Option<bool> {
    if ty.logical_type().is_some() {
        return None;
    }
    match ty.physical() {
        PhysicalType::Double if is_decfloat(&col.type_name) => Some(true),
        PhysicalType::String
            if is_xml(col.type_code, &col.type_name)
                || type_name_in(&col.type_name, GRAPHIC_TYPES) =>
        {
            Some(true)
        }
        _ => None,
    }
}

fn read_override(cur: &dyn RowCursor, field: &Field, col: &ColumnType) -> Option<Result<Value>> {
    if is_decfloat(&col.type_name) && is_physical(field, PhysicalType::Double) {
        return read_as(cur.get_f64(col.ordinal), Value::Double);
    }
    if is_xml(col.type_code, &col.type_name) && is_string(field) {
        return read_as(cur.get_string(col.ordinal), Value::String);
    }
    None
}

fn write_override(
    stmt: &mut dyn ParamStatement,
    _field: &Field,
    col: &ColumnType,
    value: &Value,
) -> Option<Result<()>> {
    match value {
        Value::Double(d) if is_decfloat(&col.type_name) => {
            Some(stmt.bind(col.ordinal, SqlValue::F64(*d)))
        }
        Value::String(text) if is_xml(col.type_code, &col.type_name) => {
            bind_object(stmt, col, text)
        }
        _ => None,
    }
}
