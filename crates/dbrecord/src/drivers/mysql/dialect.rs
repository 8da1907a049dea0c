//! MySQL/MariaDB dialect profile.
//!
//! - `TINYINT(1)` and `BIT(1)` are booleans; a BOOLEAN field over a TINYINT
//!   column reads 0/1 as false/true and writes booleans as 0/1
//! - `BIT(n)` with n > 1 is a bit string, carried as BYTES
//! - `YEAR` is an INT (Connector/J reports it with the DATE type code)
//! - unsigned TINYINT/SMALLINT/MEDIUMINT fit INT, unsigned INT widens to
//!   LONG and unsigned BIGINT becomes DECIMAL(20,0)
//! - unsigned integer writes are checked against the unsigned range
//! - identifiers are quoted with backticks

use tracing::debug;

use crate::core::identifier::escape_with;
use crate::core::schema::{ColumnMetadata, ColumnType, TypeCode};
use crate::core::traits::{ParamStatement, RowCursor};
use crate::core::types::{Field, PhysicalType, UniversalType};
use crate::core::value::{SqlValue, Value};
use crate::dialect::DialectProfile;
use crate::drivers::common::{is_decimal, is_physical, read_as};
use crate::error::{RecordError, Result};

/// Digits of the largest unsigned BIGINT (18446744073709551615).
const UNSIGNED_BIGINT_PRECISION: u32 = 20;

pub const MYSQL: DialectProfile = DialectProfile {
    id: "mysql",
    schema_override,
    compatibility_override,
    read_override,
    write_override,
    escape,
};

fn is_year(type_name: &str) -> bool {
    type_name.eq_ignore_ascii_case("YEAR")
}

/// Connector/J appends " UNSIGNED" to the type name of unsigned columns.
fn is_unsigned_name(type_name: &str) -> bool {
    type_name.to_ascii_uppercase().ends_with("UNSIGNED")
}

fn base_name(type_name: &str) -> String {
    type_name
        .to_ascii_uppercase()
        .trim_end_matches("UNSIGNED")
        .trim()
        .to_string()
}

fn is_unsigned_bigint(code: TypeCode, type_name: &str) -> bool {
    code == TypeCode::BIGINT && is_unsigned_name(type_name)
}

fn schema_override(col: &ColumnMetadata) -> Option<UniversalType> {
    let unsigned = !col.signed || is_unsigned_name(&col.type_name);
    let ty = match col.type_code {
        TypeCode::TINYINT if col.precision == 1 && !unsigned => UniversalType::boolean(),
        TypeCode::BIT if col.precision > 1 => UniversalType::bytes(),
        TypeCode::BIT => UniversalType::boolean(),
        _ if is_year(&col.type_name) => UniversalType::int(),
        TypeCode::TINYINT | TypeCode::SMALLINT if unsigned => UniversalType::int(),
        TypeCode::INTEGER if unsigned && base_name(&col.type_name) == "MEDIUMINT" => {
            UniversalType::int()
        }
        TypeCode::INTEGER if unsigned => UniversalType::long(),
        TypeCode::BIGINT if unsigned => {
            debug!(column = %col.name, "unsigned BIGINT mapped to decimal(20,0)");
            UniversalType::decimal(UNSIGNED_BIGINT_PRECISION, 0)
        }
        _ => return None,
    };
    Some(ty)
}

fn compatibility_override(ty: &UniversalType, col: &ColumnMetadata) -> Option<bool> {
    let unsigned = !col.signed || is_unsigned_name(&col.type_name);
    match (ty.physical(), col.type_code) {
        (PhysicalType::Boolean, TypeCode::TINYINT) => Some(true),
        (PhysicalType::Bytes, TypeCode::BIT) if ty.logical_type().is_none() => {
            Some(col.precision > 1)
        }
        (PhysicalType::Int, _) if is_year(&col.type_name) && ty.logical_type().is_none() => {
            Some(true)
        }
        (PhysicalType::Int, TypeCode::INTEGER) if unsigned => {
            Some(base_name(&col.type_name) == "MEDIUMINT")
        }
        (PhysicalType::Bytes, TypeCode::BIGINT) if unsigned => {
            Some(ty.decimal_scale() == Some(0))
        }
        _ => None,
    }
}

fn read_override(cur: &dyn RowCursor, field: &Field, col: &ColumnType) -> Option<Result<Value>> {
    if is_physical(field, PhysicalType::Boolean) && col.type_code == TypeCode::TINYINT {
        return read_as(cur.get_i32(col.ordinal), |n| Value::Boolean(n != 0));
    }
    if is_year(&col.type_name) {
        return read_as(cur.get_i32(col.ordinal), Value::Int);
    }
    if is_physical(field, PhysicalType::Bytes) && col.type_code == TypeCode::BIT {
        return read_as(cur.get_bytes(col.ordinal), Value::Bytes);
    }
    if is_decimal(field) && is_unsigned_bigint(col.type_code, &col.type_name) {
        return read_as(cur.get_decimal(col.ordinal, 0), Value::Decimal);
    }
    None
}

/// Largest value of an unsigned integer column; `None` for signed columns.
fn unsigned_max(col: &ColumnType) -> Option<i64> {
    if !is_unsigned_name(&col.type_name) {
        return None;
    }
    match col.type_code {
        TypeCode::TINYINT => Some(i64::from(u8::MAX)),
        TypeCode::SMALLINT => Some(i64::from(u16::MAX)),
        TypeCode::INTEGER if base_name(&col.type_name) == "MEDIUMINT" => Some(16_777_215),
        TypeCode::INTEGER => Some(i64::from(u32::MAX)),
        _ => None,
    }
}

fn check_unsigned(field: &Field, col: &ColumnType, value: i64, max: i64) -> Result<()> {
    if (0..=max).contains(&value) {
        return Ok(());
    }
    Err(RecordError::conversion(
        &field.name,
        format!("value {} out of range for {} column '{}'", value, col.type_name, col.name),
    ))
}

fn write_override(
    stmt: &mut dyn ParamStatement,
    field: &Field,
    col: &ColumnType,
    value: &Value,
) -> Option<Result<()>> {
    let param = match value {
        Value::Boolean(b) if col.type_code == TypeCode::TINYINT => SqlValue::I16(i16::from(*b)),
        Value::Bytes(bits) if col.type_code == TypeCode::BIT => SqlValue::Bytes(bits.clone()),
        Value::Int(year) if is_year(&col.type_name) => SqlValue::I32(*year),
        Value::Int(n) => {
            let max = unsigned_max(col)?;
            if let Err(e) = check_unsigned(field, col, i64::from(*n), max) {
                return Some(Err(e));
            }
            SqlValue::I32(*n)
        }
        Value::Long(n) => {
            let max = unsigned_max(col)?;
            if let Err(e) = check_unsigned(field, col, *n, max) {
                return Some(Err(e));
            }
            SqlValue::I64(*n)
        }
        Value::Decimal(d) if is_unsigned_bigint(col.type_code, &col.type_name) => {
            if d.is_sign_negative() || !d.fract().is_zero() {
                return Some(Err(RecordError::conversion(
                    &field.name,
                    format!("{} is not a valid BIGINT UNSIGNED value", d),
                )));
            }
            SqlValue::Decimal(*d)
        }
        _ => return None,
    };
    Some(stmt.bind(col.ordinal, param))
}

fn escape(name: &str) -> String {
    escape_with(name, '`', '`')
}
