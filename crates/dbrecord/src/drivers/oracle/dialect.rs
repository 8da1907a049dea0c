//! Oracle dialect profile.
//!
//! Oracle reports several vendor type codes outside the standard set:
//!
//! | code | type                            | universal type    |
//! |------|---------------------------------|-------------------|
//! | 100  | BINARY_FLOAT                    | float             |
//! | 101  | BINARY_DOUBLE                   | double            |
//! | -101 | TIMESTAMP WITH TIME ZONE        | string            |
//! | -102 | TIMESTAMP WITH LOCAL TIME ZONE  | timestamp-micros  |
//! | -103 | INTERVAL YEAR TO MONTH          | string            |
//! | -104 | INTERVAL DAY TO SECOND          | string            |
//! | -13  | BFILE                           | bytes (read-only) |
//!
//! `NUMBER` without a precision infers DOUBLE. Declaring a decimal over it is
//! accepted and reads round half-even to the declared scale.

use tracing::warn;

use crate::core::schema::{ColumnMetadata, ColumnType, TypeCode};
use crate::core::traits::{ParamStatement, RowCursor};
use crate::core::types::{Field, PhysicalType, UniversalType};
use crate::core::value::{SqlValue, Value};
use crate::dialect::record::{rescale_half_even, timestamp_value};
use crate::dialect::DialectProfile;
use crate::drivers::common::{bind_object, is_decimal, is_physical, is_string, read_as};
use crate::error::{RecordError, Result};

pub const BINARY_FLOAT: TypeCode = TypeCode(100);
pub const BINARY_DOUBLE: TypeCode = TypeCode(101);
pub const TIMESTAMP_TZ: TypeCode = TypeCode(-101);
pub const TIMESTAMP_LTZ: TypeCode = TypeCode(-102);
pub const INTERVAL_YM: TypeCode = TypeCode(-103);
pub const INTERVAL_DS: TypeCode = TypeCode(-104);
pub const BFILE: TypeCode = TypeCode(-13);

pub const ORACLE: DialectProfile = DialectProfile {
    id: "oracle",
    schema_override,
    compatibility_override,
    read_override,
    write_override,
    ..DialectProfile::GENERIC
};

/// Columns carried as their text rendering and written back through the object wrapper.
fn is_text_code(code: TypeCode) -> bool {
    matches!(code, TIMESTAMP_TZ | INTERVAL_YM | INTERVAL_DS | TypeCode::ROWID)
}

fn is_long(type_name: &str) -> bool {
    type_name.eq_ignore_ascii_case("LONG")
}

/// FLOAT(b) is a NUMBER with binary precision, reported under its own name.
fn is_float_number(type_name: &str) -> bool {
    type_name.eq_ignore_ascii_case("FLOAT")
}

fn is_bare_number(col: &ColumnMetadata) -> bool {
    col.type_code == TypeCode::NUMERIC && col.precision <= 0 && !is_float_number(&col.type_name)
}

fn schema_override(col: &ColumnMetadata) -> Option<UniversalType> {
    let ty = match col.type_code {
        BINARY_FLOAT => UniversalType::float(),
        BINARY_DOUBLE => UniversalType::double(),
        TIMESTAMP_LTZ => UniversalType::timestamp_micros(),
        BFILE => UniversalType::bytes(),
        code if is_text_code(code) => UniversalType::string(),
        _ if is_long(&col.type_name) => UniversalType::string(),
        _ if is_float_number(&col.type_name) => UniversalType::double(),
        _ if is_bare_number(col) => {
            warn!(
                column = %col.name,
                "NUMBER without precision mapped to double; declare a decimal to read it exactly"
            );
            UniversalType::double()
        }
        _ => return None,
    };
    Some(ty)
}

fn compatibility_override(ty: &UniversalType, col: &ColumnMetadata) -> Option<bool> {
    if ty.logical_type().is_some() {
        return match col.type_code {
            TIMESTAMP_LTZ => Some(ty == &UniversalType::timestamp_micros()
                || ty == &UniversalType::timestamp_millis()),
            _ if is_bare_number(col) => Some(ty.decimal_scale().is_some()),
            _ => None,
        };
    }
    let answer = match (ty.physical(), col.type_code) {
        (PhysicalType::Float, BINARY_FLOAT) => true,
        (PhysicalType::Double, BINARY_DOUBLE) => true,
        (PhysicalType::Bytes, BFILE) => true,
        (PhysicalType::String, code) if is_text_code(code) || is_long(&col.type_name) => true,
        (PhysicalType::Double, _) if is_float_number(&col.type_name) || is_bare_number(col) => {
            true
        }
        _ => return None,
    };
    Some(answer)
}

fn read_override(cur: &dyn RowCursor, field: &Field, col: &ColumnType) -> Option<Result<Value>> {
    let index = col.ordinal;
    match col.type_code {
        code if is_text_code(code) && is_string(field) => {
            read_as(cur.get_string(index), Value::String)
        }
        BINARY_FLOAT if is_physical(field, PhysicalType::Float) => {
            read_as(cur.get_f32(index), Value::Float)
        }
        BINARY_DOUBLE if is_physical(field, PhysicalType::Double) => {
            read_as(cur.get_f64(index), Value::Double)
        }
        TIMESTAMP_LTZ => read_as(cur.get_timestamp(index), |ts| timestamp_value(field, ts)),
        BFILE => read_as(cur.get_bytes(index), Value::Bytes),
        TypeCode::NUMERIC if is_physical(field, PhysicalType::Double) => {
            read_as(cur.get_f64(index), Value::Double)
        }
        TypeCode::NUMERIC if is_decimal(field) => {
            let scale = field.schema.decimal_scale().unwrap_or(0);
            read_as(cur.get_decimal(index, scale), |d| {
                Value::Decimal(rescale_half_even(d, scale))
            })
        }
        _ => None,
    }
}

fn write_override(
    stmt: &mut dyn ParamStatement,
    field: &Field,
    col: &ColumnType,
    value: &Value,
) -> Option<Result<()>> {
    match (col.type_code, value) {
        (_, Value::Null) => None,
        (BFILE, _) => Some(Err(RecordError::conversion(
            &field.name,
            format!("column '{}' is a BFILE and cannot be written", col.name),
        ))),
        (code, Value::String(text)) if is_text_code(code) => bind_object(stmt, col, text),
        (TypeCode::NUMERIC, Value::Double(d)) => Some(stmt.bind(col.ordinal, SqlValue::F64(*d))),
        (TypeCode::NUMERIC, Value::Float(f)) => {
            Some(stmt.bind(col.ordinal, SqlValue::F64(f64::from(*f))))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::value::Record;
    use crate::dialect::record::RecordMarshaller;
    use crate::dialect::{infer_type, validate_schema, SchemaRole};
    use crate::drivers::memory::{MemoryCursor, MemoryStatement};
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    fn col(name: &str, code: TypeCode, type_name: &str) -> ColumnMetadata {
        ColumnMetadata::new(name, code, type_name).not_null()
    }

    // =========================================================================
    // Schema
    // =========================================================================

    #[test]
    fn test_vendor_codes() {
        let cases = [
            (BINARY_FLOAT, "BINARY_FLOAT", UniversalType::float()),
            (BINARY_DOUBLE, "BINARY_DOUBLE", UniversalType::double()),
            (TIMESTAMP_TZ, "TIMESTAMP WITH TIME ZONE", UniversalType::string()),
            (TIMESTAMP_LTZ, "TIMESTAMP WITH LOCAL TIME ZONE", UniversalType::timestamp_micros()),
            (INTERVAL_YM, "INTERVALYM", UniversalType::string()),
            (INTERVAL_DS, "INTERVALDS", UniversalType::string()),
            (TypeCode::ROWID, "ROWID", UniversalType::string()),
            (BFILE, "BFILE", UniversalType::bytes()),
            (TypeCode::LONGVARCHAR, "LONG", UniversalType::string()),
        ];
        for (code, name, expected) in cases {
            assert_eq!(infer_type(&ORACLE, &col("C", code, name)).unwrap(), expected, "{}", name);
        }
    }

    #[test]
    fn test_number_mappings() {
        let bare = col("N", TypeCode::NUMERIC, "NUMBER").with_precision(0, -127);
        assert_eq!(infer_type(&ORACLE, &bare).unwrap(), UniversalType::double());

        let float = col("F", TypeCode::NUMERIC, "FLOAT").with_precision(126, -127);
        assert_eq!(infer_type(&ORACLE, &float).unwrap(), UniversalType::double());

        let sized = col("S", TypeCode::NUMERIC, "NUMBER").with_precision(10, 2);
        assert_eq!(infer_type(&ORACLE, &sized).unwrap(), UniversalType::decimal(10, 2));
    }

    // =========================================================================
    // Compatibility
    // =========================================================================

    #[test]
    fn test_bare_number_accepts_double_and_decimal() {
        let cols = vec![col("N", TypeCode::NUMERIC, "NUMBER")];
        for ty in [UniversalType::double(), UniversalType::decimal(18, 4)] {
            let fields = vec![Field::new("N", ty)];
            assert!(validate_schema(&ORACLE, &fields, &cols, SchemaRole::Source).is_empty());
        }
        let fields = vec![Field::new("N", UniversalType::date())];
        assert_eq!(validate_schema(&ORACLE, &fields, &cols, SchemaRole::Source).len(), 1);
    }

    #[test]
    fn test_local_time_zone_timestamp_compatibility() {
        let c = col("TS", TIMESTAMP_LTZ, "TIMESTAMP WITH LOCAL TIME ZONE");
        assert_eq!(compatibility_override(&UniversalType::timestamp_micros(), &c), Some(true));
        assert_eq!(compatibility_override(&UniversalType::date(), &c), Some(false));
        assert_eq!(compatibility_override(&UniversalType::long(), &c), None);
    }

    // =========================================================================
    // Marshalling
    // =========================================================================

    #[test]
    fn test_intervals_round_trip_as_text() {
        let metadata = vec![col("GAP", INTERVAL_DS, "INTERVALDS")];
        let fields = vec![Field::new("GAP", UniversalType::string())];
        let text = "+01 02:03:04.000000";

        let cur = MemoryCursor::single_row(
            metadata.clone(),
            vec![SqlValue::Object {
                type_name: "INTERVALDS".into(),
                text: text.into(),
            }],
        );
        let record = RecordMarshaller::for_source(ORACLE, fields.clone(), &metadata)
            .unwrap()
            .read_record(&cur)
            .unwrap();
        assert_eq!(record.get("GAP"), Some(&Value::String(text.into())));

        let mut stmt = MemoryStatement::new();
        RecordMarshaller::for_sink(ORACLE, fields, &metadata)
            .unwrap()
            .write_record(&mut stmt, &record)
            .unwrap();
        assert_eq!(
            stmt.params(),
            &[(
                1,
                SqlValue::Object {
                    type_name: "INTERVALDS".into(),
                    text: text.into()
                }
            )]
        );
    }

    #[test]
    fn test_bare_number_reads() {
        let metadata = vec![col("N", TypeCode::NUMERIC, "NUMBER")];
        let cur = MemoryCursor::single_row(metadata.clone(), vec![SqlValue::Text("2.675".into())]);

        let as_double = vec![Field::new("N", UniversalType::double())];
        let record = RecordMarshaller::for_source(ORACLE, as_double, &metadata)
            .unwrap()
            .read_record(&cur)
            .unwrap();
        assert_eq!(record.get("N"), Some(&Value::Double(2.675)));

        let as_decimal = vec![Field::new("N", UniversalType::decimal(10, 2))];
        let record = RecordMarshaller::for_source(ORACLE, as_decimal, &metadata)
            .unwrap()
            .read_record(&cur)
            .unwrap();
        assert_eq!(record.get("N"), Some(&Value::Decimal(Decimal::new(268, 2))));
    }

    #[test]
    fn test_local_time_zone_reads_micros() {
        let metadata = vec![col("TS", TIMESTAMP_LTZ, "TIMESTAMP WITH LOCAL TIME ZONE")];
        let ts = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_micro_opt(12, 30, 0, 250)
            .unwrap();
        let cur = MemoryCursor::single_row(metadata.clone(), vec![SqlValue::DateTime(ts)]);
        let fields = vec![Field::new("TS", UniversalType::timestamp_micros())];
        let record = RecordMarshaller::for_source(ORACLE, fields, &metadata)
            .unwrap()
            .read_record(&cur)
            .unwrap();
        assert_eq!(record.get("TS"), Some(&Value::from_timestamp_micros(ts)));
    }

    #[test]
    fn test_local_time_zone_honours_declared_millis() {
        let metadata = vec![col("TS", TIMESTAMP_LTZ, "TIMESTAMP WITH LOCAL TIME ZONE")];
        let fields = vec![Field::new("TS", UniversalType::timestamp_millis())];
        assert!(validate_schema(&ORACLE, &fields, &metadata, SchemaRole::Source).is_empty());

        let ts = NaiveDate::from_ymd_opt(1970, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 1)
            .unwrap();
        let cur = MemoryCursor::single_row(metadata.clone(), vec![SqlValue::DateTime(ts)]);
        let record = RecordMarshaller::for_source(ORACLE, fields.clone(), &metadata)
            .unwrap()
            .read_record(&cur)
            .unwrap();
        assert_eq!(record.get("TS"), Some(&Value::Long(1_000)));

        let mut stmt = MemoryStatement::new();
        RecordMarshaller::for_sink(ORACLE, fields, &metadata)
            .unwrap()
            .write_record(&mut stmt, &record)
            .unwrap();
        assert_eq!(stmt.params(), &[(1, SqlValue::DateTime(ts))]);
    }

    #[test]
    fn test_binary_float_and_double_round_trip() {
        let metadata = vec![
            col("F", BINARY_FLOAT, "BINARY_FLOAT"),
            col("D", BINARY_DOUBLE, "BINARY_DOUBLE"),
        ];
        let fields: Vec<Field> = metadata
            .iter()
            .map(|c| Field::new(&c.name, infer_type(&ORACLE, c).unwrap()))
            .collect();
        let cur = MemoryCursor::single_row(
            metadata.clone(),
            vec![SqlValue::F32(1.5), SqlValue::F64(-2.25)],
        );
        let record = RecordMarshaller::for_source(ORACLE, fields.clone(), &metadata)
            .unwrap()
            .read_record(&cur)
            .unwrap();
        assert_eq!(record.get("F"), Some(&Value::Float(1.5)));
        assert_eq!(record.get("D"), Some(&Value::Double(-2.25)));

        let mut stmt = MemoryStatement::new();
        RecordMarshaller::for_sink(ORACLE, fields, &metadata)
            .unwrap()
            .write_record(&mut stmt, &record)
            .unwrap();
        assert_eq!(stmt.params(), &[(1, SqlValue::F32(1.5)), (2, SqlValue::F64(-2.25))]);
    }

    #[test]
    fn test_bfile_is_read_only() {
        let metadata = vec![col("DOC", BFILE, "BFILE")];
        let fields = vec![Field::new("DOC", UniversalType::bytes())];
        let m = RecordMarshaller::for_sink(ORACLE, fields, &metadata).unwrap();
        let err = m
            .write_record(
                &mut MemoryStatement::new(),
                &Record::new().with("DOC", Value::Bytes(vec![1, 2, 3])),
            )
            .unwrap_err();
        assert!(err.to_string().contains("BFILE"));
    }

    #[test]
    fn test_double_into_number_binds_f64() {
        let metadata = vec![col("N", TypeCode::NUMERIC, "NUMBER")];
        let fields = vec![Field::new("N", UniversalType::double())];
        let mut stmt = MemoryStatement::new();
        RecordMarshaller::for_sink(ORACLE, fields, &metadata)
            .unwrap()
            .write_record(&mut stmt, &Record::new().with("N", Value::Double(0.5)))
            .unwrap();
        assert_eq!(stmt.params(), &[(1, SqlValue::F64(0.5))]);
    }
}
