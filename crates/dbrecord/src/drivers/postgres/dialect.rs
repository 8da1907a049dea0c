//! PostgreSQL dialect profile.
//!
//! Vendor types without a universal counterpart (json, uuid, inet, the
//! geometric types, ...) are carried as STRING. They are read as text and
//! written back through the driver's object wrapper, so the server casts the
//! text to the column type on insert.
//!
//! NUMERIC declared without a precision has no scale to build a DECIMAL from
//! and infers STRING. A declared DECIMAL is still accepted over such a column
//! and is read rounding half-even to the declared scale.

use std::str::FromStr;

use rust_decimal::Decimal;
use tracing::warn;

use crate::core::schema::{ColumnMetadata, ColumnType, TypeCode};
use crate::core::traits::{ParamStatement, RowCursor};
use crate::core::types::{Field, PhysicalType, UniversalType};
use crate::core::value::{SqlValue, Value};
use crate::dialect::record::rescale_half_even;
use crate::dialect::DialectProfile;
use crate::drivers::common::{bind_object, is_decimal, is_string, read_as, type_name_in};
use crate::error::{RecordError, Result};

/// Type names read and written as text.
const STRING_TYPES: &[&str] = &[
    "interval", "json", "jsonb", "xml", "uuid", "money", "inet", "cidr", "macaddr", "macaddr8",
    "varbit", "timetz", "point", "line", "lseg", "box", "path", "polygon", "circle", "tsvector",
    "tsquery",
];

/// Largest precision a NUMERIC(p, s) column can declare.
const MAX_NUMERIC_PRECISION: i32 = 1000;

pub const POSTGRES: DialectProfile = DialectProfile {
    id: "postgres",
    schema_override,
    compatibility_override,
    read_override,
    write_override,
    ..DialectProfile::GENERIC
};

/// `bit(n)` with n > 1 is a bit string; `bit(1)` stays a boolean.
fn is_bit_string(col: &ColumnMetadata) -> bool {
    col.type_name_is("bit") && col.precision != 1
}

fn is_text_mapped(col: &ColumnMetadata) -> bool {
    type_name_in(&col.type_name, STRING_TYPES) || is_bit_string(col)
}

/// The driver reports precision 0 (or its internal maximum) for a bare NUMERIC.
fn is_unbounded_numeric(col: &ColumnMetadata) -> bool {
    col.type_code == TypeCode::NUMERIC
        && (col.precision <= 0 || col.precision > MAX_NUMERIC_PRECISION)
}

fn schema_override(col: &ColumnMetadata) -> Option<UniversalType> {
    if is_text_mapped(col) {
        return Some(UniversalType::string());
    }
    if is_unbounded_numeric(col) {
        warn!(
            column = %col.name,
            "NUMERIC without declared precision mapped to string; declare a decimal to read it exactly"
        );
        return Some(UniversalType::string());
    }
    None
}

fn compatibility_override(ty: &UniversalType, col: &ColumnMetadata) -> Option<bool> {
    match ty.physical() {
        PhysicalType::String if ty.logical_type().is_none() => {
            if is_text_mapped(col) || is_unbounded_numeric(col) {
                Some(true)
            } else {
                None
            }
        }
        PhysicalType::Bytes if ty.decimal_scale().is_some() && is_unbounded_numeric(col) => {
            Some(true)
        }
        _ => None,
    }
}

/// Column-side check for the marshaller, which only sees the type name.
fn is_text_mapped_name(type_name: &str) -> bool {
    type_name_in(type_name, STRING_TYPES) || type_name.eq_ignore_ascii_case("bit")
}

fn read_override(cur: &dyn RowCursor, field: &Field, col: &ColumnType) -> Option<Result<Value>> {
    if is_string(field) && (is_text_mapped_name(&col.type_name) || col.type_code == TypeCode::NUMERIC)
    {
        return read_as(cur.get_string(col.ordinal), Value::String);
    }
    if is_decimal(field) && col.type_code == TypeCode::NUMERIC {
        let scale = field.schema.decimal_scale().unwrap_or(0);
        return read_as(cur.get_decimal(col.ordinal, scale), |d| {
            Value::Decimal(rescale_half_even(d, scale))
        });
    }
    None
}

fn write_override(
    stmt: &mut dyn ParamStatement,
    field: &Field,
    col: &ColumnType,
    value: &Value,
) -> Option<Result<()>> {
    let Value::String(text) = value else {
        return None;
    };
    if is_text_mapped_name(&col.type_name) {
        return bind_object(stmt, col, text);
    }
    if col.type_code == TypeCode::NUMERIC {
        let parsed = Decimal::from_str(text.trim()).map_err(|e| {
            RecordError::conversion(&field.name, format!("'{}' is not a numeric value: {}", text, e))
        });
        return Some(parsed.and_then(|d| stmt.bind(col.ordinal, SqlValue::Decimal(d))));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::value::Record;
    use crate::dialect::record::RecordMarshaller;
    use crate::dialect::{infer_type, validate_schema, SchemaRole};
    use crate::drivers::memory::{MemoryCursor, MemoryStatement};

    fn col(name: &str, code: TypeCode, type_name: &str) -> ColumnMetadata {
        ColumnMetadata::new(name, code, type_name)
    }

    // =========================================================================
    // Schema
    // =========================================================================

    #[test]
    fn test_vendor_types_infer_string() {
        for (code, name) in [
            (TypeCode::OTHER, "uuid"),
            (TypeCode::OTHER, "jsonb"),
            (TypeCode::OTHER, "interval"),
            (TypeCode::SQLXML, "xml"),
            (TypeCode::DOUBLE, "money"),
            (TypeCode::TIME, "timetz"),
            (TypeCode::OTHER, "polygon"),
        ] {
            let ty = infer_type(&POSTGRES, &col("C", code, name)).unwrap();
            assert_eq!(ty, UniversalType::string().nullable(), "{}", name);
        }
    }

    #[test]
    fn test_bit_width_decides_mapping() {
        let flag = col("F", TypeCode::BIT, "bit").with_precision(1, 0).not_null();
        assert_eq!(infer_type(&POSTGRES, &flag).unwrap(), UniversalType::boolean());

        let mask = col("M", TypeCode::BIT, "bit").with_precision(8, 0).not_null();
        assert_eq!(infer_type(&POSTGRES, &mask).unwrap(), UniversalType::string());
    }

    #[test]
    fn test_unbounded_numeric_is_string() {
        let bare = col("N", TypeCode::NUMERIC, "numeric").not_null();
        assert_eq!(infer_type(&POSTGRES, &bare).unwrap(), UniversalType::string());

        let sized = col("N", TypeCode::NUMERIC, "numeric").with_precision(10, 2).not_null();
        assert_eq!(infer_type(&POSTGRES, &sized).unwrap(), UniversalType::decimal(10, 2));

        // Without the profile there is no type at all.
        assert!(infer_type(&DialectProfile::GENERIC, &bare).is_err());
    }

    // =========================================================================
    // Compatibility
    // =========================================================================

    #[test]
    fn test_declared_decimal_over_unbounded_numeric() {
        let fields = vec![Field::new("N", UniversalType::decimal(12, 2).nullable())];
        let cols = vec![col("N", TypeCode::NUMERIC, "numeric")];
        assert!(validate_schema(&POSTGRES, &fields, &cols, SchemaRole::Source).is_empty());

        let fields = vec![Field::new("N", UniversalType::string().nullable())];
        assert!(validate_schema(&POSTGRES, &fields, &cols, SchemaRole::Source).is_empty());
    }

    #[test]
    fn test_string_over_uuid_is_compatible() {
        let fields = vec![Field::new("ID", UniversalType::string())];
        let cols = vec![col("ID", TypeCode::OTHER, "uuid").not_null()];
        assert!(validate_schema(&POSTGRES, &fields, &cols, SchemaRole::Sink).is_empty());
        assert_eq!(
            validate_schema(&DialectProfile::GENERIC, &fields, &cols, SchemaRole::Sink).len(),
            1
        );
    }

    // =========================================================================
    // Marshalling
    // =========================================================================

    #[test]
    fn test_unbounded_numeric_reads_half_even() {
        let metadata = vec![col("N", TypeCode::NUMERIC, "numeric")];
        let fields = vec![Field::new("N", UniversalType::decimal(12, 2).nullable())];
        let m = RecordMarshaller::for_source(POSTGRES, fields, &metadata).unwrap();

        let read = |text: &str| {
            let cur = MemoryCursor::single_row(metadata.clone(), vec![SqlValue::Text(text.into())]);
            m.read_record(&cur).unwrap().get("N").cloned()
        };
        assert_eq!(read("1.005"), Some(Value::Decimal(Decimal::new(100, 2))));
        assert_eq!(read("1.015"), Some(Value::Decimal(Decimal::new(102, 2))));
        assert_eq!(read("7"), Some(Value::Decimal(Decimal::new(700, 2))));
    }

    #[test]
    fn test_numeric_with_scale_round_trips() {
        let metadata = vec![col("PRICE", TypeCode::NUMERIC, "numeric").with_precision(10, 2)];
        let fields = vec![Field::new("PRICE", UniversalType::decimal(10, 2).nullable())];
        let price = Decimal::new(12345, 2);

        let cur = MemoryCursor::single_row(metadata.clone(), vec![SqlValue::Decimal(price)]);
        let record = RecordMarshaller::for_source(POSTGRES, fields.clone(), &metadata)
            .unwrap()
            .read_record(&cur)
            .unwrap();
        assert_eq!(record.get("PRICE"), Some(&Value::Decimal(price)));

        let mut stmt = MemoryStatement::new();
        RecordMarshaller::for_sink(POSTGRES, fields, &metadata)
            .unwrap()
            .write_record(&mut stmt, &record)
            .unwrap();
        assert_eq!(stmt.params(), &[(1, SqlValue::Decimal(price))]);
    }

    #[test]
    fn test_vendor_strings_write_as_objects() {
        let metadata = vec![
            col("ID", TypeCode::OTHER, "uuid").not_null(),
            col("DOC", TypeCode::OTHER, "jsonb"),
        ];
        let fields = vec![
            Field::new("ID", UniversalType::string()),
            Field::new("DOC", UniversalType::string().nullable()),
        ];
        let m = RecordMarshaller::for_sink(POSTGRES, fields, &metadata).unwrap();
        let id = "6f1c1d2e-8a51-4e0b-9f8e-0c1b2a3d4e5f";

        let mut stmt = MemoryStatement::new();
        m.write_record(
            &mut stmt,
            &Record::new()
                .with("ID", Value::String(id.into()))
                .with("DOC", Value::Null),
        )
        .unwrap();

        assert_eq!(
            stmt.params()[0],
            (
                1,
                SqlValue::Object {
                    type_name: "uuid".into(),
                    text: id.into()
                }
            )
        );
        assert!(stmt.params()[1].1.is_null());
    }

    #[test]
    fn test_vendor_strings_read_as_text() {
        let metadata = vec![col("ADDR", TypeCode::OTHER, "inet")];
        let fields = vec![Field::new("ADDR", UniversalType::string().nullable())];
        let cur = MemoryCursor::single_row(
            metadata.clone(),
            vec![SqlValue::Object {
                type_name: "inet".into(),
                text: "10.0.0.1/32".into(),
            }],
        );
        let record = RecordMarshaller::for_source(POSTGRES, fields, &metadata)
            .unwrap()
            .read_record(&cur)
            .unwrap();
        assert_eq!(record.get("ADDR"), Some(&Value::String("10.0.0.1/32".into())));
    }

    #[test]
    fn test_bit_string_round_trip() {
        let metadata = vec![col("M", TypeCode::BIT, "bit").with_precision(8, 0).not_null()];
        let fields = vec![Field::new("M", infer_type(&POSTGRES, &metadata[0]).unwrap())];
        let cur = MemoryCursor::single_row(metadata.clone(), vec![SqlValue::Text("10101010".into())]);
        let record = RecordMarshaller::for_source(POSTGRES, fields.clone(), &metadata)
            .unwrap()
            .read_record(&cur)
            .unwrap();
        assert_eq!(record.get("M"), Some(&Value::String("10101010".into())));

        let mut stmt = MemoryStatement::new();
        RecordMarshaller::for_sink(POSTGRES, fields, &metadata)
            .unwrap()
            .write_record(&mut stmt, &record)
            .unwrap();
        assert_eq!(
            stmt.params(),
            &[(
                1,
                SqlValue::Object {
                    type_name: "bit".into(),
                    text: "10101010".into()
                }
            )]
        );
    }

    #[test]
    fn test_numeric_from_string_value() {
        let metadata = vec![col("N", TypeCode::NUMERIC, "numeric")];
        let fields = vec![Field::new("N", UniversalType::string().nullable())];
        let m = RecordMarshaller::for_sink(POSTGRES, fields, &metadata).unwrap();

        let mut stmt = MemoryStatement::new();
        m.write_record(&mut stmt, &Record::new().with("N", Value::String("3.14159".into())))
            .unwrap();
        assert_eq!(stmt.params(), &[(1, SqlValue::Decimal(Decimal::new(314159, 5)))]);

        let bad = Record::new().with("N", Value::String("pi".into()));
        let err = m.write_record(&mut MemoryStatement::new(), &bad).unwrap_err();
        assert!(matches!(err, RecordError::RowConversion { .. }));
    }

    #[test]
    fn test_ansi_escaping() {
        assert_eq!(POSTGRES.escape("order"), "\"order\"");
        assert_eq!(POSTGRES.escape("\"order\""), "\"order\"");
        assert_eq!(POSTGRES.qualify("public", "t").unwrap(), "\"public\".\"t\"");
    }
}
