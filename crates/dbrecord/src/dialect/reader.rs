//! Schema reader: column metadata → universal type.
//!
//! The dialect's schema override is consulted first. When it declines, the
//! generic table keyed by standard type code decides; codes with no entry
//! (and NUMERIC/DECIMAL without a declared precision) are unsupported.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use tracing::debug;

use crate::core::schema::{ColumnMetadata, TypeCode};
use crate::core::types::{Field, UniversalType};
use crate::error::{RecordError, Result};

use super::DialectProfile;

/// Fractional-second digits above which time values need microseconds.
const MILLIS_SCALE: i32 = 3;

type GenericMapping = fn(&ColumnMetadata) -> Option<UniversalType>;

static GENERIC_SCHEMA: LazyLock<HashMap<TypeCode, GenericMapping>> = LazyLock::new(|| {
    let mut table: HashMap<TypeCode, GenericMapping> = HashMap::new();

    for code in [TypeCode::TINYINT, TypeCode::SMALLINT] {
        table.insert(code, |_| Some(UniversalType::int()));
    }
    table.insert(TypeCode::INTEGER, |col| {
        Some(if col.signed {
            UniversalType::int()
        } else {
            UniversalType::long()
        })
    });
    table.insert(TypeCode::BIGINT, |_| Some(UniversalType::long()));
    for code in [TypeCode::REAL, TypeCode::FLOAT] {
        table.insert(code, |_| Some(UniversalType::float()));
    }
    table.insert(TypeCode::DOUBLE, |_| Some(UniversalType::double()));
    for code in [TypeCode::BIT, TypeCode::BOOLEAN] {
        table.insert(code, |_| Some(UniversalType::boolean()));
    }
    for code in [
        TypeCode::CHAR,
        TypeCode::VARCHAR,
        TypeCode::LONGVARCHAR,
        TypeCode::CLOB,
        TypeCode::NCHAR,
        TypeCode::NVARCHAR,
        TypeCode::LONGNVARCHAR,
        TypeCode::NCLOB,
    ] {
        table.insert(code, |_| Some(UniversalType::string()));
    }
    for code in [
        TypeCode::BINARY,
        TypeCode::VARBINARY,
        TypeCode::LONGVARBINARY,
        TypeCode::BLOB,
    ] {
        table.insert(code, |_| Some(UniversalType::bytes()));
    }
    table.insert(TypeCode::DATE, |_| Some(UniversalType::date()));
    table.insert(TypeCode::TIME, |col| {
        Some(if col.scale <= MILLIS_SCALE {
            UniversalType::time_millis()
        } else {
            UniversalType::time_micros()
        })
    });
    for code in [TypeCode::TIMESTAMP, TypeCode::TIMESTAMP_WITH_TIMEZONE] {
        table.insert(code, |col| Some(timestamp_for_scale(col.scale)));
    }
    for code in [TypeCode::NUMERIC, TypeCode::DECIMAL] {
        table.insert(code, decimal_for_column);
    }

    table
});

/// TIMESTAMP_MILLIS up to 3 fractional digits, TIMESTAMP_MICROS beyond.
pub fn timestamp_for_scale(scale: i32) -> UniversalType {
    if scale <= MILLIS_SCALE {
        UniversalType::timestamp_millis()
    } else {
        UniversalType::timestamp_micros()
    }
}

/// DECIMAL(precision, scale) for a column with a declared precision.
///
/// Precision 0 means the database did not declare one; there is no scale to
/// build a decimal from, so that case is left to the dialect.
pub fn decimal_for_column(col: &ColumnMetadata) -> Option<UniversalType> {
    if col.precision <= 0 {
        return None;
    }
    let precision = col.precision as u32;
    let scale = col.scale.clamp(0, col.precision) as u32;
    Some(UniversalType::decimal(precision, scale))
}

/// Generic mapping for a column, ignoring dialect overrides and nullability.
pub fn generic_type(col: &ColumnMetadata) -> Option<UniversalType> {
    GENERIC_SCHEMA.get(&col.type_code).and_then(|map| map(col))
}

/// Infer the universal type of one column.
///
/// The result is nullable unless the column is declared NOT NULL.
///
/// # Errors
///
/// `RecordError::UnsupportedType` when neither the dialect nor the generic
/// table can map the column.
pub fn infer_type(profile: &DialectProfile, col: &ColumnMetadata) -> Result<UniversalType> {
    let ty = match (profile.schema_override)(col) {
        Some(ty) => {
            debug!(
                dialect = profile.id,
                column = %col.name,
                type_name = %col.type_name,
                "schema override mapped column to {}",
                ty.display_name()
            );
            ty
        }
        None => generic_type(col).ok_or_else(|| {
            RecordError::unsupported(&col.name, col.type_code.0, &col.type_name)
        })?,
    };

    Ok(ty.with_nullable(col.nullable))
}

/// Infer the ordered field list of a result set.
///
/// # Errors
///
/// Fails on the first unsupported column, or when two columns share a name
/// (records look fields up by name).
pub fn infer_schema(profile: &DialectProfile, columns: &[ColumnMetadata]) -> Result<Vec<Field>> {
    let mut seen = HashSet::with_capacity(columns.len());
    let mut fields = Vec::with_capacity(columns.len());

    for col in columns {
        if !seen.insert(col.name.as_str()) {
            return Err(RecordError::Config(format!(
                "Duplicate column name '{}' in result set; alias the column in the query",
                col.name
            )));
        }
        fields.push(Field::new(col.name.clone(), infer_type(profile, col)?));
    }

    debug!(dialect = profile.id, columns = fields.len(), "inferred schema");
    Ok(fields)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn col(name: &str, code: TypeCode, type_name: &str) -> ColumnMetadata {
        ColumnMetadata::new(name, code, type_name).not_null()
    }

    fn generic(c: &ColumnMetadata) -> UniversalType {
        infer_type(&DialectProfile::generic(), c).unwrap()
    }

    #[test]
    fn test_integer_family() {
        assert_eq!(generic(&col("A", TypeCode::TINYINT, "TINYINT")), UniversalType::int());
        assert_eq!(generic(&col("A", TypeCode::SMALLINT, "SMALLINT")), UniversalType::int());
        assert_eq!(generic(&col("A", TypeCode::INTEGER, "INT")), UniversalType::int());
        assert_eq!(
            generic(&col("A", TypeCode::INTEGER, "INT UNSIGNED").unsigned()),
            UniversalType::long()
        );
        assert_eq!(generic(&col("A", TypeCode::BIGINT, "BIGINT")), UniversalType::long());
    }

    #[test]
    fn test_floating_and_text() {
        assert_eq!(generic(&col("A", TypeCode::REAL, "REAL")), UniversalType::float());
        assert_eq!(generic(&col("A", TypeCode::FLOAT, "FLOAT")), UniversalType::float());
        assert_eq!(generic(&col("A", TypeCode::DOUBLE, "DOUBLE")), UniversalType::double());
        assert_eq!(generic(&col("A", TypeCode::NCLOB, "NCLOB")), UniversalType::string());
        assert_eq!(generic(&col("A", TypeCode::BLOB, "BLOB")), UniversalType::bytes());
        assert_eq!(generic(&col("A", TypeCode::BIT, "BIT")), UniversalType::boolean());
    }

    #[test]
    fn test_temporal_scale_selects_precision() {
        assert_eq!(generic(&col("D", TypeCode::DATE, "DATE")), UniversalType::date());
        assert_eq!(
            generic(&col("T", TypeCode::TIME, "TIME").with_precision(0, 3)),
            UniversalType::time_millis()
        );
        assert_eq!(
            generic(&col("T", TypeCode::TIME, "TIME").with_precision(0, 6)),
            UniversalType::time_micros()
        );
        assert_eq!(
            generic(&col("TS", TypeCode::TIMESTAMP, "TIMESTAMP")),
            UniversalType::timestamp_millis()
        );
        assert_eq!(
            generic(&col("TS", TypeCode::TIMESTAMP, "DATETIME2").with_precision(0, 7)),
            UniversalType::timestamp_micros()
        );
    }

    #[test]
    fn test_decimal_uses_precision_and_scale() {
        let c = col("PRICE", TypeCode::NUMERIC, "NUMERIC").with_precision(10, 2);
        assert_eq!(generic(&c), UniversalType::decimal(10, 2));
    }

    #[test]
    fn test_decimal_without_precision_is_unsupported() {
        let c = col("N", TypeCode::NUMERIC, "numeric");
        let err = infer_type(&DialectProfile::generic(), &c).unwrap_err();
        assert!(matches!(err, RecordError::UnsupportedType { code: 2, .. }));
    }

    #[test]
    fn test_nullable_column_yields_nullable_type() {
        let c = ColumnMetadata::new("NAME", TypeCode::VARCHAR, "VARCHAR");
        assert_eq!(generic(&c), UniversalType::string().nullable());
    }

    #[test]
    fn test_unknown_code_is_unsupported() {
        let c = col("GEO", TypeCode::OTHER, "sdo_geometry");
        let err = infer_type(&DialectProfile::generic(), &c).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("GEO"));
        assert!(msg.contains("sdo_geometry"));
    }

    #[test]
    fn test_override_takes_precedence() {
        fn tiny_bool(c: &ColumnMetadata) -> Option<UniversalType> {
            (c.type_code == TypeCode::TINYINT).then(UniversalType::boolean)
        }
        let profile = DialectProfile {
            id: "test",
            schema_override: tiny_bool,
            ..DialectProfile::GENERIC
        };
        let c = ColumnMetadata::new("FLAG", TypeCode::TINYINT, "TINYINT");
        assert_eq!(
            infer_type(&profile, &c).unwrap(),
            UniversalType::boolean().nullable()
        );
        let c = col("N", TypeCode::INTEGER, "INT");
        assert_eq!(infer_type(&profile, &c).unwrap(), UniversalType::int());
    }

    #[test]
    fn test_infer_schema_keeps_order() {
        let columns = vec![
            col("ID", TypeCode::INTEGER, "INT"),
            col("NAME", TypeCode::VARCHAR, "VARCHAR"),
            col("SCORE", TypeCode::DOUBLE, "DOUBLE"),
        ];
        let fields = infer_schema(&DialectProfile::generic(), &columns).unwrap();
        let names: Vec<_> = fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["ID", "NAME", "SCORE"]);
        assert_eq!(fields[2].schema, UniversalType::double());
    }

    #[test]
    fn test_infer_schema_rejects_duplicate_names() {
        let columns = vec![
            col("ID", TypeCode::INTEGER, "INT"),
            col("ID", TypeCode::BIGINT, "BIGINT"),
        ];
        let err = infer_schema(&DialectProfile::generic(), &columns).unwrap_err();
        assert!(err.to_string().contains("Duplicate column name 'ID'"));
    }
}
