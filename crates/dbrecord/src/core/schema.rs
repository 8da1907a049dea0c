//! Column metadata types reported by the driver layer.
//!
//! [`ColumnMetadata`] is the raw per-column description a driver reports for a
//! result set or destination table. [`ColumnType`] is the compact, immutable
//! view the record marshaller keeps for the lifetime of one work unit.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Driver type code of a column.
///
/// Standard codes follow the JDBC `java.sql.Types` numbering, which most
/// drivers report. Vendor codes outside that set (e.g. Oracle's interval
/// codes) are carried as-is and are only meaningful to a dialect profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeCode(pub i32);

impl TypeCode {
    pub const BIT: TypeCode = TypeCode(-7);
    pub const TINYINT: TypeCode = TypeCode(-6);
    pub const SMALLINT: TypeCode = TypeCode(5);
    pub const INTEGER: TypeCode = TypeCode(4);
    pub const BIGINT: TypeCode = TypeCode(-5);
    pub const FLOAT: TypeCode = TypeCode(6);
    pub const REAL: TypeCode = TypeCode(7);
    pub const DOUBLE: TypeCode = TypeCode(8);
    pub const NUMERIC: TypeCode = TypeCode(2);
    pub const DECIMAL: TypeCode = TypeCode(3);
    pub const CHAR: TypeCode = TypeCode(1);
    pub const VARCHAR: TypeCode = TypeCode(12);
    pub const LONGVARCHAR: TypeCode = TypeCode(-1);
    pub const DATE: TypeCode = TypeCode(91);
    pub const TIME: TypeCode = TypeCode(92);
    pub const TIMESTAMP: TypeCode = TypeCode(93);
    pub const BINARY: TypeCode = TypeCode(-2);
    pub const VARBINARY: TypeCode = TypeCode(-3);
    pub const LONGVARBINARY: TypeCode = TypeCode(-4);
    pub const NULL: TypeCode = TypeCode(0);
    pub const OTHER: TypeCode = TypeCode(1111);
    pub const JAVA_OBJECT: TypeCode = TypeCode(2000);
    pub const DISTINCT: TypeCode = TypeCode(2001);
    pub const STRUCT: TypeCode = TypeCode(2002);
    pub const ARRAY: TypeCode = TypeCode(2003);
    pub const BLOB: TypeCode = TypeCode(2004);
    pub const CLOB: TypeCode = TypeCode(2005);
    pub const REF: TypeCode = TypeCode(2006);
    pub const DATALINK: TypeCode = TypeCode(70);
    pub const BOOLEAN: TypeCode = TypeCode(16);
    pub const ROWID: TypeCode = TypeCode(-8);
    pub const NCHAR: TypeCode = TypeCode(-15);
    pub const NVARCHAR: TypeCode = TypeCode(-9);
    pub const LONGNVARCHAR: TypeCode = TypeCode(-16);
    pub const NCLOB: TypeCode = TypeCode(2011);
    pub const SQLXML: TypeCode = TypeCode(2009);
    pub const TIME_WITH_TIMEZONE: TypeCode = TypeCode(2013);
    pub const TIMESTAMP_WITH_TIMEZONE: TypeCode = TypeCode(2014);

    /// Standard name of the code, if it is one of the JDBC codes.
    pub fn standard_name(self) -> Option<&'static str> {
        let name = match self {
            TypeCode::BIT => "BIT",
            TypeCode::TINYINT => "TINYINT",
            TypeCode::SMALLINT => "SMALLINT",
            TypeCode::INTEGER => "INTEGER",
            TypeCode::BIGINT => "BIGINT",
            TypeCode::FLOAT => "FLOAT",
            TypeCode::REAL => "REAL",
            TypeCode::DOUBLE => "DOUBLE",
            TypeCode::NUMERIC => "NUMERIC",
            TypeCode::DECIMAL => "DECIMAL",
            TypeCode::CHAR => "CHAR",
            TypeCode::VARCHAR => "VARCHAR",
            TypeCode::LONGVARCHAR => "LONGVARCHAR",
            TypeCode::DATE => "DATE",
            TypeCode::TIME => "TIME",
            TypeCode::TIMESTAMP => "TIMESTAMP",
            TypeCode::BINARY => "BINARY",
            TypeCode::VARBINARY => "VARBINARY",
            TypeCode::LONGVARBINARY => "LONGVARBINARY",
            TypeCode::NULL => "NULL",
            TypeCode::OTHER => "OTHER",
            TypeCode::JAVA_OBJECT => "JAVA_OBJECT",
            TypeCode::DISTINCT => "DISTINCT",
            TypeCode::STRUCT => "STRUCT",
            TypeCode::ARRAY => "ARRAY",
            TypeCode::BLOB => "BLOB",
            TypeCode::CLOB => "CLOB",
            TypeCode::REF => "REF",
            TypeCode::DATALINK => "DATALINK",
            TypeCode::BOOLEAN => "BOOLEAN",
            TypeCode::ROWID => "ROWID",
            TypeCode::NCHAR => "NCHAR",
            TypeCode::NVARCHAR => "NVARCHAR",
            TypeCode::LONGNVARCHAR => "LONGNVARCHAR",
            TypeCode::NCLOB => "NCLOB",
            TypeCode::SQLXML => "SQLXML",
            TypeCode::TIME_WITH_TIMEZONE => "TIME_WITH_TIMEZONE",
            TypeCode::TIMESTAMP_WITH_TIMEZONE => "TIMESTAMP_WITH_TIMEZONE",
            _ => return None,
        };
        Some(name)
    }

    /// Character data family.
    pub fn is_text(self) -> bool {
        matches!(
            self,
            TypeCode::CHAR
                | TypeCode::VARCHAR
                | TypeCode::LONGVARCHAR
                | TypeCode::CLOB
                | TypeCode::NCHAR
                | TypeCode::NVARCHAR
                | TypeCode::LONGNVARCHAR
                | TypeCode::NCLOB
        )
    }

    /// Binary data family.
    pub fn is_binary(self) -> bool {
        matches!(
            self,
            TypeCode::BINARY | TypeCode::VARBINARY | TypeCode::LONGVARBINARY | TypeCode::BLOB
        )
    }
}

impl fmt::Display for TypeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.standard_name() {
            Some(name) => write!(f, "{}", name),
            None => write!(f, "{}", self.0),
        }
    }
}

/// Column metadata as reported by the driver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMetadata {
    /// Column name (or label) as reported by the driver.
    pub name: String,

    /// Driver type code.
    pub type_code: TypeCode,

    /// Driver type name (e.g., "VARCHAR", "tinyint unsigned", "DECFLOAT").
    pub type_name: String,

    /// Numeric precision, or display size for character types.
    #[serde(default)]
    pub precision: i32,

    /// Numeric scale, or fractional-seconds digits for time types.
    #[serde(default)]
    pub scale: i32,

    /// Whether numeric values are signed.
    #[serde(default = "default_true")]
    pub signed: bool,

    /// Whether the column allows NULL.
    #[serde(default = "default_true")]
    pub nullable: bool,
}

fn default_true() -> bool {
    true
}

impl ColumnMetadata {
    /// Create nullable, signed metadata with zero precision and scale.
    pub fn new(name: impl Into<String>, type_code: TypeCode, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_code,
            type_name: type_name.into(),
            precision: 0,
            scale: 0,
            signed: true,
            nullable: true,
        }
    }

    /// Set numeric precision and scale.
    #[must_use]
    pub fn with_precision(mut self, precision: i32, scale: i32) -> Self {
        self.precision = precision;
        self.scale = scale;
        self
    }

    /// Mark as NOT NULL.
    #[must_use]
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Mark as unsigned.
    #[must_use]
    pub fn unsigned(mut self) -> Self {
        self.signed = false;
        self
    }

    /// Whether the driver type name matches, ignoring ASCII case.
    pub fn type_name_is(&self, name: &str) -> bool {
        self.type_name.eq_ignore_ascii_case(name)
    }

    /// Compact marshaller view at the given 1-based ordinal.
    pub fn column_type(&self, ordinal: usize) -> ColumnType {
        ColumnType {
            name: self.name.clone(),
            type_name: self.type_name.clone(),
            type_code: self.type_code,
            ordinal,
        }
    }
}

/// Per-column type information owned by a record marshaller.
///
/// Produced once per result set or destination table and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnType {
    /// Column name.
    pub name: String,

    /// Driver type name.
    pub type_name: String,

    /// Driver type code.
    pub type_code: TypeCode,

    /// Ordinal position (1-based) in the result set or statement.
    pub ordinal: usize,
}

impl ColumnType {
    /// Whether the driver type name matches, ignoring ASCII case.
    pub fn type_name_is(&self, name: &str) -> bool {
        self.type_name.eq_ignore_ascii_case(name)
    }
}

/// Build marshaller column types from metadata, numbering ordinals from 1.
pub fn column_types(columns: &[ColumnMetadata]) -> Vec<ColumnType> {
    columns
        .iter()
        .enumerate()
        .map(|(i, c)| c.column_type(i + 1))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_code_names() {
        assert_eq!(TypeCode::INTEGER.to_string(), "INTEGER");
        assert_eq!(TypeCode::TIMESTAMP_WITH_TIMEZONE.to_string(), "TIMESTAMP_WITH_TIMEZONE");
        assert_eq!(TypeCode(-104).to_string(), "-104");
        assert!(TypeCode(-104).standard_name().is_none());
    }

    #[test]
    fn test_type_code_families() {
        assert!(TypeCode::NVARCHAR.is_text());
        assert!(TypeCode::CLOB.is_text());
        assert!(!TypeCode::SQLXML.is_text());
        assert!(TypeCode::BLOB.is_binary());
        assert!(!TypeCode::VARCHAR.is_binary());
    }

    #[test]
    fn test_column_metadata_builders() {
        let col = ColumnMetadata::new("PRICE", TypeCode::NUMERIC, "NUMERIC")
            .with_precision(10, 2)
            .not_null();
        assert_eq!(col.precision, 10);
        assert_eq!(col.scale, 2);
        assert!(!col.nullable);
        assert!(col.signed);
        assert!(col.type_name_is("numeric"));
    }

    #[test]
    fn test_column_types_are_one_based() {
        let cols = vec![
            ColumnMetadata::new("ID", TypeCode::INTEGER, "INT"),
            ColumnMetadata::new("NAME", TypeCode::VARCHAR, "VARCHAR"),
        ];
        let types = column_types(&cols);
        assert_eq!(types[0].ordinal, 1);
        assert_eq!(types[1].ordinal, 2);
        assert_eq!(types[1].name, "NAME");
        assert_eq!(types[1].type_code, TypeCode::VARCHAR);
    }

    #[test]
    fn test_metadata_json_defaults() {
        let col: ColumnMetadata =
            serde_json::from_str(r#"{"name": "ID", "type_code": 4, "type_name": "INT"}"#).unwrap();
        assert_eq!(col.type_code, TypeCode::INTEGER);
        assert!(col.nullable);
        assert!(col.signed);
        assert_eq!(col.precision, 0);
    }
}
