//! Field compatibility validation.
//!
//! Compares a declared schema against the column metadata a database actually
//! reports and collects every mismatch instead of stopping at the first one.
//! The dialect's compatibility override is asked first; when it declines, the
//! generic table keyed by the declared type decides.

use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

use serde::Serialize;
use tracing::debug;

use crate::core::schema::{ColumnMetadata, TypeCode};
use crate::core::types::{Field, LogicalType, PhysicalType, UniversalType};
use crate::error::{RecordError, Result};

use super::DialectProfile;

/// Category of a validation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureKind {
    /// A declared field has no column, or a required column has no field.
    MissingField,
    /// Declared type cannot be read from / written to the column type.
    TypeMismatch,
    /// Field and column disagree on nullability: a non-nullable field reads
    /// a nullable column, or a nullable field targets a NOT NULL column.
    NullabilityMismatch,
}

/// Which configured schema the failure points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CauseAttribute {
    /// The schema records arrive with (sink side).
    InputSchemaField,
    /// The schema records leave with (source side).
    OutputSchemaField,
}

/// Direction of the data relative to the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaRole {
    /// Rows are read from the database into records.
    Source,
    /// Records are written into the database.
    Sink,
}

impl SchemaRole {
    pub fn cause(self) -> CauseAttribute {
        match self {
            SchemaRole::Source => CauseAttribute::OutputSchemaField,
            SchemaRole::Sink => CauseAttribute::InputSchemaField,
        }
    }

    fn location(self) -> &'static str {
        match self {
            SchemaRole::Source => "the query result",
            SchemaRole::Sink => "the destination table",
        }
    }
}

/// One schema problem, attributed to a field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationFailure {
    pub kind: FailureKind,
    pub message: String,
    pub field: String,
    pub cause: CauseAttribute,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub corrective_action: Option<String>,
}

impl ValidationFailure {
    pub fn new(
        kind: FailureKind,
        message: impl Into<String>,
        field: impl Into<String>,
        cause: CauseAttribute,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            field: field.into(),
            cause,
            expected: None,
            actual: None,
            corrective_action: None,
        }
    }

    #[must_use]
    pub fn with_types(mut self, expected: impl Into<String>, actual: impl Into<String>) -> Self {
        self.expected = Some(expected.into());
        self.actual = Some(actual.into());
        self
    }

    #[must_use]
    pub fn with_corrective_action(mut self, action: impl Into<String>) -> Self {
        self.corrective_action = Some(action.into());
        self
    }
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(action) = &self.corrective_action {
            write!(f, " ({})", action)?;
        }
        Ok(())
    }
}

/// Sink for validation failures, owned by the caller.
pub trait FailureCollector {
    fn add_failure(&mut self, failure: ValidationFailure);
}

impl FailureCollector for Vec<ValidationFailure> {
    fn add_failure(&mut self, failure: ValidationFailure) {
        self.push(failure);
    }
}

/// Collected failures of one validation pass.
#[derive(Debug, Clone, Default)]
pub struct FailureList {
    failures: Vec<ValidationFailure>,
}

impl FailureList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn len(&self) -> usize {
        self.failures.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ValidationFailure> {
        self.failures.iter()
    }

    pub fn into_vec(self) -> Vec<ValidationFailure> {
        self.failures
    }

    /// `Ok(())` when nothing was collected, otherwise a `Validation` error
    /// carrying every failure.
    pub fn into_result(self) -> Result<()> {
        if self.failures.is_empty() {
            Ok(())
        } else {
            Err(RecordError::Validation(self.failures))
        }
    }
}

impl FailureCollector for FailureList {
    fn add_failure(&mut self, failure: ValidationFailure) {
        self.failures.push(failure);
    }
}

// =============================================================================
// Generic compatibility table
// =============================================================================

/// Declared-type key of the generic compatibility table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum DeclaredKind {
    Null,
    Boolean,
    Int,
    Long,
    Float,
    Double,
    Bytes,
    String,
    Date,
    Time,
    Timestamp,
    Decimal,
    Array,
    Record,
}

impl DeclaredKind {
    fn of(ty: &UniversalType) -> Self {
        match (ty.logical_type(), ty.physical()) {
            (Some(LogicalType::Date), _) => DeclaredKind::Date,
            (Some(LogicalType::TimeMillis | LogicalType::TimeMicros), _) => DeclaredKind::Time,
            (
                Some(LogicalType::TimestampMillis | LogicalType::TimestampMicros),
                _,
            ) => DeclaredKind::Timestamp,
            (Some(LogicalType::Decimal { .. }), _) => DeclaredKind::Decimal,
            (None, PhysicalType::Null) => DeclaredKind::Null,
            (None, PhysicalType::Boolean) => DeclaredKind::Boolean,
            (None, PhysicalType::Int) => DeclaredKind::Int,
            (None, PhysicalType::Long) => DeclaredKind::Long,
            (None, PhysicalType::Float) => DeclaredKind::Float,
            (None, PhysicalType::Double) => DeclaredKind::Double,
            (None, PhysicalType::Bytes) => DeclaredKind::Bytes,
            (None, PhysicalType::String) => DeclaredKind::String,
            (None, PhysicalType::Array(_)) => DeclaredKind::Array,
            (None, PhysicalType::Record(_)) => DeclaredKind::Record,
        }
    }
}

type Accepts = fn(&ColumnMetadata) -> bool;

static GENERIC_COMPATIBILITY: LazyLock<HashMap<DeclaredKind, Accepts>> = LazyLock::new(|| {
    let mut table: HashMap<DeclaredKind, Accepts> = HashMap::new();
    table.insert(DeclaredKind::Null, |_| true);
    table.insert(DeclaredKind::Boolean, |c| {
        matches!(c.type_code, TypeCode::BOOLEAN | TypeCode::BIT)
    });
    table.insert(DeclaredKind::Int, |c| match c.type_code {
        TypeCode::TINYINT | TypeCode::SMALLINT => true,
        TypeCode::INTEGER => c.signed,
        _ => false,
    });
    table.insert(DeclaredKind::Long, |c| match c.type_code {
        TypeCode::BIGINT => true,
        TypeCode::INTEGER => !c.signed,
        _ => false,
    });
    table.insert(DeclaredKind::Float, |c| {
        matches!(c.type_code, TypeCode::REAL | TypeCode::FLOAT)
    });
    table.insert(DeclaredKind::Double, |c| c.type_code == TypeCode::DOUBLE);
    table.insert(DeclaredKind::Bytes, |c| c.type_code.is_binary());
    table.insert(DeclaredKind::String, |c| c.type_code.is_text());
    table.insert(DeclaredKind::Date, |c| c.type_code == TypeCode::DATE);
    table.insert(DeclaredKind::Time, |c| c.type_code == TypeCode::TIME);
    table.insert(DeclaredKind::Timestamp, |c| {
        matches!(
            c.type_code,
            TypeCode::TIMESTAMP | TypeCode::TIMESTAMP_WITH_TIMEZONE
        )
    });
    table.insert(DeclaredKind::Decimal, |c| {
        matches!(c.type_code, TypeCode::NUMERIC | TypeCode::DECIMAL)
    });
    table.insert(DeclaredKind::Array, |c| c.type_code == TypeCode::ARRAY);
    table.insert(DeclaredKind::Record, |c| c.type_code == TypeCode::STRUCT);
    table
});

/// Generic compatibility of a non-nullable declared type with a column.
pub fn generic_compatible(declared: &UniversalType, col: &ColumnMetadata) -> bool {
    GENERIC_COMPATIBILITY
        .get(&DeclaredKind::of(declared))
        .is_some_and(|accepts| accepts(col))
}

/// Compatibility through the dialect override, falling back to the generic table.
pub fn is_compatible(profile: &DialectProfile, declared: &UniversalType, col: &ColumnMetadata) -> bool {
    let declared = declared.non_nullable();
    match (profile.compatibility_override)(&declared, col) {
        Some(answer) => {
            debug!(
                dialect = profile.id,
                column = %col.name,
                compatible = answer,
                "compatibility override answered"
            );
            answer
        }
        None => generic_compatible(&declared, col),
    }
}

fn describe_column(col: &ColumnMetadata) -> String {
    match col.type_code.standard_name() {
        Some(standard) if col.type_name_is(standard) => col.type_name.clone(),
        Some(standard) => format!("{} ({})", col.type_name, standard),
        None => format!("{} (type code {})", col.type_name, col.type_code.0),
    }
}

/// Validate a declared schema against actual column metadata.
///
/// Every declared field is checked; problems go to `collector` and checking
/// continues. A field with a type mismatch yields exactly one failure.
/// Compatible fields are then checked for nullability: for
/// [`SchemaRole::Source`] a non-nullable field over a nullable column is
/// reported, for [`SchemaRole::Sink`] a nullable field targeting a NOT NULL
/// column is. Sink validation also reports NOT NULL columns without a
/// declared field.
pub fn validate(
    profile: &DialectProfile,
    declared: &[Field],
    actual: &[ColumnMetadata],
    role: SchemaRole,
    collector: &mut dyn FailureCollector,
) {
    let cause = role.cause();
    let columns: HashMap<&str, &ColumnMetadata> =
        actual.iter().map(|c| (c.name.as_str(), c)).collect();

    for field in declared {
        let Some(col) = columns.get(field.name.as_str()) else {
            collector.add_failure(
                ValidationFailure::new(
                    FailureKind::MissingField,
                    format!("Field '{}' is not present in {}", field.name, role.location()),
                    &field.name,
                    cause,
                )
                .with_corrective_action(format!(
                    "Remove field '{}' from the schema or add the column",
                    field.name
                )),
            );
            continue;
        };

        if !is_compatible(profile, &field.schema, col) {
            let expected = field.schema.display_name();
            let actual = describe_column(col);
            collector.add_failure(
                ValidationFailure::new(
                    FailureKind::TypeMismatch,
                    format!(
                        "Field '{}' is declared as '{}' but the column type is '{}'",
                        field.name, expected, actual
                    ),
                    &field.name,
                    cause,
                )
                .with_types(expected, actual),
            );
            continue;
        }

        match role {
            SchemaRole::Source if !field.schema.is_nullable() && col.nullable => {
                collector.add_failure(
                    ValidationFailure::new(
                        FailureKind::NullabilityMismatch,
                        format!(
                            "Field '{}' is non-nullable but column '{}' allows NULL",
                            field.name, col.name
                        ),
                        &field.name,
                        cause,
                    )
                    .with_corrective_action("Declare the field as nullable"),
                );
            }
            SchemaRole::Sink if field.schema.is_nullable() && !col.nullable => {
                collector.add_failure(
                    ValidationFailure::new(
                        FailureKind::NullabilityMismatch,
                        format!(
                            "Field '{}' is nullable but column '{}' is NOT NULL",
                            field.name, col.name
                        ),
                        &field.name,
                        cause,
                    )
                    .with_corrective_action("Declare the field as non-nullable"),
                );
            }
            _ => {}
        }
    }

    if role == SchemaRole::Sink {
        for col in actual.iter().filter(|c| !c.nullable) {
            if !declared.iter().any(|f| f.name == col.name) {
                collector.add_failure(
                    ValidationFailure::new(
                        FailureKind::MissingField,
                        format!(
                            "Column '{}' is NOT NULL but the schema has no field for it",
                            col.name
                        ),
                        &col.name,
                        cause,
                    )
                    .with_corrective_action(format!("Add field '{}' to the schema", col.name)),
                );
            }
        }
    }
}

/// [`validate`] into a fresh list.
pub fn validate_schema(
    profile: &DialectProfile,
    declared: &[Field],
    actual: &[ColumnMetadata],
    role: SchemaRole,
) -> Vec<ValidationFailure> {
    let mut failures = Vec::new();
    validate(profile, declared, actual, role, &mut failures);
    failures
}

#[cfg(test)]
mod tests {
    use super::*;

    fn declared() -> Vec<Field> {
        vec![
            Field::new("ID", UniversalType::int()),
            Field::new("NAME", UniversalType::string()),
            Field::new("SCORE", UniversalType::double()),
        ]
    }

    fn columns(score: TypeCode, score_name: &str) -> Vec<ColumnMetadata> {
        vec![
            ColumnMetadata::new("ID", TypeCode::INTEGER, "INTEGER").not_null(),
            ColumnMetadata::new("NAME", TypeCode::VARCHAR, "VARCHAR").not_null(),
            ColumnMetadata::new("SCORE", score, score_name).not_null(),
        ]
    }

    fn generic() -> DialectProfile {
        DialectProfile::generic()
    }

    // =========================================================================
    // Source validation
    // =========================================================================

    #[test]
    fn test_matching_schema_has_no_failures() {
        let failures = validate_schema(
            &generic(),
            &declared(),
            &columns(TypeCode::DOUBLE, "DOUBLE"),
            SchemaRole::Source,
        );
        assert!(failures.is_empty(), "{:?}", failures);
    }

    #[test]
    fn test_type_mismatch_reports_one_failure() {
        let failures = validate_schema(
            &generic(),
            &declared(),
            &columns(TypeCode::VARCHAR, "VARCHAR"),
            SchemaRole::Source,
        );
        assert_eq!(failures.len(), 1);
        let f = &failures[0];
        assert_eq!(f.kind, FailureKind::TypeMismatch);
        assert_eq!(f.field, "SCORE");
        assert_eq!(f.cause, CauseAttribute::OutputSchemaField);
        assert_eq!(f.expected.as_deref(), Some("double"));
        assert_eq!(f.actual.as_deref(), Some("VARCHAR"));
    }

    #[test]
    fn test_missing_column_reports_missing_field() {
        let mut cols = columns(TypeCode::DOUBLE, "DOUBLE");
        cols.pop();
        let failures = validate_schema(&generic(), &declared(), &cols, SchemaRole::Source);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].kind, FailureKind::MissingField);
        assert_eq!(failures[0].field, "SCORE");
    }

    #[test]
    fn test_all_failures_are_collected() {
        let cols = vec![
            ColumnMetadata::new("ID", TypeCode::VARCHAR, "VARCHAR"),
            ColumnMetadata::new("NAME", TypeCode::BLOB, "BLOB"),
        ];
        let failures = validate_schema(&generic(), &declared(), &cols, SchemaRole::Source);
        let kinds: Vec<_> = failures.iter().map(|f| (f.field.as_str(), f.kind)).collect();
        assert_eq!(
            kinds,
            vec![
                ("ID", FailureKind::TypeMismatch),
                ("NAME", FailureKind::TypeMismatch),
                ("SCORE", FailureKind::MissingField),
            ]
        );
    }

    #[test]
    fn test_declared_nullability_is_ignored_for_type_check() {
        let fields = vec![Field::new("SCORE", UniversalType::double().nullable())];
        let cols = vec![ColumnMetadata::new("SCORE", TypeCode::DOUBLE, "DOUBLE").not_null()];
        assert!(validate_schema(&generic(), &fields, &cols, SchemaRole::Source).is_empty());
    }

    #[test]
    fn test_source_non_nullable_field_over_nullable_column() {
        let fields = vec![Field::new("ID", UniversalType::int())];
        let cols = vec![ColumnMetadata::new("ID", TypeCode::INTEGER, "INTEGER")];
        let failures = validate_schema(&generic(), &fields, &cols, SchemaRole::Source);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].kind, FailureKind::NullabilityMismatch);
        assert_eq!(failures[0].field, "ID");
        assert_eq!(failures[0].cause, CauseAttribute::OutputSchemaField);

        let nullable = vec![Field::new("ID", UniversalType::int().nullable())];
        assert!(validate_schema(&generic(), &nullable, &cols, SchemaRole::Source).is_empty());
    }

    #[test]
    fn test_source_nullable_field_over_not_null_column_is_accepted() {
        let fields = vec![Field::new("ID", UniversalType::int().nullable())];
        let cols = vec![ColumnMetadata::new("ID", TypeCode::INTEGER, "INTEGER").not_null()];
        assert!(validate_schema(&generic(), &fields, &cols, SchemaRole::Source).is_empty());
        assert_eq!(validate_schema(&generic(), &fields, &cols, SchemaRole::Sink).len(), 1);
    }

    // =========================================================================
    // Generic table
    // =========================================================================

    #[test]
    fn test_generic_rejects_documented_pairs() {
        let ts = ColumnMetadata::new("T", TypeCode::TIMESTAMP, "TIMESTAMP");
        assert!(!generic_compatible(&UniversalType::long(), &ts));
        assert!(generic_compatible(&UniversalType::timestamp_micros(), &ts));

        let tiny = ColumnMetadata::new("B", TypeCode::TINYINT, "TINYINT");
        assert!(!generic_compatible(&UniversalType::boolean(), &tiny));
        assert!(generic_compatible(&UniversalType::int(), &tiny));
    }

    #[test]
    fn test_generic_integer_signedness() {
        let signed = ColumnMetadata::new("N", TypeCode::INTEGER, "INT");
        let unsigned = ColumnMetadata::new("N", TypeCode::INTEGER, "INT UNSIGNED").unsigned();
        assert!(generic_compatible(&UniversalType::int(), &signed));
        assert!(!generic_compatible(&UniversalType::int(), &unsigned));
        assert!(generic_compatible(&UniversalType::long(), &unsigned));
        assert!(!generic_compatible(&UniversalType::long(), &signed));
    }

    #[test]
    fn test_generic_logical_types() {
        let num = ColumnMetadata::new("P", TypeCode::NUMERIC, "NUMERIC").with_precision(10, 2);
        assert!(generic_compatible(&UniversalType::decimal(10, 2), &num));
        assert!(!generic_compatible(&UniversalType::bytes(), &num));

        let date = ColumnMetadata::new("D", TypeCode::DATE, "DATE");
        assert!(generic_compatible(&UniversalType::date(), &date));
        assert!(!generic_compatible(&UniversalType::int(), &date));

        let anything = ColumnMetadata::new("X", TypeCode(-104), "INTERVAL");
        assert!(generic_compatible(&UniversalType::null(), &anything));
    }

    #[test]
    fn test_override_answer_wins() {
        fn tiny_is_bool(ty: &UniversalType, c: &ColumnMetadata) -> Option<bool> {
            (ty == &UniversalType::boolean() && c.type_code == TypeCode::TINYINT).then_some(true)
        }
        let profile = DialectProfile {
            id: "test",
            compatibility_override: tiny_is_bool,
            ..DialectProfile::GENERIC
        };
        let fields = vec![Field::new("FLAG", UniversalType::boolean().nullable())];
        let cols = vec![ColumnMetadata::new("FLAG", TypeCode::TINYINT, "TINYINT")];
        assert!(validate_schema(&profile, &fields, &cols, SchemaRole::Source).is_empty());
        assert_eq!(validate_schema(&generic(), &fields, &cols, SchemaRole::Source).len(), 1);
    }

    // =========================================================================
    // Sink validation
    // =========================================================================

    #[test]
    fn test_sink_nullable_field_into_not_null_column() {
        let fields = vec![Field::new("ID", UniversalType::int().nullable())];
        let cols = vec![ColumnMetadata::new("ID", TypeCode::INTEGER, "INT").not_null()];
        let failures = validate_schema(&generic(), &fields, &cols, SchemaRole::Sink);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].kind, FailureKind::NullabilityMismatch);
        assert_eq!(failures[0].cause, CauseAttribute::InputSchemaField);
    }

    #[test]
    fn test_sink_reports_required_column_without_field() {
        let fields = vec![Field::new("ID", UniversalType::int())];
        let cols = vec![
            ColumnMetadata::new("ID", TypeCode::INTEGER, "INT").not_null(),
            ColumnMetadata::new("CREATED", TypeCode::TIMESTAMP, "TIMESTAMP").not_null(),
            ColumnMetadata::new("NOTE", TypeCode::VARCHAR, "VARCHAR"),
        ];
        let failures = validate_schema(&generic(), &fields, &cols, SchemaRole::Sink);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].kind, FailureKind::MissingField);
        assert_eq!(failures[0].field, "CREATED");
    }

    #[test]
    fn test_failure_list_into_result() {
        let mut list = FailureList::new();
        assert!(list.clone().into_result().is_ok());
        validate(
            &generic(),
            &declared(),
            &columns(TypeCode::VARCHAR, "VARCHAR"),
            SchemaRole::Source,
            &mut list,
        );
        assert_eq!(list.len(), 1);
        let err = list.into_result().unwrap_err();
        assert!(matches!(err, RecordError::Validation(ref f) if f.len() == 1));
    }

    #[test]
    fn test_failure_serializes_kind_names() {
        let failure = ValidationFailure::new(
            FailureKind::TypeMismatch,
            "bad",
            "A",
            CauseAttribute::InputSchemaField,
        );
        let json = serde_json::to_value(&failure).unwrap();
        assert_eq!(json["kind"], "TYPE_MISMATCH");
        assert_eq!(json["cause"], "INPUT_SCHEMA_FIELD");
        assert!(json.get("expected").is_none());
    }
}
