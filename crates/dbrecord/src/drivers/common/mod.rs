//! Helpers shared by the built-in dialect profiles.

use crate::core::schema::ColumnType;
use crate::core::traits::ParamStatement;
use crate::core::types::{Field, LogicalType, PhysicalType};
use crate::core::value::{SqlValue, Value};
use crate::error::Result;

/// Case-insensitive membership of a driver type name.
pub(crate) fn type_name_in(type_name: &str, names: &[&str]) -> bool {
    names.iter().any(|n| type_name.eq_ignore_ascii_case(n))
}

/// Lift a getter result into a read-override answer, mapping SQL NULL to `Value::Null`.
pub(crate) fn read_as<T>(
    result: Result<Option<T>>,
    to_value: impl FnOnce(T) -> Value,
) -> Option<Result<Value>> {
    Some(result.map(|v| v.map(to_value).unwrap_or(Value::Null)))
}

/// Bind a vendor-typed value through the object wrapper.
pub(crate) fn bind_object(
    stmt: &mut dyn ParamStatement,
    col: &ColumnType,
    text: &str,
) -> Option<Result<()>> {
    Some(stmt.bind(
        col.ordinal,
        SqlValue::Object {
            type_name: col.type_name.clone(),
            text: text.to_string(),
        },
    ))
}

pub(crate) fn is_string(field: &Field) -> bool {
    field.schema.logical_type().is_none() && field.schema.physical() == &PhysicalType::String
}

pub(crate) fn is_decimal(field: &Field) -> bool {
    matches!(field.schema.logical_type(), Some(LogicalType::Decimal { .. }))
}

pub(crate) fn is_physical(field: &Field, physical: PhysicalType) -> bool {
    field.schema.logical_type().is_none() && field.schema.physical() == &physical
}
