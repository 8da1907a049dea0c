//! Record marshalling between driver rows and universal records.
//!
//! Read path: cursor column → [`Value`], through the dialect's read override
//! or the generic read table keyed by column type code.
//!
//! Write path: [`Value`] → bound statement parameter, through the dialect's
//! write override or the generic write table. A whole record is staged before
//! anything is bound, so a conversion failure never leaves a half-bound row.
//!
//! Columns whose type code has no generic entry (vendor codes the dialect
//! mapped in its schema override) are read and written by the declared field
//! type instead.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use chrono::{FixedOffset, NaiveDateTime, TimeZone};
use rust_decimal::{Decimal, RoundingStrategy};
use tracing::trace;

use crate::core::schema::{ColumnMetadata, ColumnType, TypeCode};
use crate::core::traits::{ParamStatement, RowCursor};
use crate::core::types::{Field, LogicalType, PhysicalType};
use crate::core::value::{decimal_from_unscaled_bytes, Record, SqlNullType, SqlValue, Value};
use crate::error::{RecordError, Result};

use super::DialectProfile;

// =============================================================================
// Decimal helpers
// =============================================================================

/// Rescale without losing digits. `None` when non-zero digits would be dropped.
pub fn rescale_exact(value: Decimal, scale: u32) -> Option<Decimal> {
    let mut out = if value.scale() > scale {
        let rounded = value.round_dp(scale);
        if rounded != value {
            return None;
        }
        rounded
    } else {
        value
    };
    out.rescale(scale);
    Some(out)
}

/// Rescale rounding half-to-even (banker's rounding).
pub fn rescale_half_even(value: Decimal, scale: u32) -> Decimal {
    let mut out = value.round_dp_with_strategy(scale, RoundingStrategy::MidpointNearestEven);
    out.rescale(scale);
    out
}

fn wants_micros(field: &Field) -> bool {
    matches!(
        field.schema.logical_type(),
        Some(LogicalType::TimeMicros | LogicalType::TimestampMicros)
    )
}

/// Epoch value of `ts` in the unit of the field's timestamp logical type.
pub(crate) fn timestamp_value(field: &Field, ts: NaiveDateTime) -> Value {
    if wants_micros(field) {
        Value::from_timestamp_micros(ts)
    } else {
        Value::from_timestamp_millis(ts)
    }
}

// =============================================================================
// Generic read table
// =============================================================================

/// Reads one column; `Ok(None)` is SQL NULL.
type ReadFn = fn(&dyn RowCursor, &Field, &ColumnType) -> Result<Option<Value>>;

fn read_bool(cur: &dyn RowCursor, _: &Field, col: &ColumnType) -> Result<Option<Value>> {
    Ok(cur.get_bool(col.ordinal)?.map(Value::Boolean))
}

fn read_integer(cur: &dyn RowCursor, field: &Field, col: &ColumnType) -> Result<Option<Value>> {
    if field.schema.physical() == &PhysicalType::Long {
        Ok(cur.get_i64(col.ordinal)?.map(Value::Long))
    } else {
        Ok(cur.get_i32(col.ordinal)?.map(Value::Int))
    }
}

fn read_bigint(cur: &dyn RowCursor, _: &Field, col: &ColumnType) -> Result<Option<Value>> {
    Ok(cur.get_i64(col.ordinal)?.map(Value::Long))
}

fn read_real(cur: &dyn RowCursor, field: &Field, col: &ColumnType) -> Result<Option<Value>> {
    if field.schema.physical() == &PhysicalType::Double {
        Ok(cur.get_f64(col.ordinal)?.map(Value::Double))
    } else {
        Ok(cur.get_f32(col.ordinal)?.map(Value::Float))
    }
}

fn read_double(cur: &dyn RowCursor, _: &Field, col: &ColumnType) -> Result<Option<Value>> {
    Ok(cur.get_f64(col.ordinal)?.map(Value::Double))
}

fn read_string(cur: &dyn RowCursor, _: &Field, col: &ColumnType) -> Result<Option<Value>> {
    Ok(cur.get_string(col.ordinal)?.map(Value::String))
}

fn read_bytes(cur: &dyn RowCursor, _: &Field, col: &ColumnType) -> Result<Option<Value>> {
    Ok(cur.get_bytes(col.ordinal)?.map(Value::Bytes))
}

fn read_date(cur: &dyn RowCursor, _: &Field, col: &ColumnType) -> Result<Option<Value>> {
    Ok(cur.get_date(col.ordinal)?.map(Value::from_date))
}

fn read_time(cur: &dyn RowCursor, field: &Field, col: &ColumnType) -> Result<Option<Value>> {
    let micros = wants_micros(field);
    Ok(cur.get_time(col.ordinal)?.map(|t| {
        if micros {
            Value::from_time_micros(t)
        } else {
            Value::from_time_millis(t)
        }
    }))
}

fn read_timestamp(cur: &dyn RowCursor, field: &Field, col: &ColumnType) -> Result<Option<Value>> {
    Ok(cur
        .get_timestamp(col.ordinal)?
        .map(|ts| timestamp_value(field, ts)))
}

fn read_timestamp_tz(
    cur: &dyn RowCursor,
    field: &Field,
    col: &ColumnType,
) -> Result<Option<Value>> {
    Ok(cur
        .get_timestamp_tz(col.ordinal)?
        .map(|ts| timestamp_value(field, ts.naive_utc())))
}

fn read_decimal(cur: &dyn RowCursor, field: &Field, col: &ColumnType) -> Result<Option<Value>> {
    let Some(scale) = field.schema.decimal_scale() else {
        return Ok(cur.get_decimal(col.ordinal, 0)?.map(Value::Decimal));
    };
    match cur.get_decimal(col.ordinal, scale)? {
        None => Ok(None),
        Some(d) => rescale_exact(d, scale).map(|d| Some(Value::Decimal(d))).ok_or_else(|| {
            RecordError::conversion(
                &field.name,
                format!(
                    "value {} does not fit the declared scale {} without losing digits",
                    d, scale
                ),
            )
        }),
    }
}

static GENERIC_READ: LazyLock<HashMap<TypeCode, ReadFn>> = LazyLock::new(|| {
    let mut table: HashMap<TypeCode, ReadFn> = HashMap::new();
    table.insert(TypeCode::BIT, read_bool);
    table.insert(TypeCode::BOOLEAN, read_bool);
    table.insert(TypeCode::TINYINT, read_integer);
    table.insert(TypeCode::SMALLINT, read_integer);
    table.insert(TypeCode::INTEGER, read_integer);
    table.insert(TypeCode::BIGINT, read_bigint);
    table.insert(TypeCode::REAL, read_real);
    table.insert(TypeCode::FLOAT, read_real);
    table.insert(TypeCode::DOUBLE, read_double);
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
        table.insert(code, read_string);
    }
    for code in [
        TypeCode::BINARY,
        TypeCode::VARBINARY,
        TypeCode::LONGVARBINARY,
        TypeCode::BLOB,
    ] {
        table.insert(code, read_bytes);
    }
    table.insert(TypeCode::DATE, read_date);
    table.insert(TypeCode::TIME, read_time);
    table.insert(TypeCode::TIMESTAMP, read_timestamp);
    table.insert(TypeCode::TIMESTAMP_WITH_TIMEZONE, read_timestamp_tz);
    table.insert(TypeCode::NUMERIC, read_decimal);
    table.insert(TypeCode::DECIMAL, read_decimal);
    table
});

/// Read by the declared field type, for columns the generic table has no entry for.
fn read_by_schema(cur: &dyn RowCursor, field: &Field, col: &ColumnType) -> Result<Option<Value>> {
    match (field.schema.logical_type(), field.schema.physical()) {
        (Some(LogicalType::Date), _) => read_date(cur, field, col),
        (Some(LogicalType::TimeMillis | LogicalType::TimeMicros), _) => read_time(cur, field, col),
        (Some(LogicalType::TimestampMillis | LogicalType::TimestampMicros), _) => {
            read_timestamp(cur, field, col)
        }
        (Some(LogicalType::Decimal { .. }), _) => read_decimal(cur, field, col),
        (None, PhysicalType::Boolean) => read_bool(cur, field, col),
        (None, PhysicalType::Int | PhysicalType::Long) => read_integer(cur, field, col),
        (None, PhysicalType::Float) => read_real(cur, field, col),
        (None, PhysicalType::Double) => read_double(cur, field, col),
        (None, PhysicalType::String) => read_string(cur, field, col),
        (None, PhysicalType::Bytes) => read_bytes(cur, field, col),
        (None, PhysicalType::Null) => Ok(None),
        (None, PhysicalType::Array(_) | PhysicalType::Record(_)) => Err(RecordError::conversion(
            &field.name,
            format!(
                "no reader for {} column '{}' as {}",
                col.type_name,
                col.name,
                field.schema.display_name()
            ),
        )),
    }
}

/// Generic read of one field, ignoring dialect overrides. `Ok(None)` is SQL NULL.
pub fn generic_read(cur: &dyn RowCursor, field: &Field, col: &ColumnType) -> Result<Option<Value>> {
    match GENERIC_READ.get(&col.type_code) {
        Some(read) => read(cur, field, col),
        None => read_by_schema(cur, field, col),
    }
}

/// Read one field from the current row of `cur`.
///
/// # Errors
///
/// `RecordError::RowConversion` when the column cannot be read as the
/// declared type, or holds NULL for a non-nullable field.
pub fn read_field(
    profile: &DialectProfile,
    cur: &dyn RowCursor,
    field: &Field,
    col: &ColumnType,
) -> Result<Value> {
    let value = match (profile.read_override)(cur, field, col) {
        Some(result) => {
            trace!(dialect = profile.id, field = %field.name, "read override");
            result?
        }
        None => generic_read(cur, field, col)?.unwrap_or(Value::Null),
    };

    if value.is_null()
        && !field.schema.is_nullable()
        && field.schema.physical() != &PhysicalType::Null
    {
        return Err(RecordError::conversion(
            &field.name,
            format!("NULL in column '{}' but the field is not nullable", col.name),
        ));
    }
    Ok(value)
}

// =============================================================================
// Generic write table
// =============================================================================

/// Converts a non-null value for a column.
type WriteFn = fn(&Field, &ColumnType, &Value) -> Result<SqlValue>;

fn mismatch(field: &Field, col: &ColumnType, value: &Value) -> RecordError {
    RecordError::conversion(
        &field.name,
        format!(
            "cannot write {} value to {} column '{}'",
            value.kind(),
            col.type_name,
            col.name
        ),
    )
}

fn write_bool(field: &Field, col: &ColumnType, value: &Value) -> Result<SqlValue> {
    match value {
        Value::Boolean(b) => Ok(SqlValue::Bool(*b)),
        other => Err(mismatch(field, col, other)),
    }
}

fn out_of_range(field: &Field, col: &ColumnType, v: i32) -> RecordError {
    RecordError::conversion(
        &field.name,
        format!("value {} out of range for {} column '{}'", v, col.type_name, col.name),
    )
}

fn write_tiny(field: &Field, col: &ColumnType, value: &Value) -> Result<SqlValue> {
    match value {
        Value::Int(v) => i8::try_from(*v)
            .map(|n| SqlValue::I16(i16::from(n)))
            .map_err(|_| out_of_range(field, col, *v)),
        other => Err(mismatch(field, col, other)),
    }
}

fn write_small(field: &Field, col: &ColumnType, value: &Value) -> Result<SqlValue> {
    match value {
        Value::Int(v) => i16::try_from(*v)
            .map(SqlValue::I16)
            .map_err(|_| out_of_range(field, col, *v)),
        other => Err(mismatch(field, col, other)),
    }
}

fn write_integer(field: &Field, col: &ColumnType, value: &Value) -> Result<SqlValue> {
    match value {
        Value::Int(v) => Ok(SqlValue::I32(*v)),
        Value::Long(v) => Ok(SqlValue::I64(*v)),
        other => Err(mismatch(field, col, other)),
    }
}

fn write_bigint(field: &Field, col: &ColumnType, value: &Value) -> Result<SqlValue> {
    match value {
        Value::Long(v) => Ok(SqlValue::I64(*v)),
        Value::Int(v) => Ok(SqlValue::I64(i64::from(*v))),
        other => Err(mismatch(field, col, other)),
    }
}

fn write_real(field: &Field, col: &ColumnType, value: &Value) -> Result<SqlValue> {
    match value {
        Value::Float(v) => Ok(SqlValue::F32(*v)),
        other => Err(mismatch(field, col, other)),
    }
}

fn write_double(field: &Field, col: &ColumnType, value: &Value) -> Result<SqlValue> {
    match value {
        Value::Double(v) => Ok(SqlValue::F64(*v)),
        Value::Float(v) => Ok(SqlValue::F64(f64::from(*v))),
        other => Err(mismatch(field, col, other)),
    }
}

fn write_string(field: &Field, col: &ColumnType, value: &Value) -> Result<SqlValue> {
    match value {
        Value::String(s) => Ok(SqlValue::Text(s.clone())),
        other => Err(mismatch(field, col, other)),
    }
}

fn write_bytes(field: &Field, col: &ColumnType, value: &Value) -> Result<SqlValue> {
    match value {
        Value::Bytes(b) => Ok(SqlValue::Bytes(b.clone())),
        other => Err(mismatch(field, col, other)),
    }
}

fn write_date(field: &Field, col: &ColumnType, value: &Value) -> Result<SqlValue> {
    value
        .as_date()
        .map(SqlValue::Date)
        .ok_or_else(|| mismatch(field, col, value))
}

fn write_time(field: &Field, col: &ColumnType, value: &Value) -> Result<SqlValue> {
    value
        .as_time()
        .map(SqlValue::Time)
        .ok_or_else(|| mismatch(field, col, value))
}

fn decode_timestamp(field: &Field, col: &ColumnType, value: &Value) -> Result<NaiveDateTime> {
    let ts = if wants_micros(field) {
        value.as_timestamp_micros()
    } else {
        value.as_timestamp_millis()
    };
    ts.ok_or_else(|| mismatch(field, col, value))
}

fn write_timestamp(field: &Field, col: &ColumnType, value: &Value) -> Result<SqlValue> {
    decode_timestamp(field, col, value).map(SqlValue::DateTime)
}

fn write_timestamp_tz(field: &Field, col: &ColumnType, value: &Value) -> Result<SqlValue> {
    let ts = decode_timestamp(field, col, value)?;
    let utc = FixedOffset::east_opt(0).ok_or_else(|| mismatch(field, col, value))?;
    Ok(SqlValue::DateTimeOffset(utc.from_utc_datetime(&ts)))
}

fn write_decimal(field: &Field, col: &ColumnType, value: &Value) -> Result<SqlValue> {
    match value {
        Value::Decimal(d) => Ok(SqlValue::Decimal(*d)),
        Value::Bytes(b) => {
            let scale = field.schema.decimal_scale().unwrap_or(0);
            decimal_from_unscaled_bytes(b, scale)
                .map(SqlValue::Decimal)
                .ok_or_else(|| {
                    RecordError::conversion(
                        &field.name,
                        format!("{} bytes do not encode a decimal", b.len()),
                    )
                })
        }
        other => Err(mismatch(field, col, other)),
    }
}

static GENERIC_WRITE: LazyLock<HashMap<TypeCode, WriteFn>> = LazyLock::new(|| {
    let mut table: HashMap<TypeCode, WriteFn> = HashMap::new();
    table.insert(TypeCode::BIT, write_bool);
    table.insert(TypeCode::BOOLEAN, write_bool);
    table.insert(TypeCode::TINYINT, write_tiny);
    table.insert(TypeCode::SMALLINT, write_small);
    table.insert(TypeCode::INTEGER, write_integer);
    table.insert(TypeCode::BIGINT, write_bigint);
    table.insert(TypeCode::REAL, write_real);
    table.insert(TypeCode::FLOAT, write_double);
    table.insert(TypeCode::DOUBLE, write_double);
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
        table.insert(code, write_string);
    }
    for code in [
        TypeCode::BINARY,
        TypeCode::VARBINARY,
        TypeCode::LONGVARBINARY,
        TypeCode::BLOB,
    ] {
        table.insert(code, write_bytes);
    }
    table.insert(TypeCode::DATE, write_date);
    table.insert(TypeCode::TIME, write_time);
    table.insert(TypeCode::TIMESTAMP, write_timestamp);
    table.insert(TypeCode::TIMESTAMP_WITH_TIMEZONE, write_timestamp_tz);
    table.insert(TypeCode::NUMERIC, write_decimal);
    table.insert(TypeCode::DECIMAL, write_decimal);
    table
});

/// Convert by the declared field type, for columns the generic table has no entry for.
fn write_by_schema(field: &Field, col: &ColumnType, value: &Value) -> Result<SqlValue> {
    match (field.schema.logical_type(), value) {
        (Some(LogicalType::Date), _) => write_date(field, col, value),
        (Some(LogicalType::TimeMillis | LogicalType::TimeMicros), _) => {
            write_time(field, col, value)
        }
        (Some(LogicalType::TimestampMillis | LogicalType::TimestampMicros), _) => {
            write_timestamp(field, col, value)
        }
        (_, Value::Decimal(_)) | (Some(LogicalType::Decimal { .. }), _) => {
            write_decimal(field, col, value)
        }
        (None, Value::Boolean(b)) => Ok(SqlValue::Bool(*b)),
        (None, Value::Int(v)) => Ok(SqlValue::I32(*v)),
        (None, Value::Long(v)) => Ok(SqlValue::I64(*v)),
        (None, Value::Float(v)) => Ok(SqlValue::F32(*v)),
        (None, Value::Double(v)) => Ok(SqlValue::F64(*v)),
        (None, Value::String(s)) => Ok(SqlValue::Text(s.clone())),
        (None, Value::Bytes(b)) => Ok(SqlValue::Bytes(b.clone())),
        (None, other) => Err(mismatch(field, col, other)),
    }
}

/// Generic conversion of a non-null value for a column, ignoring dialect overrides.
pub fn generic_write_value(field: &Field, col: &ColumnType, value: &Value) -> Result<SqlValue> {
    match GENERIC_WRITE.get(&col.type_code) {
        Some(write) => write(field, col, value),
        None => write_by_schema(field, col, value),
    }
}

/// Bind one field value at `col.ordinal`.
///
/// NULL binds a typed NULL for the column's type.
///
/// # Errors
///
/// `RecordError::RowConversion` for NULL in a non-nullable field or a value
/// whose runtime kind does not fit the column.
pub fn write_field(
    profile: &DialectProfile,
    stmt: &mut dyn ParamStatement,
    field: &Field,
    col: &ColumnType,
    value: &Value,
) -> Result<()> {
    if value.is_null() && !field.schema.is_nullable() {
        return Err(RecordError::conversion(
            &field.name,
            "NULL value for a non-nullable field",
        ));
    }

    if let Some(result) = (profile.write_override)(stmt, field, col, value) {
        trace!(dialect = profile.id, field = %field.name, "write override");
        return result;
    }

    let param = if value.is_null() {
        SqlValue::Null(SqlNullType::for_type_code(col.type_code))
    } else {
        generic_write_value(field, col, value)?
    };
    stmt.bind(col.ordinal, param)
}

/// Parameters collected before binding a whole row.
#[derive(Debug, Default)]
struct StagedParams {
    params: Vec<(usize, SqlValue)>,
}

impl ParamStatement for StagedParams {
    fn bind(&mut self, index: usize, value: SqlValue) -> Result<()> {
        self.params.push((index, value));
        Ok(())
    }
}

// =============================================================================
// Marshaller
// =============================================================================

/// Per-unit marshaller: a dialect, a schema and the column each field maps to.
///
/// Built once per result set or destination table and shared read-only by
/// every row of the unit.
#[derive(Debug, Clone)]
pub struct RecordMarshaller {
    profile: DialectProfile,
    fields: Arc<[Field]>,
    /// `columns[i]` is the column bound to `fields[i]`.
    columns: Vec<ColumnType>,
}

impl RecordMarshaller {
    /// Marshaller for reading a result set. Fields are matched to result
    /// columns by name; ordinals are the result-set positions.
    ///
    /// # Errors
    ///
    /// `RecordError::RowConversion` when a field has no column of its name.
    pub fn for_source(
        profile: DialectProfile,
        fields: impl Into<Arc<[Field]>>,
        metadata: &[ColumnMetadata],
    ) -> Result<Self> {
        let fields = fields.into();
        let by_name: HashMap<&str, ColumnType> = metadata
            .iter()
            .enumerate()
            .map(|(i, c)| (c.name.as_str(), c.column_type(i + 1)))
            .collect();

        let columns = fields
            .iter()
            .map(|f| {
                by_name.get(f.name.as_str()).cloned().ok_or_else(|| {
                    RecordError::conversion(&f.name, "no column of this name in the result set")
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            profile,
            fields,
            columns,
        })
    }

    /// Marshaller for writing into a table with a statement whose placeholders
    /// follow field order. Ordinals are the placeholder positions.
    ///
    /// # Errors
    ///
    /// `RecordError::RowConversion` when a field has no destination column.
    pub fn for_sink(
        profile: DialectProfile,
        fields: impl Into<Arc<[Field]>>,
        table_columns: &[ColumnMetadata],
    ) -> Result<Self> {
        let fields = fields.into();
        let columns = fields
            .iter()
            .enumerate()
            .map(|(i, f)| {
                table_columns
                    .iter()
                    .find(|c| c.name == f.name)
                    .map(|c| c.column_type(i + 1))
                    .ok_or_else(|| {
                        RecordError::conversion(&f.name, "no destination column of this name")
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            profile,
            fields,
            columns,
        })
    }

    pub fn profile(&self) -> &DialectProfile {
        &self.profile
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn columns(&self) -> &[ColumnType] {
        &self.columns
    }

    /// Read one field of the current row.
    pub fn read_field(&self, cur: &dyn RowCursor, field: &Field, col: &ColumnType) -> Result<Value> {
        read_field(&self.profile, cur, field, col)
    }

    /// Read a complete record from the current row. No partial record is returned.
    pub fn read_record(&self, cur: &dyn RowCursor) -> Result<Record> {
        let mut record = Record::with_capacity(self.fields.len());
        for (field, col) in self.fields.iter().zip(&self.columns) {
            record.set(field.name.clone(), read_field(&self.profile, cur, field, col)?);
        }
        Ok(record)
    }

    /// Bind one field value.
    pub fn write_field(
        &self,
        stmt: &mut dyn ParamStatement,
        field: &Field,
        col: &ColumnType,
        value: &Value,
    ) -> Result<()> {
        write_field(&self.profile, stmt, field, col, value)
    }

    /// Bind every field of `record`.
    ///
    /// All values are converted first; the statement is only touched once the
    /// whole row converted. Absent fields are written as NULL when nullable.
    pub fn write_record(&self, stmt: &mut dyn ParamStatement, record: &Record) -> Result<()> {
        let null = Value::Null;
        let mut staged = StagedParams::default();
        for (field, col) in self.fields.iter().zip(&self.columns) {
            let value = match record.get(&field.name) {
                Some(value) => value,
                None if field.schema.is_nullable() => &null,
                None => {
                    return Err(RecordError::conversion(
                        &field.name,
                        "required field is missing from the record",
                    ))
                }
            };
            write_field(&self.profile, &mut staged, field, col, value)?;
        }

        for (index, value) in staged.params {
            stmt.bind(index, value)?;
        }
        Ok(())
    }
}
