//! Value types on both sides of the marshaller.
//!
//! - [`SqlValue`]: a driver-native value, as produced by a result cursor or
//!   bound to a statement parameter.
//! - [`Value`]: a universal record value. Logical types use their physical
//!   encoding (dates are `Int` days since the epoch, timestamps are `Long`
//!   milli/microseconds, ...), with helpers to convert to and from chrono.
//! - [`Record`]: one row of named record values.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use rust_decimal::Decimal;
use uuid::Uuid;

use super::schema::TypeCode;

/// Type hint for NULL parameters.
///
/// Drivers need the expected column type to bind a typed NULL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlNullType {
    Bool,
    I16,
    I32,
    I64,
    F32,
    F64,
    String,
    Bytes,
    Uuid,
    Decimal,
    DateTime,
    DateTimeOffset,
    Date,
    Time,
    /// Vendor type bound through an object wrapper.
    Other,
}

impl SqlNullType {
    /// NULL hint for a column type code.
    pub fn for_type_code(code: TypeCode) -> Self {
        match code {
            TypeCode::BIT | TypeCode::BOOLEAN => SqlNullType::Bool,
            TypeCode::TINYINT | TypeCode::SMALLINT => SqlNullType::I16,
            TypeCode::INTEGER => SqlNullType::I32,
            TypeCode::BIGINT => SqlNullType::I64,
            TypeCode::REAL => SqlNullType::F32,
            TypeCode::FLOAT | TypeCode::DOUBLE => SqlNullType::F64,
            TypeCode::NUMERIC | TypeCode::DECIMAL => SqlNullType::Decimal,
            TypeCode::DATE => SqlNullType::Date,
            TypeCode::TIME | TypeCode::TIME_WITH_TIMEZONE => SqlNullType::Time,
            TypeCode::TIMESTAMP => SqlNullType::DateTime,
            TypeCode::TIMESTAMP_WITH_TIMEZONE => SqlNullType::DateTimeOffset,
            code if code.is_text() => SqlNullType::String,
            code if code.is_binary() => SqlNullType::Bytes,
            _ => SqlNullType::Other,
        }
    }
}

/// Driver-native SQL value.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// NULL with type hint for correct parameter binding.
    Null(SqlNullType),

    Bool(bool),

    /// 16-bit signed integer (tinyint/smallint).
    I16(i16),

    /// 32-bit signed integer (int).
    I32(i32),

    /// 64-bit signed integer (bigint).
    I64(i64),

    /// 32-bit floating point (real).
    F32(f32),

    /// 64-bit floating point (double precision).
    F64(f64),

    Text(String),

    Bytes(Vec<u8>),

    Uuid(Uuid),

    /// Decimal value with arbitrary precision.
    Decimal(Decimal),

    /// Timestamp without timezone.
    DateTime(NaiveDateTime),

    /// Timestamp with timezone offset.
    DateTimeOffset(DateTime<FixedOffset>),

    Date(NaiveDate),

    Time(NaiveTime),

    /// Vendor-typed value the generic driver API cannot construct,
    /// carried as its textual form (e.g. a PostgreSQL `interval`).
    Object { type_name: String, text: String },
}

impl SqlValue {
    /// Check if this value is NULL.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null(_))
    }

    /// Short variant label for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            SqlValue::Null(_) => "null",
            SqlValue::Bool(_) => "bool",
            SqlValue::I16(_) => "i16",
            SqlValue::I32(_) => "i32",
            SqlValue::I64(_) => "i64",
            SqlValue::F32(_) => "f32",
            SqlValue::F64(_) => "f64",
            SqlValue::Text(_) => "text",
            SqlValue::Bytes(_) => "bytes",
            SqlValue::Uuid(_) => "uuid",
            SqlValue::Decimal(_) => "decimal",
            SqlValue::DateTime(_) => "timestamp",
            SqlValue::DateTimeOffset(_) => "timestamptz",
            SqlValue::Date(_) => "date",
            SqlValue::Time(_) => "time",
            SqlValue::Object { .. } => "object",
        }
    }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        SqlValue::Bool(v)
    }
}

impl From<i16> for SqlValue {
    fn from(v: i16) -> Self {
        SqlValue::I16(v)
    }
}

impl From<i32> for SqlValue {
    fn from(v: i32) -> Self {
        SqlValue::I32(v)
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::I64(v)
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        SqlValue::F64(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<Vec<u8>> for SqlValue {
    fn from(v: Vec<u8>) -> Self {
        SqlValue::Bytes(v)
    }
}

impl From<Decimal> for SqlValue {
    fn from(v: Decimal) -> Self {
        SqlValue::Decimal(v)
    }
}

impl From<NaiveDateTime> for SqlValue {
    fn from(v: NaiveDateTime) -> Self {
        SqlValue::DateTime(v)
    }
}

impl From<NaiveDate> for SqlValue {
    fn from(v: NaiveDate) -> Self {
        SqlValue::Date(v)
    }
}

impl From<NaiveTime> for SqlValue {
    fn from(v: NaiveTime) -> Self {
        SqlValue::Time(v)
    }
}

// =============================================================================
// Universal record values
// =============================================================================

/// A universal record value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Bytes(Vec<u8>),
    String(String),
    /// Exact decimal for the DECIMAL logical type.
    Decimal(Decimal),
    Array(Vec<Value>),
    Record(Record),
}

const MICROS_PER_SECOND: i64 = 1_000_000;
const MILLIS_PER_SECOND: i64 = 1_000;

fn epoch_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default()
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Short variant label for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Boolean(_) => "boolean",
            Value::Int(_) => "int",
            Value::Long(_) => "long",
            Value::Float(_) => "float",
            Value::Double(_) => "double",
            Value::Bytes(_) => "bytes",
            Value::String(_) => "string",
            Value::Decimal(_) => "decimal",
            Value::Array(_) => "array",
            Value::Record(_) => "record",
        }
    }

    /// DATE value: days since 1970-01-01.
    pub fn from_date(date: NaiveDate) -> Value {
        Value::Int((date - epoch_date()).num_days() as i32)
    }

    /// TIME_MILLIS value: milliseconds since midnight.
    pub fn from_time_millis(time: NaiveTime) -> Value {
        Value::Int((time_nanos(time) / 1_000_000) as i32)
    }

    /// TIME_MICROS value: microseconds since midnight.
    pub fn from_time_micros(time: NaiveTime) -> Value {
        Value::Long(time_nanos(time) / 1_000)
    }

    /// TIMESTAMP_MILLIS value, interpreting the timestamp as UTC.
    pub fn from_timestamp_millis(ts: NaiveDateTime) -> Value {
        Value::Long(ts.and_utc().timestamp_millis())
    }

    /// TIMESTAMP_MICROS value, interpreting the timestamp as UTC.
    pub fn from_timestamp_micros(ts: NaiveDateTime) -> Value {
        Value::Long(ts.and_utc().timestamp_micros())
    }

    /// Decode a DATE value.
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Int(days) => epoch_date().checked_add_signed(chrono::Duration::days(*days as i64)),
            _ => None,
        }
    }

    /// Decode a TIME_MILLIS (`Int`) or TIME_MICROS (`Long`) value.
    pub fn as_time(&self) -> Option<NaiveTime> {
        let micros = match self {
            Value::Int(millis) => *millis as i64 * 1_000,
            Value::Long(micros) => *micros,
            _ => return None,
        };
        if micros < 0 {
            return None;
        }
        let secs = (micros / MICROS_PER_SECOND) as u32;
        let nanos = ((micros % MICROS_PER_SECOND) * 1_000) as u32;
        NaiveTime::from_num_seconds_from_midnight_opt(secs, nanos)
    }

    /// Decode a TIMESTAMP_MILLIS value as a UTC timestamp.
    pub fn as_timestamp_millis(&self) -> Option<NaiveDateTime> {
        match self {
            Value::Long(millis) => from_epoch(*millis, MILLIS_PER_SECOND, 1_000_000),
            _ => None,
        }
    }

    /// Decode a TIMESTAMP_MICROS value as a UTC timestamp.
    pub fn as_timestamp_micros(&self) -> Option<NaiveDateTime> {
        match self {
            Value::Long(micros) => from_epoch(*micros, MICROS_PER_SECOND, 1_000),
            _ => None,
        }
    }

    /// Render as JSON for display.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as Json;
        match self {
            Value::Null => Json::Null,
            Value::Boolean(b) => Json::Bool(*b),
            Value::Int(v) => Json::from(*v),
            Value::Long(v) => Json::from(*v),
            Value::Float(v) => Json::from(*v as f64),
            Value::Double(v) => Json::from(*v),
            Value::Bytes(b) => Json::String(to_hex(b)),
            Value::String(s) => Json::String(s.clone()),
            Value::Decimal(d) => Json::String(d.to_string()),
            Value::Array(items) => Json::Array(items.iter().map(Value::to_json).collect()),
            Value::Record(record) => record.to_json(),
        }
    }
}

fn time_nanos(time: NaiveTime) -> i64 {
    // Leap-second representation uses nanos >= 1e9.
    let nanos = time.nanosecond().min(999_999_999) as i64;
    time.num_seconds_from_midnight() as i64 * 1_000_000_000 + nanos
}

fn from_epoch(value: i64, units_per_second: i64, nanos_per_unit: i64) -> Option<NaiveDateTime> {
    let secs = value.div_euclid(units_per_second);
    let nanos = (value.rem_euclid(units_per_second) * nanos_per_unit) as u32;
    DateTime::from_timestamp(secs, nanos).map(|dt| dt.naive_utc())
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Big-endian two's-complement unscaled value of a decimal (the BYTES form).
pub fn decimal_to_unscaled_bytes(value: &Decimal) -> Vec<u8> {
    let bytes = value.mantissa().to_be_bytes();
    let mut start = 0;
    // Drop redundant sign-extension bytes, keeping the sign bit intact.
    while start < bytes.len() - 1 {
        let (b, next) = (bytes[start], bytes[start + 1]);
        if (b == 0x00 && next & 0x80 == 0) || (b == 0xff && next & 0x80 != 0) {
            start += 1;
        } else {
            break;
        }
    }
    bytes[start..].to_vec()
}

/// Decode the BYTES form of a decimal at the given scale.
pub fn decimal_from_unscaled_bytes(bytes: &[u8], scale: u32) -> Option<Decimal> {
    if bytes.is_empty() || bytes.len() > 16 {
        return None;
    }
    let fill = if bytes[0] & 0x80 != 0 { 0xff } else { 0x00 };
    let mut buf = [fill; 16];
    buf[16 - bytes.len()..].copy_from_slice(bytes);
    Decimal::try_from_i128_with_scale(i128::from_be_bytes(buf), scale).ok()
}

/// One row of named record values.
///
/// Values are kept in insertion order; lookup is by name.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    values: Vec<(String, Value)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            values: Vec::with_capacity(capacity),
        }
    }

    /// Set a field, replacing any existing value of the same name.
    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        match self.values.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.values.push((name, value)),
        }
    }

    /// Builder-style [`set`](Self::set).
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: Value) -> Self {
        self.set(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Render as a JSON object in field order.
    pub fn to_json(&self) -> serde_json::Value {
        let map = self
            .values
            .iter()
            .map(|(n, v)| (n.clone(), v.to_json()))
            .collect::<serde_json::Map<_, _>>();
        serde_json::Value::Object(map)
    }
}
