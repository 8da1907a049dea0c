//! In-memory driver backed by [`SqlValue`] rows.
//!
//! Useful as a fake database in tests and for dry runs: result sets are
//! registered up front, executed statements are captured for inspection.
//! Getters coerce between compatible native values the way real drivers do
//! (a TINYINT stored as `I16` reads through `get_bool`, an `I32` reads
//! through `get_i64`, text parses as a decimal, ...).

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::core::schema::ColumnMetadata;
use crate::core::traits::{
    Driver, DriverConnection, ParamStatement, PreparedWrite, ResultCursor, RowCursor,
};
use crate::core::value::SqlValue;
use crate::error::{RecordError, Result};

/// Parameters bound for one executed statement, by 1-based index.
pub type BoundRow = Vec<(usize, SqlValue)>;

// =============================================================================
// Cursor
// =============================================================================

/// Result set held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryCursor {
    metadata: Vec<ColumnMetadata>,
    rows: Vec<Vec<SqlValue>>,
    /// Index of the current row; `None` before the first `next_row`.
    position: Option<usize>,
}

impl MemoryCursor {
    /// Cursor positioned before the first row.
    pub fn new(metadata: Vec<ColumnMetadata>, rows: Vec<Vec<SqlValue>>) -> Self {
        Self {
            metadata,
            rows,
            position: None,
        }
    }

    /// Cursor already positioned on its only row.
    pub fn single_row(metadata: Vec<ColumnMetadata>, row: Vec<SqlValue>) -> Self {
        Self {
            metadata,
            rows: vec![row],
            position: Some(0),
        }
    }

    fn value(&self, index: usize) -> Result<&SqlValue> {
        let row = self
            .position
            .and_then(|p| self.rows.get(p))
            .ok_or_else(|| RecordError::resource("cursor is not positioned on a row", "memory"))?;
        index
            .checked_sub(1)
            .and_then(|i| row.get(i))
            .ok_or_else(|| {
                RecordError::resource(
                    format!("column index {} out of range (1..={})", index, row.len()),
                    "memory",
                )
            })
    }

    fn column_name(&self, index: usize) -> String {
        index
            .checked_sub(1)
            .and_then(|i| self.metadata.get(i))
            .map(|c| c.name.clone())
            .unwrap_or_else(|| format!("#{}", index))
    }

    fn mismatch(&self, index: usize, value: &SqlValue, wanted: &str) -> RecordError {
        RecordError::conversion(
            self.column_name(index),
            format!("cannot read {} value as {}", value.kind(), wanted),
        )
    }

    /// Read a non-null value through `convert`, which returns `None` when the
    /// native value cannot be coerced.
    fn get<T>(
        &self,
        index: usize,
        wanted: &str,
        convert: impl FnOnce(&SqlValue) -> Option<T>,
    ) -> Result<Option<T>> {
        let value = self.value(index)?;
        if value.is_null() {
            return Ok(None);
        }
        convert(value)
            .map(Some)
            .ok_or_else(|| self.mismatch(index, value, wanted))
    }
}

fn as_i64(value: &SqlValue) -> Option<i64> {
    match value {
        SqlValue::Bool(b) => Some(i64::from(*b)),
        SqlValue::I16(v) => Some(i64::from(*v)),
        SqlValue::I32(v) => Some(i64::from(*v)),
        SqlValue::I64(v) => Some(*v),
        SqlValue::Decimal(d) if d.fract().is_zero() => d.to_i64(),
        SqlValue::Text(s) => s.trim().parse().ok(),
        _ => None,
    }
}

impl RowCursor for MemoryCursor {
    fn get_bool(&self, index: usize) -> Result<Option<bool>> {
        self.get(index, "bool", |v| match v {
            SqlValue::Bool(b) => Some(*b),
            SqlValue::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "t" | "1" => Some(true),
                "false" | "f" | "0" => Some(false),
                _ => None,
            },
            other => as_i64(other).map(|n| n != 0),
        })
    }

    fn get_i32(&self, index: usize) -> Result<Option<i32>> {
        self.get(index, "i32", |v| as_i64(v).and_then(|n| i32::try_from(n).ok()))
    }

    fn get_i64(&self, index: usize) -> Result<Option<i64>> {
        self.get(index, "i64", as_i64)
    }

    fn get_f32(&self, index: usize) -> Result<Option<f32>> {
        self.get(index, "f32", |v| match v {
            SqlValue::F32(f) => Some(*f),
            SqlValue::F64(f) => Some(*f as f32),
            SqlValue::Decimal(d) => d.to_f32(),
            other => as_i64(other).map(|n| n as f32),
        })
    }

    fn get_f64(&self, index: usize) -> Result<Option<f64>> {
        self.get(index, "f64", |v| match v {
            SqlValue::F64(f) => Some(*f),
            SqlValue::F32(f) => Some(f64::from(*f)),
            SqlValue::Decimal(d) => d.to_f64(),
            SqlValue::Text(s) => s.trim().parse().ok(),
            other => as_i64(other).map(|n| n as f64),
        })
    }

    fn get_string(&self, index: usize) -> Result<Option<String>> {
        self.get(index, "string", |v| match v {
            SqlValue::Text(s) => Some(s.clone()),
            SqlValue::Object { text, .. } => Some(text.clone()),
            SqlValue::Uuid(u) => Some(u.to_string()),
            SqlValue::Decimal(d) => Some(d.to_string()),
            SqlValue::I16(n) => Some(n.to_string()),
            SqlValue::I32(n) => Some(n.to_string()),
            SqlValue::I64(n) => Some(n.to_string()),
            SqlValue::F64(f) => Some(f.to_string()),
            SqlValue::Date(d) => Some(d.to_string()),
            SqlValue::Time(t) => Some(t.to_string()),
            SqlValue::DateTime(ts) => Some(ts.to_string()),
            SqlValue::DateTimeOffset(ts) => Some(ts.to_rfc3339()),
            _ => None,
        })
    }

    fn get_bytes(&self, index: usize) -> Result<Option<Vec<u8>>> {
        self.get(index, "bytes", |v| match v {
            SqlValue::Bytes(b) => Some(b.clone()),
            SqlValue::Uuid(u) => Some(u.as_bytes().to_vec()),
            SqlValue::Text(s) => Some(s.as_bytes().to_vec()),
            _ => None,
        })
    }

    fn get_decimal(&self, index: usize, _scale: u32) -> Result<Option<Decimal>> {
        self.get(index, "decimal", |v| match v {
            SqlValue::Decimal(d) => Some(*d),
            SqlValue::Text(s) => s.trim().parse().ok(),
            SqlValue::F64(f) => Decimal::try_from(*f).ok(),
            other => as_i64(other).map(Decimal::from),
        })
    }

    fn get_date(&self, index: usize) -> Result<Option<NaiveDate>> {
        self.get(index, "date", |v| match v {
            SqlValue::Date(d) => Some(*d),
            SqlValue::DateTime(ts) => Some(ts.date()),
            SqlValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        })
    }

    fn get_time(&self, index: usize) -> Result<Option<NaiveTime>> {
        self.get(index, "time", |v| match v {
            SqlValue::Time(t) => Some(*t),
            SqlValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        })
    }

    fn get_timestamp(&self, index: usize) -> Result<Option<NaiveDateTime>> {
        self.get(index, "timestamp", |v| match v {
            SqlValue::DateTime(ts) => Some(*ts),
            SqlValue::DateTimeOffset(ts) => Some(ts.naive_utc()),
            SqlValue::Date(d) => d.and_hms_opt(0, 0, 0),
            SqlValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        })
    }

    fn get_timestamp_tz(&self, index: usize) -> Result<Option<DateTime<FixedOffset>>> {
        self.get(index, "timestamp with time zone", |v| match v {
            SqlValue::DateTimeOffset(ts) => Some(*ts),
            SqlValue::DateTime(ts) => Some(ts.and_utc().fixed_offset()),
            SqlValue::Text(s) => DateTime::parse_from_rfc3339(s.trim()).ok(),
            _ => None,
        })
    }

    fn get_object(&self, index: usize) -> Result<SqlValue> {
        self.value(index).cloned()
    }
}

#[async_trait]
impl ResultCursor for MemoryCursor {
    fn metadata(&self) -> &[ColumnMetadata] {
        &self.metadata
    }

    async fn next_row(&mut self) -> Result<bool> {
        let next = self.position.map_or(0, |p| p + 1);
        self.position = Some(next.min(self.rows.len()));
        Ok(next < self.rows.len())
    }
}

// =============================================================================
// Statement
// =============================================================================

/// Statement capturing bound parameters.
///
/// `execute` moves the bound row into the owning connection's captured rows.
#[derive(Debug, Default)]
pub struct MemoryStatement {
    sql: String,
    params: BoundRow,
    sink: Option<Arc<Mutex<Vec<BoundRow>>>>,
}

impl MemoryStatement {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Parameters bound since the last execute, in bind order.
    pub fn params(&self) -> &[(usize, SqlValue)] {
        &self.params
    }
}

impl ParamStatement for MemoryStatement {
    fn bind(&mut self, index: usize, value: SqlValue) -> Result<()> {
        if index == 0 {
            return Err(RecordError::resource(
                "parameter indexes start at 1",
                "memory statement",
            ));
        }
        self.params.push((index, value));
        Ok(())
    }
}

#[async_trait]
impl PreparedWrite for MemoryStatement {
    async fn execute(&mut self) -> Result<u64> {
        let mut row = std::mem::take(&mut self.params);
        row.sort_by_key(|(i, _)| *i);
        if let Some(sink) = &self.sink {
            sink.lock()
                .map_err(|e| RecordError::resource(e, "memory statement"))?
                .push(row);
        }
        Ok(1)
    }
}

// =============================================================================
// Connection
// =============================================================================

/// Connection to an in-memory database.
///
/// Clones share the captured writes and the closed flag.
#[derive(Debug, Clone, Default)]
pub struct MemoryConnection {
    results: HashMap<String, MemoryCursor>,
    default_result: Option<MemoryCursor>,
    tables: HashMap<String, Vec<ColumnMetadata>>,
    written: Arc<Mutex<Vec<BoundRow>>>,
    prepared: Arc<Mutex<Vec<String>>>,
    closed: Arc<AtomicBool>,
}

impl MemoryConnection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `sql` with the given result set.
    #[must_use]
    pub fn with_result(
        mut self,
        sql: impl Into<String>,
        metadata: Vec<ColumnMetadata>,
        rows: Vec<Vec<SqlValue>>,
    ) -> Self {
        self.results
            .insert(sql.into(), MemoryCursor::new(metadata, rows));
        self
    }

    /// Answer any query without a registered result with this result set.
    #[must_use]
    pub fn with_default_result(
        mut self,
        metadata: Vec<ColumnMetadata>,
        rows: Vec<Vec<SqlValue>>,
    ) -> Self {
        self.default_result = Some(MemoryCursor::new(metadata, rows));
        self
    }

    /// Declare a table by its escaped, qualified name.
    #[must_use]
    pub fn with_table(mut self, qualified_name: impl Into<String>, columns: Vec<ColumnMetadata>) -> Self {
        self.tables.insert(qualified_name.into(), columns);
        self
    }

    /// Rows executed through prepared statements so far.
    pub fn written(&self) -> Vec<BoundRow> {
        match self.written.lock() {
            Ok(rows) => rows.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// SQL of every statement prepared so far.
    pub fn prepared(&self) -> Vec<String> {
        match self.prepared.lock() {
            Ok(sql) => sql.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(RecordError::resource("connection is closed", "memory"));
        }
        Ok(())
    }
}

#[async_trait]
impl DriverConnection for MemoryConnection {
    async fn query(&mut self, sql: &str) -> Result<Box<dyn ResultCursor + '_>> {
        self.ensure_open()?;
        let cursor = self
            .results
            .get(sql)
            .or(self.default_result.as_ref())
            .cloned()
            .ok_or_else(|| RecordError::resource(format!("no result registered for query: {}", sql), "memory"))?;
        Ok(Box::new(cursor))
    }

    async fn table_columns(&mut self, qualified_table: &str) -> Result<Vec<ColumnMetadata>> {
        self.ensure_open()?;
        self.tables.get(qualified_table).cloned().ok_or_else(|| {
            RecordError::resource(format!("table {} does not exist", qualified_table), "memory")
        })
    }

    async fn prepare(&mut self, sql: &str) -> Result<Box<dyn PreparedWrite + '_>> {
        self.ensure_open()?;
        self.prepared
            .lock()
            .map_err(|e| RecordError::resource(e, "memory"))?
            .push(sql.to_string());
        Ok(Box::new(MemoryStatement {
            sql: sql.to_string(),
            params: Vec::new(),
            sink: Some(Arc::clone(&self.written)),
        }))
    }

    async fn close(&mut self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Driver entry for the in-memory database.
#[derive(Debug, Default)]
pub struct MemoryDriver;

impl Driver for MemoryDriver {
    fn id(&self) -> &str {
        "memory"
    }

    fn scheme(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::TypeCode;
    use std::str::FromStr;

    fn meta() -> Vec<ColumnMetadata> {
        vec![
            ColumnMetadata::new("FLAG", TypeCode::TINYINT, "TINYINT"),
            ColumnMetadata::new("AMOUNT", TypeCode::VARCHAR, "VARCHAR"),
        ]
    }

    #[test]
    fn test_coercing_getters() {
        let cursor = MemoryCursor::single_row(
            meta(),
            vec![SqlValue::I16(1), SqlValue::Text("12.50".into())],
        );
        assert_eq!(cursor.get_bool(1).unwrap(), Some(true));
        assert_eq!(cursor.get_i64(1).unwrap(), Some(1));
        assert_eq!(
            cursor.get_decimal(2, 2).unwrap(),
            Some(Decimal::from_str("12.50").unwrap())
        );
        assert_eq!(cursor.get_string(2).unwrap().as_deref(), Some("12.50"));
    }

    #[test]
    fn test_null_reads_as_none() {
        let cursor = MemoryCursor::single_row(
            meta(),
            vec![
                SqlValue::Null(crate::core::value::SqlNullType::I16),
                SqlValue::Null(crate::core::value::SqlNullType::String),
            ],
        );
        assert_eq!(cursor.get_bool(1).unwrap(), None);
        assert_eq!(cursor.get_string(2).unwrap(), None);
    }

    #[test]
    fn test_incompatible_getter_names_column() {
        let cursor = MemoryCursor::single_row(
            meta(),
            vec![SqlValue::I16(1), SqlValue::Text("abc".into())],
        );
        let err = cursor.get_i32(2).unwrap_err();
        assert!(err.to_string().contains("AMOUNT"));
        assert!(cursor.get_i32(3).is_err());
        assert!(cursor.get_i32(0).is_err());
    }

    #[tokio::test]
    async fn test_cursor_iterates_rows() {
        let mut cursor = MemoryCursor::new(
            meta(),
            vec![
                vec![SqlValue::I16(0), SqlValue::Text("a".into())],
                vec![SqlValue::I16(1), SqlValue::Text("b".into())],
            ],
        );
        assert!(cursor.get_bool(1).is_err());
        assert!(cursor.next_row().await.unwrap());
        assert_eq!(cursor.get_bool(1).unwrap(), Some(false));
        assert!(cursor.next_row().await.unwrap());
        assert_eq!(cursor.get_string(2).unwrap().as_deref(), Some("b"));
        assert!(!cursor.next_row().await.unwrap());
        assert!(!cursor.next_row().await.unwrap());
    }

    #[tokio::test]
    async fn test_connection_captures_writes() {
        let mut conn = MemoryConnection::new().with_table("\"T\"", meta());
        let observer = conn.clone();
        {
            let mut stmt = conn.prepare("INSERT INTO \"T\" VALUES (?, ?)").await.unwrap();
            stmt.bind(2, SqlValue::Text("x".into())).unwrap();
            stmt.bind(1, SqlValue::I16(1)).unwrap();
            assert_eq!(stmt.execute().await.unwrap(), 1);
        }
        conn.close().await.unwrap();

        assert!(observer.is_closed());
        assert_eq!(observer.prepared(), vec!["INSERT INTO \"T\" VALUES (?, ?)"]);
        assert_eq!(
            observer.written(),
            vec![vec![(1, SqlValue::I16(1)), (2, SqlValue::Text("x".into()))]]
        );
        assert!(conn.query("SELECT 1").await.is_err());
    }

    #[tokio::test]
    async fn test_connection_results_by_sql() {
        let mut conn = MemoryConnection::new()
            .with_result("SELECT a", meta(), vec![])
            .with_table("\"T\"", meta());
        assert!(conn.query("SELECT a").await.is_ok());
        assert!(conn.query("SELECT b").await.is_err());
        assert_eq!(conn.table_columns("\"T\"").await.unwrap().len(), 2);
        assert!(conn.table_columns("\"U\"").await.is_err());
    }
}
