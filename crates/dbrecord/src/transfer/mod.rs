//! Work units moving records between a connection and a channel.
//!
//! A [`SourceUnit`] runs one (split) import query, validates or infers its
//! schema and sends record batches down an `mpsc` channel. A [`SinkUnit`]
//! receives batches and writes each record into a destination table with a
//! prepared INSERT. Units share nothing mutable: each owns its connection for
//! the whole run and closes it on every exit path, and each holds a
//! [`DriverHandle`] so the driver stays registered while it runs.
//!
//! ```rust,ignore
//! let (tx, rx) = mpsc::channel(16);
//! let (read, written) = tokio::join!(
//!     source.run(&mut source_conn, tx),
//!     sink.run(&mut sink_conn, rx),
//! );
//! ```

pub mod split;

pub use split::{split_bounds, SplitPlan};

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::core::schema::ColumnMetadata;
use crate::core::traits::{Driver, DriverConnection};
use crate::core::types::Field;
use crate::core::value::Record;
use crate::dialect::{
    infer_schema, validate_schema, DialectProfile, RecordMarshaller, SchemaRole,
};
use crate::drivers::registry::{DriverHandle, DriverRegistry};
use crate::error::{RecordError, Result};

/// Records sent per channel message.
pub const DEFAULT_BATCH_SIZE: usize = 1_000;

/// Statistics from one work unit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UnitStats {
    /// Records read or written.
    pub rows: u64,

    /// Wall time of the unit, connection close included.
    pub elapsed: Duration,
}

// =============================================================================
// Source
// =============================================================================

/// Reads one query into records.
pub struct SourceUnit {
    profile: Arc<DialectProfile>,
    driver: Arc<dyn Driver>,
    registry: Arc<DriverRegistry>,
    query: String,
    declared: Option<Vec<Field>>,
    batch_size: usize,
}

impl SourceUnit {
    /// Unit reading `query`, registered in the process-wide driver registry.
    pub fn new(
        profile: Arc<DialectProfile>,
        driver: Arc<dyn Driver>,
        query: impl Into<String>,
    ) -> Self {
        Self {
            profile,
            driver,
            registry: DriverRegistry::global(),
            query: query.into(),
            declared: None,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    #[must_use]
    pub fn with_registry(mut self, registry: Arc<DriverRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// Validate the result set against a declared schema instead of
    /// inferring one.
    #[must_use]
    pub fn with_schema(mut self, fields: Vec<Field>) -> Self {
        self.declared = Some(fields);
        self
    }

    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    /// Run the query on `conn` and send its records to `tx`.
    ///
    /// `conn` is closed before returning, whatever the outcome. `tx` is
    /// dropped on return, which ends the receiving side once every sender
    /// is gone.
    ///
    /// # Errors
    ///
    /// `RecordError::Validation` when a declared schema does not match the
    /// result set (before any record is sent), `RecordError::RowConversion`
    /// when a row cannot be read, `RecordError::ResourceAcquisition` when the
    /// driver, query or channel fails.
    pub async fn run(
        &self,
        conn: &mut dyn DriverConnection,
        tx: mpsc::Sender<Vec<Record>>,
    ) -> Result<UnitStats> {
        let start = Instant::now();
        let handle = acquire(&self.registry, &self.driver, conn).await?;
        info!(
            dialect = self.profile.id,
            driver = handle.driver_id(),
            query = %self.query,
            "source unit started"
        );

        let result = self.read_rows(conn, &tx).await;
        let result = finish(conn, result).await;
        handle.release();

        let rows = result?;
        let stats = UnitStats {
            rows,
            elapsed: start.elapsed(),
        };
        info!(
            rows,
            elapsed_ms = stats.elapsed.as_millis() as u64,
            "source unit finished"
        );
        Ok(stats)
    }

    async fn read_rows(
        &self,
        conn: &mut dyn DriverConnection,
        tx: &mpsc::Sender<Vec<Record>>,
    ) -> Result<u64> {
        let mut cursor = conn.query(&self.query).await?;
        let fields = self.resolve_schema(cursor.metadata())?;
        let marshaller = RecordMarshaller::for_source(*self.profile, fields, cursor.metadata())?;

        let mut rows = 0u64;
        let mut batch = Vec::with_capacity(self.batch_size);
        while cursor.next_row().await? {
            batch.push(marshaller.read_record(&*cursor)?);
            rows += 1;
            if batch.len() >= self.batch_size {
                let full = std::mem::replace(&mut batch, Vec::with_capacity(self.batch_size));
                send(tx, full).await?;
                debug!(rows, "sent record batch");
            }
        }
        if !batch.is_empty() {
            send(tx, batch).await?;
        }
        Ok(rows)
    }

    fn resolve_schema(&self, metadata: &[ColumnMetadata]) -> Result<Vec<Field>> {
        match &self.declared {
            Some(declared) => {
                let failures =
                    validate_schema(&self.profile, declared, metadata, SchemaRole::Source);
                if !failures.is_empty() {
                    return Err(RecordError::Validation(failures));
                }
                Ok(declared.clone())
            }
            None => infer_schema(&self.profile, metadata),
        }
    }
}

async fn send(tx: &mpsc::Sender<Vec<Record>>, batch: Vec<Record>) -> Result<()> {
    tx.send(batch)
        .await
        .map_err(|_| RecordError::resource("record channel closed by the receiver", "source unit"))
}

// =============================================================================
// Sink
// =============================================================================

/// Writes records into one destination table.
pub struct SinkUnit {
    profile: Arc<DialectProfile>,
    driver: Arc<dyn Driver>,
    registry: Arc<DriverRegistry>,
    schema_name: String,
    table: String,
    fields: Vec<Field>,
}

impl SinkUnit {
    /// Unit writing records of schema `fields` into `schema_name.table`. An
    /// empty `schema_name` targets the connection's default schema.
    pub fn new(
        profile: Arc<DialectProfile>,
        driver: Arc<dyn Driver>,
        schema_name: impl Into<String>,
        table: impl Into<String>,
        fields: Vec<Field>,
    ) -> Self {
        Self {
            profile,
            driver,
            registry: DriverRegistry::global(),
            schema_name: schema_name.into(),
            table: table.into(),
            fields,
        }
    }

    #[must_use]
    pub fn with_registry(mut self, registry: Arc<DriverRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// Write every record received on `rx` until the channel closes.
    ///
    /// Each record is converted in full before any parameter is bound, so a
    /// failing record never reaches the database. `conn` is closed before
    /// returning, whatever the outcome.
    ///
    /// # Errors
    ///
    /// `RecordError::Validation` when the schema does not fit the table
    /// (before any record is written), `RecordError::RowConversion` for a
    /// record that cannot be bound, `RecordError::ResourceAcquisition` when
    /// the driver or a statement fails.
    pub async fn run(
        &self,
        conn: &mut dyn DriverConnection,
        rx: mpsc::Receiver<Vec<Record>>,
    ) -> Result<UnitStats> {
        let start = Instant::now();
        let handle = acquire(&self.registry, &self.driver, conn).await?;
        info!(
            dialect = self.profile.id,
            driver = handle.driver_id(),
            table = %self.table,
            "sink unit started"
        );

        let result = self.write_rows(conn, rx).await;
        let result = finish(conn, result).await;
        handle.release();

        let rows = result?;
        let stats = UnitStats {
            rows,
            elapsed: start.elapsed(),
        };
        info!(
            rows,
            elapsed_ms = stats.elapsed.as_millis() as u64,
            "sink unit finished"
        );
        Ok(stats)
    }

    async fn write_rows(
        &self,
        conn: &mut dyn DriverConnection,
        mut rx: mpsc::Receiver<Vec<Record>>,
    ) -> Result<u64> {
        let qualified = self.profile.qualify(&self.schema_name, &self.table)?;
        let columns = conn.table_columns(&qualified).await?;

        let failures = validate_schema(&self.profile, &self.fields, &columns, SchemaRole::Sink);
        if !failures.is_empty() {
            return Err(RecordError::Validation(failures));
        }

        let marshaller =
            RecordMarshaller::for_sink(*self.profile, self.fields.clone(), &columns)?;
        let sql = insert_statement(&self.profile, &qualified, &self.fields)?;
        debug!(sql = %sql, "prepared insert");
        let mut stmt = conn.prepare(&sql).await?;

        let mut rows = 0u64;
        while let Some(batch) = rx.recv().await {
            for record in &batch {
                marshaller.write_record(&mut *stmt, record)?;
                stmt.execute().await?;
                rows += 1;
            }
        }
        Ok(rows)
    }
}

/// `INSERT INTO {qualified} ({columns}) VALUES (?, ...)` with one placeholder
/// per field, in field order. `qualified` must already be escaped.
pub fn insert_statement(
    profile: &DialectProfile,
    qualified: &str,
    fields: &[Field],
) -> Result<String> {
    if fields.is_empty() {
        return Err(RecordError::Config(format!(
            "no fields to insert into {}",
            qualified
        )));
    }
    let columns = fields
        .iter()
        .map(|f| profile.escape_checked(&f.name))
        .collect::<Result<Vec<_>>>()?;
    let placeholders = vec!["?"; fields.len()].join(", ");
    Ok(format!(
        "INSERT INTO {} ({}) VALUES ({})",
        qualified,
        columns.join(", "),
        placeholders
    ))
}

// =============================================================================
// Scoped resources
// =============================================================================

/// Acquire a driver handle, closing `conn` when registration fails.
async fn acquire(
    registry: &Arc<DriverRegistry>,
    driver: &Arc<dyn Driver>,
    conn: &mut dyn DriverConnection,
) -> Result<DriverHandle> {
    match registry.acquire(Arc::clone(driver)) {
        Ok(handle) => Ok(handle),
        Err(e) => finish(conn, Err(e)).await,
    }
}

/// Close `conn` and combine the close outcome with the unit's result. A
/// close error after a failure is logged; the original failure wins.
async fn finish<T>(conn: &mut dyn DriverConnection, result: Result<T>) -> Result<T> {
    let closed = conn.close().await;
    match (result, closed) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(close_err)) => Err(close_err),
        (Err(e), Ok(())) => Err(e),
        (Err(e), Err(close_err)) => {
            warn!(error = %close_err, "failed to close connection after error");
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::TypeCode;
    use crate::core::types::UniversalType;
    use crate::core::value::{SqlValue, Value};
    use crate::dialect::FailureKind;
    use crate::drivers::memory::{MemoryConnection, MemoryDriver};

    const QUERY: &str = "SELECT ID, NAME FROM users WHERE (1 = 1)";

    fn profile() -> Arc<DialectProfile> {
        Arc::new(DialectProfile::generic())
    }

    fn driver() -> Arc<dyn Driver> {
        Arc::new(MemoryDriver)
    }

    fn columns() -> Vec<ColumnMetadata> {
        vec![
            ColumnMetadata::new("ID", TypeCode::INTEGER, "INTEGER").not_null(),
            ColumnMetadata::new("NAME", TypeCode::VARCHAR, "VARCHAR"),
        ]
    }

    fn source_conn() -> MemoryConnection {
        MemoryConnection::new().with_result(
            QUERY,
            columns(),
            vec![
                vec![SqlValue::I32(1), SqlValue::Text("alice".into())],
                vec![SqlValue::I32(2), SqlValue::Text("bob".into())],
                vec![SqlValue::I32(3), SqlValue::Text("carol".into())],
            ],
        )
    }

    fn fields() -> Vec<Field> {
        vec![
            Field::new("ID", UniversalType::int()),
            Field::new("NAME", UniversalType::string().nullable()),
        ]
    }

    fn record(id: i32, name: &str) -> Record {
        Record::new()
            .with("ID", Value::Int(id))
            .with("NAME", Value::String(name.to_string()))
    }

    async fn collect(mut rx: mpsc::Receiver<Vec<Record>>) -> Vec<Vec<Record>> {
        let mut batches = Vec::new();
        while let Some(batch) = rx.recv().await {
            batches.push(batch);
        }
        batches
    }

    // =========================================================================
    // Source
    // =========================================================================

    #[tokio::test]
    async fn test_source_infers_schema_and_batches() {
        let registry = DriverRegistry::new();
        let mut conn = source_conn();
        let observer = conn.clone();
        let unit = SourceUnit::new(profile(), driver(), QUERY)
            .with_registry(Arc::clone(&registry))
            .with_batch_size(2);

        let (tx, rx) = mpsc::channel(4);
        let stats = unit.run(&mut conn, tx).await.unwrap();
        let batches = collect(rx).await;

        assert_eq!(stats.rows, 3);
        assert_eq!(batches.iter().map(Vec::len).collect::<Vec<_>>(), vec![2, 1]);
        assert_eq!(batches[0][0], record(1, "alice"));
        assert_eq!(batches[1][0], record(3, "carol"));
        assert!(observer.is_closed());
        assert_eq!(registry.handle_count("memory"), 0);
        assert!(!registry.is_registered("memory"));
    }

    #[tokio::test]
    async fn test_source_declared_schema_mismatch_closes_connection() {
        let mut conn = source_conn();
        let observer = conn.clone();
        let unit = SourceUnit::new(profile(), driver(), QUERY)
            .with_registry(DriverRegistry::new())
            .with_schema(vec![
                Field::new("ID", UniversalType::int()),
                Field::new("NAME", UniversalType::double()),
            ]);

        let (tx, rx) = mpsc::channel(4);
        let err = unit.run(&mut conn, tx).await.unwrap_err();

        let failures = match err {
            RecordError::Validation(failures) => failures,
            other => panic!("expected a validation error, got {other:?}"),
        };
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].field, "NAME");
        assert_eq!(failures[0].kind, FailureKind::TypeMismatch);
        assert!(collect(rx).await.is_empty());
        assert!(observer.is_closed());
    }

    #[tokio::test]
    async fn test_source_row_error_closes_connection() {
        let mut conn = MemoryConnection::new().with_result(
            QUERY,
            columns(),
            vec![
                vec![SqlValue::I32(1), SqlValue::Text("alice".into())],
                vec![SqlValue::Text("two".into()), SqlValue::Text("bob".into())],
            ],
        );
        let observer = conn.clone();
        let registry = DriverRegistry::new();
        let unit = SourceUnit::new(profile(), driver(), QUERY)
            .with_registry(Arc::clone(&registry));

        let (tx, rx) = mpsc::channel(4);
        let err = unit.run(&mut conn, tx).await.unwrap_err();

        assert!(matches!(err, RecordError::RowConversion { ref field, .. } if field == "ID"));
        // The failing batch is never sent.
        assert!(collect(rx).await.is_empty());
        assert!(observer.is_closed());
        assert_eq!(registry.handle_count("memory"), 0);
    }

    #[tokio::test]
    async fn test_source_query_failure_closes_connection() {
        let mut conn = MemoryConnection::new();
        let observer = conn.clone();
        let unit = SourceUnit::new(profile(), driver(), "SELECT nothing")
            .with_registry(DriverRegistry::new());

        let (tx, _rx) = mpsc::channel(1);
        let err = unit.run(&mut conn, tx).await.unwrap_err();
        assert!(matches!(err, RecordError::ResourceAcquisition { .. }));
        assert!(observer.is_closed());
    }

    #[tokio::test]
    async fn test_source_dropped_receiver() {
        let mut conn = source_conn();
        let unit = SourceUnit::new(profile(), driver(), QUERY)
            .with_registry(DriverRegistry::new());

        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let err = unit.run(&mut conn, tx).await.unwrap_err();
        assert!(err.to_string().contains("channel closed"));
    }

    // =========================================================================
    // Sink
    // =========================================================================

    fn sink_conn() -> MemoryConnection {
        MemoryConnection::new().with_table("\"archive\".\"users\"", columns())
    }

    #[tokio::test]
    async fn test_sink_writes_records() {
        let mut conn = sink_conn();
        let observer = conn.clone();
        let registry = DriverRegistry::new();
        let unit = SinkUnit::new(profile(), driver(), "archive", "users", fields())
            .with_registry(Arc::clone(&registry));

        let (tx, rx) = mpsc::channel(4);
        tx.send(vec![record(1, "alice"), record(2, "bob")]).await.unwrap();
        tx.send(vec![Record::new().with("ID", Value::Int(3))]).await.unwrap();
        drop(tx);

        let stats = unit.run(&mut conn, rx).await.unwrap();

        assert_eq!(stats.rows, 3);
        assert_eq!(
            observer.prepared(),
            vec!["INSERT INTO \"archive\".\"users\" (\"ID\", \"NAME\") VALUES (?, ?)"]
        );
        let written = observer.written();
        assert_eq!(written.len(), 3);
        assert_eq!(
            written[0],
            vec![(1, SqlValue::I32(1)), (2, SqlValue::Text("alice".into()))]
        );
        // An absent nullable field is written as NULL.
        assert!(written[2][1].1.is_null());
        assert!(observer.is_closed());
        assert_eq!(registry.handle_count("memory"), 0);
    }

    #[tokio::test]
    async fn test_sink_validation_failure_writes_nothing() {
        let mut conn = sink_conn();
        let observer = conn.clone();
        // NAME alone: the NOT NULL column ID has no field.
        let unit = SinkUnit::new(
            profile(),
            driver(),
            "archive",
            "users",
            vec![Field::new("NAME", UniversalType::string().nullable())],
        )
        .with_registry(DriverRegistry::new());

        let (tx, rx) = mpsc::channel(1);
        tx.send(vec![record(1, "alice")]).await.unwrap();
        drop(tx);

        let err = unit.run(&mut conn, rx).await.unwrap_err();
        let failures = match err {
            RecordError::Validation(failures) => failures,
            other => panic!("expected a validation error, got {other:?}"),
        };
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].field, "ID");
        assert!(observer.prepared().is_empty());
        assert!(observer.written().is_empty());
        assert!(observer.is_closed());
    }

    #[tokio::test]
    async fn test_sink_bad_record_is_not_written() {
        let mut conn = sink_conn();
        let observer = conn.clone();
        let unit = SinkUnit::new(profile(), driver(), "archive", "users", fields())
            .with_registry(DriverRegistry::new());

        let (tx, rx) = mpsc::channel(1);
        tx.send(vec![
            record(1, "alice"),
            Record::new()
                .with("ID", Value::String("two".into()))
                .with("NAME", Value::String("bob".into())),
        ])
        .await
        .unwrap();
        drop(tx);

        let err = unit.run(&mut conn, rx).await.unwrap_err();
        assert!(matches!(err, RecordError::RowConversion { ref field, .. } if field == "ID"));
        assert_eq!(observer.written().len(), 1);
        assert!(observer.is_closed());
    }

    #[tokio::test]
    async fn test_sink_missing_table() {
        let mut conn = MemoryConnection::new();
        let observer = conn.clone();
        let unit = SinkUnit::new(profile(), driver(), "", "users", fields())
            .with_registry(DriverRegistry::new());

        let (_tx, rx) = mpsc::channel(1);
        assert!(unit.run(&mut conn, rx).await.is_err());
        assert!(observer.is_closed());
    }

    #[test]
    fn test_insert_statement_escapes_identifiers() {
        let profile = DialectProfile::generic();
        let sql = insert_statement(
            &profile,
            "\"t\"",
            &[Field::new("odd\"name", UniversalType::int())],
        )
        .unwrap();
        assert_eq!(sql, "INSERT INTO \"t\" (\"odd\"\"name\") VALUES (?)");
        assert!(insert_statement(&profile, "\"t\"", &[]).is_err());
    }

    // =========================================================================
    // Source to sink
    // =========================================================================

    #[tokio::test]
    async fn test_source_to_sink() {
        let registry = DriverRegistry::new();
        let mut source_conn = source_conn();
        let mut sink_conn = sink_conn();
        let observer = sink_conn.clone();

        let source = SourceUnit::new(profile(), driver(), QUERY)
            .with_registry(Arc::clone(&registry))
            .with_schema(fields())
            .with_batch_size(2);
        let sink = SinkUnit::new(profile(), driver(), "archive", "users", fields())
            .with_registry(Arc::clone(&registry));

        let (tx, rx) = mpsc::channel(1);
        let (read, written) = tokio::join!(
            source.run(&mut source_conn, tx),
            sink.run(&mut sink_conn, rx),
        );

        assert_eq!(read.unwrap().rows, 3);
        assert_eq!(written.unwrap().rows, 3);
        assert_eq!(
            observer.written()[2],
            vec![(1, SqlValue::I32(3)), (2, SqlValue::Text("carol".into()))]
        );
        assert!(!registry.is_registered("memory"));
    }
}
