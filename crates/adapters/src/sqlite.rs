use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use rusqlite::types::ValueRef;
use rusqlite::{Connection, InterruptHandle, OpenFlags};
use sqlb_core::connection_manager::{
    BackendError, ConnectionBackend, DatabaseLocation, DatabaseTarget,
};
use sqlb_core::query_runner::{QueryBackend, QueryBackendError, QueryRow, QueryRowStream};
use sqlb_core::schema_cache::{
    ColumnSchema, DatabaseSchema, ForeignKeySchema, IndexSchema, SchemaBackend,
    SchemaBackendError, SchemaCatalog, TableKind, TableSchema,
};
use sqlb_core::sql_generator::{quote_identifier, quote_sql_string};
use sqlb_core::sql_validator::parse_statements;
use tokio::sync::mpsc;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);
const ROW_CHANNEL_CAPACITY: usize = 256;

/// Shared handle to one open SQLite connection.
#[derive(Clone)]
pub struct SqliteHandle {
    connection: Arc<Mutex<Connection>>,
    interrupt: Arc<InterruptHandle>,
}

impl fmt::Debug for SqliteHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteHandle").finish_non_exhaustive()
    }
}

impl SqliteHandle {
    pub fn open(target: &DatabaseTarget) -> Result<Self, rusqlite::Error> {
        let flags = if target.read_only {
            OpenFlags::SQLITE_OPEN_READ_ONLY
                | OpenFlags::SQLITE_OPEN_URI
                | OpenFlags::SQLITE_OPEN_NO_MUTEX
        } else {
            OpenFlags::default()
        };
        let connection = match &target.location {
            DatabaseLocation::File(path) => Connection::open_with_flags(path, flags)?,
            DatabaseLocation::InMemory => Connection::open_in_memory_with_flags(flags)?,
        };
        connection.busy_timeout(BUSY_TIMEOUT)?;

        Ok(Self::from_connection(connection))
    }

    #[must_use]
    pub fn from_connection(connection: Connection) -> Self {
        let interrupt = Arc::new(connection.get_interrupt_handle());
        Self {
            connection: Arc::new(Mutex::new(connection)),
            interrupt,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, String> {
        self.connection
            .lock()
            .map_err(|_| "sqlite connection lock is poisoned".to_string())
    }

    /// Runs `work` against the connection on the blocking pool.
    async fn with_connection<T, F>(&self, work: F) -> Result<T, String>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, rusqlite::Error> + Send + 'static,
    {
        let handle = self.clone();
        tokio::task::spawn_blocking(move || {
            let connection = handle.lock()?;
            work(&connection).map_err(|error| error.to_string())
        })
        .await
        .map_err(|error| format!("sqlite worker failed: {error}"))?
    }

    pub fn interrupt(&self) {
        self.interrupt.interrupt();
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteConnectionBackend;

#[async_trait]
impl ConnectionBackend for SqliteConnectionBackend {
    type Connection = SqliteHandle;

    async fn connect(&self, target: &DatabaseTarget) -> Result<Self::Connection, BackendError> {
        let target = target.clone();
        tokio::task::spawn_blocking(move || SqliteHandle::open(&target))
            .await
            .map_err(|error| BackendError::new(format!("sqlite worker failed: {error}")))?
            .map_err(to_connection_error)
    }

    async fn ping(&self, connection: &mut Self::Connection) -> Result<(), BackendError> {
        // Reading the catalog forces the header check, so non-database files fail here.
        connection
            .with_connection(|connection| {
                connection.query_row("SELECT count(*) FROM sqlite_master", [], |row| {
                    row.get::<_, i64>(0)
                })
            })
            .await
            .map(|_| ())
            .map_err(BackendError::new)
    }

    async fn disconnect(&self, connection: Self::Connection) -> Result<(), BackendError> {
        let SqliteHandle { connection, .. } = connection;
        // Other clones (a data backend) keep the connection alive until dropped.
        let Ok(mutex) = Arc::try_unwrap(connection) else {
            return Ok(());
        };
        let connection = mutex
            .into_inner()
            .map_err(|_| BackendError::new("sqlite connection lock is poisoned"))?;
        connection
            .close()
            .map_err(|(_, error)| to_connection_error(error))
    }
}

/// Schema and query access over a connection opened by [`SqliteConnectionBackend`].
#[derive(Debug, Clone)]
pub struct SqliteDataBackend {
    handle: SqliteHandle,
}

impl SqliteDataBackend {
    #[must_use]
    pub fn new(handle: SqliteHandle) -> Self {
        Self { handle }
    }

    #[must_use]
    pub fn handle(&self) -> &SqliteHandle {
        &self.handle
    }
}

#[async_trait]
impl SchemaBackend for SqliteDataBackend {
    async fn fetch_schema(&self) -> Result<SchemaCatalog, SchemaBackendError> {
        let catalog = self
            .handle
            .with_connection(load_catalog)
            .await
            .map_err(SchemaBackendError::new)?;
        tracing::debug!(
            schemas = catalog.schemas.len(),
            tables = catalog.table_count(),
            "schema loaded"
        );
        Ok(catalog)
    }
}

fn load_catalog(connection: &Connection) -> Result<SchemaCatalog, rusqlite::Error> {
    let attached = {
        let mut statement = connection.prepare("PRAGMA database_list")?;
        let rows = statement.query_map([], |row| {
            Ok((row.get::<_, String>(1)?, row.get::<_, Option<String>>(2)?))
        })?;
        rows.collect::<Result<Vec<_>, _>>()?
    };

    let mut schemas = Vec::with_capacity(attached.len());
    for (name, file) in attached {
        let tables = load_tables(connection, &name)?;
        schemas.push(DatabaseSchema {
            name,
            file: file.filter(|file| !file.is_empty()),
            tables,
        });
    }

    Ok(SchemaCatalog { schemas })
}

fn load_tables(connection: &Connection, schema: &str) -> Result<Vec<TableSchema>, rusqlite::Error> {
    let master = if schema.eq_ignore_ascii_case("temp") {
        "sqlite_temp_master".to_string()
    } else {
        format!("{}.sqlite_master", quote_identifier(schema))
    };
    let objects = {
        let mut statement = connection.prepare(&format!(
            "SELECT name, type FROM {master} \
             WHERE type IN ('table', 'view') AND name NOT LIKE 'sqlite_%' \
             ORDER BY name"
        ))?;
        let rows = statement.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        rows.collect::<Result<Vec<_>, _>>()?
    };

    let mut tables = Vec::with_capacity(objects.len());
    for (name, kind) in objects {
        let kind = if kind == "view" {
            TableKind::View
        } else {
            TableKind::Table
        };
        tables.push(TableSchema {
            columns: load_columns(connection, schema, &name)?,
            foreign_keys: load_foreign_keys(connection, schema, &name)?,
            indexes: load_indexes(connection, schema, &name)?,
            name,
            kind,
        });
    }
    Ok(tables)
}

fn pragma_sql(schema: &str, pragma: &str, argument: &str) -> String {
    format!(
        "PRAGMA {}.{pragma}({})",
        quote_identifier(schema),
        quote_sql_string(argument)
    )
}

fn load_columns(
    connection: &Connection,
    schema: &str,
    table: &str,
) -> Result<Vec<ColumnSchema>, rusqlite::Error> {
    let mut statement = connection.prepare(&pragma_sql(schema, "table_info", table))?;
    let rows = statement.query_map([], |row| {
        let primary_key_position = row.get::<_, u32>(5)?;
        Ok(ColumnSchema {
            name: row.get(1)?,
            data_type: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
            nullable: row.get::<_, i64>(3)? == 0,
            default_value: row.get(4)?,
            primary_key_position: (primary_key_position > 0).then_some(primary_key_position),
        })
    })?;
    rows.collect()
}

fn load_foreign_keys(
    connection: &Connection,
    schema: &str,
    table: &str,
) -> Result<Vec<ForeignKeySchema>, rusqlite::Error> {
    let mut statement = connection.prepare(&pragma_sql(schema, "foreign_key_list", table))?;
    let rows = statement.query_map([], |row| {
        Ok(ForeignKeySchema {
            id: row.get(0)?,
            referenced_table: row.get(2)?,
            column_name: row.get(3)?,
            referenced_column: row.get(4)?,
        })
    })?;
    rows.collect()
}

fn load_indexes(
    connection: &Connection,
    schema: &str,
    table: &str,
) -> Result<Vec<IndexSchema>, rusqlite::Error> {
    let listed = {
        let mut statement = connection.prepare(&pragma_sql(schema, "index_list", table))?;
        let rows = statement.query_map([], |row| {
            Ok((row.get::<_, String>(1)?, row.get::<_, i64>(2)? != 0))
        })?;
        rows.collect::<Result<Vec<_>, _>>()?
    };

    let mut indexes = Vec::with_capacity(listed.len());
    for (name, unique) in listed {
        let mut statement = connection.prepare(&pragma_sql(schema, "index_info", &name))?;
        let columns = statement
            .query_map([], |row| row.get::<_, Option<String>>(2))?
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .map(|column| column.unwrap_or_else(|| "<expression>".to_string()))
            .collect();
        indexes.push(IndexSchema {
            name,
            unique,
            columns,
        });
    }
    indexes.sort_by(|left, right| left.name.cmp(&right.name));
    Ok(indexes)
}

#[derive(Debug)]
enum StreamEvent {
    Columns(Vec<String>),
    Row(QueryRow),
    Done { rows_affected: Option<u64> },
    Failed(String),
}

/// Rows produced by a statement running on the blocking pool.
#[derive(Debug)]
pub struct SqliteRowStream {
    receiver: Option<mpsc::Receiver<StreamEvent>>,
    handle: SqliteHandle,
    columns: Vec<String>,
    rows_affected: Option<u64>,
    cancelled: Arc<AtomicBool>,
}

#[async_trait]
impl QueryRowStream for SqliteRowStream {
    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn rows_affected(&self) -> Option<u64> {
        self.rows_affected
    }

    async fn next_row(&mut self) -> Result<Option<QueryRow>, QueryBackendError> {
        let Some(receiver) = self.receiver.as_mut() else {
            return Ok(None);
        };

        match receiver.recv().await {
            Some(StreamEvent::Row(row)) => Ok(Some(row)),
            Some(StreamEvent::Done { rows_affected }) => {
                self.rows_affected = rows_affected;
                self.receiver = None;
                Ok(None)
            }
            Some(StreamEvent::Failed(message)) => {
                self.receiver = None;
                Err(QueryBackendError::new(message))
            }
            Some(StreamEvent::Columns(_)) => Err(QueryBackendError::new(
                "sqlite worker sent columns twice",
            )),
            None => {
                self.receiver = None;
                if self.cancelled.load(Ordering::SeqCst) {
                    Ok(None)
                } else {
                    Err(QueryBackendError::new("sqlite worker stopped unexpectedly"))
                }
            }
        }
    }

    async fn cancel(&mut self) -> Result<(), QueryBackendError> {
        self.cancelled.store(true, Ordering::SeqCst);
        self.receiver = None;
        self.handle.interrupt();
        Ok(())
    }
}

#[async_trait]
impl QueryBackend for SqliteDataBackend {
    type Stream = SqliteRowStream;

    async fn start_query(&self, sql: &str) -> Result<Self::Stream, QueryBackendError> {
        let sql = sql.trim().to_string();
        if sql.is_empty() {
            return Err(QueryBackendError::new("query text is empty"));
        }

        // Scripts run as one batch and report changes only; text the parser
        // rejects is left for SQLite to judge as a single statement.
        let batch = parse_statements(&sql).is_ok_and(|statements| statements.len() > 1);
        let (sender, mut receiver) = mpsc::channel(ROW_CHANNEL_CAPACITY);
        let cancelled = Arc::new(AtomicBool::new(false));
        let handle = self.handle.clone();
        let worker_cancelled = Arc::clone(&cancelled);
        tracing::debug!(sql = %sql, batch, "starting sqlite statement");
        tokio::task::spawn_blocking(move || {
            run_statement(&handle, &sql, batch, &sender, &worker_cancelled);
        });

        let columns = match receiver.recv().await {
            Some(StreamEvent::Columns(columns)) => columns,
            Some(StreamEvent::Failed(message)) => return Err(QueryBackendError::new(message)),
            Some(other) => {
                return Err(QueryBackendError::new(format!(
                    "unexpected sqlite worker event: {other:?}"
                )))
            }
            None => return Err(QueryBackendError::new("sqlite worker stopped unexpectedly")),
        };

        Ok(SqliteRowStream {
            receiver: Some(receiver),
            handle: self.handle.clone(),
            columns,
            rows_affected: None,
            cancelled,
        })
    }
}

fn run_statement(
    handle: &SqliteHandle,
    sql: &str,
    batch: bool,
    sender: &mpsc::Sender<StreamEvent>,
    cancelled: &AtomicBool,
) {
    let outcome = match handle.lock() {
        Ok(connection) => stream_statement(&connection, sql, batch, sender, cancelled)
            .map_err(|error| error.to_string()),
        Err(message) => Err(message),
    };
    if let Err(message) = outcome {
        if !cancelled.load(Ordering::SeqCst) {
            tracing::warn!(error = %message, "sqlite statement failed");
        }
        let _ = sender.blocking_send(StreamEvent::Failed(message));
    }
}

fn stream_statement(
    connection: &Connection,
    sql: &str,
    batch: bool,
    sender: &mpsc::Sender<StreamEvent>,
    cancelled: &AtomicBool,
) -> Result<(), rusqlite::Error> {
    if batch {
        let before = u64::try_from(connection.total_changes()).unwrap_or(u64::MAX);
        connection.execute_batch(sql)?;
        let after = u64::try_from(connection.total_changes()).unwrap_or(u64::MAX);
        let _ = sender.blocking_send(StreamEvent::Columns(Vec::new()));
        let _ = sender.blocking_send(StreamEvent::Done {
            rows_affected: Some(after.saturating_sub(before)),
        });
        return Ok(());
    }

    let mut statement = connection.prepare(sql)?;
    let columns = statement
        .column_names()
        .into_iter()
        .map(str::to_string)
        .collect::<Vec<_>>();
    if columns.is_empty() {
        let changed = statement.execute([])?;
        let _ = sender.blocking_send(StreamEvent::Columns(Vec::new()));
        let _ = sender.blocking_send(StreamEvent::Done {
            rows_affected: Some(u64::try_from(changed).unwrap_or(u64::MAX)),
        });
        return Ok(());
    }

    let column_count = columns.len();
    if sender.blocking_send(StreamEvent::Columns(columns)).is_err() {
        return Ok(());
    }

    let mut rows = statement.query([])?;
    while let Some(row) = rows.next()? {
        if cancelled.load(Ordering::SeqCst) {
            return Ok(());
        }
        let values = (0..column_count)
            .map(|index| row.get_ref(index).map(display_value))
            .collect::<Result<Vec<_>, _>>()?;
        if sender
            .blocking_send(StreamEvent::Row(QueryRow::new(values)))
            .is_err()
        {
            return Ok(());
        }
    }

    let _ = sender.blocking_send(StreamEvent::Done {
        rows_affected: None,
    });
    Ok(())
}

fn display_value(value: ValueRef<'_>) -> Option<String> {
    match value {
        ValueRef::Null => None,
        ValueRef::Integer(value) => Some(value.to_string()),
        // Debug keeps the fractional part, so 15.0 stays distinct from 15.
        ValueRef::Real(value) => Some(format!("{value:?}")),
        ValueRef::Text(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Some(format!("<blob {} bytes>", bytes.len())),
    }
}

fn to_connection_error(error: rusqlite::Error) -> BackendError {
    BackendError::new(error.to_string())
}

#[cfg(test)]
mod tests {
    use rusqlite::types::ValueRef;
    use rusqlite::Connection;
    use sqlb_core::query_runner::{QueryBackend, QueryRowStream};
    use sqlb_core::schema_cache::{SchemaBackend, TableKind};

    use super::{display_value, SqliteDataBackend, SqliteHandle};

    fn seeded_backend() -> SqliteDataBackend {
        let connection = Connection::open_in_memory().expect("in-memory database should open");
        connection
            .execute_batch(
                "CREATE TABLE users (id INTEGER PRIMARY KEY, email TEXT NOT NULL UNIQUE, bio TEXT);
                 CREATE TABLE orders (
                     id INTEGER PRIMARY KEY,
                     user_id INTEGER REFERENCES users,
                     total REAL DEFAULT 0
                 );
                 CREATE INDEX idx_orders_user ON orders(user_id);
                 CREATE VIEW big_orders AS SELECT * FROM orders WHERE total > 100;
                 INSERT INTO users (email, bio) VALUES ('ann@example.com', NULL), ('bob@example.com', 'hi');",
            )
            .expect("seed should apply");
        SqliteDataBackend::new(SqliteHandle::from_connection(connection))
    }

    #[test]
    fn values_render_for_display() {
        assert_eq!(display_value(ValueRef::Null), None);
        assert_eq!(display_value(ValueRef::Integer(-8)), Some("-8".to_string()));
        assert_eq!(display_value(ValueRef::Real(1.5)), Some("1.5".to_string()));
        assert_eq!(display_value(ValueRef::Real(15.0)), Some("15.0".to_string()));
        assert_eq!(
            display_value(ValueRef::Blob(&[1, 2, 3])),
            Some("<blob 3 bytes>".to_string())
        );
    }

    #[tokio::test]
    async fn fetch_schema_reads_tables_views_keys_and_indexes() {
        let backend = seeded_backend();
        let catalog = backend.fetch_schema().await.expect("schema should load");

        let main = catalog.schema("main").expect("main schema");
        let names = main
            .tables
            .iter()
            .map(|table| table.name.as_str())
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["big_orders", "orders", "users"]);
        assert_eq!(
            main.table("big_orders").map(|table| table.kind),
            Some(TableKind::View)
        );

        let orders = main.table("orders").expect("orders table");
        assert_eq!(orders.foreign_keys.len(), 1);
        assert_eq!(orders.foreign_keys[0].referenced_table, "users");
        assert_eq!(orders.foreign_keys[0].referenced_column, None);
        assert_eq!(orders.indexes[0].name, "idx_orders_user");
        assert_eq!(orders.indexes[0].columns, vec!["user_id".to_string()]);
        assert_eq!(
            orders
                .column("total")
                .and_then(|column| column.default_value.clone()),
            Some("0".to_string())
        );

        let users = main.table("users").expect("users table");
        assert_eq!(users.columns[0].primary_key_position, Some(1));
        assert!(!users.columns[1].nullable);
        assert!(users.indexes.iter().any(|index| index.unique));
    }

    #[tokio::test]
    async fn streams_rows_and_reports_nulls() {
        let backend = seeded_backend();
        let mut stream = backend
            .start_query("SELECT email, bio FROM users ORDER BY id")
            .await
            .expect("query should start");

        assert_eq!(stream.columns(), ["email".to_string(), "bio".to_string()]);
        let first = stream.next_row().await.expect("row").expect("first row");
        assert_eq!(first.values, vec![Some("ann@example.com".to_string()), None]);
        let second = stream.next_row().await.expect("row").expect("second row");
        assert_eq!(second.display(1), "hi");
        assert!(stream.next_row().await.expect("end").is_none());
        assert_eq!(stream.rows_affected(), None);
    }

    #[tokio::test]
    async fn statements_without_rows_report_changes() {
        let backend = seeded_backend();
        let mut stream = backend
            .start_query("UPDATE users SET bio = 'x'")
            .await
            .expect("update should start");
        assert!(stream.columns().is_empty());
        assert!(stream.next_row().await.expect("end").is_none());
        assert_eq!(stream.rows_affected(), Some(2));

        let mut batch = backend
            .start_query(
                "INSERT INTO users (email) VALUES ('c@d.e'); DELETE FROM users WHERE bio = 'x';",
            )
            .await
            .expect("batch should start");
        assert!(batch.next_row().await.expect("end").is_none());
        assert_eq!(batch.rows_affected(), Some(3));

        let mut count = backend
            .start_query("SELECT COUNT(*) FROM users")
            .await
            .expect("count should start");
        let row = count.next_row().await.expect("row").expect("count row");
        assert_eq!(row.display(0), "1");
    }

    #[tokio::test]
    async fn invalid_sql_fails_at_start() {
        let backend = seeded_backend();
        let err = backend
            .start_query("SELECT * FROM missing_table")
            .await
            .expect_err("unknown table should fail");
        assert!(err.message().contains("no such table"));
    }

    #[tokio::test]
    async fn cancelled_stream_stops_yielding_rows() {
        let backend = seeded_backend();
        let mut stream = backend
            .start_query(
                "WITH RECURSIVE n(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM n) SELECT x FROM n",
            )
            .await
            .expect("query should start");
        assert!(stream.next_row().await.expect("row").is_some());

        stream.cancel().await.expect("cancel should succeed");
        assert!(stream.next_row().await.expect("end").is_none());

        let mut follow_up = backend
            .start_query("SELECT COUNT(*) FROM users")
            .await
            .expect("connection should be usable after cancel");
        let row = follow_up.next_row().await.expect("row").expect("count row");
        assert_eq!(row.display(0), "2");
    }
}
