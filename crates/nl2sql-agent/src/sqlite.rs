//! SQLite as the target database.
//!
//! One connection serves all three database roles: schema extraction,
//! validation (statements are compiled but never stepped) and execution
//! of read-only statements.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use nl2sql_core::{DbError, SchemaSource, StatementRunner, SyntaxValidator};
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags, Statement};
use serde_json::{Map, Number, Value};
use tracing::debug;

/// Sample rows appended to each table definition by default.
pub const DEFAULT_SAMPLE_ROWS: usize = 3;

/// A SQLite database queried on behalf of users.
#[derive(Debug, Clone)]
pub struct SqliteDatabase {
    path: Option<PathBuf>,
    conn: Arc<Mutex<Connection>>,
    sample_rows: usize,
}

impl SqliteDatabase {
    /// Open an existing database file read-only.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DbError> {
        let path = path.as_ref();
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| DbError::Connection(format!("{}: {e}", path.display())))?;
        Ok(Self {
            path: Some(path.to_path_buf()),
            conn: Arc::new(Mutex::new(conn)),
            sample_rows: DEFAULT_SAMPLE_ROWS,
        })
    }

    /// Wrap an already open connection.
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            path: None,
            conn: Arc::new(Mutex::new(conn)),
            sample_rows: DEFAULT_SAMPLE_ROWS,
        }
    }

    /// Number of sample rows shown per table in [`SchemaSource::raw_schema`].
    #[must_use]
    pub fn with_sample_rows(mut self, rows: usize) -> Self {
        self.sample_rows = rows;
        self
    }

    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, DbError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, DbError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| DbError::Connection("database connection poisoned".to_string()))?;
            f(&guard)
        })
        .await
        .map_err(|e| DbError::Query(e.to_string()))?
    }
}

/// Compile `statement` and make sure it is a read-only query.
///
/// Comment-only input compiles to an empty statement with no result
/// columns, so a statement without columns is rejected too.
fn prepare_query<'c>(conn: &'c Connection, statement: &str) -> Result<Statement<'c>, DbError> {
    let stmt = conn
        .prepare(statement)
        .map_err(|e| DbError::Syntax(e.to_string()))?;
    if !stmt.readonly() {
        return Err(DbError::Rejected("statement writes to the database".to_string()));
    }
    if stmt.column_count() == 0 {
        return Err(DbError::Rejected("statement returns no columns".to_string()));
    }
    Ok(stmt)
}

fn query_err(e: rusqlite::Error) -> DbError {
    DbError::Query(e.to_string())
}

fn render_value(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Null => "NULL".to_string(),
        ValueRef::Integer(i) => i.to_string(),
        ValueRef::Real(f) => f.to_string(),
        ValueRef::Text(t) => String::from_utf8_lossy(t).into_owned(),
        ValueRef::Blob(b) => format!("<{} bytes>", b.len()),
    }
}

fn json_value(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => Number::from_f64(f).map_or(Value::Null, Value::Number),
        ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::String(format!("<{} bytes>", b.len())),
    }
}

/// Up to `limit` rows of `table` in the commented layout models expect.
fn sample_block(conn: &Connection, table: &str, limit: usize) -> Result<Option<String>, DbError> {
    let quoted = format!("\"{}\"", table.replace('"', "\"\""));
    let mut stmt = conn
        .prepare(&format!("SELECT * FROM {quoted} LIMIT {limit}"))
        .map_err(query_err)?;
    let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

    let mut lines = vec![columns.join("\t")];
    let mut rows = stmt.query([]).map_err(query_err)?;
    while let Some(row) = rows.next().map_err(query_err)? {
        let mut cells = Vec::with_capacity(columns.len());
        for i in 0..columns.len() {
            cells.push(render_value(row.get_ref(i).map_err(query_err)?));
        }
        lines.push(cells.join("\t"));
    }

    if lines.len() == 1 {
        return Ok(None);
    }
    Ok(Some(format!(
        "/*\n{} rows from {} table:\n{}\n*/",
        lines.len() - 1,
        table,
        lines.join("\n")
    )))
}

#[async_trait]
impl SchemaSource for SqliteDatabase {
    async fn raw_schema(&self) -> Result<String, DbError> {
        let sample_rows = self.sample_rows;
        self.with_conn(move |conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT name, sql FROM sqlite_master
                     WHERE type = 'table' AND name NOT LIKE 'sqlite_%' AND sql IS NOT NULL
                     ORDER BY name",
                )
                .map_err(query_err)?;
            let tables = stmt
                .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))
                .map_err(query_err)?
                .collect::<Result<Vec<_>, _>>()
                .map_err(query_err)?;

            let mut parts = Vec::with_capacity(tables.len());
            for (name, sql) in tables {
                let mut part = sql.trim().to_string();
                if sample_rows > 0 {
                    if let Some(block) = sample_block(conn, &name, sample_rows)? {
                        part.push_str("\n\n");
                        part.push_str(&block);
                    }
                }
                parts.push(part);
            }
            debug!("Extracted {} table definitions", parts.len());
            Ok(parts.join("\n\n"))
        })
        .await
    }
}

#[async_trait]
impl SyntaxValidator for SqliteDatabase {
    async fn check(&self, statement: &str) -> Result<(), DbError> {
        let statement = statement.to_string();
        self.with_conn(move |conn| prepare_query(conn, &statement).map(|_| ()))
        .await
    }
}

#[async_trait]
impl StatementRunner for SqliteDatabase {
    async fn run(&self, statement: &str) -> Result<Vec<Map<String, Value>>, DbError> {
        let statement = statement.to_string();
        self.with_conn(move |conn| {
            let mut stmt = prepare_query(conn, &statement)?;
            let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

            let mut out = Vec::new();
            let mut rows = stmt.query([]).map_err(query_err)?;
            while let Some(row) = rows.next().map_err(query_err)? {
                let mut object = Map::with_capacity(columns.len());
                for (i, column) in columns.iter().enumerate() {
                    object.insert(column.clone(), json_value(row.get_ref(i).map_err(query_err)?));
                }
                out.push(object);
            }
            debug!("Statement returned {} rows", out.len());
            Ok(out)
        })
        .await
    }
}
