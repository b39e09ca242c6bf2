//! SQL passthrough to a single SQLite database file.

use std::path::PathBuf;
use std::str::FromStr;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::{Map, Value};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqliteRow};
use sqlx::{Column, Row, TypeInfo, ValueRef};
use tokio::sync::OnceCell;

use crate::error::{Error, Result};

/// Runs arbitrary SQL against the documents database
///
/// The pool is opened on first use, so a bridge that never touches SQL never
/// creates the database file.
pub struct SqliteExecutor {
    path: PathBuf,
    pool: OnceCell<SqlitePool>,
}

impl SqliteExecutor {
    /// Executor for the database at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            pool: OnceCell::new(),
        }
    }

    async fn pool(&self) -> Result<&SqlitePool> {
        self.pool
            .get_or_try_init(|| async {
                let options = SqliteConnectOptions::from_str(&format!(
                    "sqlite:{}",
                    self.path.display()
                ))?
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal);

                tracing::debug!(path = %self.path.display(), "opening sqlite database");
                Ok::<_, Error>(SqlitePool::connect_with(options).await?)
            })
            .await
    }

    /// Run one statement and return its rows as JSON objects
    ///
    /// Statements that return no rows (DDL, INSERT, UPDATE) resolve to `[]`.
    pub async fn query(&self, sql: &str) -> Result<Value> {
        let pool = self.pool().await?;
        let rows = sqlx::query(sql).fetch_all(pool).await?;
        tracing::debug!(rows = rows.len(), "sql statement executed");
        Ok(Value::Array(rows.iter().map(row_to_json).collect()))
    }

    /// Close the pool if it was ever opened
    pub async fn close(&self) {
        if let Some(pool) = self.pool.get() {
            pool.close().await;
        }
    }
}

/// Convert one row to `{column: value}`, choosing the JSON type from the
/// value's storage class
fn row_to_json(row: &SqliteRow) -> Value {
    let mut object = Map::with_capacity(row.columns().len());
    for column in row.columns() {
        let index = column.ordinal();
        object.insert(column.name().to_string(), column_value(row, index));
    }
    Value::Object(object)
}

fn column_value(row: &SqliteRow, index: usize) -> Value {
    let type_name = match row.try_get_raw(index) {
        Ok(raw) if raw.is_null() => return Value::Null,
        Ok(raw) => raw.type_info().name().to_ascii_uppercase(),
        Err(_) => return Value::Null,
    };

    match type_name.as_str() {
        "INTEGER" | "BOOLEAN" => row
            .try_get::<i64, _>(index)
            .map(Value::from)
            .unwrap_or(Value::Null),
        "REAL" | "NUMERIC" => row
            .try_get::<f64, _>(index)
            .map(Value::from)
            .unwrap_or(Value::Null),
        "BLOB" => row
            .try_get::<Vec<u8>, _>(index)
            .map(|bytes| Value::String(STANDARD.encode(bytes)))
            .unwrap_or(Value::Null),
        _ => row
            .try_get::<String, _>(index)
            .map(Value::String)
            .unwrap_or(Value::Null),
    }
}
