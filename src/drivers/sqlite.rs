//! SQLite driver.
//!
//! Wraps a single SQLx `SqliteConnection`. SQLite uses dynamic typing with
//! type affinity, so decoding goes by the declared type name first and falls
//! back to probing the common representations.
//!
//! SQLite has no stored routines; `call` always fails with a statement
//! error.

use std::str::FromStr;

use async_trait::async_trait;
use sqlx::query::Query;
use sqlx::sqlite::{Sqlite, SqliteArguments, SqliteConnectOptions, SqliteConnection, SqliteRow};
use sqlx::{Column, Connection as _, Executor, Row, TypeInfo, ValueRef};

use super::{CallPayload, Driver, FetchPayload};
use crate::config::{ConnectionConfig, ConnectionParams, DatabaseType};
use crate::error::{Error, Result};
use crate::row::ColumnMeta;
use crate::statement::Param;
use crate::value::Value;

pub(crate) struct SqliteDriver {
    conn: Option<SqliteConnection>,
}

impl SqliteDriver {
    /// Open a SQLite connection from the configuration.
    pub(crate) async fn connect(config: &ConnectionConfig) -> Result<Self> {
        let options = match &config.params {
            ConnectionParams::File { path, read_only } => SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(!read_only)
                .read_only(*read_only)
                .foreign_keys(true),
            ConnectionParams::InMemory => SqliteConnectOptions::from_str(":memory:")
                .map_err(|e| Error::connection_caused("invalid in-memory options", e))?
                .foreign_keys(true),
            ConnectionParams::Server { .. } => {
                return Err(Error::connection(
                    "SQLite does not support server connections; use file or in-memory parameters",
                ));
            }
        };

        let conn = SqliteConnection::connect_with(&options).await.map_err(|e| {
            Error::connection_caused(
                format!("failed to open {}", config.display_target()),
                e,
            )
        })?;
        tracing::debug!(db = %config.display_target(), "sqlite connection opened");

        Ok(Self { conn: Some(conn) })
    }

    fn conn(&mut self) -> Result<&mut SqliteConnection> {
        self.conn
            .as_mut()
            .ok_or_else(|| Error::connection("connection is closed"))
    }
}

#[async_trait]
impl Driver for SqliteDriver {
    fn database_type(&self) -> DatabaseType {
        DatabaseType::SQLite
    }

    fn is_open(&self) -> bool {
        self.conn.is_some()
    }

    async fn fetch(&mut self, sql: &str, params: &[Param]) -> Result<FetchPayload> {
        let conn = self.conn()?;

        let describe = (&mut *conn)
            .describe(sql)
            .await
            .map_err(|e| Error::statement_caused("failed to prepare statement", e))?;
        let mut columns: Vec<ColumnMeta> = describe
            .columns()
            .iter()
            .map(|col| ColumnMeta::new(col.name(), col.type_info().name(), col.ordinal()))
            .collect();
        for (idx, col) in columns.iter_mut().enumerate() {
            col.nullable = describe.nullable(idx);
        }

        let mut query = sqlx::query(sql);
        for param in params {
            query = bind_param(query, param)?;
        }
        let fetched = query
            .fetch_all(&mut *conn)
            .await
            .map_err(|e| Error::statement_caused("query failed", e))?;
        tracing::debug!(rows = fetched.len(), "sqlite query fetched");

        let rows = fetched.iter().map(|row| decode_row(row, &columns)).collect();
        Ok(FetchPayload { columns, rows })
    }

    async fn execute(&mut self, sql: &str, params: &[Param]) -> Result<u64> {
        let conn = self.conn()?;

        let mut query = sqlx::query(sql);
        for param in params {
            query = bind_param(query, param)?;
        }
        let result = query
            .execute(&mut *conn)
            .await
            .map_err(|e| Error::statement_caused("statement failed", e))?;
        tracing::debug!(rows_affected = result.rows_affected(), "sqlite statement executed");

        Ok(result.rows_affected())
    }

    async fn call(&mut self, routine: &str, _params: &[Param]) -> Result<CallPayload> {
        Err(Error::statement(format!(
            "SQLite has no stored routines; cannot call {routine:?}"
        )))
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(conn) = self.conn.take() {
            conn.close()
                .await
                .map_err(|e| Error::connection_caused("failed to close connection", e))?;
            tracing::debug!("sqlite connection closed");
        }
        Ok(())
    }
}

/// Bind one typed parameter to the query.
fn bind_param<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    param: &Param,
) -> Result<Query<'q, Sqlite, SqliteArguments<'q>>> {
    Ok(match &param.value {
        // SQLite nulls are untyped
        Value::Null => query.bind(Option::<i64>::None),
        Value::Bool(v) => query.bind(*v),
        Value::Int32(v) => query.bind(*v),
        Value::Int64(v) => query.bind(*v),
        Value::UInt64(v) => {
            let v = i64::try_from(*v).map_err(|_| {
                Error::binding(format!("unsigned value {v} is out of range for SQLite"))
            })?;
            query.bind(v)
        }
        Value::Float64(v) => query.bind(*v),
        Value::Text(v) => query.bind(v.clone()),
        Value::Bytes(v) => query.bind(v.clone()),
        Value::Date(v) => query.bind(*v),
        Value::Time(v) => query.bind(*v),
        Value::DateTime(v) => query.bind(*v),
        Value::DateTimeTz(v) => query.bind(*v),
        // No decimal storage class; stored as text for precision
        Value::Decimal(v) => query.bind(v.to_string()),
        Value::Uuid(v) => query.bind(v.to_string()),
        Value::Json(v) => query.bind(v.to_string()),
        Value::Other { type_name, .. } => {
            return Err(Error::binding(format!(
                "cannot bind opaque value of type {type_name}"
            )));
        }
    })
}

/// Decode one row using the declared column types.
fn decode_row(row: &SqliteRow, columns: &[ColumnMeta]) -> Vec<Value> {
    columns
        .iter()
        .enumerate()
        .map(|(idx, col)| decode_value(row, idx, &col.type_name))
        .collect()
}

fn decode_value(row: &SqliteRow, idx: usize, type_name: &str) -> Value {
    match row.try_get_raw(idx) {
        Ok(raw) if raw.is_null() => return Value::Null,
        Err(_) => return Value::Null,
        _ => {}
    }

    // Declared type first, then affinity probing.
    match type_name.to_uppercase().as_str() {
        "INTEGER" | "INT" | "TINYINT" | "SMALLINT" | "MEDIUMINT" | "BIGINT" | "INT2" | "INT8" => {
            row.try_get::<i64, _>(idx)
                .map(Value::Int64)
                .unwrap_or_else(|_| decode_probing(row, idx, type_name))
        }
        "BOOLEAN" | "BOOL" => row
            .try_get::<bool, _>(idx)
            .map(Value::Bool)
            .or_else(|_| row.try_get::<i64, _>(idx).map(|v| Value::Bool(v != 0)))
            .unwrap_or_else(|_| decode_probing(row, idx, type_name)),
        "REAL" | "DOUBLE" | "DOUBLE PRECISION" | "FLOAT" => row
            .try_get::<f64, _>(idx)
            .map(Value::Float64)
            .unwrap_or_else(|_| decode_probing(row, idx, type_name)),
        "BLOB" => row
            .try_get::<Vec<u8>, _>(idx)
            .map(Value::Bytes)
            .unwrap_or_else(|_| decode_probing(row, idx, type_name)),
        "DATE" => decode_temporal_text(row, idx, TemporalKind::Date),
        "TIME" => decode_temporal_text(row, idx, TemporalKind::Time),
        "DATETIME" | "TIMESTAMP" => decode_temporal_text(row, idx, TemporalKind::DateTime),
        "NUMERIC" | "DECIMAL" => decode_numeric(row, idx, type_name),
        _ => row
            .try_get::<String, _>(idx)
            .map(Value::Text)
            .unwrap_or_else(|_| decode_probing(row, idx, type_name)),
    }
}

enum TemporalKind {
    Date,
    Time,
    DateTime,
}

/// SQLite stores temporal values as ISO 8601 text by convention.
fn decode_temporal_text(row: &SqliteRow, idx: usize, kind: TemporalKind) -> Value {
    let Ok(text) = row.try_get::<String, _>(idx) else {
        return decode_probing(row, idx, "TEXT");
    };
    match kind {
        TemporalKind::Date => chrono::NaiveDate::parse_from_str(&text, "%Y-%m-%d")
            .map(Value::Date)
            .unwrap_or(Value::Text(text)),
        TemporalKind::Time => chrono::NaiveTime::parse_from_str(&text, "%H:%M:%S%.f")
            .map(Value::Time)
            .unwrap_or(Value::Text(text)),
        TemporalKind::DateTime => chrono::NaiveDateTime::parse_from_str(&text, "%Y-%m-%d %H:%M:%S%.f")
            .or_else(|_| chrono::NaiveDateTime::parse_from_str(&text, "%Y-%m-%dT%H:%M:%S%.f"))
            .map(Value::DateTime)
            .unwrap_or(Value::Text(text)),
    }
}

fn decode_numeric(row: &SqliteRow, idx: usize, type_name: &str) -> Value {
    if let Ok(text) = row.try_get::<String, _>(idx) {
        if let Ok(decimal) = text.parse::<rust_decimal::Decimal>() {
            return Value::Decimal(decimal);
        }
        return Value::Text(text);
    }
    decode_probing(row, idx, type_name)
}

/// Last resort: probe the storage classes in affinity order.
fn decode_probing(row: &SqliteRow, idx: usize, type_name: &str) -> Value {
    if let Ok(v) = row.try_get::<i64, _>(idx) {
        return Value::Int64(v);
    }
    if let Ok(v) = row.try_get::<f64, _>(idx) {
        return Value::Float64(v);
    }
    if let Ok(v) = row.try_get::<String, _>(idx) {
        return Value::Text(v);
    }
    if let Ok(v) = row.try_get::<Vec<u8>, _>(idx) {
        return Value::Bytes(v);
    }
    Value::Other {
        type_name: type_name.to_string(),
        display: "<unreadable>".to_string(),
    }
}
