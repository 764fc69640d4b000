//! MySQL driver.
//!
//! Wraps a single SQLx `MySqlConnection`. Stored routines are invoked with
//! `CALL name(?, ...)`; MySQL does not declare a routine's result shape at
//! prepare time, so the call path fetches and derives the column metadata
//! from the returned rows.

use async_trait::async_trait;
use futures::TryStreamExt;
use sqlx::mysql::{MySql, MySqlArguments, MySqlConnectOptions, MySqlConnection, MySqlRow, MySqlSslMode};
use sqlx::query::Query;
use sqlx::{Column, Connection as _, Either, Executor, Row, TypeInfo, ValueRef};

use super::{CallPayload, Driver, FetchPayload};
use crate::config::{ConnectionConfig, ConnectionParams, DatabaseType, SslMode};
use crate::error::{Error, Result};
use crate::row::ColumnMeta;
use crate::statement::Param;
use crate::value::Value;

pub(crate) struct MySqlDriver {
    conn: Option<MySqlConnection>,
}

impl MySqlDriver {
    /// Open a MySQL connection from the configuration.
    pub(crate) async fn connect(config: &ConnectionConfig) -> Result<Self> {
        let ConnectionParams::Server {
            host,
            port,
            database,
            username,
            password,
            ssl_mode,
        } = &config.params
        else {
            return Err(Error::connection(
                "MySQL requires server connection parameters",
            ));
        };

        let options = MySqlConnectOptions::new()
            .host(host)
            .port(*port)
            .database(database)
            .username(username)
            .password(password)
            .ssl_mode(map_ssl_mode(*ssl_mode));

        let conn = MySqlConnection::connect_with(&options).await.map_err(|e| {
            Error::connection_caused(
                format!("failed to connect to {}", config.display_target()),
                e,
            )
        })?;
        tracing::debug!(db = %config.display_target(), "mysql connection opened");

        Ok(Self { conn: Some(conn) })
    }

    fn conn(&mut self) -> Result<&mut MySqlConnection> {
        self.conn
            .as_mut()
            .ok_or_else(|| Error::connection("connection is closed"))
    }
}

fn map_ssl_mode(mode: SslMode) -> MySqlSslMode {
    match mode {
        SslMode::Disable => MySqlSslMode::Disabled,
        SslMode::Prefer => MySqlSslMode::Preferred,
        SslMode::Require => MySqlSslMode::Required,
        SslMode::VerifyCa => MySqlSslMode::VerifyCa,
        SslMode::VerifyFull => MySqlSslMode::VerifyIdentity,
    }
}

#[async_trait]
impl Driver for MySqlDriver {
    fn database_type(&self) -> DatabaseType {
        DatabaseType::MySQL
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
            query = bind_param(query, param);
        }
        let fetched = query
            .fetch_all(&mut *conn)
            .await
            .map_err(|e| Error::statement_caused("query failed", e))?;
        tracing::debug!(rows = fetched.len(), "mysql query fetched");

        let rows = fetched.iter().map(|row| decode_row(row, &columns)).collect();
        Ok(FetchPayload { columns, rows })
    }

    async fn execute(&mut self, sql: &str, params: &[Param]) -> Result<u64> {
        let conn = self.conn()?;

        let mut query = sqlx::query(sql);
        for param in params {
            query = bind_param(query, param);
        }
        let result = query
            .execute(&mut *conn)
            .await
            .map_err(|e| Error::statement_caused("statement failed", e))?;
        tracing::debug!(rows_affected = result.rows_affected(), "mysql statement executed");

        Ok(result.rows_affected())
    }

    async fn call(&mut self, routine: &str, params: &[Param]) -> Result<CallPayload> {
        let conn = self.conn()?;

        let placeholders = vec!["?"; params.len()].join(", ");
        let sql = format!("CALL {routine}({placeholders})");
        tracing::debug!(routine, "calling stored routine");

        let mut query = sqlx::query(&sql);
        for param in params {
            query = bind_param(query, param);
        }

        // A CALL yields zero or one result set followed by an OK packet;
        // collect both rows and the affected count from the stream.
        let mut stream = query.fetch_many(&mut *conn);
        let mut fetched: Vec<MySqlRow> = Vec::new();
        let mut affected = 0u64;
        while let Some(item) = stream
            .try_next()
            .await
            .map_err(|e| Error::statement_caused(format!("call to {routine} failed"), e))?
        {
            match item {
                Either::Left(result) => affected += result.rows_affected(),
                Either::Right(row) => fetched.push(row),
            }
        }

        if fetched.is_empty() {
            return Ok(CallPayload::Affected(affected));
        }

        let columns = columns_from_row(&fetched[0]);
        let rows = fetched.iter().map(|row| decode_row(row, &columns)).collect();
        Ok(CallPayload::Rows(FetchPayload { columns, rows }))
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(conn) = self.conn.take() {
            conn.close()
                .await
                .map_err(|e| Error::connection_caused("failed to close connection", e))?;
            tracing::debug!("mysql connection closed");
        }
        Ok(())
    }
}

/// Bind one typed parameter to the query.
fn bind_param<'q>(
    query: Query<'q, MySql, MySqlArguments>,
    param: &Param,
) -> Query<'q, MySql, MySqlArguments> {
    match &param.value {
        Value::Null => query.bind(Option::<String>::None),
        Value::Bool(v) => query.bind(*v),
        Value::Int32(v) => query.bind(*v),
        Value::Int64(v) => query.bind(*v),
        Value::UInt64(v) => query.bind(*v),
        Value::Float64(v) => query.bind(*v),
        Value::Text(v) => query.bind(v.clone()),
        Value::Bytes(v) => query.bind(v.clone()),
        Value::Date(v) => query.bind(*v),
        Value::Time(v) => query.bind(*v),
        Value::DateTime(v) => query.bind(*v),
        Value::DateTimeTz(v) => query.bind(*v),
        Value::Decimal(v) => query.bind(*v),
        Value::Uuid(v) => query.bind(v.to_string()),
        Value::Json(v) => query.bind(v.clone()),
        Value::Other { display, .. } => query.bind(display.clone()),
    }
}

/// Build column metadata from a fetched row (used for CALL results, whose
/// shape is not known at prepare time).
fn columns_from_row(row: &MySqlRow) -> Vec<ColumnMeta> {
    row.columns()
        .iter()
        .map(|col| ColumnMeta::new(col.name(), col.type_info().name(), col.ordinal()))
        .collect()
}

/// Decode one row using the declared column types.
fn decode_row(row: &MySqlRow, columns: &[ColumnMeta]) -> Vec<Value> {
    columns
        .iter()
        .enumerate()
        .map(|(idx, col)| decode_value(row, idx, &col.type_name))
        .collect()
}

fn decode_value(row: &MySqlRow, idx: usize, type_name: &str) -> Value {
    match row.try_get_raw(idx) {
        Ok(raw) if raw.is_null() => return Value::Null,
        Err(_) => return Value::Null,
        _ => {}
    }

    let upper = type_name.to_uppercase();

    // Unsigned integer families first; their names end in UNSIGNED.
    if upper.ends_with("UNSIGNED") {
        return row
            .try_get::<u64, _>(idx)
            .map(Value::UInt64)
            .unwrap_or_else(|_| decode_probing(row, idx, type_name));
    }

    match upper.as_str() {
        "BOOLEAN" => row
            .try_get::<bool, _>(idx)
            .map(Value::Bool)
            .unwrap_or_else(|_| decode_probing(row, idx, type_name)),
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "YEAR" => row
            .try_get::<i32, _>(idx)
            .map(Value::Int32)
            .unwrap_or_else(|_| decode_probing(row, idx, type_name)),
        "BIGINT" => row
            .try_get::<i64, _>(idx)
            .map(Value::Int64)
            .unwrap_or_else(|_| decode_probing(row, idx, type_name)),
        "BIT" => row
            .try_get::<u64, _>(idx)
            .map(Value::UInt64)
            .unwrap_or_else(|_| decode_probing(row, idx, type_name)),
        "FLOAT" => row
            .try_get::<f32, _>(idx)
            .map(|v| Value::Float64(f64::from(v)))
            .unwrap_or_else(|_| decode_probing(row, idx, type_name)),
        "DOUBLE" => row
            .try_get::<f64, _>(idx)
            .map(Value::Float64)
            .unwrap_or_else(|_| decode_probing(row, idx, type_name)),
        "DECIMAL" => row
            .try_get::<rust_decimal::Decimal, _>(idx)
            .map(Value::Decimal)
            .unwrap_or_else(|_| decode_probing(row, idx, type_name)),
        "CHAR" | "VARCHAR" | "TINYTEXT" | "TEXT" | "MEDIUMTEXT" | "LONGTEXT" | "ENUM" | "SET" => {
            row.try_get::<String, _>(idx)
                .map(Value::Text)
                .unwrap_or_else(|_| decode_probing(row, idx, type_name))
        }
        "BINARY" | "VARBINARY" | "TINYBLOB" | "BLOB" | "MEDIUMBLOB" | "LONGBLOB" => row
            .try_get::<Vec<u8>, _>(idx)
            .map(Value::Bytes)
            .unwrap_or_else(|_| decode_probing(row, idx, type_name)),
        "DATE" => row
            .try_get::<chrono::NaiveDate, _>(idx)
            .map(Value::Date)
            .unwrap_or_else(|_| decode_probing(row, idx, type_name)),
        "TIME" => row
            .try_get::<chrono::NaiveTime, _>(idx)
            .map(Value::Time)
            .unwrap_or_else(|_| decode_probing(row, idx, type_name)),
        "DATETIME" => row
            .try_get::<chrono::NaiveDateTime, _>(idx)
            .map(Value::DateTime)
            .unwrap_or_else(|_| decode_probing(row, idx, type_name)),
        "TIMESTAMP" => row
            .try_get::<chrono::DateTime<chrono::Utc>, _>(idx)
            .map(Value::DateTimeTz)
            .unwrap_or_else(|_| decode_probing(row, idx, type_name)),
        "JSON" => row
            .try_get::<serde_json::Value, _>(idx)
            .map(Value::Json)
            .unwrap_or_else(|_| decode_probing(row, idx, type_name)),
        _ => decode_probing(row, idx, type_name),
    }
}

/// Last resort: probe the common representations.
fn decode_probing(row: &MySqlRow, idx: usize, type_name: &str) -> Value {
    if let Ok(v) = row.try_get::<i64, _>(idx) {
        return Value::Int64(v);
    }
    if let Ok(v) = row.try_get::<u64, _>(idx) {
        return Value::UInt64(v);
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
