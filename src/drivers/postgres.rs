//! PostgreSQL driver.
//!
//! Wraps a single SQLx `PgConnection`. Statement templates use `?`
//! placeholders crate-wide; this driver rewrites them to PostgreSQL's
//! `$1..$n` form before preparing. Stored routines are set-returning
//! functions, invoked as `SELECT * FROM name($1, ...)`.

use async_trait::async_trait;
use sqlx::postgres::{PgArguments, PgConnectOptions, PgConnection, PgRow, PgSslMode, Postgres};
use sqlx::query::Query;
use sqlx::{Column, Connection as _, Executor, Row, TypeInfo, ValueRef};

use super::{CallPayload, Driver, FetchPayload};
use crate::config::{ConnectionConfig, ConnectionParams, DatabaseType, SslMode};
use crate::error::{Error, Result};
use crate::row::ColumnMeta;
use crate::statement::{self, Param, ParamType};
use crate::value::Value;

pub(crate) struct PostgresDriver {
    conn: Option<PgConnection>,
}

impl PostgresDriver {
    /// Open a PostgreSQL connection from the configuration.
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
                "PostgreSQL requires server connection parameters",
            ));
        };

        let options = PgConnectOptions::new()
            .host(host)
            .port(*port)
            .database(database)
            .username(username)
            .password(password)
            .ssl_mode(map_ssl_mode(*ssl_mode));

        let conn = PgConnection::connect_with(&options).await.map_err(|e| {
            Error::connection_caused(
                format!("failed to connect to {}", config.display_target()),
                e,
            )
        })?;
        tracing::debug!(db = %config.display_target(), "postgres connection opened");

        Ok(Self { conn: Some(conn) })
    }

    fn conn(&mut self) -> Result<&mut PgConnection> {
        self.conn
            .as_mut()
            .ok_or_else(|| Error::connection("connection is closed"))
    }
}

fn map_ssl_mode(mode: SslMode) -> PgSslMode {
    match mode {
        SslMode::Disable => PgSslMode::Disable,
        SslMode::Prefer => PgSslMode::Prefer,
        SslMode::Require => PgSslMode::Require,
        SslMode::VerifyCa => PgSslMode::VerifyCa,
        SslMode::VerifyFull => PgSslMode::VerifyFull,
    }
}

#[async_trait]
impl Driver for PostgresDriver {
    fn database_type(&self) -> DatabaseType {
        DatabaseType::PostgreSQL
    }

    fn is_open(&self) -> bool {
        self.conn.is_some()
    }

    async fn fetch(&mut self, sql: &str, params: &[Param]) -> Result<FetchPayload> {
        let sql = statement::number_placeholders(sql);
        let conn = self.conn()?;

        let describe = (&mut *conn)
            .describe(&sql)
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

        let mut query = sqlx::query(&sql);
        for param in params {
            query = bind_param(query, param)?;
        }
        let fetched = query
            .fetch_all(&mut *conn)
            .await
            .map_err(|e| Error::statement_caused("query failed", e))?;
        tracing::debug!(rows = fetched.len(), "postgres query fetched");

        let rows = fetched.iter().map(|row| decode_row(row, &columns)).collect();
        Ok(FetchPayload { columns, rows })
    }

    async fn execute(&mut self, sql: &str, params: &[Param]) -> Result<u64> {
        let sql = statement::number_placeholders(sql);
        let conn = self.conn()?;

        let mut query = sqlx::query(&sql);
        for param in params {
            query = bind_param(query, param)?;
        }
        let result = query
            .execute(&mut *conn)
            .await
            .map_err(|e| Error::statement_caused("statement failed", e))?;
        tracing::debug!(rows_affected = result.rows_affected(), "postgres statement executed");

        Ok(result.rows_affected())
    }

    async fn call(&mut self, routine: &str, params: &[Param]) -> Result<CallPayload> {
        let placeholders: Vec<String> = (1..=params.len()).map(|n| format!("${n}")).collect();
        let sql = format!("SELECT * FROM {routine}({})", placeholders.join(", "));
        tracing::debug!(routine, "calling stored routine");

        let conn = self.conn()?;
        let mut query = sqlx::query(&sql);
        for param in params {
            query = bind_param(query, param)?;
        }
        let fetched = query
            .fetch_all(&mut *conn)
            .await
            .map_err(|e| Error::statement_caused(format!("call to {routine} failed"), e))?;

        if fetched.is_empty() {
            return Ok(CallPayload::Affected(0));
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
            tracing::debug!("postgres connection closed");
        }
        Ok(())
    }
}

/// Bind one typed parameter. PostgreSQL nulls are typed, so NULL binds go
/// through the slot's declared type.
fn bind_param<'q>(
    query: Query<'q, Postgres, PgArguments>,
    param: &Param,
) -> Result<Query<'q, Postgres, PgArguments>> {
    Ok(match &param.value {
        Value::Null => match param.ty {
            ParamType::Bool => query.bind(Option::<bool>::None),
            ParamType::Int => query.bind(Option::<i32>::None),
            ParamType::BigInt => query.bind(Option::<i64>::None),
            ParamType::Double => query.bind(Option::<f64>::None),
            ParamType::Text => query.bind(Option::<String>::None),
            ParamType::Bytes => query.bind(Option::<Vec<u8>>::None),
            ParamType::Date => query.bind(Option::<chrono::NaiveDate>::None),
            ParamType::Time => query.bind(Option::<chrono::NaiveTime>::None),
            ParamType::DateTime => query.bind(Option::<chrono::NaiveDateTime>::None),
            ParamType::Decimal => query.bind(Option::<rust_decimal::Decimal>::None),
            ParamType::Uuid => query.bind(Option::<uuid::Uuid>::None),
            ParamType::Json => query.bind(Option::<serde_json::Value>::None),
        },
        Value::Bool(v) => query.bind(*v),
        Value::Int32(v) => query.bind(*v),
        Value::Int64(v) => query.bind(*v),
        Value::UInt64(v) => {
            let v = i64::try_from(*v).map_err(|_| {
                Error::binding(format!("unsigned value {v} is out of range for PostgreSQL"))
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
        Value::Decimal(v) => query.bind(*v),
        Value::Uuid(v) => query.bind(*v),
        Value::Json(v) => query.bind(v.clone()),
        Value::Other { display, .. } => query.bind(display.clone()),
    })
}

/// Build column metadata from a fetched row (routine-call results).
fn columns_from_row(row: &PgRow) -> Vec<ColumnMeta> {
    row.columns()
        .iter()
        .map(|col| ColumnMeta::new(col.name(), col.type_info().name(), col.ordinal()))
        .collect()
}

/// Decode one row using the declared column types.
fn decode_row(row: &PgRow, columns: &[ColumnMeta]) -> Vec<Value> {
    columns
        .iter()
        .enumerate()
        .map(|(idx, col)| decode_value(row, idx, &col.type_name))
        .collect()
}

fn decode_value(row: &PgRow, idx: usize, type_name: &str) -> Value {
    match row.try_get_raw(idx) {
        Ok(raw) if raw.is_null() => return Value::Null,
        Err(_) => return Value::Null,
        _ => {}
    }

    match type_name.to_uppercase().as_str() {
        "BOOL" => row
            .try_get::<bool, _>(idx)
            .map(Value::Bool)
            .unwrap_or_else(|_| decode_probing(row, idx, type_name)),
        "INT2" => row
            .try_get::<i16, _>(idx)
            .map(|v| Value::Int32(i32::from(v)))
            .unwrap_or_else(|_| decode_probing(row, idx, type_name)),
        "INT4" => row
            .try_get::<i32, _>(idx)
            .map(Value::Int32)
            .unwrap_or_else(|_| decode_probing(row, idx, type_name)),
        "INT8" => row
            .try_get::<i64, _>(idx)
            .map(Value::Int64)
            .unwrap_or_else(|_| decode_probing(row, idx, type_name)),
        "FLOAT4" => row
            .try_get::<f32, _>(idx)
            .map(|v| Value::Float64(f64::from(v)))
            .unwrap_or_else(|_| decode_probing(row, idx, type_name)),
        "FLOAT8" => row
            .try_get::<f64, _>(idx)
            .map(Value::Float64)
            .unwrap_or_else(|_| decode_probing(row, idx, type_name)),
        "NUMERIC" => row
            .try_get::<rust_decimal::Decimal, _>(idx)
            .map(Value::Decimal)
            .unwrap_or_else(|_| decode_probing(row, idx, type_name)),
        "TEXT" | "VARCHAR" | "BPCHAR" | "CHAR" | "NAME" | "CITEXT" => row
            .try_get::<String, _>(idx)
            .map(Value::Text)
            .unwrap_or_else(|_| decode_probing(row, idx, type_name)),
        "BYTEA" => row
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
        "TIMESTAMP" => row
            .try_get::<chrono::NaiveDateTime, _>(idx)
            .map(Value::DateTime)
            .unwrap_or_else(|_| decode_probing(row, idx, type_name)),
        "TIMESTAMPTZ" => row
            .try_get::<chrono::DateTime<chrono::Utc>, _>(idx)
            .map(Value::DateTimeTz)
            .unwrap_or_else(|_| decode_probing(row, idx, type_name)),
        "UUID" => row
            .try_get::<uuid::Uuid, _>(idx)
            .map(Value::Uuid)
            .unwrap_or_else(|_| decode_probing(row, idx, type_name)),
        "JSON" | "JSONB" => row
            .try_get::<serde_json::Value, _>(idx)
            .map(Value::Json)
            .unwrap_or_else(|_| decode_probing(row, idx, type_name)),
        _ => decode_probing(row, idx, type_name),
    }
}

/// Last resort: probe the common representations.
fn decode_probing(row: &PgRow, idx: usize, type_name: &str) -> Value {
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
