//! Backend drivers.
//!
//! Each driver wraps one SQLx connection and implements the `Driver` trait:
//! connect, execute with bound parameters, fetch with column metadata, call
//! a stored routine, and close. The factory picks the driver from the
//! configuration's database type.
//!
//! Drivers hold exactly one connection — never a pool — so a handle owns at
//! most one transport.

use async_trait::async_trait;

use crate::config::{ConnectionConfig, DatabaseType};
use crate::error::Result;
use crate::row::ColumnMeta;
use crate::statement::Param;

pub(crate) mod mysql;
pub(crate) mod postgres;
pub(crate) mod sqlite;

/// The materialized output of one row-producing execution: column metadata
/// in projection order plus decoded values per row.
pub(crate) struct FetchPayload {
    pub columns: Vec<ColumnMeta>,
    pub rows: Vec<Vec<crate::value::Value>>,
}

/// What a stored-routine call produced.
pub(crate) enum CallPayload {
    /// The routine returned a result set.
    Rows(FetchPayload),
    /// The routine returned no rows; carries the affected-row count.
    Affected(u64),
}

/// One live backend connection.
///
/// All operations take `&mut self`: a driver is exclusively owned by the
/// handle that created it and is never shared across threads.
#[async_trait]
pub(crate) trait Driver: Send {
    /// The backend this driver talks to.
    fn database_type(&self) -> DatabaseType;

    /// Whether the underlying transport is still open.
    fn is_open(&self) -> bool;

    /// Execute a row-producing statement with bound parameters and
    /// materialize the result.
    async fn fetch(&mut self, sql: &str, params: &[Param]) -> Result<FetchPayload>;

    /// Execute a modifying statement with bound parameters; returns the
    /// affected-row count.
    async fn execute(&mut self, sql: &str, params: &[Param]) -> Result<u64>;

    /// Invoke a stored routine by (already validated) name.
    async fn call(&mut self, routine: &str, params: &[Param]) -> Result<CallPayload>;

    /// Release the transport. Idempotent: closing a closed driver is a no-op.
    async fn close(&mut self) -> Result<()>;
}

/// Open the driver matching the configuration's database type.
pub(crate) async fn connect(config: &ConnectionConfig) -> Result<Box<dyn Driver>> {
    match config.database_type {
        DatabaseType::MySQL => Ok(Box::new(mysql::MySqlDriver::connect(config).await?)),
        DatabaseType::PostgreSQL => Ok(Box::new(postgres::PostgresDriver::connect(config).await?)),
        DatabaseType::SQLite => Ok(Box::new(sqlite::SqliteDriver::connect(config).await?)),
    }
}
