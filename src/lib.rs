//! Minimal record-oriented access to relational databases.
//!
//! The crate exposes a small, explicit surface over SQLite, MySQL, and
//! PostgreSQL:
//!
//! - [`Connection`]: one open session, created from a [`ConnectionConfig`]
//!   and closed explicitly (or on drop).
//! - [`Statement`]: a SQL template with `?` placeholders and typed parameter
//!   slots, validated before execution.
//! - [`StatementRunner`]: executes queries, change statements, and stored
//!   routine calls against a borrowed connection.
//! - [`RowCursor`]: a stateful handle over a query's rows; scrollable and
//!   updatable variants are opted into at query time with
//!   [`CursorSettings`].
//! - [`CsvLoader`]: single-pass CSV bulk insert into a table.
//!
//! ```no_run
//! use recordset::{Connection, ConnectionConfig, ParamType, Statement};
//!
//! # async fn demo() -> recordset::Result<()> {
//! let mut conn = Connection::open(ConnectionConfig::sqlite_in_memory()).await?;
//!
//! let stmt = Statement::new("SELECT student_id, name, age FROM students WHERE age > ?")
//!     .bind(ParamType::Int, 18);
//! let mut cursor = conn.runner().query(&stmt).await?;
//! while cursor.next()? {
//!     let name = cursor.get("name")?;
//!     let age = cursor.get("age")?;
//!     println!("{name} is {age}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod bulk;
pub mod config;
pub mod connection;
pub mod cursor;
pub mod error;
pub mod row;
pub mod runner;
pub mod statement;
pub mod value;

mod drivers;

pub use bulk::CsvLoader;
pub use config::{ConnectionConfig, ConnectionParams, DatabaseType, SslMode};
pub use connection::Connection;
pub use cursor::{CursorSettings, RowCursor, UpdateTarget};
pub use error::{Error, Result};
pub use row::{ColumnMeta, Record};
pub use runner::{CallOutcome, StatementRunner};
pub use statement::{Param, ParamType, Statement};
pub use value::Value;
