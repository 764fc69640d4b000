//! Statement execution.
//!
//! A [`StatementRunner`] borrows a connection and executes statements
//! against it in one of three modes: row-producing queries (returning a
//! [`RowCursor`]), modifying statements (returning the affected-row count),
//! and stored-routine calls (returning either, depending on what the routine
//! produces).
//!
//! Every execution validates the statement's bindings first: placeholder
//! count must equal slot count and each value must match its declared type.
//! Parameter values are bound out-of-band by the driver, never spliced into
//! the SQL text.

use crate::connection::Connection;
use crate::cursor::{CursorSettings, RowCursor};
use crate::drivers::CallPayload;
use crate::error::{Error, Result};
use crate::statement::{self, Param, Statement};

/// Executes statements against a borrowed connection.
#[derive(Debug)]
pub struct StatementRunner<'c> {
    conn: &'c mut Connection,
}

/// What a stored-routine invocation produced.
#[derive(Debug)]
pub enum CallOutcome<'c> {
    /// The routine returned a result set, exposed as a forward-only cursor.
    Rows(RowCursor<'c>),
    /// The routine returned no result set; carries the affected-row count.
    Affected(u64),
}

impl<'c> StatementRunner<'c> {
    pub(crate) fn new(conn: &'c mut Connection) -> Self {
        Self { conn }
    }

    /// Execute a row-producing statement and return a forward-only cursor
    /// positioned before the first row.
    pub async fn query(self, stmt: &Statement) -> Result<RowCursor<'c>> {
        self.query_with(stmt, CursorSettings::forward_only()).await
    }

    /// Execute a row-producing statement with explicit cursor capabilities.
    ///
    /// Scrolling and updating are opt-in here, at query time; they cost more
    /// than plain forward iteration and not every statement shape supports
    /// them, so a cursor only ever has the capabilities it was opened with.
    pub async fn query_with(
        self,
        stmt: &Statement,
        settings: CursorSettings,
    ) -> Result<RowCursor<'c>> {
        stmt.validate()?;
        if let Some(target) = settings.update_target() {
            statement::validate_identifier(&target.table)?;
            statement::validate_identifier(&target.key_column)?;
        }
        tracing::debug!(sql = stmt.sql(), "executing query");

        let StatementRunner { conn } = self;
        let payload = conn.driver_mut().fetch(stmt.sql(), stmt.params()).await?;
        Ok(RowCursor::new(conn, payload, settings))
    }

    /// Execute an insert, update, or delete; returns the number of rows
    /// actually changed.
    pub async fn execute_change(&mut self, stmt: &Statement) -> Result<u64> {
        stmt.validate()?;
        tracing::debug!(sql = stmt.sql(), "executing change");
        self.conn.driver_mut().execute(stmt.sql(), stmt.params()).await
    }

    /// Invoke a stored routine by name.
    ///
    /// The name must be a plain (optionally schema-qualified) identifier;
    /// parameters are bound out-of-band exactly as for statements. At most
    /// one result set is supported.
    pub async fn call_procedure(
        self,
        name: &str,
        params: Vec<Param>,
    ) -> Result<CallOutcome<'c>> {
        statement::validate_identifier(name)?;
        for (idx, param) in params.iter().enumerate() {
            if !param.ty.accepts(&param.value) {
                return Err(Error::binding(format!(
                    "routine parameter {} declared as {} but bound value is {}",
                    idx + 1,
                    param.ty.name(),
                    param.value.type_name()
                )));
            }
        }

        let StatementRunner { conn } = self;
        match conn.driver_mut().call(name, &params).await? {
            CallPayload::Rows(payload) => Ok(CallOutcome::Rows(RowCursor::new(
                conn,
                payload,
                CursorSettings::forward_only(),
            ))),
            CallPayload::Affected(n) => Ok(CallOutcome::Affected(n)),
        }
    }
}
