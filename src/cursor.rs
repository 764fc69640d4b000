//! Result cursors.
//!
//! A [`RowCursor`] is a stateful handle over one query's result rows. Its
//! position moves through `before first → row → after last`, plus a
//! separate insert-row pseudo-position on updatable cursors.
//!
//! Capabilities are negotiated at query time through [`CursorSettings`]:
//! plain cursors only iterate forward; scrollable cursors also reposition
//! freely; updatable cursors additionally stage and commit in-place row
//! changes against their [`UpdateTarget`]. Using a capability the cursor was
//! not opened with fails with a cursor error.
//!
//! Results are materialized when the query executes, so repositioning never
//! re-executes the statement. The cursor borrows its connection mutably for
//! its whole lifetime — the borrow checker guarantees it is released before
//! (or together with) the connection.

use std::sync::Arc;

use crate::connection::Connection;
use crate::drivers::FetchPayload;
use crate::error::{Error, Result};
use crate::row::{self, ColumnMeta, Record};
use crate::statement::{self, Param, ParamType, Statement};
use crate::value::Value;

/// Identifies the table and key column an updatable cursor commits to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateTarget {
    /// Table the cursor's rows originate from.
    pub table: String,
    /// Column used to address individual rows; must be in the projection.
    pub key_column: String,
}

impl UpdateTarget {
    /// Create an update target.
    pub fn new(table: impl Into<String>, key_column: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            key_column: key_column.into(),
        }
    }
}

/// Capabilities requested for a cursor, fixed at query time.
#[derive(Debug, Clone, Default)]
pub struct CursorSettings {
    scrollable: bool,
    update_target: Option<UpdateTarget>,
}

impl CursorSettings {
    /// Forward-only iteration, no updates. The default.
    pub fn forward_only() -> Self {
        Self::default()
    }

    /// Allow `first`/`last`/`absolute`/`before_first` repositioning.
    pub fn scrollable() -> Self {
        Self {
            scrollable: true,
            update_target: None,
        }
    }

    /// Allow in-place row updates and inserts against the given target.
    pub fn updatable(mut self, target: UpdateTarget) -> Self {
        self.update_target = Some(target);
        self
    }

    /// Whether scrolling was requested.
    pub fn is_scrollable(&self) -> bool {
        self.scrollable
    }

    pub(crate) fn update_target(&self) -> Option<&UpdateTarget> {
        self.update_target.as_ref()
    }
}

/// Cursor position over the materialized rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Position {
    BeforeFirst,
    Row(usize),
    AfterLast,
    InsertRow,
}

/// A stateful handle over one query's result rows.
pub struct RowCursor<'c> {
    conn: &'c mut Connection,
    columns: Arc<[ColumnMeta]>,
    rows: Vec<Record>,
    settings: CursorSettings,
    pos: Position,
    /// Position to restore when leaving the insert row.
    resume: Position,
    /// Staged cell values for the current row or the insert buffer.
    staged: Vec<Option<Value>>,
}

impl std::fmt::Debug for RowCursor<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RowCursor")
            .field("rows", &self.rows.len())
            .field("pos", &self.pos)
            .field("settings", &self.settings)
            .finish()
    }
}

impl<'c> RowCursor<'c> {
    pub(crate) fn new(
        conn: &'c mut Connection,
        payload: FetchPayload,
        settings: CursorSettings,
    ) -> Self {
        let FetchPayload { mut columns, rows } = payload;
        if let Some(target) = settings.update_target() {
            for col in &mut columns {
                if col.table.is_none() {
                    col.table = Some(target.table.clone());
                }
            }
        }
        row::widen_display_widths(&mut columns, &rows);

        let columns: Arc<[ColumnMeta]> = columns.into();
        let records = rows
            .into_iter()
            .map(|values| Record::new(Arc::clone(&columns), values))
            .collect();
        let width = columns.len();

        Self {
            conn,
            columns,
            rows: records,
            settings,
            pos: Position::BeforeFirst,
            resume: Position::BeforeFirst,
            staged: vec![None; width],
        }
    }

    /// Column metadata in projection order. Available at any position.
    pub fn column_metadata(&self) -> &[ColumnMeta] {
        &self.columns
    }

    /// Number of rows in the materialized result.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Whether this cursor was opened scrollable.
    pub fn is_scrollable(&self) -> bool {
        self.settings.scrollable
    }

    /// Whether this cursor was opened updatable.
    pub fn is_updatable(&self) -> bool {
        self.settings.update_target.is_some()
    }

    // ------------------------------------------------------------------
    // Navigation
    // ------------------------------------------------------------------

    /// Advance one row. Returns `false` once the cursor has moved past the
    /// last row; further calls keep returning `false`.
    pub fn next(&mut self) -> Result<bool> {
        self.require_not_inserting()?;
        self.discard_stage();
        let (pos, on_row) = match self.pos {
            Position::BeforeFirst if self.rows.is_empty() => (Position::AfterLast, false),
            Position::BeforeFirst => (Position::Row(0), true),
            Position::Row(i) if i + 1 < self.rows.len() => (Position::Row(i + 1), true),
            Position::Row(_) | Position::AfterLast => (Position::AfterLast, false),
            Position::InsertRow => unreachable!("checked above"),
        };
        self.pos = pos;
        Ok(on_row)
    }

    /// Move to the first row. Returns `false` on an empty result.
    pub fn first(&mut self) -> Result<bool> {
        self.absolute(1)
    }

    /// Move to the last row. Returns `false` on an empty result.
    pub fn last(&mut self) -> Result<bool> {
        self.absolute(-1)
    }

    /// Move to the given row: positive `n` counts from the first row
    /// (1-based), negative from the last (`-1` is the last row), and `0`
    /// positions before the first row.
    pub fn absolute(&mut self, n: i64) -> Result<bool> {
        self.require_scrollable()?;
        self.require_not_inserting()?;
        self.discard_stage();
        let (pos, on_row) = absolute_position(n, self.rows.len());
        self.pos = pos;
        Ok(on_row)
    }

    /// Move before the first row, so the next `next()` re-reads from the
    /// start.
    pub fn before_first(&mut self) -> Result<()> {
        self.require_scrollable()?;
        self.require_not_inserting()?;
        self.discard_stage();
        self.pos = Position::BeforeFirst;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Row access
    // ------------------------------------------------------------------

    /// The record the cursor is positioned on.
    pub fn current(&self) -> Result<&Record> {
        match self.pos {
            Position::Row(i) => Ok(&self.rows[i]),
            _ => Err(Error::cursor("no current row")),
        }
    }

    /// Get a value from the current row by column name (first match wins).
    pub fn get(&self, name: &str) -> Result<&Value> {
        self.current()?
            .get(name)
            .ok_or_else(|| Error::cursor(format!("no column named {name:?}")))
    }

    /// Get a value from the current row by projection position (0-indexed).
    pub fn get_index(&self, index: usize) -> Result<&Value> {
        self.current()?
            .get_index(index)
            .ok_or_else(|| Error::cursor(format!("no column at index {index}")))
    }

    // ------------------------------------------------------------------
    // Updates
    // ------------------------------------------------------------------

    /// Stage a new value for a column of the current row (or of the insert
    /// buffer when positioned on the insert row). Nothing reaches the
    /// database until [`update_row`](Self::update_row) or
    /// [`insert_row`](Self::insert_row) commits the stage.
    pub fn update_column(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        self.require_updatable()?;
        if !matches!(self.pos, Position::Row(_) | Position::InsertRow) {
            return Err(Error::cursor("no current row"));
        }
        let idx = self
            .columns
            .iter()
            .position(|c| c.name == name)
            .ok_or_else(|| Error::cursor(format!("no column named {name:?}")))?;
        self.staged[idx] = Some(value.into());
        Ok(())
    }

    /// Commit staged changes to the current row with a parameterized UPDATE
    /// keyed on the update target's key column.
    ///
    /// The stage is discarded whether or not the commit succeeds; a failed
    /// commit never leaves changes half-staged.
    pub async fn update_row(&mut self) -> Result<()> {
        let target = self.require_updatable()?.clone();
        let row_idx = match self.pos {
            Position::Row(i) => i,
            Position::InsertRow => {
                self.discard_stage();
                return Err(Error::cursor(
                    "positioned on the insert row; use insert_row",
                ));
            }
            _ => {
                self.discard_stage();
                return Err(Error::cursor("no current row"));
            }
        };

        let staged = self.take_stage();
        let changes: Vec<(usize, Value)> = staged
            .into_iter()
            .enumerate()
            .filter_map(|(idx, v)| v.map(|v| (idx, v)))
            .collect();
        if changes.is_empty() {
            tracing::debug!("update_row with empty stage; nothing to do");
            return Ok(());
        }

        let key_idx = self
            .columns
            .iter()
            .position(|c| c.name == target.key_column)
            .ok_or_else(|| {
                Error::cursor(format!(
                    "key column {:?} is not in the projection",
                    target.key_column
                ))
            })?;
        let key_value = self.rows[row_idx]
            .get_index(key_idx)
            .cloned()
            .unwrap_or(Value::Null);

        let mut assignments = Vec::with_capacity(changes.len());
        for (idx, _) in &changes {
            let name = &self.columns[*idx].name;
            statement::validate_identifier(name)?;
            assignments.push(format!("{name} = ?"));
        }
        let sql = format!(
            "UPDATE {} SET {} WHERE {} = ?",
            target.table,
            assignments.join(", "),
            target.key_column
        );

        let mut stmt = Statement::new(sql);
        for (idx, value) in &changes {
            stmt = stmt.bind_param(Param {
                ty: slot_type_for(value, &self.columns[*idx]),
                value: value.clone(),
            });
        }
        stmt = stmt.bind_param(Param {
            ty: slot_type_for(&key_value, &self.columns[key_idx]),
            value: key_value,
        });

        self.conn.runner().execute_change(&stmt).await?;

        // Reflect the committed values in the materialized row.
        for (idx, value) in changes {
            self.rows[row_idx].set_value(idx, value);
        }
        Ok(())
    }

    /// Move to the insert-row pseudo-position and start a fresh insert
    /// buffer. The previous position is remembered and restored by
    /// [`insert_row`](Self::insert_row) or
    /// [`move_to_current_row`](Self::move_to_current_row).
    pub fn move_to_insert_row(&mut self) -> Result<()> {
        self.require_updatable()?;
        self.discard_stage();
        if self.pos != Position::InsertRow {
            self.resume = self.pos;
        }
        self.pos = Position::InsertRow;
        Ok(())
    }

    /// Leave the insert row, discarding the insert buffer, and restore the
    /// remembered position.
    pub fn move_to_current_row(&mut self) -> Result<()> {
        self.require_updatable()?;
        if self.pos == Position::InsertRow {
            self.discard_stage();
            self.pos = self.resume;
        }
        Ok(())
    }

    /// Commit the insert buffer as a new row with a parameterized INSERT.
    ///
    /// Columns never staged are left to the table's defaults. The buffer is
    /// discarded whether or not the commit succeeds. The materialized result
    /// does not grow: like a scroll-insensitive driver cursor, the new row
    /// becomes visible on the next query.
    pub async fn insert_row(&mut self) -> Result<()> {
        let target = self.require_updatable()?.clone();
        if self.pos != Position::InsertRow {
            self.discard_stage();
            return Err(Error::cursor("not positioned on the insert row"));
        }

        let staged = self.take_stage();
        let changes: Vec<(usize, Value)> = staged
            .into_iter()
            .enumerate()
            .filter_map(|(idx, v)| v.map(|v| (idx, v)))
            .collect();
        if changes.is_empty() {
            return Err(Error::cursor("insert buffer is empty"));
        }

        let mut names = Vec::with_capacity(changes.len());
        for (idx, _) in &changes {
            let name = self.columns[*idx].name.as_str();
            statement::validate_identifier(name)?;
            names.push(name);
        }
        let placeholders = vec!["?"; changes.len()].join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            target.table,
            names.join(", "),
            placeholders
        );

        let mut stmt = Statement::new(sql);
        for (idx, value) in &changes {
            stmt = stmt.bind_param(Param {
                ty: slot_type_for(value, &self.columns[*idx]),
                value: value.clone(),
            });
        }

        self.conn.runner().execute_change(&stmt).await?;
        self.pos = self.resume;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn require_scrollable(&self) -> Result<()> {
        if self.settings.scrollable {
            Ok(())
        } else {
            Err(Error::cursor("cursor is forward-only; scrolling was not requested at query time"))
        }
    }

    fn require_updatable(&self) -> Result<&UpdateTarget> {
        self.settings
            .update_target
            .as_ref()
            .ok_or_else(|| Error::cursor("cursor is not updatable; no update target was set at query time"))
    }

    fn require_not_inserting(&self) -> Result<()> {
        if self.pos == Position::InsertRow {
            Err(Error::cursor(
                "positioned on the insert row; call move_to_current_row first",
            ))
        } else {
            Ok(())
        }
    }

    fn discard_stage(&mut self) {
        self.staged.fill(None);
    }

    fn take_stage(&mut self) -> Vec<Option<Value>> {
        std::mem::replace(&mut self.staged, vec![None; self.columns.len()])
    }
}

/// Map a 1-based/negative absolute index onto a position.
fn absolute_position(n: i64, len: usize) -> (Position, bool) {
    if n == 0 {
        return (Position::BeforeFirst, false);
    }
    let len = len as i64;
    let idx = if n > 0 { n - 1 } else { len + n };
    if (0..len).contains(&idx) {
        (Position::Row(idx as usize), true)
    } else if n > 0 {
        (Position::AfterLast, false)
    } else {
        (Position::BeforeFirst, false)
    }
}

/// Declared slot type for a staged value, falling back to the column's
/// declared type name when the value is NULL.
fn slot_type_for(value: &Value, column: &ColumnMeta) -> ParamType {
    match value {
        Value::Bool(_) => ParamType::Bool,
        Value::Int32(_) => ParamType::Int,
        Value::Int64(_) | Value::UInt64(_) => ParamType::BigInt,
        Value::Float64(_) => ParamType::Double,
        Value::Text(_) => ParamType::Text,
        Value::Bytes(_) => ParamType::Bytes,
        Value::Date(_) => ParamType::Date,
        Value::Time(_) => ParamType::Time,
        Value::DateTime(_) | Value::DateTimeTz(_) => ParamType::DateTime,
        Value::Decimal(_) => ParamType::Decimal,
        Value::Uuid(_) => ParamType::Uuid,
        Value::Json(_) => ParamType::Json,
        Value::Null | Value::Other { .. } => slot_type_for_column(&column.type_name),
    }
}

fn slot_type_for_column(type_name: &str) -> ParamType {
    let upper = type_name.to_uppercase();
    if upper.contains("BOOL") {
        ParamType::Bool
    } else if upper.contains("BIGINT") || upper == "INT8" {
        ParamType::BigInt
    } else if upper.contains("INT") || upper == "YEAR" {
        ParamType::Int
    } else if upper.contains("FLOAT") || upper.contains("DOUBLE") || upper.contains("REAL") {
        ParamType::Double
    } else if upper.contains("DECIMAL") || upper.contains("NUMERIC") {
        ParamType::Decimal
    } else if upper.contains("TIMESTAMP") || upper.contains("DATETIME") {
        ParamType::DateTime
    } else if upper.contains("DATE") {
        ParamType::Date
    } else if upper.contains("TIME") {
        ParamType::Time
    } else if upper.contains("BLOB") || upper.contains("BINARY") || upper == "BYTEA" {
        ParamType::Bytes
    } else if upper.contains("UUID") {
        ParamType::Uuid
    } else if upper.contains("JSON") {
        ParamType::Json
    } else {
        ParamType::Text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absolute_position_mapping() {
        // 1-based from the front
        assert_eq!(absolute_position(1, 3), (Position::Row(0), true));
        assert_eq!(absolute_position(3, 3), (Position::Row(2), true));
        assert_eq!(absolute_position(4, 3), (Position::AfterLast, false));

        // negative counts from the end
        assert_eq!(absolute_position(-1, 3), (Position::Row(2), true));
        assert_eq!(absolute_position(-3, 3), (Position::Row(0), true));
        assert_eq!(absolute_position(-4, 3), (Position::BeforeFirst, false));

        // zero positions before the first row
        assert_eq!(absolute_position(0, 3), (Position::BeforeFirst, false));

        // empty result
        assert_eq!(absolute_position(1, 0), (Position::AfterLast, false));
        assert_eq!(absolute_position(-1, 0), (Position::BeforeFirst, false));
    }

    #[test]
    fn test_slot_type_for_column_names() {
        assert_eq!(slot_type_for_column("INTEGER"), ParamType::Int);
        assert_eq!(slot_type_for_column("BIGINT"), ParamType::BigInt);
        assert_eq!(slot_type_for_column("INT8"), ParamType::BigInt);
        assert_eq!(slot_type_for_column("VARCHAR"), ParamType::Text);
        assert_eq!(slot_type_for_column("TIMESTAMPTZ"), ParamType::DateTime);
        assert_eq!(slot_type_for_column("DATE"), ParamType::Date);
        assert_eq!(slot_type_for_column("TIME"), ParamType::Time);
        assert_eq!(slot_type_for_column("NUMERIC"), ParamType::Decimal);
        assert_eq!(slot_type_for_column("BYTEA"), ParamType::Bytes);
        assert_eq!(slot_type_for_column("whatever"), ParamType::Text);
    }

    #[test]
    fn test_slot_type_prefers_value_variant() {
        let col = ColumnMeta::new("age", "INTEGER", 0);
        assert_eq!(slot_type_for(&Value::Int64(1), &col), ParamType::BigInt);
        assert_eq!(slot_type_for(&Value::Text("x".into()), &col), ParamType::Text);
        // NULL falls back to the declared column type
        assert_eq!(slot_type_for(&Value::Null, &col), ParamType::Int);
    }
}
