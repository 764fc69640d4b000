//! Result rows and column metadata.
//!
//! A query produces one immutable set of [`ColumnMeta`] per result shape and
//! a sequence of [`Record`]s sharing it. Column order always matches the
//! query's projection order; lookups by name resolve to the first matching
//! column, as conventional drivers do.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::value::Value;

/// Metadata for one column of a query result.
///
/// Produced once per query shape, immutable afterward. Fields a driver
/// cannot report stay `None`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnMeta {
    /// Column name in the projection.
    pub name: String,
    /// Column label (alias). Same as `name` when the projection has no alias.
    pub label: String,
    /// Backend-specific declared type name.
    pub type_name: String,
    /// Column position in the projection (0-indexed).
    pub ordinal: usize,
    /// Display width: the widest rendered value in the materialized result,
    /// at minimum the width of the column name.
    pub display_width: usize,
    /// Whether the column allows NULL, if the driver reports it.
    pub nullable: Option<bool>,
    /// Whether the column auto-increments, if the driver reports it.
    pub auto_increment: Option<bool>,
    /// Originating table name, if known.
    pub table: Option<String>,
}

impl ColumnMeta {
    /// Create column metadata with the fields every driver can supply.
    pub fn new(name: impl Into<String>, type_name: impl Into<String>, ordinal: usize) -> Self {
        let name = name.into();
        Self {
            display_width: name.len(),
            label: name.clone(),
            name,
            type_name: type_name.into(),
            ordinal,
            nullable: None,
            auto_increment: None,
            table: None,
        }
    }

    /// Set the nullability flag.
    pub fn with_nullable(mut self, nullable: bool) -> Self {
        self.nullable = Some(nullable);
        self
    }

    /// Set the originating table name.
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }
}

/// One record of a query result: an ordered mapping from column to value.
#[derive(Debug, Clone)]
pub struct Record {
    columns: Arc<[ColumnMeta]>,
    values: Vec<Value>,
}

impl Record {
    pub(crate) fn new(columns: Arc<[ColumnMeta]>, values: Vec<Value>) -> Self {
        debug_assert_eq!(columns.len(), values.len());
        Self { columns, values }
    }

    /// Number of columns in this record.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if this record has no columns.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The column metadata shared by every record of this result.
    pub fn columns(&self) -> &[ColumnMeta] {
        &self.columns
    }

    /// Get a value by column name. The first matching column wins when the
    /// projection repeats a name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c.name == name)
            .map(|idx| &self.values[idx])
    }

    /// Get a value by projection position (0-indexed).
    pub fn get_index(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Iterate over values in projection order.
    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.values.iter()
    }

    pub(crate) fn set_value(&mut self, index: usize, value: Value) {
        self.values[index] = value;
    }
}

impl<'a> IntoIterator for &'a Record {
    type Item = &'a Value;
    type IntoIter = std::slice::Iter<'a, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.iter()
    }
}

/// Widen each column's display width to cover the given rendered values.
pub(crate) fn widen_display_widths(columns: &mut [ColumnMeta], rows: &[Vec<Value>]) {
    for row in rows {
        for (col, value) in columns.iter_mut().zip(row.iter()) {
            let width = value.to_display_string().len();
            if width > col.display_width {
                col.display_width = width;
            }
        }
    }
}
