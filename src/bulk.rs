//! CSV bulk loading.
//!
//! A [`CsvLoader`] reads a delimited file once, front to back, and inserts
//! each record into a target table through a parameterized statement. The
//! first line is treated as a header and skipped; every following record
//! maps positionally onto the loader's declared columns.

use std::path::{Path, PathBuf};

use crate::connection::Connection;
use crate::error::{Error, Result};
use crate::statement::{self, ParamType, Statement};
use crate::value::Value;

/// Loads a CSV file into a table, one insert per record.
#[derive(Debug, Clone)]
pub struct CsvLoader {
    table: String,
    columns: Vec<(String, ParamType)>,
    path: PathBuf,
}

impl CsvLoader {
    /// Create a loader for `table` reading from `path`.
    pub fn new(table: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            table: table.into(),
            columns: Vec::new(),
            path: path.into(),
        }
    }

    /// Declare the next positional column and the type its fields convert to.
    pub fn column(mut self, name: impl Into<String>, ty: ParamType) -> Self {
        self.columns.push((name.into(), ty));
        self
    }

    /// The file this loader reads from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the file and insert every data record; returns the number of
    /// rows inserted.
    ///
    /// The file is opened once and read in a single pass. Field conversion
    /// failures carry the record and column that failed; records inserted
    /// before a failure stay inserted.
    pub async fn load(&self, conn: &mut Connection) -> Result<u64> {
        if self.columns.is_empty() {
            return Err(Error::bulk_load("no columns declared"));
        }
        statement::validate_identifier(&self.table)?;
        for (name, _) in &self.columns {
            statement::validate_identifier(name)?;
        }

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_path(&self.path)
            .map_err(|e| {
                Error::bulk_load_caused(format!("failed to open {}", self.path.display()), e)
            })?;

        let names: Vec<&str> = self.columns.iter().map(|(n, _)| n.as_str()).collect();
        let placeholders = vec!["?"; self.columns.len()].join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.table,
            names.join(", "),
            placeholders
        );
        tracing::debug!(table = %self.table, path = %self.path.display(), "bulk load started");

        let mut inserted = 0u64;
        for (line, record) in reader.records().enumerate() {
            let record = record.map_err(|e| {
                Error::bulk_load_caused(format!("failed to read record {}", line + 1), e)
            })?;
            if record.len() != self.columns.len() {
                return Err(Error::bulk_load(format!(
                    "record {} has {} field(s), expected {}",
                    line + 1,
                    record.len(),
                    self.columns.len()
                )));
            }

            let mut stmt = Statement::new(sql.clone());
            for (field, (name, ty)) in record.iter().zip(&self.columns) {
                let value = convert_field(field, *ty).map_err(|e| {
                    Error::binding(format!("record {}, column {name}: {e}", line + 1))
                })?;
                stmt = stmt.bind(*ty, value);
            }

            inserted += conn.runner().execute_change(&stmt).await?;
        }
        tracing::debug!(table = %self.table, rows = inserted, "bulk load finished");

        Ok(inserted)
    }
}

/// Convert one CSV field to a typed value. Empty fields load as NULL.
fn convert_field(field: &str, ty: ParamType) -> Result<Value, String> {
    if field.is_empty() {
        return Ok(Value::Null);
    }
    match ty {
        ParamType::Bool => match field {
            "true" | "TRUE" | "1" => Ok(Value::Bool(true)),
            "false" | "FALSE" | "0" => Ok(Value::Bool(false)),
            _ => Err(format!("{field:?} is not a bool")),
        },
        ParamType::Int => field
            .parse::<i32>()
            .map(Value::Int32)
            .map_err(|_| format!("{field:?} is not an int")),
        ParamType::BigInt => field
            .parse::<i64>()
            .map(Value::Int64)
            .map_err(|_| format!("{field:?} is not a bigint")),
        ParamType::Double => field
            .parse::<f64>()
            .map(Value::Float64)
            .map_err(|_| format!("{field:?} is not a double")),
        ParamType::Text => Ok(Value::Text(field.to_string())),
        ParamType::Bytes => hex::decode(field)
            .map(Value::Bytes)
            .map_err(|_| format!("{field:?} is not hex-encoded bytes")),
        ParamType::Date => field
            .parse::<chrono::NaiveDate>()
            .map(Value::Date)
            .map_err(|_| format!("{field:?} is not a date")),
        ParamType::Time => field
            .parse::<chrono::NaiveTime>()
            .map(Value::Time)
            .map_err(|_| format!("{field:?} is not a time")),
        ParamType::DateTime => field
            .parse::<chrono::NaiveDateTime>()
            .map(Value::DateTime)
            .map_err(|_| format!("{field:?} is not a datetime")),
        ParamType::Decimal => field
            .parse::<rust_decimal::Decimal>()
            .map(Value::Decimal)
            .map_err(|_| format!("{field:?} is not a decimal")),
        ParamType::Uuid => field
            .parse::<uuid::Uuid>()
            .map(Value::Uuid)
            .map_err(|_| format!("{field:?} is not a uuid")),
        ParamType::Json => serde_json::from_str(field)
            .map(Value::Json)
            .map_err(|_| format!("{field:?} is not valid json")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convert_empty_field_is_null() {
        assert_eq!(convert_field("", ParamType::Int), Ok(Value::Null));
        assert_eq!(convert_field("", ParamType::Text), Ok(Value::Null));
    }

    #[test]
    fn test_convert_typed_fields() {
        assert_eq!(convert_field("42", ParamType::Int), Ok(Value::Int32(42)));
        assert_eq!(
            convert_field("9997771723", ParamType::BigInt),
            Ok(Value::Int64(9_997_771_723))
        );
        assert_eq!(
            convert_field("Alice", ParamType::Text),
            Ok(Value::Text("Alice".to_string()))
        );
        assert_eq!(
            convert_field("2024-06-01", ParamType::Date),
            Ok(Value::Date(
                chrono::NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
            ))
        );
    }

    #[test]
    fn test_convert_rejects_garbage() {
        assert!(convert_field("twelve", ParamType::Int).is_err());
        assert!(convert_field("1.5", ParamType::BigInt).is_err());
        assert!(convert_field("maybe", ParamType::Bool).is_err());
    }
}
