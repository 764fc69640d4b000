//! Backend-agnostic value representation.
//!
//! `Value` is the unified type carried in result rows and bound to statement
//! placeholders. It covers the types the supported backends (MySQL,
//! PostgreSQL, SQLite) commonly produce; anything a driver cannot map lands
//! in `Value::Other` with a display string.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single database value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum Value {
    /// NULL value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// 32-bit signed integer.
    Int32(i32),
    /// 64-bit signed integer.
    Int64(i64),
    /// 64-bit unsigned integer (MySQL unsigned columns).
    UInt64(u64),
    /// 64-bit floating point.
    Float64(f64),
    /// Text value.
    Text(String),
    /// Binary data.
    Bytes(Vec<u8>),
    /// Date without time.
    Date(NaiveDate),
    /// Time without date.
    Time(NaiveTime),
    /// Date and time without timezone.
    DateTime(NaiveDateTime),
    /// Date and time with timezone, stored as UTC.
    DateTimeTz(DateTime<Utc>),
    /// Arbitrary-precision decimal.
    Decimal(Decimal),
    /// UUID.
    Uuid(Uuid),
    /// JSON value (PostgreSQL json/jsonb, MySQL json).
    Json(serde_json::Value),
    /// Backend-specific type that doesn't map to a standard variant.
    Other {
        /// The backend-specific type name.
        type_name: String,
        /// String representation for display.
        display: String,
    },
}

impl Value {
    /// Check if this value is NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Short name of the carried type, for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int32(_) => "int32",
            Value::Int64(_) => "int64",
            Value::UInt64(_) => "uint64",
            Value::Float64(_) => "float64",
            Value::Text(_) => "text",
            Value::Bytes(_) => "bytes",
            Value::Date(_) => "date",
            Value::Time(_) => "time",
            Value::DateTime(_) => "datetime",
            Value::DateTimeTz(_) => "datetimetz",
            Value::Decimal(_) => "decimal",
            Value::Uuid(_) => "uuid",
            Value::Json(_) => "json",
            Value::Other { .. } => "other",
        }
    }

    /// Render this value for display. NULL renders as `NULL`.
    pub fn to_display_string(&self) -> String {
        match self {
            Value::Null => "NULL".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Int32(v) => v.to_string(),
            Value::Int64(v) => v.to_string(),
            Value::UInt64(v) => v.to_string(),
            Value::Float64(v) => v.to_string(),
            Value::Text(s) => s.clone(),
            Value::Bytes(b) => format!("\\x{}", hex::encode(b)),
            Value::Date(d) => d.format("%Y-%m-%d").to_string(),
            Value::Time(t) => t.format("%H:%M:%S%.f").to_string(),
            Value::DateTime(dt) => dt.format("%Y-%m-%d %H:%M:%S%.f").to_string(),
            Value::DateTimeTz(dt) => dt.format("%Y-%m-%d %H:%M:%S%.f %Z").to_string(),
            Value::Decimal(d) => d.to_string(),
            Value::Uuid(u) => u.to_string(),
            Value::Json(j) => serde_json::to_string(j).unwrap_or_else(|_| "{}".to_string()),
            Value::Other { display, .. } => display.clone(),
        }
    }

    /// Try to extract as a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Try to extract as an i64 (widens 32-bit integers).
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int32(v) => Some(i64::from(*v)),
            Value::Int64(v) => Some(*v),
            Value::UInt64(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    /// Try to extract as an f64.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float64(v) => Some(*v),
            _ => None,
        }
    }

    /// Try to extract as a string reference.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Try to extract as a bytes reference.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_display_string())
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Null
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::UInt64(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float64(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Value::Date(v)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::DateTime(v)
    }
}

impl From<Decimal> for Value {
    fn from(v: Decimal) -> Self {
        Value::Decimal(v)
    }
}

impl From<Uuid> for Value {
    fn from(v: Uuid) -> Self {
        Value::Uuid(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(val) => val.into(),
            None => Value::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_check() {
        assert!(Value::Null.is_null());
        assert!(!Value::Bool(true).is_null());
        assert!(!Value::Int32(0).is_null());
    }

    #[test]
    fn test_display_strings() {
        assert_eq!(Value::Null.to_display_string(), "NULL");
        assert_eq!(Value::Bool(false).to_display_string(), "false");
        assert_eq!(Value::Int64(-7).to_display_string(), "-7");
        assert_eq!(Value::Text("abc".into()).to_display_string(), "abc");
        assert_eq!(
            Value::Bytes(vec![0xDE, 0xAD]).to_display_string(),
            "\\xdead"
        );
    }

    #[test]
    fn test_as_i64_widens() {
        assert_eq!(Value::Int32(42).as_i64(), Some(42));
        assert_eq!(Value::Int64(42).as_i64(), Some(42));
        assert_eq!(Value::UInt64(42).as_i64(), Some(42));
        assert_eq!(Value::UInt64(u64::MAX).as_i64(), None);
        assert_eq!(Value::Text("42".into()).as_i64(), None);
    }

    #[test]
    fn test_from_option() {
        let some: Value = Some(5i32).into();
        assert_eq!(some, Value::Int32(5));
        let none: Value = Option::<i32>::None.into();
        assert_eq!(none, Value::Null);
    }
}
