//! SQL statement templates and typed parameter slots.
//!
//! A [`Statement`] is a SQL template with `?` placeholders plus an ordered
//! sequence of typed slots. Templates use `?` on every backend; the
//! PostgreSQL driver rewrites them to `$n` internally. Parameter values are
//! only ever handed to the driver's bind API, never spliced into the SQL
//! text, so injection is ruled out by construction — including for literal
//! statements, which simply carry zero slots.
//!
//! Binding is validated before execution: the slot count must equal the
//! placeholder count and every slot value must match its declared type.
//! Mismatches fail with a binding error instead of being coerced.

use crate::error::{Error, Result};
use crate::value::Value;

/// Declared type of a parameter slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    /// Boolean.
    Bool,
    /// 32-bit signed integer.
    Int,
    /// 64-bit signed integer.
    BigInt,
    /// 64-bit floating point.
    Double,
    /// Text.
    Text,
    /// Binary data.
    Bytes,
    /// Date without time.
    Date,
    /// Time without date.
    Time,
    /// Date and time without timezone.
    DateTime,
    /// Arbitrary-precision decimal.
    Decimal,
    /// UUID.
    Uuid,
    /// JSON document.
    Json,
}

impl ParamType {
    /// Short name for diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int => "int",
            Self::BigInt => "bigint",
            Self::Double => "double",
            Self::Text => "text",
            Self::Bytes => "bytes",
            Self::Date => "date",
            Self::Time => "time",
            Self::DateTime => "datetime",
            Self::Decimal => "decimal",
            Self::Uuid => "uuid",
            Self::Json => "json",
        }
    }

    /// Whether `value` is acceptable for this declared type.
    ///
    /// NULL is acceptable in any slot. Int32 widens into a bigint slot;
    /// everything else must match exactly.
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) => true,
            (Self::Bool, Value::Bool(_)) => true,
            (Self::Int, Value::Int32(_)) => true,
            (Self::BigInt, Value::Int64(_) | Value::Int32(_)) => true,
            (Self::Double, Value::Float64(_)) => true,
            (Self::Text, Value::Text(_)) => true,
            (Self::Bytes, Value::Bytes(_)) => true,
            (Self::Date, Value::Date(_)) => true,
            (Self::Time, Value::Time(_)) => true,
            (Self::DateTime, Value::DateTime(_) | Value::DateTimeTz(_)) => true,
            (Self::Decimal, Value::Decimal(_)) => true,
            (Self::Uuid, Value::Uuid(_)) => true,
            (Self::Json, Value::Json(_)) => true,
            _ => false,
        }
    }
}

/// One parameter slot: a declared type and the value bound to it.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    /// Declared slot type.
    pub ty: ParamType,
    /// Bound value.
    pub value: Value,
}

impl Param {
    /// Create a parameter slot.
    pub fn new(ty: ParamType, value: impl Into<Value>) -> Self {
        Self {
            ty,
            value: value.into(),
        }
    }

    /// 32-bit integer slot.
    pub fn int(value: i32) -> Self {
        Self::new(ParamType::Int, value)
    }

    /// 64-bit integer slot.
    pub fn big_int(value: i64) -> Self {
        Self::new(ParamType::BigInt, value)
    }

    /// Text slot.
    pub fn text(value: impl Into<String>) -> Self {
        Self::new(ParamType::Text, value.into())
    }

    /// NULL slot with the given declared type.
    pub fn null(ty: ParamType) -> Self {
        Self { ty, value: Value::Null }
    }
}

/// A SQL template plus its ordered parameter slots.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    sql: String,
    params: Vec<Param>,
}

impl Statement {
    /// Create a statement from a SQL template. Literal statements carry no
    /// slots; parameterized ones add slots with [`bind`](Self::bind).
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    /// Append a typed parameter slot. Slot order matches placeholder order.
    pub fn bind(mut self, ty: ParamType, value: impl Into<Value>) -> Self {
        self.params.push(Param::new(ty, value));
        self
    }

    /// Append an already-built parameter slot.
    pub fn bind_param(mut self, param: Param) -> Self {
        self.params.push(param);
        self
    }

    /// The SQL template.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// The bound parameter slots, in order.
    pub fn params(&self) -> &[Param] {
        &self.params
    }

    /// Validate slot count against the template's placeholder count and
    /// every slot value against its declared type.
    pub fn validate(&self) -> Result<()> {
        let placeholders = count_placeholders(&self.sql);
        if placeholders != self.params.len() {
            return Err(Error::binding(format!(
                "statement has {placeholders} placeholder(s) but {} value(s) were bound",
                self.params.len()
            )));
        }
        for (idx, param) in self.params.iter().enumerate() {
            if !param.ty.accepts(&param.value) {
                return Err(Error::binding(format!(
                    "parameter {} declared as {} but bound value is {}",
                    idx + 1,
                    param.ty.name(),
                    param.value.type_name()
                )));
            }
        }
        Ok(())
    }

    /// Values of the bound slots, in order.
    pub(crate) fn values(&self) -> Vec<Value> {
        self.params.iter().map(|p| p.value.clone()).collect()
    }
}

/// Count `?` placeholders in a SQL template, ignoring string literals,
/// quoted identifiers, and comments.
pub(crate) fn count_placeholders(sql: &str) -> usize {
    let mut count = 0;
    scan_template(sql, |_| count += 1);
    count
}

/// Rewrite `?` placeholders to PostgreSQL's `$1..$n` form.
pub(crate) fn number_placeholders(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len() + 8);
    let mut n = 0usize;
    let mut last = 0usize;
    scan_template(sql, |pos| {
        n += 1;
        out.push_str(&sql[last..pos]);
        out.push('$');
        out.push_str(&n.to_string());
        last = pos + 1;
    });
    out.push_str(&sql[last..]);
    out
}

/// Walk a SQL template and invoke `on_placeholder` with the byte position of
/// each `?` that sits outside quotes and comments.
fn scan_template(sql: &str, mut on_placeholder: impl FnMut(usize)) {
    #[derive(PartialEq)]
    enum State {
        Plain,
        SingleQuote,
        DoubleQuote,
        Backtick,
        LineComment,
        BlockComment,
    }

    let bytes = sql.as_bytes();
    let mut state = State::Plain;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        match state {
            State::Plain => match b {
                b'?' => on_placeholder(i),
                b'\'' => state = State::SingleQuote,
                b'"' => state = State::DoubleQuote,
                b'`' => state = State::Backtick,
                b'-' if bytes.get(i + 1) == Some(&b'-') => {
                    state = State::LineComment;
                    i += 1;
                }
                b'/' if bytes.get(i + 1) == Some(&b'*') => {
                    state = State::BlockComment;
                    i += 1;
                }
                _ => {}
            },
            State::SingleQuote if b == b'\'' => {
                // '' escapes a quote inside the literal
                if bytes.get(i + 1) == Some(&b'\'') {
                    i += 1;
                } else {
                    state = State::Plain;
                }
            }
            State::DoubleQuote if b == b'"' => state = State::Plain,
            State::Backtick if b == b'`' => state = State::Plain,
            State::LineComment if b == b'\n' => state = State::Plain,
            State::BlockComment if b == b'*' && bytes.get(i + 1) == Some(&b'/') => {
                state = State::Plain;
                i += 1;
            }
            _ => {}
        }
        i += 1;
    }
}

/// Validate a table, column, or routine name used in generated SQL.
///
/// Generated statements (cursor commits, bulk inserts, routine calls) embed
/// identifiers directly, so only plain identifiers — optionally one
/// schema qualifier — are accepted.
pub(crate) fn validate_identifier(name: &str) -> Result<()> {
    fn plain(part: &str) -> bool {
        let mut chars = part.chars();
        matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
            && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
    }

    let mut parts = name.splitn(3, '.');
    let valid = match (parts.next(), parts.next(), parts.next()) {
        (Some(a), None, _) => plain(a),
        (Some(a), Some(b), None) => plain(a) && plain(b),
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(Error::statement(format!("invalid identifier: {name:?}")))
    }
}
