//! Error taxonomy for the record access helper.
//!
//! Every failure surfaces as one of a small set of kinds, each carrying the
//! underlying driver or I/O cause where one exists. The helper never retries
//! and never recovers on the caller's behalf: it reports the kind and leaves
//! the abort/continue decision to the caller.

use thiserror::Error;

/// Errors produced by connections, statements, cursors, and the bulk loader.
#[derive(Debug, Error)]
pub enum Error {
    /// Opening, closing, or using the underlying transport failed.
    #[error("connection: {message}")]
    Connection {
        message: String,
        #[source]
        source: Option<sqlx::Error>,
    },

    /// Parameter count or declared-type mismatch while binding a statement.
    #[error("binding: {message}")]
    Binding { message: String },

    /// Execution-time SQL failure: syntax error, constraint violation, etc.
    #[error("statement: {message}")]
    Statement {
        message: String,
        #[source]
        source: Option<sqlx::Error>,
    },

    /// Invalid cursor operation: scrolling a forward-only cursor, updating a
    /// read-only cursor, or operating without a current row.
    #[error("cursor: {message}")]
    Cursor { message: String },

    /// Reading or parsing a bulk-load input file failed.
    #[error("bulk load: {message}")]
    BulkLoad {
        message: String,
        #[source]
        source: Option<csv::Error>,
    },
}

impl Error {
    pub(crate) fn connection(message: impl Into<String>) -> Self {
        Error::Connection {
            message: message.into(),
            source: None,
        }
    }

    pub(crate) fn connection_caused(message: impl Into<String>, cause: sqlx::Error) -> Self {
        Error::Connection {
            message: message.into(),
            source: Some(cause),
        }
    }

    pub(crate) fn binding(message: impl Into<String>) -> Self {
        Error::Binding {
            message: message.into(),
        }
    }

    pub(crate) fn statement(message: impl Into<String>) -> Self {
        Error::Statement {
            message: message.into(),
            source: None,
        }
    }

    pub(crate) fn statement_caused(message: impl Into<String>, cause: sqlx::Error) -> Self {
        Error::Statement {
            message: message.into(),
            source: Some(cause),
        }
    }

    pub(crate) fn cursor(message: impl Into<String>) -> Self {
        Error::Cursor {
            message: message.into(),
        }
    }

    pub(crate) fn bulk_load(message: impl Into<String>) -> Self {
        Error::BulkLoad {
            message: message.into(),
            source: None,
        }
    }

    pub(crate) fn bulk_load_caused(message: impl Into<String>, cause: csv::Error) -> Self {
        Error::BulkLoad {
            message: message.into(),
            source: Some(cause),
        }
    }

    /// True if this is a binding error (parameter count/type mismatch).
    pub fn is_binding(&self) -> bool {
        matches!(self, Error::Binding { .. })
    }

    /// True if this is an invalid cursor operation.
    pub fn is_cursor(&self) -> bool {
        matches!(self, Error::Cursor { .. })
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_includes_kind() {
        let err = Error::binding("expected 3 parameters, got 2");
        assert_eq!(err.to_string(), "binding: expected 3 parameters, got 2");

        let err = Error::cursor("cursor is not scrollable");
        assert_eq!(err.to_string(), "cursor: cursor is not scrollable");
    }

    #[test]
    fn test_error_kind_predicates() {
        assert!(Error::binding("x").is_binding());
        assert!(!Error::binding("x").is_cursor());
        assert!(Error::cursor("x").is_cursor());
        assert!(!Error::statement("x").is_binding());
    }

    #[test]
    fn test_error_carries_source() {
        use std::error::Error as _;

        let cause = sqlx::Error::RowNotFound;
        let err = Error::statement_caused("query failed", cause);
        assert!(err.source().is_some());

        let err = Error::statement("query failed");
        assert!(err.source().is_none());
    }
}
