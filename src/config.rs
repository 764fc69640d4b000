//! Connection configuration.
//!
//! This module contains:
//! - `DatabaseType` - Enum of supported backends
//! - `SslMode` - SSL negotiation policy for server backends
//! - `ConnectionParams` - Backend-specific connection parameters
//! - `ConnectionConfig` - The configuration handed to [`Connection::open`]
//!
//! Credentials are held only as opaque configuration: the `Debug` impl for
//! server parameters redacts the password and serialization skips it.
//!
//! [`Connection::open`]: crate::Connection::open

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Supported database backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseType {
    #[default]
    MySQL,
    PostgreSQL,
    SQLite,
}

impl DatabaseType {
    /// Get the display name for this database type.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::MySQL => "MySQL",
            Self::PostgreSQL => "PostgreSQL",
            Self::SQLite => "SQLite",
        }
    }

    /// Get the default port for server-based backends.
    pub fn default_port(&self) -> Option<u16> {
        match self {
            Self::MySQL => Some(3306),
            Self::PostgreSQL => Some(5432),
            Self::SQLite => None, // File-based
        }
    }

    /// Check if this backend is file-based.
    pub fn is_file_based(&self) -> bool {
        matches!(self, Self::SQLite)
    }

    /// Check if this backend supports stored routines.
    pub fn supports_routines(&self) -> bool {
        !self.is_file_based()
    }

    /// Parse from a string representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "mysql" | "mariadb" => Some(Self::MySQL),
            "postgresql" | "postgres" | "pg" => Some(Self::PostgreSQL),
            "sqlite" | "sqlite3" => Some(Self::SQLite),
            _ => None,
        }
    }
}

impl std::fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// SSL mode options for server backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SslMode {
    /// No SSL connection.
    Disable,
    /// Try SSL first, fall back to plaintext.
    #[default]
    Prefer,
    /// Require SSL, don't verify certificates.
    Require,
    /// Require SSL and verify the server certificate.
    VerifyCa,
    /// Require SSL, verify certificate and hostname.
    VerifyFull,
}

/// Connection parameters for the different backend families.
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ConnectionParams {
    /// Server-based backends (MySQL, PostgreSQL).
    Server {
        /// Server hostname or IP address.
        host: String,
        /// Server port.
        port: u16,
        /// Default database to connect to.
        database: String,
        /// Username for authentication.
        username: String,
        /// Password for authentication. Never serialized, never logged.
        #[serde(skip_serializing, default)]
        password: String,
        /// SSL mode for the connection.
        #[serde(default)]
        ssl_mode: SslMode,
    },

    /// File-based backends (SQLite).
    File {
        /// Path to the database file.
        path: PathBuf,
        /// Open in read-only mode.
        #[serde(default)]
        read_only: bool,
    },

    /// In-memory backends (SQLite).
    InMemory,
}

impl ConnectionParams {
    /// Create server connection parameters.
    pub fn server(
        host: impl Into<String>,
        port: u16,
        database: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self::Server {
            host: host.into(),
            port,
            database: database.into(),
            username: username.into(),
            password: password.into(),
            ssl_mode: SslMode::default(),
        }
    }

    /// Create file connection parameters.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::File {
            path: path.into(),
            read_only: false,
        }
    }

    /// Create in-memory connection parameters.
    pub fn in_memory() -> Self {
        Self::InMemory
    }

    /// Get the hostname if this is a server connection.
    pub fn host(&self) -> Option<&str> {
        match self {
            Self::Server { host, .. } => Some(host),
            _ => None,
        }
    }

    /// Get the database name if this is a server connection.
    pub fn database(&self) -> Option<&str> {
        match self {
            Self::Server { database, .. } => Some(database),
            _ => None,
        }
    }
}

// Manual impl so the password can never leak through debug logging.
impl std::fmt::Debug for ConnectionParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Server {
                host,
                port,
                database,
                username,
                ssl_mode,
                ..
            } => f
                .debug_struct("Server")
                .field("host", host)
                .field("port", port)
                .field("database", database)
                .field("username", username)
                .field("password", &"<redacted>")
                .field("ssl_mode", ssl_mode)
                .finish(),
            Self::File { path, read_only } => f
                .debug_struct("File")
                .field("path", path)
                .field("read_only", read_only)
                .finish(),
            Self::InMemory => write!(f, "InMemory"),
        }
    }
}

/// Configuration for one database connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// The backend to connect to.
    pub database_type: DatabaseType,
    /// Backend-specific connection parameters.
    pub params: ConnectionParams,
}

impl ConnectionConfig {
    /// Create a new connection configuration.
    pub fn new(database_type: DatabaseType, params: ConnectionParams) -> Self {
        Self {
            database_type,
            params,
        }
    }

    /// Shorthand for an in-memory SQLite configuration.
    pub fn sqlite_in_memory() -> Self {
        Self::new(DatabaseType::SQLite, ConnectionParams::in_memory())
    }

    /// Shorthand for a file-backed SQLite configuration.
    pub fn sqlite_file(path: impl Into<PathBuf>) -> Self {
        Self::new(DatabaseType::SQLite, ConnectionParams::file(path))
    }

    /// Validate that the params match the database type.
    pub fn validate(&self) -> Result<(), String> {
        match (&self.database_type, &self.params) {
            (DatabaseType::SQLite, ConnectionParams::Server { .. }) => Err(
                "SQLite requires file or in-memory connection parameters".to_string(),
            ),
            (
                DatabaseType::MySQL | DatabaseType::PostgreSQL,
                ConnectionParams::File { .. } | ConnectionParams::InMemory,
            ) => Err(format!(
                "{} requires server connection parameters",
                self.database_type.display_name()
            )),
            _ => Ok(()),
        }
    }

    /// A human-readable description of the target, without credentials.
    ///
    /// `user@host:port/database` for server backends, the file path (or
    /// `:memory:`) for SQLite.
    pub fn display_target(&self) -> String {
        match &self.params {
            ConnectionParams::Server {
                host,
                port,
                database,
                username,
                ..
            } => format!("{username}@{host}:{port}/{database}"),
            ConnectionParams::File { path, .. } => path.display().to_string(),
            ConnectionParams::InMemory => ":memory:".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_type_defaults() {
        assert_eq!(DatabaseType::MySQL.default_port(), Some(3306));
        assert_eq!(DatabaseType::PostgreSQL.default_port(), Some(5432));
        assert_eq!(DatabaseType::SQLite.default_port(), None);
        assert!(DatabaseType::SQLite.is_file_based());
        assert!(!DatabaseType::MySQL.is_file_based());
    }

    #[test]
    fn test_database_type_parse() {
        assert_eq!(DatabaseType::parse("mysql"), Some(DatabaseType::MySQL));
        assert_eq!(DatabaseType::parse("pg"), Some(DatabaseType::PostgreSQL));
        assert_eq!(DatabaseType::parse("SQLite3"), Some(DatabaseType::SQLite));
        assert_eq!(DatabaseType::parse("oracle"), None);
    }

    #[test]
    fn test_config_validation() {
        let config = ConnectionConfig::new(
            DatabaseType::MySQL,
            ConnectionParams::server("localhost", 3306, "student_db", "user", "pass"),
        );
        assert!(config.validate().is_ok());

        let config = ConnectionConfig::new(DatabaseType::MySQL, ConnectionParams::in_memory());
        assert!(config.validate().is_err());

        let config = ConnectionConfig::new(
            DatabaseType::SQLite,
            ConnectionParams::server("localhost", 3306, "db", "user", "pass"),
        );
        assert!(config.validate().is_err());

        let config = ConnectionConfig::new(DatabaseType::SQLite, ConnectionParams::in_memory());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_debug_redacts_password() {
        let params = ConnectionParams::server("localhost", 3306, "db", "root", "hunter2");
        let rendered = format!("{params:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_serialization_skips_password() {
        let config = ConnectionConfig::new(
            DatabaseType::MySQL,
            ConnectionParams::server("localhost", 3306, "db", "root", "hunter2"),
        );
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("hunter2"));
    }

    #[test]
    fn test_display_target() {
        let config = ConnectionConfig::new(
            DatabaseType::MySQL,
            ConnectionParams::server("localhost", 3306, "student_db", "root", "pw"),
        );
        assert_eq!(config.display_target(), "root@localhost:3306/student_db");

        let config = ConnectionConfig::new(DatabaseType::SQLite, ConnectionParams::in_memory());
        assert_eq!(config.display_target(), ":memory:");
    }
}
