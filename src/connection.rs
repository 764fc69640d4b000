//! Connection handles.
//!
//! A [`Connection`] owns exactly one live transport to a relational store.
//! It is created explicitly with [`Connection::open`], used for zero or more
//! statement executions, and closed with [`Connection::close`] — closing is
//! idempotent and terminal. Dropping the handle releases the transport as
//! well, so the connection cannot leak on error paths.
//!
//! A handle is exclusively owned: statement execution takes `&mut self`, and
//! cursors borrow the handle mutably for their whole lifetime, so a cursor
//! can never outlive — or race — its connection.

use crate::config::{ConnectionConfig, DatabaseType};
use crate::drivers::{self, Driver};
use crate::error::{Error, Result};
use crate::runner::StatementRunner;

/// One open session to a database.
pub struct Connection {
    config: ConnectionConfig,
    driver: Box<dyn Driver>,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("config", &self.config)
            .field("open", &self.is_open())
            .finish()
    }
}

impl Connection {
    /// Open a connection described by the configuration.
    ///
    /// Every open failure — bad credentials, unreachable host, unknown
    /// database, invalid parameters — surfaces as [`Error::Connection`] with
    /// the underlying cause attached.
    pub async fn open(config: ConnectionConfig) -> Result<Self> {
        config.validate().map_err(Error::connection)?;
        tracing::debug!(
            backend = %config.database_type,
            db = %config.display_target(),
            "opening connection"
        );
        let driver = drivers::connect(&config).await?;
        Ok(Self { config, driver })
    }

    /// Release the underlying transport.
    ///
    /// Safe to call more than once; the second call is a no-op. No operation
    /// is valid on the handle afterward.
    pub async fn close(&mut self) -> Result<()> {
        self.driver.close().await
    }

    /// Whether the handle still owns a live transport.
    pub fn is_open(&self) -> bool {
        self.driver.is_open()
    }

    /// The backend this handle is connected to.
    pub fn database_type(&self) -> DatabaseType {
        self.driver.database_type()
    }

    /// The configuration this handle was opened with.
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Start executing statements against this connection.
    pub fn runner(&mut self) -> StatementRunner<'_> {
        StatementRunner::new(self)
    }

    pub(crate) fn driver_mut(&mut self) -> &mut dyn Driver {
        &mut *self.driver
    }
}
