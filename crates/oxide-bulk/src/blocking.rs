//! Blocking adapter.
//!
//! [`BlockingSession`] owns a connection and a current-thread Tokio runtime
//! and drives the same async operations to completion, so statements and
//! results are identical to the async API.

use oxide_bulk_core::{MergeChain, MergeSpec, OperationSpec, Row, TableDescriptor};
use sqlx::{Connection, PgConnection};
use tokio::runtime::{Builder, Runtime};

use crate::config::BulkConfig;
use crate::error::Result;
use crate::executor::BulkExecutor;
use crate::result::{CopyUpsertResult, MergeResult, UpdateResult, UpsertResult};

/// A connection usable from synchronous code.
///
/// Must not be used from inside an async runtime.
#[derive(Debug)]
pub struct BlockingSession {
    runtime: Runtime,
    conn: PgConnection,
    executor: BulkExecutor,
}

impl BlockingSession {
    /// Connects to `url` with the default configuration.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Database`] when the connection fails.
    pub fn connect(url: &str) -> Result<Self> {
        Self::connect_with(url, BulkConfig::default())
    }

    /// Connects to `url` with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Database`] when the connection fails.
    pub fn connect_with(url: &str, config: BulkConfig) -> Result<Self> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(sqlx::Error::Io)?;
        let conn = runtime.block_on(PgConnection::connect(url))?;
        Ok(Self {
            runtime,
            conn,
            executor: BulkExecutor::new(config),
        })
    }

    /// Returns the underlying connection, e.g. to run other statements.
    pub fn connection(&mut self) -> &mut PgConnection {
        &mut self.conn
    }

    /// Runs an arbitrary statement without parameters.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Database`] when the statement fails.
    pub fn execute(&mut self, sql: &str) -> Result<u64> {
        let done = self
            .runtime
            .block_on(sqlx::query(sql).execute(&mut self.conn))?;
        Ok(done.rows_affected())
    }

    /// Blocking [`BulkExecutor::update`].
    ///
    /// # Errors
    ///
    /// See [`BulkExecutor::update`].
    pub fn update(
        &mut self,
        table: &TableDescriptor,
        rows: &[Row],
        spec: &OperationSpec,
    ) -> Result<UpdateResult> {
        self.runtime
            .block_on(self.executor.update(&mut self.conn, table, rows, spec))
    }

    /// Blocking [`BulkExecutor::upsert`].
    ///
    /// # Errors
    ///
    /// See [`BulkExecutor::upsert`].
    pub fn upsert(
        &mut self,
        table: &TableDescriptor,
        rows: &[Row],
        spec: &OperationSpec,
    ) -> Result<UpsertResult> {
        self.runtime
            .block_on(self.executor.upsert(&mut self.conn, table, rows, spec))
    }

    /// Blocking [`BulkExecutor::merge`].
    ///
    /// # Errors
    ///
    /// See [`BulkExecutor::merge`].
    pub fn merge(
        &mut self,
        table: &TableDescriptor,
        rows: &[Row],
        spec: &MergeSpec,
        chain: &MergeChain,
    ) -> Result<MergeResult> {
        self.runtime
            .block_on(self.executor.merge(&mut self.conn, table, rows, spec, chain))
    }

    /// Blocking [`BulkExecutor::copy_in`].
    ///
    /// # Errors
    ///
    /// See [`BulkExecutor::copy_in`].
    pub fn copy_in(&mut self, table: &TableDescriptor, rows: &[Row]) -> Result<u64> {
        self.runtime
            .block_on(self.executor.copy_in(&mut self.conn, table, rows))
    }

    /// Blocking [`BulkExecutor::copy_upsert`].
    ///
    /// # Errors
    ///
    /// See [`BulkExecutor::copy_upsert`].
    pub fn copy_upsert(
        &mut self,
        table: &TableDescriptor,
        rows: &[Row],
        spec: &OperationSpec,
    ) -> Result<CopyUpsertResult> {
        self.runtime
            .block_on(self.executor.copy_upsert(&mut self.conn, table, rows, spec))
    }

    /// Closes the connection.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Database`] when the server does not
    /// acknowledge the shutdown.
    pub fn close(self) -> Result<()> {
        let Self { runtime, conn, .. } = self;
        runtime.block_on(conn.close())?;
        Ok(())
    }
}
