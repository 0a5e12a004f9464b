//! # oxide-bulk
//!
//! Bulk `UPDATE`, `INSERT ... ON CONFLICT`, `MERGE` and `COPY` for
//! PostgreSQL, running statements compiled by `oxide-bulk-core` over sqlx.
//!
//! Every operation is a single round trip on the caller's connection (two
//! for [`copy_upsert`], which stages the rows first). Empty batches return
//! immediately without touching the connection.
//!
//! ```rust,no_run
//! use oxide_bulk::{upsert, ColumnSpec, OperationSpec, Row, TableDescriptor};
//! use sqlx::{Connection, PgConnection};
//!
//! # async fn example() -> oxide_bulk::Result<()> {
//! let mut conn = PgConnection::connect("postgres://localhost/shop").await?;
//! let items = TableDescriptor::new("items")
//!     .column(ColumnSpec::new("id", "bigint").not_null())
//!     .column(ColumnSpec::new("sku", "text").not_null())
//!     .column(ColumnSpec::new("qty", "integer"))
//!     .primary_key(&["id"])
//!     .unique(&["sku"]);
//! let rows = vec![Row::new().set("sku", "A").set("qty", 1)];
//!
//! let spec = OperationSpec::matching(&["sku"])
//!     .ignore_unchanged(true)
//!     .track_categorization(true);
//! let result = upsert(&mut conn, &items, &rows, &spec).await?;
//! println!("{} inserted", result.inserted().count());
//! # Ok(())
//! # }
//! ```
//!
//! Synchronous callers use [`blocking::BlockingSession`].

pub mod blocking;
pub mod config;
pub mod copy;
pub mod error;
mod execute;
pub mod executor;
pub mod result;

pub use config::{BulkConfig, DEFAULT_STAGING_PREFIX};
pub use error::{Error, Result};
pub use executor::BulkExecutor;
pub use oxide_bulk_core::{
    BulkError, ColumnSpec, MergeAction, MergeChain, MergeClause, MergeSpec, MergeWhen,
    OperationSpec, Returning, Row, SqlValue, TableDescriptor,
};
pub use result::{
    CopyUpsertResult, MergeOutcome, MergeResult, MergedRow, RowStatus, UpdateResult,
    UpsertResult, UpsertedRow,
};

use sqlx::PgConnection;

/// [`BulkExecutor::update`] with the default configuration.
///
/// # Errors
///
/// See [`BulkExecutor::update`].
pub async fn update(
    conn: &mut PgConnection,
    table: &TableDescriptor,
    rows: &[Row],
    spec: &OperationSpec,
) -> Result<UpdateResult> {
    BulkExecutor::default().update(conn, table, rows, spec).await
}

/// [`BulkExecutor::upsert`] with the default configuration.
///
/// # Errors
///
/// See [`BulkExecutor::upsert`].
pub async fn upsert(
    conn: &mut PgConnection,
    table: &TableDescriptor,
    rows: &[Row],
    spec: &OperationSpec,
) -> Result<UpsertResult> {
    BulkExecutor::default().upsert(conn, table, rows, spec).await
}

/// [`BulkExecutor::merge`] with the default configuration.
///
/// # Errors
///
/// See [`BulkExecutor::merge`].
pub async fn merge(
    conn: &mut PgConnection,
    table: &TableDescriptor,
    rows: &[Row],
    spec: &MergeSpec,
    chain: &MergeChain,
) -> Result<MergeResult> {
    BulkExecutor::default()
        .merge(conn, table, rows, spec, chain)
        .await
}

/// [`BulkExecutor::copy_in`] with the default configuration.
///
/// # Errors
///
/// See [`BulkExecutor::copy_in`].
pub async fn copy_in(conn: &mut PgConnection, table: &TableDescriptor, rows: &[Row]) -> Result<u64> {
    BulkExecutor::default().copy_in(conn, table, rows).await
}

/// [`BulkExecutor::copy_upsert`] with the default configuration.
///
/// # Errors
///
/// See [`BulkExecutor::copy_upsert`].
pub async fn copy_upsert(
    conn: &mut PgConnection,
    table: &TableDescriptor,
    rows: &[Row],
    spec: &OperationSpec,
) -> Result<CopyUpsertResult> {
    BulkExecutor::default()
        .copy_upsert(conn, table, rows, spec)
        .await
}
