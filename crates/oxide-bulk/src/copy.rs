//! COPY loading, plain and staged.
//!
//! `copy_upsert` streams the batch into a temporary staging table and folds
//! it into the target with one `INSERT ... SELECT ... ON CONFLICT`. The
//! staging table lives inside a transaction (a savepoint when the caller
//! already has one open) and is created `ON COMMIT DROP`. Any error drops the
//! transaction guard, which rolls back and takes the staging table with it.

use std::sync::atomic::{AtomicU64, Ordering};

use oxide_bulk_core::{CopyIn, OperationSpec, Row, TableDescriptor};
use sqlx::{Connection, PgConnection};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::executor::{upsert_statement, BulkExecutor};
use crate::result::CopyUpsertResult;

static STAGING_SEQ: AtomicU64 = AtomicU64::new(0);

impl BulkExecutor {
    /// Streams rows straight into the target with `COPY ... FROM STDIN`.
    ///
    /// There is no conflict handling: one violating row fails the whole
    /// batch. Returns the number of rows copied.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Compile`] before touching the connection, or
    /// [`crate::Error::Database`] when the server rejects the data.
    pub async fn copy_in(
        &self,
        conn: &mut PgConnection,
        table: &TableDescriptor,
        rows: &[Row],
    ) -> Result<u64> {
        let Some(copy) = self.compiler(table).copy_in(rows)? else {
            warn!(table = %table.name, "Empty batch, skipping copy");
            return Ok(0);
        };
        let copied = stream(conn, &copy, rows, self.config().copy_chunk_size).await?;
        info!(table = %table.name, copied, "Bulk copy complete");
        Ok(copied)
    }

    /// Streams rows into a staging table and upserts them into the target.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Compile`] before touching the connection, or
    /// [`crate::Error::Database`] from any phase. On error nothing of the
    /// operation remains, staging table included.
    pub async fn copy_upsert(
        &self,
        conn: &mut PgConnection,
        table: &TableDescriptor,
        rows: &[Row],
        spec: &OperationSpec,
    ) -> Result<CopyUpsertResult> {
        let staging = format!(
            "{}_{}",
            self.config().staging_prefix,
            STAGING_SEQ.fetch_add(1, Ordering::Relaxed)
        );
        let Some(plan) = self.compiler(table).staged_upsert(rows, spec, &staging)? else {
            warn!(table = %table.name, "Empty batch, skipping copy upsert");
            return Ok(CopyUpsertResult::default());
        };

        let mut tx = conn.begin().await?;
        debug!(sql = %plan.create_sql, "Creating staging table");
        sqlx::query(&plan.create_sql).execute(&mut *tx).await?;
        let copied = stream(&mut tx, &plan.copy, rows, self.config().copy_chunk_size).await?;
        let upsert = upsert_statement(&mut tx, &plan.upsert).await?;
        debug!(sql = %plan.drop_sql, "Dropping staging table");
        sqlx::query(&plan.drop_sql).execute(&mut *tx).await?;
        tx.commit().await?;

        info!(
            table = %table.name,
            staging = %plan.staging,
            copied,
            affected = upsert.affected,
            inserted = upsert.inserted().count(),
            updated = upsert.updated().count(),
            "Bulk copy upsert complete"
        );
        Ok(CopyUpsertResult { copied, upsert })
    }
}

/// Sends the COPY payload in chunks and returns the server's row count.
async fn stream(
    conn: &mut PgConnection,
    copy: &CopyIn<'_>,
    rows: &[Row],
    chunk_size: usize,
) -> Result<u64> {
    debug!(sql = %copy.sql, rows = copy.row_count, chunk_size, "Starting COPY");
    let mut sink = conn.copy_in_raw(&copy.sql).await?;
    for chunk in copy.encoder(rows, chunk_size) {
        sink.send(chunk).await?;
    }
    Ok(sink.finish().await?)
}
