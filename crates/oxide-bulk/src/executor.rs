//! Bulk operations on a PostgreSQL connection.

use oxide_bulk_core::{
    Compiler, MergeChain, MergeSpec, OperationSpec, Row, Statement, StatusColumn, TableDescriptor,
};
use sqlx::PgConnection;
use tracing::{info, warn};

use crate::config::BulkConfig;
use crate::error::{Error, Result};
use crate::execute::{decode_action, decode_inserted, decode_values, run};
use crate::result::{
    MergeOutcome, MergeResult, MergedRow, RowStatus, UpdateResult, UpsertResult, UpsertedRow,
};

/// Runs bulk operations with a shared configuration.
///
/// Each operation compiles to one statement (two phases for
/// [`BulkExecutor::copy_upsert`]) and runs on the caller's connection, or on
/// a transaction borrowed as one. Nothing is retried: the first engine error
/// is returned as [`Error::Database`].
#[derive(Debug, Clone, Default)]
pub struct BulkExecutor {
    config: BulkConfig,
}

impl BulkExecutor {
    /// Creates an executor with the given configuration.
    #[must_use]
    pub const fn new(config: BulkConfig) -> Self {
        Self { config }
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &BulkConfig {
        &self.config
    }

    /// Returns a compiler for `table` using this configuration.
    #[must_use]
    pub fn compiler<'a>(&self, table: &'a TableDescriptor) -> Compiler<'a> {
        Compiler::with_options(table, self.config.compile_options())
    }

    /// Updates existing rows matched on `spec.match_fields`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Compile`] before touching the connection, or
    /// [`Error::Database`] when the statement fails.
    pub async fn update(
        &self,
        conn: &mut PgConnection,
        table: &TableDescriptor,
        rows: &[Row],
        spec: &OperationSpec,
    ) -> Result<UpdateResult> {
        let Some(statement) = self.compiler(table).update(rows, spec)? else {
            warn!(table = %table.name, "Empty batch, skipping update");
            return Ok(UpdateResult::default());
        };
        let executed = run(conn, &statement).await?;
        let rows = executed
            .rows
            .iter()
            .map(|row| decode_values(row, &statement.returning))
            .collect::<Result<Vec<_>>>()?;
        info!(
            table = %table.name,
            rows = statement.row_count,
            affected = executed.affected,
            "Bulk update complete"
        );
        Ok(UpdateResult {
            affected: executed.affected,
            rows,
        })
    }

    /// Inserts rows, resolving conflicts on `spec.match_fields`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Compile`] before touching the connection, including
    /// when `match_fields` is not a declared unique constraint, or
    /// [`Error::Database`] when the statement fails.
    pub async fn upsert(
        &self,
        conn: &mut PgConnection,
        table: &TableDescriptor,
        rows: &[Row],
        spec: &OperationSpec,
    ) -> Result<UpsertResult> {
        let Some(statement) = self.compiler(table).upsert(rows, spec)? else {
            warn!(table = %table.name, "Empty batch, skipping upsert");
            return Ok(UpsertResult::default());
        };
        let result = upsert_statement(conn, &statement).await?;
        info!(
            table = %table.name,
            rows = statement.row_count,
            affected = result.affected,
            inserted = result.inserted().count(),
            updated = result.updated().count(),
            "Bulk upsert complete"
        );
        Ok(result)
    }

    /// Applies `chain` to the target rows joined with the batch.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Compile`] before touching the connection,
    /// [`Error::Database`] when the statement fails, or [`Error::Decode`]
    /// for an unknown `merge_action()`.
    pub async fn merge(
        &self,
        conn: &mut PgConnection,
        table: &TableDescriptor,
        rows: &[Row],
        spec: &MergeSpec,
        chain: &MergeChain,
    ) -> Result<MergeResult> {
        let Some(statement) = self.compiler(table).merge(rows, spec, chain)? else {
            warn!(table = %table.name, "Empty batch, skipping merge");
            return Ok(MergeResult::default());
        };
        let executed = run(conn, &statement).await?;
        let mut merged = Vec::with_capacity(executed.rows.len());
        for row in &executed.rows {
            let action = decode_action(row)?;
            let outcome = MergeOutcome::from_action(&action).ok_or_else(|| Error::Decode {
                table: table.name.clone(),
                message: format!("unknown merge action '{action}'"),
            })?;
            merged.push(MergedRow {
                outcome,
                values: decode_values(row, &statement.returning)?,
            });
        }
        info!(
            table = %table.name,
            rows = statement.row_count,
            clauses = chain.len(),
            affected = executed.affected,
            "Bulk merge complete"
        );
        Ok(MergeResult {
            affected: executed.affected,
            rows: merged,
        })
    }
}

/// Runs a compiled upsert and categorizes its rows.
pub(crate) async fn upsert_statement(
    conn: &mut PgConnection,
    statement: &Statement,
) -> Result<UpsertResult> {
    let executed = run(conn, statement).await?;
    let mut rows = Vec::with_capacity(executed.rows.len());
    for row in &executed.rows {
        let status = if statement.status == StatusColumn::Inserted {
            Some(if decode_inserted(row)? {
                RowStatus::Inserted
            } else {
                RowStatus::Updated
            })
        } else {
            None
        };
        rows.push(UpsertedRow {
            status,
            values: decode_values(row, &statement.returning)?,
        });
    }
    Ok(UpsertResult {
        affected: executed.affected,
        rows,
    })
}
