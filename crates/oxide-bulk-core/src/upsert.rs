//! Bulk INSERT ... ON CONFLICT.
//!
//! Categorization reads the `xmax` system column of each returned tuple: a
//! tuple created by this statement has none, a tuple updated through
//! `DO UPDATE` carries the id of the updating transaction. That holds under
//! concurrent writers, unlike comparing against keys known beforehand.

use crate::compiler::{Compiler, EXCLUDED, TARGET};
use crate::error::{BulkError, Result};
use crate::schema::{ColumnSpec, Row, TableDescriptor};
use crate::spec::{resolve_update_fields, OperationSpec};
use crate::statement::{BindValue, Statement, StatusColumn};

impl<'a> Compiler<'a> {
    /// Compiles one `INSERT ... VALUES ... ON CONFLICT` statement for the batch.
    ///
    /// Returns `None` for an empty batch.
    ///
    /// # Errors
    ///
    /// Returns [`BulkError::InvalidConflictTarget`] when `match_fields` is not
    /// the primary key or a declared unique constraint, plus the errors of
    /// [`Compiler::update`].
    ///
    /// The batch must not repeat a conflict key. PostgreSQL fails such a
    /// statement with SQLSTATE 21000 ("ON CONFLICT DO UPDATE command cannot
    /// affect row a second time"); deduplicate the rows first.
    pub fn upsert(&self, rows: &[Row], spec: &OperationSpec) -> Result<Option<Statement>> {
        self.check_upsert(spec)?;
        let columns = self.batch(rows)?;
        if rows.is_empty() {
            return Ok(None);
        }
        let encoded = self.encode(rows, &columns)?;
        let insert = format!(
            "INSERT INTO {} AS {TARGET} ({}) {}",
            self.table_sql(),
            self.column_list(&columns),
            encoded.sql
        );
        self.finish_upsert(insert, &columns, encoded.params, encoded.row_count, spec)
            .map(Some)
    }

    /// Compiles the same upsert reading every row of `relation`, an
    /// unqualified table visible to the session such as a staging table.
    ///
    /// `columns` are the columns `relation` provides. The statement carries no
    /// parameters and a `row_count` of zero.
    ///
    /// # Errors
    ///
    /// See [`Compiler::upsert`].
    pub fn upsert_from(
        &self,
        relation: &str,
        columns: &[&'a ColumnSpec],
        spec: &OperationSpec,
    ) -> Result<Statement> {
        self.check_upsert(spec)?;
        self.table.validate()?;
        let list = self.column_list(columns);
        let insert = format!(
            "INSERT INTO {} AS {TARGET} ({list}) SELECT {list} FROM {}",
            self.table_sql(),
            self.quote(relation)
        );
        self.finish_upsert(insert, columns, Vec::new(), 0, spec)
    }

    fn check_upsert(&self, spec: &OperationSpec) -> Result<()> {
        spec.check(self.table, "upsert")?;
        if !self.table.is_conflict_target(&spec.match_fields) {
            return Err(BulkError::InvalidConflictTarget {
                table: self.table.name.clone(),
                fields: spec.match_fields.join(", "),
            });
        }
        Ok(())
    }

    fn finish_upsert(
        &self,
        mut sql: String,
        columns: &[&'a ColumnSpec],
        params: Vec<BindValue>,
        row_count: usize,
        spec: &OperationSpec,
    ) -> Result<Statement> {
        let match_columns = Self::populated_fields(columns, &spec.match_fields)?;
        let update_columns =
            resolve_update_fields(spec.update_fields.as_deref(), &spec.match_fields, columns)?;

        sql.push_str(&format!(" ON CONFLICT ({})", self.column_list(&match_columns)));
        if update_columns.is_empty() {
            sql.push_str(" DO NOTHING");
        } else {
            let set = self.build_set_clause(&update_columns, spec.ignore_unchanged, EXCLUDED);
            sql.push_str(" DO UPDATE SET ");
            sql.push_str(&set.assignments);
            if let Some(guard) = set.guard {
                sql.push_str(" WHERE ");
                sql.push_str(&guard);
            }
        }

        let returning = spec.returning.resolve(self.table)?;
        let status = if spec.track_categorization {
            StatusColumn::Inserted
        } else {
            StatusColumn::None
        };
        sql.push_str(&self.returning_clause(&returning, status));

        Ok(Statement {
            sql,
            params,
            returning,
            status,
            row_count,
        })
    }
}

/// Compiles a bulk upsert with default options.
///
/// # Errors
///
/// See [`Compiler::upsert`].
pub fn compile_upsert(
    table: &TableDescriptor,
    rows: &[Row],
    spec: &OperationSpec,
) -> Result<Option<Statement>> {
    Compiler::new(table).upsert(rows, spec)
}

/// Compiles a bulk upsert reading from another relation, with default options.
///
/// # Errors
///
/// See [`Compiler::upsert_from`].
pub fn compile_upsert_from(
    table: &TableDescriptor,
    relation: &str,
    columns: &[&ColumnSpec],
    spec: &OperationSpec,
) -> Result<Statement> {
    Compiler::new(table).upsert_from(relation, columns, spec)
}
