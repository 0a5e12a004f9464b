//! Shared state and SQL fragments of the bulk compilers.
//!
//! The operation-specific entry points live in their own modules
//! ([`update`](crate::update), [`upsert`](crate::upsert),
//! [`merge`](crate::merge), [`copy`](crate::copy)) as `impl Compiler` blocks.

use crate::dialect::{Dialect, PostgresDialect};
use crate::encode::batch_columns;
use crate::error::Result;
use crate::schema::{ColumnSpec, Row, TableDescriptor};
use crate::spec::{populated, CompileOptions};
use crate::statement::{StatusColumn, ACTION_COLUMN, INSERTED_COLUMN};

/// Alias of the table being written.
pub const TARGET: &str = "target";

/// Alias of the incoming rows.
pub const SOURCE: &str = "source";

/// Alias PostgreSQL gives the proposed row inside `ON CONFLICT DO UPDATE`.
pub const EXCLUDED: &str = "EXCLUDED";

/// Compiles bulk statements against one table.
///
/// A compiler holds no mutable state; every call produces an independent
/// statement.
///
/// # Example
///
/// ```rust
/// use oxide_bulk_core::{ColumnSpec, Compiler, OperationSpec, Row, TableDescriptor};
///
/// let items = TableDescriptor::new("items")
///     .column(ColumnSpec::new("id", "bigint").not_null())
///     .column(ColumnSpec::new("qty", "bigint"))
///     .primary_key(&["id"]);
/// let rows = vec![Row::new().set("id", 1_i64).set("qty", 5_i64)];
///
/// let statement = Compiler::new(&items)
///     .update(&rows, &OperationSpec::matching(&["id"]))
///     .unwrap()
///     .unwrap();
/// assert_eq!(
///     statement.sql,
///     "UPDATE \"items\" AS target SET \"qty\" = source.\"qty\" \
///      FROM (VALUES ($1, $2)) AS source (\"id\", \"qty\") \
///      WHERE target.\"id\" = source.\"id\""
/// );
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Compiler<'a> {
    pub(crate) table: &'a TableDescriptor,
    pub(crate) dialect: PostgresDialect,
    pub(crate) max_params: usize,
}

impl<'a> Compiler<'a> {
    /// Creates a compiler with default options.
    #[must_use]
    pub fn new(table: &'a TableDescriptor) -> Self {
        Self::with_options(table, CompileOptions::default())
    }

    /// Creates a compiler with explicit options.
    #[must_use]
    pub const fn with_options(table: &'a TableDescriptor, options: CompileOptions) -> Self {
        Self {
            table,
            dialect: PostgresDialect::new(options.server_version),
            max_params: options.max_params,
        }
    }

    /// Returns the target table.
    #[must_use]
    pub const fn table(&self) -> &'a TableDescriptor {
        self.table
    }

    /// Returns the dialect.
    #[must_use]
    pub const fn dialect(&self) -> &PostgresDialect {
        &self.dialect
    }

    /// Validates the descriptor and resolves the batch columns.
    pub(crate) fn batch(&self, rows: &[Row]) -> Result<Vec<&'a ColumnSpec>> {
        self.table.validate()?;
        batch_columns(self.table, rows)
    }

    /// Resolves fields that must be populated in the batch.
    pub(crate) fn populated_fields(
        columns: &[&'a ColumnSpec],
        fields: &[String],
    ) -> Result<Vec<&'a ColumnSpec>> {
        fields.iter().map(|field| populated(columns, field)).collect()
    }

    /// Joins `target` and `source` on `fields`.
    pub(crate) fn match_condition(&self, fields: &[&ColumnSpec], null_safe: bool) -> String {
        let operator = if null_safe { "IS NOT DISTINCT FROM" } else { "=" };
        fields
            .iter()
            .map(|c| {
                format!(
                    "{} {operator} {}",
                    self.qualified(TARGET, &c.name),
                    self.qualified(SOURCE, &c.name)
                )
            })
            .collect::<Vec<_>>()
            .join(" AND ")
    }

    pub(crate) fn quote(&self, name: &str) -> String {
        self.dialect.quote_identifier(name)
    }

    pub(crate) fn table_sql(&self) -> String {
        self.table.qualified_name(&self.dialect)
    }

    pub(crate) fn column_list(&self, columns: &[&ColumnSpec]) -> String {
        columns
            .iter()
            .map(|c| self.quote(&c.name))
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub(crate) fn qualified(&self, alias: &str, column: &str) -> String {
        format!("{alias}.{}", self.quote(column))
    }

    /// Builds ` RETURNING ...`, or an empty string when nothing is returned.
    ///
    /// Columns come back as text so they decode through the same codec that
    /// encoded them.
    pub(crate) fn returning_clause(&self, columns: &[ColumnSpec], status: StatusColumn) -> String {
        let mut items: Vec<String> = columns
            .iter()
            .map(|c| {
                format!(
                    "CAST({} AS text) AS {}",
                    self.qualified(TARGET, &c.name),
                    self.quote(&c.name)
                )
            })
            .collect();
        match status {
            StatusColumn::None => {}
            StatusColumn::Inserted => {
                items.push(format!("({TARGET}.xmax = 0) AS {}", self.quote(INSERTED_COLUMN)));
            }
            StatusColumn::MergeAction => {
                items.push(format!("merge_action() AS {}", self.quote(ACTION_COLUMN)));
            }
        }
        if items.is_empty() {
            String::new()
        } else {
            format!(" RETURNING {}", items.join(", "))
        }
    }
}
