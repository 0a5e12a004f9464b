//! Bulk UPDATE.

use crate::compiler::{Compiler, SOURCE, TARGET};
use crate::error::{BulkError, Result};
use crate::schema::{Row, TableDescriptor};
use crate::spec::{resolve_update_fields, OperationSpec};
use crate::statement::{Statement, StatusColumn};

impl Compiler<'_> {
    /// Compiles one `UPDATE ... FROM (VALUES ...)` statement for the batch.
    ///
    /// Returns `None` for an empty batch. Under `ignore_unchanged` the change
    /// guard joins the `WHERE` clause, so rows whose values all equal the
    /// stored ones are left alone and not counted.
    ///
    /// # Errors
    ///
    /// Returns [`BulkError::NoMatchFields`], [`BulkError::UnknownColumn`],
    /// [`BulkError::NoUpdateFields`] or any encoding error.
    pub fn update(&self, rows: &[Row], spec: &OperationSpec) -> Result<Option<Statement>> {
        spec.check(self.table, "update")?;
        let columns = self.batch(rows)?;
        if rows.is_empty() {
            return Ok(None);
        }

        let match_columns = Self::populated_fields(&columns, &spec.match_fields)?;
        let update_columns =
            resolve_update_fields(spec.update_fields.as_deref(), &spec.match_fields, &columns)?;
        if update_columns.is_empty() {
            return Err(BulkError::NoUpdateFields {
                table: self.table.name.clone(),
            });
        }

        let encoded = self.encode(rows, &columns)?;
        let set = self.build_set_clause(&update_columns, spec.ignore_unchanged, SOURCE);
        let mut sql = format!(
            "UPDATE {} AS {TARGET} SET {} FROM {} WHERE {}",
            self.table_sql(),
            set.assignments,
            self.source_relation(&encoded),
            self.match_condition(&match_columns, false)
        );
        if let Some(guard) = set.guard {
            sql.push_str(" AND ");
            sql.push_str(&guard);
        }
        let returning = spec.returning.resolve(self.table)?;
        sql.push_str(&self.returning_clause(&returning, StatusColumn::None));

        Ok(Some(Statement {
            sql,
            params: encoded.params,
            returning,
            status: StatusColumn::None,
            row_count: encoded.row_count,
        }))
    }
}

/// Compiles a bulk update with default options.
///
/// # Errors
///
/// See [`Compiler::update`].
pub fn compile_update(
    table: &TableDescriptor,
    rows: &[Row],
    spec: &OperationSpec,
) -> Result<Option<Statement>> {
    Compiler::new(table).update(rows, spec)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ColumnSpec;
    use crate::spec::Returning;
    use crate::statement::BindValue;

    fn items() -> TableDescriptor {
        TableDescriptor::new("items")
            .column(ColumnSpec::new("id", "bigint").not_null())
            .column(ColumnSpec::new("sku", "text"))
            .column(ColumnSpec::new("price", "numeric(10,2)"))
            .column(ColumnSpec::new("qty", "integer"))
            .primary_key(&["id"])
    }

    #[test]
    fn test_update_statement_shape() {
        let rows = vec![
            Row::new().set("id", 1_i64).set("price", "9.50").set("qty", 3_i64),
            Row::new().set("id", 2_i64).set("price", "1.00").set("qty", 1_i64),
        ];
        let statement = compile_update(&items(), &rows, &OperationSpec::matching(&["id"]))
            .unwrap()
            .unwrap();
        assert_eq!(
            statement.sql,
            "UPDATE \"items\" AS target SET \"price\" = source.\"price\", \"qty\" = source.\"qty\" \
             FROM (VALUES ($1, CAST($2 AS numeric(10,2)), CAST($3 AS integer)), \
             ($4, CAST($5 AS numeric(10,2)), CAST($6 AS integer))) \
             AS source (\"id\", \"price\", \"qty\") \
             WHERE target.\"id\" = source.\"id\""
        );
        assert_eq!(statement.params.len(), 6);
        assert_eq!(statement.params[1], BindValue::Text("9.50".into()));
        assert_eq!(statement.row_count, 2);
        assert!(!statement.returns_rows());
    }

    #[test]
    fn test_update_ignore_unchanged_guards_where() {
        let rows = vec![Row::new().set("id", 1_i64).set("qty", 3_i64)];
        let spec = OperationSpec::matching(&["id"])
            .ignore_unchanged(true)
            .returning(Returning::Columns(vec!["id".into()]));
        let statement = compile_update(&items(), &rows, &spec).unwrap().unwrap();
        assert!(statement.sql.ends_with(
            "WHERE target.\"id\" = source.\"id\" \
             AND (target.\"qty\") IS DISTINCT FROM (source.\"qty\") \
             RETURNING CAST(target.\"id\" AS text) AS \"id\""
        ));
        assert!(statement.returns_rows());
    }

    #[test]
    fn test_update_explicit_fields() {
        let rows = vec![Row::new().set("id", 1_i64).set("sku", "A").set("qty", 3_i64)];
        let spec = OperationSpec::matching(&["id"]).update_fields(&["qty"]);
        let statement = compile_update(&items(), &rows, &spec).unwrap().unwrap();
        assert!(statement.sql.starts_with("UPDATE \"items\" AS target SET \"qty\" = source.\"qty\" FROM"));
    }

    #[test]
    fn test_update_empty_batch_is_noop() {
        let statement = compile_update(&items(), &[], &OperationSpec::matching(&["id"])).unwrap();
        assert!(statement.is_none());
    }

    #[test]
    fn test_update_errors() {
        let rows = vec![Row::new().set("id", 1_i64).set("qty", 3_i64)];
        assert_eq!(
            compile_update(&items(), &rows, &OperationSpec::default()),
            Err(BulkError::NoMatchFields { operation: "update" })
        );
        assert!(matches!(
            compile_update(&items(), &rows, &OperationSpec::matching(&["colour"])),
            Err(BulkError::UnknownColumn { .. })
        ));
        let only_key = vec![Row::new().set("id", 1_i64)];
        assert!(matches!(
            compile_update(&items(), &only_key, &OperationSpec::matching(&["id"])),
            Err(BulkError::NoUpdateFields { .. })
        ));
        let missing_key = vec![Row::new().set("qty", 1_i64)];
        assert!(matches!(
            compile_update(&items(), &missing_key, &OperationSpec::matching(&["id"])),
            Err(BulkError::Encoding { column, .. }) if column == "id"
        ));
    }
}
