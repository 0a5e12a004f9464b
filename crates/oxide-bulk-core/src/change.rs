//! Change filter.
//!
//! Assignments always take the incoming value. With `ignore_unchanged` the
//! write also carries a row guard built from `IS DISTINCT FROM`, which treats
//! NULL against NULL as equal and NULL against a value as different. The
//! guard goes wherever the statement filters its writes, never into the
//! match condition, so unchanged rows still match but are neither written
//! nor counted.

use crate::compiler::{Compiler, SOURCE, TARGET};
use crate::error::Result;
use crate::schema::ColumnSpec;

/// The `SET` list of a write and its optional change guard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetClause {
    /// `"a" = source."a", ...`
    pub assignments: String,
    /// `(target."a", ...) IS DISTINCT FROM (source."a", ...)`, when filtering.
    pub guard: Option<String>,
}

impl Compiler<'_> {
    /// Builds the assignments of `update_fields` read from `source_alias`.
    #[must_use]
    pub fn build_set_clause(
        &self,
        update_fields: &[&ColumnSpec],
        ignore_unchanged: bool,
        source_alias: &str,
    ) -> SetClause {
        let assignments = update_fields
            .iter()
            .map(|c| format!("{} = {}", self.quote(&c.name), self.qualified(source_alias, &c.name)))
            .collect::<Vec<_>>()
            .join(", ");
        let guard = if ignore_unchanged {
            self.distinct_guard(update_fields, source_alias)
        } else {
            None
        };
        SetClause { assignments, guard }
    }

    /// Returns the NULL-safe "any field differs" predicate, or `None` when
    /// there are no fields.
    #[must_use]
    pub fn distinct_guard(&self, fields: &[&ColumnSpec], source_alias: &str) -> Option<String> {
        if fields.is_empty() {
            return None;
        }
        let side = |alias: &str| {
            fields
                .iter()
                .map(|c| self.qualified(alias, &c.name))
                .collect::<Vec<_>>()
                .join(", ")
        };
        Some(format!(
            "({}) IS DISTINCT FROM ({})",
            side(TARGET),
            side(source_alias)
        ))
    }

    /// Builds a merge predicate that holds when any of `fields` differs
    /// between `target` and `source`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::BulkError::UnknownColumn`] for unknown fields.
    pub fn changed_predicate(&self, fields: &[&str]) -> Result<String> {
        let columns = fields
            .iter()
            .map(|field| self.table.require_column(field))
            .collect::<Result<Vec<_>>>()?;
        Ok(self
            .distinct_guard(&columns, SOURCE)
            .unwrap_or_else(|| String::from("false")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::EXCLUDED;
    use crate::schema::TableDescriptor;
    use crate::BulkError;

    fn table() -> TableDescriptor {
        TableDescriptor::new("items")
            .column(ColumnSpec::new("id", "integer"))
            .column(ColumnSpec::new("price", "numeric"))
            .column(ColumnSpec::new("qty", "integer"))
    }

    #[test]
    fn test_unconditional_assignments() {
        let table = table();
        let fields: Vec<&ColumnSpec> = table.columns[1..].iter().collect();
        let clause = Compiler::new(&table).build_set_clause(&fields, false, SOURCE);
        assert_eq!(clause.assignments, "\"price\" = source.\"price\", \"qty\" = source.\"qty\"");
        assert_eq!(clause.guard, None);
    }

    #[test]
    fn test_guarded_assignments() {
        let table = table();
        let fields: Vec<&ColumnSpec> = table.columns[1..].iter().collect();
        let clause = Compiler::new(&table).build_set_clause(&fields, true, EXCLUDED);
        assert_eq!(clause.assignments, "\"price\" = EXCLUDED.\"price\", \"qty\" = EXCLUDED.\"qty\"");
        assert_eq!(
            clause.guard.as_deref(),
            Some(
                "(target.\"price\", target.\"qty\") IS DISTINCT FROM \
                 (EXCLUDED.\"price\", EXCLUDED.\"qty\")"
            )
        );
    }

    #[test]
    fn test_changed_predicate() {
        let table = table();
        let compiler = Compiler::new(&table);
        assert_eq!(
            compiler.changed_predicate(&["qty"]).unwrap(),
            "(target.\"qty\") IS DISTINCT FROM (source.\"qty\")"
        );
        assert_eq!(compiler.changed_predicate(&[]).unwrap(), "false");
        assert!(matches!(
            compiler.changed_predicate(&["colour"]),
            Err(BulkError::UnknownColumn { .. })
        ));
    }
}
