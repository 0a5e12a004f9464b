//! Chained conditional MERGE.
//!
//! A [`MergeChain`] is an ordered list of `WHEN` clauses. PostgreSQL tries
//! them top to bottom and fires only the first one whose match state and
//! predicate hold for a row, so the chain is emitted exactly as declared.
//! Predicates that overlap are not diagnosed: which clause wins is decided
//! by position, and choosing the order is up to the caller.
//!
//! A clause without a predicate matches every row of its state, so it must
//! be the last clause of that state: PostgreSQL rejects any `WHEN MATCHED`
//! clause after an unconditional `WHEN MATCHED`, and likewise for the two
//! `NOT MATCHED` states, with SQLSTATE 42601 ("unreachable WHEN clause").
//! Reorder such chains or give the earlier clause a predicate.
//!
//! Predicates are raw SQL over `target` and `source` and are embedded
//! verbatim. They must come from trusted code, never from row data.

use serde::{Deserialize, Serialize};

use crate::compiler::{Compiler, SOURCE, TARGET};
use crate::dialect::{Dialect, MERGE_RETURNING_VERSION, MERGE_VERSION};
use crate::error::{BulkError, Result};
use crate::schema::{ColumnSpec, Row, TableDescriptor};
use crate::spec::{check_fields, populated, resolve_update_fields, Returning};
use crate::statement::{Statement, StatusColumn};

/// Match state a clause applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeWhen {
    /// A source row joined a target row.
    Matched,
    /// A source row joined no target row.
    NotMatched,
    /// A target row was joined by no source row (PostgreSQL 17).
    NotMatchedBySource,
}

impl MergeWhen {
    /// Returns the SQL keywords following `WHEN`.
    #[must_use]
    pub const fn sql(self) -> &'static str {
        match self {
            Self::Matched => "MATCHED",
            Self::NotMatched => "NOT MATCHED",
            Self::NotMatchedBySource => "NOT MATCHED BY SOURCE",
        }
    }
}

/// Action of a clause.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MergeAction {
    /// Insert the source row. `None` inserts every populated column.
    Insert {
        /// Columns to insert.
        #[serde(default)]
        columns: Option<Vec<String>>,
    },
    /// Update the target row from the source row. `None` writes the whole
    /// allowed update set.
    Update {
        /// Columns to write.
        #[serde(default)]
        fields: Option<Vec<String>>,
    },
    /// Delete the target row.
    Delete,
    /// Skip the row.
    DoNothing,
}

impl MergeAction {
    /// Inserts every populated column.
    #[must_use]
    pub const fn insert() -> Self {
        Self::Insert { columns: None }
    }

    /// Writes the whole allowed update set.
    #[must_use]
    pub const fn update() -> Self {
        Self::Update { fields: None }
    }

    /// Writes the given fields.
    #[must_use]
    pub fn update_fields(fields: &[&str]) -> Self {
        Self::Update {
            fields: Some(fields.iter().map(|f| String::from(*f)).collect()),
        }
    }

    const fn keyword(&self) -> &'static str {
        match self {
            Self::Insert { .. } => "INSERT",
            Self::Update { .. } => "UPDATE",
            Self::Delete => "DELETE",
            Self::DoNothing => "DO NOTHING",
        }
    }

    const fn allowed_in(&self, when: MergeWhen) -> bool {
        matches!(
            (when, self),
            (MergeWhen::Matched, Self::Update { .. } | Self::Delete | Self::DoNothing)
                | (MergeWhen::NotMatched, Self::Insert { .. } | Self::DoNothing)
                | (MergeWhen::NotMatchedBySource, Self::Delete | Self::DoNothing)
        )
    }
}

/// One `WHEN ... [AND ...] THEN ...` clause.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeClause {
    /// Match state.
    pub when: MergeWhen,
    /// Additional SQL condition over `target` and `source`.
    #[serde(default)]
    pub extra_predicate: Option<String>,
    /// Action to take.
    pub action: MergeAction,
}

/// Ordered merge clauses.
///
/// # Example
///
/// ```rust
/// use oxide_bulk_core::{MergeAction, MergeChain};
///
/// let chain = MergeChain::new()
///     .matched_and("source.\"version\" > target.\"version\"", MergeAction::update())
///     .matched(MergeAction::DoNothing)
///     .not_matched(MergeAction::insert());
/// assert_eq!(chain.len(), 3);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MergeChain {
    clauses: Vec<MergeClause>,
}

impl MergeChain {
    /// Creates an empty chain.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a clause.
    #[must_use]
    pub fn push(mut self, clause: MergeClause) -> Self {
        self.clauses.push(clause);
        self
    }

    /// Appends `WHEN MATCHED THEN <action>`.
    #[must_use]
    pub fn matched(self, action: MergeAction) -> Self {
        self.when(MergeWhen::Matched, None, action)
    }

    /// Appends `WHEN MATCHED AND <predicate> THEN <action>`.
    #[must_use]
    pub fn matched_and(self, predicate: impl Into<String>, action: MergeAction) -> Self {
        self.when(MergeWhen::Matched, Some(predicate.into()), action)
    }

    /// Appends `WHEN NOT MATCHED THEN <action>`.
    #[must_use]
    pub fn not_matched(self, action: MergeAction) -> Self {
        self.when(MergeWhen::NotMatched, None, action)
    }

    /// Appends `WHEN NOT MATCHED AND <predicate> THEN <action>`.
    #[must_use]
    pub fn not_matched_and(self, predicate: impl Into<String>, action: MergeAction) -> Self {
        self.when(MergeWhen::NotMatched, Some(predicate.into()), action)
    }

    /// Appends `WHEN NOT MATCHED BY SOURCE THEN <action>`.
    #[must_use]
    pub fn not_matched_by_source(self, action: MergeAction) -> Self {
        self.when(MergeWhen::NotMatchedBySource, None, action)
    }

    fn when(self, when: MergeWhen, extra_predicate: Option<String>, action: MergeAction) -> Self {
        self.push(MergeClause {
            when,
            extra_predicate,
            action,
        })
    }

    /// Returns the clauses in evaluation order.
    #[must_use]
    pub fn clauses(&self) -> &[MergeClause] {
        &self.clauses
    }

    /// Returns the number of clauses.
    #[must_use]
    pub fn len(&self) -> usize {
        self.clauses.len()
    }

    /// Returns whether the chain has no clauses.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }
}

impl From<Vec<MergeClause>> for MergeChain {
    fn from(clauses: Vec<MergeClause>) -> Self {
        Self { clauses }
    }
}

/// How source rows join the target and which columns updates may write.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeSpec {
    /// Columns joining `source` to `target`.
    pub match_fields: Vec<String>,
    /// Join with `IS NOT DISTINCT FROM` so NULL keys match each other.
    #[serde(default)]
    pub null_safe_match: bool,
    /// Columns UPDATE actions may write. `None` means every populated column
    /// except the match fields.
    #[serde(default)]
    pub update_fields: Option<Vec<String>>,
    /// Target columns to return with `merge_action()` (PostgreSQL 17).
    #[serde(default)]
    pub returning: Returning,
}

impl MergeSpec {
    /// Creates a spec joining on the given fields.
    #[must_use]
    pub fn matching(fields: &[&str]) -> Self {
        Self {
            match_fields: fields.iter().map(|f| String::from(*f)).collect(),
            ..Self::default()
        }
    }

    /// Enables NULL-safe matching.
    #[must_use]
    pub const fn null_safe_match(mut self, enabled: bool) -> Self {
        self.null_safe_match = enabled;
        self
    }

    /// Restricts the columns UPDATE actions may write.
    #[must_use]
    pub fn update_fields(mut self, fields: &[&str]) -> Self {
        self.update_fields = Some(fields.iter().map(|f| String::from(*f)).collect());
        self
    }

    /// Sets the returned columns.
    #[must_use]
    pub fn returning(mut self, returning: Returning) -> Self {
        self.returning = returning;
        self
    }
}

impl Compiler<'_> {
    /// Compiles one `MERGE INTO ... USING (VALUES ...)` statement.
    ///
    /// Returns `None` for an empty batch. When `spec.returning` is set the
    /// statement also returns `merge_action()` per affected row.
    ///
    /// # Errors
    ///
    /// Returns [`BulkError::Unsupported`] when the configured server lacks a
    /// feature, [`BulkError::EmptyChain`], [`BulkError::NoMatchFields`],
    /// [`BulkError::InvalidMergeAction`] for actions the match state does not
    /// allow, [`BulkError::ConflictingAction`] for updates outside the allowed
    /// set, plus unknown-column and encoding errors.
    pub fn merge(
        &self,
        rows: &[Row],
        spec: &MergeSpec,
        chain: &MergeChain,
    ) -> Result<Option<Statement>> {
        self.check_merge(spec, chain)?;
        let columns = self.batch(rows)?;
        if rows.is_empty() {
            return Ok(None);
        }

        let match_columns = Self::populated_fields(&columns, &spec.match_fields)?;
        let allowed =
            resolve_update_fields(spec.update_fields.as_deref(), &spec.match_fields, &columns)?;
        let whens = chain
            .clauses()
            .iter()
            .enumerate()
            .map(|(index, clause)| self.merge_clause(index, clause, &columns, &allowed))
            .collect::<Result<Vec<_>>>()?;

        let encoded = self.encode(rows, &columns)?;
        let mut sql = format!(
            "MERGE INTO {} AS {TARGET} USING {} ON {} {}",
            self.table_sql(),
            self.source_relation(&encoded),
            self.match_condition(&match_columns, spec.null_safe_match),
            whens.join(" ")
        );
        let returning = spec.returning.resolve(self.table)?;
        let status = if spec.returning == Returning::None {
            StatusColumn::None
        } else {
            StatusColumn::MergeAction
        };
        sql.push_str(&self.returning_clause(&returning, status));

        Ok(Some(Statement {
            sql,
            params: encoded.params,
            returning,
            status,
            row_count: encoded.row_count,
        }))
    }

    /// Checks everything that does not depend on the rows.
    fn check_merge(&self, spec: &MergeSpec, chain: &MergeChain) -> Result<()> {
        let version = self.dialect.server_version();
        let unsupported = |feature, required| BulkError::Unsupported {
            feature,
            required,
            configured: version,
        };
        if !self.dialect.supports_merge() {
            return Err(unsupported("MERGE", MERGE_VERSION));
        }
        if spec.match_fields.is_empty() {
            return Err(BulkError::NoMatchFields { operation: "merge" });
        }
        check_fields(self.table, &spec.match_fields)?;
        if let Some(fields) = &spec.update_fields {
            check_fields(self.table, fields)?;
        }
        spec.returning.resolve(self.table)?;
        if spec.returning != Returning::None && !self.dialect.supports_merge_returning() {
            return Err(unsupported("MERGE ... RETURNING", MERGE_RETURNING_VERSION));
        }
        if chain.is_empty() {
            return Err(BulkError::EmptyChain);
        }

        for (index, clause) in chain.clauses().iter().enumerate() {
            if !clause.action.allowed_in(clause.when) {
                return Err(BulkError::InvalidMergeAction {
                    clause: index,
                    when: clause.when.sql(),
                    action: clause.action.keyword(),
                });
            }
            if clause.when == MergeWhen::NotMatchedBySource
                && !self.dialect.supports_merge_returning()
            {
                return Err(unsupported("WHEN NOT MATCHED BY SOURCE", MERGE_RETURNING_VERSION));
            }
            match &clause.action {
                MergeAction::Insert { columns: Some(names) }
                | MergeAction::Update { fields: Some(names) } => {
                    check_fields(self.table, names)?;
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn merge_clause(
        &self,
        index: usize,
        clause: &MergeClause,
        columns: &[&ColumnSpec],
        allowed: &[&ColumnSpec],
    ) -> Result<String> {
        let action = match &clause.action {
            MergeAction::Insert { columns: names } => {
                let inserted = match names {
                    Some(names) => names
                        .iter()
                        .map(|name| populated(columns, name))
                        .collect::<Result<Vec<_>>>()?,
                    None => columns.to_vec(),
                };
                let values = inserted
                    .iter()
                    .map(|c| self.qualified(SOURCE, &c.name))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("INSERT ({}) VALUES ({values})", self.column_list(&inserted))
            }
            MergeAction::Update { fields } => {
                let written: Vec<&ColumnSpec> = match fields {
                    Some(names) => names
                        .iter()
                        .map(|name| {
                            allowed.iter().copied().find(|c| &c.name == name).ok_or_else(|| {
                                BulkError::ConflictingAction {
                                    clause: index,
                                    column: name.clone(),
                                }
                            })
                        })
                        .collect::<Result<_>>()?,
                    None => allowed.to_vec(),
                };
                if written.is_empty() {
                    return Err(BulkError::NoUpdateFields {
                        table: self.table.name.clone(),
                    });
                }
                let set = self.build_set_clause(&written, false, SOURCE);
                format!("UPDATE SET {}", set.assignments)
            }
            MergeAction::Delete => String::from("DELETE"),
            MergeAction::DoNothing => String::from("DO NOTHING"),
        };
        let predicate = clause
            .extra_predicate
            .as_deref()
            .map(|p| format!(" AND ({p})"))
            .unwrap_or_default();
        Ok(format!("WHEN {}{predicate} THEN {action}", clause.when.sql()))
    }
}

/// Compiles a merge with default options.
///
/// # Errors
///
/// See [`Compiler::merge`].
pub fn compile_merge(
    table: &TableDescriptor,
    rows: &[Row],
    spec: &MergeSpec,
    chain: &MergeChain,
) -> Result<Option<Statement>> {
    Compiler::new(table).merge(rows, spec, chain)
}
