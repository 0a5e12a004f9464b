//! Results of bulk operations.

use oxide_bulk_core::Row;

/// Outcome of a bulk update.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateResult {
    /// Rows actually written.
    pub affected: u64,
    /// Returned target rows, when the operation asked for any.
    pub rows: Vec<Row>,
}

/// Whether an upserted row was created or changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RowStatus {
    /// The row did not exist and was inserted.
    Inserted,
    /// The row existed and was updated.
    Updated,
}

/// One row written by an upsert.
#[derive(Debug, Clone, PartialEq)]
pub struct UpsertedRow {
    /// Categorization, when tracked.
    pub status: Option<RowStatus>,
    /// Returned columns.
    pub values: Row,
}

/// Outcome of a bulk upsert.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpsertResult {
    /// Rows inserted or updated. Conflicting rows skipped by `DO NOTHING` or
    /// by the change filter are not counted.
    pub affected: u64,
    /// One entry per written row when categorization or returning was
    /// requested, in server order.
    pub rows: Vec<UpsertedRow>,
}

impl UpsertResult {
    /// Returns the rows categorized as inserted.
    pub fn inserted(&self) -> impl Iterator<Item = &UpsertedRow> {
        self.with_status(RowStatus::Inserted)
    }

    /// Returns the rows categorized as updated.
    pub fn updated(&self) -> impl Iterator<Item = &UpsertedRow> {
        self.with_status(RowStatus::Updated)
    }

    fn with_status(&self, status: RowStatus) -> impl Iterator<Item = &UpsertedRow> {
        self.rows.iter().filter(move |row| row.status == Some(status))
    }
}

/// What `MERGE` did to a row, as reported by `merge_action()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MergeOutcome {
    /// A `WHEN NOT MATCHED ... INSERT` fired.
    Inserted,
    /// A `WHEN MATCHED ... UPDATE` fired.
    Updated,
    /// A `DELETE` fired.
    Deleted,
}

impl MergeOutcome {
    /// Parses the text returned by `merge_action()`.
    #[must_use]
    pub fn from_action(action: &str) -> Option<Self> {
        match action {
            "INSERT" => Some(Self::Inserted),
            "UPDATE" => Some(Self::Updated),
            "DELETE" => Some(Self::Deleted),
            _ => None,
        }
    }
}

/// One row touched by a merge.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedRow {
    /// Action taken on the row.
    pub outcome: MergeOutcome,
    /// Returned columns.
    pub values: Row,
}

/// Outcome of a merge.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeResult {
    /// Rows inserted, updated or deleted.
    pub affected: u64,
    /// Returned rows, when the merge asked for any.
    pub rows: Vec<MergedRow>,
}

impl MergeResult {
    /// Returns the inserted rows.
    pub fn created(&self) -> impl Iterator<Item = &MergedRow> {
        self.with_outcome(MergeOutcome::Inserted)
    }

    /// Returns the updated rows.
    pub fn updated(&self) -> impl Iterator<Item = &MergedRow> {
        self.with_outcome(MergeOutcome::Updated)
    }

    /// Returns the deleted rows.
    pub fn deleted(&self) -> impl Iterator<Item = &MergedRow> {
        self.with_outcome(MergeOutcome::Deleted)
    }

    fn with_outcome(&self, outcome: MergeOutcome) -> impl Iterator<Item = &MergedRow> {
        self.rows.iter().filter(move |row| row.outcome == outcome)
    }
}

/// Outcome of a staged COPY upsert.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CopyUpsertResult {
    /// Rows streamed into the staging table.
    pub copied: u64,
    /// Result of folding the staged rows into the target.
    pub upsert: UpsertResult,
}
