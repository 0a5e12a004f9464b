//! Compiled statements.

use chrono::{DateTime, Utc};

use crate::schema::ColumnSpec;

/// Column alias carrying the inserted/updated marker of an upsert.
pub const INSERTED_COLUMN: &str = "_oxide_bulk_inserted";

/// Column alias carrying `merge_action()` of a merge.
pub const ACTION_COLUMN: &str = "_oxide_bulk_action";

/// A positional parameter as handed to the driver.
///
/// Values whose native binding already has the column's type are bound
/// natively; everything else travels as text and is cast by the statement.
#[derive(Debug, Clone, PartialEq)]
pub enum BindValue {
    /// Untyped NULL, always wrapped in a cast.
    Null,
    /// `boolean`.
    Bool(bool),
    /// `bigint`.
    Int(i64),
    /// `double precision`.
    Float(f64),
    /// `text`, or the text form of a value cast to its column type.
    Text(String),
    /// `bytea`.
    Blob(Vec<u8>),
    /// `timestamptz`.
    Timestamp(DateTime<Utc>),
    /// `text[]` carrying one column of an unnested batch.
    TextArray(Vec<Option<String>>),
}

/// Extra marker column a statement appends after its returned columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusColumn {
    /// No marker.
    None,
    /// Boolean [`INSERTED_COLUMN`], true for freshly inserted rows.
    Inserted,
    /// Text [`ACTION_COLUMN`] holding `INSERT`, `UPDATE` or `DELETE`.
    MergeAction,
}

/// A single SQL statement with its parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    /// SQL text with `$n` placeholders.
    pub sql: String,
    /// Parameters, in placeholder order.
    pub params: Vec<BindValue>,
    /// Columns returned as text, in order, before the status column.
    pub returning: Vec<ColumnSpec>,
    /// Marker column returned last, if any.
    pub status: StatusColumn,
    /// Number of input rows the statement carries.
    pub row_count: usize,
}

impl Statement {
    /// Returns whether executing the statement produces result rows.
    #[must_use]
    pub fn returns_rows(&self) -> bool {
        !self.returning.is_empty() || self.status != StatusColumn::None
    }
}
