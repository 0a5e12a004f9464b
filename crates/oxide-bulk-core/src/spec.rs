//! Caller-supplied operation settings.

use serde::{Deserialize, Serialize};

use crate::dialect::MERGE_RETURNING_VERSION;
use crate::error::{BulkError, Result};
use crate::schema::{ColumnSpec, TableDescriptor};

/// PostgreSQL's limit on bind parameters in one statement.
pub const MAX_BIND_PARAMS: usize = 65_535;

/// Which target columns a statement hands back.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Returning {
    /// Return nothing but what categorization needs.
    #[default]
    None,
    /// Return every column of the table.
    All,
    /// Return the listed columns.
    Columns(Vec<String>),
}

impl Returning {
    /// Resolves the returned columns against the descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`BulkError::UnknownColumn`] for unknown names.
    pub fn resolve(&self, table: &TableDescriptor) -> Result<Vec<ColumnSpec>> {
        match self {
            Self::None => Ok(Vec::new()),
            Self::All => Ok(table.columns.clone()),
            Self::Columns(names) => names
                .iter()
                .map(|name| table.require_column(name).cloned())
                .collect(),
        }
    }
}

/// Settings of an update, upsert or copy-upsert.
///
/// # Example
///
/// ```rust
/// use oxide_bulk_core::OperationSpec;
///
/// let spec = OperationSpec::matching(&["sku"])
///     .update_fields(&["price", "qty"])
///     .ignore_unchanged(true)
///     .track_categorization(true);
/// assert_eq!(spec.match_fields, vec!["sku"]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationSpec {
    /// Columns identifying "the same row".
    pub match_fields: Vec<String>,
    /// Columns to write. `None` means every populated column except the
    /// match fields. For upserts an empty list means `DO NOTHING`.
    #[serde(default)]
    pub update_fields: Option<Vec<String>>,
    /// Skip writes whose values are not distinct from the stored ones.
    #[serde(default)]
    pub ignore_unchanged: bool,
    /// Report, per row, whether it was inserted or updated.
    #[serde(default)]
    pub track_categorization: bool,
    /// Target columns to return.
    #[serde(default)]
    pub returning: Returning,
}

impl OperationSpec {
    /// Creates a spec matching rows on the given fields.
    #[must_use]
    pub fn matching(fields: &[&str]) -> Self {
        Self {
            match_fields: fields.iter().map(|f| String::from(*f)).collect(),
            ..Self::default()
        }
    }

    /// Restricts the written columns.
    #[must_use]
    pub fn update_fields(mut self, fields: &[&str]) -> Self {
        self.update_fields = Some(fields.iter().map(|f| String::from(*f)).collect());
        self
    }

    /// Enables or disables the change filter.
    #[must_use]
    pub const fn ignore_unchanged(mut self, enabled: bool) -> Self {
        self.ignore_unchanged = enabled;
        self
    }

    /// Enables or disables inserted/updated categorization.
    #[must_use]
    pub const fn track_categorization(mut self, enabled: bool) -> Self {
        self.track_categorization = enabled;
        self
    }

    /// Sets the returned columns.
    #[must_use]
    pub fn returning(mut self, returning: Returning) -> Self {
        self.returning = returning;
        self
    }

    /// Checks that every named field exists, before looking at any row.
    pub(crate) fn check(&self, table: &TableDescriptor, operation: &'static str) -> Result<()> {
        if self.match_fields.is_empty() {
            return Err(BulkError::NoMatchFields { operation });
        }
        check_fields(table, &self.match_fields)?;
        if let Some(fields) = &self.update_fields {
            check_fields(table, fields)?;
        }
        self.returning.resolve(table)?;
        Ok(())
    }
}

/// Statement compilation settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompileOptions {
    /// Above this many parameters the encoder switches to unnested arrays.
    pub max_params: usize,
    /// Target `server_version_num`.
    pub server_version: u32,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            max_params: MAX_BIND_PARAMS,
            server_version: MERGE_RETURNING_VERSION,
        }
    }
}

pub(crate) fn check_fields(table: &TableDescriptor, fields: &[String]) -> Result<()> {
    for field in fields {
        table.require_column(field)?;
    }
    Ok(())
}

/// Resolves the write set against the populated batch columns.
///
/// Explicit fields must be populated; the default is every populated column
/// outside `match_fields`.
pub(crate) fn resolve_update_fields<'a>(
    explicit: Option<&[String]>,
    match_fields: &[String],
    columns: &[&'a ColumnSpec],
) -> Result<Vec<&'a ColumnSpec>> {
    match explicit {
        Some(fields) => fields
            .iter()
            .map(|field| populated(columns, field))
            .collect(),
        None => Ok(columns
            .iter()
            .copied()
            .filter(|c| !match_fields.contains(&c.name))
            .collect()),
    }
}

/// Finds a populated column, failing as a missing value otherwise.
pub(crate) fn populated<'a>(columns: &[&'a ColumnSpec], field: &str) -> Result<&'a ColumnSpec> {
    columns
        .iter()
        .copied()
        .find(|c| c.name == field)
        .ok_or_else(|| BulkError::Encoding {
            row: 0,
            column: field.to_string(),
            reason: String::from("column is required but not populated in the rows"),
        })
}
