//! Error types for statement compilation.
//!
//! Every error in this module is raised before any SQL reaches the
//! database. Engine-side failures belong to the executor crate.

use thiserror::Error;

/// Broad category of a [`BulkError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Bad field names, empty match sets, empty merge chains, mixed row shapes.
    Configuration,
    /// A value does not fit the column it is written to.
    Encoding,
    /// The match fields of an upsert are not a real unique constraint.
    ConflictTarget,
}

/// Errors raised while compiling a bulk statement.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BulkError {
    /// The operation was given no fields to match rows on.
    #[error("{operation} requires at least one match field")]
    NoMatchFields {
        /// Operation being compiled.
        operation: &'static str,
    },

    /// The resolved update field set is empty.
    #[error("no fields to update on table '{table}'")]
    NoUpdateFields {
        /// Target table.
        table: String,
    },

    /// A referenced column is not part of the table descriptor.
    #[error("column '{column}' does not exist on table '{table}'")]
    UnknownColumn {
        /// Target table.
        table: String,
        /// The offending column name.
        column: String,
    },

    /// A merge was requested without any WHEN clause.
    #[error("merge chain has no clauses")]
    EmptyChain,

    /// A merge UPDATE touches a column outside the allowed update set.
    #[error("merge clause {clause} updates '{column}', which is not an allowed update field")]
    ConflictingAction {
        /// Zero-based clause position in the chain.
        clause: usize,
        /// The offending column name.
        column: String,
    },

    /// A merge action cannot be used with the clause's match state.
    #[error("merge clause {clause}: {action} is not allowed in WHEN {when}")]
    InvalidMergeAction {
        /// Zero-based clause position in the chain.
        clause: usize,
        /// SQL of the match state, e.g. `NOT MATCHED BY SOURCE`.
        when: &'static str,
        /// Action keyword, e.g. `INSERT`.
        action: &'static str,
    },

    /// A row populates a different column set than the first row.
    #[error("row {row} populates [{found}] but the batch populates [{expected}]")]
    HeterogeneousRows {
        /// Zero-based row index.
        row: usize,
        /// Columns of the first row.
        expected: String,
        /// Columns of the offending row.
        found: String,
    },

    /// A column's cast token is not a plain type name.
    #[error("column '{column}' has an invalid SQL type '{sql_type}'")]
    InvalidSqlType {
        /// The offending column.
        column: String,
        /// The rejected cast token.
        sql_type: String,
    },

    /// The configured server version lacks a required feature.
    #[error("{feature} requires PostgreSQL {required} or later (configured for {configured})")]
    Unsupported {
        /// Feature name.
        feature: &'static str,
        /// Minimum `server_version_num`.
        required: u32,
        /// Configured `server_version_num`.
        configured: u32,
    },

    /// A value cannot be encoded for its column.
    #[error("cannot encode row {row}, column '{column}': {reason}")]
    Encoding {
        /// Zero-based row index.
        row: usize,
        /// Column name.
        column: String,
        /// What went wrong.
        reason: String,
    },

    /// A value returned by the database cannot be decoded.
    #[error("cannot decode column '{column}': {reason}")]
    Decode {
        /// Column name.
        column: String,
        /// What went wrong.
        reason: String,
    },

    /// Upsert match fields are neither the primary key nor a unique constraint.
    #[error("[{fields}] is not the primary key or a unique constraint of table '{table}'")]
    InvalidConflictTarget {
        /// Target table.
        table: String,
        /// Comma separated match fields.
        fields: String,
    },
}

impl BulkError {
    /// Returns the category of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NoMatchFields { .. }
            | Self::NoUpdateFields { .. }
            | Self::UnknownColumn { .. }
            | Self::EmptyChain
            | Self::ConflictingAction { .. }
            | Self::InvalidMergeAction { .. }
            | Self::HeterogeneousRows { .. }
            | Self::InvalidSqlType { .. }
            | Self::Unsupported { .. } => ErrorKind::Configuration,
            Self::Encoding { .. } | Self::Decode { .. } => ErrorKind::Encoding,
            Self::InvalidConflictTarget { .. } => ErrorKind::ConflictTarget,
        }
    }
}

/// Result type alias for compilation.
pub type Result<T> = std::result::Result<T, BulkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(BulkError::EmptyChain.kind(), ErrorKind::Configuration);
        assert_eq!(
            BulkError::Encoding {
                row: 0,
                column: "qty".into(),
                reason: "bad".into(),
            }
            .kind(),
            ErrorKind::Encoding
        );
        assert_eq!(
            BulkError::InvalidConflictTarget {
                table: "items".into(),
                fields: "price".into(),
            }
            .kind(),
            ErrorKind::ConflictTarget
        );
    }

    #[test]
    fn test_error_messages() {
        let err = BulkError::UnknownColumn {
            table: "items".into(),
            column: "colour".into(),
        };
        assert_eq!(
            err.to_string(),
            "column 'colour' does not exist on table 'items'"
        );
    }
}
