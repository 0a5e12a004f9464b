//! SQL Dialect support.
//!
//! The bulk compilers target PostgreSQL, but quoting, placeholders and
//! version-gated features go through this trait so statement assembly never
//! hard-codes them.

mod postgres;

pub use postgres::{PostgresDialect, MERGE_RETURNING_VERSION, MERGE_VERSION};

/// Trait for SQL dialect-specific behavior.
pub trait Dialect {
    /// Returns the name of the dialect.
    fn name(&self) -> &'static str;

    /// Returns the identifier quote character.
    fn identifier_quote(&self) -> char {
        '"'
    }

    /// Returns the positional parameter placeholder for a one-based index.
    fn placeholder(&self, index: usize) -> String;

    /// Returns whether the dialect supports `MERGE INTO`.
    fn supports_merge(&self) -> bool {
        false
    }

    /// Returns whether `MERGE` accepts `RETURNING` and `NOT MATCHED BY SOURCE`.
    fn supports_merge_returning(&self) -> bool {
        false
    }

    /// Quotes an identifier, doubling embedded quote characters.
    fn quote_identifier(&self, name: &str) -> String {
        let quote = self.identifier_quote();
        let mut escaped = String::with_capacity(name.len() + 2);
        escaped.push(quote);
        for c in name.chars() {
            if c == quote {
                escaped.push(quote);
            }
            escaped.push(c);
        }
        escaped.push(quote);
        escaped
    }
}
