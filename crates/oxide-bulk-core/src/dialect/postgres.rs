//! PostgreSQL dialect implementation.

use super::Dialect;

/// `server_version_num` of the first release with `MERGE`.
pub const MERGE_VERSION: u32 = 150_000;

/// `server_version_num` of the first release with `MERGE ... RETURNING`.
pub const MERGE_RETURNING_VERSION: u32 = 170_000;

/// PostgreSQL dialect.
///
/// Carries the server's `server_version_num` so version-dependent syntax can
/// be rejected before the statement is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostgresDialect {
    server_version: u32,
}

impl PostgresDialect {
    /// Creates a dialect for the given `server_version_num` (e.g. `160_004`).
    #[must_use]
    pub const fn new(server_version: u32) -> Self {
        Self { server_version }
    }

    /// Returns the configured `server_version_num`.
    #[must_use]
    pub const fn server_version(&self) -> u32 {
        self.server_version
    }
}

impl Default for PostgresDialect {
    fn default() -> Self {
        Self::new(MERGE_RETURNING_VERSION)
    }
}

impl Dialect for PostgresDialect {
    fn name(&self) -> &'static str {
        "postgresql"
    }

    fn placeholder(&self, index: usize) -> String {
        format!("${index}")
    }

    fn supports_merge(&self) -> bool {
        self.server_version >= MERGE_VERSION
    }

    fn supports_merge_returning(&self) -> bool {
        self.server_version >= MERGE_RETURNING_VERSION
    }
}
