//! # oxide-bulk-core
//!
//! A compiler for PostgreSQL bulk statements.
//!
//! Given a [`TableDescriptor`] and a batch of [`Row`]s, this crate produces a
//! single parameterized statement per operation:
//!
//! - bulk `UPDATE ... FROM (VALUES ...)`
//! - bulk `INSERT ... ON CONFLICT`, with inserted/updated categorization
//! - chained conditional `MERGE`
//! - `COPY ... FROM STDIN` payloads, optionally staged and folded into the
//!   target with one `INSERT ... SELECT ... ON CONFLICT`
//!
//! The crate is pure: it holds no connection and no state between calls.
//! Running the statements is the job of the `oxide-bulk` crate.
//!
//! ## Upserting a batch
//!
//! ```rust
//! use oxide_bulk_core::{compile_upsert, ColumnSpec, OperationSpec, Row, TableDescriptor};
//!
//! let items = TableDescriptor::new("items")
//!     .column(ColumnSpec::new("id", "bigint").not_null())
//!     .column(ColumnSpec::new("sku", "text").not_null())
//!     .column(ColumnSpec::new("qty", "integer"))
//!     .primary_key(&["id"])
//!     .unique(&["sku"]);
//!
//! let rows = vec![
//!     Row::new().set("sku", "A").set("qty", 1),
//!     Row::new().set("sku", "B").set("qty", 2),
//! ];
//! let spec = OperationSpec::matching(&["sku"]).ignore_unchanged(true);
//!
//! let statement = compile_upsert(&items, &rows, &spec).unwrap().unwrap();
//! assert!(statement.sql.starts_with("INSERT INTO \"items\" AS target"));
//! assert_eq!(statement.params.len(), 4);
//! ```
//!
//! ## SQL Injection Prevention
//!
//! Values are always bound as parameters. Identifiers are quoted, and column
//! cast tokens are checked against a type-name grammar before they are
//! embedded:
//!
//! ```rust
//! use oxide_bulk_core::{compile_update, BulkError, ColumnSpec, OperationSpec, Row, TableDescriptor};
//!
//! let table = TableDescriptor::new("t")
//!     .column(ColumnSpec::new("id", "bigint"))
//!     .column(ColumnSpec::new("name", "text); DROP TABLE t; --"));
//! let rows = vec![Row::new().set("id", 1_i64).set("name", "x")];
//!
//! let result = compile_update(&table, &rows, &OperationSpec::matching(&["id"]));
//! assert!(matches!(result, Err(BulkError::InvalidSqlType { .. })));
//! ```

pub mod change;
pub mod compiler;
pub mod copy;
pub mod dialect;
pub mod encode;
pub mod error;
pub mod merge;
pub mod schema;
pub mod spec;
pub mod statement;
pub mod update;
pub mod upsert;
pub mod value;

pub use change::SetClause;
pub use compiler::Compiler;
pub use copy::{CopyEncoder, CopyIn, StagedUpsert, DEFAULT_CHUNK_SIZE};
pub use dialect::{Dialect, PostgresDialect};
pub use encode::{batch_columns, EncodedRows, SourceForm};
pub use error::{BulkError, ErrorKind, Result};
pub use merge::{compile_merge, MergeAction, MergeChain, MergeClause, MergeSpec, MergeWhen};
pub use schema::{ColumnSpec, Row, TableDescriptor};
pub use spec::{CompileOptions, OperationSpec, Returning, MAX_BIND_PARAMS};
pub use statement::{BindValue, Statement, StatusColumn, ACTION_COLUMN, INSERTED_COLUMN};
pub use update::compile_update;
pub use upsert::{compile_upsert, compile_upsert_from};
pub use value::{SqlValue, ToSqlValue, ValueKind};
