//! COPY payloads and the staged upsert plan.
//!
//! Rows travel in the default text format of `COPY ... FROM STDIN`: one line
//! per row, tab-separated fields, `\N` for NULL, and backslash escapes for
//! backslash, newline, carriage return and tab. Field text is the same
//! PostgreSQL text form the unnest encoder uses, so the server parses each
//! field with the column type's input function.
//!
//! The executor crate drives the protocol; this module only decides what to
//! send.

use crate::compiler::Compiler;
use crate::error::Result;
use crate::schema::{ColumnSpec, Row};
use crate::spec::OperationSpec;
use crate::statement::Statement;
use crate::value::SqlValue;

/// Default size of one COPY data chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// A `COPY ... FROM STDIN` command and the columns its payload carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyIn<'a> {
    /// The COPY command.
    pub sql: String,
    /// Payload columns, in order.
    pub columns: Vec<&'a ColumnSpec>,
    /// Number of rows the payload carries.
    pub row_count: usize,
}

impl<'a> CopyIn<'a> {
    /// Splits the payload of `rows` into chunks of roughly `chunk_size` bytes.
    ///
    /// A chunk always ends on a row boundary. `rows` must be the batch this
    /// command was compiled from.
    #[must_use]
    pub fn encoder<'r>(&self, rows: &'r [Row], chunk_size: usize) -> CopyEncoder<'r, 'a> {
        CopyEncoder {
            rows: rows.iter(),
            columns: self.columns.clone(),
            chunk_size: chunk_size.max(1),
        }
    }

    /// Encodes the whole payload at once.
    #[must_use]
    pub fn payload(&self, rows: &[Row]) -> Vec<u8> {
        let mut out = Vec::new();
        for row in rows {
            write_copy_row(&mut out, row, &self.columns);
        }
        out
    }
}

/// Iterator over COPY data chunks.
#[derive(Debug, Clone)]
pub struct CopyEncoder<'r, 'a> {
    rows: std::slice::Iter<'r, Row>,
    columns: Vec<&'a ColumnSpec>,
    chunk_size: usize,
}

impl Iterator for CopyEncoder<'_, '_> {
    type Item = Vec<u8>;

    fn next(&mut self) -> Option<Vec<u8>> {
        let mut chunk = Vec::new();
        for row in self.rows.by_ref() {
            write_copy_row(&mut chunk, row, &self.columns);
            if chunk.len() >= self.chunk_size {
                break;
            }
        }
        if chunk.is_empty() {
            None
        } else {
            Some(chunk)
        }
    }
}

/// Appends one row in COPY text format.
pub fn write_copy_row(out: &mut Vec<u8>, row: &Row, columns: &[&ColumnSpec]) {
    for (position, column) in columns.iter().enumerate() {
        if position > 0 {
            out.push(b'\t');
        }
        match row.get(&column.name).and_then(SqlValue::to_pg_text) {
            None => out.extend_from_slice(b"\\N"),
            Some(text) => escape_copy_text(out, &text),
        }
    }
    out.push(b'\n');
}

fn escape_copy_text(out: &mut Vec<u8>, text: &str) {
    for byte in text.bytes() {
        match byte {
            b'\\' => out.extend_from_slice(b"\\\\"),
            b'\n' => out.extend_from_slice(b"\\n"),
            b'\r' => out.extend_from_slice(b"\\r"),
            b'\t' => out.extend_from_slice(b"\\t"),
            other => out.push(other),
        }
    }
}

/// The statements of a COPY into a staging table folded into the target.
#[derive(Debug, Clone, PartialEq)]
pub struct StagedUpsert<'a> {
    /// Staging table name, unquoted.
    pub staging: String,
    /// `CREATE TEMPORARY TABLE ... ON COMMIT DROP AS SELECT ... WITH NO DATA`.
    pub create_sql: String,
    /// COPY into the staging table.
    pub copy: CopyIn<'a>,
    /// `INSERT ... SELECT ... FROM staging ON CONFLICT ...`.
    pub upsert: Statement,
    /// `DROP TABLE IF EXISTS` of the staging table.
    pub drop_sql: String,
}

impl<'a> Compiler<'a> {
    /// Compiles a COPY of the batch straight into the target table.
    ///
    /// Every value is checked against its column before anything is sent.
    /// Returns `None` for an empty batch.
    ///
    /// # Errors
    ///
    /// Returns the unknown-column, heterogeneous-row and encoding errors of
    /// the value encoder.
    pub fn copy_in(&self, rows: &[Row]) -> Result<Option<CopyIn<'a>>> {
        let columns = self.batch(rows)?;
        if rows.is_empty() {
            return Ok(None);
        }
        check_rows(rows, &columns)?;
        Ok(Some(CopyIn {
            sql: self.copy_command(&self.table_sql(), &columns),
            columns,
            row_count: rows.len(),
        }))
    }

    /// Compiles the staged upsert of the batch through `staging`.
    ///
    /// The staging table copies the shape of the populated target columns
    /// and is dropped at commit even if the explicit drop never runs.
    /// Returns `None` for an empty batch.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`Compiler::upsert`]. As there, the batch must
    /// not repeat a conflict key or the final insert fails on the server
    /// with SQLSTATE 21000.
    pub fn staged_upsert(
        &self,
        rows: &[Row],
        spec: &OperationSpec,
        staging: &str,
    ) -> Result<Option<StagedUpsert<'a>>> {
        let Some(copy) = self.copy_in(rows)? else {
            // Still reject a bad spec on an empty batch.
            self.upsert(rows, spec)?;
            return Ok(None);
        };
        let upsert = self.upsert_from(staging, &copy.columns, spec)?;
        let quoted = self.quote(staging);
        let create_sql = format!(
            "CREATE TEMPORARY TABLE {quoted} ON COMMIT DROP AS SELECT {} FROM {} WITH NO DATA",
            self.column_list(&copy.columns),
            self.table_sql()
        );
        let copy = CopyIn {
            sql: self.copy_command(&quoted, &copy.columns),
            ..copy
        };
        Ok(Some(StagedUpsert {
            staging: staging.to_string(),
            create_sql,
            copy,
            upsert: Statement {
                row_count: rows.len(),
                ..upsert
            },
            drop_sql: format!("DROP TABLE IF EXISTS {quoted}"),
        }))
    }

    fn copy_command(&self, relation: &str, columns: &[&ColumnSpec]) -> String {
        format!("COPY {relation} ({}) FROM STDIN", self.column_list(columns))
    }
}

fn check_rows(rows: &[Row], columns: &[&ColumnSpec]) -> Result<()> {
    for (index, row) in rows.iter().enumerate() {
        for column in columns {
            if let Some(value) = row.get(&column.name) {
                column.check_value(index, value)?;
            }
        }
    }
    Ok(())
}
