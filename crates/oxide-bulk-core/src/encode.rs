//! Value encoding.
//!
//! A batch of rows becomes one relation the bulk statements read from:
//!
//! - `VALUES ($1, CAST($2 AS integer)), ...` with one parameter per value,
//! - or, when that would exceed the parameter limit,
//!   `SELECT CAST(u."c0" AS integer), ... FROM UNNEST(CAST($1 AS text[]), ...) AS u ("c0", ...)`
//!   with one text-array parameter per column.
//!
//! Values whose native binding already has the column type are bound as is.
//! Everything else is bound as text and cast, so the server never has to guess
//! the type of a NULL, an array or an enum.

use crate::compiler::{Compiler, SOURCE};
use crate::dialect::Dialect;
use crate::error::{BulkError, Result};
use crate::schema::{ColumnSpec, Row, TableDescriptor};
use crate::statement::BindValue;
use crate::value::SqlValue;

/// Shape of an encoded batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceForm {
    /// A `VALUES` list, one parameter per value.
    Values,
    /// Unnested text arrays, one parameter per column.
    Unnest,
}

/// Rows encoded as a relation plus its parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedRows<'a> {
    /// Columns of the relation, in descriptor order.
    pub columns: Vec<&'a ColumnSpec>,
    /// SQL of the relation, usable after `INSERT ... (cols)` or in parentheses.
    pub sql: String,
    /// Parameters, in placeholder order.
    pub params: Vec<BindValue>,
    /// Number of encoded rows.
    pub row_count: usize,
    /// Which form was chosen.
    pub form: SourceForm,
}

/// Returns the columns populated by every row of the batch, in descriptor order.
///
/// # Errors
///
/// Returns [`BulkError::UnknownColumn`] when a row populates a column the
/// table does not have, [`BulkError::HeterogeneousRows`] when rows disagree on
/// their column set, and [`BulkError::Encoding`] when rows populate nothing.
pub fn batch_columns<'a>(table: &'a TableDescriptor, rows: &[Row]) -> Result<Vec<&'a ColumnSpec>> {
    let Some(first) = rows.first() else {
        return Ok(Vec::new());
    };
    if first.is_empty() {
        return Err(BulkError::Encoding {
            row: 0,
            column: String::from("*"),
            reason: String::from("row populates no columns"),
        });
    }
    for name in first.columns() {
        table.require_column(name)?;
    }
    for (index, row) in rows.iter().enumerate().skip(1) {
        if !row.columns().eq(first.columns()) {
            return Err(BulkError::HeterogeneousRows {
                row: index,
                expected: first.columns().collect::<Vec<_>>().join(", "),
                found: row.columns().collect::<Vec<_>>().join(", "),
            });
        }
    }
    Ok(table
        .columns
        .iter()
        .filter(|c| first.get(&c.name).is_some())
        .collect())
}

/// Converts a value to its parameter, reporting whether it needs a cast.
pub(crate) fn bind_value(column: &ColumnSpec, value: &SqlValue) -> (BindValue, bool) {
    if column.binds_natively(value) {
        let native = match value {
            SqlValue::Bool(b) => BindValue::Bool(*b),
            SqlValue::Int(n) => BindValue::Int(*n),
            SqlValue::Float(f) => BindValue::Float(*f),
            SqlValue::Text(s) => BindValue::Text(s.clone()),
            SqlValue::Blob(b) => BindValue::Blob(b.clone()),
            SqlValue::Timestamp(t) => BindValue::Timestamp(*t),
            SqlValue::Null | SqlValue::Json(_) | SqlValue::Array(_) => BindValue::Null,
        };
        return (native, false);
    }
    let text = value.to_pg_text().map_or(BindValue::Null, BindValue::Text);
    (text, true)
}

impl<'a> Compiler<'a> {
    /// Encodes `rows` over `columns`, picking the form by parameter count.
    ///
    /// # Errors
    ///
    /// Returns [`BulkError::Encoding`] when a row misses one of `columns` or a
    /// value does not fit its column.
    pub fn encode(&self, rows: &[Row], columns: &[&'a ColumnSpec]) -> Result<EncodedRows<'a>> {
        let values = rows.len().saturating_mul(columns.len());
        if values > self.max_params {
            self.encode_unnest(rows, columns)
        } else {
            self.encode_values(rows, columns)
        }
    }

    /// Encodes rows as a `VALUES` list.
    ///
    /// # Errors
    ///
    /// See [`Compiler::encode`].
    pub fn encode_values(&self, rows: &[Row], columns: &[&'a ColumnSpec]) -> Result<EncodedRows<'a>> {
        let mut sql = String::from("VALUES ");
        let mut params = Vec::with_capacity(rows.len() * columns.len());
        for (index, row) in rows.iter().enumerate() {
            if index > 0 {
                sql.push_str(", ");
            }
            sql.push('(');
            for (position, column) in columns.iter().enumerate() {
                if position > 0 {
                    sql.push_str(", ");
                }
                let value = checked_value(row, index, column)?;
                let (param, cast) = bind_value(column, value);
                params.push(param);
                let placeholder = self.dialect.placeholder(params.len());
                if cast {
                    sql.push_str(&format!("CAST({placeholder} AS {})", column.sql_type.trim()));
                } else {
                    sql.push_str(&placeholder);
                }
            }
            sql.push(')');
        }
        Ok(EncodedRows {
            columns: columns.to_vec(),
            sql,
            params,
            row_count: rows.len(),
            form: SourceForm::Values,
        })
    }

    /// Encodes rows as unnested text arrays, one parameter per column.
    ///
    /// # Errors
    ///
    /// See [`Compiler::encode`].
    pub fn encode_unnest(&self, rows: &[Row], columns: &[&'a ColumnSpec]) -> Result<EncodedRows<'a>> {
        let mut arrays: Vec<Vec<Option<String>>> = columns
            .iter()
            .map(|_| Vec::with_capacity(rows.len()))
            .collect();
        for (index, row) in rows.iter().enumerate() {
            for (position, column) in columns.iter().enumerate() {
                let value = checked_value(row, index, column)?;
                arrays[position].push(value.to_pg_text());
            }
        }

        let aliases: Vec<String> = (0..columns.len())
            .map(|position| self.quote(&format!("c{position}")))
            .collect();
        let selected: Vec<String> = columns
            .iter()
            .zip(&aliases)
            .map(|(column, alias)| format!("CAST(u.{alias} AS {})", column.sql_type.trim()))
            .collect();
        let unnested: Vec<String> = (1..=columns.len())
            .map(|index| format!("CAST({} AS text[])", self.dialect.placeholder(index)))
            .collect();
        let sql = format!(
            "SELECT {} FROM UNNEST({}) AS u ({})",
            selected.join(", "),
            unnested.join(", "),
            aliases.join(", ")
        );

        Ok(EncodedRows {
            columns: columns.to_vec(),
            sql,
            params: arrays.into_iter().map(BindValue::TextArray).collect(),
            row_count: rows.len(),
            form: SourceForm::Unnest,
        })
    }

    /// Renders the encoded rows as a `FROM`/`USING` item aliased `source`.
    pub(crate) fn source_relation(&self, encoded: &EncodedRows<'_>) -> String {
        format!(
            "({}) AS {SOURCE} ({})",
            encoded.sql,
            self.column_list(&encoded.columns)
        )
    }
}

fn checked_value<'r>(row: &'r Row, index: usize, column: &ColumnSpec) -> Result<&'r SqlValue> {
    let value = row.get(&column.name).ok_or_else(|| BulkError::Encoding {
        row: index,
        column: column.name.clone(),
        reason: String::from("value is missing"),
    })?;
    column.check_value(index, value)?;
    Ok(value)
}
