//! Running compiled statements and decoding what they return.

use oxide_bulk_core::{
    BindValue, BulkError, ColumnSpec, Row, SqlValue, Statement, ACTION_COLUMN, INSERTED_COLUMN,
};
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::{PgConnection, Postgres, Row as _};
use tracing::debug;

use crate::error::Result;

/// Raw outcome of one statement.
#[derive(Debug, Default)]
pub(crate) struct Executed {
    pub(crate) affected: u64,
    pub(crate) rows: Vec<PgRow>,
}

/// Runs a statement, fetching its rows when it returns any.
pub(crate) async fn run(conn: &mut PgConnection, statement: &Statement) -> Result<Executed> {
    debug!(
        sql = %statement.sql,
        params = statement.params.len(),
        rows = statement.row_count,
        "Executing bulk statement"
    );
    let mut query = sqlx::query(&statement.sql);
    for value in &statement.params {
        query = bind_param(query, value);
    }
    if statement.returns_rows() {
        let rows = query.fetch_all(&mut *conn).await?;
        Ok(Executed {
            affected: rows.len() as u64,
            rows,
        })
    } else {
        let done = query.execute(&mut *conn).await?;
        Ok(Executed {
            affected: done.rows_affected(),
            rows: Vec::new(),
        })
    }
}

/// Binds a parameter to a query.
fn bind_param<'q>(
    query: Query<'q, Postgres, PgArguments>,
    value: &BindValue,
) -> Query<'q, Postgres, PgArguments> {
    match value {
        BindValue::Null => query.bind(Option::<String>::None),
        BindValue::Bool(b) => query.bind(*b),
        BindValue::Int(i) => query.bind(*i),
        BindValue::Float(f) => query.bind(*f),
        BindValue::Text(s) => query.bind(s.clone()),
        BindValue::Blob(b) => query.bind(b.clone()),
        BindValue::Timestamp(t) => query.bind(*t),
        BindValue::TextArray(items) => query.bind(items.clone()),
    }
}

/// Decodes the returned columns of a row. They are selected as text.
pub(crate) fn decode_values(row: &PgRow, columns: &[ColumnSpec]) -> Result<Row> {
    let mut values = Row::new();
    for (index, column) in columns.iter().enumerate() {
        let text: Option<String> = row.try_get(index)?;
        let value = SqlValue::from_pg_text(text.as_deref(), &column.kind()).map_err(|reason| {
            BulkError::Decode {
                column: column.name.clone(),
                reason,
            }
        })?;
        values.insert(&column.name, value);
    }
    Ok(values)
}

/// Reads the inserted marker of an upsert row.
pub(crate) fn decode_inserted(row: &PgRow) -> Result<bool> {
    Ok(row.try_get::<bool, _>(INSERTED_COLUMN)?)
}

/// Reads the `merge_action()` of a merge row.
pub(crate) fn decode_action(row: &PgRow) -> Result<String> {
    Ok(row.try_get::<String, _>(ACTION_COLUMN)?)
}
