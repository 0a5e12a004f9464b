#![allow(dead_code)]

use oxide_bulk::{BulkConfig, BulkExecutor, ColumnSpec, Row, TableDescriptor};
use sqlx::{Connection, PgConnection};

/// Database used by the integration tests. Tests are skipped when unset.
pub const DATABASE_URL_VAR: &str = "OXIDE_BULK_TEST_DATABASE_URL";

pub fn database_url() -> Option<String> {
    let url = std::env::var(DATABASE_URL_VAR).ok();
    if url.is_none() {
        eprintln!("{DATABASE_URL_VAR} is not set, skipping");
    }
    url
}

pub async fn connect() -> Option<PgConnection> {
    let url = database_url()?;
    Some(PgConnection::connect(&url).await.unwrap())
}

/// `server_version_num` of the connected server.
pub async fn server_version(conn: &mut PgConnection) -> u32 {
    let (version,): (String,) = sqlx::query_as("SHOW server_version_num")
        .fetch_one(&mut *conn)
        .await
        .unwrap();
    version.parse().unwrap()
}

/// An executor configured for the connected server.
pub async fn executor(conn: &mut PgConnection) -> BulkExecutor {
    BulkExecutor::new(BulkConfig {
        server_version: server_version(conn).await,
        ..BulkConfig::default()
    })
}

pub const CREATE_ITEMS: &str = "DROP TABLE IF EXISTS pg_temp.items; \
    CREATE TEMPORARY TABLE items (\
        id bigserial PRIMARY KEY, \
        sku text NOT NULL UNIQUE, \
        price numeric(10,2), \
        qty integer)";

/// Creates an empty session-local `items` table.
pub async fn create_items(conn: &mut PgConnection) {
    sqlx::raw_sql(CREATE_ITEMS).execute(&mut *conn).await.unwrap();
}

pub fn items() -> TableDescriptor {
    TableDescriptor::new("items")
        .column(ColumnSpec::new("id", "bigint").not_null())
        .column(ColumnSpec::new("sku", "text").not_null())
        .column(ColumnSpec::new("price", "numeric(10,2)"))
        .column(ColumnSpec::new("qty", "integer"))
        .primary_key(&["id"])
        .unique(&["sku"])
}

pub fn item(sku: &str, price: &str, qty: i64) -> Row {
    Row::new().set("sku", sku).set("price", price).set("qty", qty)
}

/// `(sku, price, qty)` of every row, ordered by sku.
pub async fn snapshot(conn: &mut PgConnection) -> Vec<(String, String, Option<i32>)> {
    sqlx::query_as("SELECT sku, price::text, qty FROM items ORDER BY sku")
        .fetch_all(&mut *conn)
        .await
        .unwrap()
}

pub async fn count_items(conn: &mut PgConnection) -> i64 {
    let (count,): (i64,) = sqlx::query_as("SELECT count(*) FROM items")
        .fetch_one(&mut *conn)
        .await
        .unwrap();
    count
}
