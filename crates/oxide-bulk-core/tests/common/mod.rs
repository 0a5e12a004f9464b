#![allow(dead_code)]

use oxide_bulk_core::{ColumnSpec, Row, TableDescriptor};

/// `items(id pk, sku unique, price, qty)`.
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

pub fn item_with_id(id: i64, sku: &str, price: &str, qty: i64) -> Row {
    item(sku, price, qty).set("id", id)
}

/// Counts `$n` placeholders up to the highest index used.
pub fn max_placeholder(sql: &str) -> usize {
    sql.split('$')
        .skip(1)
        .filter_map(|rest| {
            let digits: String = rest.chars().take_while(char::is_ascii_digit).collect();
            digits.parse().ok()
        })
        .max()
        .unwrap_or(0)
}
