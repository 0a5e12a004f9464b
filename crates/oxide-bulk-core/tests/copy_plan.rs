//! COPY payload encoding and the staged upsert plan.

mod common;
use common::*;

use chrono::{TimeZone, Utc};
use oxide_bulk_core::{
    ColumnSpec, Compiler, OperationSpec, Row, SqlValue, TableDescriptor, DEFAULT_CHUNK_SIZE,
};

#[test]
fn payload_uses_text_format() {
    let table = TableDescriptor::new("events")
        .column(ColumnSpec::new("id", "bigint"))
        .column(ColumnSpec::new("at", "timestamptz"))
        .column(ColumnSpec::new("ok", "boolean"))
        .column(ColumnSpec::new("raw", "bytea"))
        .column(ColumnSpec::new("meta", "jsonb"));
    let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap();
    let rows = vec![Row::new()
        .set("id", 7_i64)
        .set("at", at)
        .set("ok", true)
        .set("raw", vec![0xde_u8, 0xad])
        .set("meta", serde_json::json!({"k": "a\tb"}))];

    let copy = Compiler::new(&table).copy_in(&rows).unwrap().unwrap();
    assert_eq!(
        String::from_utf8(copy.payload(&rows)).unwrap(),
        "7\t2024-05-01 12:30:00+00\tt\t\\\\xdead\t{\"k\":\"a\\\\tb\"}\n"
    );
}

#[test]
fn chunks_reassemble_to_the_payload() {
    let rows: Vec<Row> = (0..5_000)
        .map(|i| item_with_id(i, &format!("sku-{i}"), "9.99", i % 7))
        .collect();
    let table = items();
    let copy = Compiler::new(&table).copy_in(&rows).unwrap().unwrap();
    let chunks: Vec<Vec<u8>> = copy.encoder(&rows, DEFAULT_CHUNK_SIZE).collect();
    assert!(chunks.len() >= 2);
    assert_eq!(chunks.concat(), copy.payload(&rows));
    let lines = chunks.iter().flatten().filter(|b| **b == b'\n').count();
    assert_eq!(lines, 5_000);
}

#[test]
fn staged_upsert_reuses_the_conflict_logic() {
    let rows = vec![
        item("A", "10", 1),
        Row::new().set("sku", "B").set("price", "5").set("qty", SqlValue::Null),
    ];
    let table = items();
    let spec = OperationSpec::matching(&["sku"])
        .ignore_unchanged(true)
        .track_categorization(true);
    let plan = Compiler::new(&table)
        .staged_upsert(&rows, &spec, "_oxide_bulk_stage_1")
        .unwrap()
        .unwrap();

    assert!(plan.create_sql.contains("ON COMMIT DROP"));
    assert_eq!(
        plan.upsert.sql,
        "INSERT INTO \"items\" AS target (\"sku\", \"price\", \"qty\") \
         SELECT \"sku\", \"price\", \"qty\" FROM \"_oxide_bulk_stage_1\" \
         ON CONFLICT (\"sku\") DO UPDATE SET \"price\" = EXCLUDED.\"price\", \
         \"qty\" = EXCLUDED.\"qty\" \
         WHERE (target.\"price\", target.\"qty\") IS DISTINCT FROM \
         (EXCLUDED.\"price\", EXCLUDED.\"qty\") \
         RETURNING (target.xmax = 0) AS \"_oxide_bulk_inserted\""
    );
    assert_eq!(
        String::from_utf8(plan.copy.payload(&rows)).unwrap(),
        "A\t10\t1\nB\t5\t\\N\n"
    );
}
