//! The PostgreSQL text codec shared by COPY, unnest parameters and
//! RETURNING decoding keeps type and nullability intact.

use chrono::{TimeZone, Utc};
use oxide_bulk_core::{ColumnSpec, Row, SqlValue, TableDescriptor};

fn decode_as(column: &ColumnSpec, value: &SqlValue) -> SqlValue {
    SqlValue::from_pg_text(value.to_pg_text().as_deref(), &column.kind()).unwrap()
}

#[test]
fn values_survive_the_text_form() {
    let cases = vec![
        (ColumnSpec::new("a", "integer"), SqlValue::Int(-42)),
        (ColumnSpec::new("b", "double precision"), SqlValue::Float(f64::INFINITY)),
        (ColumnSpec::new("c", "boolean"), SqlValue::Bool(false)),
        (ColumnSpec::new("d", "text"), SqlValue::Text("line\nbreak, \"quoted\"".into())),
        (ColumnSpec::new("e", "bytea"), SqlValue::Blob(vec![0, 1, 254, 255])),
        (
            ColumnSpec::new("f", "timestamptz"),
            SqlValue::Timestamp(Utc.with_ymd_and_hms(1999, 12, 31, 23, 59, 59).unwrap()),
        ),
        (
            ColumnSpec::new("g", "jsonb"),
            SqlValue::Json(serde_json::json!({"nested": [1, null, "x"]})),
        ),
        (
            ColumnSpec::new("h", "text[]"),
            SqlValue::array(vec![Some("a,b"), None, Some(""), Some("NULL")]),
        ),
        (
            ColumnSpec::new("i", "integer[][]"),
            SqlValue::Array(vec![SqlValue::array(vec![1_i64, 2]), SqlValue::array(vec![3_i64, 4])]),
        ),
    ];
    for (column, value) in cases {
        assert_eq!(decode_as(&column, &value), value, "column {}", column.name);
    }
}

#[test]
fn null_stays_null_and_differs_from_zero() {
    let column = ColumnSpec::new("qty", "integer");
    assert_eq!(decode_as(&column, &SqlValue::Null), SqlValue::Null);
    assert_ne!(decode_as(&column, &SqlValue::Int(0)), SqlValue::Null);
    assert_eq!(SqlValue::Null.to_pg_text(), None);
    assert_eq!(SqlValue::Int(0).to_pg_text().as_deref(), Some("0"));
}

#[test]
fn rows_read_from_json_are_typed_by_column() {
    let table = TableDescriptor::new("t")
        .column(ColumnSpec::new("id", "bigint"))
        .column(ColumnSpec::new("tags", "text[]"))
        .column(ColumnSpec::new("seen", "timestamptz"));
    let object = serde_json::json!({
        "id": 5,
        "tags": ["x", null],
        "seen": "2024-01-02T03:04:05Z"
    });
    let row = Row::from_json(object.as_object().unwrap(), &table, 0).unwrap();
    assert_eq!(row.get("id"), Some(&SqlValue::Int(5)));
    assert_eq!(
        row.get("tags"),
        Some(&SqlValue::Array(vec![SqlValue::Text("x".into()), SqlValue::Null]))
    );
    assert_eq!(
        row.get("seen"),
        Some(&SqlValue::Timestamp(Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap()))
    );
    assert_eq!(Row::from_json(row.to_json().as_object().unwrap(), &table, 0).unwrap(), row);
}
