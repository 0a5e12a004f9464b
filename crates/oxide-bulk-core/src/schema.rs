//! Table descriptors and rows.
//!
//! A [`TableDescriptor`] is the static metadata the compilers check every
//! field name against. It is built by the caller, either with the builder
//! methods below or deserialized from JSON, and only borrowed by the core.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::dialect::Dialect;
use crate::error::{BulkError, Result};
use crate::value::{SqlValue, ToSqlValue, ValueKind};

// Plain, optionally schema-qualified or quoted, type names with an optional
// modifier list and array suffixes. Anything else could smuggle SQL into a cast.
static SQL_TYPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"^(?:[A-Za-z_][A-Za-z0-9_]*|"[^"]+")(?:\.(?:[A-Za-z_][A-Za-z0-9_]*|"[^"]+"))?(?: [A-Za-z_][A-Za-z0-9_]*)*(?:\(\s*\d+\s*(?:,\s*\d+\s*)?\))?(?: [A-Za-z_][A-Za-z0-9_]*)*(?:\[\d*\])*$"#,
    )
    .expect("SQL type pattern is valid")
});

const fn default_nullable() -> bool {
    true
}

/// Schema definition for a column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    /// Column name.
    pub name: String,
    /// Cast token used when embedding a value, e.g. `integer` or `text[]`.
    pub sql_type: String,
    /// Whether the column allows NULL values.
    #[serde(default = "default_nullable")]
    pub nullable: bool,
}

impl ColumnSpec {
    /// Creates a new nullable column.
    #[must_use]
    pub fn new(name: impl Into<String>, sql_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql_type: sql_type.into(),
            nullable: true,
        }
    }

    /// Marks the column as NOT NULL.
    #[must_use]
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Returns the value category of the column.
    #[must_use]
    pub fn kind(&self) -> ValueKind {
        ValueKind::from_sql_type(&self.sql_type)
    }

    /// Returns whether the driver's native binding of `value` already has
    /// exactly this column's type, so no cast is needed.
    #[must_use]
    pub fn binds_natively(&self, value: &SqlValue) -> bool {
        let ty = self.sql_type.trim().to_ascii_lowercase();
        match value {
            SqlValue::Bool(_) => matches!(ty.as_str(), "bool" | "boolean"),
            SqlValue::Int(_) => matches!(ty.as_str(), "bigint" | "int8"),
            SqlValue::Float(_) => matches!(ty.as_str(), "double precision" | "float8"),
            SqlValue::Text(_) => ty == "text",
            SqlValue::Blob(_) => ty == "bytea",
            SqlValue::Timestamp(_) => matches!(ty.as_str(), "timestamptz" | "timestamp with time zone"),
            SqlValue::Null | SqlValue::Json(_) | SqlValue::Array(_) => false,
        }
    }

    /// Checks that `value` can be written to this column.
    ///
    /// # Errors
    ///
    /// Returns [`BulkError::Encoding`] for NULL in a NOT NULL column or a
    /// value whose shape disagrees with the column type.
    pub fn check_value(&self, row: usize, value: &SqlValue) -> Result<()> {
        if value.is_null() && !self.nullable {
            return Err(BulkError::Encoding {
                row,
                column: self.name.clone(),
                reason: String::from("NULL given for a NOT NULL column"),
            });
        }
        let kind = self.kind();
        if !kind.accepts(value) {
            return Err(BulkError::Encoding {
                row,
                column: self.name.clone(),
                reason: format!(
                    "{} value does not fit {} column of type {}",
                    value.type_name(),
                    kind,
                    self.sql_type
                ),
            });
        }
        Ok(())
    }
}

/// Static metadata of a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDescriptor {
    /// Optional schema the table lives in.
    #[serde(default)]
    pub schema: Option<String>,
    /// Table name.
    pub name: String,
    /// Columns, in table order.
    pub columns: Vec<ColumnSpec>,
    /// Primary key columns.
    #[serde(default)]
    pub primary_key: Vec<String>,
    /// Declared unique constraints.
    #[serde(default)]
    pub unique_constraints: Vec<Vec<String>>,
}

impl TableDescriptor {
    /// Creates a descriptor with no columns.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            schema: None,
            name: name.into(),
            columns: Vec::new(),
            primary_key: Vec::new(),
            unique_constraints: Vec::new(),
        }
    }

    /// Sets the schema.
    #[must_use]
    pub fn schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    /// Appends a column.
    #[must_use]
    pub fn column(mut self, column: ColumnSpec) -> Self {
        self.columns.push(column);
        self
    }

    /// Sets the primary key.
    #[must_use]
    pub fn primary_key(mut self, columns: &[&str]) -> Self {
        self.primary_key = columns.iter().map(|c| String::from(*c)).collect();
        self
    }

    /// Declares a unique constraint.
    #[must_use]
    pub fn unique(mut self, columns: &[&str]) -> Self {
        self.unique_constraints
            .push(columns.iter().map(|c| String::from(*c)).collect());
        self
    }

    /// Looks up a column by name.
    #[must_use]
    pub fn get_column(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Looks up a column by name, failing if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`BulkError::UnknownColumn`].
    pub fn require_column(&self, name: &str) -> Result<&ColumnSpec> {
        self.get_column(name).ok_or_else(|| BulkError::UnknownColumn {
            table: self.name.clone(),
            column: name.to_string(),
        })
    }

    /// Checks cast tokens and that key columns exist.
    ///
    /// # Errors
    ///
    /// Returns [`BulkError::InvalidSqlType`] or [`BulkError::UnknownColumn`].
    pub fn validate(&self) -> Result<()> {
        for column in &self.columns {
            if !SQL_TYPE.is_match(column.sql_type.trim()) {
                return Err(BulkError::InvalidSqlType {
                    column: column.name.clone(),
                    sql_type: column.sql_type.clone(),
                });
            }
        }
        for name in self.primary_key.iter().chain(self.unique_constraints.iter().flatten()) {
            self.require_column(name)?;
        }
        Ok(())
    }

    /// Returns whether `fields` equals, as a set, the primary key or a
    /// declared unique constraint.
    #[must_use]
    pub fn is_conflict_target(&self, fields: &[String]) -> bool {
        let wanted: BTreeSet<&str> = fields.iter().map(String::as_str).collect();
        std::iter::once(&self.primary_key)
            .chain(&self.unique_constraints)
            .filter(|constraint| !constraint.is_empty())
            .any(|constraint| {
                constraint.iter().map(String::as_str).collect::<BTreeSet<_>>() == wanted
            })
    }

    /// Returns the quoted, optionally schema-qualified table name.
    pub fn qualified_name(&self, dialect: &impl Dialect) -> String {
        match &self.schema {
            Some(schema) => format!(
                "{}.{}",
                dialect.quote_identifier(schema),
                dialect.quote_identifier(&self.name)
            ),
            None => dialect.quote_identifier(&self.name),
        }
    }
}

/// One row of values, keyed by column name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    values: BTreeMap<String, SqlValue>,
}

impl Row {
    /// Creates an empty row.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a column value.
    #[must_use]
    pub fn set<T: ToSqlValue>(mut self, column: &str, value: T) -> Self {
        self.insert(column, value);
        self
    }

    /// Sets a column value in place.
    pub fn insert<T: ToSqlValue>(&mut self, column: &str, value: T) {
        self.values.insert(String::from(column), value.to_sql_value());
    }

    /// Returns the value of a column, if populated.
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.values.get(column)
    }

    /// Returns the populated column names in sorted order.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Returns the number of populated columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns whether no column is populated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterates over `(column, value)` pairs in sorted column order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SqlValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Reads a row from a JSON object, typing each value by its column.
    ///
    /// # Errors
    ///
    /// Returns [`BulkError::UnknownColumn`] for keys that are not columns and
    /// [`BulkError::Encoding`] for values that do not fit.
    pub fn from_json(
        object: &serde_json::Map<String, serde_json::Value>,
        table: &TableDescriptor,
        row: usize,
    ) -> Result<Self> {
        let mut out = Self::new();
        for (name, value) in object {
            let column = table.require_column(name)?;
            let value = SqlValue::from_json(value, &column.kind()).map_err(|reason| {
                BulkError::Encoding {
                    row,
                    column: name.clone(),
                    reason,
                }
            })?;
            out.values.insert(name.clone(), value);
        }
        Ok(out)
    }

    /// Converts the row to a JSON object.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.values
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::PostgresDialect;

    fn items() -> TableDescriptor {
        TableDescriptor::new("items")
            .column(ColumnSpec::new("id", "integer").not_null())
            .column(ColumnSpec::new("sku", "text").not_null())
            .column(ColumnSpec::new("price", "numeric(10, 2)"))
            .column(ColumnSpec::new("qty", "integer"))
            .primary_key(&["id"])
            .unique(&["sku"])
    }

    #[test]
    fn test_validate_accepts_common_types() {
        let table = TableDescriptor::new("t")
            .column(ColumnSpec::new("a", "double precision"))
            .column(ColumnSpec::new("b", "character varying(255)"))
            .column(ColumnSpec::new("c", "timestamp(3) with time zone"))
            .column(ColumnSpec::new("d", "public.mood"))
            .column(ColumnSpec::new("e", "integer[]"))
            .column(ColumnSpec::new("f", "\"MyEnum\""));
        assert!(table.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_injection_in_type() {
        let table = TableDescriptor::new("t")
            .column(ColumnSpec::new("a", "integer); DROP TABLE users; --"));
        assert!(matches!(
            table.validate(),
            Err(BulkError::InvalidSqlType { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_unknown_key_column() {
        let table = items().unique(&["colour"]);
        assert!(matches!(
            table.validate(),
            Err(BulkError::UnknownColumn { column, .. }) if column == "colour"
        ));
    }

    #[test]
    fn test_conflict_target_is_set_equality() {
        let table = items().unique(&["sku", "qty"]);
        assert!(table.is_conflict_target(&["id".into()]));
        assert!(table.is_conflict_target(&["sku".into()]));
        assert!(table.is_conflict_target(&["qty".into(), "sku".into()]));
        assert!(!table.is_conflict_target(&["price".into()]));
        assert!(!table.is_conflict_target(&["id".into(), "sku".into()]));
    }

    #[test]
    fn test_qualified_name() {
        let dialect = PostgresDialect::default();
        assert_eq!(items().qualified_name(&dialect), "\"items\"");
        assert_eq!(
            items().schema("shop").qualified_name(&dialect),
            "\"shop\".\"items\""
        );
    }

    #[test]
    fn test_check_value() {
        let table = items();
        let sku = table.get_column("sku").unwrap();
        assert!(sku.check_value(0, &SqlValue::Text("A".into())).is_ok());
        assert!(matches!(
            sku.check_value(3, &SqlValue::Null),
            Err(BulkError::Encoding { row: 3, .. })
        ));
        let qty = table.get_column("qty").unwrap();
        assert!(qty.check_value(0, &SqlValue::Text("two".into())).is_err());
    }

    #[test]
    fn test_binds_natively() {
        assert!(ColumnSpec::new("a", "bigint").binds_natively(&SqlValue::Int(1)));
        assert!(!ColumnSpec::new("a", "integer").binds_natively(&SqlValue::Int(1)));
        assert!(!ColumnSpec::new("a", "text").binds_natively(&SqlValue::Null));
    }

    #[test]
    fn test_row_from_json() {
        let object = serde_json::json!({"sku": "A", "qty": 3});
        let row = Row::from_json(object.as_object().unwrap(), &items(), 0).unwrap();
        assert_eq!(row.get("sku"), Some(&SqlValue::Text("A".into())));
        assert_eq!(row.get("qty"), Some(&SqlValue::Int(3)));

        let bad = serde_json::json!({"colour": "red"});
        assert!(Row::from_json(bad.as_object().unwrap(), &items(), 0).is_err());
    }
}
