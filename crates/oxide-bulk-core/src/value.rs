//! SQL values and their PostgreSQL text representation.
//!
//! [`SqlValue`] is what callers put into rows. The same text form produced by
//! [`SqlValue::to_pg_text`] feeds `COPY`, unnested-array parameters and the
//! decoding of `RETURNING` output, so a value survives the trip to the server
//! and back with its type and nullability intact.

use std::fmt;
use std::iter::Peekable;
use std::str::Chars;

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};

/// A SQL value that can be written to a column.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// NULL value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// Float value.
    Float(f64),
    /// Text value. Also carries values of types without a native variant
    /// (`numeric`, `uuid`, enums) in their text form.
    Text(String),
    /// Binary value (`bytea`).
    Blob(Vec<u8>),
    /// JSON document (`json`, `jsonb`).
    Json(serde_json::Value),
    /// Point in time (`timestamp`, `timestamptz`).
    Timestamp(DateTime<Utc>),
    /// Array value; elements may be nested arrays.
    Array(Vec<SqlValue>),
}

impl SqlValue {
    /// Builds an array value from anything convertible to SQL values.
    pub fn array<T: ToSqlValue>(items: impl IntoIterator<Item = T>) -> Self {
        Self::Array(items.into_iter().map(ToSqlValue::to_sql_value).collect())
    }

    /// Returns whether the value is NULL.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Short name of the value's variant, used in error messages.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
            Self::Blob(_) => "blob",
            Self::Json(_) => "json",
            Self::Timestamp(_) => "timestamp",
            Self::Array(_) => "array",
        }
    }

    /// Renders the value in PostgreSQL text I/O format. NULL renders as `None`.
    #[must_use]
    pub fn to_pg_text(&self) -> Option<String> {
        match self {
            Self::Null => None,
            Self::Bool(b) => Some(String::from(if *b { "t" } else { "f" })),
            Self::Int(n) => Some(n.to_string()),
            Self::Float(f) => Some(float_text(*f)),
            Self::Text(s) => Some(s.clone()),
            Self::Blob(b) => Some(format!("\\x{}", hex::encode(b))),
            Self::Json(v) => Some(v.to_string()),
            Self::Timestamp(t) => Some(t.format("%Y-%m-%d %H:%M:%S%.f+00").to_string()),
            Self::Array(items) => {
                let mut out = String::new();
                write_array(&mut out, items);
                Some(out)
            }
        }
    }

    /// Parses PostgreSQL text output for a column of the given kind.
    ///
    /// # Errors
    ///
    /// Returns a description of the problem when `text` is not a valid
    /// rendering of `kind`.
    pub fn from_pg_text(text: Option<&str>, kind: &ValueKind) -> Result<Self, String> {
        let Some(text) = text else {
            return Ok(Self::Null);
        };
        match kind {
            ValueKind::Bool => match text {
                "t" | "true" => Ok(Self::Bool(true)),
                "f" | "false" => Ok(Self::Bool(false)),
                other => Err(format!("invalid boolean '{other}'")),
            },
            ValueKind::Int => text
                .parse()
                .map(Self::Int)
                .map_err(|e| format!("invalid integer '{text}': {e}")),
            ValueKind::Float => match text {
                "NaN" => Ok(Self::Float(f64::NAN)),
                "Infinity" => Ok(Self::Float(f64::INFINITY)),
                "-Infinity" => Ok(Self::Float(f64::NEG_INFINITY)),
                _ => text
                    .parse()
                    .map(Self::Float)
                    .map_err(|e| format!("invalid float '{text}': {e}")),
            },
            ValueKind::Text | ValueKind::Other => Ok(Self::Text(text.to_string())),
            ValueKind::Blob => {
                let digits = text
                    .strip_prefix("\\x")
                    .ok_or_else(|| format!("bytea '{text}' is not in hex format"))?;
                hex::decode(digits)
                    .map(Self::Blob)
                    .map_err(|e| format!("invalid bytea: {e}"))
            }
            ValueKind::Json => serde_json::from_str(text)
                .map(Self::Json)
                .map_err(|e| format!("invalid json: {e}")),
            ValueKind::Timestamp => parse_timestamp(text).map(Self::Timestamp),
            ValueKind::Array(inner) => {
                let items = parse_array(text)?;
                decode_array(items, inner).map(Self::Array)
            }
        }
    }

    /// Converts a JSON value into a SQL value for a column of the given kind.
    ///
    /// # Errors
    ///
    /// Returns a description of the problem when the JSON shape does not fit.
    pub fn from_json(value: &serde_json::Value, kind: &ValueKind) -> Result<Self, String> {
        use serde_json::Value;

        match (kind, value) {
            (_, Value::Null) => Ok(Self::Null),
            (ValueKind::Json, v) => Ok(Self::Json(v.clone())),
            (ValueKind::Bool, Value::Bool(b)) => Ok(Self::Bool(*b)),
            (ValueKind::Int, Value::Number(n)) => n
                .as_i64()
                .map(Self::Int)
                .ok_or_else(|| format!("{n} is not a 64-bit integer")),
            (ValueKind::Float, Value::Number(n)) => n
                .as_f64()
                .map(Self::Float)
                .ok_or_else(|| format!("{n} is not a float")),
            (ValueKind::Text | ValueKind::Other, Value::String(s)) => Ok(Self::Text(s.clone())),
            (ValueKind::Other, Value::Number(n)) => Ok(Self::Text(n.to_string())),
            (ValueKind::Other, Value::Bool(b)) => Ok(Self::Text(b.to_string())),
            (ValueKind::Blob, Value::String(s)) => {
                hex::decode(s.strip_prefix("\\x").unwrap_or(s))
                    .map(Self::Blob)
                    .map_err(|e| format!("invalid hex: {e}"))
            }
            (ValueKind::Timestamp, Value::String(s)) => parse_timestamp(s).map(Self::Timestamp),
            (ValueKind::Array(inner), Value::Array(items)) => items
                .iter()
                .map(|item| match item {
                    Value::Array(_) => Self::from_json(item, kind),
                    _ => Self::from_json(item, inner),
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Self::Array),
            (kind, other) => Err(format!("cannot read {other} as {kind}")),
        }
    }

    /// Converts the value to JSON for display.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value;

        match self {
            Self::Null => Value::Null,
            Self::Bool(b) => Value::Bool(*b),
            Self::Int(n) => Value::from(*n),
            Self::Float(f) => serde_json::Number::from_f64(*f).map_or(Value::Null, Value::Number),
            Self::Text(s) => Value::String(s.clone()),
            Self::Blob(b) => Value::String(format!("\\x{}", hex::encode(b))),
            Self::Json(v) => v.clone(),
            Self::Timestamp(t) => Value::String(t.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            Self::Array(items) => Value::Array(items.iter().map(Self::to_json).collect()),
        }
    }
}

fn float_text(f: f64) -> String {
    if f.is_nan() {
        String::from("NaN")
    } else if f.is_infinite() {
        String::from(if f > 0.0 { "Infinity" } else { "-Infinity" })
    } else {
        f.to_string()
    }
}

fn write_array(out: &mut String, items: &[SqlValue]) {
    out.push('{');
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        match item {
            SqlValue::Array(nested) => write_array(out, nested),
            other => match other.to_pg_text() {
                None => out.push_str("NULL"),
                Some(text) => write_array_element(out, &text),
            },
        }
    }
    out.push('}');
}

fn write_array_element(out: &mut String, text: &str) {
    let needs_quotes = text.is_empty()
        || text.eq_ignore_ascii_case("null")
        || text
            .chars()
            .any(|c| matches!(c, '{' | '}' | ',' | '"' | '\\') || c.is_whitespace());
    if !needs_quotes {
        out.push_str(text);
        return;
    }
    out.push('"');
    for c in text.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
}

fn parse_timestamp(text: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(t) = DateTime::parse_from_rfc3339(text) {
        return Ok(t.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f%#z", "%Y-%m-%d %H:%M:%S%#z"] {
        if let Ok(t) = DateTime::parse_from_str(text, format) {
            return Ok(t.with_timezone(&Utc));
        }
    }
    for format in [
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
    ] {
        if let Ok(t) = NaiveDateTime::parse_from_str(text, format) {
            return Ok(t.and_utc());
        }
    }
    Err(format!("invalid timestamp '{text}'"))
}

/// One element of a parsed array literal.
enum ArrayItem {
    Null,
    Text(String),
    Nested(Vec<ArrayItem>),
}

fn parse_array(text: &str) -> Result<Vec<ArrayItem>, String> {
    let mut chars = text.trim().chars().peekable();
    let items = parse_array_body(&mut chars)?;
    if chars.next().is_some() {
        return Err(format!("trailing characters after array '{text}'"));
    }
    Ok(items)
}

fn parse_array_body(chars: &mut Peekable<Chars<'_>>) -> Result<Vec<ArrayItem>, String> {
    if chars.next() != Some('{') {
        return Err(String::from("array must start with '{'"));
    }
    let mut items = Vec::new();
    if chars.peek() == Some(&'}') {
        chars.next();
        return Ok(items);
    }
    loop {
        let item = match chars.peek() {
            Some('{') => ArrayItem::Nested(parse_array_body(chars)?),
            Some('"') => {
                chars.next();
                let mut text = String::new();
                loop {
                    match chars.next() {
                        Some('\\') => {
                            text.push(chars.next().ok_or("unterminated escape in array")?);
                        }
                        Some('"') => break,
                        Some(c) => text.push(c),
                        None => return Err(String::from("unterminated quoted array element")),
                    }
                }
                ArrayItem::Text(text)
            }
            Some(_) => {
                let mut text = String::new();
                while let Some(&c) = chars.peek() {
                    if c == ',' || c == '}' {
                        break;
                    }
                    chars.next();
                    if c == '\\' {
                        text.push(chars.next().ok_or("unterminated escape in array")?);
                    } else {
                        text.push(c);
                    }
                }
                let text = text.trim();
                if text.eq_ignore_ascii_case("null") {
                    ArrayItem::Null
                } else {
                    ArrayItem::Text(text.to_string())
                }
            }
            None => return Err(String::from("unterminated array")),
        };
        items.push(item);
        match chars.next() {
            Some(',') => {}
            Some('}') => return Ok(items),
            _ => return Err(String::from("expected ',' or '}' in array")),
        }
    }
}

fn decode_array(items: Vec<ArrayItem>, element: &ValueKind) -> Result<Vec<SqlValue>, String> {
    items
        .into_iter()
        .map(|item| match item {
            ArrayItem::Null => Ok(SqlValue::Null),
            ArrayItem::Text(text) => SqlValue::from_pg_text(Some(&text), element),
            ArrayItem::Nested(nested) => decode_array(nested, element).map(SqlValue::Array),
        })
        .collect()
}

/// Value category of a column, derived from its SQL type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// `boolean`.
    Bool,
    /// Integer types.
    Int,
    /// Floating point types.
    Float,
    /// Character types.
    Text,
    /// `bytea`.
    Blob,
    /// `json` and `jsonb`.
    Json,
    /// `timestamp` and `timestamptz`.
    Timestamp,
    /// Array of the inner kind, any dimensionality.
    Array(Box<ValueKind>),
    /// Any other type (`numeric`, `uuid`, enums, ...), carried as text.
    Other,
}

impl ValueKind {
    /// Classifies a SQL type token such as `integer`, `varchar(64)` or `text[]`.
    #[must_use]
    pub fn from_sql_type(sql_type: &str) -> Self {
        let normalized = sql_type.trim().to_ascii_lowercase();
        let mut base = normalized.as_str();
        let mut is_array = false;
        while let Some(stripped) = base.strip_suffix("[]") {
            base = stripped.trim_end();
            is_array = true;
        }
        let base = base.split('(').next().unwrap_or(base).trim();

        let kind = match base {
            "bool" | "boolean" => Self::Bool,
            "smallint" | "integer" | "int" | "int2" | "int4" | "int8" | "bigint" => Self::Int,
            "real" | "float4" | "float8" | "float" | "double precision" => Self::Float,
            "text" | "varchar" | "character varying" | "char" | "character" | "bpchar"
            | "name" | "citext" => Self::Text,
            "bytea" => Self::Blob,
            "json" | "jsonb" => Self::Json,
            "timestamp" | "timestamptz" | "timestamp with time zone"
            | "timestamp without time zone" => Self::Timestamp,
            _ => Self::Other,
        };
        if is_array {
            Self::Array(Box::new(kind))
        } else {
            kind
        }
    }

    /// Returns whether a value of this shape may be written to the column.
    #[must_use]
    pub fn accepts(&self, value: &SqlValue) -> bool {
        match (self, value) {
            (_, SqlValue::Null)
            | (Self::Bool, SqlValue::Bool(_))
            | (Self::Int, SqlValue::Int(_))
            | (Self::Float, SqlValue::Float(_) | SqlValue::Int(_))
            | (Self::Text, SqlValue::Text(_))
            | (Self::Blob, SqlValue::Blob(_))
            | (Self::Json, SqlValue::Json(_) | SqlValue::Text(_))
            | (Self::Timestamp, SqlValue::Timestamp(_) | SqlValue::Text(_))
            | (
                Self::Other,
                SqlValue::Text(_) | SqlValue::Int(_) | SqlValue::Float(_) | SqlValue::Bool(_),
            ) => true,
            (Self::Array(_), SqlValue::Array(items)) => items.iter().all(|item| match item {
                SqlValue::Array(_) => self.accepts(item),
                other => self.element().is_some_and(|inner| inner.accepts(other)),
            }),
            _ => false,
        }
    }

    fn element(&self) -> Option<&Self> {
        match self {
            Self::Array(inner) => Some(inner.as_ref()),
            _ => None,
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool => f.write_str("bool"),
            Self::Int => f.write_str("int"),
            Self::Float => f.write_str("float"),
            Self::Text => f.write_str("text"),
            Self::Blob => f.write_str("blob"),
            Self::Json => f.write_str("json"),
            Self::Timestamp => f.write_str("timestamp"),
            Self::Array(inner) => write!(f, "{inner}[]"),
            Self::Other => f.write_str("text-like"),
        }
    }
}

/// Trait for types that can be converted to SQL values.
pub trait ToSqlValue {
    /// Converts the value to a `SqlValue`.
    fn to_sql_value(self) -> SqlValue;
}

impl ToSqlValue for SqlValue {
    fn to_sql_value(self) -> SqlValue {
        self
    }
}

impl ToSqlValue for bool {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Bool(self)
    }
}

impl ToSqlValue for i64 {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Int(self)
    }
}

impl ToSqlValue for i32 {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Int(i64::from(self))
    }
}

impl ToSqlValue for i16 {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Int(i64::from(self))
    }
}

impl ToSqlValue for u32 {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Int(i64::from(self))
    }
}

impl ToSqlValue for f64 {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Float(self)
    }
}

impl ToSqlValue for f32 {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Float(f64::from(self))
    }
}

impl ToSqlValue for String {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Text(self)
    }
}

impl ToSqlValue for &str {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Text(String::from(self))
    }
}

impl ToSqlValue for Vec<u8> {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Blob(self)
    }
}

impl ToSqlValue for &[u8] {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Blob(self.to_vec())
    }
}

impl ToSqlValue for serde_json::Value {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Json(self)
    }
}

impl ToSqlValue for DateTime<Utc> {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Timestamp(self)
    }
}

impl<T: ToSqlValue> ToSqlValue for Option<T> {
    fn to_sql_value(self) -> SqlValue {
        match self {
            Some(v) => v.to_sql_value(),
            None => SqlValue::Null,
        }
    }
}

macro_rules! impl_to_sql_value_array {
    ($($ty:ty),+) => {
        $(
            impl ToSqlValue for Vec<$ty> {
                fn to_sql_value(self) -> SqlValue {
                    SqlValue::array(self)
                }
            }
        )+
    };
}

impl_to_sql_value_array!(bool, i64, i32, f64, String, &str);

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_pg_text_scalars() {
        assert_eq!(SqlValue::Null.to_pg_text(), None);
        assert_eq!(SqlValue::Bool(true).to_pg_text().as_deref(), Some("t"));
        assert_eq!(SqlValue::Int(-42).to_pg_text().as_deref(), Some("-42"));
        assert_eq!(SqlValue::Float(2.5).to_pg_text().as_deref(), Some("2.5"));
        assert_eq!(
            SqlValue::Float(f64::NEG_INFINITY).to_pg_text().as_deref(),
            Some("-Infinity")
        );
        assert_eq!(
            SqlValue::Blob(vec![0xde, 0xad]).to_pg_text().as_deref(),
            Some("\\xdead")
        );
    }

    #[test]
    fn test_pg_text_timestamp() {
        let t = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
        assert_eq!(
            SqlValue::Timestamp(t).to_pg_text().as_deref(),
            Some("2024-03-01 12:30:00+00")
        );
        assert_eq!(
            SqlValue::from_pg_text(Some("2024-03-01 14:30:00+02"), &ValueKind::Timestamp),
            Ok(SqlValue::Timestamp(t))
        );
    }

    #[test]
    fn test_pg_text_array_quoting() {
        let value = SqlValue::array(vec!["a", "b c", "", "NULL", "x\"y"]);
        assert_eq!(
            value.to_pg_text().as_deref(),
            Some(r#"{a,"b c","","NULL","x\"y"}"#)
        );
        let with_null = SqlValue::Array(vec![SqlValue::Int(1), SqlValue::Null]);
        assert_eq!(with_null.to_pg_text().as_deref(), Some("{1,NULL}"));
    }

    #[test]
    fn test_pg_text_array_decode() {
        let kind = ValueKind::from_sql_type("text[]");
        let decoded = SqlValue::from_pg_text(Some(r#"{a,"b c",NULL,"NULL"}"#), &kind).unwrap();
        assert_eq!(
            decoded,
            SqlValue::Array(vec![
                SqlValue::Text("a".into()),
                SqlValue::Text("b c".into()),
                SqlValue::Null,
                SqlValue::Text("NULL".into()),
            ])
        );
    }

    #[test]
    fn test_pg_text_nested_array_decode() {
        let kind = ValueKind::from_sql_type("integer[][]");
        let decoded = SqlValue::from_pg_text(Some("{{1,2},{3,NULL}}"), &kind).unwrap();
        assert_eq!(
            decoded,
            SqlValue::Array(vec![
                SqlValue::Array(vec![SqlValue::Int(1), SqlValue::Int(2)]),
                SqlValue::Array(vec![SqlValue::Int(3), SqlValue::Null]),
            ])
        );
    }

    #[test]
    fn test_pg_text_decode_errors() {
        assert!(SqlValue::from_pg_text(Some("yes"), &ValueKind::Bool).is_err());
        assert!(SqlValue::from_pg_text(Some("1.5"), &ValueKind::Int).is_err());
        assert!(SqlValue::from_pg_text(Some("dead"), &ValueKind::Blob).is_err());
        let kind = ValueKind::from_sql_type("int[]");
        assert!(SqlValue::from_pg_text(Some("{1,2"), &kind).is_err());
    }

    #[test]
    fn test_value_kind_from_sql_type() {
        assert_eq!(ValueKind::from_sql_type("INTEGER"), ValueKind::Int);
        assert_eq!(ValueKind::from_sql_type("varchar(255)"), ValueKind::Text);
        assert_eq!(
            ValueKind::from_sql_type("double precision"),
            ValueKind::Float
        );
        assert_eq!(ValueKind::from_sql_type("numeric(10, 2)"), ValueKind::Other);
        assert_eq!(
            ValueKind::from_sql_type("timestamptz[]"),
            ValueKind::Array(Box::new(ValueKind::Timestamp))
        );
    }

    #[test]
    fn test_value_kind_accepts() {
        assert!(ValueKind::Float.accepts(&SqlValue::Int(1)));
        assert!(!ValueKind::Int.accepts(&SqlValue::Text("1".into())));
        assert!(ValueKind::Other.accepts(&SqlValue::Text("9.99".into())));
        let ints = ValueKind::from_sql_type("int[]");
        assert!(ints.accepts(&SqlValue::array(vec![1_i64, 2])));
        assert!(!ints.accepts(&SqlValue::array(vec!["a"])));
        assert!(ints.accepts(&SqlValue::Array(vec![SqlValue::array(vec![1_i64])])));
    }

    #[test]
    fn test_from_json() {
        use serde_json::json;

        assert_eq!(
            SqlValue::from_json(&json!(10), &ValueKind::Int),
            Ok(SqlValue::Int(10))
        );
        assert_eq!(
            SqlValue::from_json(&json!(null), &ValueKind::Int),
            Ok(SqlValue::Null)
        );
        assert_eq!(
            SqlValue::from_json(&json!("12.50"), &ValueKind::Other),
            Ok(SqlValue::Text("12.50".into()))
        );
        assert_eq!(
            SqlValue::from_json(&json!({"a": 1}), &ValueKind::Json),
            Ok(SqlValue::Json(json!({"a": 1})))
        );
        assert!(SqlValue::from_json(&json!("ten"), &ValueKind::Int).is_err());
    }

    #[test]
    fn test_to_sql_value_conversions() {
        assert_eq!(true.to_sql_value(), SqlValue::Bool(true));
        assert_eq!(42_i32.to_sql_value(), SqlValue::Int(42));
        assert_eq!("hello".to_sql_value(), SqlValue::Text(String::from("hello")));
        assert_eq!(None::<i32>.to_sql_value(), SqlValue::Null);
        assert_eq!(
            vec![1_i64, 2].to_sql_value(),
            SqlValue::Array(vec![SqlValue::Int(1), SqlValue::Int(2)])
        );
    }
}
