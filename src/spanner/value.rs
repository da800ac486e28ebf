//! Spanner JSON values
//!
//! The REST API encodes INT64 as a decimal string, TIMESTAMP as an RFC 3339
//! string and NULL as JSON `null`. Rows are positional arrays described by
//! the result set metadata.

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Map, Value};

pub fn int64(v: i64) -> Value {
    Value::String(v.to_string())
}

pub fn string(v: impl Into<String>) -> Value {
    Value::String(v.into())
}

pub fn timestamp(v: DateTime<Utc>) -> Value {
    Value::String(v.to_rfc3339_opts(SecondsFormat::Secs, true))
}

/// INT64 cell; `None` for NULL
pub fn decode_int64(value: &Value) -> Result<Option<i64>> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => s
            .parse::<i64>()
            .map(Some)
            .with_context(|| format!("invalid INT64 value {:?}", s)),
        Value::Number(n) => n
            .as_i64()
            .map(Some)
            .with_context(|| format!("invalid INT64 value {}", n)),
        other => anyhow::bail!("expected INT64, got {}", other),
    }
}

/// TIMESTAMP cell; `None` for NULL
pub fn decode_timestamp(value: &Value) -> Result<Option<DateTime<Utc>>> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .map(|t| Some(t.with_timezone(&Utc)))
            .with_context(|| format!("invalid TIMESTAMP value {:?}", s)),
        other => anyhow::bail!("expected TIMESTAMP, got {}", other),
    }
}

/// SQL statement with named, typed parameters
#[derive(Debug, Clone, Default)]
pub struct Statement {
    pub sql: String,
    params: Map<String, Value>,
    param_types: Map<String, Value>,
}

impl Statement {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            ..Default::default()
        }
    }

    fn bind(mut self, name: &str, value: Value, code: &str) -> Self {
        self.params.insert(name.to_string(), value);
        self.param_types
            .insert(name.to_string(), json!({ "code": code }));
        self
    }

    pub fn bind_int64(self, name: &str, value: i64) -> Self {
        self.bind(name, int64(value), "INT64")
    }

    pub fn bind_string(self, name: &str, value: impl Into<String>) -> Self {
        self.bind(name, string(value), "STRING")
    }

    pub fn bind_timestamp(self, name: &str, value: DateTime<Utc>) -> Self {
        self.bind(name, timestamp(value), "TIMESTAMP")
    }

    /// `sql`, plus `params`/`paramTypes` when anything is bound
    pub fn to_json(&self) -> Value {
        let mut body = json!({ "sql": self.sql });
        if !self.params.is_empty() {
            body["params"] = Value::Object(self.params.clone());
            body["paramTypes"] = Value::Object(self.param_types.clone());
        }
        body
    }
}

/// Write applied at commit
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    Insert { table: String, columns: Vec<String>, values: Vec<Value> },
    Update { table: String, columns: Vec<String>, values: Vec<Value> },
    InsertOrUpdate { table: String, columns: Vec<String>, values: Vec<Value> },
}

fn columns(cols: &[&str]) -> Vec<String> {
    cols.iter().map(|c| c.to_string()).collect()
}

impl Mutation {
    pub fn insert(table: &str, cols: &[&str], values: Vec<Value>) -> Self {
        Mutation::Insert { table: table.to_string(), columns: columns(cols), values }
    }

    pub fn update(table: &str, cols: &[&str], values: Vec<Value>) -> Self {
        Mutation::Update { table: table.to_string(), columns: columns(cols), values }
    }

    pub fn insert_or_update(table: &str, cols: &[&str], values: Vec<Value>) -> Self {
        Mutation::InsertOrUpdate { table: table.to_string(), columns: columns(cols), values }
    }

    pub fn to_json(&self) -> Value {
        let (kind, table, columns, values) = match self {
            Mutation::Insert { table, columns, values } => ("insert", table, columns, values),
            Mutation::Update { table, columns, values } => ("update", table, columns, values),
            Mutation::InsertOrUpdate { table, columns, values } => {
                ("insertOrUpdate", table, columns, values)
            }
        };
        let mut mutation = Map::new();
        mutation.insert(
            kind.to_string(),
            json!({
                "table": table,
                "columns": columns,
                "values": [values],
            }),
        );
        Value::Object(mutation)
    }
}

/// One row of a result set, with the column names it was read with
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Vec<String>,
    values: Vec<Value>,
}

impl Row {
    pub fn new(columns: Vec<String>, values: Vec<Value>) -> Self {
        Self { columns, values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn index_of(&self, name: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c == name)
            .with_context(|| format!("no column named {}", name))
    }

    fn value(&self, idx: usize) -> Result<&Value> {
        self.values
            .get(idx)
            .with_context(|| format!("column index {} out of range", idx))
    }

    fn column_name(&self, idx: usize) -> &str {
        self.columns.get(idx).map(|s| s.as_str()).unwrap_or("?")
    }

    pub fn nullable_int64(&self, idx: usize) -> Result<Option<i64>> {
        decode_int64(self.value(idx)?)
            .with_context(|| format!("column {}", self.column_name(idx)))
    }

    pub fn int64(&self, idx: usize) -> Result<i64> {
        self.nullable_int64(idx)?
            .with_context(|| format!("column {} is NULL", self.column_name(idx)))
    }

    pub fn string(&self, idx: usize) -> Result<String> {
        match self.value(idx)? {
            Value::String(s) => Ok(s.clone()),
            Value::Null => anyhow::bail!("column {} is NULL", self.column_name(idx)),
            other => anyhow::bail!("column {}: expected STRING, got {}", self.column_name(idx), other),
        }
    }

    pub fn timestamp(&self, idx: usize) -> Result<DateTime<Utc>> {
        decode_timestamp(self.value(idx)?)
            .with_context(|| format!("column {}", self.column_name(idx)))?
            .with_context(|| format!("column {} is NULL", self.column_name(idx)))
    }

    pub fn nullable_int64_by_name(&self, name: &str) -> Result<Option<i64>> {
        self.nullable_int64(self.index_of(name)?)
    }

    pub fn int64_by_name(&self, name: &str) -> Result<i64> {
        self.int64(self.index_of(name)?)
    }

    pub fn string_by_name(&self, name: &str) -> Result<String> {
        self.string(self.index_of(name)?)
    }
}

/// Rows of an `executeSql` or `read` response
pub fn rows_from_result_set(result_set: &Value) -> Vec<Row> {
    let columns: Vec<String> = result_set
        .pointer("/metadata/rowType/fields")
        .and_then(|v| v.as_array())
        .map(|fields| {
            fields
                .iter()
                .map(|f| f.get("name").and_then(|n| n.as_str()).unwrap_or_default().to_string())
                .collect()
        })
        .unwrap_or_default();

    result_set
        .get("rows")
        .and_then(|v| v.as_array())
        .map(|rows| {
            rows.iter()
                .map(|row| {
                    let values = row.as_array().cloned().unwrap_or_default();
                    Row::new(columns.clone(), values)
                })
                .collect()
        })
        .unwrap_or_default()
}

/// `"NULL"` or the decimal value, as the snippets print budgets
pub fn display_nullable(value: Option<i64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "NULL".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn result_set() -> Value {
        json!({
            "metadata": { "rowType": { "fields": [
                { "name": "AlbumId", "type": { "code": "INT64" } },
                { "name": "AlbumTitle", "type": { "code": "STRING" } },
                { "name": "MarketingBudget", "type": { "code": "INT64" } },
            ]}},
            "rows": [
                ["2", "Go, Go, Go", null],
                ["1", "Total Junk", "100000"],
            ]
        })
    }

    #[test]
    fn test_rows_decode_int64_strings_and_nulls() {
        let rows = rows_from_result_set(&result_set());
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].int64(0).unwrap(), 2);
        assert_eq!(rows[0].string(1).unwrap(), "Go, Go, Go");
        assert_eq!(rows[0].nullable_int64_by_name("MarketingBudget").unwrap(), None);
        assert_eq!(rows[1].nullable_int64(2).unwrap(), Some(100000));
    }

    #[test]
    fn test_null_into_non_nullable_is_an_error() {
        let rows = rows_from_result_set(&result_set());
        let err = rows[0].int64(2).unwrap_err();
        assert_eq!(err.to_string(), "column MarketingBudget is NULL");
        assert!(rows[0].int64_by_name("Missing").is_err());
    }

    #[test]
    fn test_decode_timestamp() {
        let ts = decode_timestamp(&json!("2024-03-05T10:20:30.123456Z")).unwrap().unwrap();
        assert_eq!(ts.format("%Y-%m-%d").to_string(), "2024-03-05");
        assert_eq!(decode_timestamp(&Value::Null).unwrap(), None);
        assert!(decode_timestamp(&json!("yesterday")).is_err());
    }

    #[test]
    fn test_statement_params() {
        let at = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let stmt = Statement::new("INSERT INTO Scores (PlayerId, Timestamp) VALUES (@p, @t)")
            .bind_int64("p", 42)
            .bind_timestamp("t", at)
            .to_json();
        assert_eq!(stmt["params"]["p"], "42");
        assert_eq!(stmt["params"]["t"], "2024-01-02T03:04:05Z");
        assert_eq!(stmt["paramTypes"]["p"]["code"], "INT64");

        assert!(Statement::new("SELECT 1").to_json().get("params").is_none());
    }

    #[test]
    fn test_mutation_json() {
        let m = Mutation::update("Albums", &["SingerId", "AlbumId"], vec![int64(1), int64(1)]);
        assert_eq!(
            m.to_json(),
            json!({ "update": { "table": "Albums", "columns": ["SingerId", "AlbumId"], "values": [["1", "1"]] } })
        );
    }

    #[test]
    fn test_display_nullable() {
        assert_eq!(display_nullable(None), "NULL");
        assert_eq!(display_nullable(Some(500000)), "500000");
    }
}
