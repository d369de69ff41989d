//! Snapshot row
//!
//! A row maps field names to typed values. Rows are produced by the embedding
//! pipeline's converter and checked against the schema before they become
//! part of a snapshot; a field that is absent reads as null.

use std::collections::HashMap;

use serde_json::Value as JsonValue;

use crate::error::{Error, Result};
use crate::schema::Schema;
use crate::value::Value;

static NULL: Value = Value::Null;

/// A single row of tabular data
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    values: HashMap<String, Value>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(name.into(), value.into());
    }

    /// Value of `name`, or null when the row does not carry it
    pub fn get(&self, name: &str) -> &Value {
        self.values.get(name).unwrap_or(&NULL)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Convert a JSON object into a row typed by `schema`
    pub fn from_json(json: &JsonValue, schema: &Schema) -> Result<Self> {
        let object = json
            .as_object()
            .ok_or_else(|| Error::InvalidRow(format!("expected a JSON object, got {}", json)))?;

        let mut row = Row::new();
        for (name, raw) in object {
            let field = schema.require_field(name)?;
            row.set(name.clone(), Value::from_json(raw, field)?);
        }
        Ok(row)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Row {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldDef, FieldType};
    use serde_json::json;

    fn schema() -> Schema {
        Schema::new(vec![
            FieldDef::new("id", FieldType::Integer),
            FieldDef::new("msg", FieldType::String),
        ])
        .unwrap()
    }

    #[test]
    fn test_missing_field_reads_null() {
        let row = Row::new().with("id", 1);
        assert_eq!(row.get("id"), &Value::Integer(1));
        assert!(row.get("msg").is_null());
        assert_eq!(row.len(), 1);
    }

    #[test]
    fn test_from_iterator() {
        let row: Row = vec![("id", Value::Integer(3)), ("msg", Value::from("x"))]
            .into_iter()
            .collect();
        assert_eq!(row.len(), 2);
        assert_eq!(row.get("msg"), &Value::String("x".to_string()));
    }

    #[test]
    fn test_from_json_object() {
        let row = Row::from_json(&json!({"id": 5, "msg": "hello"}), &schema()).unwrap();
        assert_eq!(row.get("id"), &Value::Integer(5));
        assert_eq!(row.get("msg"), &Value::String("hello".to_string()));
    }

    #[test]
    fn test_from_json_rejects_unknown_field() {
        let err = Row::from_json(&json!({"id": 5, "other": 1}), &schema()).unwrap_err();
        assert!(matches!(err, Error::UnknownField(name) if name == "other"));
    }

    #[test]
    fn test_from_json_rejects_non_object() {
        let err = Row::from_json(&json!([1, 2]), &schema()).unwrap_err();
        assert!(err.is_schema_mismatch());
    }
}
