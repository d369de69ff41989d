//! Schema Registry
//!
//! Owns the schema declared at startup and answers schema-introspection
//! queries. Answering never depends on snapshot or queue state.

use std::sync::Arc;

use tracing::{debug, info};

use crate::error::Result;
use crate::row::Row;
use crate::schema::{FieldDef, Schema};

/// Request for the server's schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaQuery {
    pub id: String,
}

impl SchemaQuery {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// Answer to a [`SchemaQuery`]
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaResult {
    pub id: String,
    pub schema: Arc<Schema>,
}

/// Schema Registry
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    schema: Arc<Schema>,
}

impl SchemaRegistry {
    /// Create a registry around an already validated schema
    pub fn new(schema: Schema) -> Self {
        Self {
            schema: Arc::new(schema),
        }
    }

    /// Parse a JSON declaration. Fails with `InvalidSchema` on any defect.
    pub fn from_json(declaration: &str) -> Result<Self> {
        let schema = Schema::from_json(declaration)?;
        info!(
            schema_type = schema.schema_type(),
            version = schema.schema_version(),
            fields = schema.len(),
            "Schema registered"
        );
        Ok(Self::new(schema))
    }

    /// Shared handle to the schema
    pub fn schema(&self) -> Arc<Schema> {
        Arc::clone(&self.schema)
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.schema.field(name)
    }

    pub fn validate_row(&self, row: &Row) -> Result<()> {
        self.schema.validate_row(row)
    }

    /// Answer a schema query
    pub fn describe(&self, query: &SchemaQuery) -> SchemaResult {
        debug!(query_id = %query.id, "Describing schema");
        SchemaResult {
            id: query.id.clone(),
            schema: self.schema(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::schema::FieldType;

    const DECLARATION: &str = r#"{"values": [
        {"name": "id", "type": "int"},
        {"name": "ts", "type": "date"},
        {"name": "msg", "type": "string"}
    ]}"#;

    #[test]
    fn test_describe_returns_declared_fields() {
        let registry = SchemaRegistry::from_json(DECLARATION).unwrap();
        let result = registry.describe(&SchemaQuery::new("q1"));

        assert_eq!(result.id, "q1");
        assert_eq!(
            result.schema.field_names().collect::<Vec<_>>(),
            vec!["id", "ts", "msg"]
        );
        assert_eq!(result.schema.field("id").unwrap().field_type, FieldType::Integer);
    }

    #[test]
    fn test_describe_shares_schema() {
        let registry = SchemaRegistry::from_json(DECLARATION).unwrap();
        let a = registry.describe(&SchemaQuery::new("a"));
        let b = registry.describe(&SchemaQuery::new("b"));
        assert!(Arc::ptr_eq(&a.schema, &b.schema));
    }

    #[test]
    fn test_from_json_invalid() {
        let err = SchemaRegistry::from_json(r#"{"values": [{"name": "", "type": "int"}]}"#)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidSchema(_)));
    }

    #[test]
    fn test_validate_row_delegates() {
        let registry = SchemaRegistry::from_json(DECLARATION).unwrap();
        assert!(registry.validate_row(&Row::new().with("id", 4)).is_ok());
        assert!(registry.validate_row(&Row::new().with("id", 4i64)).is_err());
        assert!(registry.field("missing").is_none());
    }
}
