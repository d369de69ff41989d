//! Tabular Schema Types
//!
//! A schema is an ordered list of named, typed fields declared once in JSON
//! and immutable afterwards:
//!
//! ```json
//! {
//!   "schemaType": "tabular",
//!   "schemaVersion": "1.0",
//!   "values": [
//!     {"name": "id", "type": "integer"},
//!     {"name": "ts", "type": "date", "format": "%Y-%m-%d %H:%M:%S"},
//!     {"name": "msg", "type": "string"}
//!   ]
//! }
//! ```

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use chrono::format::{Item, StrftimeItems};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::row::Row;

/// Schema type accepted by this server
pub const TABULAR_SCHEMA_TYPE: &str = "tabular";

/// Version reported when the declaration does not carry one
pub const DEFAULT_SCHEMA_VERSION: &str = "1.0";

/// Pattern used for date fields declared without a `format`
pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Primitive field type. Declarations name it through [`FromStr`], which
/// also accepts the `int` and `bool` aliases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    Boolean,
    String,
    Char,
    Byte,
    Short,
    Integer,
    Long,
    Float,
    Double,
    Date,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Boolean => "boolean",
            FieldType::String => "string",
            FieldType::Char => "char",
            FieldType::Byte => "byte",
            FieldType::Short => "short",
            FieldType::Integer => "integer",
            FieldType::Long => "long",
            FieldType::Float => "float",
            FieldType::Double => "double",
            FieldType::Date => "date",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "boolean" | "bool" => Ok(FieldType::Boolean),
            "string" => Ok(FieldType::String),
            "char" => Ok(FieldType::Char),
            "byte" => Ok(FieldType::Byte),
            "short" => Ok(FieldType::Short),
            "integer" | "int" => Ok(FieldType::Integer),
            "long" => Ok(FieldType::Long),
            "float" => Ok(FieldType::Float),
            "double" => Ok(FieldType::Double),
            "date" => Ok(FieldType::Date),
            other => Err(Error::InvalidSchema(format!("unknown field type '{}'", other))),
        }
    }
}

/// A single declared field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    pub name: String,
    pub field_type: FieldType,
    /// strftime pattern; only meaningful for `date` fields
    pub format: Option<String>,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            format: None,
        }
    }

    pub fn date(name: impl Into<String>, format: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field_type: FieldType::Date,
            format: Some(format.into()),
        }
    }

    /// Pattern used to parse and render values of a date field
    pub fn date_format(&self) -> &str {
        self.format.as_deref().unwrap_or(DEFAULT_DATE_FORMAT)
    }
}

/// Wire form of a schema declaration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaDeclaration {
    #[serde(default = "default_schema_type")]
    pub schema_type: String,

    #[serde(default = "default_schema_version")]
    pub schema_version: String,

    pub values: Vec<FieldDeclaration>,
}

/// Wire form of a single field declaration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDeclaration {
    pub name: String,

    #[serde(rename = "type")]
    pub field_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

fn default_schema_type() -> String {
    TABULAR_SCHEMA_TYPE.to_string()
}

fn default_schema_version() -> String {
    DEFAULT_SCHEMA_VERSION.to_string()
}

/// Validated, immutable tabular schema
#[derive(Debug, Clone)]
pub struct Schema {
    schema_type: String,
    schema_version: String,
    fields: Vec<FieldDef>,
    index: HashMap<String, usize>,
}

impl Schema {
    /// Build a schema from already typed fields
    pub fn new(fields: Vec<FieldDef>) -> Result<Self> {
        Self::build(
            TABULAR_SCHEMA_TYPE.to_string(),
            DEFAULT_SCHEMA_VERSION.to_string(),
            fields,
        )
    }

    /// Parse and validate a JSON schema declaration
    pub fn from_json(json: &str) -> Result<Self> {
        let declaration: SchemaDeclaration = serde_json::from_str(json)
            .map_err(|e| Error::InvalidSchema(format!("unparseable declaration: {}", e)))?;
        Self::from_declaration(declaration)
    }

    pub fn from_declaration(declaration: SchemaDeclaration) -> Result<Self> {
        if declaration.schema_type != TABULAR_SCHEMA_TYPE {
            return Err(Error::InvalidSchema(format!(
                "unsupported schemaType '{}', expected '{}'",
                declaration.schema_type, TABULAR_SCHEMA_TYPE
            )));
        }

        let fields = declaration
            .values
            .into_iter()
            .map(|value| {
                Ok(FieldDef {
                    field_type: value.field_type.parse()?,
                    name: value.name,
                    format: value.format,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Self::build(declaration.schema_type, declaration.schema_version, fields)
    }

    fn build(schema_type: String, schema_version: String, fields: Vec<FieldDef>) -> Result<Self> {
        if fields.is_empty() {
            return Err(Error::InvalidSchema(
                "schema must declare at least one field".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for field in &fields {
            if field.name.trim().is_empty() {
                return Err(Error::InvalidSchema("field name must not be empty".to_string()));
            }
            if !seen.insert(field.name.as_str()) {
                return Err(Error::InvalidSchema(format!(
                    "duplicate field name '{}'",
                    field.name
                )));
            }
            if let Some(format) = &field.format {
                if field.field_type != FieldType::Date {
                    return Err(Error::InvalidSchema(format!(
                        "field '{}' of type {} cannot declare a format",
                        field.name, field.field_type
                    )));
                }
                validate_date_format(&field.name, format)?;
            }
        }

        let index = fields
            .iter()
            .enumerate()
            .map(|(i, field)| (field.name.clone(), i))
            .collect();

        Ok(Self {
            schema_type,
            schema_version,
            fields,
            index,
        })
    }

    pub fn schema_type(&self) -> &str {
        &self.schema_type
    }

    pub fn schema_version(&self) -> &str {
        &self.schema_version
    }

    /// Fields in declaration order
    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.index.get(name).map(|&i| &self.fields[i])
    }

    /// Look up a field, failing with `UnknownField` when it is not declared
    pub fn require_field(&self, name: &str) -> Result<&FieldDef> {
        self.field(name)
            .ok_or_else(|| Error::UnknownField(name.to_string()))
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Check that every value in `row` belongs to a declared field and has its type.
    /// Missing fields are allowed and read as null.
    pub fn validate_row(&self, row: &Row) -> Result<()> {
        for (name, value) in row.iter() {
            let field = self.require_field(name)?;
            if !value.conforms_to(field.field_type) {
                return Err(Error::TypeMismatch {
                    field: name.to_string(),
                    expected: field.field_type,
                    actual: value.type_name().to_string(),
                });
            }
        }
        Ok(())
    }

    /// Render back to the declaration form, e.g. for schema introspection results
    pub fn to_declaration(&self) -> SchemaDeclaration {
        SchemaDeclaration {
            schema_type: self.schema_type.clone(),
            schema_version: self.schema_version.clone(),
            values: self
                .fields
                .iter()
                .map(|field| FieldDeclaration {
                    name: field.name.clone(),
                    field_type: field.field_type.as_str().to_string(),
                    format: field.format.clone(),
                })
                .collect(),
        }
    }
}

impl PartialEq for Schema {
    fn eq(&self, other: &Self) -> bool {
        self.schema_type == other.schema_type
            && self.schema_version == other.schema_version
            && self.fields == other.fields
    }
}

fn validate_date_format(field: &str, format: &str) -> Result<()> {
    if format.is_empty() || StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
        return Err(Error::InvalidSchema(format!(
            "field '{}' has an invalid date format '{}'",
            field, format
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    const DECLARATION: &str = r#"{
        "schemaType": "tabular",
        "schemaVersion": "1.0",
        "values": [
            {"name": "id", "type": "integer"},
            {"name": "ts", "type": "date", "format": "%Y-%m-%d"},
            {"name": "msg", "type": "string"}
        ]
    }"#;

    // ========================================================================
    // FieldType tests
    // ========================================================================

    #[test]
    fn test_field_type_parse_aliases() {
        assert_eq!("int".parse::<FieldType>().unwrap(), FieldType::Integer);
        assert_eq!("INTEGER".parse::<FieldType>().unwrap(), FieldType::Integer);
        assert_eq!("bool".parse::<FieldType>().unwrap(), FieldType::Boolean);
        assert!("decimal".parse::<FieldType>().is_err());
    }

    #[test]
    fn test_field_type_display_matches_declaration_name() {
        let names = [
            "boolean", "string", "char", "byte", "short", "integer", "long", "float", "double",
            "date",
        ];
        for name in names {
            assert_eq!(name.parse::<FieldType>().unwrap().to_string(), name);
        }
    }

    // ========================================================================
    // Schema construction
    // ========================================================================

    #[test]
    fn test_schema_from_json() {
        let schema = Schema::from_json(DECLARATION).unwrap();
        assert_eq!(schema.len(), 3);
        assert_eq!(schema.field_names().collect::<Vec<_>>(), vec!["id", "ts", "msg"]);
        assert_eq!(schema.field("ts").unwrap().date_format(), "%Y-%m-%d");
        assert_eq!(schema.field("msg").unwrap().date_format(), DEFAULT_DATE_FORMAT);
    }

    #[test]
    fn test_schema_defaults_type_and_version() {
        let schema = Schema::from_json(r#"{"values": [{"name": "a", "type": "long"}]}"#).unwrap();
        assert_eq!(schema.schema_type(), "tabular");
        assert_eq!(schema.schema_version(), "1.0");
    }

    #[test]
    fn test_schema_rejects_empty_fields() {
        let err = Schema::from_json(r#"{"values": []}"#).unwrap_err();
        assert!(matches!(err, Error::InvalidSchema(_)));
    }

    #[test]
    fn test_schema_rejects_duplicate_fields() {
        let err = Schema::new(vec![
            FieldDef::new("a", FieldType::Integer),
            FieldDef::new("a", FieldType::String),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_schema_rejects_unknown_type() {
        let err = Schema::from_json(r#"{"values": [{"name": "a", "type": "blob"}]}"#).unwrap_err();
        assert!(matches!(err, Error::InvalidSchema(_)));
    }

    #[test]
    fn test_schema_rejects_format_on_non_date() {
        let err = Schema::from_json(
            r#"{"values": [{"name": "a", "type": "string", "format": "%Y"}]}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("cannot declare a format"));
    }

    #[test]
    fn test_schema_rejects_bad_date_format() {
        let err = Schema::new(vec![FieldDef::date("ts", "%Q%")]).unwrap_err();
        assert!(err.to_string().contains("invalid date format"));
    }

    #[test]
    fn test_schema_rejects_other_schema_type() {
        let err = Schema::from_json(
            r#"{"schemaType": "dimensional", "values": [{"name": "a", "type": "long"}]}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("dimensional"));
    }

    #[test]
    fn test_schema_rejects_malformed_json() {
        assert!(matches!(
            Schema::from_json("not json").unwrap_err(),
            Error::InvalidSchema(_)
        ));
    }

    // ========================================================================
    // Row validation
    // ========================================================================

    #[test]
    fn test_validate_row() {
        let schema = Schema::from_json(DECLARATION).unwrap();

        let good = Row::new()
            .with("id", Value::Integer(1))
            .with("msg", Value::String("hi".to_string()));
        assert!(schema.validate_row(&good).is_ok());

        let unknown = Row::new().with("nope", Value::Integer(1));
        assert!(matches!(
            schema.validate_row(&unknown).unwrap_err(),
            Error::UnknownField(_)
        ));

        let wrong_type = Row::new().with("id", Value::String("1".to_string()));
        assert!(matches!(
            schema.validate_row(&wrong_type).unwrap_err(),
            Error::TypeMismatch { .. }
        ));

        let null = Row::new().with("id", Value::Null);
        assert!(schema.validate_row(&null).is_ok());
    }

    #[test]
    fn test_declaration_roundtrip() {
        let schema = Schema::from_json(DECLARATION).unwrap();
        let json = serde_json::to_string(&schema.to_declaration()).unwrap();
        let reparsed = Schema::from_json(&json).unwrap();
        assert_eq!(schema, reparsed);
        assert!(!json.contains(r#""format":null"#));
    }
}
