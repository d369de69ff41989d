//! TabServe Core
//!
//! Schema and data types shared by the tabular query server.
//!
//! # Overview
//!
//! - **Schema**: ordered, typed field declarations parsed once from JSON
//! - **Value**: a typed scalar, one variant per primitive type plus null
//! - **Row**: field name to value mapping, validated against the schema
//! - **SchemaRegistry**: owns the schema and answers introspection queries
//!
//! # Usage
//!
//! ```ignore
//! use tabserve_core::{Row, SchemaQuery, SchemaRegistry};
//!
//! let registry = SchemaRegistry::from_json(
//!     r#"{"values": [{"name": "id", "type": "integer"}]}"#,
//! )?;
//!
//! registry.validate_row(&Row::new().with("id", 1))?;
//! let result = registry.describe(&SchemaQuery::new("q1"));
//! ```

pub mod error;
pub mod registry;
pub mod row;
pub mod schema;
pub mod value;

pub use error::{Error, Result};
pub use registry::{SchemaQuery, SchemaRegistry, SchemaResult};
pub use row::Row;
pub use schema::{
    FieldDeclaration, FieldDef, FieldType, Schema, SchemaDeclaration, DEFAULT_DATE_FORMAT,
    DEFAULT_SCHEMA_VERSION, TABULAR_SCHEMA_TYPE,
};
pub use value::Value;
