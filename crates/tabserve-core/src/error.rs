//! Error Types for TabServe
//!
//! This module defines the errors raised while building a schema and while
//! checking values and rows against it.
//!
//! ## Error Categories
//!
//! ### Configuration Errors
//! - `InvalidSchema`: The schema declaration is malformed. This is fatal at
//!   startup; a server never enters service with an invalid schema.
//!
//! ### Schema Mismatch Errors
//! - `UnknownField`: A query or row references a field the schema does not declare
//! - `TypeMismatch`: A value cannot be represented as the declared field type
//! - `InvalidRow`: An input record could not be read as a row at all
//!
//! ### Parsing Errors
//! - `Json`: The declaration or a value was not valid JSON
//!
//! ## Usage
//! Functions in this crate return `Result<T>`, aliased to `Result<T, Error>`.
//!
//! ```ignore
//! use tabserve_core::{Result, Schema};
//!
//! fn load(declaration: &str) -> Result<Schema> {
//!     // JSON errors convert via #[from]
//!     Schema::from_json(declaration)
//! }
//! ```

use thiserror::Error;

use crate::schema::FieldType;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    #[error("Unknown field: {0}")]
    UnknownField(String),

    #[error("Type mismatch for field '{field}': expected {expected}, got {actual}")]
    TypeMismatch {
        field: String,
        expected: FieldType,
        actual: String,
    },

    #[error("Invalid row: {0}")]
    InvalidRow(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Whether this error means the input referenced something outside the schema.
    pub fn is_schema_mismatch(&self) -> bool {
        matches!(
            self,
            Error::UnknownField(_) | Error::TypeMismatch { .. } | Error::InvalidRow(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_schema_display() {
        let err = Error::InvalidSchema("no fields".to_string());
        assert_eq!(err.to_string(), "Invalid schema: no fields");
        assert!(!err.is_schema_mismatch());
    }

    #[test]
    fn test_type_mismatch_display() {
        let err = Error::TypeMismatch {
            field: "id".to_string(),
            expected: FieldType::Integer,
            actual: "\"abc\"".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("'id'"));
        assert!(msg.contains("integer"));
        assert!(err.is_schema_mismatch());
    }

    #[test]
    fn test_unknown_field_is_schema_mismatch() {
        assert!(Error::UnknownField("nope".to_string()).is_schema_mismatch());
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: Error = json_err.into();
        assert!(err.to_string().starts_with("JSON error"));
    }
}
