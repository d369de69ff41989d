//! Server configuration
//!
//! ```toml
//! schema_path = "schema.json"
//!
//! [formatter]
//! double_precision = 2
//! date_format = "%Y-%m-%d"
//! ```
//!
//! The schema is given either inline as a JSON string (`schema`) or as a
//! path to a JSON file (`schema_path`). A relative `schema_path` is resolved
//! against the directory of the config file it was loaded from.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, ServerError};
use crate::formatter::FormatterConfig;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Inline JSON schema declaration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,

    /// Path to a JSON schema declaration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_path: Option<PathBuf>,

    #[serde(default)]
    pub formatter: FormatterConfig,
}

impl ServerConfig {
    /// Config with an inline schema and pass-through formatting.
    pub fn with_schema(declaration: impl Into<String>) -> Self {
        Self {
            schema: Some(declaration.into()),
            ..Default::default()
        }
    }

    pub fn with_formatter(mut self, formatter: FormatterConfig) -> Self {
        self.formatter = formatter;
        self
    }

    /// Load a TOML config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let mut config = Self::from_toml(&contents)?;

        if let (Some(schema_path), Some(dir)) = (&config.schema_path, path.parent()) {
            if schema_path.is_relative() {
                config.schema_path = Some(dir.join(schema_path));
            }
        }

        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// The JSON schema declaration, read from disk when configured by path.
    pub fn schema_declaration(&self) -> Result<String> {
        match (&self.schema, &self.schema_path) {
            (Some(inline), None) => Ok(inline.clone()),
            (None, Some(path)) => std::fs::read_to_string(path).map_err(|e| {
                ServerError::Configuration(format!(
                    "cannot read schema file {}: {}",
                    path.display(),
                    e
                ))
            }),
            (Some(_), Some(_)) => Err(ServerError::Configuration(
                "set either schema or schema_path, not both".to_string(),
            )),
            (None, None) => Err(ServerError::Configuration(
                "no schema configured".to_string(),
            )),
        }
    }
}
