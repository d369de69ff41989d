//! Server error types
//!
//! Two families of errors exist. [`CodecError`] covers envelopes arriving on
//! the query channel; those are logged and counted by the server but never
//! returned to the requester. [`ServerError`] covers configuration, lifecycle
//! misuse and rejected input batches, and is returned to the embedding
//! pipeline.

use thiserror::Error;

/// Errors decoding a query envelope.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Malformed envelope: {0}")]
    MalformedEnvelope(String),

    #[error("Schema mismatch: {0}")]
    SchemaMismatch(tabserve_core::Error),
}

impl CodecError {
    pub fn malformed(msg: impl Into<String>) -> Self {
        CodecError::MalformedEnvelope(msg.into())
    }

    /// Short label used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            CodecError::MalformedEnvelope(_) => "malformed_envelope",
            CodecError::SchemaMismatch(_) => "schema_mismatch",
        }
    }
}

/// Errors surfaced to the embedding pipeline.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid transition: cannot {operation} while {state}")]
    InvalidTransition {
        state: String,
        operation: &'static str,
    },

    #[error(transparent)]
    Core(#[from] tabserve_core::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codec_error_kind() {
        assert_eq!(CodecError::malformed("x").kind(), "malformed_envelope");
        let mismatch = CodecError::SchemaMismatch(tabserve_core::Error::UnknownField("f".into()));
        assert_eq!(mismatch.kind(), "schema_mismatch");
        assert_eq!(mismatch.to_string(), "Schema mismatch: Unknown field: f");
    }

    #[test]
    fn test_invalid_transition_display() {
        let err = ServerError::InvalidTransition {
            state: "closed".to_string(),
            operation: "end window",
        };
        assert_eq!(err.to_string(), "Invalid transition: cannot end window while closed");
    }

    #[test]
    fn test_core_error_is_transparent() {
        let err: ServerError = tabserve_core::Error::InvalidSchema("empty".into()).into();
        assert_eq!(err.to_string(), "Invalid schema: empty");
    }
}
