//! Error types

use thiserror::Error;

/// Faults while merging Open WebUI identity into a request envelope.
///
/// None of these abort the call: [`HeaderMetadataMapper::map`](crate::HeaderMetadataMapper::map)
/// logs them and forwards the envelope unmodified.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MapError {
    /// `metadata` exists but is not a JSON object
    #[error("request metadata is not an object (found {found})")]
    MetadataNotObject { found: &'static str },

    /// `metadata.trace_metadata` exists but is not a JSON object
    #[error("metadata.trace_metadata is not an object (found {found})")]
    TraceMetadataNotObject { found: &'static str },
}

/// Missing or invalid Langfuse configuration
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing {0} environment variable")]
    MissingEnv(&'static str),

    #[error("Invalid Langfuse host {host:?}: {message}")]
    InvalidHost { host: String, message: String },
}

/// Failure to hand a trace to its destination
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("failed to serialize trace: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to write trace: {0}")]
    Io(#[from] std::io::Error),

    #[error("trace sink lock poisoned")]
    Poisoned,
}

/// Short JSON type name used in error messages
pub(crate) fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
