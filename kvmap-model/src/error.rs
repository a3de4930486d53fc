//! Error types for model definition and instance validation.

use thiserror::Error;

/// Boxed cause carried by [`ModelError::Store`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors raised while defining models, validating instances, or talking to
/// the backing store.
#[derive(Debug, Error)]
pub enum ModelError {
    /// The model name is empty.
    #[error("model name unspecified")]
    InvalidModel,

    /// No field carries the key sigil.
    #[error("no primary key specified for model '{model}'")]
    NoPrimaryKey { model: String },

    /// A collection declaration does not hold exactly one type expression.
    #[error("invalid field length for '{field}': expected exactly one element type")]
    InvalidArrayDefinition { field: String },

    #[error("invalid type '{expr}' for field '{field}'")]
    InvalidType { field: String, expr: String },

    /// Two declarations name the same field once the key sigil is stripped.
    #[error("field '{field}' is declared more than once")]
    DuplicateField { field: String },

    /// A field value fails its type expression.
    #[error("invalid value for field '{field}' of model '{model}'")]
    InvalidValue { field: String, model: String },

    /// The store rejected or failed to execute a batch.
    #[error("store error: {0}")]
    Store(#[source] BoxError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ModelError {
    /// Wraps a transport or store failure.
    pub fn store(cause: impl Into<BoxError>) -> Self {
        Self::Store(cause.into())
    }

    /// The offending field, for errors that name one.
    pub fn field(&self) -> Option<&str> {
        match self {
            ModelError::InvalidArrayDefinition { field }
            | ModelError::InvalidType { field, .. }
            | ModelError::DuplicateField { field }
            | ModelError::InvalidValue { field, .. } => Some(field),
            _ => None,
        }
    }
}
