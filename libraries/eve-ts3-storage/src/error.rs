/// Storage-specific errors
use thiserror::Error;

/// Storage error types
#[derive(Error, Debug)]
pub enum StorageError {
    /// Entity not found
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Stored value could not be mapped onto a domain type
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Database error from `SQLx`
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl StorageError {
    /// Create a not found error
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }
}

impl From<StorageError> for eve_ts3_core::CoreError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound { entity, id } => eve_ts3_core::CoreError::not_found(entity, id),
            other => eve_ts3_core::CoreError::storage(other.to_string()),
        }
    }
}
