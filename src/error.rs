use thiserror::Error;

use crate::store::StoreError;

/// Failures surfaced by tracker operations
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("invalid {field}: {message}")]
    InvalidArgument { field: String, message: String },

    #[error("authentication required")]
    Unauthorized,

    #[error("storage error: {0}")]
    Storage(StoreError),
}

impl TrackerError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        TrackerError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        TrackerError::InvalidArgument {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl From<StoreError> for TrackerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity, id } => TrackerError::NotFound { entity, id },
            other => TrackerError::Storage(other),
        }
    }
}
