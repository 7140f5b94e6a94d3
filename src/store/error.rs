/// Errors returned by a [`Datastore`](super::Datastore) implementation.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No row with the given identifier.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A write conflicted with another transaction (e.g. a uniqueness violation).
    #[error("write conflict: {0}")]
    Conflict(String),

    /// A stored row could not be decoded into domain types.
    #[error("corrupt row: {0}")]
    Corrupt(String),

    /// A backend-specific failure (connection, migration, I/O).
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        StoreError::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

#[cfg(feature = "database")]
impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                StoreError::Conflict(db.message().to_string())
            }
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                StoreError::Corrupt(err.to_string())
            }
            other => StoreError::Backend(other.to_string()),
        }
    }
}

#[cfg(feature = "database")]
impl From<sqlx::migrate::MigrateError> for StoreError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        StoreError::Backend(err.to_string())
    }
}
