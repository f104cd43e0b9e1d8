use civic_common::CivicError;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    /// A stored row could not be mapped back to a domain type.
    #[error("Corrupt row {id}: {reason}")]
    Corrupt { id: String, reason: String },
}

impl From<StoreError> for CivicError {
    fn from(err: StoreError) -> Self {
        CivicError::Store(err.to_string())
    }
}
