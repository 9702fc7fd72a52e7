use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("key not found: {0}")]
    NotFound(String),

    /// A uniqueness constraint rejected the write. Callers map this to
    /// their own conflict error.
    #[error("constraint violation: {0}")]
    Duplicate(String),

    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("database is corrupted: {0}")]
    Corruption(String),
}

impl StoreError {
    pub fn is_constraint_violation(&self) -> bool {
        matches!(self, Self::Duplicate(_))
    }
}
