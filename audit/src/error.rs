use nexus_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}
