use nexus_audit::AuditError;
use nexus_store::StoreError;
use nexus_types::ErrorKind;
use thiserror::Error;

/// Failure reported by an external collaborator (object store, OCR,
/// biometrics). Always retryable from the pipeline's point of view.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider unreachable: {0}")]
    Unavailable(String),

    #[error("provider request failed: {0}")]
    RequestFailed(String),

    #[error("invalid provider response: {0}")]
    InvalidResponse(String),

    /// The referenced object or session does not exist on the provider.
    #[error("not found: {0}")]
    NotFound(String),
}

#[derive(Debug, Error)]
pub enum VerificationError {
    #[error("invalid input: {0}")]
    Validation(String),

    #[error("sessionId is required")]
    MissingSessionId,

    #[error("both idImageKey and livenessImageBytes are required")]
    MissingImages,

    #[error("not found or not permitted")]
    NotFoundOrUnauthorized,

    #[error("provider error: {0}")]
    Provider(ProviderError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl VerificationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) | Self::MissingSessionId | Self::MissingImages => {
                ErrorKind::Validation
            }
            Self::NotFoundOrUnauthorized => ErrorKind::NotFoundOrUnauthorized,
            Self::Provider(_) => ErrorKind::Provider,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }
}

impl From<ProviderError> for VerificationError {
    fn from(e: ProviderError) -> Self {
        match e {
            ProviderError::NotFound(_) => Self::NotFoundOrUnauthorized,
            other => Self::Provider(other),
        }
    }
}

impl From<StoreError> for VerificationError {
    fn from(e: StoreError) -> Self {
        Self::Internal(e.to_string())
    }
}

impl From<AuditError> for VerificationError {
    fn from(e: AuditError) -> Self {
        Self::Internal(e.to_string())
    }
}
