use nexus_audit::AuditError;
use nexus_crypto::CryptoError;
use nexus_store::StoreError;
use nexus_types::ErrorKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PairingError {
    #[error("unknown nexus code")]
    InvalidCode,

    #[error("pairing code is invalid or has expired")]
    InvalidOrExpiredCode,

    #[error("agent already has a pending or accepted pairing request")]
    DuplicateRequest,

    #[error("pairing request not found")]
    NotFoundOrUnauthorized,

    #[error("pardon already used: a pairing request can only be cancelled once")]
    PardonExhausted,

    #[error("broker already has a nexus code")]
    AlreadyProvisioned,

    #[error("invalid input: {0}")]
    Validation(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl PairingError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidCode | Self::InvalidOrExpiredCode | Self::Validation(_) => {
                ErrorKind::Validation
            }
            Self::NotFoundOrUnauthorized => ErrorKind::NotFoundOrUnauthorized,
            Self::DuplicateRequest | Self::PardonExhausted | Self::AlreadyProvisioned => {
                ErrorKind::Conflict
            }
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }
}

impl From<StoreError> for PairingError {
    fn from(e: StoreError) -> Self {
        Self::Internal(e.to_string())
    }
}

impl From<AuditError> for PairingError {
    fn from(e: AuditError) -> Self {
        Self::Internal(e.to_string())
    }
}

impl From<CryptoError> for PairingError {
    fn from(e: CryptoError) -> Self {
        Self::Internal(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn business_rule_errors_are_conflicts_and_not_retryable() {
        for e in [
            PairingError::DuplicateRequest,
            PairingError::PardonExhausted,
            PairingError::AlreadyProvisioned,
        ] {
            assert_eq!(e.kind(), ErrorKind::Conflict);
            assert!(!e.is_retryable());
        }
    }

    #[test]
    fn store_failures_are_internal() {
        let e = PairingError::from(StoreError::Backend("disk full".into()));
        assert_eq!(e.kind(), ErrorKind::Internal);
    }
}
