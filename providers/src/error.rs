use nexus_crypto::CryptoError;
use thiserror::Error;

/// Why a signed upload was refused.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("upload credential has expired")]
    Expired,

    #[error("upload signature does not match")]
    BadSignature,

    #[error("object already uploaded; credentials are single-use")]
    AlreadyUsed,

    #[error("invalid object key: {0}")]
    InvalidKey(String),

    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("signing error: {0}")]
    Signing(#[from] CryptoError),
}
