//! Parse errors for the string forms of shared types.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("unknown role: {0}")]
    UnknownRole(String),

    #[error("unknown pairing action: {0}")]
    UnknownAction(String),

    #[error("unknown status: {0}")]
    UnknownStatus(String),

    #[error("identifier must not be empty")]
    EmptyId,

    #[error("identifier contains a path separator or control character: {0:?}")]
    InvalidId(String),
}

/// Caller-facing error taxonomy shared by every engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Missing or malformed input; never retried.
    Validation,
    /// The target does not exist or belongs to someone else. The two cases
    /// are deliberately indistinguishable.
    NotFoundOrUnauthorized,
    /// A business rule refused the operation (duplicate request, pardon used).
    Conflict,
    /// A downstream provider failed; the caller may retry.
    Provider,
    /// Unexpected store or programming failure.
    Internal,
}

impl ErrorKind {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Provider)
    }
}
