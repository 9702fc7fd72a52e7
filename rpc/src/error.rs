//! RPC error type and its HTTP mapping.
//!
//! Validation, lookup and business-rule failures carry their message to the
//! caller. Provider and internal failures are logged here with full detail
//! and reported with a generic message.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use nexus_audit::AuditError;
use nexus_pairing::PairingError;
use nexus_providers::UploadError;
use nexus_store::StoreError;
use nexus_types::{ErrorKind, Role};
use nexus_verification::VerificationError;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("missing or invalid caller identity")]
    Unauthenticated,

    #[error("this operation requires the {0} role")]
    Forbidden(Role),

    #[error("upload refused: {0}")]
    UploadRefused(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("not found or not permitted")]
    NotFound,

    #[error("{0}")]
    Conflict(String),

    #[error("an upstream provider is unavailable, please retry")]
    Unavailable,

    #[error("internal server error")]
    Internal,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    code: &'static str,
    retryable: bool,
}

impl RpcError {
    /// Map an error kind onto the caller-visible error, logging detail that
    /// must not leave the server.
    fn from_kind(kind: ErrorKind, detail: String) -> Self {
        match kind {
            ErrorKind::Validation => RpcError::BadRequest(detail),
            ErrorKind::NotFoundOrUnauthorized => RpcError::NotFound,
            ErrorKind::Conflict => RpcError::Conflict(detail),
            ErrorKind::Provider => {
                tracing::warn!(error = %detail, "provider failure");
                RpcError::Unavailable
            }
            ErrorKind::Internal => {
                tracing::error!(error = %detail, "internal failure");
                RpcError::Internal
            }
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            RpcError::Unauthenticated => StatusCode::UNAUTHORIZED,
            RpcError::Forbidden(_) | RpcError::UploadRefused(_) => StatusCode::FORBIDDEN,
            RpcError::BadRequest(_) => StatusCode::BAD_REQUEST,
            RpcError::NotFound => StatusCode::NOT_FOUND,
            RpcError::Conflict(_) => StatusCode::CONFLICT,
            RpcError::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            RpcError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            RpcError::Unauthenticated => "UNAUTHENTICATED",
            RpcError::Forbidden(_) => "FORBIDDEN",
            RpcError::UploadRefused(_) => "UPLOAD_REFUSED",
            RpcError::BadRequest(_) => "BAD_REQUEST",
            RpcError::NotFound => "NOT_FOUND",
            RpcError::Conflict(_) => "CONFLICT",
            RpcError::Unavailable => "UNAVAILABLE",
            RpcError::Internal => "INTERNAL",
        }
    }
}

impl IntoResponse for RpcError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.to_string(),
            code: self.code(),
            retryable: matches!(self, RpcError::Unavailable),
        };
        (self.status(), Json(body)).into_response()
    }
}

impl From<PairingError> for RpcError {
    fn from(e: PairingError) -> Self {
        RpcError::from_kind(e.kind(), e.to_string())
    }
}

impl From<VerificationError> for RpcError {
    fn from(e: VerificationError) -> Self {
        RpcError::from_kind(e.kind(), e.to_string())
    }
}

impl From<AuditError> for RpcError {
    fn from(e: AuditError) -> Self {
        RpcError::from_kind(ErrorKind::Internal, e.to_string())
    }
}

impl From<StoreError> for RpcError {
    fn from(e: StoreError) -> Self {
        RpcError::from_kind(ErrorKind::Internal, e.to_string())
    }
}

impl From<UploadError> for RpcError {
    fn from(e: UploadError) -> Self {
        match e {
            UploadError::Expired | UploadError::BadSignature => {
                RpcError::UploadRefused(e.to_string())
            }
            UploadError::AlreadyUsed => RpcError::Conflict(e.to_string()),
            UploadError::InvalidKey(_) => RpcError::BadRequest(e.to_string()),
            UploadError::Io(_) | UploadError::Signing(_) => {
                RpcError::from_kind(ErrorKind::Internal, e.to_string())
            }
        }
    }
}
