//! Contracts for the external collaborators the pipeline delegates to.
//!
//! All calls are short-lived, idempotent network requests; the pipeline
//! never retries them itself and never maps their failure to a verdict.

use crate::blocks::Block;
use crate::error::ProviderError;
use async_trait::async_trait;
use nexus_types::{LivenessStatus, Timestamp};
use serde::{Deserialize, Serialize};

/// Blob storage issuing time-boxed credentials.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// A URL the caller can `PUT` exactly one object to at `key` until
    /// `expires_at`, with the given content type.
    async fn presign_put(
        &self,
        key: &str,
        content_type: &str,
        expires_at: Timestamp,
    ) -> Result<String, ProviderError>;

    /// Fetch an object's bytes. Missing keys are [`ProviderError::NotFound`].
    async fn get_object(&self, key: &str) -> Result<Vec<u8>, ProviderError>;
}

/// Structured document analysis (OCR with key/value detection).
#[async_trait]
pub trait DocumentAnalyzer: Send + Sync {
    /// Analyse the stored document at `key` and return its block graph.
    async fn analyze_document(&self, key: &str) -> Result<Vec<Block>, ProviderError>;
}

/// Provider-side state of a liveness challenge.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LivenessResult {
    pub status: LivenessStatus,
    /// 0–100, present once the session has been scored.
    pub confidence: Option<f32>,
    /// A frame from the capture, used as the face-match target.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_image: Option<Vec<u8>>,
}

/// One candidate from a face comparison.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FaceMatch {
    /// 0–100.
    pub similarity: f32,
}

/// Liveness challenges and face similarity.
#[async_trait]
pub trait BiometricProvider: Send + Sync {
    /// Open a liveness challenge; returns the provider's session id.
    async fn create_liveness_session(&self) -> Result<String, ProviderError>;

    /// Poll a session. Side-effect-free; the caller owns the cadence.
    async fn get_liveness_result(&self, session_id: &str)
        -> Result<LivenessResult, ProviderError>;

    /// Compare the face in `source` with faces in `target`, returning
    /// candidates at or above `similarity_threshold`, best first.
    async fn compare_faces(
        &self,
        source: &[u8],
        target: &[u8],
        similarity_threshold: f32,
    ) -> Result<Vec<FaceMatch>, ProviderError>;
}
