//! Nullable providers: scripted object store, document analyzer and
//! biometrics. Nothing leaves the process.

use async_trait::async_trait;
use nexus_types::{LivenessStatus, Timestamp};
use nexus_verification::{
    BiometricProvider, Block, DocumentAnalyzer, FaceMatch, LivenessResult, ObjectStore,
    ProviderError,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

fn unavailable(failing: &AtomicBool, what: &str) -> Result<(), ProviderError> {
    if failing.load(Ordering::SeqCst) {
        Err(ProviderError::Unavailable(format!("null {what} set to fail")))
    } else {
        Ok(())
    }
}

fn poisoned<T>(_: T) -> ProviderError {
    ProviderError::Unavailable("null provider lock poisoned".into())
}

/// In-memory blob store. Pre-signed URLs use a `null://` scheme.
#[derive(Default)]
pub struct NullObjectStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
    presigned: Mutex<Vec<(String, String, Timestamp)>>,
    failing: AtomicBool,
}

impl NullObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an object as if a client had uploaded it.
    pub fn put(&self, key: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        if let Ok(mut objects) = self.objects.lock() {
            objects.insert(key.into(), bytes.into());
        }
    }

    /// `(key, content_type, expires_at)` of every issued credential.
    pub fn presigned(&self) -> Vec<(String, String, Timestamp)> {
        self.presigned.lock().map(|p| p.clone()).unwrap_or_default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl ObjectStore for NullObjectStore {
    async fn presign_put(
        &self,
        key: &str,
        content_type: &str,
        expires_at: Timestamp,
    ) -> Result<String, ProviderError> {
        unavailable(&self.failing, "object store")?;
        self.presigned.lock().map_err(poisoned)?.push((
            key.to_string(),
            content_type.to_string(),
            expires_at,
        ));
        Ok(format!(
            "null://objects/{key}?expires={}",
            expires_at.as_secs()
        ))
    }

    async fn get_object(&self, key: &str) -> Result<Vec<u8>, ProviderError> {
        unavailable(&self.failing, "object store")?;
        self.objects
            .lock()
            .map_err(poisoned)?
            .get(key)
            .cloned()
            .ok_or_else(|| ProviderError::NotFound(key.to_string()))
    }
}

/// Returns a scripted block graph per document key.
#[derive(Default)]
pub struct NullDocumentAnalyzer {
    documents: Mutex<HashMap<String, Vec<Block>>>,
    failing: AtomicBool,
    calls: AtomicU64,
}

impl NullDocumentAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&self, key: impl Into<String>, blocks: Vec<Block>) {
        if let Ok(mut documents) = self.documents.lock() {
            documents.insert(key.into(), blocks);
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of analysis requests received.
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentAnalyzer for NullDocumentAnalyzer {
    async fn analyze_document(&self, key: &str) -> Result<Vec<Block>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        unavailable(&self.failing, "document analyzer")?;
        self.documents
            .lock()
            .map_err(poisoned)?
            .get(key)
            .cloned()
            .ok_or_else(|| ProviderError::NotFound(key.to_string()))
    }
}

/// Scripted liveness sessions and face-comparison results.
///
/// New sessions start in `Created`; tests move them along with
/// [`set_result`](Self::set_result).
#[derive(Default)]
pub struct NullBiometrics {
    sessions: Mutex<HashMap<String, LivenessResult>>,
    next_session: AtomicU64,
    matches: Mutex<Vec<FaceMatch>>,
    last_threshold: Mutex<Option<f32>>,
    failing: AtomicBool,
}

impl NullBiometrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_result(&self, session_id: impl Into<String>, result: LivenessResult) {
        if let Ok(mut sessions) = self.sessions.lock() {
            sessions.insert(session_id.into(), result);
        }
    }

    /// Shorthand: a succeeded session with the given reference frame.
    pub fn succeed(&self, session_id: impl Into<String>, reference_image: impl Into<Vec<u8>>) {
        self.set_result(
            session_id,
            LivenessResult {
                status: LivenessStatus::Succeeded,
                confidence: Some(99.0),
                reference_image: Some(reference_image.into()),
            },
        );
    }

    /// Candidates returned by every subsequent comparison, best first.
    pub fn set_matches(&self, matches: Vec<FaceMatch>) {
        if let Ok(mut m) = self.matches.lock() {
            *m = matches;
        }
    }

    /// Similarity floor passed on the most recent comparison.
    pub fn last_threshold(&self) -> Option<f32> {
        self.last_threshold.lock().ok().and_then(|t| *t)
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl BiometricProvider for NullBiometrics {
    async fn create_liveness_session(&self) -> Result<String, ProviderError> {
        unavailable(&self.failing, "biometrics")?;
        let id = format!("null-session-{}", self.next_session.fetch_add(1, Ordering::SeqCst) + 1);
        self.sessions.lock().map_err(poisoned)?.insert(
            id.clone(),
            LivenessResult {
                status: LivenessStatus::Created,
                confidence: None,
                reference_image: None,
            },
        );
        Ok(id)
    }

    async fn get_liveness_result(
        &self,
        session_id: &str,
    ) -> Result<LivenessResult, ProviderError> {
        unavailable(&self.failing, "biometrics")?;
        self.sessions
            .lock()
            .map_err(poisoned)?
            .get(session_id)
            .cloned()
            .ok_or_else(|| ProviderError::NotFound(session_id.to_string()))
    }

    async fn compare_faces(
        &self,
        _source: &[u8],
        _target: &[u8],
        similarity_threshold: f32,
    ) -> Result<Vec<FaceMatch>, ProviderError> {
        unavailable(&self.failing, "biometrics")?;
        *self.last_threshold.lock().map_err(poisoned)? = Some(similarity_threshold);
        Ok(self.matches.lock().map_err(poisoned)?.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sessions_start_created_and_follow_script() {
        let bio = NullBiometrics::new();
        let id = bio.create_liveness_session().await.unwrap();
        assert_eq!(
            bio.get_liveness_result(&id).await.unwrap().status,
            LivenessStatus::Created
        );
        bio.succeed(id.clone(), b"frame".to_vec());
        let result = bio.get_liveness_result(&id).await.unwrap();
        assert_eq!(result.status, LivenessStatus::Succeeded);
        assert_eq!(result.reference_image.as_deref(), Some(&b"frame"[..]));
    }

    #[tokio::test]
    async fn unknown_objects_are_not_found() {
        let objects = NullObjectStore::new();
        assert!(matches!(
            objects.get_object("temp/u/x").await,
            Err(ProviderError::NotFound(_))
        ));
        objects.put("temp/u/x", b"data".to_vec());
        assert_eq!(objects.get_object("temp/u/x").await.unwrap(), b"data");
    }

    #[tokio::test]
    async fn failing_mode_is_unavailable() {
        let docs = NullDocumentAnalyzer::new();
        docs.set_failing(true);
        assert!(matches!(
            docs.analyze_document("k").await,
            Err(ProviderError::Unavailable(_))
        ));
        assert_eq!(docs.calls(), 1);
    }
}
