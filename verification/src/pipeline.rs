//! The verification decision pipeline.
//!
//! Document capture → field extraction → liveness capture → face match →
//! aggregate decision. Each stage is callable on its own (the client drives
//! the flow step by step) and [`VerificationPipeline::verify_identity`] runs
//! the decision stages end to end for an attempt whose uploads and liveness
//! capture are done.
//!
//! Provider failures abort the current call with a retryable error. They
//! are never turned into a verdict. Store writes are synchronous LMDB
//! transactions and run on tokio's blocking pool.

use crate::decision;
use crate::error::{ProviderError, VerificationError};
use crate::extraction::{extract_fields, FieldMap};
use crate::face_match::{FaceComparison, Thresholds};
use crate::liveness::{self, LivenessAction, LivenessReply};
use crate::provider::{BiometricProvider, DocumentAnalyzer, ObjectStore};
use crate::session::VerificationSession;
use crate::upload::{self, key_belongs_to, UploadTarget};
use base64::Engine;
use nexus_audit::{Activity, ActivityLog, Actor, StatusProjection};
use nexus_store::{ActionType, NexusStore};
use nexus_types::{Clock, LivenessStatus, VerificationParams};
use rand::{CryptoRng, RngCore};
use std::sync::Arc;

/// The external collaborators the pipeline delegates to.
#[derive(Clone)]
pub struct Providers {
    pub objects: Arc<dyn ObjectStore>,
    pub documents: Arc<dyn DocumentAnalyzer>,
    pub biometrics: Arc<dyn BiometricProvider>,
}

pub struct VerificationPipeline {
    providers: Providers,
    log: ActivityLog,
    projection: StatusProjection,
    clock: Arc<dyn Clock>,
    params: VerificationParams,
    thresholds: Thresholds,
}

impl VerificationPipeline {
    pub fn new(
        providers: Providers,
        store: Arc<dyn NexusStore>,
        clock: Arc<dyn Clock>,
        params: VerificationParams,
    ) -> Self {
        Self {
            providers,
            log: ActivityLog::new(store.clone(), clock.clone()),
            projection: StatusProjection::new(store),
            thresholds: Thresholds::from(&params),
            clock,
            params,
        }
    }

    pub fn params(&self) -> &VerificationParams {
        &self.params
    }

    /// Issue a single-use write credential for `temp/{user}/{type}-{random}`.
    pub async fn issue_upload_target<R: RngCore + CryptoRng>(
        &self,
        actor: &Actor,
        document_type: &str,
        content_type: &str,
        rng: &mut R,
    ) -> Result<UploadTarget, VerificationError> {
        let key = upload::prepare(rng, &actor.id, document_type, content_type)?;
        let expires_at = self
            .clock
            .now()
            .plus_secs(self.params.effective_upload_ttl());

        let url = self
            .providers
            .objects
            .presign_put(&key, content_type.trim(), expires_at)
            .await
            .map_err(|e| provider_failure("presign_put", e))?;

        self.record_activity(
            Activity::by(actor.id.as_str(), actor, ActionType::UploadTargetIssued)
                .description(format!("upload target issued for {document_type}"))
                .meta("key", &key)
                .meta("expires_at", expires_at.as_secs()),
        )
        .await;
        tracing::debug!(user = %actor.id, %key, %expires_at, "upload target issued");
        Ok(UploadTarget {
            url,
            key,
            expires_at,
        })
    }

    /// Run structured-document analysis on an uploaded document and flatten
    /// the block graph into fields.
    pub async fn extract_fields(
        &self,
        actor: &Actor,
        storage_key: &str,
    ) -> Result<FieldMap, VerificationError> {
        let fields = self.extract(actor, storage_key).await?;
        self.record_activity(
            Activity::by(actor.id.as_str(), actor, ActionType::DocumentExtracted)
                .description("document fields extracted")
                .meta("key", storage_key)
                .meta("field_count", fields.len()),
        )
        .await;
        Ok(fields)
    }

    async fn extract(
        &self,
        actor: &Actor,
        storage_key: &str,
    ) -> Result<FieldMap, VerificationError> {
        let storage_key = storage_key.trim();
        if storage_key.is_empty() {
            return Err(VerificationError::Validation("storage key is required".into()));
        }
        ensure_owned(storage_key, actor)?;

        let blocks = self
            .providers
            .documents
            .analyze_document(storage_key)
            .await
            .map_err(|e| provider_failure("analyze_document", e))?;
        let fields = extract_fields(&blocks);
        tracing::debug!(
            user = %actor.id,
            blocks = blocks.len(),
            fields = fields.len(),
            "document analysed"
        );
        Ok(fields)
    }

    /// Create a liveness session or poll its results.
    pub async fn liveness(
        &self,
        actor: &Actor,
        action: LivenessAction,
    ) -> Result<LivenessReply, VerificationError> {
        let creating = matches!(action, LivenessAction::Create);
        let reply = liveness::dispatch(self.providers.biometrics.as_ref(), action)
            .await
            .map_err(|e| match e {
                VerificationError::Provider(p) => provider_failure("liveness", p),
                other => other,
            })?;
        if let (true, LivenessReply::Created { session_id }) = (creating, &reply) {
            self.record_activity(
                Activity::by(actor.id.as_str(), actor, ActionType::LivenessSessionCreated)
                    .description("liveness session created")
                    .meta("session_id", session_id),
            )
            .await;
        }
        Ok(reply)
    }

    /// Compare the stored ID image with an inline liveness frame (base64)
    /// and classify the best candidate.
    pub async fn compare_faces(
        &self,
        actor: &Actor,
        id_image_key: Option<&str>,
        liveness_image_b64: Option<&str>,
    ) -> Result<FaceComparison, VerificationError> {
        let (id_image_key, encoded) = match (non_blank(id_image_key), non_blank(liveness_image_b64))
        {
            (Some(key), Some(encoded)) => (key, encoded),
            _ => return Err(VerificationError::MissingImages),
        };
        let live = decode_image(encoded)?;
        let comparison = self.compare(actor, id_image_key, &live).await?;

        let mut activity = Activity::by(actor.id.as_str(), actor, ActionType::FacesCompared)
            .description(format!("face comparison: {}", comparison.outcome))
            .meta("outcome", comparison.outcome);
        if let Some(similarity) = comparison.similarity {
            activity = activity.meta("similarity", similarity);
        }
        self.record_activity(activity).await;
        Ok(comparison)
    }

    async fn compare(
        &self,
        actor: &Actor,
        id_image_key: &str,
        live: &[u8],
    ) -> Result<FaceComparison, VerificationError> {
        ensure_owned(id_image_key, actor)?;
        let id_image = self
            .providers
            .objects
            .get_object(id_image_key)
            .await
            .map_err(|e| provider_failure("get_object", e))?;
        let matches = self
            .providers
            .biometrics
            .compare_faces(&id_image, live, self.thresholds.review)
            .await
            .map_err(|e| provider_failure("compare_faces", e))?;
        let comparison = self.thresholds.decide(&matches);
        tracing::debug!(
            user = %actor.id,
            candidates = matches.len(),
            outcome = %comparison.outcome,
            "faces compared"
        );
        Ok(comparison)
    }

    /// Run the decision stages for one attempt and record the verdict.
    ///
    /// A liveness session that is still running yields `pending` and records
    /// nothing; the caller polls again later.
    pub async fn verify_identity(
        &self,
        actor: &Actor,
        document_key: &str,
        id_image_key: &str,
        liveness_session_id: &str,
    ) -> Result<VerificationSession, VerificationError> {
        let session_id = liveness::required_session_id(Some(liveness_session_id))?;
        let document_key = document_key.trim();
        let id_image_key = id_image_key.trim();
        if document_key.is_empty() || id_image_key.is_empty() {
            return Err(VerificationError::MissingImages);
        }
        ensure_owned(document_key, actor)?;
        ensure_owned(id_image_key, actor)?;

        let mut session = VerificationSession::new(
            actor.id.clone(),
            document_key.to_string(),
            session_id.to_string(),
        );

        let live = self
            .providers
            .biometrics
            .get_liveness_result(session_id)
            .await
            .map_err(|e| provider_failure("get_liveness_result", e))?;
        session.liveness_status = live.status;

        match live.status {
            LivenessStatus::Created | LivenessStatus::InProgress => {
                tracing::debug!(user = %actor.id, session = session_id, "liveness not finished");
                return Ok(session);
            }
            LivenessStatus::Failed => {}
            LivenessStatus::Succeeded => {
                let Some(reference) = live.reference_image.as_deref() else {
                    return Err(provider_failure(
                        "get_liveness_result",
                        ProviderError::InvalidResponse(
                            "succeeded liveness session without a reference image".into(),
                        ),
                    ));
                };
                session.extracted_fields = self.extract(actor, document_key).await?;
                let comparison = self.compare(actor, id_image_key, reference).await?;
                session.similarity = comparison.similarity;
                session.outcome = comparison.outcome;
            }
        }

        session.outcome = decision::aggregate(
            session.liveness_status,
            session.extracted_fields.len(),
            session.outcome,
        );
        self.conclude(actor, &session).await?;
        Ok(session)
    }

    async fn conclude(
        &self,
        actor: &Actor,
        session: &VerificationSession,
    ) -> Result<(), VerificationError> {
        let now = self.clock.now();
        if let Some(record) = session.to_record(now) {
            let projection = self.projection.clone();
            run_blocking(move || projection.record_outcome(&record)).await??;
        }
        let mut activity = Activity::by(actor.id.as_str(), actor, ActionType::IdentityDecided)
            .description(format!("identity verification {}", session.outcome))
            .meta("outcome", session.outcome)
            .meta("field_count", session.extracted_fields.len())
            .meta("liveness_session_id", &session.liveness_session_id);
        if let Some(similarity) = session.similarity {
            activity = activity.meta("similarity", similarity);
        }
        self.record_activity(activity).await;

        tracing::info!(
            user = %actor.id,
            outcome = %session.outcome,
            similarity = ?session.similarity,
            "identity verification decided"
        );
        Ok(())
    }

    /// Append an activity entry off the async workers. Failures are logged.
    async fn record_activity(&self, activity: Activity) {
        let log = self.log.clone();
        if let Err(e) = run_blocking(move || log.record_best_effort(activity)).await {
            tracing::error!(error = %e, "activity writer task failed");
        }
    }
}

async fn run_blocking<T, F>(f: F) -> Result<T, VerificationError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| VerificationError::Internal(format!("blocking store task: {e}")))
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Keys outside the caller's upload namespace look exactly like missing ones.
fn ensure_owned(key: &str, actor: &Actor) -> Result<(), VerificationError> {
    if key_belongs_to(key, &actor.id) {
        Ok(())
    } else {
        tracing::debug!(user = %actor.id, %key, "key outside caller namespace");
        Err(VerificationError::NotFoundOrUnauthorized)
    }
}

/// Decode a base64 frame, accepting an optional `data:...;base64,` prefix.
fn decode_image(encoded: &str) -> Result<Vec<u8>, VerificationError> {
    let payload = encoded
        .split_once("base64,")
        .map_or(encoded, |(_, data)| data)
        .trim();
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(payload)
        .map_err(|_| VerificationError::Validation("livenessImageBytes is not valid base64".into()))?;
    if bytes.is_empty() {
        return Err(VerificationError::MissingImages);
    }
    Ok(bytes)
}

fn provider_failure(operation: &'static str, error: ProviderError) -> VerificationError {
    match &error {
        ProviderError::NotFound(_) => {
            tracing::debug!(operation, error = %error, "provider reported missing resource")
        }
        _ => tracing::warn!(operation, error = %error, "provider call failed"),
    }
    error.into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_plain_and_data_url_base64() {
        assert_eq!(decode_image("aGVsbG8=").unwrap(), b"hello");
        assert_eq!(
            decode_image("data:image/jpeg;base64,aGVsbG8=").unwrap(),
            b"hello"
        );
    }

    #[test]
    fn invalid_base64_is_a_validation_error() {
        assert!(matches!(
            decode_image("%%%"),
            Err(VerificationError::Validation(_))
        ));
    }

    #[test]
    fn blank_inputs_count_as_missing() {
        assert_eq!(non_blank(Some("  ")), None);
        assert_eq!(non_blank(None), None);
        assert_eq!(non_blank(Some(" k ")), Some("k"));
    }
}
