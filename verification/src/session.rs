//! Ephemeral state of one identity-verification attempt.
//!
//! Only the terminal outcome outlives the attempt; see
//! [`VerificationSession::to_record`].

use crate::extraction::FieldMap;
use nexus_store::VerificationRecord;
use nexus_types::{LivenessStatus, Timestamp, UserId, VerificationOutcome};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationSession {
    pub user_id: UserId,
    pub document_key: String,
    pub extracted_fields: FieldMap,
    pub liveness_session_id: String,
    pub liveness_status: LivenessStatus,
    pub similarity: Option<f32>,
    pub outcome: VerificationOutcome,
}

impl VerificationSession {
    pub fn new(user_id: UserId, document_key: String, liveness_session_id: String) -> Self {
        Self {
            user_id,
            document_key,
            extracted_fields: FieldMap::new(),
            liveness_session_id,
            liveness_status: LivenessStatus::Created,
            similarity: None,
            outcome: VerificationOutcome::Pending,
        }
    }

    /// The persisted form, if the attempt reached a verdict.
    pub fn to_record(&self, decided_at: Timestamp) -> Option<VerificationRecord> {
        if !self.outcome.is_terminal() {
            return None;
        }
        Some(VerificationRecord {
            user_id: self.user_id.clone(),
            outcome: self.outcome,
            similarity: self.similarity,
            field_count: u32::try_from(self.extracted_fields.len()).unwrap_or(u32::MAX),
            decided_at,
        })
    }
}
