//! Terminal identity-verification outcomes.

use crate::StoreError;
use nexus_types::{Timestamp, UserId, VerificationOutcome};
use serde::{Deserialize, Serialize};

/// The persisted result of one verification attempt. Everything else about
/// the attempt is ephemeral.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VerificationRecord {
    pub user_id: UserId,
    pub outcome: VerificationOutcome,
    pub similarity: Option<f32>,
    pub field_count: u32,
    pub decided_at: Timestamp,
}

/// Trait for verification outcome storage.
pub trait VerificationRecordStore {
    /// Record an outcome; the newest record per user wins.
    fn put_verification_record(&self, record: &VerificationRecord) -> Result<(), StoreError>;

    fn latest_verification_record(
        &self,
        user: &UserId,
    ) -> Result<Option<VerificationRecord>, StoreError>;
}
