//! Append-only activity log storage trait.

use crate::StoreError;
use nexus_types::{Role, Timestamp, UserId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// What happened.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    NexusProvisioned,
    PairingRequested,
    PairingAccepted,
    PairingRejected,
    PairingCancelled,
    UploadTargetIssued,
    DocumentExtracted,
    LivenessSessionCreated,
    FacesCompared,
    IdentityDecided,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NexusProvisioned => "nexus_provisioned",
            Self::PairingRequested => "pairing_requested",
            Self::PairingAccepted => "pairing_accepted",
            Self::PairingRejected => "pairing_rejected",
            Self::PairingCancelled => "pairing_cancelled",
            Self::UploadTargetIssued => "upload_target_issued",
            Self::DocumentExtracted => "document_extracted",
            Self::LivenessSessionCreated => "liveness_session_created",
            Self::FacesCompared => "faces_compared",
            Self::IdentityDecided => "identity_decided",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An entry before the store has sequenced it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewActivity {
    /// Transaction or user the entry belongs to.
    pub subject: String,
    pub actor_id: UserId,
    pub actor_role: Role,
    pub action_type: ActionType,
    pub description: String,
    pub metadata: BTreeMap<String, String>,
    pub created_at: Timestamp,
}

/// A stored, immutable activity entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActivityLogEntry {
    /// Store-assigned, strictly increasing across the whole log.
    pub seq: u64,
    pub subject: String,
    pub actor_id: UserId,
    pub actor_role: Role,
    pub action_type: ActionType,
    pub description: String,
    pub metadata: BTreeMap<String, String>,
    pub created_at: Timestamp,
}

impl ActivityLogEntry {
    pub fn from_new(seq: u64, new: NewActivity) -> Self {
        Self {
            seq,
            subject: new.subject,
            actor_id: new.actor_id,
            actor_role: new.actor_role,
            action_type: new.action_type,
            description: new.description,
            metadata: new.metadata,
            created_at: new.created_at,
        }
    }
}

/// Trait for the append-only activity log. There is no update or delete.
pub trait ActivityLogStore {
    /// Append an entry, returning it with its assigned sequence number.
    fn append_activity(&self, entry: NewActivity) -> Result<ActivityLogEntry, StoreError>;

    /// Up to `limit` entries for `subject`, ordered by `created_at`
    /// descending (ties: latest appended first).
    fn activity_for_subject(
        &self,
        subject: &str,
        limit: usize,
    ) -> Result<Vec<ActivityLogEntry>, StoreError>;
}
