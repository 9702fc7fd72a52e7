//! Externally visible status, derived on read.

use crate::AuditError;
use nexus_store::{NexusStore, VerificationRecord};
use nexus_types::{AccessStatus, AgentId, Role, UserId, VerificationOutcome};
use std::sync::Arc;

/// Read-side projection over pairing rows and verification outcomes.
#[derive(Clone)]
pub struct StatusProjection {
    store: Arc<dyn NexusStore>,
}

impl StatusProjection {
    pub fn new(store: Arc<dyn NexusStore>) -> Self {
        Self { store }
    }

    /// `Verified` iff the agent has at least one accepted pairing request,
    /// however many rejected or cancelled rows also exist.
    pub fn agent_status(&self, agent: &AgentId) -> Result<AccessStatus, AuditError> {
        if self.store.has_accepted_request(agent)? {
            Ok(AccessStatus::Verified)
        } else {
            Ok(AccessStatus::PendingApproval)
        }
    }

    /// `Verified` iff the user's latest recorded identity outcome is verified.
    pub fn identity_status(&self, user: &UserId) -> Result<AccessStatus, AuditError> {
        let latest = self.store.latest_verification_record(user)?;
        Ok(match latest {
            Some(record) if record.outcome == VerificationOutcome::Verified => {
                AccessStatus::Verified
            }
            _ => AccessStatus::PendingApproval,
        })
    }

    /// Whether the user may proceed: identity verified, and for agents also
    /// paired with a broker.
    pub fn access_status(&self, user: &UserId, role: Role) -> Result<AccessStatus, AuditError> {
        if !self.identity_status(user)?.is_verified() {
            return Ok(AccessStatus::PendingApproval);
        }
        match role {
            Role::Agent => self.agent_status(&AgentId::new(user.as_str())),
            Role::Broker | Role::Client => Ok(AccessStatus::Verified),
        }
    }

    /// Persist a terminal outcome. `Pending` outcomes are not recorded.
    pub fn record_outcome(&self, record: &VerificationRecord) -> Result<bool, AuditError> {
        if !record.outcome.is_terminal() {
            return Ok(false);
        }
        self.store.put_verification_record(record)?;
        tracing::info!(
            user = %record.user_id,
            outcome = %record.outcome,
            "verification outcome recorded"
        );
        Ok(true)
    }

    pub fn latest_outcome(&self, user: &UserId) -> Result<Option<VerificationRecord>, AuditError> {
        Ok(self.store.latest_verification_record(user)?)
    }
}
