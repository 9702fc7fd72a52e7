//! Pairing request storage trait.

use crate::StoreError;
use nexus_types::{AgentId, BrokerId, PairingStatus, RequestId, Timestamp};
use serde::{Deserialize, Serialize};

/// One agent-to-broker link attempt.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairingRequest {
    pub id: RequestId,
    pub agent_id: AgentId,
    pub broker_id: BrokerId,
    pub status: PairingStatus,
    pub created_at: Timestamp,
    pub responded_at: Option<Timestamp>,
}

/// Result of an atomic cancel-with-pardon-check.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CancelOutcome {
    /// The agent's pending request moved to `cancelled`.
    Cancelled(PairingRequest),
    /// No pending request existed; nothing changed.
    NothingPending,
    /// The agent already used their pardon allotment; nothing changed.
    PardonExhausted,
}

/// Trait for pairing request storage.
///
/// Implementations must enforce "at most one `pending` or `accepted` row
/// per agent" inside the insert, and must run the conditional updates
/// atomically with respect to each other.
pub trait PairingStore {
    /// Insert a new request.
    ///
    /// Fails with [`StoreError::Duplicate`] if the agent already has an
    /// active (`pending` or `accepted`) request, or the id is taken.
    fn insert_pairing_request(&self, request: &PairingRequest) -> Result<(), StoreError>;

    fn get_pairing_request(&self, id: &RequestId) -> Result<Option<PairingRequest>, StoreError>;

    /// Conditional update: only a row matching `id`, `broker` and status
    /// `pending` moves to `status`, stamped `responded_at = at`.
    ///
    /// Returns the updated row, or `None` when nothing matched.
    fn resolve_pending_request(
        &self,
        id: &RequestId,
        broker: &BrokerId,
        status: PairingStatus,
        at: Timestamp,
    ) -> Result<Option<PairingRequest>, StoreError>;

    /// Cancel the agent's pending request if they have fewer than
    /// `pardon_limit` cancelled rows, re-checking the count in the same
    /// atomic write.
    fn cancel_pending_request(
        &self,
        agent: &AgentId,
        at: Timestamp,
        pardon_limit: u64,
    ) -> Result<CancelOutcome, StoreError>;

    /// Number of the agent's rows in `status`.
    fn count_requests_with_status(
        &self,
        agent: &AgentId,
        status: PairingStatus,
    ) -> Result<u64, StoreError>;

    /// All of an agent's requests, newest first.
    fn requests_for_agent(&self, agent: &AgentId) -> Result<Vec<PairingRequest>, StoreError>;

    /// Pending requests addressed to a broker, newest first.
    fn pending_requests_for_broker(
        &self,
        broker: &BrokerId,
    ) -> Result<Vec<PairingRequest>, StoreError>;

    /// Whether the agent has at least one accepted request.
    fn has_accepted_request(&self, agent: &AgentId) -> Result<bool, StoreError> {
        self.count_requests_with_status(agent, PairingStatus::Accepted)
            .map(|n| n > 0)
    }
}

/// Sort newest first; ties broken by id so ordering is total.
pub fn sort_newest_first(requests: &mut [PairingRequest]) {
    requests.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.id.cmp(&a.id))
    });
}
