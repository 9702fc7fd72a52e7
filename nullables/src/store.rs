//! Nullable store: thread-safe in-memory storage for testing.

use nexus_store::pairing::sort_newest_first;
use nexus_store::{
    ActivityLogEntry, ActivityLogStore, CancelOutcome, NewActivity, NexusLink, NexusLinkStore,
    PairingRequest, PairingStore, StoreError, VerificationRecord, VerificationRecordStore,
};
use nexus_types::{AgentId, BrokerId, NexusCode, PairingStatus, RequestId, Timestamp, UserId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::thread::{self, ThreadId};

#[derive(Default)]
struct Tables {
    links_by_broker: HashMap<BrokerId, NexusLink>,
    broker_by_code: HashMap<NexusCode, BrokerId>,
    requests: HashMap<RequestId, PairingRequest>,
    activity: Vec<ActivityLogEntry>,
    next_seq: u64,
    verification: HashMap<UserId, VerificationRecord>,
}

/// An in-memory implementation of every store trait.
///
/// All tables sit behind one mutex, so each trait method is atomic the way
/// a single database transaction would be. Thread-safe for use with tokio's
/// multi-threaded runtime and `std::thread` stress tests.
pub struct NullStore {
    tables: Mutex<Tables>,
    failing: AtomicBool,
    writers: Mutex<Vec<ThreadId>>,
}

impl NullStore {
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(Tables::default()),
            failing: AtomicBool::new(false),
            writers: Mutex::new(Vec::new()),
        }
    }

    /// Make every subsequent call fail with a backend error (or recover).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of pairing rows of any status (for assertions).
    pub fn request_count(&self) -> usize {
        self.tables.lock().map(|t| t.requests.len()).unwrap_or(0)
    }

    /// Total activity entries across all subjects (for assertions).
    pub fn activity_count(&self) -> usize {
        self.tables.lock().map(|t| t.activity.len()).unwrap_or(0)
    }

    /// Threads that appended activity or verification records, in call order.
    pub fn writer_threads(&self) -> Vec<ThreadId> {
        self.writers.lock().map(|w| w.clone()).unwrap_or_default()
    }

    fn track_writer(&self) {
        if let Ok(mut writers) = self.writers.lock() {
            writers.push(thread::current().id());
        }
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>, StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("null store set to fail".into()));
        }
        self.tables
            .lock()
            .map_err(|_| StoreError::Backend("null store mutex poisoned".into()))
    }
}

impl Default for NullStore {
    fn default() -> Self {
        Self::new()
    }
}

impl NexusLinkStore for NullStore {
    fn insert_nexus_link(&self, link: &NexusLink) -> Result<(), StoreError> {
        let mut t = self.tables()?;
        if t.links_by_broker.contains_key(&link.broker_id) {
            return Err(StoreError::Duplicate(format!("broker {}", link.broker_id)));
        }
        if t.broker_by_code.contains_key(&link.nexus_code) {
            return Err(StoreError::Duplicate(format!("nexus code {}", link.nexus_code)));
        }
        t.broker_by_code
            .insert(link.nexus_code.clone(), link.broker_id.clone());
        t.links_by_broker
            .insert(link.broker_id.clone(), link.clone());
        Ok(())
    }

    fn get_nexus_link_by_code(&self, code: &NexusCode) -> Result<Option<NexusLink>, StoreError> {
        let t = self.tables()?;
        Ok(t.broker_by_code
            .get(code)
            .and_then(|broker| t.links_by_broker.get(broker))
            .cloned())
    }

    fn get_nexus_link_by_broker(
        &self,
        broker: &BrokerId,
    ) -> Result<Option<NexusLink>, StoreError> {
        Ok(self.tables()?.links_by_broker.get(broker).cloned())
    }
}

impl PairingStore for NullStore {
    fn insert_pairing_request(&self, request: &PairingRequest) -> Result<(), StoreError> {
        let mut t = self.tables()?;
        if t.requests.contains_key(&request.id) {
            return Err(StoreError::Duplicate(format!("request {}", request.id)));
        }
        let has_active = t
            .requests
            .values()
            .any(|r| r.agent_id == request.agent_id && r.status.is_active());
        if has_active {
            return Err(StoreError::Duplicate(format!(
                "active request for agent {}",
                request.agent_id
            )));
        }
        t.requests.insert(request.id.clone(), request.clone());
        Ok(())
    }

    fn get_pairing_request(&self, id: &RequestId) -> Result<Option<PairingRequest>, StoreError> {
        Ok(self.tables()?.requests.get(id).cloned())
    }

    fn resolve_pending_request(
        &self,
        id: &RequestId,
        broker: &BrokerId,
        status: PairingStatus,
        at: Timestamp,
    ) -> Result<Option<PairingRequest>, StoreError> {
        let mut t = self.tables()?;
        match t.requests.get_mut(id) {
            Some(row) if row.broker_id == *broker && row.status == PairingStatus::Pending => {
                row.status = status;
                row.responded_at = Some(at);
                Ok(Some(row.clone()))
            }
            _ => Ok(None),
        }
    }

    fn cancel_pending_request(
        &self,
        agent: &AgentId,
        at: Timestamp,
        pardon_limit: u64,
    ) -> Result<CancelOutcome, StoreError> {
        let mut t = self.tables()?;
        let cancelled = t
            .requests
            .values()
            .filter(|r| r.agent_id == *agent && r.status == PairingStatus::Cancelled)
            .count() as u64;
        if cancelled >= pardon_limit {
            return Ok(CancelOutcome::PardonExhausted);
        }
        let pending = t
            .requests
            .values_mut()
            .find(|r| r.agent_id == *agent && r.status == PairingStatus::Pending);
        match pending {
            Some(row) => {
                row.status = PairingStatus::Cancelled;
                row.responded_at = Some(at);
                Ok(CancelOutcome::Cancelled(row.clone()))
            }
            None => Ok(CancelOutcome::NothingPending),
        }
    }

    fn count_requests_with_status(
        &self,
        agent: &AgentId,
        status: PairingStatus,
    ) -> Result<u64, StoreError> {
        Ok(self
            .tables()?
            .requests
            .values()
            .filter(|r| r.agent_id == *agent && r.status == status)
            .count() as u64)
    }

    fn requests_for_agent(&self, agent: &AgentId) -> Result<Vec<PairingRequest>, StoreError> {
        let mut rows: Vec<PairingRequest> = self
            .tables()?
            .requests
            .values()
            .filter(|r| r.agent_id == *agent)
            .cloned()
            .collect();
        sort_newest_first(&mut rows);
        Ok(rows)
    }

    fn pending_requests_for_broker(
        &self,
        broker: &BrokerId,
    ) -> Result<Vec<PairingRequest>, StoreError> {
        let mut rows: Vec<PairingRequest> = self
            .tables()?
            .requests
            .values()
            .filter(|r| r.broker_id == *broker && r.status == PairingStatus::Pending)
            .cloned()
            .collect();
        sort_newest_first(&mut rows);
        Ok(rows)
    }
}

impl ActivityLogStore for NullStore {
    fn append_activity(&self, entry: NewActivity) -> Result<ActivityLogEntry, StoreError> {
        self.track_writer();
        let mut t = self.tables()?;
        t.next_seq += 1;
        let stored = ActivityLogEntry::from_new(t.next_seq, entry);
        t.activity.push(stored.clone());
        Ok(stored)
    }

    fn activity_for_subject(
        &self,
        subject: &str,
        limit: usize,
    ) -> Result<Vec<ActivityLogEntry>, StoreError> {
        let t = self.tables()?;
        let mut entries: Vec<ActivityLogEntry> = t
            .activity
            .iter()
            .filter(|e| e.subject == subject)
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.seq.cmp(&a.seq)));
        entries.truncate(limit);
        Ok(entries)
    }
}

impl VerificationRecordStore for NullStore {
    fn put_verification_record(&self, record: &VerificationRecord) -> Result<(), StoreError> {
        self.track_writer();
        let mut t = self.tables()?;
        let newer = t
            .verification
            .get(&record.user_id)
            .map_or(true, |existing| existing.decided_at <= record.decided_at);
        if newer {
            t.verification
                .insert(record.user_id.clone(), record.clone());
        }
        Ok(())
    }

    fn latest_verification_record(
        &self,
        user: &UserId,
    ) -> Result<Option<VerificationRecord>, StoreError> {
        Ok(self.tables()?.verification.get(user).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nexus_types::{Role, VerificationOutcome};
    use std::collections::BTreeMap;

    fn request(id: &str, agent: &str, broker: &str, status: PairingStatus, at: u64) -> PairingRequest {
        PairingRequest {
            id: RequestId::new(id),
            agent_id: AgentId::new(agent),
            broker_id: BrokerId::new(broker),
            status,
            created_at: Timestamp::new(at),
            responded_at: None,
        }
    }

    #[test]
    fn second_active_request_for_agent_is_a_constraint_violation() {
        let store = NullStore::new();
        store
            .insert_pairing_request(&request("r1", "a1", "b1", PairingStatus::Pending, 1))
            .unwrap();
        let err = store
            .insert_pairing_request(&request("r2", "a1", "b2", PairingStatus::Pending, 2))
            .unwrap_err();
        assert!(err.is_constraint_violation());
        assert_eq!(store.request_count(), 1);
    }

    #[test]
    fn terminal_rows_do_not_block_new_requests() {
        let store = NullStore::new();
        store
            .insert_pairing_request(&request("r1", "a1", "b1", PairingStatus::Rejected, 1))
            .unwrap();
        store
            .insert_pairing_request(&request("r2", "a1", "b1", PairingStatus::Pending, 2))
            .unwrap();
        assert_eq!(store.request_count(), 2);
    }

    #[test]
    fn resolve_requires_matching_broker_and_pending() {
        let store = NullStore::new();
        store
            .insert_pairing_request(&request("r1", "a1", "b1", PairingStatus::Pending, 1))
            .unwrap();
        let id = RequestId::new("r1");
        let wrong = store
            .resolve_pending_request(&id, &BrokerId::new("b2"), PairingStatus::Accepted, Timestamp::new(5))
            .unwrap();
        assert!(wrong.is_none());

        let ok = store
            .resolve_pending_request(&id, &BrokerId::new("b1"), PairingStatus::Accepted, Timestamp::new(5))
            .unwrap()
            .unwrap();
        assert_eq!(ok.status, PairingStatus::Accepted);
        assert_eq!(ok.responded_at, Some(Timestamp::new(5)));

        let again = store
            .resolve_pending_request(&id, &BrokerId::new("b1"), PairingStatus::Rejected, Timestamp::new(6))
            .unwrap();
        assert!(again.is_none());
    }

    #[test]
    fn cancel_rechecks_pardon_count() {
        let store = NullStore::new();
        store
            .insert_pairing_request(&request("r1", "a1", "b1", PairingStatus::Cancelled, 1))
            .unwrap();
        store
            .insert_pairing_request(&request("r2", "a1", "b1", PairingStatus::Pending, 2))
            .unwrap();
        let outcome = store
            .cancel_pending_request(&AgentId::new("a1"), Timestamp::new(3), 1)
            .unwrap();
        assert_eq!(outcome, CancelOutcome::PardonExhausted);
    }

    #[test]
    fn activity_reads_newest_first() {
        let store = NullStore::new();
        for (i, at) in [10u64, 30, 20].iter().enumerate() {
            store
                .append_activity(NewActivity {
                    subject: "tx-1".into(),
                    actor_id: UserId::new("u1"),
                    actor_role: Role::Agent,
                    action_type: nexus_store::ActionType::PairingRequested,
                    description: format!("entry {i}"),
                    metadata: BTreeMap::new(),
                    created_at: Timestamp::new(*at),
                })
                .unwrap();
        }
        let entries = store.activity_for_subject("tx-1", 10).unwrap();
        let times: Vec<u64> = entries.iter().map(|e| e.created_at.as_secs()).collect();
        assert_eq!(times, vec![30, 20, 10]);
        assert_eq!(store.activity_for_subject("tx-1", 2).unwrap().len(), 2);
        assert!(store.activity_for_subject("other", 10).unwrap().is_empty());
    }

    #[test]
    fn older_verification_record_does_not_replace_newer() {
        let store = NullStore::new();
        let user = UserId::new("u1");
        let record = |outcome, at| VerificationRecord {
            user_id: user.clone(),
            outcome,
            similarity: None,
            field_count: 0,
            decided_at: Timestamp::new(at),
        };
        store
            .put_verification_record(&record(VerificationOutcome::Verified, 20))
            .unwrap();
        store
            .put_verification_record(&record(VerificationOutcome::Rejected, 10))
            .unwrap();
        let latest = store.latest_verification_record(&user).unwrap().unwrap();
        assert_eq!(latest.outcome, VerificationOutcome::Verified);
    }

    #[test]
    fn failing_mode_surfaces_backend_errors() {
        let store = NullStore::new();
        store.set_failing(true);
        assert!(matches!(
            store.get_pairing_request(&RequestId::new("x")),
            Err(StoreError::Backend(_))
        ));
        store.set_failing(false);
        assert!(store.get_pairing_request(&RequestId::new("x")).unwrap().is_none());
    }
}
