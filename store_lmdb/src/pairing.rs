//! LMDB implementation of PairingStore.
//!
//! Rows live in `pairing_requests` keyed by request id. Two index databases
//! map agent and broker ids to their request ids; every write keeps all
//! three in one transaction.

use heed::{RoTxn, RwTxn};
use nexus_store::pairing::sort_newest_first;
use nexus_store::{CancelOutcome, PairingRequest, PairingStore, StoreError};
use nexus_types::{AgentId, BrokerId, PairingStatus, RequestId, Timestamp};

use crate::environment::{decode, encode, LmdbStore};
use crate::keys::index_key;
use crate::LmdbError;

impl LmdbStore {
    fn load_request(&self, txn: &RoTxn, id: &[u8]) -> Result<PairingRequest, LmdbError> {
        match self.dbs.requests.get(txn, id)? {
            Some(bytes) => decode(bytes),
            None => Err(LmdbError::DanglingIndex(format!(
                "pairing request {}",
                String::from_utf8_lossy(id)
            ))),
        }
    }

    fn requests_of_agent(&self, txn: &RoTxn, agent: &str) -> Result<Vec<PairingRequest>, LmdbError> {
        self.scan_index(&self.dbs.requests_by_agent, txn, agent)?
            .iter()
            .map(|id| self.load_request(txn, id))
            .collect()
    }

    fn requests_of_broker(
        &self,
        txn: &RoTxn,
        broker: &str,
    ) -> Result<Vec<PairingRequest>, LmdbError> {
        self.scan_index(&self.dbs.requests_by_broker, txn, broker)?
            .iter()
            .map(|id| self.load_request(txn, id))
            .collect()
    }

    /// Overwrite an existing row. Indexes are keyed on immutable fields, so
    /// they need no update.
    fn update_request(&self, wtxn: &mut RwTxn, request: &PairingRequest) -> Result<(), LmdbError> {
        self.dbs
            .requests
            .put(wtxn, request.id.as_str().as_bytes(), &encode(request)?)?;
        Ok(())
    }

    fn insert_request(&self, request: &PairingRequest) -> Result<(), LmdbError> {
        let id = request.id.as_str().as_bytes();
        let mut wtxn = self.env.write_txn()?;

        if self.dbs.requests.get(&wtxn, id)?.is_some() {
            return Err(LmdbError::Duplicate(format!("request {}", request.id)));
        }
        let has_active = self
            .requests_of_agent(&wtxn, request.agent_id.as_str())?
            .iter()
            .any(|r| r.status.is_active());
        if has_active {
            return Err(LmdbError::Duplicate(format!(
                "active request for agent {}",
                request.agent_id
            )));
        }

        self.dbs.requests.put(&mut wtxn, id, &encode(request)?)?;
        self.dbs.requests_by_agent.put(
            &mut wtxn,
            &index_key(request.agent_id.as_str(), id),
            &[],
        )?;
        self.dbs.requests_by_broker.put(
            &mut wtxn,
            &index_key(request.broker_id.as_str(), id),
            &[],
        )?;
        wtxn.commit()?;
        Ok(())
    }

    fn resolve(
        &self,
        id: &RequestId,
        broker: &BrokerId,
        status: PairingStatus,
        at: Timestamp,
    ) -> Result<Option<PairingRequest>, LmdbError> {
        let mut wtxn = self.env.write_txn()?;
        let Some(bytes) = self.dbs.requests.get(&wtxn, id.as_str().as_bytes())? else {
            return Ok(None);
        };
        let mut request: PairingRequest = decode(bytes)?;
        if request.broker_id != *broker || request.status != PairingStatus::Pending {
            return Ok(None);
        }
        request.status = status;
        request.responded_at = Some(at);
        self.update_request(&mut wtxn, &request)?;
        wtxn.commit()?;
        Ok(Some(request))
    }

    fn cancel(
        &self,
        agent: &AgentId,
        at: Timestamp,
        pardon_limit: u64,
    ) -> Result<CancelOutcome, LmdbError> {
        let mut wtxn = self.env.write_txn()?;
        let rows = self.requests_of_agent(&wtxn, agent.as_str())?;
        let used = rows
            .iter()
            .filter(|r| r.status == PairingStatus::Cancelled)
            .count() as u64;
        if used >= pardon_limit {
            return Ok(CancelOutcome::PardonExhausted);
        }
        let Some(mut request) = rows
            .into_iter()
            .find(|r| r.status == PairingStatus::Pending)
        else {
            return Ok(CancelOutcome::NothingPending);
        };
        request.status = PairingStatus::Cancelled;
        request.responded_at = Some(at);
        self.update_request(&mut wtxn, &request)?;
        wtxn.commit()?;
        Ok(CancelOutcome::Cancelled(request))
    }
}

impl PairingStore for LmdbStore {
    fn insert_pairing_request(&self, request: &PairingRequest) -> Result<(), StoreError> {
        Ok(self.insert_request(request)?)
    }

    fn get_pairing_request(&self, id: &RequestId) -> Result<Option<PairingRequest>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let found = self
            .dbs
            .requests
            .get(&rtxn, id.as_str().as_bytes())
            .map_err(LmdbError::from)?;
        Ok(found.map(decode).transpose()?)
    }

    fn resolve_pending_request(
        &self,
        id: &RequestId,
        broker: &BrokerId,
        status: PairingStatus,
        at: Timestamp,
    ) -> Result<Option<PairingRequest>, StoreError> {
        Ok(self.resolve(id, broker, status, at)?)
    }

    fn cancel_pending_request(
        &self,
        agent: &AgentId,
        at: Timestamp,
        pardon_limit: u64,
    ) -> Result<CancelOutcome, StoreError> {
        Ok(self.cancel(agent, at, pardon_limit)?)
    }

    fn count_requests_with_status(
        &self,
        agent: &AgentId,
        status: PairingStatus,
    ) -> Result<u64, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let rows = self.requests_of_agent(&rtxn, agent.as_str())?;
        Ok(rows.iter().filter(|r| r.status == status).count() as u64)
    }

    fn requests_for_agent(&self, agent: &AgentId) -> Result<Vec<PairingRequest>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let mut rows = self.requests_of_agent(&rtxn, agent.as_str())?;
        sort_newest_first(&mut rows);
        Ok(rows)
    }

    fn pending_requests_for_broker(
        &self,
        broker: &BrokerId,
    ) -> Result<Vec<PairingRequest>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let mut rows: Vec<PairingRequest> = self
            .requests_of_broker(&rtxn, broker.as_str())?
            .into_iter()
            .filter(|r| r.status == PairingStatus::Pending)
            .collect();
        sort_newest_first(&mut rows);
        Ok(rows)
    }
}
