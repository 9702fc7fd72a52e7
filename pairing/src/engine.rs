//! Pairing engine: provisioning, TOTP validation, request lifecycle and
//! pardon accounting.
//!
//! The engine holds no locks of its own. Every invariant that must survive
//! concurrent callers (one active request per agent, conditional respond,
//! pardon re-check) is delegated to a single atomic store operation.

use crate::error::PairingError;
use nexus_audit::{Activity, ActivityLog, Actor, StatusProjection};
use nexus_crypto::{generate_nexus_code, generate_secret, random_token, Totp};
use nexus_store::{ActionType, CancelOutcome, NexusLink, NexusStore, PairingRequest};
use nexus_types::{
    AccessStatus, AgentId, BrokerId, Clock, NexusCode, PairingAction, PairingParams,
    PairingStatus, RequestId, Role, Timestamp,
};
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Lifetime number of cancellations allowed per agent.
pub const PARDON_LIMIT: u64 = 1;

/// Nexus code draws before giving up on collisions.
const PROVISION_ATTEMPTS: usize = 8;

/// Random bytes in a request id.
const REQUEST_ID_BYTES: usize = 16;

/// Pairing material handed to the broker once, at provisioning.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionedLink {
    pub broker_id: BrokerId,
    pub nexus_code: NexusCode,
    /// RFC 4648 base32, for the broker's own authenticator device only.
    pub secret_base32: String,
    pub provisioning_uri: String,
    pub created_at: Timestamp,
}

/// The code a broker's device should be showing right now.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentCode {
    pub nexus_code: NexusCode,
    pub code: String,
    pub seconds_remaining: u64,
}

pub struct PairingEngine {
    store: Arc<dyn NexusStore>,
    clock: Arc<dyn Clock>,
    totp: Totp,
    params: PairingParams,
    log: ActivityLog,
    projection: StatusProjection,
}

impl PairingEngine {
    pub fn new(
        store: Arc<dyn NexusStore>,
        clock: Arc<dyn Clock>,
        params: PairingParams,
    ) -> Result<Self, PairingError> {
        let totp = Totp::from_params(&params)
            .map_err(|e| PairingError::Validation(format!("pairing parameters: {e}")))?;
        if params.nexus_code_len == 0 {
            return Err(PairingError::Validation(
                "pairing parameters: nexus code length must be non-zero".into(),
            ));
        }
        Ok(Self {
            log: ActivityLog::new(store.clone(), clock.clone()),
            projection: StatusProjection::new(store.clone()),
            store,
            clock,
            totp,
            params,
        })
    }

    pub fn params(&self) -> &PairingParams {
        &self.params
    }

    /// Issue a nexus code and TOTP secret for a broker.
    ///
    /// Links are immutable: a broker who already has one gets
    /// [`PairingError::AlreadyProvisioned`].
    pub fn provision<R: RngCore + CryptoRng>(
        &self,
        broker: &BrokerId,
        rng: &mut R,
    ) -> Result<ProvisionedLink, PairingError> {
        if self.store.get_nexus_link_by_broker(broker)?.is_some() {
            return Err(PairingError::AlreadyProvisioned);
        }
        let secret = generate_secret(rng, self.params.secret_len)
            .map_err(|e| PairingError::Validation(format!("pairing parameters: {e}")))?;
        let created_at = self.clock.now();

        for attempt in 1..=PROVISION_ATTEMPTS {
            let nexus_code = generate_nexus_code(rng, self.params.nexus_code_len);
            let link = NexusLink {
                broker_id: broker.clone(),
                nexus_code: nexus_code.clone(),
                totp_secret: secret.clone(),
                created_at,
            };
            match self.store.insert_nexus_link(&link) {
                Ok(()) => {
                    tracing::info!(%broker, code = %nexus_code, "broker provisioned");
                    self.log.record_best_effort(
                        Activity::by(
                            broker.as_str(),
                            &Actor::new(broker.clone(), Role::Broker),
                            ActionType::NexusProvisioned,
                        )
                        .description("nexus code issued")
                        .meta("nexus_code", &nexus_code),
                    );
                    return Ok(ProvisionedLink {
                        broker_id: broker.clone(),
                        provisioning_uri: self.totp.provisioning_uri(
                            &secret,
                            &self.params.issuer,
                            broker.as_str(),
                        ),
                        secret_base32: secret.to_base32(),
                        nexus_code,
                        created_at,
                    });
                }
                Err(e) if e.is_constraint_violation() => {
                    // Either a concurrent provision for this broker won, or
                    // the code collided with another broker's.
                    if self.store.get_nexus_link_by_broker(broker)?.is_some() {
                        return Err(PairingError::AlreadyProvisioned);
                    }
                    tracing::debug!(%broker, attempt, "nexus code collision, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }
        tracing::error!(%broker, "no free nexus code after {PROVISION_ATTEMPTS} attempts");
        Err(PairingError::Internal(
            "could not allocate a unique nexus code".into(),
        ))
    }

    /// The broker's live code and how long it stays valid.
    pub fn current_code(&self, broker: &BrokerId) -> Result<CurrentCode, PairingError> {
        let link = self
            .store
            .get_nexus_link_by_broker(broker)?
            .ok_or(PairingError::NotFoundOrUnauthorized)?;
        let now = self.clock.now();
        Ok(CurrentCode {
            code: self.totp.generate(&link.totp_secret, now)?,
            seconds_remaining: self.totp.seconds_remaining(now),
            nexus_code: link.nexus_code,
        })
    }

    /// Check an agent's code against the broker's rotating TOTP and open a
    /// pending request on success.
    pub fn validate_pairing<R: RngCore + CryptoRng>(
        &self,
        nexus_code: &str,
        submitted_code: &str,
        agent: &AgentId,
        rng: &mut R,
    ) -> Result<PairingRequest, PairingError> {
        let nexus_code = NexusCode::normalize(nexus_code);
        if nexus_code.is_empty() {
            return Err(PairingError::InvalidCode);
        }
        let link = self
            .store
            .get_nexus_link_by_code(&nexus_code)?
            .ok_or_else(|| {
                tracing::debug!(%agent, code = %nexus_code, "unknown nexus code");
                PairingError::InvalidCode
            })?;

        let now = self.clock.now();
        if !self.totp.verify(&link.totp_secret, submitted_code, now)? {
            tracing::warn!(%agent, broker = %link.broker_id, "pairing code rejected");
            return Err(PairingError::InvalidOrExpiredCode);
        }

        let request = PairingRequest {
            id: RequestId::new(random_token(rng, REQUEST_ID_BYTES)),
            agent_id: agent.clone(),
            broker_id: link.broker_id,
            status: PairingStatus::Pending,
            created_at: now,
            responded_at: None,
        };
        match self.store.insert_pairing_request(&request) {
            Ok(()) => {}
            Err(e) if e.is_constraint_violation() => {
                tracing::debug!(%agent, "active pairing request already exists");
                return Err(PairingError::DuplicateRequest);
            }
            Err(e) => return Err(e.into()),
        }

        tracing::info!(
            %agent,
            broker = %request.broker_id,
            request = %request.id,
            "pairing request created"
        );
        self.log.record_best_effort(
            Activity::by(
                request.id.as_str(),
                &Actor::new(agent.clone(), Role::Agent),
                ActionType::PairingRequested,
            )
            .description("pairing requested")
            .meta("broker_id", &request.broker_id),
        );
        Ok(request)
    }

    /// Accept or reject a pending request addressed to `broker`.
    ///
    /// A request that does not exist, belongs to another broker or has
    /// already left `pending` is reported identically.
    pub fn respond_to_pairing(
        &self,
        request_id: &RequestId,
        broker: &BrokerId,
        action: PairingAction,
    ) -> Result<PairingRequest, PairingError> {
        let status = action.resulting_status();
        let now = self.clock.now();
        let Some(request) = self
            .store
            .resolve_pending_request(request_id, broker, status, now)?
        else {
            tracing::debug!(%broker, request = %request_id, "no matching pending request");
            return Err(PairingError::NotFoundOrUnauthorized);
        };

        tracing::info!(
            %broker,
            agent = %request.agent_id,
            request = %request.id,
            %status,
            "pairing request answered"
        );
        let action_type = match action {
            PairingAction::Accept => ActionType::PairingAccepted,
            PairingAction::Reject => ActionType::PairingRejected,
        };
        self.log.record_best_effort(
            Activity::by(
                request.id.as_str(),
                &Actor::new(broker.clone(), Role::Broker),
                action_type,
            )
            .description(format!("pairing {status}"))
            .meta("agent_id", &request.agent_id),
        );
        Ok(request)
    }

    /// Spend the agent's pardon on their pending request.
    ///
    /// Returns the cancelled request, or `None` when nothing was pending.
    /// Fails with [`PairingError::PardonExhausted`] once the pardon has been
    /// used, whether or not anything is pending now.
    pub fn cancel_pairing(&self, agent: &AgentId) -> Result<Option<PairingRequest>, PairingError> {
        let used = self
            .store
            .count_requests_with_status(agent, PairingStatus::Cancelled)?;
        if used >= PARDON_LIMIT {
            tracing::debug!(%agent, used, "pardon exhausted");
            return Err(PairingError::PardonExhausted);
        }

        // The count is re-checked inside the same write as the cancel.
        match self
            .store
            .cancel_pending_request(agent, self.clock.now(), PARDON_LIMIT)?
        {
            CancelOutcome::Cancelled(request) => {
                tracing::info!(
                    %agent,
                    broker = %request.broker_id,
                    request = %request.id,
                    "pairing request cancelled"
                );
                self.log.record_best_effort(
                    Activity::by(
                        request.id.as_str(),
                        &Actor::new(agent.clone(), Role::Agent),
                        ActionType::PairingCancelled,
                    )
                    .description("pairing cancelled, pardon used")
                    .meta("broker_id", &request.broker_id),
                );
                Ok(Some(request))
            }
            CancelOutcome::NothingPending => Ok(None),
            CancelOutcome::PardonExhausted => Err(PairingError::PardonExhausted),
        }
    }

    /// `verified` iff the agent has an accepted request.
    pub fn agent_status(&self, agent: &AgentId) -> Result<AccessStatus, PairingError> {
        Ok(self.projection.agent_status(agent)?)
    }

    pub fn pending_requests_for_broker(
        &self,
        broker: &BrokerId,
    ) -> Result<Vec<PairingRequest>, PairingError> {
        Ok(self.store.pending_requests_for_broker(broker)?)
    }

    pub fn requests_for_agent(&self, agent: &AgentId) -> Result<Vec<PairingRequest>, PairingError> {
        Ok(self.store.requests_for_agent(agent)?)
    }
}
