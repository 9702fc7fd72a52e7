//! RPC request handlers and their wire types.
//!
//! Request and response bodies use camelCase field names. Pairing calls are
//! synchronous store transactions and run on the blocking pool.

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use nexus_audit::DEFAULT_ACTIVITY_LIMIT;
use nexus_pairing::{CurrentCode, ProvisionedLink};
use nexus_providers::SignedUpload;
use nexus_store::{ActivityLogEntry, PairingRequest};
use nexus_types::{
    AccessStatus, AgentId, BrokerId, PairingAction, PairingStatus, RequestId, Role, Timestamp,
    UserId,
};
use nexus_verification::{
    FaceComparison, FieldMap, LivenessAction, LivenessReply, VerificationSession,
};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::body::JsonBody;
use crate::caller::Caller;
use crate::error::RpcError;
use crate::server::AppState;

type Shared = State<Arc<AppState>>;

/// Run a synchronous store-backed call off the async workers.
async fn blocking<T, F>(state: &Arc<AppState>, f: F) -> Result<T, RpcError>
where
    F: FnOnce(&AppState) -> Result<T, RpcError> + Send + 'static,
    T: Send + 'static,
{
    let state = Arc::clone(state);
    tokio::task::spawn_blocking(move || f(&state))
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "blocking task failed");
            RpcError::Internal
        })?
}

// ── Pairing ──────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PairingRequestView {
    pub id: RequestId,
    pub agent_id: AgentId,
    pub broker_id: BrokerId,
    pub status: PairingStatus,
    pub created_at: Timestamp,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub responded_at: Option<Timestamp>,
}

impl From<PairingRequest> for PairingRequestView {
    fn from(r: PairingRequest) -> Self {
        Self {
            id: r.id,
            agent_id: r.agent_id,
            broker_id: r.broker_id,
            status: r.status,
            created_at: r.created_at,
            responded_at: r.responded_at,
        }
    }
}

/// POST /pairing/provision
pub async fn provision(
    State(state): Shared,
    caller: Caller,
) -> Result<(StatusCode, Json<ProvisionedLink>), RpcError> {
    let broker = caller.as_broker()?;
    let link = blocking(&state, move |s| {
        Ok(s.pairing.provision(&broker, &mut OsRng)?)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(link)))
}

/// GET /pairing/code
pub async fn current_code(
    State(state): Shared,
    caller: Caller,
) -> Result<Json<CurrentCode>, RpcError> {
    let broker = caller.as_broker()?;
    let code = blocking(&state, move |s| Ok(s.pairing.current_code(&broker)?)).await?;
    Ok(Json(code))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatePairingBody {
    pub nexus_code: String,
    pub code: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatePairingResponse {
    pub request_id: RequestId,
    pub status: PairingStatus,
}

/// POST /pairing/validate
pub async fn validate_pairing(
    State(state): Shared,
    caller: Caller,
    JsonBody(body): JsonBody<ValidatePairingBody>,
) -> Result<(StatusCode, Json<ValidatePairingResponse>), RpcError> {
    let agent = caller.as_agent()?;
    let request = blocking(&state, move |s| {
        Ok(s
            .pairing
            .validate_pairing(&body.nexus_code, &body.code, &agent, &mut OsRng)?)
    })
    .await?;
    Ok((
        StatusCode::CREATED,
        Json(ValidatePairingResponse {
            request_id: request.id,
            status: request.status,
        }),
    ))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RespondBody {
    pub request_id: String,
    pub action: String,
}

/// POST /pairing/respond
pub async fn respond_to_pairing(
    State(state): Shared,
    caller: Caller,
    JsonBody(body): JsonBody<RespondBody>,
) -> Result<Json<PairingRequestView>, RpcError> {
    let broker = caller.as_broker()?;
    let action: PairingAction = body
        .action
        .parse()
        .map_err(|e: nexus_types::ParseError| RpcError::BadRequest(e.to_string()))?;
    let id = RequestId::parse(body.request_id)
        .map_err(|e| RpcError::BadRequest(format!("requestId: {e}")))?;
    let request = blocking(&state, move |s| {
        Ok(s.pairing.respond_to_pairing(&id, &broker, action)?)
    })
    .await?;
    Ok(Json(request.into()))
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelResponse {
    pub cancelled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request: Option<PairingRequestView>,
}

/// POST /pairing/cancel
///
/// Nothing pending is a successful no-op.
pub async fn cancel_pairing(
    State(state): Shared,
    caller: Caller,
) -> Result<Json<CancelResponse>, RpcError> {
    let agent = caller.as_agent()?;
    let cancelled = blocking(&state, move |s| Ok(s.pairing.cancel_pairing(&agent)?)).await?;
    Ok(Json(CancelResponse {
        cancelled: cancelled.is_some(),
        request: cancelled.map(Into::into),
    }))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RequestList {
    pub requests: Vec<PairingRequestView>,
}

/// GET /pairing/pending
pub async fn pending_requests(
    State(state): Shared,
    caller: Caller,
) -> Result<Json<RequestList>, RpcError> {
    let broker = caller.as_broker()?;
    let rows = blocking(&state, move |s| {
        Ok(s.pairing.pending_requests_for_broker(&broker)?)
    })
    .await?;
    Ok(Json(RequestList {
        requests: rows.into_iter().map(Into::into).collect(),
    }))
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentStatusResponse {
    pub agent_id: AgentId,
    pub status: AccessStatus,
}

/// GET /agents/:id/status
///
/// Visible to the agent and to any broker the agent has asked to pair with.
pub async fn agent_status(
    State(state): Shared,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<Json<AgentStatusResponse>, RpcError> {
    let agent = AgentId::parse(id).map_err(|_| RpcError::NotFound)?;
    let status = blocking(&state, move |s| {
        let permitted = match caller.role {
            Role::Agent => caller.id.as_str() == agent.as_str(),
            Role::Broker => s
                .pairing
                .requests_for_agent(&agent)?
                .iter()
                .any(|r| r.broker_id.as_str() == caller.id.as_str()),
            Role::Client => false,
        };
        if !permitted {
            return Err(RpcError::NotFound);
        }
        Ok(AgentStatusResponse {
            status: s.pairing.agent_status(&agent)?,
            agent_id: agent,
        })
    })
    .await?;
    Ok(Json(status))
}

// ── Verification ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadTargetBody {
    pub document_type: String,
    pub content_type: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadTargetResponse {
    pub url: String,
    pub key: String,
    pub expires_at: Timestamp,
}

/// POST /verification/upload-target
pub async fn upload_target(
    State(state): Shared,
    caller: Caller,
    JsonBody(body): JsonBody<UploadTargetBody>,
) -> Result<Json<UploadTargetResponse>, RpcError> {
    let target = state
        .pipeline
        .issue_upload_target(&caller.actor(), &body.document_type, &body.content_type, &mut OsRng)
        .await?;
    Ok(Json(UploadTargetResponse {
        url: target.url,
        key: target.key,
        expires_at: target.expires_at,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractBody {
    pub storage_key: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ExtractResponse {
    pub fields: FieldMap,
}

/// POST /verification/extract
pub async fn extract_fields(
    State(state): Shared,
    caller: Caller,
    JsonBody(body): JsonBody<ExtractBody>,
) -> Result<Json<ExtractResponse>, RpcError> {
    let fields = state
        .pipeline
        .extract_fields(&caller.actor(), &body.storage_key)
        .await?;
    Ok(Json(ExtractResponse { fields }))
}

/// POST /verification/liveness
pub async fn liveness(
    State(state): Shared,
    caller: Caller,
    JsonBody(action): JsonBody<LivenessAction>,
) -> Result<Json<LivenessReply>, RpcError> {
    let reply = state.pipeline.liveness(&caller.actor(), action).await?;
    Ok(Json(reply))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompareBody {
    pub id_image_key: Option<String>,
    pub liveness_image_bytes: Option<String>,
}

/// POST /verification/compare
pub async fn compare_faces(
    State(state): Shared,
    caller: Caller,
    JsonBody(body): JsonBody<CompareBody>,
) -> Result<Json<FaceComparison>, RpcError> {
    let comparison = state
        .pipeline
        .compare_faces(
            &caller.actor(),
            body.id_image_key.as_deref(),
            body.liveness_image_bytes.as_deref(),
        )
        .await?;
    Ok(Json(comparison))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyBody {
    pub document_key: String,
    pub id_image_key: String,
    pub liveness_session_id: String,
}

/// POST /verification/verify
pub async fn verify_identity(
    State(state): Shared,
    caller: Caller,
    JsonBody(body): JsonBody<VerifyBody>,
) -> Result<Json<VerificationSession>, RpcError> {
    let session = state
        .pipeline
        .verify_identity(
            &caller.actor(),
            &body.document_key,
            &body.id_image_key,
            &body.liveness_session_id,
        )
        .await?;
    Ok(Json(session))
}

// ── Projections ──────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStatusResponse {
    pub user_id: UserId,
    pub role: Role,
    pub identity_status: AccessStatus,
    pub access_status: AccessStatus,
}

/// GET /users/:id/status
///
/// Callers may only read their own status.
pub async fn user_status(
    State(state): Shared,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<Json<UserStatusResponse>, RpcError> {
    if id.trim() != caller.id.as_str() {
        return Err(RpcError::NotFound);
    }
    let status = blocking(&state, move |s| {
        Ok(UserStatusResponse {
            identity_status: s.projection.identity_status(&caller.id)?,
            access_status: s.projection.access_status(&caller.id, caller.role)?,
            user_id: caller.id,
            role: caller.role,
        })
    })
    .await?;
    Ok(Json(status))
}

#[derive(Debug, Deserialize)]
pub struct ActivityQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityView {
    pub seq: u64,
    pub actor_id: UserId,
    pub actor_role: Role,
    pub action_type: String,
    pub description: String,
    pub metadata: BTreeMap<String, String>,
    pub created_at: Timestamp,
}

impl From<ActivityLogEntry> for ActivityView {
    fn from(e: ActivityLogEntry) -> Self {
        Self {
            seq: e.seq,
            actor_id: e.actor_id,
            actor_role: e.actor_role,
            action_type: e.action_type.to_string(),
            description: e.description,
            metadata: e.metadata,
            created_at: e.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ActivityList {
    pub entries: Vec<ActivityView>,
}

const MAX_ACTIVITY_LIMIT: usize = 200;

/// GET /activity/:subject
///
/// The subject is the caller's own user id or a pairing request the caller
/// is party to.
pub async fn activity(
    State(state): Shared,
    caller: Caller,
    Path(subject): Path<String>,
    Query(query): Query<ActivityQuery>,
) -> Result<Json<ActivityList>, RpcError> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_ACTIVITY_LIMIT)
        .clamp(1, MAX_ACTIVITY_LIMIT);
    let entries = blocking(&state, move |s| {
        let permitted = subject == caller.id.as_str()
            || s
                .store
                .get_pairing_request(&RequestId::new(subject.as_str()))?
                .is_some_and(|r| {
                    r.agent_id.as_str() == caller.id.as_str()
                        || r.broker_id.as_str() == caller.id.as_str()
                });
        if !permitted {
            return Err(RpcError::NotFound);
        }
        Ok(s.activity.recent(&subject, limit)?)
    })
    .await?;
    Ok(Json(ActivityList {
        entries: entries.into_iter().map(Into::into).collect(),
    }))
}

// ── Upload sink & health ─────────────────────────────────────────────────

/// PUT /objects/*key
///
/// The signed query string is the credential; no identity headers apply.
pub async fn upload_object(
    State(state): Shared,
    Path(key): Path<String>,
    Query(params): Query<SignedUpload>,
    body: Bytes,
) -> Result<StatusCode, RpcError> {
    let Some(uploads) = state.uploads.as_ref() else {
        return Err(RpcError::NotFound);
    };
    let key = key.trim_start_matches('/');
    uploads
        .accept_upload(key, &params, &body, state.clock.now())
        .await?;
    tracing::info!(%key, bytes = body.len(), "upload accepted");
    Ok(StatusCode::CREATED)
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub now: Timestamp,
}

/// GET /health
pub async fn health(State(state): Shared) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        now: state.clock.now(),
    })
}
