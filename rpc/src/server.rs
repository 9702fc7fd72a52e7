//! Router assembly and the listening server.

use axum::routing::{get, post, put};
use axum::Router;
use nexus_audit::{ActivityLog, StatusProjection};
use nexus_pairing::PairingEngine;
use nexus_providers::FsObjectStore;
use nexus_store::NexusStore;
use nexus_types::Clock;
use nexus_verification::VerificationPipeline;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::handlers;

/// Everything the handlers reach. Built once by the daemon.
pub struct AppState {
    pub pairing: PairingEngine,
    pub pipeline: VerificationPipeline,
    pub projection: StatusProjection,
    pub activity: ActivityLog,
    pub store: Arc<dyn NexusStore>,
    pub clock: Arc<dyn Clock>,
    /// Present when objects are kept on the local filesystem; enables the
    /// `PUT /objects/*key` upload sink.
    pub uploads: Option<Arc<FsObjectStore>>,
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let pairing = Router::new()
        .route("/pairing/provision", post(handlers::provision))
        .route("/pairing/code", get(handlers::current_code))
        .route("/pairing/validate", post(handlers::validate_pairing))
        .route("/pairing/respond", post(handlers::respond_to_pairing))
        .route("/pairing/cancel", post(handlers::cancel_pairing))
        .route("/pairing/pending", get(handlers::pending_requests))
        .route("/agents/:id/status", get(handlers::agent_status));

    let verification = Router::new()
        .route("/verification/upload-target", post(handlers::upload_target))
        .route("/verification/extract", post(handlers::extract_fields))
        .route("/verification/liveness", post(handlers::liveness))
        .route("/verification/compare", post(handlers::compare_faces))
        .route("/verification/verify", post(handlers::verify_identity));

    Router::new()
        .merge(pairing)
        .merge(verification)
        .route("/users/:id/status", get(handlers::user_status))
        .route("/activity/:subject", get(handlers::activity))
        .route("/objects/*key", put(handlers::upload_object))
        .route("/health", get(handlers::health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub struct RpcServer {
    pub addr: SocketAddr,
}

impl RpcServer {
    pub fn new(addr: SocketAddr) -> Self {
        Self { addr }
    }

    /// Bind and serve until `shutdown` resolves.
    pub async fn serve(
        &self,
        state: Arc<AppState>,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> std::io::Result<()> {
        let listener = TcpListener::bind(self.addr).await?;
        tracing::info!(addr = %listener.local_addr()?, "RPC server listening");
        axum::serve(listener, build_router(state))
            .with_graceful_shutdown(shutdown)
            .await
    }
}
