//! HTTP-level scenarios driven through the router with `oneshot`.

use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use nexus_audit::{ActivityLog, StatusProjection};
use nexus_crypto::UrlSigner;
use nexus_nullables::{NullBiometrics, NullClock, NullDocumentAnalyzer, NullStore};
use nexus_pairing::{CurrentCode, PairingEngine, ProvisionedLink};
use nexus_providers::FsObjectStore;
use nexus_rpc::{build_router, AppState, ROLE_HEADER, USER_HEADER};
use nexus_types::{PairingParams, VerificationParams};
use nexus_verification::blocks::RelationshipKind::{Child, Value};
use nexus_verification::{Block, Providers, VerificationPipeline};
use serde_json::{json, Value as Json};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

struct App {
    router: Router,
    documents: Arc<NullDocumentAnalyzer>,
    _objects_dir: TempDir,
}

fn app() -> App {
    let store = Arc::new(NullStore::new());
    let clock = Arc::new(NullClock::new(1_000));
    let objects_dir = tempfile::tempdir().unwrap();
    let objects = Arc::new(FsObjectStore::new(
        objects_dir.path(),
        "http://nexus.test",
        UrlSigner::new(b"router-test-key".to_vec()).unwrap(),
    ));
    let documents = Arc::new(NullDocumentAnalyzer::new());
    let pipeline = VerificationPipeline::new(
        Providers {
            objects: objects.clone(),
            documents: documents.clone(),
            biometrics: Arc::new(NullBiometrics::new()),
        },
        store.clone(),
        clock.clone(),
        VerificationParams::default(),
    );
    let state = AppState {
        pairing: PairingEngine::new(store.clone(), clock.clone(), PairingParams::default())
            .unwrap(),
        pipeline,
        projection: StatusProjection::new(store.clone()),
        activity: ActivityLog::new(store.clone(), clock.clone()),
        store,
        clock,
        uploads: Some(objects),
    };
    App {
        router: build_router(Arc::new(state)),
        documents,
        _objects_dir: objects_dir,
    }
}

async fn call(
    app: &App,
    method: Method,
    uri: &str,
    caller: Option<(&str, &str)>,
    body: Option<Json>,
) -> (StatusCode, Json) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some((user, role)) = caller {
        builder = builder.header(USER_HEADER, user).header(ROLE_HEADER, role);
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Json::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Json::Null)
    };
    (status, json)
}

const BROKER: Option<(&str, &str)> = Some(("b1", "broker"));
const AGENT: Option<(&str, &str)> = Some(("a1", "agent"));

async fn provisioned(app: &App) -> (ProvisionedLink, CurrentCode) {
    let (status, body) = call(app, Method::POST, "/pairing/provision", BROKER, None).await;
    assert_eq!(status, StatusCode::CREATED);
    let link: ProvisionedLink = serde_json::from_value(body).unwrap();
    let (status, body) = call(app, Method::GET, "/pairing/code", BROKER, None).await;
    assert_eq!(status, StatusCode::OK);
    (link, serde_json::from_value(body).unwrap())
}

#[tokio::test]
async fn missing_or_unknown_identity_is_unauthorized() {
    let app = app();
    let (status, body) = call(&app, Method::POST, "/pairing/cancel", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "UNAUTHENTICATED");

    let (status, _) = call(&app, Method::POST, "/pairing/cancel", Some(("a1", "admin")), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn role_gates_are_enforced() {
    let app = app();
    let (status, _) = call(&app, Method::POST, "/pairing/provision", AGENT, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = call(&app, Method::POST, "/pairing/cancel", BROKER, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn pair_accept_and_query_status_over_http() {
    let app = app();
    let (link, code) = provisioned(&app).await;
    assert!(link.provisioning_uri.starts_with("otpauth://totp/"));
    assert_eq!(code.nexus_code, link.nexus_code);

    let (status, body) = call(
        &app,
        Method::POST,
        "/pairing/validate",
        AGENT,
        Some(json!({ "nexusCode": link.nexus_code.as_str().to_lowercase(), "code": code.code })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "pending");
    let request_id = body["requestId"].as_str().unwrap().to_string();

    let (status, body) = call(&app, Method::GET, "/pairing/pending", BROKER, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["requests"][0]["id"], request_id.as_str());
    assert_eq!(body["requests"][0]["agentId"], "a1");

    let (status, body) = call(&app, Method::GET, "/agents/a1/status", BROKER, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "pending_approval");

    let (status, body) = call(
        &app,
        Method::POST,
        "/pairing/respond",
        BROKER,
        Some(json!({ "requestId": request_id, "action": "accept" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "accepted");

    let (_, body) = call(&app, Method::GET, "/agents/a1/status", AGENT, None).await;
    assert_eq!(body["status"], "verified");

    let (status, body) = call(&app, Method::GET, &format!("/activity/{request_id}"), BROKER, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["entries"].as_array().unwrap().len(), 2);
    assert_eq!(body["entries"][0]["actionType"], "pairing_accepted");

    let (status, _) = call(&app, Method::GET, &format!("/activity/{request_id}"), Some(("a2", "agent")), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn business_rule_errors_map_to_conflict_and_bad_request() {
    let app = app();
    let (link, code) = provisioned(&app).await;
    let attempt = json!({ "nexusCode": link.nexus_code.as_str(), "code": code.code });

    let (status, _) = call(&app, Method::POST, "/pairing/validate", AGENT, Some(attempt.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, body) = call(&app, Method::POST, "/pairing/validate", AGENT, Some(attempt.clone())).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["retryable"], false);

    let (status, body) = call(&app, Method::POST, "/pairing/cancel", AGENT, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cancelled"], true);
    let (status, _) = call(&app, Method::POST, "/pairing/validate", AGENT, Some(attempt)).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = call(&app, Method::POST, "/pairing/cancel", AGENT, None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = call(
        &app,
        Method::POST,
        "/pairing/validate",
        Some(("a2", "agent")),
        Some(json!({ "nexusCode": link.nexus_code.as_str(), "code": "12345" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(
        &app,
        Method::POST,
        "/pairing/respond",
        Some(("b2", "broker")),
        Some(json!({ "requestId": "nope", "action": "reject" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn upload_then_extract_through_the_signed_sink() {
    let app = app();
    let client = Some(("u1", "client"));
    let (status, target) = call(
        &app,
        Method::POST,
        "/verification/upload-target",
        client,
        Some(json!({ "documentType": "passport", "contentType": "image/jpeg" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let key = target["key"].as_str().unwrap().to_string();
    assert!(key.starts_with("temp/u1/passport-"));
    let url = target["url"].as_str().unwrap();
    let path = url.strip_prefix("http://nexus.test").unwrap();

    let put = |body: &'static [u8]| {
        Request::builder()
            .method(Method::PUT)
            .uri(path)
            .body(Body::from(body))
            .unwrap()
    };
    let response = app.router.clone().oneshot(put(b"jpeg")).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let response = app.router.clone().oneshot(put(b"again")).await.unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    app.documents.script(
        key.clone(),
        vec![
            Block::key("k1").with(Value, &["v1"]).with(Child, &["w1"]),
            Block::value("v1").with(Child, &["w2"]),
            Block::word("w1", "Surname:"),
            Block::word("w2", "Hopper"),
        ],
    );
    let (status, body) = call(
        &app,
        Method::POST,
        "/verification/extract",
        client,
        Some(json!({ "storageKey": key })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["fields"]["Surname"], "Hopper");

    let (status, _) = call(
        &app,
        Method::POST,
        "/verification/extract",
        Some(("u2", "client")),
        Some(json!({ "storageKey": key })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn liveness_and_compare_validation() {
    let app = app();
    let client = Some(("u1", "client"));
    let (status, body) = call(
        &app,
        Method::POST,
        "/verification/liveness",
        client,
        Some(json!({ "action": "create" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["sessionId"].as_str().is_some());

    let (status, _) = call(
        &app,
        Method::POST,
        "/verification/liveness",
        client,
        Some(json!({ "action": "get_results" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = call(
        &app,
        Method::POST,
        "/verification/compare",
        client,
        Some(json!({ "idImageKey": "temp/u1/id-1" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("required"));
}

#[tokio::test]
async fn users_read_only_their_own_status() {
    let app = app();
    let (status, body) = call(&app, Method::GET, "/users/u1/status", Some(("u1", "client")), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["identityStatus"], "pending_approval");
    assert_eq!(body["role"], "client");

    let (status, _) = call(&app, Method::GET, "/users/u2/status", Some(("u1", "client")), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = call(&app, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn incomplete_or_malformed_bodies_are_bad_requests() {
    let app = app();
    let (status, body) = call(
        &app,
        Method::POST,
        "/pairing/validate",
        AGENT,
        Some(json!({ "nexusCode": "ABC123" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "BAD_REQUEST");
    assert_eq!(body["retryable"], false);
    assert!(body["error"].as_str().unwrap().contains("code"));

    let (status, body) = call(
        &app,
        Method::POST,
        "/pairing/respond",
        BROKER,
        Some(json!({ "requestId": "r1", "action": "shrug" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "BAD_REQUEST");

    let request = Request::builder()
        .method(Method::POST)
        .uri("/verification/verify")
        .header(USER_HEADER, "u1")
        .header(ROLE_HEADER, "client")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn nested_user_ids_cannot_reach_other_namespaces() {
    let app = app();
    let (status, _) = call(
        &app,
        Method::POST,
        "/verification/extract",
        Some(("u1/x", "client")),
        Some(json!({ "storageKey": "temp/u1/x/passport-00" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = call(
        &app,
        Method::POST,
        "/verification/extract",
        Some(("u1", "client")),
        Some(json!({ "storageKey": "temp/u1/x/passport-00" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
