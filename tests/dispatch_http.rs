//! End-to-end dispatch tests
//!
//! A fake provisioning platform, uptime monitor and log-link issuer are
//! served by axum on a loopback port; the broker router is driven with
//! `oneshot` requests against it.

use axum::{
    body::Body,
    extract::{Path, State},
    http::{HeaderMap, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use deploy_broker::{
    config::{PlatformConfig, Settings},
    schemas::render::{CreateServicePayload, EnvVar, ServiceDetailsPayload},
    server::{routes::create_router, AppState},
    services::{
        CredentialRecord, DispatchMode, PlatformError, ProvisioningPlatform, RenderPlatform,
    },
    utils::TimeoutConfig,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::ServiceExt;

// ============================================================================
// Fake platform
// ============================================================================

#[derive(Clone)]
enum CreateBehavior {
    Created,
    Status(u16),
    /// 201 with a body that is not JSON
    Garbage,
}

#[derive(Clone)]
struct Account {
    load: usize,
    create: CreateBehavior,
}

fn account(load: usize, create: CreateBehavior) -> Account {
    Account { load, create }
}

#[derive(Default)]
struct FakePlatform {
    accounts: HashMap<String, Account>,
    create_calls: Mutex<Vec<String>>,
    env_calls: Mutex<Vec<(String, Vec<EnvVar>)>>,
    uptime_calls: Mutex<Vec<String>>,
}

type Shared = Arc<FakePlatform>;

fn bearer(headers: &HeaderMap) -> String {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .unwrap_or_default()
        .to_string()
}

async fn list_services(State(fake): State<Shared>, headers: HeaderMap) -> Response {
    match fake.accounts.get(&bearer(&headers)) {
        Some(account) => {
            let services: Vec<Value> = (0..account.load)
                .map(|i| json!({ "service": { "id": format!("srv-existing-{}", i) }, "cursor": "c" }))
                .collect();
            Json(services).into_response()
        }
        None => (StatusCode::UNAUTHORIZED, "unauthorized").into_response(),
    }
}

async fn create_service(
    State(fake): State<Shared>,
    headers: HeaderMap,
    Json(payload): Json<CreateServicePayload>,
) -> Response {
    let token = bearer(&headers);
    fake.create_calls.lock().unwrap().push(token.clone());

    match fake.accounts.get(&token).map(|a| a.create.clone()) {
        Some(CreateBehavior::Created) => (
            StatusCode::CREATED,
            Json(json!({
                "service": {
                    "id": format!("srv-{}", token),
                    "name": payload.name,
                    "serviceDetails": { "url": format!("https://{}.example.app", payload.name) }
                },
                "deployId": "dep-1"
            })),
        )
            .into_response(),
        Some(CreateBehavior::Status(code)) => (
            StatusCode::from_u16(code).unwrap(),
            "request refused by platform",
        )
            .into_response(),
        Some(CreateBehavior::Garbage) => (StatusCode::CREATED, "<html>oops</html>").into_response(),
        None => (StatusCode::UNAUTHORIZED, "unauthorized").into_response(),
    }
}

async fn replace_env(
    State(fake): State<Shared>,
    Path(service_id): Path<String>,
    Json(vars): Json<Vec<EnvVar>>,
) -> Json<Vec<EnvVar>> {
    fake.env_calls
        .lock()
        .unwrap()
        .push((service_id, vars.clone()));
    Json(vars)
}

async fn register_uptime(State(fake): State<Shared>, Json(body): Json<Value>) -> StatusCode {
    let url = body["url"].as_str().unwrap_or_default().to_string();
    fake.uptime_calls.lock().unwrap().push(url);
    StatusCode::BAD_GATEWAY
}

async fn issue_log_link(Json(body): Json<Value>) -> Json<Value> {
    let service_id = body["service_id"].as_str().unwrap_or_default();
    Json(json!({ "link": format!("https://logs.example/{}", service_id) }))
}

async fn spawn_fake(accounts: Vec<(&str, Account)>) -> (SocketAddr, Shared) {
    let fake = Arc::new(FakePlatform {
        accounts: accounts
            .into_iter()
            .map(|(token, account)| (token.to_string(), account))
            .collect(),
        ..Default::default()
    });

    let app = Router::new()
        .route("/v1/services", get(list_services).post(create_service))
        .route("/v1/services/:id/env-vars", put(replace_env))
        .route("/uptime", post(register_uptime))
        .route("/logs", post(issue_log_link))
        .with_state(fake.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr, fake)
}

// ============================================================================
// Broker helpers
// ============================================================================

fn settings(addr: SocketAddr, mode: DispatchMode, blob: Option<&str>) -> Settings {
    let mut settings = Settings::default();
    settings.platform.api_base = format!("http://{}/v1", addr);
    settings.dispatch.mode = mode;
    settings.store.seed_credentials = blob.map(str::to_string);
    settings.side_registration.uptime_url = Some(format!("http://{}/uptime", addr));
    settings.side_registration.log_link_url = Some(format!("http://{}/logs", addr));
    settings
}

async fn broker(settings: Settings) -> Router {
    create_router(AppState::new(settings).await.unwrap())
}

async fn call(router: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let body = body
        .map(|b| Body::from(b.to_string()))
        .unwrap_or_else(Body::empty);
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(body)
        .unwrap();

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

// ============================================================================
// Platform client
// ============================================================================

#[tokio::test]
async fn render_platform_speaks_the_rest_api() {
    let (addr, fake) = spawn_fake(vec![("busy", account(1, CreateBehavior::Created))]).await;
    let platform = RenderPlatform::new(
        PlatformConfig {
            api_base: format!("http://{}/v1/", addr),
            ..Default::default()
        },
        TimeoutConfig::default(),
    )
    .unwrap();

    let busy = CredentialRecord::new("busy", "tea-busy1");
    assert_eq!(platform.list_resources(&busy).await.unwrap(), 1);

    let stranger = CredentialRecord::new("stranger", "tea-nobody");
    match platform.list_resources(&stranger).await {
        Err(PlatformError::Status { code, body }) => {
            assert_eq!(code, 401);
            assert_eq!(body, "unauthorized");
        }
        other => panic!("expected 401, got {:?}", other),
    }

    let payload = CreateServicePayload {
        service_type: "web_service".into(),
        name: "bot-abc123".into(),
        owner_id: "tea-busy1".into(),
        repo: "https://github.com/example/bot".into(),
        auto_deploy: "yes".into(),
        service_details: ServiceDetailsPayload {
            env: "docker".into(),
            region: "singapore".into(),
            plan: "free".into(),
        },
    };
    let created = platform.create_service(&busy, &payload).await.unwrap();
    assert_eq!(created.id, "srv-busy");
    assert_eq!(created.name, "bot-abc123");
    assert_eq!(created.app_url, "https://bot-abc123.example.app");

    platform
        .replace_environment(&busy, &created.id, &[EnvVar::new("TOKEN", "x")])
        .await
        .unwrap();
    assert_eq!(
        *fake.env_calls.lock().unwrap(),
        vec![("srv-busy".to_string(), vec![EnvVar::new("TOKEN", "x")])]
    );

    assert_eq!(
        platform.dashboard_url("srv-busy"),
        "https://dashboard.render.com/web/srv-busy"
    );
}

#[tokio::test]
async fn render_platform_reports_unreachable_host_as_transport() {
    // Bind then drop to get a port nothing listens on
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let platform = RenderPlatform::new(
        PlatformConfig {
            api_base: format!("http://{}/v1", addr),
            ..Default::default()
        },
        TimeoutConfig::new().with_probe(Duration::from_secs(2)),
    )
    .unwrap();

    let err = platform
        .list_resources(&CredentialRecord::new("any", "tea-any00"))
        .await
        .unwrap_err();
    assert!(err.is_retryable());
    assert!(matches!(err, PlatformError::Transport(_)));
}

// ============================================================================
// Dispatch over HTTP
// ============================================================================

#[tokio::test]
async fn load_based_deploy_uses_least_loaded_account() {
    let (addr, fake) = spawn_fake(vec![
        ("a", account(1, CreateBehavior::Created)),
        ("b", account(0, CreateBehavior::Created)),
        ("c", account(5, CreateBehavior::Created)),
    ])
    .await;
    let router = broker(settings(
        addr,
        DispatchMode::LoadBased,
        Some("a,tea-alpha\nb,tea-bravo\nc,tea-charlie"),
    ))
    .await;

    let (status, body) = call(
        &router,
        "POST",
        "/api/deploy",
        Some(json!({
            "repo": "https://github.com/example/bot",
            "env_vars": { "TOKEN": "x", "EMPTY": "" }
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
    assert_eq!(body["service_id"], "srv-b");
    assert_eq!(body["owner_id"], "tea-bravo");
    assert_eq!(body["attempts"], 1);
    assert_eq!(body["log_url"], "https://logs.example/srv-b");
    assert!(body["app_url"].as_str().unwrap().ends_with(".example.app"));

    let advisories: Vec<&str> = body["advisories"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(Value::as_str)
        .collect();
    assert!(advisories.iter().any(|a| a.starts_with("uptime:")));
    assert!(advisories.iter().any(|a| a.contains("EMPTY")));

    assert_eq!(*fake.create_calls.lock().unwrap(), vec!["b"]);
    assert_eq!(
        *fake.env_calls.lock().unwrap(),
        vec![("srv-b".to_string(), vec![EnvVar::new("TOKEN", "x")])]
    );
    assert_eq!(fake.uptime_calls.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn load_based_deploy_reports_capacity() {
    let (addr, fake) = spawn_fake(vec![
        ("a", account(2, CreateBehavior::Created)),
        ("b", account(3, CreateBehavior::Created)),
    ])
    .await;
    let router = broker(settings(addr, DispatchMode::LoadBased, Some("a\nb"))).await;

    let (status, body) = call(&router, "POST", "/api/deploy", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "error");
    assert_eq!(body["reason"], "capacity_exceeded");
    assert!(fake.create_calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn blind_deploy_fails_over_on_rate_limit() {
    let (addr, fake) = spawn_fake(vec![
        ("a", account(0, CreateBehavior::Status(429))),
        ("b", account(0, CreateBehavior::Created)),
    ])
    .await;
    let router = broker(settings(addr, DispatchMode::Blind, Some("a\nb"))).await;

    let (_, body) = call(&router, "POST", "/api/deploy", Some(json!({}))).await;
    assert_eq!(body["status"], "success");
    assert_eq!(body["service_id"], "srv-b");

    let calls = fake.create_calls.lock().unwrap().clone();
    assert_eq!(calls.last().map(String::as_str), Some("b"));
    assert_eq!(body["attempts"], calls.len());
}

#[tokio::test]
async fn blind_deploy_exhausts_pool() {
    let (addr, fake) = spawn_fake(vec![
        ("a", account(0, CreateBehavior::Status(429))),
        ("b", account(0, CreateBehavior::Status(500))),
    ])
    .await;
    let router = broker(settings(addr, DispatchMode::Blind, Some("a\nb"))).await;

    let (status, body) = call(&router, "POST", "/api/deploy", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "error");
    assert_eq!(body["reason"], "pool_exhausted");
    assert_eq!(body["attempts"], 2);
    assert!(body["message"].as_str().unwrap().contains("HTTP"));
    assert_eq!(fake.create_calls.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn unreadable_create_response_is_not_retried() {
    let (addr, fake) = spawn_fake(vec![
        ("a", account(0, CreateBehavior::Garbage)),
        ("b", account(0, CreateBehavior::Garbage)),
    ])
    .await;
    let router = broker(settings(addr, DispatchMode::Blind, Some("a\nb"))).await;

    let (_, body) = call(&router, "POST", "/api/deploy", None).await;
    assert_eq!(body["reason"], "provision_rejected");
    assert_eq!(body["attempts"], 1);
    assert_eq!(fake.create_calls.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn deploy_with_empty_pool_reports_pool_empty() {
    let (addr, _fake) = spawn_fake(vec![]).await;
    let router = broker(settings(addr, DispatchMode::LoadBased, None)).await;

    let (status, body) = call(&router, "POST", "/api/deploy", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "error");
    assert_eq!(body["reason"], "pool_empty");
    assert_eq!(body["attempts"], 0);
}

#[tokio::test]
async fn malformed_deploy_body_answers_with_failure_result() {
    let (addr, fake) = spawn_fake(vec![("a", account(0, CreateBehavior::Created))]).await;
    let router = broker(settings(addr, DispatchMode::LoadBased, Some("a,tea-alpha"))).await;

    let request = Request::builder()
        .method("POST")
        .uri("/api/deploy")
        .body(Body::from("{not json"))
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["status"], "error");
    assert_eq!(body["reason"], "invalid_request");
    assert_eq!(body["attempts"], 0);
    assert!(body["message"].as_str().unwrap().contains("Malformed deploy request"));
    assert!(fake.create_calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn numeric_and_boolean_env_values_are_forwarded_as_text() {
    let (addr, fake) = spawn_fake(vec![("a", account(0, CreateBehavior::Created))]).await;
    let router = broker(settings(addr, DispatchMode::LoadBased, Some("a,tea-alpha"))).await;

    let (status, body) = call(
        &router,
        "POST",
        "/api/deploy",
        Some(json!({
            "repo": "https://github.com/example/bot",
            "env_vars": { "PORT": 8080, "DEBUG": true }
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
    assert_eq!(
        *fake.env_calls.lock().unwrap(),
        vec![(
            "srv-a".to_string(),
            vec![EnvVar::new("DEBUG", "true"), EnvVar::new("PORT", "8080")]
        )]
    );
}

// ============================================================================
// Admin and health routes
// ============================================================================

#[tokio::test]
async fn credential_admin_routes() {
    let (addr, _fake) = spawn_fake(vec![]).await;
    let router = broker(settings(addr, DispatchMode::LoadBased, None)).await;

    let (status, body) = call(
        &router,
        "POST",
        "/api/credentials",
        Some(json!({ "token": "rnd_abcdef123", "owner_id": "tea-12345" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["count"], 1);
    assert_eq!(body["credentials"][0]["token"], "****f123");
    assert_eq!(body["credentials"][0]["owner_id"], "tea-12345");

    let (status, body) = call(&router, "POST", "/api/credentials", Some(json!({ "token": "  " }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["type"], "invalid_request_error");

    let (status, _) = call(
        &router,
        "POST",
        "/api/credentials",
        Some(json!({ "token": "a,b" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(&router, "PUT", "/api/settings", Some(json!({ "default_owner": "abc" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    call(
        &router,
        "POST",
        "/api/credentials",
        Some(json!({ "token": "rnd_second0000" })),
    )
    .await;
    let (status, body) = call(
        &router,
        "PUT",
        "/api/settings",
        Some(json!({
            "default_repository": "https://github.com/example/other",
            "default_owner": "tea-store"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["default_repository"], "https://github.com/example/other");
    assert_eq!(body["default_owner"], "tea-store");
    assert_eq!(body["count"], 2);
    assert_eq!(body["credentials"][1]["owner_id"], "tea-store");

    let (status, _) = call(&router, "DELETE", "/api/credentials", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, body) = call(&router, "GET", "/api/credentials", None).await;
    assert_eq!(body["count"], 0);
    assert_eq!(body["default_repository"], "https://github.com/example/other");
}

#[tokio::test]
async fn health_routes() {
    let (addr, _fake) = spawn_fake(vec![]).await;
    let router = broker(settings(addr, DispatchMode::Blind, None)).await;

    let (status, body) = call(&router, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["dispatch_mode"], "blind");

    let (status, body) = call(&router, "GET", "/ready", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["checks"]["store"], true);

    let (_, body) = call(&router, "GET", "/liveness", None).await;
    assert_eq!(body["alive"], true);
}
