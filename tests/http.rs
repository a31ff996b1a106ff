//! End-to-end scenarios through the axum router.

mod common;

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::routing::post;
use axum::{Form, Router};
use common::{CountingStore, UnreachableStore};
use idempotent::api;
use idempotent::config::Config;
use idempotent::middleware::idempotency::{IdempotencyGuard, MAX_FORM_BYTES};
use idempotent::response::ServerResponse;
use idempotent::store::{MemoryTokenStore, TokenStore};
use idempotent::token::{TokenIssuer, UNUSED_MARKER};
use idempotent::AppState;
use tower::ServiceExt;

fn app_with(store: Arc<dyn TokenStore>) -> Router {
    api::router(AppState::new(Config::default(), store))
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, ServerResponse) {
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

async fn issue(app: &Router) -> String {
    let (status, body) = send(
        app,
        Request::post("/api/v1/token").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.is_success());
    body.data.unwrap().as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_issue_endpoint_returns_token_in_envelope() {
    let app = app_with(Arc::new(MemoryTokenStore::new()));
    let token = issue(&app).await;
    assert!(token.starts_with("idempotent:token:"));
}

#[tokio::test]
async fn test_header_token_allows_once_then_repetitive() {
    let app = app_with(Arc::new(MemoryTokenStore::new()));
    let token = issue(&app).await;

    let first = Request::post("/api/v1/test/idempotent")
        .header("token", &token)
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, first).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.status, 0);
    assert_eq!(body.msg.as_deref(), Some("test idempotent success"));

    let again = Request::post("/api/v1/test/idempotent")
        .header("token", &token)
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, again).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body.status, 3);
    assert_eq!(
        body.msg.as_deref(),
        Some(Config::default().messages.repetitive_operation.as_str())
    );
}

#[tokio::test]
async fn test_no_token_is_illegal_argument() {
    let store = CountingStore::default();
    let app = app_with(Arc::new(store.clone()));

    let (status, body) = send(
        &app,
        Request::post("/api/v1/test/idempotent").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body.status, 2);
    assert_eq!(
        body.msg.as_deref(),
        Some(Config::default().messages.illegal_argument.as_str())
    );
    assert!(body.data.is_none());
    assert_eq!(store.calls(), 0);
}

#[tokio::test]
async fn test_query_parameter_token() {
    let app = app_with(Arc::new(MemoryTokenStore::new()));
    let token = issue(&app).await;

    let uri = format!("/api/v1/test/idempotent?token={}", token);
    let (status, _) = send(&app, Request::get(uri.as_str()).body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, Request::get(uri.as_str()).body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body.status, 3);
}

#[tokio::test]
async fn test_form_body_token() {
    let app = app_with(Arc::new(MemoryTokenStore::new()));
    let token = issue(&app).await;

    let form = Request::post("/api/v1/test/idempotent")
        .header("content-type", "application/x-www-form-urlencoded")
        .body(Body::from(format!("amount=10&token={}", token)))
        .unwrap();
    let (status, body) = send(&app, form).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.is_success());
}

/// Guarded routes that hand back what they received.
fn echo_app(store: MemoryTokenStore) -> (TokenIssuer, Router) {
    async fn raw_body(body: String) -> String {
        body
    }

    async fn amount(Form(fields): Form<HashMap<String, String>>) -> String {
        fields.get("amount").cloned().unwrap_or_default()
    }

    let cfg = Config::default();
    let store: Arc<dyn TokenStore> = Arc::new(store);
    let issuer = TokenIssuer::from_config(store.clone(), &cfg);
    let guard = Arc::new(IdempotencyGuard::from_config(store, &cfg));
    let routes = Router::new()
        .route("/raw", post(raw_body))
        .route("/amount", post(amount));
    (issuer, api::protect(routes, guard))
}

fn form_post(uri: &str, body: String) -> Request<Body> {
    Request::post(uri)
        .header("content-type", "application/x-www-form-urlencoded")
        .body(Body::from(body))
        .unwrap()
}

async fn text(resp: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn test_form_body_reaches_guarded_handler_intact() {
    let (issuer, app) = echo_app(MemoryTokenStore::new());

    let token = issuer.issue().await.unwrap();
    let sent = format!("amount=10&token={}&note=a%20b", token);
    let resp = app.clone().oneshot(form_post("/raw", sent.clone())).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(text(resp).await, sent);

    let token = issuer.issue().await.unwrap();
    let resp = app
        .oneshot(form_post("/amount", format!("amount=10&token={}", token)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(text(resp).await, "10");
}

#[tokio::test]
async fn test_oversized_form_is_illegal_argument_and_keeps_token() {
    let store = MemoryTokenStore::new();
    let (issuer, app) = echo_app(store.clone());
    let token = issuer.issue().await.unwrap();

    let padding = "a".repeat(MAX_FORM_BYTES);
    let resp = app
        .oneshot(form_post("/raw", format!("token={}&pad={}", token, padding)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let body: ServerResponse = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body.status, 2);
    assert_eq!(
        body.msg.as_deref(),
        Some(Config::default().messages.illegal_argument.as_str())
    );

    // The body was never parsed, so the token was never consumed.
    assert!(store.atomic_consume(token.as_str(), UNUSED_MARKER).await.unwrap());
}

#[tokio::test]
async fn test_unknown_token_is_repetitive() {
    let app = app_with(Arc::new(MemoryTokenStore::new()));
    let req = Request::post("/api/v1/test/idempotent")
        .header("token", "idempotent:token:never-issued")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body.status, 3);
}

#[tokio::test]
async fn test_unreachable_store_never_runs_handler() {
    let app = app_with(Arc::new(UnreachableStore));

    let (status, body) = send(
        &app,
        Request::post("/api/v1/token").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(!body.is_success());
    assert!(body.data.is_none());

    let req = Request::post("/api/v1/test/idempotent")
        .header("token", "idempotent:token:any")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body.status, 1);
    assert_ne!(body.msg.as_deref(), Some("test idempotent success"));
}

#[tokio::test]
async fn test_unguarded_routes_and_health_endpoints() {
    let store = CountingStore::default();
    let app = app_with(Arc::new(store.clone()));

    let resp = app
        .clone()
        .oneshot(Request::get("/healthz").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers().contains_key("x-request-id"));
    assert_eq!(resp.headers()["cache-control"], "no-store");

    let resp = app
        .clone()
        .oneshot(Request::get("/readyz").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = app
        .clone()
        .oneshot(Request::get("/api/v1/nope").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(store.calls(), 0);
}

#[tokio::test]
async fn test_readyz_reports_store_down() {
    let app = app_with(Arc::new(UnreachableStore));
    let resp = app
        .oneshot(Request::get("/readyz").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
}
