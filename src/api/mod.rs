use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{HeaderValue, StatusCode},
    middleware::{self, Next},
    response::Response,
    routing::get,
    Router,
};
use tower_http::trace::TraceLayer;

use crate::middleware::idempotency::{require_token, IdempotencyGuard};
use crate::AppState;

pub mod handlers;

/// Build the full application router: health checks plus the token API
/// mounted under `/api/v1`.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .route("/readyz", get(readiness_check))
        .nest("/api/v1", api_router(state.clone()))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(request_id_middleware))
        .layer(middleware::from_fn(security_headers_middleware))
}

/// Token API. Routes are relative; the caller mounts this under `/api/v1`.
pub fn api_router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    let guarded: Router<Arc<AppState>> = Router::new().route(
        "/test/idempotent",
        get(handlers::test_idempotent).post(handlers::test_idempotent),
    );

    Router::new()
        .route(
            "/token",
            get(handlers::issue_token).post(handlers::issue_token),
        )
        .merge(protect(guarded, state.guard.clone()))
        .fallback(fallback_404)
}

/// Require a fresh token on every route already registered on `router`.
///
/// Uses `route_layer`, so unmatched paths still 404 instead of consuming a
/// token. Routes added to `router` after this call are not guarded.
pub fn protect<S>(router: Router<S>, guard: Arc<IdempotencyGuard>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router.route_layer(middleware::from_fn_with_state(guard, require_token))
}

async fn fallback_404() -> StatusCode {
    StatusCode::NOT_FOUND
}

async fn readiness_check(State(state): State<Arc<AppState>>) -> Result<&'static str, StatusCode> {
    match state.store.ping().await {
        Ok(()) => Ok("ok"),
        Err(e) => {
            tracing::warn!(error = %e, "readiness: token store not reachable");
            Err(StatusCode::SERVICE_UNAVAILABLE)
        }
    }
}

/// Middleware: injects a unique X-Request-Id into every response.
/// This allows clients to correlate errors with service logs.
async fn request_id_middleware(req: Request, next: Next) -> Response {
    let req_id = uuid::Uuid::new_v4().to_string();
    let mut resp = next.run(req).await;
    if let Ok(val) = HeaderValue::from_str(&req_id) {
        resp.headers_mut().insert("x-request-id", val);
    }
    resp
}

/// Middleware: injects security headers into every response.
async fn security_headers_middleware(req: Request, next: Next) -> Response {
    let mut resp = next.run(req).await;
    let headers = resp.headers_mut();

    headers.insert("X-Content-Type-Options", HeaderValue::from_static("nosniff"));
    headers.insert("X-Frame-Options", HeaderValue::from_static("DENY"));

    // Issued tokens must never be served from a cache
    headers.insert("Cache-Control", HeaderValue::from_static("no-store"));

    // Tokens may travel in the query string
    headers.insert("Referrer-Policy", HeaderValue::from_static("no-referrer"));

    headers.remove("Server");

    resp
}
