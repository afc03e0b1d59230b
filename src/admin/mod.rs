//! Admin API.
//!
//! # Routes
//! - `GET /admin/status`: version, circuit state and cache size
//! - `GET /admin/health`: full network health snapshot
//! - `GET /admin/cache`: client cache counters
//! - `POST /admin/token/analyze`: token health report for a raw credential
//! - `POST /admin/reset`: clear cache and health state
//!
//! Every route requires `Authorization: Bearer <admin.api_key>`.

pub mod auth;
pub mod handlers;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::context::GatewayContext;

/// State shared with admin handlers.
pub type AdminState = Arc<GatewayContext>;

#[allow(deprecated)]
pub fn setup_admin_router(state: AdminState) -> Router {
    let timeout = Duration::from_secs(state.config().admin.request_timeout_secs);
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/health", get(get_health))
        .route("/admin/cache", get(get_cache))
        .route("/admin/token/analyze", post(analyze_token))
        .route("/admin/reset", post(reset_state))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .with_state(state)
        .layer(TimeoutLayer::new(timeout))
        .layer(TraceLayer::new_for_http())
}

/// Serve the admin API until shutdown.
pub async fn serve_admin(
    state: AdminState,
    listener: TcpListener,
    mut shutdown: broadcast::Receiver<()>,
) -> std::io::Result<()> {
    let addr = listener.local_addr()?;
    tracing::info!(address = %addr, "Admin API listening");

    axum::serve(listener, setup_admin_router(state))
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await?;

    tracing::info!("Admin API stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GatewayConfig;
    use crate::observability::telemetry::NoopTelemetry;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use serde_json::Value;
    use tower::ServiceExt;

    fn state() -> AdminState {
        let mut config = GatewayConfig::default();
        config.project_id = "demo".into();
        config.admin.api_key = "secret".into();
        Arc::new(GatewayContext::new(config, Arc::new(NoopTelemetry)).unwrap())
    }

    fn request(method: &str, uri: &str, key: Option<&str>, body: Body) -> Request<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(key) = key {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {key}"));
        }
        builder.body(body).unwrap()
    }

    async fn json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), 1 << 20).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_rejects_missing_or_wrong_key() {
        let app = setup_admin_router(state());
        let res = app
            .clone()
            .oneshot(request("GET", "/admin/status", None, Body::empty()))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

        let res = app
            .oneshot(request("GET", "/admin/status", Some("wrong"), Body::empty()))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_status_and_health() {
        let app = setup_admin_router(state());
        let res = app
            .clone()
            .oneshot(request("GET", "/admin/status", Some("secret"), Body::empty()))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let body = json(res).await;
        assert_eq!(body["status"], "operational");
        assert_eq!(body["circuit"], "closed");

        let res = app
            .oneshot(request("GET", "/admin/health", Some("secret"), Body::empty()))
            .await
            .unwrap();
        let body = json(res).await;
        assert_eq!(body["score"], 50);
        assert_eq!(body["status"], "degraded");
        assert_eq!(body["total_requests"], 0);
    }

    #[tokio::test]
    async fn test_analyze_token() {
        let app = setup_admin_router(state());
        let res = app
            .oneshot(request(
                "POST",
                "/admin/token/analyze",
                Some("secret"),
                Body::from(r#"{"token":"abc"}"#),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let body = json(res).await;
        assert_eq!(body["is_valid"], false);
        assert_eq!(body["failed_stage"], "cleaning");
        assert_eq!(body["score"], 20);
    }

    #[tokio::test]
    async fn test_reset_clears_cache() {
        let state = state();
        state
            .cache
            .get_or_build(&crate::client::Credential::Bearer("aGVhZGVy.cGF5bG9hZA.c2ln".into()))
            .unwrap();
        let app = setup_admin_router(state.clone());

        let res = app
            .clone()
            .oneshot(request("POST", "/admin/reset", Some("secret"), Body::empty()))
            .await
            .unwrap();
        assert_eq!(json(res).await["status"], "reset");
        assert!(state.cache.is_empty());

        let res = app
            .oneshot(request("GET", "/admin/cache", Some("secret"), Body::empty()))
            .await
            .unwrap();
        let body = json(res).await;
        assert_eq!(body["entries"], 0);
        assert_eq!(body["capacity"], 50);
    }
}
