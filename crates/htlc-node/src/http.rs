//! Scrape and inspection endpoints.
//!
//! | Route | Body |
//! |-------|------|
//! | `GET /health` | health snapshot (JSON) |
//! | `GET /metrics` | Prometheus text format |
//! | `GET /swaps` | active swap snapshots (JSON) |
//! | `GET /swaps/:id` | one snapshot, secret redacted until public |

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{MatchedPath, Path, Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};

use htlc_orchestrator::{Orchestrator, SwapError, SwapId, SwapOrchestratorApi};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    /// Orchestrator being served.
    pub orchestrator: Arc<Orchestrator>,
}

/// Build the node router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/swaps", get(list_swaps))
        .route("/swaps/:id", get(swap_status))
        .route_layer(middleware::from_fn(track_requests))
        .with_state(state)
}

async fn track_requests(request: Request, next: Next) -> Response {
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_owned())
        .unwrap_or_else(|| "unmatched".to_owned());
    let started = Instant::now();
    let response = next.run(request).await;
    htlc_telemetry::observe_request(
        &path,
        response.status().as_u16(),
        started.elapsed().as_secs_f64(),
    );
    response
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.orchestrator.health();
    let degraded = snapshot.chains.iter().any(|c| !c.connected);
    Json(serde_json::json!({
        "status": if degraded { "degraded" } else { "healthy" },
        "service": "htlc-node",
        "version": env!("CARGO_PKG_VERSION"),
        "swaps": snapshot,
    }))
}

async fn metrics() -> Response {
    match htlc_telemetry::encode_metrics() {
        Ok(text) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

async fn list_swaps(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.orchestrator.list_active_swaps())
}

async fn swap_status(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let Some(id) = SwapId::parse(&id) else {
        return error_response(StatusCode::BAD_REQUEST, "malformed swap id");
    };
    match state.orchestrator.get_swap_status(&id) {
        Ok(snapshot) => Json(snapshot).into_response(),
        Err(SwapError::SwapNotFound(_)) => error_response(StatusCode::NOT_FOUND, "unknown swap"),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    }
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devnet::Devnet;
    use axum::body::{to_bytes, Body};
    use htlc_orchestrator::{Clock, InMemorySwapStore, OrchestratorConfig, TokioClock};
    use tower::ServiceExt;

    fn app() -> Router {
        let config = OrchestratorConfig::for_testing();
        let clock: Arc<dyn Clock> = Arc::new(TokioClock::starting_at(1_700_000_000));
        let devnet = Devnet::new(&config, Arc::clone(&clock));
        let (evm, tvm) = devnet.adapters(&config);
        let orchestrator =
            Orchestrator::new(config, evm, tvm, clock, Arc::new(InMemorySwapStore::new()))
                .unwrap();
        router(AppState {
            orchestrator: Arc::new(orchestrator),
        })
    }

    async fn get(app: Router, uri: &str) -> (StatusCode, String) {
        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_health_reports_swap_counts() {
        let (status, body) = get(app(), "/health").await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["swaps"]["active_swaps"], 0);
        assert_eq!(json["swaps"]["chains"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_metrics_exposes_text_format() {
        // Served once so the request counter has a sample.
        let _ = get(app(), "/health").await;
        let (status, body) = get(app(), "/metrics").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("htlc_http_requests_total"));
    }

    #[tokio::test]
    async fn test_swap_lookup_errors() {
        let (status, _) = get(app(), "/swaps/not-a-uuid").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let unknown = format!("/swaps/{}", SwapId::new());
        let (status, body) = get(app(), &unknown).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body.contains("unknown swap"));

        let (status, body) = get(app(), "/swaps").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "[]");
    }
}
