//! HTTP server for the caching demo
//!
//! Provides /health plus one route per caching strategy. Every strategy route
//! caches the same slow source under the same key.

use crate::source::SlowClock;
use crate::types::{ErrorResponse, HealthResponse};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tiered_cache::{CacheAside, CacheError, Strategy};
use tokio::signal;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

/// The single logical key the demo routes cache
pub const CURRENT_TIME_KEY: &str = "current-time";

/// Shared state for the HTTP server
pub struct ServerState {
    pub cache: CacheAside<SlowClock>,
    pub started_at: DateTime<Utc>,
}

impl ServerState {
    pub fn new(cache: CacheAside<SlowClock>) -> Self {
        Self {
            cache,
            started_at: Utc::now(),
        }
    }
}

pub type SharedState = Arc<ServerState>;

/// Create the HTTP router
pub fn create_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/memorycache", get(memory_cache))
        .route("/distributedCache", get(distributed_cache))
        .route("/hybridcache", get(hybrid_cache))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the HTTP server and run until Ctrl-C or SIGTERM
pub async fn start_server(state: SharedState, port: u16) -> std::io::Result<()> {
    let router = create_router(state);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}

/// Health check endpoint
async fn health(State(state): State<SharedState>) -> Json<HealthResponse> {
    let uptime_secs = (Utc::now() - state.started_at).num_seconds() as u64;

    Json(HealthResponse {
        status: "ok".to_string(),
        uptime_secs,
        remote: state.cache.remote_available().await,
        cache: state.cache.stats(),
    })
}

async fn memory_cache(State(state): State<SharedState>) -> Response {
    cached_time(&state, Strategy::Local).await
}

async fn distributed_cache(State(state): State<SharedState>) -> Response {
    cached_time(&state, Strategy::Remote).await
}

async fn hybrid_cache(State(state): State<SharedState>) -> Response {
    cached_time(&state, Strategy::Hybrid).await
}

async fn cached_time(state: &ServerState, strategy: Strategy) -> Response {
    match state.cache.get(strategy, CURRENT_TIME_KEY).await {
        Ok(value) => value.into_response(),
        Err(e) => {
            let status = status_for(&e);
            if status.is_server_error() && status != StatusCode::SERVICE_UNAVAILABLE {
                error!(strategy = %strategy, error = %e, "Cache lookup failed");
            } else {
                warn!(strategy = %strategy, error = %e, "Cache lookup failed");
            }
            (
                status,
                Json(ErrorResponse {
                    error: e.to_string(),
                }),
            )
                .into_response()
        }
    }
}

fn status_for(err: &CacheError) -> StatusCode {
    match err {
        CacheError::RemoteUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        CacheError::SourceFailure(_) => StatusCode::BAD_GATEWAY,
        CacheError::Serialization(_) | CacheError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{header, Request};
    use std::time::Duration;
    use tiered_cache::{CacheAsideConfig, MemoryStore, RemoteStore, Utf8Codec};
    use tower::ServiceExt;

    struct RefusingStore;

    #[async_trait]
    impl RemoteStore for RefusingStore {
        async fn get(&self, _key: &str) -> tiered_cache::Result<Option<Vec<u8>>> {
            Err(CacheError::RemoteUnavailable("connection refused".to_string()))
        }

        async fn set(
            &self,
            _key: &str,
            _payload: Vec<u8>,
            _ttl: Duration,
        ) -> tiered_cache::Result<()> {
            Err(CacheError::RemoteUnavailable("connection refused".to_string()))
        }

        async fn ping(&self) -> tiered_cache::Result<()> {
            Err(CacheError::RemoteUnavailable("connection refused".to_string()))
        }
    }

    fn create_test_state(store: Arc<dyn RemoteStore>) -> SharedState {
        let cache = CacheAside::new(
            SlowClock::new(Duration::from_secs(3)),
            store,
            Arc::new(Utf8Codec),
            CacheAsideConfig::default(),
        );
        Arc::new(ServerState::new(cache))
    }

    async fn get_body(router: Router, uri: &str) -> (StatusCode, String) {
        let response = router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test(start_paused = true)]
    async fn test_health_endpoint() {
        let router = create_router(create_test_state(Arc::new(MemoryStore::new())));

        let (status, body) = get_body(router, "/health").await;
        assert_eq!(status, StatusCode::OK);

        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["remote"], true);
        assert!(json["uptime_secs"].as_u64().is_some());
        assert!(json["cache"]["producer_calls"].as_u64().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_strategy_routes_return_cached_text() {
        let state = create_test_state(Arc::new(MemoryStore::new()));
        let router = create_router(state.clone());

        for uri in ["/memorycache", "/distributedCache", "/hybridcache"] {
            let response = router
                .clone()
                .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            assert!(response.headers()[header::CONTENT_TYPE]
                .to_str()
                .unwrap()
                .starts_with("text/plain"));

            let first = axum::body::to_bytes(response.into_body(), usize::MAX)
                .await
                .unwrap();
            let (_, second) = get_body(router.clone(), uri).await;
            assert_eq!(String::from_utf8(first.to_vec()).unwrap(), second);
        }

        // Local and remote each computed once; hybrid found the remote copy
        assert_eq!(state.cache.stats().producer_calls, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_remote_outage_is_service_unavailable() {
        let state = create_test_state(Arc::new(RefusingStore));
        let router = create_router(state);

        let (status, body) = get_body(router.clone(), "/distributedCache").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(body.contains("Remote cache unavailable"));

        let (status, _) = get_body(router.clone(), "/hybridcache").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

        // The local-only route does not depend on the remote tier
        let (status, _) = get_body(router, "/memorycache").await;
        assert_eq!(status, StatusCode::OK);
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            status_for(&CacheError::SourceFailure("x".to_string())),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status_for(&CacheError::Serialization("x".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_server_state_new() {
        let state = create_test_state(Arc::new(MemoryStore::new()));

        let diff = (Utc::now() - state.started_at).num_seconds();
        assert!((0..5).contains(&diff));
    }
}
