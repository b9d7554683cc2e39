// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ingress HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state, and serves until the
//! shutdown token fires.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use courier_core::error::CourierError;
use courier_pipeline::WorkerPool;

use crate::handlers;

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    /// The processing pipeline behind both ingress endpoints.
    pub pool: Arc<WorkerPool>,
    /// Whether queue mode is the configured default, reported in /stats.
    pub queue_mode: bool,
    /// Process start time for uptime calculation.
    pub start_time: std::time::Instant,
}

impl GatewayState {
    pub fn new(pool: Arc<WorkerPool>, queue_mode: bool) -> Self {
        Self {
            pool,
            queue_mode,
            start_time: std::time::Instant::now(),
        }
    }
}

/// Build the ingress router. Separated from [`start_server`] so tests can
/// drive it with `tower::ServiceExt::oneshot`.
pub fn build_router(state: GatewayState) -> Router {
    Router::new()
        .route("/webhook", post(handlers::post_webhook))
        .route("/queue", post(handlers::post_queue))
        .route("/stats", get(handlers::get_stats))
        .route("/health", get(handlers::get_health))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Start the ingress HTTP server with graceful shutdown.
pub async fn start_server(
    host: &str,
    port: u16,
    state: GatewayState,
    shutdown: CancellationToken,
) -> Result<(), CourierError> {
    let app = build_router(state);

    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| CourierError::Internal(format!("failed to bind ingress to {addr}: {e}")))?;

    tracing::info!("ingress listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| CourierError::Internal(format!("ingress server error: {e}")))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use courier_core::traits::AvailabilityGate;
    use courier_pipeline::DedupeStore;
    use courier_test_utils::{MockBrain, MockDelivery};

    struct AlwaysUp;

    #[async_trait::async_trait]
    impl AvailabilityGate for AlwaysUp {
        async fn ensure_available(&self) -> bool {
            true
        }
    }

    fn test_state(max_depth: usize) -> (GatewayState, Arc<MockBrain>, Arc<MockDelivery>) {
        let brain = Arc::new(MockBrain::new());
        let delivery = Arc::new(MockDelivery::new());
        let pool = Arc::new(WorkerPool::new(
            2,
            max_depth,
            Arc::clone(&brain) as Arc<dyn courier_core::traits::DecisionEngine>,
            Arc::clone(&delivery) as Arc<dyn courier_core::traits::DeliveryClient>,
            Arc::new(AlwaysUp),
            Arc::new(DedupeStore::new(Duration::from_secs(300), 1000)),
        ));
        (GatewayState::new(pool, true), brain, delivery)
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn webhook_replies_synchronously() {
        let (state, _brain, delivery) = test_state(100);
        let app = build_router(state);

        let response = app
            .oneshot(post_json(
                "/webhook",
                r#"{"message": "hi", "from_jid": "5511987654321@c.us", "message_id": "m1"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["success"], true);
        assert_eq!(json["action"], "reply");
        assert_eq!(json["response"], "ok");
        assert_eq!(delivery.sent_count().await, 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn webhook_replays_cached_outcome_for_duplicate() {
        let (state, brain, delivery) = test_state(100);
        let app = build_router(state);

        let body = r#"{"message": "hi", "from_jid": "a@s.whatsapp.net", "message_id": "m1"}"#;
        let first = app.clone().oneshot(post_json("/webhook", body)).await.unwrap();
        let first = body_json(first).await;
        assert_eq!(first["action"], "reply");

        let second = app.oneshot(post_json("/webhook", body)).await.unwrap();
        let second = body_json(second).await;
        assert_eq!(second["action"], "reply");
        assert_eq!(second["response"], "ok");

        // The duplicate was replayed from cache, not re-processed.
        assert_eq!(brain.call_count().await, 1);
        assert_eq!(delivery.sent_count().await, 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn queue_acknowledges_without_waiting() {
        let (state, brain, _delivery) = test_state(100);
        let _hold = brain.install_hold().await;
        let app = build_router(state);

        let response = app
            .oneshot(post_json(
                "/queue",
                r#"{"message": "hi", "from_jid": "a@s.whatsapp.net", "message_id": "m1"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["status"], "enqueued");
        assert_eq!(json["message_id"], "m1");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn queue_reports_duplicate_inflight() {
        let (state, brain, _delivery) = test_state(100);
        let _hold = brain.install_hold().await;
        let app = build_router(state);

        let body = r#"{"message": "hi", "from_jid": "a@s.whatsapp.net", "message_id": "m1"}"#;
        app.clone().oneshot(post_json("/queue", body)).await.unwrap();
        let response = app.oneshot(post_json("/queue", body)).await.unwrap();
        let json = body_json(response).await;
        assert_eq!(json["status"], "duplicate_inflight");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn queue_full_returns_503_and_allows_retry() {
        let (state, brain, _delivery) = test_state(1);
        let _hold = brain.install_hold().await;
        let pool = Arc::clone(&state.pool);
        let app = build_router(state);

        // Fill the single worker and the single queue slot.
        app.clone()
            .oneshot(post_json(
                "/queue",
                r#"{"message": "1", "from_jid": "a@s.whatsapp.net"}"#,
            ))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        // Hold uses concurrency 2, so occupy the second worker too.
        app.clone()
            .oneshot(post_json(
                "/queue",
                r#"{"message": "2", "from_jid": "b@s.whatsapp.net"}"#,
            ))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        app.clone()
            .oneshot(post_json(
                "/queue",
                r#"{"message": "3", "from_jid": "c@s.whatsapp.net"}"#,
            ))
            .await
            .unwrap();

        let response = app
            .clone()
            .oneshot(post_json(
                "/queue",
                r#"{"message": "4", "from_jid": "d@s.whatsapp.net", "message_id": "m4"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let json = body_json(response).await;
        assert_eq!(json["status"], "queue_full");

        // The dedupe mark was rolled back: the redelivery is New again.
        use courier_core::types::MessageId;
        assert!(matches!(
            pool.dedupe().check_and_mark(Some(&MessageId("m4".to_string()))),
            courier_pipeline::DedupeStatus::New
        ));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn stats_reports_counters_and_snapshot() {
        let (state, _brain, _delivery) = test_state(100);
        let app = build_router(state);

        app.clone()
            .oneshot(post_json(
                "/webhook",
                r#"{"message": "hi", "from_jid": "a@s.whatsapp.net"}"#,
            ))
            .await
            .unwrap();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/stats")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["received"], 1);
        assert_eq!(json["processed"], 1);
        assert_eq!(json["queue_mode"], true);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn health_reports_liveness() {
        let (state, _brain, _delivery) = test_state(100);
        let app = build_router(state);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn missing_sender_is_a_bad_request() {
        let (state, _brain, _delivery) = test_state(100);
        let app = build_router(state);

        let response = app
            .oneshot(post_json("/webhook", r#"{"message": "hi"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
