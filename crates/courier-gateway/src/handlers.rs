// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for the ingress API.
//!
//! Handles POST /webhook (synchronous), POST /queue (admission-control
//! acknowledgment), GET /stats and GET /health.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use courier_core::types::{ConversationKey, InboundEvent, MessageId};
use courier_pipeline::{DedupeStatus, EnqueueResult};

use crate::server::GatewayState;

/// Request body shared by POST /webhook and POST /queue.
///
/// `from_jid`/`sender` and `display_name`/`pushName` are accepted as
/// aliases for compatibility with older transport senders.
#[derive(Debug, Deserialize)]
pub struct InboundRequest {
    pub message: String,
    #[serde(default)]
    pub from_jid: Option<String>,
    #[serde(default)]
    pub sender: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default, rename = "pushName")]
    pub push_name: Option<String>,
    #[serde(default)]
    pub message_id: Option<String>,
}

impl InboundRequest {
    /// Build the immutable pipeline event, normalizing the conversation key.
    pub fn into_event(self) -> Result<InboundEvent, &'static str> {
        let raw_key = self
            .from_jid
            .or(self.sender)
            .filter(|s| !s.trim().is_empty())
            .ok_or("missing required field: from_jid or sender")?;
        if self.message.trim().is_empty() {
            return Err("missing required field: message");
        }
        let conversation_key = ConversationKey::normalize(&raw_key);
        let sender_display_name = self
            .display_name
            .or(self.push_name)
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(raw_key);
        Ok(InboundEvent {
            message_id: self
                .message_id
                .filter(|id| !id.trim().is_empty())
                .map(MessageId),
            is_group: conversation_key.is_group(),
            conversation_key,
            sender_display_name,
            body_text: self.message,
            received_at: chrono::Utc::now(),
        })
    }
}

/// Response body for POST /webhook.
#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub success: bool,
    pub action: String,
    pub response: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Response body for POST /queue.
#[derive(Debug, Serialize)]
pub struct QueueResponse {
    pub success: bool,
    pub status: &'static str,
    pub message_id: String,
}

/// Response body for GET /stats.
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub received: u64,
    pub processed: u64,
    pub errors: u64,
    pub queue_length: usize,
    pub active_workers: usize,
    pub inflight_ids: usize,
    pub queue_mode: bool,
}

/// Response body for GET /health.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
}

/// Error response body for malformed requests.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn bad_request(message: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
        .into_response()
}

impl WebhookResponse {
    fn from_outcome(outcome: &courier_core::types::DecisionOutcome) -> Self {
        Self {
            success: true,
            action: outcome.action.to_string(),
            response: outcome.response_text.clone(),
            reason: outcome.reason.as_ref().map(|r| r.to_string()),
        }
    }

    fn ignored(reason: &str) -> Self {
        Self {
            success: true,
            action: "ignore".to_string(),
            response: String::new(),
            reason: Some(reason.to_string()),
        }
    }
}

/// POST /webhook
///
/// Legacy synchronous mode: applies the full dedupe contract, then runs the
/// decision and delivery inline and answers with the outcome. Duplicates of
/// completed messages replay the cached outcome.
pub async fn post_webhook(
    State(state): State<GatewayState>,
    Json(body): Json<InboundRequest>,
) -> Response {
    let event = match body.into_event() {
        Ok(event) => event,
        Err(msg) => return bad_request(msg),
    };

    match state.pool.dedupe().check_and_mark(event.message_id.as_ref()) {
        DedupeStatus::DuplicateInflight => {
            debug!(key = %event.conversation_key, "duplicate while inflight, acknowledging");
            Json(WebhookResponse::ignored("duplicate_inflight")).into_response()
        }
        DedupeStatus::DuplicateSeen(Some(cached)) => {
            debug!(key = %event.conversation_key, "duplicate of completed message, replaying");
            Json(WebhookResponse::from_outcome(&cached)).into_response()
        }
        DedupeStatus::DuplicateSeen(None) => {
            Json(WebhookResponse::ignored("duplicate")).into_response()
        }
        DedupeStatus::New => {
            let outcome = state.pool.process_inline(event).await;
            Json(WebhookResponse::from_outcome(&outcome)).into_response()
        }
    }
}

/// POST /queue
///
/// Queue mode: pure admission control, never waits for processing. Rejected
/// admissions roll back the dedupe mark so the transport's redelivery is
/// treated as new.
pub async fn post_queue(
    State(state): State<GatewayState>,
    Json(body): Json<InboundRequest>,
) -> Response {
    let event = match body.into_event() {
        Ok(event) => event,
        Err(msg) => return bad_request(msg),
    };
    let echo_id = event
        .message_id
        .as_ref()
        .map(|id| id.0.clone())
        .unwrap_or_default();

    let status = match state.pool.dedupe().check_and_mark(event.message_id.as_ref()) {
        DedupeStatus::DuplicateInflight => "duplicate_inflight",
        DedupeStatus::DuplicateSeen(_) => "duplicate_seen",
        DedupeStatus::New => {
            let message_id = event.message_id.clone();
            match state.pool.enqueue(event) {
                EnqueueResult::Enqueued => "enqueued",
                EnqueueResult::QueueFull => {
                    if let Some(id) = &message_id {
                        state.pool.dedupe().forget(id);
                    }
                    return (
                        StatusCode::SERVICE_UNAVAILABLE,
                        Json(QueueResponse {
                            success: false,
                            status: "queue_full",
                            message_id: echo_id,
                        }),
                    )
                        .into_response();
                }
            }
        }
    };

    Json(QueueResponse {
        success: true,
        status,
        message_id: echo_id,
    })
    .into_response()
}

/// GET /stats
///
/// Read-only snapshot of the pipeline's in-memory state, no side effects.
pub async fn get_stats(State(state): State<GatewayState>) -> Json<StatsResponse> {
    let counters = state.pool.counters();
    let snapshot = state.pool.snapshot();
    Json(StatsResponse {
        received: counters.received.load(std::sync::atomic::Ordering::Relaxed),
        processed: counters.processed.load(std::sync::atomic::Ordering::Relaxed),
        errors: counters.errors.load(std::sync::atomic::Ordering::Relaxed),
        queue_length: snapshot.queue_len,
        active_workers: snapshot.active_workers,
        inflight_ids: snapshot.inflight_ids,
        queue_mode: state.queue_mode,
    })
}

/// GET /health
///
/// Liveness of the ingress itself, not of the downstream transport.
pub async fn get_health(State(state): State<GatewayState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}
