// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP delivery client for the transport gateway.
//!
//! Sends `POST {base_url}/send` with `{to, message}`. Connection-class
//! failures get exactly one retry after a fixed backoff; application-class
//! rejections (non-2xx) are never retried. Consecutive sends to the same
//! conversation are spaced by a minimum interval, enforced by a cooperative
//! delay rather than by dropping messages.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, warn};

use courier_core::error::CourierError;
use courier_core::traits::DeliveryClient;
use courier_core::types::ConversationKey;

use crate::classify::is_connection_class;
use crate::health::HealthMonitor;
use crate::notify::Notifier;

const REJECTION_BODY_LIMIT: usize = 256;

#[derive(Debug, Serialize)]
struct SendRequest<'a> {
    to: &'a str,
    message: &'a str,
}

/// Per-conversation minimum send spacing.
///
/// Each key stores the next free send slot. A caller atomically claims the
/// slot and pushes it forward, then sleeps outside the map entry, so
/// concurrent callers for the same key line up without dropping anything.
struct RateSpacer {
    min_interval: Duration,
    slots: DashMap<ConversationKey, Instant>,
}

impl RateSpacer {
    fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            slots: DashMap::new(),
        }
    }

    async fn acquire(&self, key: &ConversationKey) {
        if self.min_interval.is_zero() {
            return;
        }
        let now = Instant::now();
        // A slot in the past imposes no wait, same as no slot at all, so
        // expired entries can be dropped instead of accumulating forever.
        self.slots.retain(|_, slot| *slot > now);
        let scheduled = {
            let mut entry = self.slots.entry(key.clone()).or_insert(now);
            let scheduled = (*entry).max(now);
            *entry = scheduled + self.min_interval;
            scheduled
        };
        if scheduled > now {
            debug!(key = %key, wait_ms = (scheduled - now).as_millis() as u64, "send spacing");
            tokio::time::sleep_until(scheduled).await;
        }
    }
}

enum AttemptError {
    /// Target unreachable; one retry is warranted.
    Connection(reqwest::Error),
    /// Request failed for a non-connection reason; do not retry.
    Fatal(reqwest::Error),
    /// The transport processed and rejected the request; do not retry.
    Rejected { status: reqwest::StatusCode, body: String },
}

pub struct HttpDeliveryClient {
    http: reqwest::Client,
    send_url: String,
    retry_backoff: Duration,
    connection_error_markers: Vec<String>,
    spacer: RateSpacer,
    health: Option<Arc<HealthMonitor>>,
    notifier: Option<Arc<Notifier>>,
}

impl HttpDeliveryClient {
    pub fn new(
        http: reqwest::Client,
        base_url: &str,
        retry_backoff: Duration,
        min_send_interval: Duration,
        connection_error_markers: Vec<String>,
    ) -> Self {
        Self {
            http,
            send_url: format!("{}/send", base_url.trim_end_matches('/')),
            retry_backoff,
            connection_error_markers,
            spacer: RateSpacer::new(min_send_interval),
            health: None,
            notifier: None,
        }
    }

    /// Report send successes and connection failures to the health monitor.
    pub fn with_health_monitor(mut self, health: Arc<HealthMonitor>) -> Self {
        self.health = Some(health);
        self
    }

    /// Announce successful sends through the side notification webhook.
    pub fn with_notifier(mut self, notifier: Arc<Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    async fn attempt(&self, to: &ConversationKey, text: &str) -> Result<(), AttemptError> {
        let response = self
            .http
            .post(&self.send_url)
            .json(&SendRequest {
                to: to.as_str(),
                message: text,
            })
            .send()
            .await
            .map_err(|err| {
                if is_connection_class(&err, &self.connection_error_markers) {
                    AttemptError::Connection(err)
                } else {
                    AttemptError::Fatal(err)
                }
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let mut body = response.text().await.unwrap_or_default();
        body.truncate(REJECTION_BODY_LIMIT);
        Err(AttemptError::Rejected { status, body })
    }

    fn on_success(&self, to: &ConversationKey, text: &str) {
        if let Some(health) = &self.health {
            health.record_success();
        }
        if let Some(notifier) = &self.notifier {
            notifier.message_sent(to, text);
        }
    }

    fn on_connection_failure(&self) {
        if let Some(health) = &self.health {
            health.record_failure();
        }
    }
}

#[async_trait]
impl DeliveryClient for HttpDeliveryClient {
    async fn deliver(&self, to: &ConversationKey, text: &str) -> Result<(), CourierError> {
        self.spacer.acquire(to).await;

        let first = self.attempt(to, text).await;
        let err = match first {
            Ok(()) => {
                self.on_success(to, text);
                return Ok(());
            }
            Err(AttemptError::Connection(err)) => {
                warn!(key = %to, error = %err, backoff_ms = self.retry_backoff.as_millis() as u64,
                    "connection failure, retrying once");
                tokio::time::sleep(self.retry_backoff).await;
                match self.attempt(to, text).await {
                    Ok(()) => {
                        self.on_success(to, text);
                        return Ok(());
                    }
                    Err(err) => err,
                }
            }
            Err(err) => err,
        };

        match err {
            AttemptError::Connection(err) => {
                self.on_connection_failure();
                Err(CourierError::Delivery {
                    message: "transport unreachable after retry".to_string(),
                    source: Some(Box::new(err)),
                })
            }
            AttemptError::Fatal(err) => Err(CourierError::Delivery {
                message: "send request failed".to_string(),
                source: Some(Box::new(err)),
            }),
            AttemptError::Rejected { status, body } => Err(CourierError::Delivery {
                message: format!("transport rejected send: {status}: {body}"),
                source: None,
            }),
        }
    }
}
