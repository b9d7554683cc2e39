// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock decision engine for deterministic testing.
//!
//! `MockBrain` implements `DecisionEngine` with scripted outcomes, optional
//! artificial latency, an optional hold gate for testing in-flight states,
//! and full call recording for assertions.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, Semaphore};

use courier_core::error::CourierError;
use courier_core::traits::DecisionEngine;
use courier_core::types::{ConversationKey, DecisionOutcome, InboundEvent};

/// A recorded invocation of the mock brain.
#[derive(Debug, Clone)]
pub struct BrainCall {
    pub conversation_key: ConversationKey,
    pub body_text: String,
    pub started_at: tokio::time::Instant,
}

/// A mock decision engine for testing.
///
/// Behavior per call, in order:
/// 1. Record the call and update concurrency high-water mark
/// 2. Wait on the hold gate if one is installed (test releases permits)
/// 3. Sleep the configured delay, if any
/// 4. Pop the next scripted result, or return the default reply
pub struct MockBrain {
    default_outcome: Mutex<DecisionOutcome>,
    scripted: Mutex<Vec<Result<DecisionOutcome, CourierError>>>,
    delay: Mutex<Option<std::time::Duration>>,
    hold: Mutex<Option<Arc<Semaphore>>>,
    calls: Mutex<Vec<BrainCall>>,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

impl MockBrain {
    /// Create a mock brain that replies `"ok"` to everything.
    pub fn new() -> Self {
        Self {
            default_outcome: Mutex::new(DecisionOutcome::reply("ok")),
            scripted: Mutex::new(Vec::new()),
            delay: Mutex::new(None),
            hold: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
        }
    }

    /// Set the outcome returned when no scripted result is queued.
    pub async fn set_default_outcome(&self, outcome: DecisionOutcome) {
        *self.default_outcome.lock().await = outcome;
    }

    /// Queue a one-shot result; consumed in FIFO order before the default.
    pub async fn push_result(&self, result: Result<DecisionOutcome, CourierError>) {
        self.scripted.lock().await.push(result);
    }

    /// Add artificial latency to every call.
    pub async fn set_delay(&self, delay: std::time::Duration) {
        *self.delay.lock().await = Some(delay);
    }

    /// Install a hold gate: every call blocks until the test adds a permit.
    ///
    /// Returns the semaphore; call `add_permits(1)` to release one call.
    pub async fn install_hold(&self) -> Arc<Semaphore> {
        let sem = Arc::new(Semaphore::new(0));
        *self.hold.lock().await = Some(Arc::clone(&sem));
        sem
    }

    /// All calls made so far, in start order.
    pub async fn calls(&self) -> Vec<BrainCall> {
        self.calls.lock().await.clone()
    }

    pub async fn call_count(&self) -> usize {
        self.calls.lock().await.len()
    }

    /// Highest number of concurrently running calls observed.
    pub fn max_concurrent(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }
}

impl Default for MockBrain {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DecisionEngine for MockBrain {
    async fn decide(&self, event: &InboundEvent) -> Result<DecisionOutcome, CourierError> {
        self.calls.lock().await.push(BrainCall {
            conversation_key: event.conversation_key.clone(),
            body_text: event.body_text.clone(),
            started_at: tokio::time::Instant::now(),
        });

        let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now_active, Ordering::SeqCst);

        let hold = self.hold.lock().await.clone();
        if let Some(sem) = hold {
            // Permit is consumed: one release unblocks exactly one call.
            let permit = sem
                .acquire()
                .await
                .map_err(|_| CourierError::Internal("hold gate closed".into()))?;
            permit.forget();
        }

        let delay = *self.delay.lock().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let result = {
            let mut scripted = self.scripted.lock().await;
            if scripted.is_empty() {
                Ok(self.default_outcome.lock().await.clone())
            } else {
                scripted.remove(0)
            }
        };

        self.active.fetch_sub(1, Ordering::SeqCst);
        result
    }
}
