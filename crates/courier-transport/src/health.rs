// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Downstream transport health monitor.
//!
//! Probes `GET {base_url}/health` and tracks consecutive failures. Once the
//! threshold is crossed a suppress window opens, during which
//! [`ensure_available`](HealthMonitor::ensure_available) short-circuits to
//! `false` without probing, so workers skip pointless decision runs while
//! the transport is down.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use courier_core::traits::AvailabilityGate;

struct HealthState {
    healthy: bool,
    consecutive_failures: u32,
    last_checked: Option<Instant>,
    suppress_until: Option<Instant>,
}

pub struct HealthMonitor {
    http: reqwest::Client,
    health_url: String,
    probe_interval: Duration,
    failure_threshold: u32,
    suppress: Duration,
    state: Mutex<HealthState>,
}

impl HealthMonitor {
    pub fn new(
        http: reqwest::Client,
        base_url: &str,
        probe_interval: Duration,
        failure_threshold: u32,
        suppress: Duration,
    ) -> Self {
        Self {
            http,
            health_url: format!("{}/health", base_url.trim_end_matches('/')),
            probe_interval,
            failure_threshold,
            suppress,
            state: Mutex::new(HealthState {
                // Optimistic start; the first probe corrects it.
                healthy: true,
                consecutive_failures: 0,
                last_checked: None,
                suppress_until: None,
            }),
        }
    }

    /// One probe round trip. Any non-2xx status or transport error counts
    /// as a failure.
    pub async fn probe(&self) -> bool {
        let ok = match self.http.get(&self.health_url).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(err) => {
                debug!(error = %err, "health probe failed");
                false
            }
        };
        if ok {
            self.record_success();
        } else {
            self.record_failure();
        }
        ok
    }

    /// Note a successful real call to the transport. Resets the failure
    /// counter and closes any suppress window.
    pub fn record_success(&self) {
        let mut state = self.lock_state();
        if !state.healthy {
            info!("transport recovered");
        }
        state.healthy = true;
        state.consecutive_failures = 0;
        state.suppress_until = None;
        state.last_checked = Some(Instant::now());
    }

    /// Note a connection-class failure talking to the transport.
    pub fn record_failure(&self) {
        let mut state = self.lock_state();
        state.healthy = false;
        state.consecutive_failures += 1;
        state.last_checked = Some(Instant::now());
        if state.consecutive_failures >= self.failure_threshold && state.suppress_until.is_none() {
            let until = Instant::now() + self.suppress;
            state.suppress_until = Some(until);
            warn!(
                failures = state.consecutive_failures,
                suppress_secs = self.suppress.as_secs(),
                "transport unhealthy, opening suppress window"
            );
        }
    }

    /// Background probe loop, stopped by the cancellation token.
    pub async fn run_probe_loop(self: Arc<Self>, cancel: CancellationToken) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("health probe loop stopped");
                    return;
                }
                _ = tokio::time::sleep(self.probe_interval) => {
                    self.probe().await;
                }
            }
        }
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, HealthState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl AvailabilityGate for HealthMonitor {
    /// Inside the suppress window: `false` without probing. Healthy and
    /// recently checked: cached `true`. Stale or unhealthy: probe now.
    async fn ensure_available(&self) -> bool {
        {
            let state = self.lock_state();
            let now = Instant::now();
            if let Some(until) = state.suppress_until {
                if now < until {
                    return false;
                }
            }
            if state.healthy {
                if let Some(last) = state.last_checked {
                    if now.duration_since(last) < self.probe_interval {
                        return true;
                    }
                }
            }
        }
        self.probe().await
    }
}
