// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `courier serve` command implementation.
//!
//! Wires the pipeline together from configuration: dedupe store, worker
//! pool, subprocess brain, HTTP delivery with health monitoring, side
//! notifier, and the ingress server. Supports graceful shutdown via signal
//! handlers.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use courier_brain::BrainInvoker;
use courier_config::model::CourierConfig;
use courier_core::error::CourierError;
use courier_gateway::GatewayState;
use courier_pipeline::{DedupeStore, WorkerPool};
use courier_transport::{HealthMonitor, HttpDeliveryClient, Notifier};

use crate::shutdown;

/// Runs the `courier serve` command.
pub async fn run_serve(config: CourierConfig) -> Result<(), CourierError> {
    init_tracing(&config.agent.log_level);

    info!(name = %config.agent.name, "starting courier serve");

    let probe_client = reqwest::Client::builder()
        .timeout(Duration::from_millis(config.health.probe_timeout_ms))
        .build()
        .map_err(|e| CourierError::Internal(format!("failed to build probe client: {e}")))?;
    let health = Arc::new(HealthMonitor::new(
        probe_client,
        &config.delivery.base_url,
        Duration::from_secs(config.health.probe_interval_secs),
        config.health.failure_threshold,
        Duration::from_secs(config.health.suppress_secs),
    ));

    let notify_client = reqwest::Client::builder()
        .timeout(Duration::from_millis(config.notify.timeout_ms))
        .build()
        .map_err(|e| CourierError::Internal(format!("failed to build notify client: {e}")))?;
    let notifier = Arc::new(Notifier::new(notify_client, config.notify.url.clone()));

    let send_client = reqwest::Client::builder()
        .timeout(Duration::from_millis(config.delivery.request_timeout_ms))
        .build()
        .map_err(|e| CourierError::Internal(format!("failed to build delivery client: {e}")))?;
    let delivery = Arc::new(
        HttpDeliveryClient::new(
            send_client,
            &config.delivery.base_url,
            Duration::from_millis(config.delivery.retry_backoff_ms),
            Duration::from_millis(config.delivery.min_send_interval_ms),
            config.delivery.connection_error_markers.clone(),
        )
        .with_health_monitor(Arc::clone(&health))
        .with_notifier(notifier),
    );

    let brain = Arc::new(BrainInvoker::new(
        config.brain.command.clone(),
        config.brain.args.clone(),
        Duration::from_millis(config.brain.timeout_ms),
        config.brain.stderr_tail_lines,
    ));

    let dedupe = Arc::new(DedupeStore::new(
        Duration::from_secs(config.dedupe.ttl_secs),
        config.dedupe.max_entries,
    ));

    let pool = Arc::new(WorkerPool::new(
        config.queue.concurrency,
        config.queue.max_depth,
        brain,
        delivery,
        Arc::clone(&health) as Arc<dyn courier_core::traits::AvailabilityGate>,
        dedupe,
    ));

    let token = shutdown::install_signal_handler();

    tokio::spawn(Arc::clone(&health).run_probe_loop(token.clone()));

    let state = GatewayState::new(pool, config.gateway.queue_mode);
    courier_gateway::start_server(&config.gateway.host, config.gateway.port, state, token).await?;

    info!("courier serve stopped");
    Ok(())
}

fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("courier={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
