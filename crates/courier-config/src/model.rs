// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Courier pipeline.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level Courier configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable
/// overrides. All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CourierConfig {
    /// Service identity and logging settings.
    #[serde(default)]
    pub agent: AgentConfig,

    /// HTTP ingress settings.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Job queue and worker pool settings.
    #[serde(default)]
    pub queue: QueueConfig,

    /// Idempotency/dedupe store settings.
    #[serde(default)]
    pub dedupe: DedupeConfig,

    /// Decision process invocation settings.
    #[serde(default)]
    pub brain: BrainConfig,

    /// Outbound delivery settings.
    #[serde(default)]
    pub delivery: DeliveryConfig,

    /// Downstream health monitoring settings.
    #[serde(default)]
    pub health: HealthConfig,

    /// Best-effort side notification settings.
    #[serde(default)]
    pub notify: NotifyConfig,
}

/// Service identity and logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    /// Display name of the service.
    #[serde(default = "default_agent_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: default_agent_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_agent_name() -> String {
    "courier".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// HTTP ingress configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// Host address to bind.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Whether queue mode is the preferred ingress path.
    ///
    /// Both `/webhook` and `/queue` are always served; this flag is reported
    /// in `/stats` so operators can confirm which path the transport uses.
    #[serde(default = "default_queue_mode")]
    pub queue_mode: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            queue_mode: default_queue_mode(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_queue_mode() -> bool {
    true
}

/// Job queue and worker pool configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct QueueConfig {
    /// Maximum queued (not yet claimed) jobs before admission is rejected.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Maximum concurrently running workers.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            concurrency: default_concurrency(),
        }
    }
}

fn default_max_depth() -> usize {
    100
}

fn default_concurrency() -> usize {
    3
}

/// Idempotency/dedupe store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DedupeConfig {
    /// How long a seen message id is remembered.
    #[serde(default = "default_dedupe_ttl_secs")]
    pub ttl_secs: u64,

    /// Hard cap on stored entries; the oldest entry is evicted beyond this.
    #[serde(default = "default_dedupe_max_entries")]
    pub max_entries: usize,
}

impl Default for DedupeConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_dedupe_ttl_secs(),
            max_entries: default_dedupe_max_entries(),
        }
    }
}

fn default_dedupe_ttl_secs() -> u64 {
    300
}

fn default_dedupe_max_entries() -> usize {
    1000
}

/// Decision process invocation configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BrainConfig {
    /// Executable to spawn for each decision.
    #[serde(default = "default_brain_command")]
    pub command: String,

    /// Base arguments placed before the per-message arguments
    /// (`--message`, `--jid`, `--sender`). Typically the script path.
    #[serde(default)]
    pub args: Vec<String>,

    /// Hard wall-clock deadline for one decision, in milliseconds.
    #[serde(default = "default_brain_timeout_ms")]
    pub timeout_ms: u64,

    /// How many trailing stderr lines to retain for diagnostics on failure.
    #[serde(default = "default_stderr_tail_lines")]
    pub stderr_tail_lines: usize,
}

impl Default for BrainConfig {
    fn default() -> Self {
        Self {
            command: default_brain_command(),
            args: Vec::new(),
            timeout_ms: default_brain_timeout_ms(),
            stderr_tail_lines: default_stderr_tail_lines(),
        }
    }
}

fn default_brain_command() -> String {
    "python3".to_string()
}

fn default_brain_timeout_ms() -> u64 {
    30_000
}

fn default_stderr_tail_lines() -> usize {
    20
}

/// Outbound delivery configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DeliveryConfig {
    /// Base URL of the transport gateway (`/send` and `/health` live here).
    #[serde(default = "default_delivery_base_url")]
    pub base_url: String,

    /// Per-request timeout, in milliseconds.
    #[serde(default = "default_delivery_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Fixed backoff before the single connection-class retry, in milliseconds.
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Minimum spacing between consecutive deliveries to the same
    /// conversation, in milliseconds.
    #[serde(default = "default_min_send_interval_ms")]
    pub min_send_interval_ms: u64,

    /// Case-insensitive substrings that classify a transport error as
    /// connection-class (retryable) in addition to connect/timeout kinds.
    #[serde(default = "default_connection_error_markers")]
    pub connection_error_markers: Vec<String>,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            base_url: default_delivery_base_url(),
            request_timeout_ms: default_delivery_timeout_ms(),
            retry_backoff_ms: default_retry_backoff_ms(),
            min_send_interval_ms: default_min_send_interval_ms(),
            connection_error_markers: default_connection_error_markers(),
        }
    }
}

fn default_delivery_base_url() -> String {
    "http://localhost:3001".to_string()
}

fn default_delivery_timeout_ms() -> u64 {
    10_000
}

fn default_retry_backoff_ms() -> u64 {
    500
}

fn default_min_send_interval_ms() -> u64 {
    1_500
}

fn default_connection_error_markers() -> Vec<String> {
    vec!["connection refused".to_string(), "dns error".to_string()]
}

/// Downstream health monitoring configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct HealthConfig {
    /// Interval between background probes, in seconds. Cached state older
    /// than this is considered stale.
    #[serde(default = "default_probe_interval_secs")]
    pub probe_interval_secs: u64,

    /// Consecutive probe failures before the suppress window opens.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// Length of the suppress window, in seconds.
    #[serde(default = "default_suppress_secs")]
    pub suppress_secs: u64,

    /// Per-probe request timeout, in milliseconds.
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            probe_interval_secs: default_probe_interval_secs(),
            failure_threshold: default_failure_threshold(),
            suppress_secs: default_suppress_secs(),
            probe_timeout_ms: default_probe_timeout_ms(),
        }
    }
}

fn default_probe_interval_secs() -> u64 {
    30
}

fn default_failure_threshold() -> u32 {
    2
}

fn default_suppress_secs() -> u64 {
    60
}

fn default_probe_timeout_ms() -> u64 {
    2_000
}

/// Best-effort side notification configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct NotifyConfig {
    /// Webhook URL for auxiliary alerting. `None` disables notifications.
    #[serde(default)]
    pub url: Option<String>,

    /// Request timeout for notification posts, in milliseconds.
    #[serde(default = "default_notify_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout_ms: default_notify_timeout_ms(),
        }
    }
}

fn default_notify_timeout_ms() -> u64 {
    2_000
}
