// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde
//! attributes, such as non-zero pool sizes and well-formed URLs.

use crate::diagnostic::ConfigError;
use crate::model::CourierConfig;

const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &CourierConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if !VALID_LOG_LEVELS.contains(&config.agent.log_level.as_str()) {
        errors.push(ConfigError::Validation {
            message: format!(
                "agent.log_level must be one of {}, got `{}`",
                VALID_LOG_LEVELS.join(", "),
                config.agent.log_level
            ),
        });
    }

    if config.gateway.host.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "gateway.host must not be empty".to_string(),
        });
    }

    if config.queue.concurrency < 1 {
        errors.push(ConfigError::Validation {
            message: "queue.concurrency must be at least 1".to_string(),
        });
    }

    if config.queue.max_depth < 1 {
        errors.push(ConfigError::Validation {
            message: "queue.max_depth must be at least 1".to_string(),
        });
    }

    if config.dedupe.max_entries < 1 {
        errors.push(ConfigError::Validation {
            message: "dedupe.max_entries must be at least 1".to_string(),
        });
    }

    if config.brain.command.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "brain.command must not be empty".to_string(),
        });
    }

    if config.brain.timeout_ms == 0 {
        errors.push(ConfigError::Validation {
            message: "brain.timeout_ms must be greater than 0".to_string(),
        });
    }

    for (name, url) in [
        ("delivery.base_url", Some(config.delivery.base_url.as_str())),
        ("notify.url", config.notify.url.as_deref()),
    ] {
        if let Some(url) = url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                errors.push(ConfigError::Validation {
                    message: format!("{name} must start with http:// or https://, got `{url}`"),
                });
            }
        }
    }

    if config.health.failure_threshold < 1 {
        errors.push(ConfigError::Validation {
            message: "health.failure_threshold must be at least 1".to_string(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
