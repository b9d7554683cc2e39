// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Courier message pipeline.

use thiserror::Error;

/// The primary error type used across Courier's components.
///
/// Business outcomes (a brain that decides to ignore, a timed-out decision,
/// a duplicate message) are *not* errors -- they are encoded in
/// [`DecisionOutcome`](crate::types::DecisionOutcome) and the dedupe statuses.
/// `CourierError` is reserved for infrastructure failures.
#[derive(Debug, Error)]
pub enum CourierError {
    /// Configuration errors (invalid TOML, missing required fields, bad values).
    #[error("configuration error: {0}")]
    Config(String),

    /// The decision process could not be spawned at all.
    ///
    /// This is the only failure class treated as fatal to a request: the
    /// ingress converts it into an `ignore/error` response rather than
    /// crashing the service.
    #[error("failed to spawn decision process: {source}")]
    Spawn {
        #[source]
        source: std::io::Error,
    },

    /// Decision invoker failures other than spawn (stream I/O, task join).
    #[error("brain error: {message}")]
    Brain {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Delivery transport failures (connection refused after retry, rejected request).
    #[error("delivery error: {message}")]
    Delivery {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}
