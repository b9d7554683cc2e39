// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Availability gate trait for short-circuiting work on known-down dependencies.

use async_trait::async_trait;

/// Answers "is it worth attempting real work right now?".
///
/// Implemented by the health monitor: inside a suppress window this returns
/// `false` without probing, otherwise it returns the cached state or performs
/// an on-demand probe when stale.
#[async_trait]
pub trait AvailabilityGate: Send + Sync {
    async fn ensure_available(&self) -> bool;
}
