// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Decision engine trait: the boundary to "the brain".

use async_trait::async_trait;

use crate::error::CourierError;
use crate::types::{DecisionOutcome, InboundEvent};

/// Decides whether and what to reply for one inbound message.
///
/// Implementations must convert ordinary business failures (timeouts,
/// non-zero exits, empty output) into an `ignore` [`DecisionOutcome`];
/// only true infrastructure failure -- the decision process could not be
/// started at all -- may surface as `Err`.
#[async_trait]
pub trait DecisionEngine: Send + Sync {
    async fn decide(&self, event: &InboundEvent) -> Result<DecisionOutcome, CourierError>;
}
