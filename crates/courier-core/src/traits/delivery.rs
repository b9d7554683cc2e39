// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Delivery client trait: the boundary to the transport gateway.

use async_trait::async_trait;

use crate::error::CourierError;
use crate::types::ConversationKey;

/// Sends an outbound message through the transport gateway.
///
/// Implementations own their retry policy and per-conversation pacing;
/// when `deliver` returns `Err` the message is considered undeliverable
/// and the caller must not retry further.
#[async_trait]
pub trait DeliveryClient: Send + Sync {
    async fn deliver(&self, to: &ConversationKey, text: &str) -> Result<(), CourierError>;
}
