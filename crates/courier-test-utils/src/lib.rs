// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for the Courier workspace.
//!
//! Provides mock implementations of the core seam traits for deterministic
//! testing of the pipeline and gateway without real subprocesses or HTTP.

pub mod mock_brain;
pub mod mock_delivery;

pub use mock_brain::{BrainCall, MockBrain};
pub use mock_delivery::{MockDelivery, SentMessage};

use courier_core::types::{ConversationKey, InboundEvent, MessageId};

/// Build an [`InboundEvent`] with sensible test defaults.
pub fn make_event(message_id: Option<&str>, key: &str, text: &str) -> InboundEvent {
    let conversation_key = ConversationKey::normalize(key);
    InboundEvent {
        message_id: message_id.map(|id| MessageId(id.to_string())),
        is_group: conversation_key.is_group(),
        conversation_key,
        sender_display_name: "test-user".to_string(),
        body_text: text.to_string(),
        received_at: chrono::Utc::now(),
    }
}
