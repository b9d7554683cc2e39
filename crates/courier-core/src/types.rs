// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types used across the Courier pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Unique identifier for an inbound message, assigned by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

/// Canonical, normalized identifier for a chat thread (one human or group).
///
/// The same human conversation must never map to two keys, so all raw
/// addresses pass through [`ConversationKey::normalize`] at the ingress.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationKey(String);

impl ConversationKey {
    /// Normalize a raw address into its canonical form.
    ///
    /// - trims surrounding whitespace and lowercases
    /// - resolves the legacy `@c.us` suffix to `@s.whatsapp.net`
    /// - bare phone numbers (10+ digits, no `@`) get the `@s.whatsapp.net` suffix
    pub fn normalize(raw: &str) -> Self {
        let mut key = raw.trim().to_lowercase();
        if let Some(stripped) = key.strip_suffix("@c.us") {
            key = format!("{stripped}@s.whatsapp.net");
        } else if !key.contains('@')
            && key.len() >= 10
            && key.chars().all(|c| c.is_ascii_digit())
        {
            key.push_str("@s.whatsapp.net");
        }
        Self(key)
    }

    /// Wrap an already-normalized key without re-normalizing.
    pub fn from_normalized(key: String) -> Self {
        Self(key)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this key addresses a group chat.
    pub fn is_group(&self) -> bool {
        self.0.ends_with("@g.us")
    }
}

impl std::fmt::Display for ConversationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One message arriving from the transport gateway.
///
/// Created at the ingress from the raw webhook payload, immutable afterwards.
#[derive(Debug, Clone)]
pub struct InboundEvent {
    /// Transport-assigned message id. `None` for legacy senders that omit it,
    /// in which case no dedupe is possible.
    pub message_id: Option<MessageId>,
    pub conversation_key: ConversationKey,
    pub sender_display_name: String,
    pub body_text: String,
    pub received_at: DateTime<Utc>,
    pub is_group: bool,
}

/// What the decision process chose to do with a message.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DecisionAction {
    Reply,
    Ignore,
}

/// Operator-facing reason attached to an `ignore` outcome.
///
/// Never exposed to the human on the other end of the conversation; the user
/// simply receives no reply.
#[derive(Debug, Clone, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum IgnoreReason {
    /// The brain ran but produced no reply text.
    NoResponse,
    /// The brain returned an empty reply string.
    EmptyResponse,
    /// The brain exited zero but printed nothing at all.
    EmptyStdout,
    /// Autopilot is not enabled for this contact.
    NotInAutopilot,
    /// The decision process exceeded its deadline and was killed.
    Timeout,
    /// The decision process failed (non-zero exit, malformed output).
    Error,
    /// The downstream transport is known-down; work was skipped.
    Unavailable,
    /// Any reason string the brain emits that Courier does not know about.
    #[strum(default, to_string = "{0}")]
    #[serde(untagged)]
    Other(String),
}

/// A named diagnostic timestamp recovered from the decision process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimingMark {
    pub stage: String,
    pub elapsed_ms: u64,
}

/// The result of invoking the external decision process for one message.
///
/// Invariant: `action == Reply` implies non-empty `response_text`;
/// `action == Ignore` implies `response_text` is empty. Use the
/// constructors to uphold it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionOutcome {
    pub action: DecisionAction,
    pub response_text: String,
    pub reason: Option<IgnoreReason>,
    /// Ordered diagnostic timing marks, if the brain emitted any.
    #[serde(default)]
    pub timing: Vec<TimingMark>,
}

impl DecisionOutcome {
    /// A reply outcome. `text` must be non-empty; an empty string is
    /// converted to `ignore/empty_response` to preserve the invariant.
    pub fn reply(text: impl Into<String>) -> Self {
        let text = text.into();
        if text.trim().is_empty() {
            return Self::ignore(IgnoreReason::EmptyResponse);
        }
        Self {
            action: DecisionAction::Reply,
            response_text: text,
            reason: None,
            timing: Vec::new(),
        }
    }

    /// An ignore outcome with an operator-facing reason.
    pub fn ignore(reason: IgnoreReason) -> Self {
        Self {
            action: DecisionAction::Ignore,
            response_text: String::new(),
            reason: Some(reason),
            timing: Vec::new(),
        }
    }

    pub fn with_timing(mut self, timing: Vec<TimingMark>) -> Self {
        self.timing = timing;
        self
    }

    pub fn is_reply(&self) -> bool {
        self.action == DecisionAction::Reply
    }
}
