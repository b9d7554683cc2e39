// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fire-and-forget side notification webhook.
//!
//! Best effort only: a short timeout, no retry, and failures are logged and
//! never propagated to the delivery path.

use serde::Serialize;
use tracing::debug;

use courier_core::types::ConversationKey;

#[derive(Debug, Serialize)]
struct NotifyPayload<'a> {
    event: &'static str,
    to: &'a str,
    message: &'a str,
}

pub struct Notifier {
    http: reqwest::Client,
    url: Option<String>,
}

impl Notifier {
    /// `url: None` disables notification entirely.
    pub fn new(http: reqwest::Client, url: Option<String>) -> Self {
        Self { http, url }
    }

    /// Announce a sent message. Returns immediately; the request runs in a
    /// detached task.
    pub fn message_sent(&self, to: &ConversationKey, text: &str) {
        let Some(url) = self.url.clone() else {
            return;
        };
        let body = serde_json::to_value(NotifyPayload {
            event: "message_sent",
            to: to.as_str(),
            message: text,
        })
        .unwrap_or_default();
        let http = self.http.clone();
        tokio::spawn(async move {
            if let Err(err) = http.post(&url).json(&body).send().await {
                debug!(error = %err, "notify webhook failed");
            }
        });
    }
}
