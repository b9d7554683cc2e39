// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock delivery client that records outbound messages.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use courier_core::error::CourierError;
use courier_core::traits::DeliveryClient;
use courier_core::types::ConversationKey;

/// A message captured by [`MockDelivery`].
#[derive(Debug, Clone)]
pub struct SentMessage {
    pub to: ConversationKey,
    pub text: String,
    pub at: tokio::time::Instant,
}

/// A mock delivery client for testing.
///
/// Records every delivered message and can be told to fail the next N
/// deliveries with a connection-class error.
pub struct MockDelivery {
    sent: Mutex<Vec<SentMessage>>,
    fail_next: AtomicUsize,
}

impl MockDelivery {
    pub fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail_next: AtomicUsize::new(0),
        }
    }

    /// Fail the next `n` delivery attempts before succeeding again.
    pub fn fail_next(&self, n: usize) {
        self.fail_next.store(n, Ordering::SeqCst);
    }

    /// All messages delivered so far, in send order.
    pub async fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().await.clone()
    }

    pub async fn sent_count(&self) -> usize {
        self.sent.lock().await.len()
    }

    /// Texts sent to a specific conversation, in send order.
    pub async fn sent_to(&self, key: &ConversationKey) -> Vec<String> {
        self.sent
            .lock()
            .await
            .iter()
            .filter(|m| &m.to == key)
            .map(|m| m.text.clone())
            .collect()
    }
}

impl Default for MockDelivery {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeliveryClient for MockDelivery {
    async fn deliver(&self, to: &ConversationKey, text: &str) -> Result<(), CourierError> {
        let remaining = self.fail_next.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_next.store(remaining - 1, Ordering::SeqCst);
            return Err(CourierError::Delivery {
                message: "connection refused".to_string(),
                source: None,
            });
        }
        self.sent.lock().await.push(SentMessage {
            to: to.clone(),
            text: text.to_string(),
            at: tokio::time::Instant::now(),
        });
        Ok(())
    }
}
