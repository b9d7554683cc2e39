// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory idempotency store for inbound message ids.
//!
//! Transports redeliver webhooks; this store makes redelivery harmless.
//! Entries live through two states: *inflight* while a job owns the id, and
//! *done* (with an optional cached outcome) until the TTL expires. All
//! operations are in-memory and must never block the request path; the mutex
//! is held only for structural updates.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use courier_core::types::{DecisionOutcome, MessageId};

/// Result of [`DedupeStore::check_and_mark`].
#[derive(Debug, Clone)]
pub enum DedupeStatus {
    /// First sighting; the id is now marked inflight and the caller owns it.
    /// The caller must eventually call [`DedupeStore::complete`] (or
    /// [`DedupeStore::forget`] if admission fails downstream).
    New,
    /// A job for this id is currently in progress. Do not re-process.
    DuplicateInflight,
    /// This id completed within the TTL window. The cached outcome, when
    /// present, can be replayed to the caller.
    DuplicateSeen(Option<DecisionOutcome>),
}

enum EntryState {
    Inflight,
    Done { cached: Option<DecisionOutcome> },
}

struct Entry {
    /// Set when first seen, refreshed on completion. Drives both the TTL
    /// sweep and oldest-first eviction.
    stamp: Instant,
    state: EntryState,
}

/// TTL + capacity bounded duplicate guard, keyed by transport message id.
pub struct DedupeStore {
    ttl: Duration,
    max_entries: usize,
    entries: Mutex<HashMap<MessageId, Entry>>,
}

impl DedupeStore {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            ttl,
            max_entries,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Check an id against the store and mark it inflight if unseen.
    ///
    /// `None` always yields [`DedupeStatus::New`]: without an id no dedupe
    /// is possible, an accepted tradeoff. Expired entries are swept lazily
    /// on every call; if the store is still over capacity afterwards, the
    /// single oldest entry is evicted.
    pub fn check_and_mark(&self, message_id: Option<&MessageId>) -> DedupeStatus {
        let Some(id) = message_id else {
            return DedupeStatus::New;
        };
        let now = Instant::now();
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());

        entries.retain(|_, entry| now.duration_since(entry.stamp) < self.ttl);

        if let Some(entry) = entries.get(id) {
            return match &entry.state {
                EntryState::Inflight => DedupeStatus::DuplicateInflight,
                EntryState::Done { cached } => DedupeStatus::DuplicateSeen(cached.clone()),
            };
        }

        if entries.len() >= self.max_entries {
            let oldest = entries
                .iter()
                .min_by_key(|(_, entry)| entry.stamp)
                .map(|(id, _)| id.clone());
            if let Some(oldest) = oldest {
                debug!(evicted = %oldest.0, "dedupe store over capacity, evicting oldest");
                entries.remove(&oldest);
            }
        }

        entries.insert(
            id.clone(),
            Entry {
                stamp: now,
                state: EntryState::Inflight,
            },
        );
        DedupeStatus::New
    }

    /// Mark an inflight id as done, optionally caching the outcome for
    /// replay to later duplicates. The TTL window restarts from now.
    pub fn complete(&self, message_id: &MessageId, cached: Option<DecisionOutcome>) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(
            message_id.clone(),
            Entry {
                stamp: Instant::now(),
                state: EntryState::Done { cached },
            },
        );
    }

    /// Drop an inflight mark without recording completion.
    ///
    /// Used when admission fails after the mark (queue full): the transport
    /// will redeliver, and the retry must be treated as new.
    pub fn forget(&self, message_id: &MessageId) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.remove(message_id);
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of ids currently owned by in-progress jobs.
    pub fn inflight_len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .filter(|e| matches!(e.state, EntryState::Inflight))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_core::types::IgnoreReason;

    fn id(s: &str) -> MessageId {
        MessageId(s.to_string())
    }

    fn store() -> DedupeStore {
        DedupeStore::new(Duration::from_secs(300), 1000)
    }

    #[tokio::test]
    async fn missing_id_is_always_new() {
        let store = store();
        assert!(matches!(store.check_and_mark(None), DedupeStatus::New));
        assert!(matches!(store.check_and_mark(None), DedupeStatus::New));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn second_sighting_while_inflight() {
        let store = store();
        assert!(matches!(
            store.check_and_mark(Some(&id("m1"))),
            DedupeStatus::New
        ));
        assert!(matches!(
            store.check_and_mark(Some(&id("m1"))),
            DedupeStatus::DuplicateInflight
        ));
        assert_eq!(store.inflight_len(), 1);
    }

    #[tokio::test]
    async fn completed_id_replays_cached_outcome() {
        let store = store();
        store.check_and_mark(Some(&id("m1")));
        store.complete(&id("m1"), Some(DecisionOutcome::reply("hello")));

        match store.check_and_mark(Some(&id("m1"))) {
            DedupeStatus::DuplicateSeen(Some(outcome)) => {
                assert_eq!(outcome.response_text, "hello");
            }
            other => panic!("expected DuplicateSeen with cache, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn completed_without_cache_still_deduplicates() {
        let store = store();
        store.check_and_mark(Some(&id("m1")));
        store.complete(&id("m1"), None);
        assert!(matches!(
            store.check_and_mark(Some(&id("m1"))),
            DedupeStatus::DuplicateSeen(None)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_ttl() {
        let store = DedupeStore::new(Duration::from_secs(300), 1000);
        store.check_and_mark(Some(&id("m1")));
        store.complete(&id("m1"), Some(DecisionOutcome::ignore(IgnoreReason::NoResponse)));

        tokio::time::advance(Duration::from_secs(301)).await;

        assert!(matches!(
            store.check_and_mark(Some(&id("m1"))),
            DedupeStatus::New
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn completion_restarts_the_ttl_window() {
        let store = DedupeStore::new(Duration::from_secs(300), 1000);
        store.check_and_mark(Some(&id("m1")));
        tokio::time::advance(Duration::from_secs(200)).await;
        store.complete(&id("m1"), None);
        tokio::time::advance(Duration::from_secs(200)).await;

        // 400s since first seen but only 200s since completion.
        assert!(matches!(
            store.check_and_mark(Some(&id("m1"))),
            DedupeStatus::DuplicateSeen(None)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn over_capacity_evicts_single_oldest() {
        let store = DedupeStore::new(Duration::from_secs(3600), 2);
        store.check_and_mark(Some(&id("a")));
        tokio::time::advance(Duration::from_secs(1)).await;
        store.check_and_mark(Some(&id("b")));
        tokio::time::advance(Duration::from_secs(1)).await;
        store.check_and_mark(Some(&id("c")));

        assert_eq!(store.len(), 2);
        // "a" was oldest and evicted; "b" and "c" remain inflight.
        assert!(matches!(
            store.check_and_mark(Some(&id("b"))),
            DedupeStatus::DuplicateInflight
        ));
        assert!(matches!(
            store.check_and_mark(Some(&id("c"))),
            DedupeStatus::DuplicateInflight
        ));
    }

    #[tokio::test]
    async fn forget_allows_resubmission() {
        let store = store();
        store.check_and_mark(Some(&id("m1")));
        store.forget(&id("m1"));
        assert!(matches!(
            store.check_and_mark(Some(&id("m1"))),
            DedupeStatus::New
        ));
    }
}
