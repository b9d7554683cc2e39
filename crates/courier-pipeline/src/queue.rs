// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bounded job queue and worker pool with per-conversation leases.
//!
//! Up to `concurrency` jobs run at once, but never two for the same
//! [`ConversationKey`]. Scheduling is a scan for the first job in arrival
//! order whose key holds no lease ("pump"), re-run after every enqueue and
//! every worker completion. Jobs for the same key run in strict arrival
//! order; jobs for different keys have no relative ordering.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::time::Instant;
use tracing::{debug, warn};

use courier_core::traits::{AvailabilityGate, DecisionEngine, DeliveryClient};
use courier_core::types::{ConversationKey, InboundEvent, MessageId};

use crate::dedupe::DedupeStore;

/// One unit of work admitted to the queue.
#[derive(Debug)]
pub struct Job {
    pub event: InboundEvent,
    pub enqueued_at: Instant,
}

/// Result of [`WorkerPool::enqueue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueResult {
    Enqueued,
    /// Queue depth is at the configured maximum. The caller surfaces this
    /// upstream as backpressure (HTTP 503) and must roll back any dedupe
    /// mark it made for the message.
    QueueFull,
}

/// Read-only view of the pool for stats reporting.
#[derive(Debug, Clone, Copy)]
pub struct PoolSnapshot {
    pub queue_len: usize,
    pub active_workers: usize,
    pub inflight_ids: usize,
}

/// Monotonic pipeline counters, shared with the stats endpoint.
#[derive(Debug, Default)]
pub struct PipelineCounters {
    pub received: AtomicU64,
    pub processed: AtomicU64,
    pub errors: AtomicU64,
}

struct PoolState {
    queue: VecDeque<Job>,
    leases: HashSet<ConversationKey>,
    active: usize,
}

/// The worker pool. Shared as `Arc<WorkerPool>`; the state mutex is held
/// only for structural updates, never across an await.
pub struct WorkerPool {
    concurrency: usize,
    max_depth: usize,
    brain: Arc<dyn DecisionEngine>,
    delivery: Arc<dyn DeliveryClient>,
    gate: Arc<dyn AvailabilityGate>,
    dedupe: Arc<DedupeStore>,
    counters: Arc<PipelineCounters>,
    state: Mutex<PoolState>,
}

impl WorkerPool {
    pub fn new(
        concurrency: usize,
        max_depth: usize,
        brain: Arc<dyn DecisionEngine>,
        delivery: Arc<dyn DeliveryClient>,
        gate: Arc<dyn AvailabilityGate>,
        dedupe: Arc<DedupeStore>,
    ) -> Self {
        Self {
            concurrency,
            max_depth,
            brain,
            delivery,
            gate,
            dedupe,
            counters: Arc::new(PipelineCounters::default()),
            state: Mutex::new(PoolState {
                queue: VecDeque::new(),
                leases: HashSet::new(),
                active: 0,
            }),
        }
    }

    pub fn counters(&self) -> Arc<PipelineCounters> {
        Arc::clone(&self.counters)
    }

    pub fn dedupe(&self) -> Arc<DedupeStore> {
        Arc::clone(&self.dedupe)
    }

    /// Admit a job, or reject it when the queue is at capacity.
    ///
    /// On admission the pump runs immediately, so an eligible job starts
    /// without waiting for the next completion.
    pub fn enqueue(self: &Arc<Self>, event: InboundEvent) -> EnqueueResult {
        {
            let mut state = self.lock_state();
            if state.queue.len() >= self.max_depth {
                warn!(
                    key = %event.conversation_key,
                    depth = state.queue.len(),
                    "queue full, rejecting job"
                );
                return EnqueueResult::QueueFull;
            }
            state.queue.push_back(Job {
                event,
                enqueued_at: Instant::now(),
            });
        }
        self.counters.received.fetch_add(1, Ordering::Relaxed);
        self.pump();
        EnqueueResult::Enqueued
    }

    /// Scheduling attempt: while a worker slot is free, dispatch the first
    /// queued job whose key holds no lease. Stops when slots are exhausted
    /// or every queued key is busy.
    pub fn pump(self: &Arc<Self>) {
        loop {
            let job = {
                let mut state = self.lock_state();
                if state.active >= self.concurrency {
                    return;
                }
                let eligible = state
                    .queue
                    .iter()
                    .position(|job| !state.leases.contains(&job.event.conversation_key));
                let Some(index) = eligible else {
                    return;
                };
                let job = state.queue.remove(index).expect("index from position");
                state.leases.insert(job.event.conversation_key.clone());
                state.active += 1;
                job
            };
            let pool = Arc::clone(self);
            tokio::spawn(async move {
                pool.run_job(job).await;
            });
        }
    }

    /// Process one inbound event inline, outside the queue.
    ///
    /// This is the synchronous webhook path: gate check, decide, deliver on
    /// reply, dedupe completion with the outcome cached for duplicate
    /// replay. Infrastructure failures degrade to an `ignore/error` outcome
    /// so the caller can always answer the webhook.
    pub async fn process_inline(&self, event: InboundEvent) -> courier_core::types::DecisionOutcome {
        use courier_core::types::{DecisionOutcome, IgnoreReason};

        self.counters.received.fetch_add(1, Ordering::Relaxed);

        let outcome = if !self.gate.ensure_available().await {
            warn!(key = %event.conversation_key, "transport unavailable, skipping decision");
            DecisionOutcome::ignore(IgnoreReason::Unavailable)
        } else {
            match self.brain.decide(&event).await {
                Ok(outcome) => outcome,
                Err(err) => {
                    warn!(key = %event.conversation_key, error = %err, "decision failed");
                    self.counters.errors.fetch_add(1, Ordering::Relaxed);
                    DecisionOutcome::ignore(IgnoreReason::Error)
                }
            }
        };

        if outcome.is_reply() {
            match self
                .delivery
                .deliver(&event.conversation_key, &outcome.response_text)
                .await
            {
                Ok(()) => {
                    self.counters.processed.fetch_add(1, Ordering::Relaxed);
                }
                Err(err) => {
                    warn!(key = %event.conversation_key, error = %err, "delivery failed");
                    self.counters.errors.fetch_add(1, Ordering::Relaxed);
                }
            }
        } else {
            self.counters.processed.fetch_add(1, Ordering::Relaxed);
        }

        if let Some(id) = &event.message_id {
            self.dedupe.complete(id, Some(outcome.clone()));
        }
        outcome
    }

    pub fn snapshot(&self) -> PoolSnapshot {
        let state = self.lock_state();
        PoolSnapshot {
            queue_len: state.queue.len(),
            active_workers: state.active,
            inflight_ids: self.dedupe.inflight_len(),
        }
    }

    async fn run_job(self: Arc<Self>, job: Job) {
        let mut guard = LeaseGuard {
            pool: Arc::clone(&self),
            key: job.event.conversation_key.clone(),
            message_id: job.event.message_id.clone(),
            finished: false,
        };
        debug!(
            key = %job.event.conversation_key,
            queued_for_ms = job.enqueued_at.elapsed().as_millis() as u64,
            "worker claimed job"
        );
        self.execute(job.event).await;
        guard.finished = true;
    }

    async fn execute(&self, event: InboundEvent) {
        if !self.gate.ensure_available().await {
            warn!(key = %event.conversation_key, "transport unavailable, skipping decision");
            self.counters.processed.fetch_add(1, Ordering::Relaxed);
            return;
        }

        match self.brain.decide(&event).await {
            Ok(outcome) => {
                if outcome.is_reply() {
                    match self
                        .delivery
                        .deliver(&event.conversation_key, &outcome.response_text)
                        .await
                    {
                        Ok(()) => {
                            self.counters.processed.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(err) => {
                            warn!(key = %event.conversation_key, error = %err, "delivery failed");
                            self.counters.errors.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                } else {
                    debug!(
                        key = %event.conversation_key,
                        reason = outcome.reason.as_ref().map(|r| r.to_string()).unwrap_or_default(),
                        "decision was ignore"
                    );
                    self.counters.processed.fetch_add(1, Ordering::Relaxed);
                }
            }
            Err(err) => {
                warn!(key = %event.conversation_key, error = %err, "decision failed");
                self.counters.errors.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Guarantees worker cleanup: lease release, active-count decrement, dedupe
/// completion and a re-pump, even when the worker body panics. A drop before
/// the worker marked itself `finished` means the body never ran to
/// completion, which counts toward the error total.
struct LeaseGuard {
    pool: Arc<WorkerPool>,
    key: ConversationKey,
    message_id: Option<MessageId>,
    finished: bool,
}

impl Drop for LeaseGuard {
    fn drop(&mut self) {
        if !self.finished {
            warn!(key = %self.key, "worker terminated abnormally");
            self.pool.counters.errors.fetch_add(1, Ordering::Relaxed);
        }
        {
            let mut state = self.pool.lock_state();
            state.leases.remove(&self.key);
            state.active -= 1;
        }
        if let Some(id) = &self.message_id {
            // Queued jobs complete without a cached outcome; replay only
            // happens on the synchronous path.
            self.pool.dedupe.complete(id, None);
        }
        self.pool.pump();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use courier_core::error::CourierError;
    use courier_core::types::{DecisionOutcome, IgnoreReason};
    use courier_test_utils::{make_event, MockBrain, MockDelivery};

    struct AlwaysUp;

    #[async_trait::async_trait]
    impl AvailabilityGate for AlwaysUp {
        async fn ensure_available(&self) -> bool {
            true
        }
    }

    struct AlwaysDown;

    #[async_trait::async_trait]
    impl AvailabilityGate for AlwaysDown {
        async fn ensure_available(&self) -> bool {
            false
        }
    }

    fn pool_with(
        concurrency: usize,
        max_depth: usize,
        brain: Arc<MockBrain>,
        delivery: Arc<MockDelivery>,
    ) -> Arc<WorkerPool> {
        Arc::new(WorkerPool::new(
            concurrency,
            max_depth,
            brain,
            delivery,
            Arc::new(AlwaysUp),
            Arc::new(DedupeStore::new(Duration::from_secs(300), 1000)),
        ))
    }

    async fn drain(pool: &Arc<WorkerPool>) {
        for _ in 0..200 {
            let snap = pool.snapshot();
            if snap.queue_len == 0 && snap.active_workers == 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("pool did not drain: {:?}", pool.snapshot());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn processes_and_delivers_a_reply() {
        let brain = Arc::new(MockBrain::new());
        let delivery = Arc::new(MockDelivery::new());
        let pool = pool_with(3, 100, Arc::clone(&brain), Arc::clone(&delivery));

        let result = pool.enqueue(make_event(Some("m1"), "5511987654321", "hi"));
        assert_eq!(result, EnqueueResult::Enqueued);

        drain(&pool).await;
        assert_eq!(delivery.sent_count().await, 1);
        assert_eq!(pool.counters().processed.load(Ordering::Relaxed), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn same_key_jobs_run_serially_in_order() {
        let brain = Arc::new(MockBrain::new());
        brain.push_result(Ok(DecisionOutcome::reply("first"))).await;
        brain.push_result(Ok(DecisionOutcome::reply("second"))).await;
        brain.push_result(Ok(DecisionOutcome::reply("third"))).await;
        brain.set_delay(Duration::from_millis(10)).await;
        let delivery = Arc::new(MockDelivery::new());
        let pool = pool_with(3, 100, Arc::clone(&brain), Arc::clone(&delivery));

        for text in ["a", "b", "c"] {
            pool.enqueue(make_event(None, "5511987654321", text));
        }

        drain(&pool).await;
        assert_eq!(brain.max_concurrent(), 1);
        let key = ConversationKey::normalize("5511987654321");
        assert_eq!(delivery.sent_to(&key).await, vec!["first", "second", "third"]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn different_keys_run_concurrently_up_to_limit() {
        let brain = Arc::new(MockBrain::new());
        let sem = brain.install_hold().await;
        let delivery = Arc::new(MockDelivery::new());
        let pool = pool_with(2, 100, Arc::clone(&brain), Arc::clone(&delivery));

        for n in 0..4 {
            pool.enqueue(make_event(None, &format!("551198765432{n}"), "hi"));
        }

        // Two workers start and park on the hold; the other two wait queued.
        tokio::time::sleep(Duration::from_millis(30)).await;
        let snap = pool.snapshot();
        assert_eq!(snap.active_workers, 2);
        assert_eq!(snap.queue_len, 2);

        sem.add_permits(4);
        drain(&pool).await;
        assert_eq!(brain.max_concurrent(), 2);
        assert_eq!(delivery.sent_count().await, 4);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn busy_key_is_skipped_for_a_free_one() {
        let brain = Arc::new(MockBrain::new());
        let sem = brain.install_hold().await;
        let delivery = Arc::new(MockDelivery::new());
        let pool = pool_with(2, 100, Arc::clone(&brain), Arc::clone(&delivery));

        pool.enqueue(make_event(None, "alice@s.whatsapp.net", "1"));
        tokio::time::sleep(Duration::from_millis(20)).await;
        // Head-of-line job is for the busy key; the one behind it is free.
        pool.enqueue(make_event(None, "alice@s.whatsapp.net", "2"));
        pool.enqueue(make_event(None, "bob@s.whatsapp.net", "3"));

        tokio::time::sleep(Duration::from_millis(30)).await;
        let calls = brain.calls().await;
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1].body_text, "3");

        sem.add_permits(3);
        drain(&pool).await;
        assert_eq!(delivery.sent_count().await, 3);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn rejects_when_queue_is_full() {
        let brain = Arc::new(MockBrain::new());
        let _sem = brain.install_hold().await;
        let delivery = Arc::new(MockDelivery::new());
        let pool = pool_with(1, 2, Arc::clone(&brain), Arc::clone(&delivery));

        // One job occupies the worker, two fill the queue.
        pool.enqueue(make_event(None, "a@s.whatsapp.net", "x"));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(pool.enqueue(make_event(None, "b@s.whatsapp.net", "x")), EnqueueResult::Enqueued);
        assert_eq!(pool.enqueue(make_event(None, "c@s.whatsapp.net", "x")), EnqueueResult::Enqueued);
        assert_eq!(
            pool.enqueue(make_event(None, "d@s.whatsapp.net", "x")),
            EnqueueResult::QueueFull
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn lease_released_after_decision_error() {
        let brain = Arc::new(MockBrain::new());
        brain
            .push_result(Err(CourierError::Internal("boom".into())))
            .await;
        let delivery = Arc::new(MockDelivery::new());
        let pool = pool_with(1, 100, Arc::clone(&brain), Arc::clone(&delivery));

        pool.enqueue(make_event(Some("m1"), "a@s.whatsapp.net", "x"));
        drain(&pool).await;
        assert_eq!(pool.counters().errors.load(Ordering::Relaxed), 1);

        // A later job for the same key still gets scheduled.
        pool.enqueue(make_event(Some("m2"), "a@s.whatsapp.net", "y"));
        drain(&pool).await;
        assert_eq!(delivery.sent_count().await, 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn lease_released_after_delivery_error() {
        let brain = Arc::new(MockBrain::new());
        let delivery = Arc::new(MockDelivery::new());
        delivery.fail_next(1);
        let pool = pool_with(1, 100, Arc::clone(&brain), Arc::clone(&delivery));

        pool.enqueue(make_event(None, "a@s.whatsapp.net", "x"));
        drain(&pool).await;
        assert_eq!(pool.counters().errors.load(Ordering::Relaxed), 1);

        pool.enqueue(make_event(None, "a@s.whatsapp.net", "y"));
        drain(&pool).await;
        assert_eq!(delivery.sent_count().await, 1);
    }

    /// Panics on the first call, then hands off to the wrapped mock.
    struct PanicOnce {
        inner: Arc<MockBrain>,
        fired: std::sync::atomic::AtomicBool,
    }

    #[async_trait::async_trait]
    impl DecisionEngine for PanicOnce {
        async fn decide(&self, event: &InboundEvent) -> Result<DecisionOutcome, CourierError> {
            if !self.fired.swap(true, Ordering::Relaxed) {
                panic!("decision engine blew up");
            }
            self.inner.decide(event).await
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn worker_panic_counts_as_error_and_releases_lease() {
        let inner = Arc::new(MockBrain::new());
        let brain = Arc::new(PanicOnce {
            inner: Arc::clone(&inner),
            fired: std::sync::atomic::AtomicBool::new(false),
        });
        let delivery = Arc::new(MockDelivery::new());
        let pool = Arc::new(WorkerPool::new(
            1,
            100,
            brain as Arc<dyn DecisionEngine>,
            Arc::clone(&delivery) as Arc<dyn DeliveryClient>,
            Arc::new(AlwaysUp),
            Arc::new(DedupeStore::new(Duration::from_secs(300), 1000)),
        ));

        let id = MessageId("m1".to_string());
        pool.dedupe().check_and_mark(Some(&id));
        pool.enqueue(make_event(Some("m1"), "a@s.whatsapp.net", "x"));
        drain(&pool).await;

        assert_eq!(pool.counters().errors.load(Ordering::Relaxed), 1);
        // The crashed job still completed its dedupe entry.
        assert!(matches!(
            pool.dedupe().check_and_mark(Some(&id)),
            crate::dedupe::DedupeStatus::DuplicateSeen(None)
        ));

        // The lease is free again: a later job for the same key runs.
        pool.enqueue(make_event(Some("m2"), "a@s.whatsapp.net", "y"));
        drain(&pool).await;
        assert_eq!(delivery.sent_count().await, 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn completed_job_marks_dedupe_done() {
        let brain = Arc::new(MockBrain::new());
        let delivery = Arc::new(MockDelivery::new());
        let pool = pool_with(1, 100, Arc::clone(&brain), Arc::clone(&delivery));

        let id = MessageId("m1".to_string());
        assert!(matches!(
            pool.dedupe().check_and_mark(Some(&id)),
            crate::dedupe::DedupeStatus::New
        ));
        pool.enqueue(make_event(Some("m1"), "a@s.whatsapp.net", "x"));
        drain(&pool).await;

        assert!(matches!(
            pool.dedupe().check_and_mark(Some(&id)),
            crate::dedupe::DedupeStatus::DuplicateSeen(None)
        ));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unavailable_gate_skips_the_brain() {
        let brain = Arc::new(MockBrain::new());
        let delivery = Arc::new(MockDelivery::new());
        let pool = Arc::new(WorkerPool::new(
            1,
            100,
            Arc::clone(&brain) as Arc<dyn DecisionEngine>,
            Arc::clone(&delivery) as Arc<dyn DeliveryClient>,
            Arc::new(AlwaysDown),
            Arc::new(DedupeStore::new(Duration::from_secs(300), 1000)),
        ));

        pool.enqueue(make_event(None, "a@s.whatsapp.net", "x"));
        drain(&pool).await;
        assert_eq!(brain.call_count().await, 0);
        assert_eq!(delivery.sent_count().await, 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn inline_path_caches_outcome_for_replay() {
        let brain = Arc::new(MockBrain::new());
        let delivery = Arc::new(MockDelivery::new());
        let pool = pool_with(1, 100, Arc::clone(&brain), Arc::clone(&delivery));

        let event = make_event(Some("m1"), "a@s.whatsapp.net", "x");
        let id = event.message_id.clone().unwrap();
        pool.dedupe().check_and_mark(Some(&id));
        let outcome = pool.process_inline(event).await;
        assert!(outcome.is_reply());

        match pool.dedupe().check_and_mark(Some(&id)) {
            crate::dedupe::DedupeStatus::DuplicateSeen(Some(cached)) => {
                assert_eq!(cached.response_text, outcome.response_text);
            }
            other => panic!("expected cached outcome, got {other:?}"),
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn inline_path_degrades_decision_error_to_ignore() {
        let brain = Arc::new(MockBrain::new());
        brain
            .push_result(Err(CourierError::Spawn {
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
            }))
            .await;
        let delivery = Arc::new(MockDelivery::new());
        let pool = pool_with(1, 100, Arc::clone(&brain), Arc::clone(&delivery));

        let outcome = pool.process_inline(make_event(None, "a@s.whatsapp.net", "x")).await;
        assert!(!outcome.is_reply());
        assert_eq!(outcome.reason, Some(IgnoreReason::Error));
    }
}
