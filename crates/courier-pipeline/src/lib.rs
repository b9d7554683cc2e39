// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The Courier processing pipeline: dedupe store, bounded job queue and
//! worker pool with per-conversation leases.
//!
//! The pipeline guarantees at-most-one active job per conversation key and
//! FIFO processing order within a key, while running unrelated conversations
//! concurrently up to the configured limit. Duplicate webhook deliveries are
//! absorbed by the [`dedupe::DedupeStore`] before they reach the queue.

pub mod dedupe;
pub mod queue;

pub use dedupe::{DedupeStatus, DedupeStore};
pub use queue::{EnqueueResult, Job, PipelineCounters, PoolSnapshot, WorkerPool};
