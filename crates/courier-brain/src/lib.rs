// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The brain boundary: invoking the external decision process.
//!
//! Courier treats the conversational logic as a black-box subprocess. This
//! crate owns spawning it, feeding it the inbound message, bounding its
//! runtime, and interpreting its output into a
//! [`DecisionOutcome`](courier_core::types::DecisionOutcome).

pub mod invoker;
pub mod parse;

pub use invoker::BrainInvoker;
