// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trait definitions for Courier's pluggable seams.
//!
//! The pipeline talks to its collaborators through these traits so the
//! worker pool and ingress can be tested against mocks, and the real
//! implementations (subprocess brain, HTTP delivery, health monitor) stay
//! swappable.

pub mod decision;
pub mod delivery;
pub mod gate;

pub use decision::DecisionEngine;
pub use delivery::DeliveryClient;
pub use gate::AvailabilityGate;
