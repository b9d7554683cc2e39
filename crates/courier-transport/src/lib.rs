// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Transport boundary: delivery to the WhatsApp gateway, health probing and
//! side notifications.
//!
//! Everything downstream of a decision lives here. The
//! [`HttpDeliveryClient`] implements
//! [`DeliveryClient`](courier_core::traits::DeliveryClient); the
//! [`HealthMonitor`] implements
//! [`AvailabilityGate`](courier_core::traits::AvailabilityGate) so the
//! worker pool can skip work while the gateway is down.

pub mod classify;
pub mod delivery;
pub mod health;
pub mod notify;

pub use delivery::HttpDeliveryClient;
pub use health::HealthMonitor;
pub use notify::Notifier;
