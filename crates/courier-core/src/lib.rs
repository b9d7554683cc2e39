// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Courier message pipeline.
//!
//! This crate provides the trait definitions, error types, and common types
//! used throughout the Courier workspace. The pipeline, brain invoker,
//! transport, and gateway crates all build on what is defined here.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::CourierError;
pub use types::{
    ConversationKey, DecisionAction, DecisionOutcome, IgnoreReason, InboundEvent, MessageId,
    TimingMark,
};

// Re-export the seam traits at crate root.
pub use traits::{AvailabilityGate, DecisionEngine, DeliveryClient};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn courier_error_has_all_variants() {
        // Verify all variants exist and can be constructed.
        let _config = CourierError::Config("test".into());
        let _spawn = CourierError::Spawn {
            source: std::io::Error::other("test"),
        };
        let _brain = CourierError::Brain {
            message: "test".into(),
            source: None,
        };
        let _delivery = CourierError::Delivery {
            message: "test".into(),
            source: None,
        };
        let _timeout = CourierError::Timeout {
            duration: std::time::Duration::from_secs(30),
        };
        let _internal = CourierError::Internal("test".into());
    }

    #[test]
    fn seam_traits_are_object_safe() {
        // If any trait loses object safety, this stops compiling.
        fn _assert_decision(_: &dyn DecisionEngine) {}
        fn _assert_delivery(_: &dyn DeliveryClient) {}
        fn _assert_gate(_: &dyn AvailabilityGate) {}
    }

    #[test]
    fn decision_outcome_serializes() {
        let outcome = DecisionOutcome::reply("ok");
        let json = serde_json::to_string(&outcome).unwrap();
        assert!(json.contains("\"action\":\"reply\""));
        assert!(json.contains("\"response_text\":\"ok\""));

        let parsed: DecisionOutcome = serde_json::from_str(&json).unwrap();
        assert!(parsed.is_reply());
    }
}
