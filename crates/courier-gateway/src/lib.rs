// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ingress HTTP server for the Courier message pipeline.
//!
//! Two ways in: `POST /webhook` processes synchronously and answers with
//! the decision outcome; `POST /queue` is pure admission control backed by
//! the worker pool. `GET /stats` and `GET /health` expose read-only state.

pub mod handlers;
pub mod server;

pub use server::{build_router, start_server, GatewayState};
