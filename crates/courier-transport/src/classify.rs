// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Connection-class vs application-class error distinction.
//!
//! Connection-class failures (target unreachable, refused, timed out) are
//! worth one retry; application-class failures (the receiver processed and
//! rejected the request) are not, since retrying can duplicate side effects.

use std::error::Error as _;

/// Whether a transport error is connection-class.
///
/// Reqwest's connect and timeout kinds cover the common cases; the marker
/// list catches platform-specific failures that only surface as message
/// text (dns resolution, abrupt resets). Matching is case-insensitive over
/// the full source chain.
pub fn is_connection_class(err: &reqwest::Error, markers: &[String]) -> bool {
    if err.is_connect() || err.is_timeout() {
        return true;
    }
    let chain = source_chain_text(err);
    markers
        .iter()
        .filter(|m| !m.is_empty())
        .any(|m| chain.contains(&m.to_lowercase()))
}

fn source_chain_text(err: &reqwest::Error) -> String {
    let mut text = err.to_string();
    let mut source = err.source();
    while let Some(inner) = source {
        text.push_str(": ");
        text.push_str(&inner.to_string());
        source = inner.source();
    }
    text.to_lowercase()
}
