// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Parsing of the decision process's output streams.
//!
//! The brain prints at most one structured JSON record to stdout:
//! `{"action": "reply"|"ignore", "response": "...", "reason": "..."}`.
//! Diagnostic timing lines of the form `[timing] <stage> +<n>ms` appear on
//! stderr, interleaved with free-form logging.

use serde::Deserialize;

use courier_core::types::{DecisionAction, DecisionOutcome, IgnoreReason, TimingMark};

/// The structured record the brain prints on stdout.
#[derive(Debug, Deserialize)]
struct BrainRecord {
    action: DecisionAction,
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    reason: Option<IgnoreReason>,
}

/// Interpret the brain's stdout after a zero exit.
///
/// The first line that parses as a [`BrainRecord`] wins. When no line is a
/// structured record, the whole trimmed output is treated as a plain reply.
/// Completely empty output means the brain said nothing at all.
pub fn parse_stdout(stdout: &str) -> DecisionOutcome {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return DecisionOutcome::ignore(IgnoreReason::EmptyStdout);
    }

    for line in trimmed.lines() {
        let line = line.trim();
        if !line.starts_with('{') {
            continue;
        }
        if let Ok(record) = serde_json::from_str::<BrainRecord>(line) {
            return match record.action {
                DecisionAction::Reply => {
                    DecisionOutcome::reply(record.response.unwrap_or_default())
                }
                DecisionAction::Ignore => {
                    DecisionOutcome::ignore(record.reason.unwrap_or(IgnoreReason::NoResponse))
                }
            };
        }
    }

    DecisionOutcome::reply(trimmed)
}

/// Recover ordered `[timing] <stage> +<n>ms` marks from stderr.
///
/// Lines that do not match the shape exactly are skipped; timing is a
/// best-effort diagnostic, never a parse failure.
pub fn parse_timing(stderr: &str) -> Vec<TimingMark> {
    stderr
        .lines()
        .filter_map(|line| {
            let rest = line.trim().strip_prefix("[timing]")?.trim_start();
            let (stage, elapsed) = rest.rsplit_once(" +")?;
            let elapsed_ms = elapsed.strip_suffix("ms")?.parse().ok()?;
            Some(TimingMark {
                stage: stage.trim().to_string(),
                elapsed_ms,
            })
        })
        .collect()
}

/// The last `max_lines` lines of stderr, for bounded error diagnostics.
pub fn stderr_tail(stderr: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = stderr.lines().collect();
    let start = lines.len().saturating_sub(max_lines);
    lines[start..].join("\n")
}
