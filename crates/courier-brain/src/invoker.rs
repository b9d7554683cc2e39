// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Subprocess decision invoker.
//!
//! Spawns one OS child process per decision, passes the message as
//! arguments, drains both output streams from the moment of spawn, and
//! enforces a hard wall-clock deadline. Every outcome of the child short of
//! "could not be spawned at all" is converted into a [`DecisionOutcome`].

use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use courier_core::error::CourierError;
use courier_core::traits::DecisionEngine;
use courier_core::types::{DecisionOutcome, IgnoreReason, InboundEvent};

use crate::parse::{parse_stdout, parse_timing, stderr_tail};

/// How long to wait for the stream drain tasks after killing the child.
const POST_KILL_DRAIN_GRACE: Duration = Duration::from_millis(500);

/// Invokes an external decision process for each inbound message.
pub struct BrainInvoker {
    command: String,
    base_args: Vec<String>,
    timeout: Duration,
    stderr_tail_lines: usize,
}

impl BrainInvoker {
    pub fn new(
        command: impl Into<String>,
        base_args: Vec<String>,
        timeout: Duration,
        stderr_tail_lines: usize,
    ) -> Self {
        Self {
            command: command.into(),
            base_args,
            timeout,
            stderr_tail_lines,
        }
    }
}

/// Drain a child output stream into a shared buffer, chunk by chunk.
///
/// Both streams must always be drained so the child can never block on a
/// full pipe buffer. The buffer is shared so partial output stays readable
/// even when the stream never reaches EOF (a killed child can leave
/// grandchildren holding the pipe's write end open).
fn spawn_drain<R>(mut stream: R) -> (JoinHandle<()>, Arc<Mutex<Vec<u8>>>)
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
{
    let buf = Arc::new(Mutex::new(Vec::new()));
    let task_buf = Arc::clone(&buf);
    let handle = tokio::spawn(async move {
        let mut chunk = [0u8; 4096];
        loop {
            match stream.read(&mut chunk).await {
                Ok(0) | Err(_) => break,
                Ok(n) => task_buf
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .extend_from_slice(&chunk[..n]),
            }
        }
    });
    (handle, buf)
}

fn snapshot(buf: &Arc<Mutex<Vec<u8>>>) -> String {
    String::from_utf8_lossy(&buf.lock().unwrap_or_else(|e| e.into_inner())).into_owned()
}

#[async_trait]
impl DecisionEngine for BrainInvoker {
    async fn decide(&self, event: &InboundEvent) -> Result<DecisionOutcome, CourierError> {
        let mut cmd = Command::new(&self.command);
        cmd.args(&self.base_args)
            .arg("--message")
            .arg(&event.body_text);
        if event.conversation_key.as_str().contains('@') {
            cmd.arg("--jid").arg(event.conversation_key.as_str());
        }
        cmd.arg("--sender")
            .arg(&event.sender_display_name)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|source| CourierError::Spawn { source })?;

        let stdout = child.stdout.take().ok_or_else(|| {
            CourierError::Internal("child stdout was not piped".to_string())
        })?;
        let stderr = child.stderr.take().ok_or_else(|| {
            CourierError::Internal("child stderr was not piped".to_string())
        })?;
        let (mut stdout_task, stdout_buf) = spawn_drain(stdout);
        let (mut stderr_task, stderr_buf) = spawn_drain(stderr);

        let status = tokio::select! {
            status = child.wait() => match status {
                Ok(status) => status,
                Err(err) => {
                    stdout_task.abort();
                    stderr_task.abort();
                    warn!(error = %err, "failed to wait on decision process");
                    return Ok(DecisionOutcome::ignore(IgnoreReason::Error));
                }
            },
            _ = tokio::time::sleep(self.timeout) => {
                // The child is a black box; its shutdown may outlast the
                // deadline. Kill it and bound the caller's wait regardless.
                if let Err(err) = child.start_kill() {
                    warn!(error = %err, "failed to kill timed-out decision process");
                }
                // Reap the killed child so nothing lingers past the grace
                // period, not even a zombie entry.
                let _ = tokio::time::timeout(POST_KILL_DRAIN_GRACE, child.wait()).await;
                let _ = tokio::time::timeout(POST_KILL_DRAIN_GRACE, &mut stderr_task).await;
                stderr_task.abort();
                stdout_task.abort();
                let timing = parse_timing(&snapshot(&stderr_buf));
                warn!(
                    key = %event.conversation_key,
                    timeout_ms = self.timeout.as_millis() as u64,
                    stages = timing.len(),
                    "decision process exceeded deadline, killed"
                );
                return Ok(DecisionOutcome::ignore(IgnoreReason::Timeout).with_timing(timing));
            }
        };

        // The child has exited; its own stream ends are closed, but orphaned
        // grandchildren could hold the pipes open. Give the drains a bounded
        // grace period and take whatever arrived.
        let _ = tokio::time::timeout(POST_KILL_DRAIN_GRACE, &mut stdout_task).await;
        let _ = tokio::time::timeout(POST_KILL_DRAIN_GRACE, &mut stderr_task).await;
        stdout_task.abort();
        stderr_task.abort();
        let stdout_text = snapshot(&stdout_buf);
        let stderr_text = snapshot(&stderr_buf);
        let timing = parse_timing(&stderr_text);

        if !status.success() {
            warn!(
                key = %event.conversation_key,
                code = status.code().unwrap_or(-1),
                stderr = %stderr_tail(&stderr_text, self.stderr_tail_lines),
                "decision process failed"
            );
            return Ok(DecisionOutcome::ignore(IgnoreReason::Error).with_timing(timing));
        }

        let outcome = parse_stdout(&stdout_text).with_timing(timing);
        debug!(
            key = %event.conversation_key,
            action = %outcome.action,
            stages = outcome.timing.len(),
            "decision process completed"
        );
        Ok(outcome)
    }
}
