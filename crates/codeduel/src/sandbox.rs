//! An [`Executor`] that hands submissions to an external sandbox process.
//!
//! Each request spawns the configured command, writes one JSON object to
//! its stdin and reads one JSON object from its stdout:
//!
//! ```text
//! → {"op":"load","code":"...","entryPoint":"multiply","kind":"function"}
//! ← {"ok":true}
//!
//! → {"op":"call","code":"...","entryPoint":"multiply","kind":"function","args":[2,3]}
//! ← {"ok":true,"value":6}
//! ← {"ok":false,"error":"ReferenceError: x is not defined"}
//! ```
//!
//! The process is killed if it outlives the time limit. Isolation is
//! entirely the sandbox program's business.

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use codeduel_tasks::{CallKind, Callable, ExecutionError, Executor, Task, Value};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::CodeduelError;

#[derive(Debug, Serialize)]
#[serde(
    tag = "op",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
enum SandboxRequest<'a> {
    Load {
        code: &'a str,
        entry_point: &'a str,
        kind: CallKind,
    },
    Call {
        code: &'a str,
        entry_point: &'a str,
        kind: CallKind,
        args: &'a [Value],
    },
}

#[derive(Debug, Deserialize)]
struct SandboxReply {
    ok: bool,
    #[serde(default)]
    value: Value,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug)]
struct SandboxCommand {
    program: String,
    args: Vec<String>,
    time_limit: Duration,
}

impl SandboxCommand {
    /// Runs one request. `reject` wraps an error reported by the sandbox.
    async fn request(
        &self,
        request: &SandboxRequest<'_>,
        reject: fn(String) -> ExecutionError,
    ) -> Result<Value, ExecutionError> {
        let input = serde_json::to_vec(request)
            .map_err(|e| ExecutionError::Sandbox(format!("encode request: {e}")))?;

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                warn!(program = %self.program, error = %e, "failed to start sandbox");
                ExecutionError::Sandbox(e.to_string())
            })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| ExecutionError::Sandbox("sandbox stdin unavailable".into()))?;

        let run = async move {
            stdin.write_all(&input).await?;
            stdin.shutdown().await?;
            drop(stdin);
            Ok::<_, std::io::Error>(child.wait_with_output().await?)
        };

        // Dropping `run` on timeout drops the child, which kills it.
        let output = tokio::time::timeout(self.time_limit, run)
            .await
            .map_err(|_| {
                debug!(program = %self.program, limit = ?self.time_limit, "sandbox timed out");
                ExecutionError::TimedOut(self.time_limit)
            })?
            .map_err(|e| {
                warn!(program = %self.program, error = %e, "sandbox i/o failed");
                ExecutionError::Sandbox(e.to_string())
            })?;

        let reply: SandboxReply = serde_json::from_slice(&output.stdout).map_err(|e| {
            warn!(
                program = %self.program,
                status = %output.status,
                error = %e,
                "unreadable sandbox reply"
            );
            ExecutionError::Sandbox(format!("unreadable reply ({}): {e}", output.status))
        })?;

        if reply.ok {
            Ok(reply.value)
        } else {
            Err(reject(reply.error.unwrap_or_else(|| "unknown error".into())))
        }
    }
}

/// Runs submissions through an external sandbox command.
#[derive(Debug, Clone)]
pub struct ProcessExecutor {
    command: Arc<SandboxCommand>,
}

impl ProcessExecutor {
    /// Creates an executor for `command` (program, then arguments).
    ///
    /// # Errors
    /// Returns `CodeduelError::Config` if `command` is empty.
    pub fn new(command: Vec<String>, time_limit: Duration) -> Result<Self, CodeduelError> {
        let mut parts = command.into_iter();
        let program = parts
            .next()
            .ok_or_else(|| CodeduelError::Config("sandbox command is empty".into()))?;
        Ok(Self {
            command: Arc::new(SandboxCommand {
                program,
                args: parts.collect(),
                time_limit,
            }),
        })
    }

    pub fn time_limit(&self) -> Duration {
        self.command.time_limit
    }
}

impl Executor for ProcessExecutor {
    type Callable = ProcessCallable;

    async fn execute(
        &self,
        code: &str,
        _task_index: usize,
        task: &Task,
    ) -> Result<ProcessCallable, ExecutionError> {
        let request = SandboxRequest::Load {
            code,
            entry_point: &task.entry_point,
            kind: task.kind,
        };
        self.command.request(&request, ExecutionError::Load).await?;
        Ok(ProcessCallable {
            command: Arc::clone(&self.command),
            code: code.to_owned(),
            entry_point: task.entry_point.clone(),
        })
    }
}

/// A submission the sandbox accepted.
#[derive(Debug)]
pub struct ProcessCallable {
    command: Arc<SandboxCommand>,
    code: String,
    entry_point: String,
}

impl Callable for ProcessCallable {
    async fn invoke(&self, kind: CallKind, args: &[Value]) -> Result<Value, ExecutionError> {
        let request = SandboxRequest::Call {
            code: &self.code,
            entry_point: &self.entry_point,
            kind,
            args,
        };
        self.command.request(&request, ExecutionError::Runtime).await
    }
}
