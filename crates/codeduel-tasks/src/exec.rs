//! The execution capability: how the game core talks to a sandbox.
//!
//! codeduel doesn't run untrusted code. That is the sandbox's job, and
//! the sandbox is responsible for isolation and for enforcing a time
//! limit. This module only defines the two-step contract:
//!
//! 1. [`Executor::execute`] loads a submission for a task and hands back
//!    a [`Callable`] (or fails, e.g. on a syntax error).
//! 2. [`Callable::invoke`] runs it on one test case's arguments.

use std::future::Future;

use serde_json::Value;

use crate::{CallKind, ExecutionError, Task};

/// Loads submitted code inside a sandbox.
///
/// `Send + Sync + 'static` because one executor is shared by every room
/// and evaluations run on spawned Tokio tasks.
pub trait Executor: Send + Sync + 'static {
    /// The loaded submission.
    type Callable: Callable;

    /// Loads `code` for the task at `task_index`.
    ///
    /// The task tells the sandbox which entry point to extract
    /// ([`Task::entry_point`]) and how it will be called.
    ///
    /// # Errors
    /// Returns `ExecutionError` if the code can't be loaded or doesn't
    /// define the entry point.
    fn execute(
        &self,
        code: &str,
        task_index: usize,
        task: &Task,
    ) -> impl Future<Output = Result<Self::Callable, ExecutionError>> + Send;
}

/// A loaded submission that can be run on test arguments.
pub trait Callable: Send + Sync + 'static {
    /// Runs the entry point on `args`.
    ///
    /// `kind` selects plain invocation or construction; for constructors
    /// the returned value is the constructed object's fields.
    ///
    /// # Errors
    /// Returns `ExecutionError` if the code throws or times out.
    fn invoke(
        &self,
        kind: CallKind,
        args: &[Value],
    ) -> impl Future<Output = Result<Value, ExecutionError>> + Send;
}
