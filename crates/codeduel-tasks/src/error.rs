//! Error types for the task layer.

use std::time::Duration;

/// Errors raised while building or loading a task catalog.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    /// A game needs at least one task.
    #[error("task catalog is empty")]
    EmptyCatalog,

    /// A task without test cases would accept any code that loads.
    #[error("task {0} has no test cases")]
    NoTestCases(usize),

    /// The catalog file could not be parsed.
    #[error("invalid catalog: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Why submitted code could not produce a value.
///
/// Returned by the sandbox, either when loading the submission or when
/// invoking it on one test case.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExecutionError {
    /// The code didn't parse, or didn't define the task's entry point.
    #[error("failed to load submission: {0}")]
    Load(String),

    /// The code threw while running.
    #[error("runtime error: {0}")]
    Runtime(String),

    /// The sandbox's time limit was hit.
    #[error("execution timed out after {0:?}")]
    TimedOut(Duration),

    /// The sandbox itself failed (not the player's fault).
    #[error("sandbox failure: {0}")]
    Sandbox(String),
}
