//! Judging a submission against a task's test cases.

use serde_json::Value;
use tracing::debug;

use crate::{Callable, ExecutionError, Executor, Task};

/// Why a loaded submission failed a test case.
#[derive(Debug, Clone, PartialEq)]
pub enum Failure {
    /// It ran, but returned the wrong value.
    Mismatch { expected: Value, actual: Value },
    /// It threw or timed out on this case.
    Errored(ExecutionError),
}

/// The outcome of judging one submission.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    /// Every test case passed.
    Passed,
    /// The sandbox couldn't load the code at all.
    Rejected(ExecutionError),
    /// Test case `case` (0-based) failed; later cases were not run.
    Failed { case: usize, failure: Failure },
}

impl Verdict {
    pub fn is_pass(&self) -> bool {
        matches!(self, Self::Passed)
    }

    /// Player-facing feedback for a failed submission.
    ///
    /// Deliberately generic: it never reveals expected values.
    pub fn feedback(&self) -> Option<&'static str> {
        match self {
            Self::Passed => None,
            Self::Rejected(_) => {
                Some("Your code failed to run. Check the syntax and try again.")
            }
            Self::Failed { .. } => Some("Incorrect solution. Try again."),
        }
    }
}

/// Loads `code` through `executor` and runs `task`'s test cases in order.
///
/// Stops at the first mismatch or per-case error.
pub async fn evaluate<E: Executor>(
    executor: &E,
    task_index: usize,
    task: &Task,
    code: &str,
) -> Verdict {
    let callable = match executor.execute(code, task_index, task).await {
        Ok(callable) => callable,
        Err(e) => {
            debug!(task_index, error = %e, "submission rejected by sandbox");
            return Verdict::Rejected(e);
        }
    };

    for (case, test) in task.test_cases.iter().enumerate() {
        match callable.invoke(task.kind, &test.args).await {
            Ok(actual) if task.equality.matches(&actual, &test.expected) => {}
            Ok(actual) => {
                debug!(task_index, case, "test case mismatch");
                return Verdict::Failed {
                    case,
                    failure: Failure::Mismatch {
                        expected: test.expected.clone(),
                        actual,
                    },
                };
            }
            Err(e) => {
                debug!(task_index, case, error = %e, "test case errored");
                return Verdict::Failed {
                    case,
                    failure: Failure::Errored(e),
                };
            }
        }
    }

    Verdict::Passed
}
