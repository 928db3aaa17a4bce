//! Tasks and submission evaluation for codeduel.
//!
//! - [`Catalog`] / [`Task`] / [`TestCase`]: the ordered list of
//!   challenges a game is played over, each with fixed test cases.
//! - [`Executor`] / [`Callable`]: the contract with the sandbox that
//!   actually runs untrusted code. This crate never runs code itself.
//! - [`evaluate`] / [`Verdict`]: runs a submission's test cases in order
//!   and decides pass or fail.
//!
//! How a task is called (plain call vs. construction) and how results are
//! compared (scalar vs. field-set) are properties of the [`Task`], so
//! adding a task never touches evaluation code.

mod error;
mod exec;
mod task;
mod verdict;

pub use error::{ExecutionError, TaskError};
pub use exec::{Callable, Executor};
pub use task::{CallKind, Catalog, Equality, Task, TestCase};
pub use verdict::{Failure, Verdict, evaluate};

/// Values passed to and returned from submitted code.
pub use serde_json::Value;
