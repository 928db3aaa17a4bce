//! Task definitions and the catalog a game is played over.

use std::ops::Index;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::TaskError;

/// How a task's entry point is called.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CallKind {
    /// `entry(...args)`
    #[default]
    Function,
    /// `new Entry(...args)`
    Constructor,
}

/// How a result is compared with a test case's expected value.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", content = "fields", rename_all = "camelCase")]
pub enum Equality {
    /// The whole value must be equal. Numbers compare by value, so `6`
    /// and `6.0` are the same answer.
    #[default]
    Scalar,
    /// Only the listed fields of the result are compared.
    FieldSet(Vec<String>),
}

impl Equality {
    /// Whether `actual` is an acceptable answer for `expected`.
    pub fn matches(&self, actual: &Value, expected: &Value) -> bool {
        match self {
            Self::Scalar => scalar_eq(actual, expected),
            Self::FieldSet(fields) => fields.iter().all(|field| {
                match (actual.get(field), expected.get(field)) {
                    (Some(a), Some(e)) => scalar_eq(a, e),
                    (None, None) => true,
                    _ => false,
                }
            }),
        }
    }
}

fn scalar_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

/// One fixed input/output pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    pub args: Vec<Value>,
    pub expected: Value,
}

impl TestCase {
    pub fn new(args: Vec<Value>, expected: Value) -> Self {
        Self { args, expected }
    }
}

/// A coding challenge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Statement shown to players.
    pub prompt: String,
    /// Name of the function or class the submission must define.
    pub entry_point: String,
    #[serde(default)]
    pub kind: CallKind,
    #[serde(default)]
    pub equality: Equality,
    /// Run in order; the first failure decides the verdict.
    pub test_cases: Vec<TestCase>,
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// The ordered, non-empty list of tasks. Round `n` plays task `n - 1`.
#[derive(Debug, Clone)]
pub struct Catalog {
    tasks: Vec<Task>,
}

impl Catalog {
    /// Builds a catalog, rejecting empty catalogs and tasks without tests.
    ///
    /// # Errors
    /// Returns [`TaskError::EmptyCatalog`] or [`TaskError::NoTestCases`].
    pub fn new(tasks: Vec<Task>) -> Result<Self, TaskError> {
        if tasks.is_empty() {
            return Err(TaskError::EmptyCatalog);
        }
        if let Some(index) = tasks.iter().position(|t| t.test_cases.is_empty()) {
            return Err(TaskError::NoTestCases(index));
        }
        Ok(Self { tasks })
    }

    /// Parses a JSON array of tasks.
    ///
    /// # Errors
    /// Returns [`TaskError::Parse`] for malformed JSON, otherwise the
    /// same errors as [`Catalog::new`].
    pub fn from_json(data: &[u8]) -> Result<Self, TaskError> {
        let tasks: Vec<Task> = serde_json::from_slice(data)?;
        Self::new(tasks)
    }

    /// The five stock challenges.
    pub fn builtin() -> Self {
        Self {
            tasks: builtin_tasks(),
        }
    }

    pub fn get(&self, index: usize) -> Option<&Task> {
        self.tasks.get(index)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Always `false`; kept for the `len`/`is_empty` pair.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Index of the final task.
    pub fn last_index(&self) -> usize {
        self.tasks.len() - 1
    }

    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter()
    }
}

impl Index<usize> for Catalog {
    type Output = Task;

    fn index(&self, index: usize) -> &Task {
        &self.tasks[index]
    }
}

fn builtin_tasks() -> Vec<Task> {
    vec![
        Task {
            prompt: "Write a function multiply(a, b) that returns the product of two numbers."
                .into(),
            entry_point: "multiply".into(),
            kind: CallKind::Function,
            equality: Equality::Scalar,
            test_cases: vec![
                TestCase::new(vec![json!(2), json!(3)], json!(6)),
                TestCase::new(vec![json!(-1), json!(5)], json!(-5)),
                TestCase::new(vec![json!(0), json!(10)], json!(0)),
            ],
        },
        Task {
            prompt: "Create a class Car whose constructor takes a make and a model.".into(),
            entry_point: "Car".into(),
            kind: CallKind::Constructor,
            equality: Equality::FieldSet(vec!["make".into(), "model".into()]),
            test_cases: vec![
                TestCase::new(
                    vec![json!("Toyota"), json!("Corolla")],
                    json!({ "make": "Toyota", "model": "Corolla" }),
                ),
                TestCase::new(
                    vec![json!("Honda"), json!("Civic")],
                    json!({ "make": "Honda", "model": "Civic" }),
                ),
            ],
        },
        Task {
            prompt: "Write a function capitalize(str) that upper-cases its first letter.".into(),
            entry_point: "capitalize".into(),
            kind: CallKind::Function,
            equality: Equality::Scalar,
            test_cases: vec![
                TestCase::new(vec![json!("hello")], json!("Hello")),
                TestCase::new(vec![json!("world")], json!("World")),
                TestCase::new(vec![json!("")], json!("")),
            ],
        },
        Task {
            prompt: "Write a function factorial(n) that returns the factorial of n.".into(),
            entry_point: "factorial".into(),
            kind: CallKind::Function,
            equality: Equality::Scalar,
            test_cases: vec![
                TestCase::new(vec![json!(0)], json!(1)),
                TestCase::new(vec![json!(5)], json!(120)),
                TestCase::new(vec![json!(3)], json!(6)),
            ],
        },
        Task {
            prompt: "Write a function findMax(arr) that returns the largest number in the array."
                .into(),
            entry_point: "findMax".into(),
            kind: CallKind::Function,
            equality: Equality::Scalar,
            test_cases: vec![
                TestCase::new(vec![json!([1, 2, 3])], json!(3)),
                TestCase::new(vec![json!([-1, -2, -3])], json!(-1)),
                TestCase::new(vec![json!([5, 10, 15])], json!(15)),
            ],
        },
    ]
}
