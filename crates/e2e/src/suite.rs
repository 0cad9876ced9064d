//! Test suites: ordered instructions plus lifecycle hooks
//!
//! A suite is assembled through a [`SuiteBuilder`] created fresh for each
//! test file, then frozen into a [`TestSuite`]. Registration only appends, so
//! declaration order is execution order.

use futures::future::BoxFuture;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::E2eResult;

/// Zero-argument lifecycle callback
pub type Hook = Arc<dyn Fn() -> BoxFuture<'static, E2eResult<()>> + Send + Sync>;

/// Wrap an async closure as a [`Hook`]
pub fn hook<F, Fut>(f: F) -> Hook
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = E2eResult<()>> + Send + 'static,
{
    Arc::new(move || Box::pin(f()))
}

/// One natural-language test
#[derive(Debug, Clone, PartialEq)]
pub struct TestCase {
    pub instruction: String,
    /// Optional test data handed to the model alongside the instruction
    pub payload: Option<serde_json::Value>,
}

impl TestCase {
    pub fn new(instruction: impl Into<String>) -> Self {
        Self {
            instruction: instruction.into(),
            payload: None,
        }
    }

    pub fn with_payload(instruction: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            instruction: instruction.into(),
            payload: Some(payload),
        }
    }
}

/// Frozen collection of tests and hooks
#[derive(Clone, Default)]
pub struct TestSuite {
    tests: Vec<TestCase>,
    before_all: Vec<Hook>,
    before_each: Vec<Hook>,
    after_each: Vec<Hook>,
    after_all: Vec<Hook>,
}

impl TestSuite {
    pub fn tests(&self) -> &[TestCase] {
        &self.tests
    }

    pub fn before_all(&self) -> &[Hook] {
        &self.before_all
    }

    pub fn before_each(&self) -> &[Hook] {
        &self.before_each
    }

    pub fn after_each(&self) -> &[Hook] {
        &self.after_each
    }

    pub fn after_all(&self) -> &[Hook] {
        &self.after_all
    }

    /// Keep only tests whose instruction matches `filter`
    pub fn retain_matching(mut self, filter: &regex::Regex) -> Self {
        self.tests.retain(|t| filter.is_match(&t.instruction));
        self
    }
}

impl std::fmt::Debug for TestSuite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestSuite")
            .field("tests", &self.tests)
            .field("before_all", &self.before_all.len())
            .field("before_each", &self.before_each.len())
            .field("after_each", &self.after_each.len())
            .field("after_all", &self.after_all.len())
            .finish()
    }
}

/// Registration surface for one test file
#[derive(Default)]
pub struct SuiteBuilder {
    suite: TestSuite,
}

impl SuiteBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn test(&mut self, instruction: impl Into<String>) -> &mut Self {
        self.suite.tests.push(TestCase::new(instruction));
        self
    }

    pub fn test_with_payload(
        &mut self,
        instruction: impl Into<String>,
        payload: serde_json::Value,
    ) -> &mut Self {
        self.suite
            .tests
            .push(TestCase::with_payload(instruction, payload));
        self
    }

    pub fn add_test(&mut self, case: TestCase) -> &mut Self {
        self.suite.tests.push(case);
        self
    }

    pub fn before_all(&mut self, hook: Hook) -> &mut Self {
        self.suite.before_all.push(hook);
        self
    }

    pub fn before_each(&mut self, hook: Hook) -> &mut Self {
        self.suite.before_each.push(hook);
        self
    }

    pub fn after_each(&mut self, hook: Hook) -> &mut Self {
        self.suite.after_each.push(hook);
        self
    }

    pub fn after_all(&mut self, hook: Hook) -> &mut Self {
        self.suite.after_all.push(hook);
        self
    }

    pub fn build(self) -> TestSuite {
        self.suite
    }
}

/// A suite tagged with the file it came from
#[derive(Debug, Clone)]
pub struct TestFile {
    pub path: PathBuf,
    pub suite: TestSuite,
}

impl TestFile {
    pub fn new(path: impl AsRef<Path>, suite: TestSuite) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            suite,
        }
    }
}
