//! Outcome and report types shared by the runner and the CLI

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Pass/fail judgement returned by the model at the end of a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    #[serde(rename = "test_passed")]
    pub passed: bool,
    #[serde(default)]
    pub motivation: String,
}

/// Final state of one instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestStatus {
    /// Model reported the test as passed
    Passed,
    /// Model reported the test as failed
    Failed,
    /// Conversation ended without a usable verdict
    Inconclusive,
    /// A hook, model call, or browser action failed
    Error,
}

impl std::fmt::Display for TestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TestStatus::Passed => write!(f, "passed"),
            TestStatus::Failed => write!(f, "failed"),
            TestStatus::Inconclusive => write!(f, "inconclusive"),
            TestStatus::Error => write!(f, "error"),
        }
    }
}

/// Result of running a single instruction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResult {
    pub instruction: String,
    pub status: TestStatus,
    /// Model motivation, or the error/inconclusive reason
    pub motivation: String,
    /// Model calls made during the conversation
    pub turns: u32,
    pub duration_ms: u64,
}

/// Result of running one test file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileResult {
    pub path: PathBuf,
    pub tests: Vec<TestResult>,
    /// before-all failure; when set no test in the file ran
    pub setup_error: Option<String>,
    /// after-all failure
    pub teardown_error: Option<String>,
    pub duration_ms: u64,
}

impl FileResult {
    /// File-level result for a file that never got to run its tests
    pub fn aborted(path: PathBuf, reason: String, duration_ms: u64) -> Self {
        Self {
            path,
            tests: Vec::new(),
            setup_error: Some(reason),
            teardown_error: None,
            duration_ms,
        }
    }

    pub fn count(&self, status: TestStatus) -> usize {
        self.tests.iter().filter(|t| t.status == status).count()
    }
}

/// Result of a whole run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub inconclusive: usize,
    pub errored: usize,
    pub duration_ms: u64,
    pub files: Vec<FileResult>,
}

impl RunSummary {
    /// Aggregate per-file results
    pub fn from_files(files: Vec<FileResult>, duration_ms: u64) -> Self {
        let sum = |status| files.iter().map(|f| f.count(status)).sum::<usize>();
        Self {
            total: files.iter().map(|f| f.tests.len()).sum(),
            passed: sum(TestStatus::Passed),
            failed: sum(TestStatus::Failed),
            inconclusive: sum(TestStatus::Inconclusive),
            errored: sum(TestStatus::Error),
            duration_ms,
            files,
        }
    }

    /// Files whose before-all or after-all hooks failed
    pub fn file_errors(&self) -> usize {
        self.files
            .iter()
            .filter(|f| f.setup_error.is_some() || f.teardown_error.is_some())
            .count()
    }

    /// Write results as pretty JSON into `dir/test-results.json`
    pub fn write_results(&self, dir: &Path) -> crate::Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join("test-results.json");
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json)?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(status: TestStatus) -> TestResult {
        TestResult {
            instruction: "check".to_string(),
            status,
            motivation: String::new(),
            turns: 1,
            duration_ms: 5,
        }
    }

    #[test]
    fn test_verdict_wire_names() {
        let verdict: Verdict =
            serde_json::from_str(r#"{"test_passed": true, "motivation": "ok"}"#).unwrap();
        assert!(verdict.passed);
        assert_eq!(verdict.motivation, "ok");
    }

    #[test]
    fn test_summary_counts() {
        let files = vec![
            FileResult {
                path: PathBuf::from("a.test.yaml"),
                tests: vec![result(TestStatus::Passed), result(TestStatus::Failed)],
                setup_error: None,
                teardown_error: Some("boom".to_string()),
                duration_ms: 10,
            },
            FileResult::aborted(PathBuf::from("b.test.yaml"), "setup".to_string(), 1),
            FileResult {
                path: PathBuf::from("c.test.yaml"),
                tests: vec![result(TestStatus::Inconclusive), result(TestStatus::Error)],
                setup_error: None,
                teardown_error: None,
                duration_ms: 10,
            },
        ];
        let summary = RunSummary::from_files(files, 30);
        assert_eq!(summary.total, 4);
        assert_eq!(summary.passed, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.inconclusive, 1);
        assert_eq!(summary.errored, 1);
        assert_eq!(summary.file_errors(), 2);
    }

    #[test]
    fn test_write_results() {
        let tmp = tempfile::tempdir().unwrap();
        let summary = RunSummary::from_files(Vec::new(), 0);
        let path = summary.write_results(&tmp.path().join("out")).unwrap();
        let written: RunSummary =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(written.total, 0);
    }
}
