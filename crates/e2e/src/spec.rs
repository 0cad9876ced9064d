//! Declarative YAML test files
//!
//! A test file lists natural-language instructions and the hooks around
//! them. Loading replays the document into a fresh [`SuiteBuilder`] in
//! declaration order.
//!
//! ```yaml
//! before_all:
//!   - log: Setting up tests
//!   - run: ./scripts/seed-db.sh
//! before_each:
//!   - run: ./scripts/reset-session.sh
//! tests:
//!   - Verify that users can navigate to the "Projects" tab
//!   - instruction: Verify that the user can log in
//!     payload:
//!       username: admin
//!       password: password
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::process::Command;
use tracing::info;

use crate::error::{E2eError, E2eResult};
use crate::suite::{hook, Hook, SuiteBuilder, TestCase, TestFile};

/// A test file as written on disk
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TestFileSpec {
    #[serde(default)]
    pub before_all: Vec<HookSpec>,

    #[serde(default)]
    pub before_each: Vec<HookSpec>,

    #[serde(default)]
    pub after_each: Vec<HookSpec>,

    #[serde(default)]
    pub after_all: Vec<HookSpec>,

    #[serde(default)]
    pub tests: Vec<TestSpec>,
}

/// A test entry: a bare instruction or an instruction with test data
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TestSpec {
    Instruction(String),
    Detailed {
        instruction: String,
        #[serde(default)]
        payload: Option<serde_json::Value>,
    },
}

impl From<TestSpec> for TestCase {
    fn from(spec: TestSpec) -> Self {
        match spec {
            TestSpec::Instruction(instruction) => TestCase::new(instruction),
            TestSpec::Detailed {
                instruction,
                payload,
            } => TestCase {
                instruction,
                payload,
            },
        }
    }
}

/// A hook entry; exactly one of the fields must be set
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HookSpec {
    /// Shell command, run with `sh -c`
    #[serde(default)]
    pub run: Option<String>,

    /// Message written to the log
    #[serde(default)]
    pub log: Option<String>,
}

impl HookSpec {
    fn into_hook(self) -> E2eResult<Hook> {
        match (self.run, self.log) {
            (Some(command), None) => Ok(hook(move || run_command(command.clone()))),
            (None, Some(message)) => Ok(hook(move || {
                let message = message.clone();
                async move {
                    info!("[TEST LOG] {}", message);
                    Ok(())
                }
            })),
            _ => Err(E2eError::SuiteParse(
                "each hook needs exactly one of 'run' or 'log'".to_string(),
            )),
        }
    }
}

async fn run_command(command: String) -> E2eResult<()> {
    let output = Command::new("sh").arg("-c").arg(&command).output().await?;
    if output.status.success() {
        return Ok(());
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    Err(E2eError::HookFailed(format!(
        "`{}` exited with {}: {}",
        command,
        output.status,
        stderr.trim()
    )))
}

impl TestFileSpec {
    /// Parse a test file from a YAML string
    pub fn from_yaml(yaml: &str) -> E2eResult<Self> {
        // An empty document is a file with nothing registered
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(yaml).map_err(|e| E2eError::SuiteParse(e.to_string()))
    }

    /// Replay the document into a fresh builder
    pub fn register(self, builder: &mut SuiteBuilder) -> E2eResult<()> {
        for spec in self.before_all {
            builder.before_all(spec.into_hook()?);
        }
        for spec in self.before_each {
            builder.before_each(spec.into_hook()?);
        }
        for spec in self.after_each {
            builder.after_each(spec.into_hook()?);
        }
        for spec in self.after_all {
            builder.after_all(spec.into_hook()?);
        }
        for test in self.tests {
            builder.add_test(test.into());
        }
        Ok(())
    }
}

/// Load one test file into a frozen suite
pub fn load_test_file(path: &Path) -> E2eResult<TestFile> {
    let content = std::fs::read_to_string(path)?;
    let spec = TestFileSpec::from_yaml(&content)
        .map_err(|e| E2eError::SuiteParse(format!("{}: {}", path.display(), e)))?;

    let mut builder = SuiteBuilder::new();
    spec.register(&mut builder)
        .map_err(|e| E2eError::SuiteParse(format!("{}: {}", path.display(), e)))?;

    Ok(TestFile::new(path, builder.build()))
}
