//! Test scheduler: hooks, per-instruction isolation, and file-level parallelism

use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use aiqa_common::{AiqaConfig, FileResult, RunSummary, TestResult, TestStatus};

use crate::agent::{Conclusion, Conversation, ConversationEngine};
use crate::browser::BrowserLauncher;
use crate::error::{E2eResult, HookPhase};
use crate::model::ModelClient;
use crate::suite::{Hook, TestCase, TestFile, TestSuite};

/// Runs test files, one browser session per instruction
#[derive(Clone)]
pub struct TestScheduler {
    config: Arc<AiqaConfig>,
    launcher: Arc<dyn BrowserLauncher>,
    engine: Arc<ConversationEngine>,
}

impl TestScheduler {
    pub fn new(
        config: Arc<AiqaConfig>,
        launcher: Arc<dyn BrowserLauncher>,
        model: Arc<dyn ModelClient>,
    ) -> Self {
        let engine = Arc::new(ConversationEngine::from_config(&config, model));
        Self {
            config,
            launcher,
            engine,
        }
    }

    /// Run every file and aggregate the results in input order
    pub async fn run_all(&self, files: Vec<TestFile>) -> RunSummary {
        let start = Instant::now();
        let total: usize = files.iter().map(|f| f.suite.tests().len()).sum();
        info!("Running {} test(s) from {} file(s)...", total, files.len());

        let results = if self.config.parallel {
            self.run_parallel(files).await
        } else {
            let mut results = Vec::with_capacity(files.len());
            for file in &files {
                results.push(self.run_file(file).await);
            }
            results
        };

        let summary = RunSummary::from_files(results, start.elapsed().as_millis() as u64);
        info!("");
        info!(
            "Test Results: {} passed, {} failed, {} inconclusive, {} errored ({} ms)",
            summary.passed,
            summary.failed,
            summary.inconclusive,
            summary.errored,
            summary.duration_ms
        );
        summary
    }

    /// Sliding window: at most `max_concurrency` files in flight, and a new
    /// file starts as soon as any running one finishes.
    async fn run_parallel(&self, files: Vec<TestFile>) -> Vec<FileResult> {
        let limit = self.config.max_concurrency.max(1);
        let paths: Vec<PathBuf> = files.iter().map(|f| f.path.clone()).collect();
        let mut slots: Vec<Option<FileResult>> = vec![None; files.len()];
        let mut pending = files.into_iter().enumerate();
        let mut running = JoinSet::new();

        debug!("Running {} file(s) with concurrency {}", paths.len(), limit);

        loop {
            while running.len() < limit {
                let Some((index, file)) = pending.next() else {
                    break;
                };
                let scheduler = self.clone();
                running.spawn(async move {
                    let started = Instant::now();
                    let outcome = AssertUnwindSafe(scheduler.run_file(&file))
                        .catch_unwind()
                        .await;
                    let result = outcome.unwrap_or_else(|panic| {
                        let reason = panic_message(panic.as_ref());
                        error!("✗ {} - task panicked: {}", file.path.display(), reason);
                        FileResult::aborted(
                            file.path.clone(),
                            format!("task panicked: {}", reason),
                            started.elapsed().as_millis() as u64,
                        )
                    });
                    (index, result)
                });
            }

            match running.join_next().await {
                Some(Ok((index, result))) => slots[index] = Some(result),
                Some(Err(e)) => error!("File task failed: {}", e),
                None => break,
            }
        }

        slots
            .into_iter()
            .zip(paths)
            .map(|(slot, path)| {
                slot.unwrap_or_else(|| FileResult::aborted(path, "task did not complete".to_string(), 0))
            })
            .collect()
    }

    /// Run one file: before-all, each instruction, then after-all
    pub async fn run_file(&self, file: &TestFile) -> FileResult {
        let start = Instant::now();
        let suite = &file.suite;
        info!("{}", file.path.display());

        if let Err(e) = run_hooks(suite.before_all(), HookPhase::BeforeAll).await {
            error!("✗ {} - {}", file.path.display(), e);
            return FileResult::aborted(
                file.path.clone(),
                e.to_string(),
                start.elapsed().as_millis() as u64,
            );
        }

        let mut tests = Vec::with_capacity(suite.tests().len());
        for case in suite.tests() {
            tests.push(self.run_test(suite, case).await);
        }

        let teardown_error = match run_hooks(suite.after_all(), HookPhase::AfterAll).await {
            Ok(()) => None,
            Err(e) => {
                error!("✗ {} - {}", file.path.display(), e);
                Some(e.to_string())
            }
        };

        FileResult {
            path: file.path.clone(),
            tests,
            setup_error: None,
            teardown_error,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    async fn run_test(&self, suite: &TestSuite, case: &TestCase) -> TestResult {
        let start = Instant::now();
        let outcome = self.attempt(suite, case).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        let (status, motivation, turns) = match outcome {
            Ok(conversation) => classify(conversation),
            Err(e) => (TestStatus::Error, e.to_string(), 0),
        };

        match status {
            TestStatus::Passed => info!("✓ {}", case.instruction),
            _ => error!("✗ {} - {}", case.instruction, motivation),
        }

        TestResult {
            instruction: case.instruction.clone(),
            status,
            motivation,
            turns,
            duration_ms,
        }
    }

    /// before-each, conversation, after-each; the first failure ends the attempt
    async fn attempt(&self, suite: &TestSuite, case: &TestCase) -> E2eResult<Conversation> {
        run_hooks(suite.before_each(), HookPhase::BeforeEach).await?;
        let conversation = self.converse(case).await?;
        run_hooks(suite.after_each(), HookPhase::AfterEach).await?;
        Ok(conversation)
    }

    async fn converse(&self, case: &TestCase) -> E2eResult<Conversation> {
        let session = self.launcher.launch().await?;
        let outcome = self.engine.run(case, session.as_ref()).await;
        if let Err(e) = session.close().await {
            warn!("Failed to close browser: {}", e);
        }
        outcome
    }
}

fn classify(conversation: Conversation) -> (TestStatus, String, u32) {
    let turns = conversation.turns;
    match conversation.conclusion {
        Conclusion::Verdict(verdict) if verdict.passed => {
            (TestStatus::Passed, verdict.motivation, turns)
        }
        Conclusion::Verdict(verdict) => (TestStatus::Failed, verdict.motivation, turns),
        Conclusion::MalformedVerdict { raw } => (
            TestStatus::Inconclusive,
            format!("could not parse verdict: {}", raw),
            turns,
        ),
        Conclusion::StepLimitExceeded { turns } => (
            TestStatus::Inconclusive,
            format!("no verdict after {} turns", turns),
            turns,
        ),
    }
}

async fn run_hooks(hooks: &[Hook], phase: HookPhase) -> E2eResult<()> {
    for hook in hooks {
        hook().await.map_err(|e| e.in_phase(phase))?;
    }
    Ok(())
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::{ActionExecutor, BrowserSession};
    use crate::error::E2eError;
    use crate::model::{ContentBlock, MessageRequest, MessageResponse};
    use crate::suite::{hook, SuiteBuilder};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::path::PathBuf;

    /// Answers every conversation by echoing the instruction's verdict word
    struct EchoModel;

    #[async_trait]
    impl ModelClient for EchoModel {
        async fn create_message(&self, request: &MessageRequest<'_>) -> E2eResult<MessageResponse> {
            let instruction = match request.messages[0].content.first() {
                Some(ContentBlock::Text { text }) => text.clone(),
                _ => String::new(),
            };
            if instruction.contains("explode") {
                return Err(E2eError::Model("overloaded".to_string()));
            }
            let passed = !instruction.contains("fail");
            Ok(MessageResponse {
                content: vec![ContentBlock::Text {
                    text: format!(
                        "{{\"test_passed\": {}, \"motivation\": \"{}\"}}",
                        passed, instruction
                    ),
                }],
                ..Default::default()
            })
        }
    }

    struct IdleSession;

    #[async_trait]
    impl ActionExecutor for IdleSession {
        async fn screenshot(&self) -> E2eResult<PathBuf> {
            Err(E2eError::Browser("unused".to_string()))
        }
        async fn move_cursor(&self, _x: f64, _y: f64) -> E2eResult<()> {
            Ok(())
        }
        async fn click(&self) -> E2eResult<()> {
            Ok(())
        }
        async fn type_text(&self, _text: &str) -> E2eResult<()> {
            Ok(())
        }
    }

    #[async_trait]
    impl BrowserSession for IdleSession {
        async fn close(&self) -> E2eResult<()> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct CountingLauncher {
        launches: Mutex<usize>,
    }

    #[async_trait]
    impl BrowserLauncher for CountingLauncher {
        async fn launch(&self) -> E2eResult<Box<dyn BrowserSession>> {
            *self.launches.lock() += 1;
            Ok(Box::new(IdleSession))
        }
    }

    fn scheduler(launcher: Arc<CountingLauncher>) -> TestScheduler {
        TestScheduler::new(Arc::new(AiqaConfig::default()), launcher, Arc::new(EchoModel))
    }

    fn failing_hook(message: &'static str) -> Hook {
        hook(move || async move { Err(E2eError::HookFailed(message.to_string())) })
    }

    #[tokio::test]
    async fn test_statuses_are_mapped() {
        let mut builder = SuiteBuilder::new();
        builder.test("should pass").test("should fail").test("will explode");
        let file = TestFile::new("mixed.test.yaml", builder.build());

        let launcher = Arc::new(CountingLauncher::default());
        let result = scheduler(launcher.clone()).run_file(&file).await;

        let statuses: Vec<_> = result.tests.iter().map(|t| t.status).collect();
        assert_eq!(
            statuses,
            vec![TestStatus::Passed, TestStatus::Failed, TestStatus::Error]
        );
        assert_eq!(result.tests[1].motivation, "should fail");
        assert!(result.tests[2].motivation.contains("overloaded"));
        assert_eq!(*launcher.launches.lock(), 3);
    }

    #[tokio::test]
    async fn test_before_each_failure_is_isolated() {
        let calls = Arc::new(Mutex::new(0usize));
        let counter = calls.clone();
        let mut builder = SuiteBuilder::new();
        builder
            .test("first")
            .test("second")
            .before_each(hook(move || {
                let counter = counter.clone();
                async move {
                    let mut n = counter.lock();
                    *n += 1;
                    if *n == 1 {
                        return Err(E2eError::HookFailed("reset failed".to_string()));
                    }
                    Ok(())
                }
            }));
        let file = TestFile::new("each.test.yaml", builder.build());

        let result = scheduler(Arc::new(CountingLauncher::default()))
            .run_file(&file)
            .await;

        assert_eq!(result.tests[0].status, TestStatus::Error);
        assert_eq!(result.tests[0].motivation, "before_each hook failed: reset failed");
        assert_eq!(result.tests[1].status, TestStatus::Passed);
        assert_eq!(*calls.lock(), 2);
    }

    #[tokio::test]
    async fn test_after_all_failure_is_recorded() {
        let mut builder = SuiteBuilder::new();
        builder.test("ok").after_all(failing_hook("cleanup failed"));
        let file = TestFile::new("teardown.test.yaml", builder.build());

        let result = scheduler(Arc::new(CountingLauncher::default()))
            .run_file(&file)
            .await;

        assert_eq!(result.tests.len(), 1);
        assert!(result.setup_error.is_none());
        assert_eq!(
            result.teardown_error.as_deref(),
            Some("after_all hook failed: cleanup failed")
        );
    }

    #[test]
    fn test_classify_step_limit() {
        let (status, motivation, turns) = classify(Conversation {
            conclusion: Conclusion::StepLimitExceeded { turns: 7 },
            turns: 7,
            transcript: Vec::new(),
        });
        assert_eq!(status, TestStatus::Inconclusive);
        assert_eq!(motivation, "no verdict after 7 turns");
        assert_eq!(turns, 7);
    }

    #[test]
    fn test_panic_message() {
        let boxed: Box<dyn std::any::Any + Send> = Box::new("boom");
        assert_eq!(panic_message(boxed.as_ref()), "boom");
        let boxed: Box<dyn std::any::Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(boxed.as_ref()), "bang");
    }
}
