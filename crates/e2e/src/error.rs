//! Error types for test execution

use thiserror::Error;

/// Lifecycle point a hook was registered at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookPhase {
    BeforeAll,
    BeforeEach,
    AfterEach,
    AfterAll,
}

impl std::fmt::Display for HookPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HookPhase::BeforeAll => write!(f, "before_all"),
            HookPhase::BeforeEach => write!(f, "before_each"),
            HookPhase::AfterEach => write!(f, "after_each"),
            HookPhase::AfterAll => write!(f, "after_all"),
        }
    }
}

#[derive(Error, Debug)]
pub enum E2eError {
    #[error("No test files found: {0}")]
    Discovery(String),

    #[error("Test file parse error: {0}")]
    SuiteParse(String),

    #[error("Hook failed: {0}")]
    HookFailed(String),

    #[error("{phase} hook failed: {message}")]
    Hook { phase: HookPhase, message: String },

    #[error("Model error: {0}")]
    Model(String),

    #[error("Model request failed with status {status}: {body}")]
    ModelStatus { status: u16, body: String },

    #[error("{argument} is required for {action} action")]
    MissingArgument {
        action: &'static str,
        argument: &'static str,
    },

    #[error("Playwright not found. Install with: npx playwright install chromium")]
    BrowserNotFound,

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),
}

impl E2eError {
    /// Attach the lifecycle phase to a failure raised inside a hook
    pub fn in_phase(self, phase: HookPhase) -> Self {
        match self {
            E2eError::Hook { .. } => self,
            E2eError::HookFailed(message) => E2eError::Hook { phase, message },
            other => E2eError::Hook {
                phase,
                message: other.to_string(),
            },
        }
    }
}

pub type E2eResult<T> = Result<T, E2eError>;
