//! Run configuration
//!
//! Settings are read from `aiqa.toml` (when present), then overridden by
//! command-line values, then validated once. The validated value is handed
//! to the runner by value; nothing looks configuration up globally.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Default configuration file name, looked up in the working directory
pub const CONFIG_FILE_NAME: &str = "aiqa.toml";

/// Default model service endpoint
pub const DEFAULT_API_URL: &str = "https://api.anthropic.com";

/// Default model identifier
pub const DEFAULT_MODEL: &str = "claude-3-5-sonnet-20241022";

/// Default max tokens per model call
pub const DEFAULT_MAX_TOKENS: u32 = 1024;

/// Default number of test files run at once in parallel mode
pub const DEFAULT_MAX_CONCURRENCY: usize = 4;

/// Default cap on model calls per conversation
pub const DEFAULT_MAX_TURNS: u32 = 50;

/// Default browser viewport
pub const DEFAULT_SCREEN_WIDTH: u32 = 1280;
pub const DEFAULT_SCREEN_HEIGHT: u32 = 800;

/// Default screenshot directory
pub const DEFAULT_SCREENSHOTS_DIR: &str = ".aiqa/screenshots";

/// Default directory for result files
pub const DEFAULT_OUTPUT_DIR: &str = ".aiqa";

/// Full run configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AiqaConfig {
    /// Model service API key
    pub api_key: String,

    /// Model service endpoint
    pub api_url: String,

    /// Model identifier
    pub model: String,

    /// Max tokens per model call
    pub max_tokens: u32,

    /// Page every browser session starts on
    pub base_url: String,

    /// Run the browser without a window
    pub headless: bool,

    /// Directory searched recursively for test files
    pub test_dir: Option<PathBuf>,

    /// Glob pattern selecting test files
    pub test_pattern: Option<String>,

    /// Regex; only instructions matching it run
    pub grep: Option<String>,

    /// Per-request timeout for model calls (milliseconds)
    pub timeout_ms: Option<u64>,

    /// Run test files concurrently
    pub parallel: bool,

    /// Max test files running at once when `parallel` is set
    pub max_concurrency: usize,

    /// Max model calls per conversation
    pub max_turns: u32,

    /// Verbose logging
    pub debug: bool,

    /// Browser viewport width in pixels
    pub screen_width: u32,

    /// Browser viewport height in pixels
    pub screen_height: u32,

    /// Where screenshots are written
    pub screenshots_dir: PathBuf,

    /// Where `test-results.json` is written
    pub output_dir: PathBuf,
}

impl Default for AiqaConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_url: DEFAULT_API_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            base_url: String::new(),
            headless: false,
            test_dir: None,
            test_pattern: None,
            grep: None,
            timeout_ms: None,
            parallel: false,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            max_turns: DEFAULT_MAX_TURNS,
            debug: false,
            screen_width: DEFAULT_SCREEN_WIDTH,
            screen_height: DEFAULT_SCREEN_HEIGHT,
            screenshots_dir: PathBuf::from(DEFAULT_SCREENSHOTS_DIR),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
        }
    }
}

/// Values supplied on the command line; `None` keeps the file value
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub test_dir: Option<PathBuf>,
    pub test_pattern: Option<String>,
    pub grep: Option<String>,
    pub timeout_ms: Option<u64>,
    pub parallel: bool,
    pub max_concurrency: Option<usize>,
    pub max_turns: Option<u32>,
    pub headless: bool,
    pub debug: bool,
    pub output_dir: Option<PathBuf>,
}

impl AiqaConfig {
    /// Load configuration from file, or defaults if the file is absent
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Ok(toml::from_str(&content)?)
        } else {
            Ok(Self::default())
        }
    }

    /// Parse configuration from a TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Apply command-line overrides on top of the loaded values
    pub fn apply(mut self, overrides: ConfigOverrides) -> Self {
        if let Some(key) = overrides.api_key {
            self.api_key = key;
        }
        if let Some(url) = overrides.base_url {
            self.base_url = url;
        }
        if let Some(model) = overrides.model {
            self.model = model;
        }

        // The two selectors are exclusive; a pattern on the command line wins
        match (overrides.test_dir, overrides.test_pattern) {
            (_, Some(pattern)) => {
                self.test_pattern = Some(pattern);
                self.test_dir = None;
            }
            (Some(dir), None) => {
                self.test_dir = Some(dir);
                self.test_pattern = None;
            }
            (None, None) => {}
        }

        if let Some(grep) = overrides.grep {
            self.grep = Some(grep);
        }
        if let Some(timeout) = overrides.timeout_ms {
            self.timeout_ms = Some(timeout);
        }
        if overrides.parallel {
            self.parallel = true;
        }
        if let Some(n) = overrides.max_concurrency {
            self.max_concurrency = n;
        }
        if let Some(n) = overrides.max_turns {
            self.max_turns = n;
        }
        if overrides.headless {
            self.headless = true;
        }
        if overrides.debug {
            self.debug = true;
        }
        if let Some(dir) = overrides.output_dir {
            self.output_dir = dir;
        }
        self
    }

    /// Check that the configuration can drive a run
    pub fn validate(&self) -> Result<()> {
        match (&self.test_dir, &self.test_pattern) {
            (None, None) => {
                return Err(Error::InvalidConfig(
                    "either test_pattern or test_dir must be provided".to_string(),
                ))
            }
            (Some(_), Some(_)) => {
                return Err(Error::InvalidConfig(
                    "only one of test_pattern or test_dir may be provided".to_string(),
                ))
            }
            _ => {}
        }

        if self.api_key.trim().is_empty() {
            return Err(Error::InvalidConfig(format!(
                "API key is required; set api_key in {} or pass --api-key",
                CONFIG_FILE_NAME
            )));
        }
        if self.base_url.trim().is_empty() {
            return Err(Error::InvalidConfig(format!(
                "base URL is required; set base_url in {} or pass --base-url",
                CONFIG_FILE_NAME
            )));
        }
        if let Some(dir) = &self.test_dir {
            if !dir.is_dir() {
                return Err(Error::InvalidConfig(format!(
                    "test directory {} does not exist",
                    dir.display()
                )));
            }
        }
        if self.max_concurrency == 0 {
            return Err(Error::InvalidConfig("max_concurrency must be at least 1".to_string()));
        }
        if self.max_turns == 0 {
            return Err(Error::InvalidConfig("max_turns must be at least 1".to_string()));
        }
        if let Some(grep) = &self.grep {
            regex::Regex::new(grep)
                .map_err(|e| Error::InvalidConfig(format!("invalid grep pattern '{}': {}", grep, e)))?;
        }

        Ok(())
    }

    /// Copy with the API key masked, for logging
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if !copy.api_key.is_empty() {
            let visible: String = copy.api_key.chars().take(4).collect();
            copy.api_key = format!("{}…", visible);
        }
        copy
    }
}
