//! Command-line arguments

use clap::Parser;
use std::path::PathBuf;

use aiqa_common::config::CONFIG_FILE_NAME;
use aiqa_common::ConfigOverrides;

use crate::output::OutputFormat;

/// AIQA - natural-language end-to-end tests driven by a computer-use model
#[derive(Parser, Debug)]
#[command(name = "aiqa")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file
    #[arg(long, default_value = CONFIG_FILE_NAME)]
    pub config: PathBuf,

    /// Model service API key
    #[arg(long, env = "ANTHROPIC_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// URL every browser session opens
    #[arg(long)]
    pub base_url: Option<String>,

    /// Model identifier
    #[arg(long)]
    pub model: Option<String>,

    /// Directory searched recursively for *.test.yaml files
    #[arg(long, conflicts_with = "test_pattern")]
    pub test_dir: Option<PathBuf>,

    /// Glob selecting test files
    #[arg(long)]
    pub test_pattern: Option<String>,

    /// Only run instructions matching this regex
    #[arg(long)]
    pub grep: Option<String>,

    /// Model request timeout in milliseconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Run test files concurrently
    #[arg(long)]
    pub parallel: bool,

    /// Max test files running at once with --parallel
    #[arg(long)]
    pub max_concurrency: Option<usize>,

    /// Max model calls per instruction
    #[arg(long)]
    pub max_turns: Option<u32>,

    /// Run the browser without a window
    #[arg(long)]
    pub headless: bool,

    /// Verbose logging
    #[arg(short, long)]
    pub debug: bool,

    /// Where test-results.json is written
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Summary format
    #[arg(long, value_enum, default_value = "table")]
    pub format: OutputFormat,
}

impl Cli {
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            api_key: self.api_key.clone(),
            base_url: self.base_url.clone(),
            model: self.model.clone(),
            test_dir: self.test_dir.clone(),
            test_pattern: self.test_pattern.clone(),
            grep: self.grep.clone(),
            timeout_ms: self.timeout,
            parallel: self.parallel,
            max_concurrency: self.max_concurrency,
            max_turns: self.max_turns,
            headless: self.headless,
            debug: self.debug,
            output_dir: self.output_dir.clone(),
        }
    }
}
