//! AIQA CLI - Main Entry Point
//!
//! Loads configuration, discovers test files, runs them, and writes
//! `test-results.json`. Exit status is 0 once the run completes, whatever
//! the individual verdicts; 1 for configuration or discovery errors; 2 for
//! anything else that stops the run.

use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use aiqa_cli::args::Cli;
use aiqa_cli::output::{self, OutputFormat};
use aiqa_common::AiqaConfig;
use aiqa_e2e::{
    load_test_files, AnthropicClient, E2eError, PlaywrightConfig, PlaywrightLauncher,
    TestScheduler,
};

enum Failure {
    /// Bad configuration or nothing to run
    Setup(anyhow::Error),
    Fatal(anyhow::Error),
}

impl From<E2eError> for Failure {
    fn from(e: E2eError) -> Self {
        Failure::Fatal(e.into())
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(Failure::Setup(e)) => {
            output::print_error(&format!("{:#}", e));
            ExitCode::from(1)
        }
        Err(Failure::Fatal(e)) => {
            output::print_error(&format!("{:#}", e));
            ExitCode::from(2)
        }
    }
}

fn init_logging(debug: bool) {
    let log_level = if debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)),
        )
        .with_target(false)
        .init();
}

fn resolve_config(cli: &Cli) -> Result<AiqaConfig, Failure> {
    let config = AiqaConfig::load(&cli.config)
        .map_err(|e| Failure::Setup(anyhow::Error::new(e).context("failed to load configuration")))?
        .apply(cli.overrides());
    config.validate().map_err(|e| Failure::Setup(e.into()))?;
    Ok(config)
}

async fn run(cli: Cli) -> Result<(), Failure> {
    let format = cli.format;

    // The file may turn on debug logging, so it is read before the subscriber exists
    let resolved = resolve_config(&cli);
    let debug_enabled = cli.debug || resolved.as_ref().map(|c| c.debug).unwrap_or(false);
    init_logging(debug_enabled);
    let config = resolved?;

    if cli.config.exists() {
        info!("Loaded configuration from {}", cli.config.display());
    } else {
        info!("No {} found, using defaults", cli.config.display());
    }
    if config.debug {
        debug!("Resolved configuration: {:#?}", config.redacted());
    }

    let files = load_test_files(&config).map_err(|e| Failure::Setup(e.into()))?;
    let total: usize = files.iter().map(|f| f.suite.tests().len()).sum();
    if total == 0 {
        output::print_info("No tests matched; nothing to run");
        return Ok(());
    }

    let model = Arc::new(AnthropicClient::from_config(&config)?);
    let launcher = Arc::new(PlaywrightLauncher::new(PlaywrightConfig::from_config(&config))?);
    let config = Arc::new(config);
    let scheduler = TestScheduler::new(config.clone(), launcher, model);

    let summary = scheduler.run_all(files).await;

    let path = summary
        .write_results(&config.output_dir)
        .map_err(|e| Failure::Fatal(anyhow::Error::new(e).context("failed to write results")))?;
    info!("Results written to: {}", path.display());

    output::print_summary(&summary, format);
    if matches!(format, OutputFormat::Table) {
        match output::unhealthy_files(&summary) {
            0 => output::print_success("All tests passed"),
            n => output::print_info(&format!("{} file(s) with failing tests", n)),
        }
    }
    Ok(())
}
