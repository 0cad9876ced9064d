//! Output formatting for CLI

use clap::ValueEnum;
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Cell, Color, ContentArrangement, Table};

use aiqa_common::{RunSummary, TestStatus};

/// Output format
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable table format
    #[default]
    Table,
    /// JSON format
    Json,
    /// YAML format
    Yaml,
}

const HEADERS: [&str; 6] = ["File", "Instruction", "Status", "Turns", "Duration", "Motivation"];

/// Longest motivation shown in a table cell
const MAX_MOTIVATION: usize = 120;

/// Print the run summary in the requested format
pub fn print_summary(summary: &RunSummary, format: OutputFormat) {
    match format {
        OutputFormat::Table => {
            println!("{}", summary_table(summary));
            println!("{}", headline(summary));
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(summary).unwrap_or_default());
        }
        OutputFormat::Yaml => {
            println!("{}", serde_yaml::to_string(summary).unwrap_or_default());
        }
    }
}

/// One table row per instruction, plus one per failed file hook
pub fn summary_rows(summary: &RunSummary) -> Vec<(Vec<String>, Option<TestStatus>)> {
    let mut rows = Vec::new();
    for file in &summary.files {
        let name = file.path.display().to_string();
        if let Some(reason) = &file.setup_error {
            rows.push((hook_row(&name, "before_all", reason), None));
        }
        for test in &file.tests {
            rows.push((
                vec![
                    name.clone(),
                    test.instruction.clone(),
                    test.status.to_string(),
                    test.turns.to_string(),
                    format!("{} ms", test.duration_ms),
                    truncate(&test.motivation, MAX_MOTIVATION),
                ],
                Some(test.status),
            ));
        }
        if let Some(reason) = &file.teardown_error {
            rows.push((hook_row(&name, "after_all", reason), None));
        }
    }
    rows
}

fn hook_row(file: &str, phase: &str, reason: &str) -> Vec<String> {
    vec![
        file.to_string(),
        format!("({})", phase),
        "error".to_string(),
        "-".to_string(),
        "-".to_string(),
        truncate(reason, MAX_MOTIVATION),
    ]
}

pub fn summary_table(summary: &RunSummary) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(HEADERS.to_vec());

    for (row, status) in summary_rows(summary) {
        let color = match status {
            Some(TestStatus::Passed) => Color::Green,
            Some(TestStatus::Failed) => Color::Red,
            Some(TestStatus::Inconclusive) => Color::Yellow,
            Some(TestStatus::Error) | None => Color::Magenta,
        };
        let cells: Vec<Cell> = row
            .into_iter()
            .enumerate()
            .map(|(i, value)| {
                let cell = Cell::new(value);
                if i == 2 {
                    cell.fg(color)
                } else {
                    cell
                }
            })
            .collect();
        table.add_row(cells);
    }
    table
}

/// One-line totals, colored by outcome
pub fn headline(summary: &RunSummary) -> String {
    let mut parts = vec![
        format!("{} passed", summary.passed).green().to_string(),
        format!("{} failed", summary.failed).red().to_string(),
    ];
    if summary.inconclusive > 0 {
        parts.push(format!("{} inconclusive", summary.inconclusive).yellow().to_string());
    }
    if summary.errored > 0 {
        parts.push(format!("{} errored", summary.errored).magenta().to_string());
    }
    let file_errors = summary.file_errors();
    if file_errors > 0 {
        parts.push(format!("{} file hook error(s)", file_errors).magenta().to_string());
    }
    format!(
        "{} test(s): {} ({} ms)",
        summary.total,
        parts.join(", "),
        summary.duration_ms
    )
}

/// Number of files whose tests did not all pass
pub fn unhealthy_files(summary: &RunSummary) -> usize {
    summary
        .files
        .iter()
        .filter(|f| {
            f.setup_error.is_some()
                || f.teardown_error.is_some()
                || f.tests.iter().any(|t| t.status != TestStatus::Passed)
        })
        .count()
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max).collect();
    cut.push('…');
    cut
}

/// Print success message
pub fn print_success(message: &str) {
    println!("✅ {}", message);
}

/// Print error message
pub fn print_error(message: &str) {
    eprintln!("❌ {}", message);
}

/// Print info message
pub fn print_info(message: &str) {
    println!("ℹ️  {}", message);
}
