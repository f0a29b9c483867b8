//! Output formatting for the run report

use clap::ValueEnum;
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use pronto_qa_harness::{RunReport, Severity};

/// Output format
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable table format
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Print error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "❌".red(), message);
}

pub fn print_report(report: &RunReport, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(report).unwrap_or_default());
        }
        OutputFormat::Table => print_table(report),
    }
}

fn print_table(report: &RunReport) {
    if report.success {
        println!("{} full cycle passed with no findings ({} ms)", "✅".green(), report.duration_ms);
        return;
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Severity", "Location", "Description", "Impact", "Suggested remedy"]);
    for finding in &report.findings {
        table.add_row(vec![
            colorize_severity(finding.severity()),
            finding.location().to_string(),
            finding.description().to_string(),
            finding.impact().to_string(),
            finding.suggested_remedy().to_string(),
        ]);
    }
    println!("{table}");
    println!(
        "{} {} finding(s): {} critical, {} high, {} medium, {} low ({} ms)",
        "❌".red(),
        report.counts.total(),
        report.counts.critical,
        report.counts.high,
        report.counts.medium,
        report.counts.low,
        report.duration_ms,
    );
}

fn colorize_severity(severity: Severity) -> String {
    let label = severity.as_str();
    match severity {
        Severity::Critical => label.red().bold().to_string(),
        Severity::High => label.red().to_string(),
        Severity::Medium => label.yellow().to_string(),
        Severity::Low => label.blue().to_string(),
    }
}
