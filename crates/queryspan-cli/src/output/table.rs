//! Human-readable table output formatting.

use is_terminal::IsTerminal;
use owo_colors::OwoColorize;
use queryspan_core::{MaskingLevel, SourceColumnSet};
use std::fmt::Write;
use tabled::settings::Style;
use tabled::{Table, Tabled};

use crate::analysis::{Outcome, StatementReport};

#[derive(Tabled)]
struct SpanRow {
    #[tabled(rename = "Column")]
    name: String,
    #[tabled(rename = "Sources")]
    sources: String,
}

#[derive(Tabled)]
struct MaskingRow {
    #[tabled(rename = "Column")]
    name: String,
    #[tabled(rename = "Masking")]
    level: String,
}

/// Format statement reports as human-readable text with optional colors.
///
/// Skipped statements are listed only when `quiet` is false.
pub fn format_table(reports: &[StatementReport], quiet: bool, use_colors: bool) -> String {
    let colored = use_colors && std::io::stdout().is_terminal();
    let mut out = String::new();

    write_header(&mut out, colored);
    write_summary(&mut out, reports, colored);

    for report in reports {
        if quiet && matches!(report.outcome, Outcome::Skipped { .. }) {
            continue;
        }
        write_report(&mut out, report, colored);
    }

    out
}

fn write_header(out: &mut String, colored: bool) {
    let title = "QuerySpan Analysis";
    let line = "═".repeat(50);

    if colored {
        writeln!(out, "{}", title.bold()).unwrap();
        writeln!(out, "{}", line.dimmed()).unwrap();
    } else {
        writeln!(out, "{title}").unwrap();
        writeln!(out, "{line}").unwrap();
    }
}

fn write_summary(out: &mut String, reports: &[StatementReport], colored: bool) {
    let errors = reports.iter().filter(|r| r.is_error()).count();
    let skipped = reports
        .iter()
        .filter(|r| matches!(r.outcome, Outcome::Skipped { .. }))
        .count();

    let stats = format!(
        "Summary: {} statements | {} analyzed | {} skipped | {} errors",
        reports.len(),
        reports.len() - errors - skipped,
        skipped,
        errors
    );

    if colored {
        writeln!(out, "{}", stats.cyan()).unwrap();
    } else {
        writeln!(out, "{stats}").unwrap();
    }
    writeln!(out).unwrap();
}

fn write_report(out: &mut String, report: &StatementReport, colored: bool) {
    let heading = format!("{} #{}: {}", report.source, report.index + 1, report.sql);
    if colored {
        writeln!(out, "{}", heading.bold()).unwrap();
    } else {
        writeln!(out, "{heading}").unwrap();
    }

    match &report.outcome {
        Outcome::Span(span) => {
            let rows = span.results.iter().map(|result| SpanRow {
                name: result.name.clone(),
                sources: join_sources(&result.provenance),
            });
            writeln!(out, "{}", Table::new(rows).with(Style::psql())).unwrap();
            if !span.source_columns.is_empty() {
                writeln!(out, "Reads: {}", join_sources(&span.source_columns)).unwrap();
            }
        }
        Outcome::Masking { fields } => {
            let rows = fields.iter().map(|field| MaskingRow {
                name: field.name.clone(),
                level: level_label(field.masking_attributes.masking_level, colored),
            });
            writeln!(out, "{}", Table::new(rows).with(Style::psql())).unwrap();
        }
        Outcome::Skipped { reason } => {
            let label = if colored {
                "SKIP".yellow().to_string()
            } else {
                "SKIP".to_string()
            };
            writeln!(out, "  [{label}] {reason}").unwrap();
        }
        Outcome::Error { message } => {
            let label = if colored {
                "ERROR".red().to_string()
            } else {
                "ERROR".to_string()
            };
            writeln!(out, "  [{label}] {message}").unwrap();
        }
    }
    writeln!(out).unwrap();
}

fn join_sources(sources: &SourceColumnSet) -> String {
    if sources.is_empty() {
        return "-".to_string();
    }
    sources
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn level_label(level: MaskingLevel, colored: bool) -> String {
    let label = match level {
        MaskingLevel::None => "none",
        MaskingLevel::Partial => "partial",
        MaskingLevel::Full => "full",
    };
    if !colored {
        return label.to_string();
    }
    match level {
        MaskingLevel::None => label.green().to_string(),
        MaskingLevel::Partial => label.yellow().to_string(),
        MaskingLevel::Full => label.red().to_string(),
    }
}
