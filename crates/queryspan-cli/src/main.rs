//! QuerySpan CLI - column provenance and masking analyzer

use queryspan_cli::analysis::{self, StatementReport};
use queryspan_cli::catalog;
use queryspan_cli::cli;
use queryspan_cli::input;
use queryspan_cli::output;

use anyhow::{Context, Result};
use clap::Parser;
use std::fs;
use std::io::{self, Write};
use std::process::ExitCode;

use cli::{Args, OutputFormat};
use output::{format_json, format_table};

/// At least one statement failed to analyze.
const EXIT_FAILURE: u8 = 1;
/// Configuration error (unreadable input, invalid catalog or schema).
const EXIT_CONFIG_ERROR: u8 = 66;

fn main() -> ExitCode {
    let args = Args::parse();

    match run(args) {
        Ok(has_errors) => {
            if has_errors {
                ExitCode::from(EXIT_FAILURE)
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(e) => {
            eprintln!("queryspan: error: {e:#}");
            ExitCode::from(EXIT_CONFIG_ERROR)
        }
    }
}

fn run(args: Args) -> Result<bool> {
    let sources = input::read_input(&args.files)?;
    let dialect = args.dialect.into();
    let catalog = catalog::load_catalog(&args, dialect)?;
    let options = args.analysis_options();

    let reports = analysis::analyze_sources(&sources, dialect, &options, args.mode, &catalog);

    let output_str = match args.format {
        OutputFormat::Json => format_json(&reports, args.compact)?,
        OutputFormat::Table => format_table(&reports, args.quiet, !args.quiet),
    };

    write_output(&args.output, &output_str)?;

    if !args.quiet && args.format == OutputFormat::Json {
        print_errors_to_stderr(&reports);
    }

    Ok(reports.iter().any(StatementReport::is_error))
}

fn write_output(path: &Option<std::path::PathBuf>, content: &str) -> Result<()> {
    if let Some(path) = path {
        fs::write(path, content)
            .with_context(|| format!("Failed to write to {}", path.display()))?;
    } else {
        let mut stdout = io::stdout();
        stdout
            .write_all(content.as_bytes())
            .context("Failed to write to stdout")?;
        if !content.ends_with('\n') {
            writeln!(stdout).context("Failed to write to stdout")?;
        }
    }
    Ok(())
}

fn print_errors_to_stderr(reports: &[StatementReport]) {
    for report in reports {
        if let analysis::Outcome::Error { message } = &report.outcome {
            eprintln!(
                "queryspan: {} statement {}: {message}",
                report.source,
                report.index + 1
            );
        }
    }
}
