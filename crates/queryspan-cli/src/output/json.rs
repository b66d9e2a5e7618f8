//! JSON output formatting.

use anyhow::{Context, Result};

use crate::analysis::StatementReport;

/// Format statement reports as JSON.
pub fn format_json(reports: &[StatementReport], compact: bool) -> Result<String> {
    let json = if compact {
        serde_json::to_string(reports)
    } else {
        serde_json::to_string_pretty(reports)
    };
    json.context("Failed to serialize analysis result")
}
