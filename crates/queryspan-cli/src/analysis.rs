//! Per-statement analysis of SQL sources.

use queryspan_core::{
    get_masked_fields, get_query_span, parse_sql_with_dialect, AnalysisOptions, AnalyzeRequest,
    Dialect, MetadataProvider, QuerySpan, SensitiveField, SpanError,
};
use serde::Serialize;

use crate::cli::Mode;
use crate::input::SqlSource;

/// Analysis outcome of one statement.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatementReport {
    /// Name of the file (or [`STDIN_NAME`](crate::input::STDIN_NAME)) the statement came from
    pub source: String,
    /// Zero-based position of the statement within its source
    pub index: usize,
    pub sql: String,
    pub outcome: Outcome,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum Outcome {
    Span(QuerySpan),
    Masking { fields: Vec<SensitiveField> },
    /// Statements that are not queries, e.g. DDL or DML
    Skipped { reason: String },
    Error { message: String },
}

impl StatementReport {
    pub fn is_error(&self) -> bool {
        matches!(self.outcome, Outcome::Error { .. })
    }
}

/// Splits each source into statements and analyzes them one at a time.
///
/// A source that fails to parse yields a single error report covering the
/// whole text.
pub fn analyze_sources(
    sources: &[SqlSource],
    dialect: Dialect,
    options: &AnalysisOptions,
    mode: Mode,
    provider: &dyn MetadataProvider,
) -> Vec<StatementReport> {
    let mut reports = Vec::new();
    for source in sources {
        let statements = match parse_sql_with_dialect(&source.content, dialect) {
            Ok(statements) => statements,
            Err(err) => {
                reports.push(StatementReport {
                    source: source.name.clone(),
                    index: 0,
                    sql: source.content.trim().to_string(),
                    outcome: Outcome::Error {
                        message: err.to_string(),
                    },
                });
                continue;
            }
        };

        for (index, statement) in statements.iter().enumerate() {
            let request = AnalyzeRequest {
                sql: statement.to_string(),
                dialect,
                options: options.clone(),
            };
            let outcome = analyze_statement(&request, mode, provider);
            reports.push(StatementReport {
                source: source.name.clone(),
                index,
                sql: request.sql,
                outcome,
            });
        }
    }
    reports
}

fn analyze_statement(
    request: &AnalyzeRequest,
    mode: Mode,
    provider: &dyn MetadataProvider,
) -> Outcome {
    let result = match mode {
        Mode::Span => get_query_span(request, provider).map(Outcome::Span),
        Mode::Masking => {
            get_masked_fields(request, provider).map(|fields| Outcome::Masking { fields })
        }
    };
    match result {
        Ok(outcome) => outcome,
        Err(err @ SpanError::UnsupportedStatement { .. }) => Outcome::Skipped {
            reason: err.to_string(),
        },
        Err(err) => Outcome::Error {
            message: err.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use queryspan_core::{Catalog, DatabaseMetadata, MaskingLevel, TableMetadata};

    fn catalog() -> Catalog {
        let mut db = DatabaseMetadata::new("shop");
        let mut customers = TableMetadata::new("customers", ["id", "email"]);
        customers.columns[1].masking_level = Some(MaskingLevel::Full);
        let schema = db.schema_mut("");
        schema.tables.push(TableMetadata::new("orders", ["id", "total"]));
        schema.tables.push(customers);
        Catalog::new().with_database(db)
    }

    fn options() -> AnalysisOptions {
        AnalysisOptions {
            default_database: "shop".into(),
            ..AnalysisOptions::default()
        }
    }

    fn source(content: &str) -> SqlSource {
        SqlSource::new("query.sql", content)
    }

    #[test]
    fn test_statements_are_analyzed_separately() {
        let reports = analyze_sources(
            &[source("SELECT id FROM orders; SELECT total FROM orders")],
            Dialect::Generic,
            &options(),
            Mode::Span,
            &catalog(),
        );
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[1].index, 1);
        let Outcome::Span(span) = &reports[1].outcome else {
            panic!("expected span, got {:?}", reports[1].outcome);
        };
        assert_eq!(span.results[0].name, "total");
    }

    #[test]
    fn test_non_queries_are_skipped() {
        let reports = analyze_sources(
            &[source("DELETE FROM orders")],
            Dialect::Generic,
            &options(),
            Mode::Span,
            &catalog(),
        );
        assert!(matches!(reports[0].outcome, Outcome::Skipped { .. }));
        assert!(!reports[0].is_error());
    }

    #[test]
    fn test_unknown_table_is_an_error() {
        let reports = analyze_sources(
            &[source("SELECT id FROM nowhere")],
            Dialect::Generic,
            &options(),
            Mode::Span,
            &catalog(),
        );
        assert!(reports[0].is_error());
    }

    #[test]
    fn test_parse_failure_reports_whole_source() {
        let reports = analyze_sources(
            &[source("SELECT * FROM (")],
            Dialect::Generic,
            &options(),
            Mode::Span,
            &catalog(),
        );
        assert_eq!(reports.len(), 1);
        assert!(reports[0].is_error());
    }

    #[test]
    fn test_masking_mode() {
        let reports = analyze_sources(
            &[source("SELECT id, email FROM customers")],
            Dialect::Generic,
            &options(),
            Mode::Masking,
            &catalog(),
        );
        let Outcome::Masking { fields } = &reports[0].outcome else {
            panic!("expected masking, got {:?}", reports[0].outcome);
        };
        assert_eq!(fields[0].masking_attributes.masking_level, MaskingLevel::None);
        assert_eq!(fields[1].masking_attributes.masking_level, MaskingLevel::Full);
    }

    #[test]
    fn test_report_json_shape() {
        let reports = analyze_sources(
            &[source("SELECT id FROM orders")],
            Dialect::Generic,
            &options(),
            Mode::Span,
            &catalog(),
        );
        let json = serde_json::to_value(&reports[0]).unwrap();
        assert_eq!(json["source"], "query.sql");
        assert_eq!(json["outcome"]["status"], "span");
        assert_eq!(json["outcome"]["results"][0]["name"], "id");
    }
}
