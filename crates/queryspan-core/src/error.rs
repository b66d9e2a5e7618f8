//! Error types for parsing and span analysis.
//!
//! Every failure is fatal for the statement being analyzed: the engine never
//! returns a partial span. [`ParseError`] covers the SQL front end, while
//! [`SpanError`] covers everything that can go wrong while resolving the
//! statement against metadata.

use crate::types::Dialect;
use regex::Regex;
use std::fmt;
use std::sync::OnceLock;
#[cfg(feature = "tracing")]
use tracing::trace;

/// Error encountered while parsing SQL text.
#[derive(Debug, Clone)]
pub struct ParseError {
    /// Human-readable error message.
    pub message: String,
    /// Location of the error, if the parser reported one.
    pub position: Option<Position>,
    /// The dialect used for parsing.
    pub dialect: Option<Dialect>,
    pub kind: ParseErrorKind,
}

/// Line/column position of a parse error (both 1-indexed).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParseErrorKind {
    #[default]
    SyntaxError,
    MissingClause,
    UnexpectedEof,
    UnsupportedFeature,
    LexerError,
}

impl ParseError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            position: None,
            dialect: None,
            kind: ParseErrorKind::SyntaxError,
        }
    }

    pub fn with_position(message: impl Into<String>, line: usize, column: usize) -> Self {
        Self {
            position: Some(Position { line, column }),
            ..Self::new(message)
        }
    }

    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = Some(dialect);
        self
    }

    pub fn with_kind(mut self, kind: ParseErrorKind) -> Self {
        self.kind = kind;
        self
    }

    /// Extracts the `Line: X, Column: Y` suffix sqlparser appends to its messages.
    fn position_from_message(message: &str) -> Option<Position> {
        static POSITION_REGEX: OnceLock<Option<Regex>> = OnceLock::new();
        let re = POSITION_REGEX
            .get_or_init(|| Regex::new(r"Line:\s*(\d+)\s*,\s*Column:\s*(\d+)").ok())
            .as_ref()?;

        let result = re.captures(message).and_then(|caps| {
            let line = caps.get(1)?.as_str().parse().ok()?;
            let column = caps.get(2)?.as_str().parse().ok()?;
            Some(Position { line, column })
        });

        #[cfg(feature = "tracing")]
        if result.is_none() && message.contains("Line") {
            trace!("no position found in parser message: {}", message);
        }

        result
    }

    fn kind_from_message(message: &str) -> ParseErrorKind {
        let lower = message.to_lowercase();
        if lower.contains("unexpected end") || lower.contains("eof") {
            ParseErrorKind::UnexpectedEof
        } else if lower.contains("expected") {
            ParseErrorKind::MissingClause
        } else if lower.contains("not supported") || lower.contains("unsupported") {
            ParseErrorKind::UnsupportedFeature
        } else if lower.contains("lexer") || lower.contains("token") {
            ParseErrorKind::LexerError
        } else {
            ParseErrorKind::SyntaxError
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Parse error")?;

        if let Some(dialect) = self.dialect {
            write!(f, " ({dialect:?})")?;
        }

        if let Some(pos) = self.position {
            write!(f, " at line {}, column {}", pos.line, pos.column)?;
        }

        write!(f, ": {}", self.message)
    }
}

impl std::error::Error for ParseError {}

impl From<sqlparser::parser::ParserError> for ParseError {
    fn from(err: sqlparser::parser::ParserError) -> Self {
        let message = err.to_string();
        Self {
            position: Self::position_from_message(&message),
            kind: Self::kind_from_message(&message),
            dialect: None,
            message,
        }
    }
}

/// Failure reported by a [`crate::metadata::MetadataProvider`].
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct MetadataError {
    pub message: String,
}

impl MetadataError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Error produced while computing a query span or masked fields.
#[derive(Debug, thiserror::Error)]
pub enum SpanError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// A table, view, CTE, function or column reference did not resolve.
    #[error(
        "resource not found: {}",
        describe_resource(.database, .schema, .table, .column, .function)
    )]
    ResourceNotFound {
        database: Option<String>,
        schema: Option<String>,
        table: Option<String>,
        column: Option<String>,
        function: Option<String>,
    },

    /// The query is structurally invalid for span analysis.
    #[error("malformed query: {reason}")]
    MalformedQuery { reason: String },

    #[error("unsupported statement: {kind}")]
    UnsupportedStatement { kind: String },

    #[error("unsupported construct: {construct}")]
    UnsupportedConstruct { construct: String },

    /// The statement reads both system catalogs and user objects.
    #[error("cannot read user table `{user}` and system table `{system}` in the same query")]
    MixedSystemAccess { user: String, system: String },

    #[error("cyclic view definition: {}", .chain.join(" -> "))]
    CyclicViewDefinition { chain: Vec<String> },

    /// A recursive CTE did not reach a fixpoint within the iteration cap.
    #[error("recursive CTE `{cte}` did not converge after {iterations} iterations")]
    FixpointDiverged { cte: String, iterations: usize },

    #[error("failed to load metadata for database `{database}`: {source}")]
    Metadata {
        database: String,
        #[source]
        source: MetadataError,
    },
}

impl SpanError {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedQuery {
            reason: reason.into(),
        }
    }

    pub(crate) fn table_not_found(
        database: Option<&str>,
        schema: Option<&str>,
        table: &str,
    ) -> Self {
        Self::ResourceNotFound {
            database: non_empty(database),
            schema: non_empty(schema),
            table: Some(table.to_string()),
            column: None,
            function: None,
        }
    }

    pub(crate) fn column_not_found(
        database: Option<&str>,
        schema: Option<&str>,
        table: Option<&str>,
        column: &str,
    ) -> Self {
        Self::ResourceNotFound {
            database: non_empty(database),
            schema: non_empty(schema),
            table: non_empty(table),
            column: Some(column.to_string()),
            function: None,
        }
    }

    pub(crate) fn function_not_found(
        database: Option<&str>,
        schema: Option<&str>,
        function: &str,
    ) -> Self {
        Self::ResourceNotFound {
            database: non_empty(database),
            schema: non_empty(schema),
            table: None,
            column: None,
            function: Some(function.to_string()),
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.filter(|v| !v.is_empty()).map(str::to_string)
}

fn describe_resource(
    database: &Option<String>,
    schema: &Option<String>,
    table: &Option<String>,
    column: &Option<String>,
    function: &Option<String>,
) -> String {
    [database, schema, table, column]
        .into_iter()
        .flatten()
        .cloned()
        .chain(function.iter().map(|function| format!("{function}()")))
        .collect::<Vec<_>>()
        .join(".")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_from_message() {
        let msg = "Expected SELECT, found 'INSERT' at Line: 1, Column: 5";
        assert_eq!(
            ParseError::position_from_message(msg),
            Some(Position { line: 1, column: 5 })
        );
        assert_eq!(
            ParseError::position_from_message("Error at Line:12,Column:3"),
            Some(Position {
                line: 12,
                column: 3
            })
        );
    }

    #[test]
    fn test_position_missing_or_malformed() {
        assert_eq!(ParseError::position_from_message("Unexpected token"), None);
        assert_eq!(ParseError::position_from_message("Error at Line: 5"), None);
        assert_eq!(
            ParseError::position_from_message("Error at Line: -1, Column: 2"),
            None
        );
    }

    #[test]
    fn test_kind_from_message() {
        assert_eq!(
            ParseError::kind_from_message("Unexpected end of input"),
            ParseErrorKind::UnexpectedEof
        );
        assert_eq!(
            ParseError::kind_from_message("Expected SELECT keyword"),
            ParseErrorKind::MissingClause
        );
        assert_eq!(
            ParseError::kind_from_message("Something went wrong"),
            ParseErrorKind::SyntaxError
        );
    }

    #[test]
    fn test_parse_error_display() {
        let err = ParseError::with_position("Bad syntax", 1, 5).with_dialect(Dialect::Mysql);
        assert_eq!(
            err.to_string(),
            "Parse error (Mysql) at line 1, column 5: Bad syntax"
        );
    }

    #[test]
    fn test_resource_not_found_display_skips_missing_parts() {
        let err = SpanError::column_not_found(Some("shop"), None, Some("orders"), "total");
        assert_eq!(err.to_string(), "resource not found: shop.orders.total");

        let err = SpanError::table_not_found(Some(""), Some("public"), "users");
        assert_eq!(err.to_string(), "resource not found: public.users");
    }

    #[test]
    fn test_cyclic_view_display() {
        let err = SpanError::CyclicViewDefinition {
            chain: vec!["db.v1".into(), "db.v2".into(), "db.v1".into()],
        };
        assert_eq!(
            err.to_string(),
            "cyclic view definition: db.v1 -> db.v2 -> db.v1"
        );
    }

    #[test]
    fn test_metadata_error_keeps_source() {
        let err = SpanError::Metadata {
            database: "shop".into(),
            source: MetadataError::new("connection refused"),
        };
        assert!(std::error::Error::source(&err).is_some());
        assert_eq!(
            err.to_string(),
            "failed to load metadata for database `shop`: connection refused"
        );
    }

    #[test]
    fn test_missing_function_display() {
        let err = SpanError::function_not_found(Some("shop"), Some("public"), "series");
        assert_eq!(
            err.to_string(),
            "resource not found: shop.public.series()"
        );
    }
}
