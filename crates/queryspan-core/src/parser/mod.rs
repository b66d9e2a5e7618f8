//! SQL front end: `sqlparser` parsing and lowering into [`crate::ast`].

mod naming;
mod translate;

use sqlparser::ast::Statement;
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;

use crate::ast;
use crate::dialect::NormalizationStrategy;
use crate::error::{ParseError, SpanError};
use crate::types::Dialect;

pub(crate) use translate::object_name_parts;
pub use translate::{split_object_name, Translator};

/// Parse SQL using the specified dialect
pub fn parse_sql_with_dialect(sql: &str, dialect: Dialect) -> Result<Vec<Statement>, ParseError> {
    let sqlparser_dialect = dialect.to_sqlparser_dialect();
    match Parser::parse_sql(sqlparser_dialect.as_ref(), sql) {
        Ok(statements) => Ok(statements),
        Err(primary_err) => {
            // Generic fails on Postgres-only operators (`::`, `->>`) that show up in
            // view definitions exported from Postgres-compatible warehouses.
            if matches!(dialect, Dialect::Generic) && looks_like_postgres_syntax(sql) {
                if let Ok(statements) = Parser::parse_sql(&PostgreSqlDialect {}, sql) {
                    return Ok(statements);
                }
            }
            Err(ParseError::from(primary_err).with_dialect(dialect))
        }
    }
}

fn looks_like_postgres_syntax(sql: &str) -> bool {
    sql.contains("::") || sql.contains("->") || sql.contains("?|") || sql.contains("?&")
}

/// Parses `sql`, which must hold exactly one statement, and lowers it.
pub fn parse_statement(
    sql: &str,
    dialect: Dialect,
    strategy: NormalizationStrategy,
) -> Result<ast::Statement, SpanError> {
    let statements = parse_sql_with_dialect(sql, dialect)?;
    match statements.as_slice() {
        [statement] => Translator::new(dialect, strategy).statement(statement),
        other => Err(SpanError::malformed(format!(
            "expected exactly one statement, found {}",
            other.len()
        ))),
    }
}
