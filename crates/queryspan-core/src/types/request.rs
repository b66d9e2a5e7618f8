//! Request types for the span analysis API.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::common::CaseSensitivity;

/// Iteration cap applied to recursive CTE fixpoints when none is configured.
pub const DEFAULT_MAX_FIXPOINT_ITERATIONS: usize = 1024;

/// A request to analyze one SQL statement.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeRequest {
    /// The SQL text; must contain exactly one statement
    pub sql: String,

    /// SQL dialect
    #[serde(default)]
    pub dialect: Dialect,

    /// Analysis options
    #[serde(default)]
    pub options: AnalysisOptions,
}

impl AnalyzeRequest {
    pub fn new(sql: impl Into<String>, dialect: Dialect) -> Self {
        Self {
            sql: sql.into(),
            dialect,
            options: AnalysisOptions::default(),
        }
    }

    pub fn with_default_database(mut self, database: impl Into<String>) -> Self {
        self.options.default_database = database.into();
        self
    }
}

/// Options controlling name resolution and termination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisOptions {
    /// Database used for references that do not name one
    #[serde(default)]
    pub default_database: String,

    /// Schema used for unqualified table references (dialect default when omitted)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_schema: Option<String>,

    /// Override for identifier matching (default 'dialect')
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub case_sensitivity: Option<CaseSensitivity>,

    /// Upper bound on recursive CTE fixpoint iterations
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_fixpoint_iterations: Option<usize>,
}

/// SQL dialect for parsing and analysis.
///
/// Dialects differ in syntax, identifier normalization, how multi-part names
/// map onto database and schema, and how unaliased output columns are named.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[default]
    Generic,
    Ansi,
    Bigquery,
    Clickhouse,
    Databricks,
    Duckdb,
    Hive,
    Mssql,
    Mysql,
    Postgres,
    Redshift,
    Snowflake,
    Sqlite,
}

impl Dialect {
    pub fn to_sqlparser_dialect(&self) -> Box<dyn sqlparser::dialect::Dialect> {
        use sqlparser::dialect::{
            AnsiDialect, BigQueryDialect, ClickHouseDialect, DatabricksDialect, DuckDbDialect,
            GenericDialect, HiveDialect, MsSqlDialect, MySqlDialect, PostgreSqlDialect,
            RedshiftSqlDialect, SQLiteDialect, SnowflakeDialect,
        };
        match self {
            Self::Generic => Box::new(GenericDialect {}),
            Self::Ansi => Box::new(AnsiDialect {}),
            Self::Bigquery => Box::new(BigQueryDialect {}),
            Self::Clickhouse => Box::new(ClickHouseDialect {}),
            Self::Databricks => Box::new(DatabricksDialect {}),
            Self::Duckdb => Box::new(DuckDbDialect {}),
            Self::Hive => Box::new(HiveDialect {}),
            Self::Mssql => Box::new(MsSqlDialect {}),
            Self::Mysql => Box::new(MySqlDialect {}),
            Self::Postgres => Box::new(PostgreSqlDialect {}),
            Self::Redshift => Box::new(RedshiftSqlDialect {}),
            Self::Snowflake => Box::new(SnowflakeDialect {}),
            Self::Sqlite => Box::new(SQLiteDialect {}),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_deserializes_with_defaults() {
        let request: AnalyzeRequest = serde_json::from_str(r#"{"sql": "SELECT 1"}"#).unwrap();
        assert_eq!(request.dialect, Dialect::Generic);
        assert_eq!(request.options, AnalysisOptions::default());
    }

    #[test]
    fn options_use_camel_case() {
        let request: AnalyzeRequest = serde_json::from_str(
            r#"{
                "sql": "SELECT a FROM t",
                "dialect": "postgres",
                "options": {
                    "defaultDatabase": "shop",
                    "defaultSchema": "sales",
                    "caseSensitivity": "exact",
                    "maxFixpointIterations": 8
                }
            }"#,
        )
        .unwrap();
        assert_eq!(request.dialect, Dialect::Postgres);
        assert_eq!(request.options.default_database, "shop");
        assert_eq!(request.options.default_schema.as_deref(), Some("sales"));
        assert_eq!(
            request.options.case_sensitivity,
            Some(CaseSensitivity::Exact)
        );
        assert_eq!(request.options.max_fixpoint_iterations, Some(8));
    }

    #[test]
    fn builder_sets_default_database() {
        let request = AnalyzeRequest::new("SELECT 1", Dialect::Mysql).with_default_database("db");
        assert_eq!(request.options.default_database, "db");
    }
}
