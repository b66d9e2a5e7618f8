//! CLI argument parsing using clap.

use clap::{Parser, ValueEnum};
use queryspan_core::{AnalysisOptions, CaseSensitivity};
use std::path::PathBuf;

/// QuerySpan - column provenance and masking analyzer
#[derive(Parser, Debug)]
#[command(name = "queryspan")]
#[command(
    about = "Trace SQL output columns back to the base-table columns they derive from",
    long_about = None
)]
#[command(version)]
pub struct Args {
    /// SQL files to analyze (reads from stdin if none provided)
    #[arg(value_name = "FILES")]
    pub files: Vec<PathBuf>,

    /// SQL dialect
    #[arg(short, long, default_value = "generic", value_enum)]
    pub dialect: DialectArg,

    /// Analysis mode
    #[arg(short, long, default_value = "span", value_enum)]
    pub mode: Mode,

    /// Output format
    #[arg(short, long, default_value = "table", value_enum)]
    pub format: OutputFormat,

    /// JSON catalog file describing databases, tables and views
    #[arg(long, value_name = "FILE", conflicts_with = "schema")]
    pub catalog: Option<PathBuf>,

    /// Schema DDL file (CREATE TABLE / CREATE VIEW) for table/column resolution
    #[arg(short, long, value_name = "FILE")]
    pub schema: Option<PathBuf>,

    /// Database used for references that do not name one
    #[arg(long, value_name = "NAME", default_value = "")]
    pub database: String,

    /// Schema used for unqualified table references
    #[arg(long, value_name = "NAME")]
    pub default_schema: Option<String>,

    /// Identifier matching for database, schema and table names
    #[arg(long, value_enum)]
    pub case_sensitivity: Option<CaseArg>,

    /// Upper bound on recursive CTE fixpoint iterations
    #[arg(long, value_name = "N")]
    pub max_iterations: Option<usize>,

    /// Output file (defaults to stdout)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Suppress warnings on stderr
    #[arg(short, long)]
    pub quiet: bool,

    /// Compact JSON output (no pretty-printing)
    #[arg(short, long)]
    pub compact: bool,
}

impl Args {
    /// Analysis options described by the command line.
    pub fn analysis_options(&self) -> AnalysisOptions {
        AnalysisOptions {
            default_database: self.database.clone(),
            default_schema: self.default_schema.clone(),
            case_sensitivity: self.case_sensitivity.map(Into::into),
            max_fixpoint_iterations: self.max_iterations,
        }
    }
}

/// SQL dialect options
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DialectArg {
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

impl From<DialectArg> for queryspan_core::Dialect {
    fn from(d: DialectArg) -> Self {
        match d {
            DialectArg::Generic => queryspan_core::Dialect::Generic,
            DialectArg::Ansi => queryspan_core::Dialect::Ansi,
            DialectArg::Bigquery => queryspan_core::Dialect::Bigquery,
            DialectArg::Clickhouse => queryspan_core::Dialect::Clickhouse,
            DialectArg::Databricks => queryspan_core::Dialect::Databricks,
            DialectArg::Duckdb => queryspan_core::Dialect::Duckdb,
            DialectArg::Hive => queryspan_core::Dialect::Hive,
            DialectArg::Mssql => queryspan_core::Dialect::Mssql,
            DialectArg::Mysql => queryspan_core::Dialect::Mysql,
            DialectArg::Postgres => queryspan_core::Dialect::Postgres,
            DialectArg::Redshift => queryspan_core::Dialect::Redshift,
            DialectArg::Snowflake => queryspan_core::Dialect::Snowflake,
            DialectArg::Sqlite => queryspan_core::Dialect::Sqlite,
        }
    }
}

/// What to compute for each output column
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    /// Base-table columns each output column derives from
    Span,
    /// Most restrictive masking level reaching each output column
    Masking,
}

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table format
    Table,
    /// JSON output
    Json,
}

/// Identifier matching options
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CaseArg {
    Lower,
    Upper,
    Exact,
}

impl From<CaseArg> for CaseSensitivity {
    fn from(c: CaseArg) -> Self {
        match c {
            CaseArg::Lower => CaseSensitivity::Lower,
            CaseArg::Upper => CaseSensitivity::Upper,
            CaseArg::Exact => CaseSensitivity::Exact,
        }
    }
}
