//! Per-dialect identifier and naming rules.
//!
//! These tables decide how identifiers compare, how multi-part object names
//! split into database/schema/table, which schema an unqualified table lives
//! in, how unaliased output columns are named, and which function arguments
//! are date-part keywords rather than column references.

use std::borrow::Cow;

use crate::types::Dialect;

/// How a dialect folds unquoted identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NormalizationStrategy {
    /// Fold to lowercase (Postgres)
    Lowercase,
    /// Fold to uppercase (Snowflake, ANSI)
    Uppercase,
    /// Compare without regard to case but keep the written form
    CaseInsensitive,
    /// Compare exactly as written
    CaseSensitive,
}

impl NormalizationStrategy {
    /// Returns true when two identifiers name the same object.
    pub fn matches(self, left: &str, right: &str) -> bool {
        match self {
            Self::CaseSensitive => left == right,
            _ => left.eq_ignore_ascii_case(right),
        }
    }

    /// Canonical form of an identifier, used for cache keys.
    pub fn normalize(self, ident: &str) -> Cow<'_, str> {
        match self {
            Self::CaseSensitive => Cow::Borrowed(ident),
            _ => Cow::Owned(ident.to_ascii_lowercase()),
        }
    }

    /// Display form of an unquoted identifier written by the user.
    pub fn fold_unquoted(self, ident: &str) -> String {
        match self {
            Self::Lowercase => ident.to_lowercase(),
            Self::Uppercase => ident.to_uppercase(),
            Self::CaseInsensitive | Self::CaseSensitive => ident.to_string(),
        }
    }
}

/// How a multi-part object name maps onto the metadata hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Namespace {
    /// `database.table`; schemas are not addressable.
    DatabaseTable,
    /// `[[database.]schema.]table`
    DatabaseSchemaTable,
}

/// How unaliased, non-column output expressions are named.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputNaming {
    /// Function name, keyword name, or `?column?` (Postgres family).
    Keyword,
    /// The expression text as written.
    ExpressionText,
}

impl Dialect {
    pub const fn normalization_strategy(&self) -> NormalizationStrategy {
        match self {
            Dialect::Bigquery => NormalizationStrategy::CaseInsensitive,
            Dialect::Clickhouse => NormalizationStrategy::CaseSensitive,
            Dialect::Databricks => NormalizationStrategy::CaseInsensitive,
            Dialect::Duckdb => NormalizationStrategy::CaseInsensitive,
            Dialect::Hive => NormalizationStrategy::CaseInsensitive,
            Dialect::Mssql => NormalizationStrategy::CaseInsensitive,
            Dialect::Mysql => NormalizationStrategy::CaseSensitive,
            Dialect::Postgres => NormalizationStrategy::Lowercase,
            Dialect::Redshift => NormalizationStrategy::CaseInsensitive,
            Dialect::Snowflake => NormalizationStrategy::Uppercase,
            Dialect::Sqlite => NormalizationStrategy::CaseInsensitive,
            Dialect::Generic => NormalizationStrategy::CaseInsensitive,
            Dialect::Ansi => NormalizationStrategy::Uppercase,
        }
    }

    pub const fn namespace(&self) -> Namespace {
        match self {
            Dialect::Mysql | Dialect::Hive | Dialect::Clickhouse => Namespace::DatabaseTable,
            _ => Namespace::DatabaseSchemaTable,
        }
    }

    /// Schema assumed for table references that do not name one.
    pub const fn default_schema(&self) -> &'static str {
        match self {
            Dialect::Postgres | Dialect::Redshift | Dialect::Duckdb => "public",
            Dialect::Mssql => "dbo",
            Dialect::Snowflake => "PUBLIC",
            _ => "",
        }
    }

    /// Schemas (databases, for [`Namespace::DatabaseTable`] dialects) that
    /// hold the engine's own catalogs.
    pub const fn system_schemas(&self) -> &'static [&'static str] {
        match self {
            Dialect::Postgres | Dialect::Redshift => {
                &["pg_catalog", "information_schema", "pg_toast"]
            }
            Dialect::Duckdb => &["pg_catalog", "information_schema"],
            Dialect::Mssql => &["sys", "information_schema"],
            Dialect::Mysql => &["mysql", "information_schema", "performance_schema", "sys"],
            Dialect::Clickhouse => &["system", "information_schema"],
            Dialect::Snowflake => &["INFORMATION_SCHEMA"],
            _ => &["information_schema"],
        }
    }

    /// Prefix of catalog tables reachable without a schema qualifier,
    /// e.g. `pg_tables` through the search path.
    pub const fn system_table_prefix(&self) -> Option<&'static str> {
        match self {
            Dialect::Postgres | Dialect::Redshift => Some("pg_"),
            _ => None,
        }
    }

    pub fn is_system_schema(&self, name: &str) -> bool {
        self.system_schemas()
            .iter()
            .any(|schema| schema.eq_ignore_ascii_case(name))
    }

    /// Whether a CTE may reference itself without the `RECURSIVE` keyword.
    pub const fn implicit_recursive_ctes(&self) -> bool {
        matches!(self, Dialect::Mssql | Dialect::Snowflake)
    }

    pub const fn output_naming(&self) -> OutputNaming {
        match self {
            Dialect::Postgres | Dialect::Redshift | Dialect::Duckdb => OutputNaming::Keyword,
            _ => OutputNaming::ExpressionText,
        }
    }
}

/// Argument positions that hold date/time unit keywords for a function.
///
/// Such arguments parse as bare identifiers (`DATEDIFF(day, a, b)`) and must
/// not be resolved as column references. Names match with underscores
/// removed so `DATEADD` and `DATE_ADD` share a rule.
pub fn skip_args_for_function(dialect: Dialect, func_name: &str) -> &'static [usize] {
    let normalized: String = func_name
        .chars()
        .filter(|c| *c != '_')
        .map(|c| c.to_ascii_lowercase())
        .collect();
    match normalized.as_str() {
        "datediff" => match dialect {
            Dialect::Mssql | Dialect::Redshift | Dialect::Snowflake => &[0],
            _ => &[],
        },
        "dateadd" => match dialect {
            Dialect::Mssql | Dialect::Snowflake => &[0],
            _ => &[],
        },
        "datepart" => match dialect {
            Dialect::Postgres | Dialect::Redshift | Dialect::Snowflake | Dialect::Mssql => &[0],
            _ => &[],
        },
        "datetrunc" => match dialect {
            Dialect::Bigquery => &[1],
            Dialect::Databricks
            | Dialect::Duckdb
            | Dialect::Postgres
            | Dialect::Redshift
            | Dialect::Snowflake => &[0],
            _ => &[],
        },
        "extract" => &[0],
        "timestampadd" | "timestampdiff" => match dialect {
            Dialect::Bigquery => &[1],
            Dialect::Snowflake | Dialect::Mysql => &[0],
            _ => &[],
        },
        "timestampsub" => match dialect {
            Dialect::Bigquery => &[1],
            _ => &[],
        },
        _ => &[],
    }
}
