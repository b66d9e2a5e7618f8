//! The span analysis engine.
//!
//! [`Analyzer`] walks one neutral-AST statement and computes, for every
//! output column, a lattice value built from the base columns that feed it.
//! The engine is generic over [`Lattice`]; [`get_query_span`] instantiates it
//! with source-column sets and [`get_masked_fields`] with masking attributes.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;

#[cfg(feature = "tracing")]
use tracing::info_span;

use crate::ast;
use crate::dialect::NormalizationStrategy;
use crate::error::SpanError;
use crate::lattice::Lattice;
use crate::metadata::MetadataProvider;
use crate::parser::parse_statement;
use crate::types::{
    AnalysisOptions, AnalyzeRequest, Dialect, MaskingAttributes, QuerySpan, QuerySpanResult,
    SensitiveField, SourceColumnSet, DEFAULT_MAX_FIXPOINT_ITERATIONS,
};

mod access;
mod column;
mod cte;
mod expression;
mod join;
mod metadata_cache;
mod resolver;
mod scope;
mod table_source;

use metadata_cache::MetadataCache;
use scope::Scope;
pub use table_source::{PhysicalTable, PhysicalView, PseudoTable, TableSource};

/// Computes column provenance for the single statement in `request`.
pub fn get_query_span(
    request: &AnalyzeRequest,
    provider: &dyn MetadataProvider,
) -> Result<QuerySpan, SpanError> {
    #[cfg(feature = "tracing")]
    let _span = info_span!("get_query_span", dialect = ?request.dialect).entered();

    let analyzer = Analyzer::<SourceColumnSet>::new(provider, request.dialect, &request.options);
    let statement = parse_statement(&request.sql, request.dialect, analyzer.config.strategy)?;
    let results = analyzer.analyze(&statement)?;
    let source_columns = analyzer.access_tables(&statement)?;
    Ok(QuerySpan {
        results,
        source_columns,
    })
}

/// Computes the aggregated masking attributes of every output column.
pub fn get_masked_fields(
    request: &AnalyzeRequest,
    provider: &dyn MetadataProvider,
) -> Result<Vec<SensitiveField>, SpanError> {
    #[cfg(feature = "tracing")]
    let _span = info_span!("get_masked_fields", dialect = ?request.dialect).entered();

    let analyzer = Analyzer::<MaskingAttributes>::new(provider, request.dialect, &request.options);
    let statement = parse_statement(&request.sql, request.dialect, analyzer.config.strategy)?;
    Ok(analyzer
        .analyze(&statement)?
        .into_iter()
        .map(SensitiveField::from)
        .collect())
}

/// Settings derived from the dialect and [`AnalysisOptions`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyzerConfig {
    pub dialect: Dialect,
    pub strategy: NormalizationStrategy,
    pub default_database: String,
    pub default_schema: String,
    pub max_fixpoint_iterations: usize,
}

impl AnalyzerConfig {
    pub fn new(dialect: Dialect, options: &AnalysisOptions) -> Self {
        Self {
            dialect,
            strategy: options
                .case_sensitivity
                .unwrap_or_default()
                .resolve(dialect),
            default_database: options.default_database.clone(),
            default_schema: options
                .default_schema
                .clone()
                .unwrap_or_else(|| dialect.default_schema().to_string()),
            max_fixpoint_iterations: options
                .max_fixpoint_iterations
                .unwrap_or(DEFAULT_MAX_FIXPOINT_ITERATIONS),
        }
    }
}

/// What a stored definition belongs to. Views and functions live in
/// separate namespaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum DefinitionKind {
    View,
    Function,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ViewKey {
    kind: DefinitionKind,
    database: String,
    schema: String,
    view: String,
}

impl fmt::Display for ViewKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.schema.is_empty() {
            write!(f, "{}.{}", self.database, self.view)?;
        } else {
            write!(f, "{}.{}.{}", self.database, self.schema, self.view)?;
        }
        match self.kind {
            DefinitionKind::View => Ok(()),
            DefinitionKind::Function => f.write_str("()"),
        }
    }
}

/// One analysis over one statement.
///
/// The analyzer owns the metadata cache, the memo of resolved views and the
/// chain of views currently being resolved. Create a new analyzer for each
/// top-level statement; it is not meant to be shared between threads.
pub struct Analyzer<'p, L: Lattice> {
    config: AnalyzerConfig,
    cache: MetadataCache<'p>,
    views: RefCell<HashMap<ViewKey, Vec<QuerySpanResult<L>>>>,
    resolving: RefCell<Vec<ViewKey>>,
}

impl<'p, L: Lattice> Analyzer<'p, L> {
    pub fn new(
        provider: &'p dyn MetadataProvider,
        dialect: Dialect,
        options: &AnalysisOptions,
    ) -> Self {
        let config = AnalyzerConfig::new(dialect, options);
        Self {
            cache: MetadataCache::new(provider, config.strategy),
            config,
            views: RefCell::new(HashMap::new()),
            resolving: RefCell::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Returns the output columns of `statement` in order.
    ///
    /// EXPLAIN and queries over system catalogs only yield no columns.
    /// Statements other than queries and CREATE VIEW fail with
    /// [`SpanError::UnsupportedStatement`].
    pub fn analyze(
        &self,
        statement: &ast::Statement,
    ) -> Result<Vec<QuerySpanResult<L>>, SpanError> {
        match statement {
            ast::Statement::Explain => Ok(Vec::new()),
            ast::Statement::Unsupported { kind } => Err(SpanError::UnsupportedStatement {
                kind: kind.clone(),
            }),
            other if self.reads_only_system_tables(other)? => Ok(Vec::new()),
            other => Ok(self.resolve_statement(other, &self.root_scope())?.columns),
        }
    }

    fn root_scope(&self) -> Scope<L> {
        Scope::root(&self.config.default_database, &self.config.default_schema)
    }

    fn resolve_statement(
        &self,
        statement: &ast::Statement,
        scope: &Scope<L>,
    ) -> Result<PseudoTable<L>, SpanError> {
        match statement {
            ast::Statement::Query(query) => self.resolve_query(query, scope),
            ast::Statement::CreateView(view) => {
                let mut table = self.resolve_query(&view.query, scope)?;
                table.name = view.name.name.clone();
                table.rename_columns(&view.column_aliases, &view.name.name)?;
                Ok(table)
            }
            ast::Statement::Explain | ast::Statement::Unsupported { .. } => Err(
                SpanError::malformed("expected a query or CREATE VIEW statement"),
            ),
        }
    }
}
