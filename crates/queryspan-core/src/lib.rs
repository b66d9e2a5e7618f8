pub mod analyzer;
pub mod ast;
pub mod dialect;
pub mod error;
pub mod lattice;
pub mod metadata;
pub mod parser;
pub mod types;

// Re-export main types and functions
pub use analyzer::{get_masked_fields, get_query_span, Analyzer, AnalyzerConfig};
pub use error::{MetadataError, ParseError, SpanError};
pub use lattice::Lattice;
pub use metadata::{
    Catalog, ColumnMetadata, DatabaseMetadata, FunctionMetadata, MetadataProvider, Relation,
    SchemaMetadata, TableMetadata, ViewMetadata,
};
pub use parser::{parse_sql_with_dialect, parse_statement};

pub use types::{
    // Request types
    AnalysisOptions,
    AnalyzeRequest,
    CaseSensitivity,
    Dialect,
    // Response types
    ColumnResource,
    MaskingAttributes,
    MaskingLevel,
    QuerySpan,
    QuerySpanResult,
    SensitiveField,
    SourceColumnSet,
    DEFAULT_MAX_FIXPOINT_ITERATIONS,
};
