#![allow(dead_code)]

use queryspan_core::{
    get_masked_fields, get_query_span, AnalysisOptions, AnalyzeRequest, Catalog, ColumnMetadata,
    ColumnResource, DatabaseMetadata, Dialect, FunctionMetadata, MaskingLevel, QuerySpan,
    SensitiveField, SourceColumnSet, SpanError, TableMetadata, ViewMetadata,
};

/// A small shop database in the `public` schema.
pub fn catalog() -> Catalog {
    let mut db = DatabaseMetadata::new("shop");
    let public = db.schema_mut("public");
    public.tables.extend([
        TableMetadata::new("t1", ["a", "b", "c"]),
        TableMetadata::new("t2", ["a", "b", "d"]),
        TableMetadata::new("orders", ["id", "customer_id", "total", "status"]),
        TableMetadata::new("employees", ["id", "manager_id", "name"]),
        TableMetadata {
            name: "customers".into(),
            columns: vec![
                ColumnMetadata::new("id"),
                ColumnMetadata::new("name").with_masking_level(MaskingLevel::Partial),
                ColumnMetadata::new("email").with_masking_level(MaskingLevel::Full),
            ],
        },
    ]);
    public.views.extend([
        ViewMetadata::new("v_orders", "SELECT id, total FROM orders"),
        ViewMetadata::new(
            "order_summary",
            "CREATE VIEW order_summary (order_id, customer) AS \
             SELECT o.id, c.name FROM orders o JOIN customers c ON o.customer_id = c.id",
        ),
        ViewMetadata::new("cyc_a", "SELECT x FROM cyc_b"),
        ViewMetadata::new("cyc_b", "SELECT x FROM cyc_a"),
    ]);
    public.materialized_views.push(ViewMetadata::new(
        "customer_totals",
        "SELECT customer_id, sum(total) AS spent FROM orders GROUP BY customer_id",
    ));
    public
        .external_tables
        .push(TableMetadata::new("clicks", ["customer_id", "url"]));
    public.functions.push(FunctionMetadata::new(
        "customer_contacts",
        "SELECT id, email FROM customers WHERE id = $1",
    ));
    Catalog::new().with_database(db)
}

pub fn request(sql: &str) -> AnalyzeRequest {
    AnalyzeRequest::new(sql, Dialect::Postgres).with_default_database("shop")
}

pub fn request_with(sql: &str, options: AnalysisOptions) -> AnalyzeRequest {
    AnalyzeRequest {
        options: AnalysisOptions {
            default_database: "shop".into(),
            ..options
        },
        ..request(sql)
    }
}

pub fn span(sql: &str) -> Result<QuerySpan, SpanError> {
    get_query_span(&request(sql), &catalog())
}

pub fn masked(sql: &str) -> Result<Vec<SensitiveField>, SpanError> {
    get_masked_fields(&request(sql), &catalog())
}

pub fn col(table: &str, column: &str) -> ColumnResource {
    ColumnResource::new("shop", "public", table, column)
}

pub fn sources(columns: &[(&str, &str)]) -> SourceColumnSet {
    columns
        .iter()
        .map(|(table, column)| col(table, column))
        .collect()
}

pub fn names(span: &QuerySpan) -> Vec<&str> {
    span.results.iter().map(|r| r.name.as_str()).collect()
}
