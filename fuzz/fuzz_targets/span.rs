#![no_main]

use libfuzzer_sys::fuzz_target;
use queryspan_core::{
    get_masked_fields, get_query_span, AnalyzeRequest, Catalog, DatabaseMetadata, Dialect,
    TableMetadata, ViewMetadata,
};

fuzz_target!(|data: &[u8]| {
    if let Ok(sql) = std::str::from_utf8(data) {
        let mut db = DatabaseMetadata::new("db");
        let schema = db.schema_mut("");
        schema.tables.push(TableMetadata::new("t", ["a", "b"]));
        schema.views.push(ViewMetadata::new("v", "SELECT a FROM t"));
        let catalog = Catalog::new().with_database(db);

        let request = AnalyzeRequest::new(sql, Dialect::Generic).with_default_database("db");
        let _ = get_query_span(&request, &catalog);
        let _ = get_masked_fields(&request, &catalog);
    }
});
