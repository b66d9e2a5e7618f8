//! Metadata loading from JSON catalogs and DDL files.

use anyhow::{Context, Result};
use queryspan_core::{Catalog, Dialect};
use std::path::Path;

use crate::cli::Args;

/// Builds the catalog named on the command line.
///
/// With neither `--catalog` nor `--schema` the catalog is empty, so only
/// statements that read no tables can be analyzed.
pub fn load_catalog(args: &Args, dialect: Dialect) -> Result<Catalog> {
    if let Some(path) = &args.catalog {
        return load_catalog_json(path);
    }
    if let Some(path) = &args.schema {
        return load_catalog_ddl(path, dialect, &args.database);
    }
    Ok(Catalog::new())
}

/// Load a catalog from its JSON form.
pub fn load_catalog_json(path: &Path) -> Result<Catalog> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read catalog file: {}", path.display()))?;
    Catalog::from_json(&content)
        .with_context(|| format!("Invalid catalog file: {}", path.display()))
}

/// Load a catalog from CREATE TABLE / CREATE VIEW statements.
pub fn load_catalog_ddl(path: &Path, dialect: Dialect, database: &str) -> Result<Catalog> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read schema file: {}", path.display()))?;
    Catalog::from_ddl(&content, dialect, database)
        .with_context(|| format!("Failed to parse schema DDL: {}", path.display()))
}
