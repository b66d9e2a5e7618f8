//! Catalogs built from DDL scripts.

use sqlparser::ast::Statement;

#[cfg(feature = "tracing")]
use tracing::debug;

use super::{Catalog, ColumnMetadata, SchemaMetadata, TableMetadata, ViewMetadata};
use crate::analyzer::Analyzer;
use crate::ast;
use crate::error::SpanError;
use crate::parser::{object_name_parts, parse_sql_with_dialect, split_object_name, Translator};
use crate::types::{AnalysisOptions, Dialect, SourceColumnSet};

impl Catalog {
    /// Builds a catalog from `CREATE TABLE` and `CREATE VIEW` statements,
    /// including their `EXTERNAL` and `MATERIALIZED` forms.
    ///
    /// Objects land in `default_database` unless their name says otherwise,
    /// and in the dialect's default schema when no schema is named. Columns
    /// of `CREATE TABLE ... AS SELECT` come from analyzing the query against
    /// the statements before it. Other statements are ignored.
    pub fn from_ddl(sql: &str, dialect: Dialect, default_database: &str) -> Result<Self, SpanError> {
        let translator = Translator::new(dialect, dialect.normalization_strategy());
        let mut catalog = Catalog::new();

        for statement in parse_sql_with_dialect(sql, dialect)? {
            match &statement {
                Statement::CreateTable(create) => {
                    let columns = match &create.query {
                        Some(query) if create.columns.is_empty() => {
                            let query = translator.query(query)?;
                            catalog.query_columns(query, dialect, default_database)?
                        }
                        _ => create
                            .columns
                            .iter()
                            .map(|column| ColumnMetadata {
                                name: column.name.value.clone(),
                                data_type: Some(column.data_type.to_string()),
                                masking_level: None,
                            })
                            .collect(),
                    };
                    let name = split_object_name(object_name_parts(&create.name), dialect)?;
                    let schema = catalog.schema_for(&name, dialect, default_database);
                    let tables = if create.external {
                        &mut schema.external_tables
                    } else {
                        &mut schema.tables
                    };
                    tables.retain(|table| table.name != name.name);
                    tables.push(TableMetadata {
                        name: name.name,
                        columns,
                    });
                }
                Statement::CreateView {
                    name, materialized, ..
                } => {
                    let name = split_object_name(object_name_parts(name), dialect)?;
                    let schema = catalog.schema_for(&name, dialect, default_database);
                    let views = if *materialized {
                        &mut schema.materialized_views
                    } else {
                        &mut schema.views
                    };
                    views.retain(|view| view.name != name.name);
                    views.push(ViewMetadata::new(name.name, statement.to_string()));
                }
                _other => {
                    #[cfg(feature = "tracing")]
                    debug!(statement = %_other, "ignoring non-DDL statement");
                }
            }
        }
        Ok(catalog)
    }

    fn schema_for(
        &mut self,
        name: &ast::ObjectName,
        dialect: Dialect,
        default_database: &str,
    ) -> &mut SchemaMetadata {
        let database = name.database.as_deref().unwrap_or(default_database);
        let schema = name.schema.as_deref().unwrap_or(dialect.default_schema());
        self.database_mut(database).schema_mut(schema)
    }

    fn query_columns(
        &self,
        query: ast::Query,
        dialect: Dialect,
        default_database: &str,
    ) -> Result<Vec<ColumnMetadata>, SpanError> {
        let options = AnalysisOptions {
            default_database: default_database.to_string(),
            ..AnalysisOptions::default()
        };
        let analyzer = Analyzer::<SourceColumnSet>::new(self, dialect, &options);
        Ok(analyzer
            .analyze(&ast::Statement::Query(Box::new(query)))?
            .into_iter()
            .map(|column| ColumnMetadata::new(column.name))
            .collect())
    }
}
