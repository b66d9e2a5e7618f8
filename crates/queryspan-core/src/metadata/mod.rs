//! Schema metadata consumed by the span analyzer.
//!
//! The analyzer never talks to a database directly. It asks a
//! [`MetadataProvider`] for one database at a time and caches the answer for
//! the rest of the analysis.

mod catalog;
mod ddl;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub use crate::error::MetadataError;
use crate::dialect::NormalizationStrategy;
use crate::types::MaskingLevel;
pub use catalog::Catalog;

/// A source of database metadata.
///
/// Returning `Ok(None)` means the database does not exist; any table
/// reference into it then fails to resolve.
pub trait MetadataProvider {
    fn database_metadata(
        &self,
        database: &str,
    ) -> Result<Option<Arc<DatabaseMetadata>>, MetadataError>;
}

impl<F> MetadataProvider for F
where
    F: Fn(&str) -> Result<Option<Arc<DatabaseMetadata>>, MetadataError>,
{
    fn database_metadata(
        &self,
        database: &str,
    ) -> Result<Option<Arc<DatabaseMetadata>>, MetadataError> {
        self(database)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseMetadata {
    pub name: String,
    #[serde(default)]
    pub schemas: Vec<SchemaMetadata>,
}

impl DatabaseMetadata {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            schemas: Vec::new(),
        }
    }

    pub fn schema(&self, name: &str, strategy: NormalizationStrategy) -> Option<&SchemaMetadata> {
        self.schemas
            .iter()
            .find(|schema| strategy.matches(&schema.name, name))
    }

    /// Returns the schema called `name`, creating it when missing.
    pub fn schema_mut(&mut self, name: &str) -> &mut SchemaMetadata {
        let index = match self.schemas.iter().position(|schema| schema.name == name) {
            Some(index) => index,
            None => {
                self.schemas.push(SchemaMetadata::new(name));
                self.schemas.len() - 1
            }
        };
        &mut self.schemas[index]
    }
}

/// Tables, views and table functions of one schema. Databases without
/// schemas use a single schema with an empty name.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SchemaMetadata {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub tables: Vec<TableMetadata>,
    /// Tables stored outside the database (foreign or external tables).
    #[serde(default)]
    pub external_tables: Vec<TableMetadata>,
    #[serde(default)]
    pub views: Vec<ViewMetadata>,
    #[serde(default)]
    pub materialized_views: Vec<ViewMetadata>,
    #[serde(default)]
    pub functions: Vec<FunctionMetadata>,
}

impl SchemaMetadata {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.iter().map(|table| table.name.as_str())
    }

    pub fn table(&self, name: &str, strategy: NormalizationStrategy) -> Option<&TableMetadata> {
        self.tables
            .iter()
            .find(|table| strategy.matches(&table.name, name))
    }

    pub fn view_names(&self) -> impl Iterator<Item = &str> {
        self.views.iter().map(|view| view.name.as_str())
    }

    pub fn view(&self, name: &str, strategy: NormalizationStrategy) -> Option<&ViewMetadata> {
        self.views
            .iter()
            .find(|view| strategy.matches(&view.name, name))
    }

    pub fn external_table(
        &self,
        name: &str,
        strategy: NormalizationStrategy,
    ) -> Option<&TableMetadata> {
        self.external_tables
            .iter()
            .find(|table| strategy.matches(&table.name, name))
    }

    pub fn materialized_view(
        &self,
        name: &str,
        strategy: NormalizationStrategy,
    ) -> Option<&ViewMetadata> {
        self.materialized_views
            .iter()
            .find(|view| strategy.matches(&view.name, name))
    }

    pub fn function(&self, name: &str, strategy: NormalizationStrategy) -> Option<&FunctionMetadata> {
        self.functions
            .iter()
            .find(|function| strategy.matches(&function.name, name))
    }

    /// Finds a relation readable by name: a table, an external table, a
    /// view or a materialized view, in that order.
    pub fn relation(&self, name: &str, strategy: NormalizationStrategy) -> Option<Relation<'_>> {
        self.table(name, strategy)
            .or_else(|| self.external_table(name, strategy))
            .map(Relation::Table)
            .or_else(|| self.view(name, strategy).map(Relation::View))
            .or_else(|| {
                self.materialized_view(name, strategy)
                    .map(Relation::MaterializedView)
            })
    }
}

/// A named relation found in a schema.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Relation<'a> {
    Table(&'a TableMetadata),
    View(&'a ViewMetadata),
    MaterializedView(&'a ViewMetadata),
}

impl Relation<'_> {
    pub fn name(&self) -> &str {
        match self {
            Relation::Table(table) => &table.name,
            Relation::View(view) | Relation::MaterializedView(view) => &view.name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TableMetadata {
    pub name: String,
    #[serde(default)]
    pub columns: Vec<ColumnMetadata>,
}

impl TableMetadata {
    pub fn new<I, S>(name: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            columns: columns.into_iter().map(ColumnMetadata::new).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ColumnMetadata {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub masking_level: Option<MaskingLevel>,
}

impl ColumnMetadata {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_masking_level(mut self, level: MaskingLevel) -> Self {
        self.masking_level = Some(level);
        self
    }
}

/// A stored view. The definition is the SELECT text of the view body.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ViewMetadata {
    pub name: String,
    pub definition: String,
}

impl ViewMetadata {
    pub fn new(name: impl Into<String>, definition: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            definition: definition.into(),
        }
    }
}

/// A set-returning SQL function. The definition is the SELECT text whose
/// rows the function returns.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FunctionMetadata {
    pub name: String,
    pub definition: String,
}

impl FunctionMetadata {
    pub fn new(name: impl Into<String>, definition: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            definition: definition.into(),
        }
    }
}
