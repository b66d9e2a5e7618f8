use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{DatabaseMetadata, MetadataError, MetadataProvider};

/// In-memory metadata for any number of databases.
///
/// Deserializes from JSON of the form
/// `{"databases": [{"name": "shop", "schemas": [{"name": "", "tables": [...]}]}]}`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Catalog {
    #[serde(default)]
    pub databases: Vec<Arc<DatabaseMetadata>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn with_database(mut self, database: DatabaseMetadata) -> Self {
        self.insert(database);
        self
    }

    /// Adds `database`, replacing any database with the same name.
    pub fn insert(&mut self, database: DatabaseMetadata) {
        self.databases.retain(|existing| existing.name != database.name);
        self.databases.push(Arc::new(database));
    }

    /// Returns the database named `name`, adding an empty one if missing.
    pub fn database_mut(&mut self, name: &str) -> &mut DatabaseMetadata {
        let position = match self.databases.iter().position(|db| db.name == name) {
            Some(position) => position,
            None => {
                self.databases.push(Arc::new(DatabaseMetadata::new(name)));
                self.databases.len() - 1
            }
        };
        Arc::make_mut(&mut self.databases[position])
    }

    /// Finds a database by exact name, falling back to a case-insensitive match.
    pub fn database(&self, name: &str) -> Option<&Arc<DatabaseMetadata>> {
        self.databases
            .iter()
            .find(|db| db.name == name)
            .or_else(|| {
                self.databases
                    .iter()
                    .find(|db| db.name.eq_ignore_ascii_case(name))
            })
    }
}

impl MetadataProvider for Catalog {
    fn database_metadata(
        &self,
        database: &str,
    ) -> Result<Option<Arc<DatabaseMetadata>>, MetadataError> {
        Ok(self.database(database).cloned())
    }
}
