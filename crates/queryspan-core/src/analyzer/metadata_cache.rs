//! Per-analysis metadata cache.

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;

use crate::dialect::NormalizationStrategy;
use crate::error::SpanError;
use crate::metadata::{DatabaseMetadata, MetadataProvider, SchemaMetadata};

/// Memoizes provider lookups for the lifetime of one analysis, including
/// negative answers.
pub(crate) struct MetadataCache<'p> {
    provider: &'p dyn MetadataProvider,
    strategy: NormalizationStrategy,
    databases: RefCell<HashMap<String, Option<Arc<DatabaseMetadata>>>>,
}

impl<'p> MetadataCache<'p> {
    pub fn new(provider: &'p dyn MetadataProvider, strategy: NormalizationStrategy) -> Self {
        Self {
            provider,
            strategy,
            databases: RefCell::new(HashMap::new()),
        }
    }

    pub fn database(&self, name: &str) -> Result<Option<Arc<DatabaseMetadata>>, SpanError> {
        let key = self.strategy.normalize(name).into_owned();
        if let Some(cached) = self.databases.borrow().get(&key) {
            return Ok(cached.clone());
        }
        let loaded = self
            .provider
            .database_metadata(name)
            .map_err(|source| SpanError::Metadata {
                database: name.to_string(),
                source,
            })?;
        self.databases.borrow_mut().insert(key, loaded.clone());
        Ok(loaded)
    }

    /// Finds the schema a table reference points into.
    ///
    /// When the reference names no schema and the default schema is absent,
    /// the unnamed schema is used, so catalogs for schema-less engines work
    /// under any dialect.
    pub fn schema<'d>(
        &self,
        database: &'d DatabaseMetadata,
        schema: Option<&str>,
        default_schema: &str,
    ) -> Option<&'d SchemaMetadata> {
        match schema {
            Some(schema) => database.schema(schema, self.strategy),
            None => database
                .schema(default_schema, self.strategy)
                .or_else(|| database.schema("", self.strategy)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::MetadataError;
    use std::cell::Cell;

    #[test]
    fn provider_is_called_once_per_database() {
        let calls = Cell::new(0);
        let provider = |name: &str| -> Result<Option<Arc<DatabaseMetadata>>, MetadataError> {
            calls.set(calls.get() + 1);
            Ok((name == "shop").then(|| Arc::new(DatabaseMetadata::new("shop"))))
        };
        let cache = MetadataCache::new(&provider, NormalizationStrategy::CaseInsensitive);

        assert!(cache.database("shop").unwrap().is_some());
        assert!(cache.database("SHOP").unwrap().is_some());
        assert!(cache.database("missing").unwrap().is_none());
        assert!(cache.database("missing").unwrap().is_none());
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn provider_errors_name_the_database() {
        let provider = |_: &str| -> Result<Option<Arc<DatabaseMetadata>>, MetadataError> {
            Err(MetadataError::new("timeout"))
        };
        let cache = MetadataCache::new(&provider, NormalizationStrategy::CaseInsensitive);
        let err = cache.database("shop").unwrap_err();
        assert!(matches!(err, SpanError::Metadata { ref database, .. } if database == "shop"));
    }

    #[test]
    fn missing_default_schema_falls_back_to_unnamed() {
        let mut db = DatabaseMetadata::new("shop");
        db.schema_mut("");
        let provider = |_: &str| -> Result<Option<Arc<DatabaseMetadata>>, MetadataError> { Ok(None) };
        let cache = MetadataCache::new(&provider, NormalizationStrategy::CaseInsensitive);

        assert!(cache.schema(&db, None, "public").is_some());
        assert!(cache.schema(&db, Some("public"), "public").is_none());
    }
}
