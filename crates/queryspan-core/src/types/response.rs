//! Response types for the span analysis API.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use super::common::MaskingLevel;

/// A base-table column, or a whole table when `column` is empty.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "camelCase")]
pub struct ColumnResource {
    pub database: String,
    #[serde(default)]
    pub schema: String,
    pub table: String,
    #[serde(default)]
    pub column: String,
}

impl ColumnResource {
    pub fn new(
        database: impl Into<String>,
        schema: impl Into<String>,
        table: impl Into<String>,
        column: impl Into<String>,
    ) -> Self {
        Self {
            database: database.into(),
            schema: schema.into(),
            table: table.into(),
            column: column.into(),
        }
    }

    /// A resource naming a table rather than one of its columns.
    pub fn table(
        database: impl Into<String>,
        schema: impl Into<String>,
        table: impl Into<String>,
    ) -> Self {
        Self::new(database, schema, table, "")
    }
}

impl fmt::Display for ColumnResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts = [&self.database, &self.schema, &self.table, &self.column];
        let mut first = true;
        for part in parts.into_iter().filter(|p| !p.is_empty()) {
            if !first {
                f.write_str(".")?;
            }
            f.write_str(part)?;
            first = false;
        }
        Ok(())
    }
}

/// Provenance of one output column in query-span mode.
pub type SourceColumnSet = BTreeSet<ColumnResource>;

/// Aggregated sensitivity of one output column in masking mode.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "camelCase")]
pub struct MaskingAttributes {
    pub masking_level: MaskingLevel,
}

impl MaskingAttributes {
    pub fn new(masking_level: MaskingLevel) -> Self {
        Self { masking_level }
    }

    /// Folds `other` into `self`, keeping the more restrictive level.
    /// Returns true when `self` changed.
    pub fn transmit(&mut self, other: &Self) -> bool {
        if other.masking_level > self.masking_level {
            self.masking_level = other.masking_level;
            true
        } else {
            false
        }
    }

    /// True once no further input can make the attributes more restrictive.
    pub fn never_changes(&self) -> bool {
        self.masking_level == MaskingLevel::Full
    }
}

/// One output column of an analyzed statement with its lattice payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuerySpanResult<L> {
    pub name: String,
    pub provenance: L,
}

/// Column provenance for a single statement.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuerySpan {
    /// Output columns in query order
    pub results: Vec<QuerySpanResult<SourceColumnSet>>,

    /// Tables and views the statement reads, each with an empty column
    pub source_columns: SourceColumnSet,
}

/// Output column with its aggregated masking attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SensitiveField {
    pub name: String,
    pub masking_attributes: MaskingAttributes,
}

impl From<QuerySpanResult<MaskingAttributes>> for SensitiveField {
    fn from(result: QuerySpanResult<MaskingAttributes>) -> Self {
        Self {
            name: result.name,
            masking_attributes: result.provenance,
        }
    }
}
