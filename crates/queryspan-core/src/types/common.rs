//! Common types shared between request and response.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::dialect::NormalizationStrategy;

/// Case sensitivity used when matching database, schema and table names.
///
/// Column names always match case-insensitively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "lowercase")]
pub enum CaseSensitivity {
    /// Use dialect default
    #[default]
    Dialect,
    /// Lowercase normalization (Postgres)
    Lower,
    /// Uppercase normalization (Snowflake)
    Upper,
    /// Case-sensitive as-is (MySQL on Linux)
    Exact,
}

impl CaseSensitivity {
    /// Resolves this setting to a concrete normalization strategy.
    pub fn resolve(&self, dialect: super::Dialect) -> NormalizationStrategy {
        match self {
            Self::Dialect => dialect.normalization_strategy(),
            Self::Lower => NormalizationStrategy::Lowercase,
            Self::Upper => NormalizationStrategy::Uppercase,
            Self::Exact => NormalizationStrategy::CaseSensitive,
        }
    }
}

/// Sensitivity classification of a column, ordered from least to most restrictive.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    JsonSchema,
    Default,
)]
#[serde(rename_all = "lowercase")]
pub enum MaskingLevel {
    #[default]
    None,
    Partial,
    Full,
}
