//! Payload lattices carried through the span analysis.
//!
//! The analyzer is generic over [`Lattice`]: every output column is a lattice
//! value built from physical-column leaves and combined with `merge`. Query
//! spans use [`SourceColumnSet`] (set union); masking uses
//! [`MaskingAttributes`] (maximum masking level).

use std::fmt::Debug;

use crate::metadata::ColumnMetadata;
use crate::types::{ColumnResource, MaskingAttributes, SourceColumnSet};

pub trait Lattice: Clone + PartialEq + Debug {
    /// Value for expressions that read no columns.
    fn identity() -> Self;

    /// Leaf value for a physical table column.
    fn from_column(resource: &ColumnResource, column: &ColumnMetadata) -> Self;

    /// Folds `other` into `self`. Returns true when `self` changed.
    fn merge(&mut self, other: &Self) -> bool;

    /// True when no further merge can change `self`.
    fn is_absorbing(&self) -> bool {
        false
    }
}

impl Lattice for SourceColumnSet {
    fn identity() -> Self {
        SourceColumnSet::new()
    }

    fn from_column(resource: &ColumnResource, _column: &ColumnMetadata) -> Self {
        SourceColumnSet::from([resource.clone()])
    }

    fn merge(&mut self, other: &Self) -> bool {
        let before = self.len();
        self.extend(other.iter().cloned());
        self.len() != before
    }
}

impl Lattice for MaskingAttributes {
    fn identity() -> Self {
        MaskingAttributes::default()
    }

    fn from_column(_resource: &ColumnResource, column: &ColumnMetadata) -> Self {
        MaskingAttributes::new(column.masking_level.unwrap_or_default())
    }

    fn merge(&mut self, other: &Self) -> bool {
        self.transmit(other)
    }

    fn is_absorbing(&self) -> bool {
        self.never_changes()
    }
}

/// Merges an iterator of values, stopping early once the result absorbs.
pub fn merge_all<'a, L: Lattice + 'a>(values: impl IntoIterator<Item = &'a L>) -> L {
    let mut acc = L::identity();
    for value in values {
        if acc.is_absorbing() {
            break;
        }
        acc.merge(value);
    }
    acc
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MaskingLevel;
    use rstest::rstest;

    fn column(level: Option<MaskingLevel>) -> ColumnMetadata {
        ColumnMetadata {
            name: "c".into(),
            data_type: None,
            masking_level: level,
        }
    }

    #[test]
    fn source_set_merge_reports_growth() {
        let a = ColumnResource::new("db", "", "t", "a");
        let b = ColumnResource::new("db", "", "t", "b");
        let mut acc = SourceColumnSet::from_column(&a, &column(None));
        assert!(acc.merge(&SourceColumnSet::from([b.clone()])));
        assert!(!acc.merge(&SourceColumnSet::from([a, b])));
        assert_eq!(acc.len(), 2);
    }

    #[test]
    fn source_set_identity_is_neutral() {
        let a = ColumnResource::new("db", "", "t", "a");
        let mut acc = SourceColumnSet::identity();
        acc.merge(&SourceColumnSet::from([a.clone()]));
        assert_eq!(acc, SourceColumnSet::from([a]));
    }

    #[rstest]
    #[case(None, MaskingLevel::None)]
    #[case(Some(MaskingLevel::Partial), MaskingLevel::Partial)]
    #[case(Some(MaskingLevel::Full), MaskingLevel::Full)]
    fn masking_leaf_uses_column_level(
        #[case] configured: Option<MaskingLevel>,
        #[case] expected: MaskingLevel,
    ) {
        let resource = ColumnResource::new("db", "", "t", "c");
        let attrs = MaskingAttributes::from_column(&resource, &column(configured));
        assert_eq!(attrs.masking_level, expected);
    }

    #[test]
    fn merge_all_stops_at_absorbing_value() {
        let values = [
            MaskingAttributes::new(MaskingLevel::Partial),
            MaskingAttributes::new(MaskingLevel::Full),
            MaskingAttributes::new(MaskingLevel::None),
        ];
        let merged = merge_all(&values);
        assert!(merged.is_absorbing());
        assert_eq!(merged.masking_level, MaskingLevel::Full);
    }

    #[test]
    fn merge_all_of_nothing_is_identity() {
        let merged: SourceColumnSet = merge_all(std::iter::empty());
        assert!(merged.is_empty());
    }
}
