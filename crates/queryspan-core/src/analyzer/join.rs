//! Join output columns.

use super::table_source::{PseudoTable, TableSource};
use crate::ast::JoinConstraint;
use crate::lattice::Lattice;
use crate::types::QuerySpanResult;

/// Combines the columns of both join operands.
///
/// NATURAL and USING joins fold each shared right column into the left
/// column of the same name and drop it from the right side. Other joins keep
/// every column of both operands.
pub(super) fn merge_join<L: Lattice>(
    left: &TableSource<L>,
    right: &TableSource<L>,
    constraint: &JoinConstraint,
) -> PseudoTable<L> {
    let columns = match constraint {
        JoinConstraint::Natural => merge_shared(left.columns(), right.columns(), |_| true),
        JoinConstraint::Using(names) => merge_shared(left.columns(), right.columns(), |column| {
            names.iter().any(|name| name.eq_ignore_ascii_case(column))
        }),
        JoinConstraint::On(_) | JoinConstraint::None => left
            .columns()
            .iter()
            .chain(right.columns())
            .cloned()
            .collect(),
    };
    PseudoTable::new("", columns)
}

fn merge_shared<L: Lattice>(
    left: &[QuerySpanResult<L>],
    right: &[QuerySpanResult<L>],
    shared: impl Fn(&str) -> bool,
) -> Vec<QuerySpanResult<L>> {
    let mut columns: Vec<QuerySpanResult<L>> = left
        .iter()
        .map(|column| {
            let mut column = column.clone();
            if shared(&column.name) {
                if let Some(other) = named(right, &column.name) {
                    column.provenance.merge(&other.provenance);
                }
            }
            column
        })
        .collect();
    columns.extend(
        right
            .iter()
            .filter(|column| !(shared(&column.name) && named(left, &column.name).is_some()))
            .cloned(),
    );
    columns
}

fn named<'c, L>(columns: &'c [QuerySpanResult<L>], name: &str) -> Option<&'c QuerySpanResult<L>> {
    columns
        .iter()
        .find(|column| column.name.eq_ignore_ascii_case(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Expr;
    use crate::types::{ColumnResource, SourceColumnSet};

    fn source(table: &str, columns: &[&str]) -> TableSource<SourceColumnSet> {
        TableSource::Pseudo(PseudoTable::new(
            table,
            columns
                .iter()
                .map(|column| QuerySpanResult {
                    name: column.to_string(),
                    provenance: [ColumnResource::new("db", "", table, *column)].into(),
                })
                .collect(),
        ))
    }

    fn names(table: &PseudoTable<SourceColumnSet>) -> Vec<&str> {
        table.columns.iter().map(|c| c.name.as_str()).collect()
    }

    #[test]
    fn using_merges_named_columns_at_left_position() {
        let joined = merge_join(
            &source("t1", &["a", "b"]),
            &source("t2", &["b", "c"]),
            &JoinConstraint::Using(vec!["B".into()]),
        );
        assert_eq!(names(&joined), ["a", "b", "c"]);
        assert_eq!(
            joined.columns[1].provenance,
            SourceColumnSet::from([
                ColumnResource::new("db", "", "t1", "b"),
                ColumnResource::new("db", "", "t2", "b"),
            ])
        );
    }

    #[test]
    fn natural_merges_every_shared_name() {
        let joined = merge_join(
            &source("t1", &["id", "x"]),
            &source("t2", &["x", "id", "y"]),
            &JoinConstraint::Natural,
        );
        assert_eq!(names(&joined), ["id", "x", "y"]);
        assert_eq!(joined.columns[0].provenance.len(), 2);
        assert_eq!(joined.columns[1].provenance.len(), 2);
    }

    #[test]
    fn on_keeps_both_sides() {
        let joined = merge_join(
            &source("t1", &["a"]),
            &source("t2", &["a"]),
            &JoinConstraint::On(Expr::Literal),
        );
        assert_eq!(names(&joined), ["a", "a"]);
        assert_eq!(joined.columns[0].provenance.len(), 1);
    }

    #[test]
    fn using_ignores_columns_missing_on_the_right() {
        let joined = merge_join(
            &source("t1", &["a"]),
            &source("t2", &["b"]),
            &JoinConstraint::Using(vec!["a".into()]),
        );
        assert_eq!(names(&joined), ["a", "b"]);
    }
}
