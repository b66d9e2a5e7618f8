//! Immutable lookup scopes.
//!
//! A scope is extended by value when entering a WITH clause or a subquery;
//! the caller's scope is untouched, so nothing has to be unwound on exit.

use std::rc::Rc;

use super::table_source::{PseudoTable, TableSource};
use crate::dialect::NormalizationStrategy;

#[derive(Debug)]
pub(crate) struct Scope<L> {
    /// Database assumed for unqualified table references.
    pub default_database: Rc<str>,
    /// Schema assumed for table references without one.
    pub default_schema: Rc<str>,
    /// CTE bindings, outermost first.
    ctes: Vec<Rc<PseudoTable<L>>>,
    /// FROM sources of enclosing queries, outermost first.
    outer: Vec<Rc<TableSource<L>>>,
}

// Manual impl: derive would require `L: Clone` for the Rc fields.
impl<L> Clone for Scope<L> {
    fn clone(&self) -> Self {
        Self {
            default_database: Rc::clone(&self.default_database),
            default_schema: Rc::clone(&self.default_schema),
            ctes: self.ctes.clone(),
            outer: self.outer.clone(),
        }
    }
}

impl<L> Scope<L> {
    pub fn root(default_database: &str, default_schema: &str) -> Self {
        Self {
            default_database: Rc::from(default_database),
            default_schema: Rc::from(default_schema),
            ctes: Vec::new(),
            outer: Vec::new(),
        }
    }

    pub fn with_cte(&self, cte: Rc<PseudoTable<L>>) -> Self {
        let mut scope = self.clone();
        scope.ctes.push(cte);
        scope
    }

    pub fn with_ctes(&self, ctes: impl IntoIterator<Item = Rc<PseudoTable<L>>>) -> Self {
        let mut scope = self.clone();
        scope.ctes.extend(ctes);
        scope
    }

    /// Makes `sources` visible to correlated references of nested queries.
    pub fn with_outer_sources(&self, sources: &[Rc<TableSource<L>>]) -> Self {
        let mut scope = self.clone();
        scope.outer.extend(sources.iter().cloned());
        scope
    }

    /// Innermost CTE binding named `name`.
    pub fn cte(&self, name: &str, strategy: NormalizationStrategy) -> Option<&Rc<PseudoTable<L>>> {
        self.ctes
            .iter()
            .rev()
            .find(|cte| strategy.matches(&cte.name, name))
    }

    /// Enclosing FROM sources, innermost first.
    pub fn outer_sources(&self) -> impl Iterator<Item = &Rc<TableSource<L>>> {
        self.outer.iter().rev()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SourceColumnSet;

    #[test]
    fn innermost_cte_wins() {
        let root = Scope::<SourceColumnSet>::root("db", "");
        let outer = root.with_cte(Rc::new(PseudoTable::new("c", vec![])));
        let inner = outer.with_cte(Rc::new(PseudoTable::new(
            "C",
            vec![crate::types::QuerySpanResult {
                name: "x".into(),
                provenance: SourceColumnSet::new(),
            }],
        )));

        let found = inner
            .cte("c", NormalizationStrategy::CaseInsensitive)
            .unwrap();
        assert_eq!(found.columns.len(), 1);
        assert!(outer
            .cte("c", NormalizationStrategy::CaseInsensitive)
            .unwrap()
            .columns
            .is_empty());
        assert!(root.cte("c", NormalizationStrategy::CaseInsensitive).is_none());
    }

    #[test]
    fn extending_does_not_touch_parent() {
        let root = Scope::<SourceColumnSet>::root("db", "");
        let source = Rc::new(TableSource::Pseudo(PseudoTable::new("t", vec![])));
        let child = root.with_outer_sources(&[source]);
        assert_eq!(child.outer_sources().count(), 1);
        assert_eq!(root.outer_sources().count(), 0);
    }
}
