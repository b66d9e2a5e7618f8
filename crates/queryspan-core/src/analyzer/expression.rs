//! Expression provenance.

use std::rc::Rc;

use super::scope::Scope;
use super::table_source::TableSource;
use super::Analyzer;
use crate::ast::{Expr, Query};
use crate::error::SpanError;
use crate::lattice::{merge_all, Lattice};

impl<'p, L: Lattice> Analyzer<'p, L> {
    /// Computes the lattice value of `expr` evaluated over `from`.
    pub(super) fn evaluate(
        &self,
        expr: &Expr,
        scope: &Scope<L>,
        from: &[Rc<TableSource<L>>],
    ) -> Result<L, SpanError> {
        match expr {
            Expr::Column(column) => self.resolve_column(column, scope, from),
            Expr::Literal | Expr::Null | Expr::Parameter => Ok(L::identity()),
            Expr::Subquery(query) | Expr::Exists(query) => {
                self.evaluate_subquery(query, scope, from)
            }
            Expr::InSubquery { expr, subquery } => {
                let mut value = self.evaluate(expr, scope, from)?;
                if !value.is_absorbing() {
                    value.merge(&self.evaluate_subquery(subquery, scope, from)?);
                }
                Ok(value)
            }
            composite => {
                let mut children = Vec::new();
                composite.for_each_child(&mut |child| children.push(child));
                let mut value = L::identity();
                for child in children {
                    if value.is_absorbing() {
                        break;
                    }
                    value.merge(&self.evaluate(child, scope, from)?);
                }
                Ok(value)
            }
        }
    }

    /// A nested query sees the current FROM sources as outer sources; its
    /// value is the merge of all its output columns.
    fn evaluate_subquery(
        &self,
        query: &Query,
        scope: &Scope<L>,
        from: &[Rc<TableSource<L>>],
    ) -> Result<L, SpanError> {
        let table = self.resolve_query(query, &scope.with_outer_sources(from))?;
        Ok(merge_all(table.columns.iter().map(|column| &column.provenance)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::table_source::PhysicalTable;
    use crate::ast::Function;
    use crate::metadata::Catalog;
    use crate::types::{
        AnalysisOptions, ColumnResource, Dialect, MaskingAttributes, MaskingLevel,
        QuerySpanResult, SourceColumnSet,
    };

    fn table<L>(columns: Vec<(&str, L)>) -> Rc<TableSource<L>> {
        Rc::new(TableSource::Physical(PhysicalTable {
            database: String::new(),
            schema: String::new(),
            name: "t".into(),
            columns: columns
                .into_iter()
                .map(|(name, provenance)| QuerySpanResult {
                    name: name.to_string(),
                    provenance,
                })
                .collect(),
        }))
    }

    fn call(args: Vec<Expr>) -> Expr {
        Expr::Function(Box::new(Function {
            name: "f".into(),
            args,
            ..Function::default()
        }))
    }

    #[test]
    fn literals_contribute_nothing() {
        let catalog = Catalog::new();
        let analyzer =
            Analyzer::<SourceColumnSet>::new(&catalog, Dialect::Generic, &AnalysisOptions::default());
        let expr = call(vec![Expr::Literal, Expr::Null, Expr::Parameter]);
        let value = analyzer.evaluate(&expr, &analyzer.root_scope(), &[]).unwrap();
        assert!(value.is_empty());
    }

    #[test]
    fn function_merges_argument_columns() {
        let catalog = Catalog::new();
        let analyzer =
            Analyzer::<SourceColumnSet>::new(&catalog, Dialect::Generic, &AnalysisOptions::default());
        let a = ColumnResource::new("", "", "t", "a");
        let b = ColumnResource::new("", "", "t", "b");
        let from = [table(vec![
            ("a", SourceColumnSet::from([a.clone()])),
            ("b", SourceColumnSet::from([b.clone()])),
        ])];
        let expr = Expr::Binary {
            left: Box::new(call(vec![Expr::column(None, "a")])),
            right: Box::new(Expr::column(Some("t"), "b")),
        };
        let value = analyzer.evaluate(&expr, &analyzer.root_scope(), &from).unwrap();
        assert_eq!(value, SourceColumnSet::from([a, b]));
    }

    #[test]
    fn absorbing_value_skips_remaining_children() {
        let catalog = Catalog::new();
        let analyzer = Analyzer::<MaskingAttributes>::new(
            &catalog,
            Dialect::Generic,
            &AnalysisOptions::default(),
        );
        let from = [table(vec![("secret", MaskingAttributes::new(MaskingLevel::Full))])];
        // The second argument names no column in scope; it is never evaluated.
        let expr = call(vec![
            Expr::column(None, "secret"),
            Expr::column(None, "missing"),
        ]);
        let value = analyzer.evaluate(&expr, &analyzer.root_scope(), &from).unwrap();
        assert_eq!(value.masking_level, MaskingLevel::Full);
    }
}
