//! WITH clause binding, including recursive CTEs.
//!
//! Recursive CTEs are solved as a fixpoint: the initial part of the body is
//! resolved once, then the recursive part is re-resolved against the current
//! result and merged in until nothing changes. Sibling CTEs of a
//! `WITH RECURSIVE` clause that reference each other are solved together.

use std::rc::Rc;

#[cfg(feature = "tracing")]
use tracing::debug;

use super::resolver::merge_positional;
use super::scope::Scope;
use super::table_source::PseudoTable;
use super::Analyzer;
use crate::ast::{Cte, SetExpr, With};
use crate::error::SpanError;
use crate::lattice::Lattice;

/// A recursive CTE body split at its first self-referencing branch.
struct RecursiveBody<'a> {
    cte: &'a Cte,
    initial: &'a [SetExpr],
    recursive: &'a [SetExpr],
}

impl<'p, L: Lattice> Analyzer<'p, L> {
    /// Returns `scope` extended with every CTE of `with`.
    pub(super) fn bind_with(&self, with: &With, scope: &Scope<L>) -> Result<Scope<L>, SpanError> {
        if with.recursive {
            return self.bind_recursive(with, scope);
        }
        let implicit = self.config.dialect.implicit_recursive_ctes();
        let mut scope = scope.clone();
        for cte in &with.ctes {
            if implicit && cte.query.references_table(&cte.name, self.config.strategy) {
                let tables = self.resolve_recursive_group(&[cte], &scope)?;
                scope = scope.with_ctes(tables.into_iter().map(Rc::new));
            } else {
                let table = self.resolve_cte(cte, &scope)?;
                scope = scope.with_cte(Rc::new(table));
            }
        }
        Ok(scope)
    }

    fn resolve_cte(&self, cte: &Cte, scope: &Scope<L>) -> Result<PseudoTable<L>, SpanError> {
        let mut table = self.resolve_query(&cte.query, scope)?;
        table.name = cte.name.clone();
        table.rename_columns(&cte.column_aliases, &cte.name)?;
        Ok(table)
    }

    fn bind_recursive(&self, with: &With, scope: &Scope<L>) -> Result<Scope<L>, SpanError> {
        let strategy = self.config.strategy;
        let references: Vec<Vec<usize>> = with
            .ctes
            .iter()
            .map(|cte| {
                with.ctes
                    .iter()
                    .enumerate()
                    .filter(|(_, other)| cte.query.references_table(&other.name, strategy))
                    .map(|(index, _)| index)
                    .collect()
            })
            .collect();

        let mut scope = scope.clone();
        for group in strongly_connected_components(&references) {
            let tables = match group.as_slice() {
                [single] if !references[*single].contains(single) => {
                    vec![self.resolve_cte(&with.ctes[*single], &scope)?]
                }
                _ => {
                    let members: Vec<&Cte> = group.iter().map(|&index| &with.ctes[index]).collect();
                    self.resolve_recursive_group(&members, &scope)?
                }
            };
            scope = scope.with_ctes(tables.into_iter().map(Rc::new));
        }
        Ok(scope)
    }

    /// Solves CTEs that reference themselves or each other.
    fn resolve_recursive_group(
        &self,
        members: &[&Cte],
        scope: &Scope<L>,
    ) -> Result<Vec<PseudoTable<L>>, SpanError> {
        let strategy = self.config.strategy;
        let mut bodies = Vec::with_capacity(members.len());
        for cte in members {
            // Names the body redeclares in its own WITH are not recursive uses.
            let names: Vec<&str> = members
                .iter()
                .map(|member| member.name.as_str())
                .filter(|name| !cte.query.declares_cte(name, strategy))
                .collect();
            let branches = top_level_branches(&cte.query.body);
            let split = branches.iter().position(|branch| {
                names
                    .iter()
                    .any(|name| branch.references_table(name, strategy))
            });
            match split {
                Some(0) => {
                    return Err(SpanError::malformed(format!(
                        "recursive CTE `{}` has no initial part",
                        cte.name
                    )))
                }
                Some(at) => bodies.push(RecursiveBody {
                    cte,
                    initial: &branches[..at],
                    recursive: &branches[at..],
                }),
                None if members.len() == 1 => return Ok(vec![self.resolve_cte(cte, scope)?]),
                None => {
                    return Err(SpanError::UnsupportedConstruct {
                        construct: format!(
                            "recursive CTE `{}` references its siblings outside its body",
                            cte.name
                        ),
                    })
                }
            }
        }

        let mut tables = Vec::with_capacity(bodies.len());
        for body in &bodies {
            let inner = self.bind_inner_with(body.cte, scope)?;
            let mut table = self.resolve_branches(body.initial, &inner)?;
            table.name = body.cte.name.clone();
            table.rename_columns(&body.cte.column_aliases, &body.cte.name)?;
            tables.push(table);
        }

        let limit = self.config.max_fixpoint_iterations;
        let mut iterations = 0;
        loop {
            if iterations >= limit {
                return Err(SpanError::FixpointDiverged {
                    cte: members
                        .iter()
                        .map(|cte| cte.name.as_str())
                        .collect::<Vec<_>>()
                        .join(", "),
                    iterations,
                });
            }
            iterations += 1;

            let mut changed = false;
            for (position, body) in bodies.iter().enumerate() {
                let bound = scope.with_ctes(tables.iter().cloned().map(Rc::new));
                let inner = self.bind_inner_with(body.cte, &bound)?;
                let next = self.resolve_branches(body.recursive, &inner)?;
                changed |= merge_positional(&mut tables[position], &next)?;
            }

            #[cfg(feature = "tracing")]
            debug!(
                cte = %tables[0].name,
                iteration = iterations,
                changed,
                "recursive CTE iteration"
            );

            if !changed {
                return Ok(tables);
            }
        }
    }

    fn bind_inner_with(&self, cte: &Cte, scope: &Scope<L>) -> Result<Scope<L>, SpanError> {
        match &cte.query.with {
            Some(with) => self.bind_with(with, scope),
            None => Ok(scope.clone()),
        }
    }
}

fn top_level_branches(body: &SetExpr) -> &[SetExpr] {
    match body {
        SetExpr::SetOperation { branches, .. } => branches,
        other => std::slice::from_ref(other),
    }
}

/// Tarjan's algorithm over `edges[node] = referenced nodes`.
///
/// Components come out dependencies first; members are sorted by index.
fn strongly_connected_components(edges: &[Vec<usize>]) -> Vec<Vec<usize>> {
    struct State<'e> {
        edges: &'e [Vec<usize>],
        next_index: usize,
        index: Vec<Option<usize>>,
        low_link: Vec<usize>,
        on_stack: Vec<bool>,
        stack: Vec<usize>,
        components: Vec<Vec<usize>>,
    }

    impl State<'_> {
        fn visit(&mut self, node: usize) {
            self.index[node] = Some(self.next_index);
            self.low_link[node] = self.next_index;
            self.next_index += 1;
            self.stack.push(node);
            self.on_stack[node] = true;

            let edges = self.edges;
            for &next in &edges[node] {
                match self.index[next] {
                    None => {
                        self.visit(next);
                        self.low_link[node] = self.low_link[node].min(self.low_link[next]);
                    }
                    Some(index) if self.on_stack[next] => {
                        self.low_link[node] = self.low_link[node].min(index);
                    }
                    Some(_) => {}
                }
            }

            if Some(self.low_link[node]) == self.index[node] {
                let mut component = Vec::new();
                while let Some(member) = self.stack.pop() {
                    self.on_stack[member] = false;
                    component.push(member);
                    if member == node {
                        break;
                    }
                }
                component.sort_unstable();
                self.components.push(component);
            }
        }
    }

    let count = edges.len();
    let mut state = State {
        edges,
        next_index: 0,
        index: vec![None; count],
        low_link: vec![0; count],
        on_stack: vec![false; count],
        stack: Vec::new(),
        components: Vec::new(),
    };
    for node in 0..count {
        if state.index[node].is_none() {
            state.visit(node);
        }
    }
    state.components
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast;
    use crate::metadata::{Catalog, DatabaseMetadata, TableMetadata};
    use crate::parser::parse_statement;
    use crate::types::{AnalysisOptions, ColumnResource, Dialect, SourceColumnSet};

    #[test]
    fn components_come_out_dependencies_first() {
        // 0 -> 1, 1 -> 2, 2 -> 1, 3 alone
        let edges = vec![vec![1], vec![2], vec![1], vec![]];
        assert_eq!(
            strongly_connected_components(&edges),
            vec![vec![1, 2], vec![0], vec![3]]
        );
    }

    #[test]
    fn self_loop_is_its_own_component() {
        let edges = vec![vec![0], vec![0]];
        assert_eq!(strongly_connected_components(&edges), vec![vec![0], vec![1]]);
    }

    fn resolve(sql: &str, limit: Option<usize>) -> Result<PseudoTable<SourceColumnSet>, SpanError> {
        resolve_in(sql, Dialect::Generic, limit)
    }

    fn resolve_in(
        sql: &str,
        dialect: Dialect,
        limit: Option<usize>,
    ) -> Result<PseudoTable<SourceColumnSet>, SpanError> {
        let mut db = DatabaseMetadata::new("db");
        db.schema_mut("").tables.push(TableMetadata::new("t", ["x", "y"]));
        let catalog = Catalog::new().with_database(db);
        let options = AnalysisOptions {
            default_database: "db".into(),
            max_fixpoint_iterations: limit,
            ..AnalysisOptions::default()
        };
        let analyzer = Analyzer::<SourceColumnSet>::new(&catalog, dialect, &options);
        let ast::Statement::Query(query) = parse_statement(sql, dialect, analyzer.config.strategy)?
        else {
            panic!("expected query");
        };
        analyzer.resolve_query(&query, &analyzer.root_scope())
    }

    fn x() -> ColumnResource {
        ColumnResource::new("db", "", "t", "x")
    }

    const SWAP: &str = "WITH RECURSIVE r(a, b) AS (\
        SELECT x, 1 FROM t UNION ALL SELECT b, a FROM r\
    ) SELECT a, b FROM r";

    #[test]
    fn recursive_part_feeds_back_until_stable() {
        let table = resolve(SWAP, None).unwrap();
        assert_eq!(table.columns[0].provenance, SourceColumnSet::from([x()]));
        assert_eq!(table.columns[1].provenance, SourceColumnSet::from([x()]));
    }

    #[test]
    fn iteration_cap_is_an_error() {
        let err = resolve(SWAP, Some(1)).unwrap_err();
        assert!(matches!(
            err,
            SpanError::FixpointDiverged { ref cte, iterations: 1 } if cte == "r"
        ));
        assert!(resolve(SWAP, Some(2)).is_ok());
    }

    #[test]
    fn missing_initial_part_is_malformed() {
        let err = resolve(
            "WITH RECURSIVE r(a) AS (SELECT a FROM r UNION ALL SELECT x FROM t) SELECT a FROM r",
            None,
        )
        .unwrap_err();
        assert!(matches!(err, SpanError::MalformedQuery { .. }));
    }

    const SELF_REFERENCE: &str = "WITH r(a, b) AS (\
        SELECT x, 1 FROM t UNION ALL SELECT b, a FROM r\
    ) SELECT a, b FROM r";

    #[test]
    fn mssql_self_reference_recurses_without_keyword() {
        let table = resolve_in(SELF_REFERENCE, Dialect::Mssql, None).unwrap();
        assert_eq!(table.columns[1].provenance, SourceColumnSet::from([x()]));
    }

    #[test]
    fn generic_self_reference_names_the_table() {
        // Without RECURSIVE the inner `r` is looked up in metadata.
        let err = resolve_in(SELF_REFERENCE, Dialect::Generic, None).unwrap_err();
        assert!(matches!(err, SpanError::ResourceNotFound { .. }));
    }
}
