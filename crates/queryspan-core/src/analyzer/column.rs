//! Column reference resolution.

use std::rc::Rc;

use super::scope::Scope;
use super::table_source::TableSource;
use super::Analyzer;
use crate::ast::ColumnRef;
use crate::error::SpanError;
use crate::lattice::Lattice;
use crate::types::QuerySpanResult;

impl<'p, L: Lattice> Analyzer<'p, L> {
    /// Resolves a column against the enclosing queries' sources, innermost
    /// first, then against the current FROM sources, latest first.
    pub(super) fn resolve_column(
        &self,
        column: &ColumnRef,
        scope: &Scope<L>,
        from: &[Rc<TableSource<L>>],
    ) -> Result<L, SpanError> {
        scope
            .outer_sources()
            .chain(from.iter().rev())
            .find_map(|source| self.find_column(source, column, scope))
            .map(|found| found.provenance.clone())
            .ok_or_else(|| {
                SpanError::column_not_found(
                    column.database.as_deref(),
                    column.schema.as_deref(),
                    column.table.as_deref(),
                    &column.column,
                )
            })
    }

    fn find_column<'s>(
        &self,
        source: &'s TableSource<L>,
        column: &ColumnRef,
        scope: &Scope<L>,
    ) -> Option<&'s QuerySpanResult<L>> {
        if !self.qualifier_matches(
            source,
            column.database.as_deref(),
            column.schema.as_deref(),
            column.table.as_deref(),
            scope,
        ) {
            return None;
        }
        source
            .columns()
            .iter()
            .find(|candidate| candidate.name.eq_ignore_ascii_case(&column.column))
    }

    /// Whether a reference qualified by `database.schema.table` can name
    /// `source`. Missing qualifiers accept anything, except that an
    /// unqualified database only accepts sources in the default database.
    pub(super) fn qualifier_matches(
        &self,
        source: &TableSource<L>,
        database: Option<&str>,
        schema: Option<&str>,
        table: Option<&str>,
        scope: &Scope<L>,
    ) -> bool {
        let strategy = self.config.strategy;
        let database_ok = match database {
            Some(database) => strategy.matches(source.database_name(), database),
            None => {
                source.database_name().is_empty()
                    || strategy.matches(source.database_name(), &scope.default_database)
            }
        };
        database_ok
            && schema.is_none_or(|schema| strategy.matches(source.schema_name(), schema))
            && table.is_none_or(|table| strategy.matches(source.table_name(), table))
    }
}
