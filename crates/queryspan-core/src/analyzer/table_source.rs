//! Resolved FROM-clause items.

use crate::ast::TableAlias;
use crate::error::SpanError;
use crate::lattice::Lattice;
use crate::types::QuerySpanResult;

/// A base table from metadata. Column payloads are lattice leaves.
#[derive(Debug, Clone, PartialEq)]
pub struct PhysicalTable<L> {
    pub database: String,
    pub schema: String,
    pub name: String,
    pub columns: Vec<QuerySpanResult<L>>,
}

/// A stored view whose columns come from analyzing its definition.
#[derive(Debug, Clone, PartialEq)]
pub struct PhysicalView<L> {
    pub database: String,
    pub schema: String,
    pub name: String,
    pub columns: Vec<QuerySpanResult<L>>,
}

/// The output of any derived source: subquery, CTE, join or set operation.
#[derive(Debug, Clone, PartialEq)]
pub struct PseudoTable<L> {
    pub name: String,
    pub columns: Vec<QuerySpanResult<L>>,
}

impl<L> PseudoTable<L> {
    pub fn new(name: impl Into<String>, columns: Vec<QuerySpanResult<L>>) -> Self {
        Self {
            name: name.into(),
            columns,
        }
    }

    /// Renames columns positionally; the alias list must cover every column.
    pub fn rename_columns(&mut self, aliases: &[String], owner: &str) -> Result<(), SpanError> {
        if aliases.is_empty() {
            return Ok(());
        }
        if aliases.len() != self.columns.len() {
            return Err(SpanError::malformed(format!(
                "`{owner}` declares {} column aliases but produces {} columns",
                aliases.len(),
                self.columns.len()
            )));
        }
        for (column, alias) in self.columns.iter_mut().zip(aliases) {
            column.name = alias.clone();
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TableSource<L> {
    Physical(PhysicalTable<L>),
    View(PhysicalView<L>),
    Pseudo(PseudoTable<L>),
}

impl<L: Lattice> TableSource<L> {
    pub fn columns(&self) -> &[QuerySpanResult<L>] {
        match self {
            TableSource::Physical(table) => &table.columns,
            TableSource::View(view) => &view.columns,
            TableSource::Pseudo(pseudo) => &pseudo.columns,
        }
    }

    pub fn database_name(&self) -> &str {
        match self {
            TableSource::Physical(table) => &table.database,
            TableSource::View(view) => &view.database,
            TableSource::Pseudo(_) => "",
        }
    }

    pub fn schema_name(&self) -> &str {
        match self {
            TableSource::Physical(table) => &table.schema,
            TableSource::View(view) => &view.schema,
            TableSource::Pseudo(_) => "",
        }
    }

    pub fn table_name(&self) -> &str {
        match self {
            TableSource::Physical(table) => &table.name,
            TableSource::View(view) => &view.name,
            TableSource::Pseudo(pseudo) => &pseudo.name,
        }
    }

    /// Hides the source behind `alias`, optionally renaming its columns.
    pub fn aliased(self, alias: Option<&TableAlias>) -> Result<Self, SpanError> {
        let Some(alias) = alias else {
            return Ok(self);
        };
        let mut pseudo = self.into_pseudo();
        pseudo.name = alias.name.clone();
        pseudo.rename_columns(&alias.columns, &alias.name)?;
        Ok(TableSource::Pseudo(pseudo))
    }

    pub fn into_pseudo(self) -> PseudoTable<L> {
        match self {
            TableSource::Physical(table) => PseudoTable::new(table.name, table.columns),
            TableSource::View(view) => PseudoTable::new(view.name, view.columns),
            TableSource::Pseudo(pseudo) => pseudo,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ColumnResource, SourceColumnSet};

    fn physical() -> TableSource<SourceColumnSet> {
        TableSource::Physical(PhysicalTable {
            database: "shop".into(),
            schema: String::new(),
            name: "orders".into(),
            columns: vec![QuerySpanResult {
                name: "id".into(),
                provenance: [ColumnResource::new("shop", "", "orders", "id")].into(),
            }],
        })
    }

    #[test]
    fn alias_hides_database_and_table() {
        let aliased = physical()
            .aliased(Some(&TableAlias::named("o")))
            .unwrap();
        assert_eq!(aliased.table_name(), "o");
        assert_eq!(aliased.database_name(), "");
        assert_eq!(aliased.columns()[0].name, "id");
    }

    #[test]
    fn alias_columns_rename_positionally() {
        let alias = TableAlias {
            name: "o".into(),
            columns: vec!["order_id".into()],
        };
        let aliased = physical().aliased(Some(&alias)).unwrap();
        assert_eq!(aliased.columns()[0].name, "order_id");
        assert_eq!(
            aliased.columns()[0].provenance,
            SourceColumnSet::from([ColumnResource::new("shop", "", "orders", "id")])
        );
    }

    #[test]
    fn alias_column_count_must_match() {
        let alias = TableAlias {
            name: "o".into(),
            columns: vec!["a".into(), "b".into()],
        };
        let err = physical().aliased(Some(&alias)).unwrap_err();
        assert!(matches!(err, SpanError::MalformedQuery { .. }));
    }
}
