//! Table source resolution: queries, FROM items, tables and views.

use std::rc::Rc;

#[cfg(feature = "tracing")]
use tracing::debug;

use super::join::merge_join;
use super::scope::Scope;
use super::table_source::{PhysicalTable, PhysicalView, PseudoTable, TableSource};
use super::{Analyzer, DefinitionKind, ViewKey};
use crate::ast::{self, SelectItem, SetExpr, TableFactor, TableWithJoins};
use crate::error::SpanError;
use crate::lattice::Lattice;
use crate::metadata::{Relation, TableMetadata, ViewMetadata};
use crate::parser::parse_statement;
use crate::types::{ColumnResource, QuerySpanResult};

type Sources<L> = Vec<Rc<TableSource<L>>>;

/// Built-in set-returning functions whose single column derives from the
/// call's arguments.
const SERIES_FUNCTIONS: &[&str] = &["generate_series", "generate_subscripts", "unnest"];

impl<'p, L: Lattice> Analyzer<'p, L> {
    pub(super) fn resolve_query(
        &self,
        query: &ast::Query,
        scope: &Scope<L>,
    ) -> Result<PseudoTable<L>, SpanError> {
        match &query.with {
            Some(with) => {
                let scope = self.bind_with(with, scope)?;
                self.resolve_set_expr(&query.body, &scope)
            }
            None => self.resolve_set_expr(&query.body, scope),
        }
    }

    pub(super) fn resolve_set_expr(
        &self,
        body: &SetExpr,
        scope: &Scope<L>,
    ) -> Result<PseudoTable<L>, SpanError> {
        match body {
            SetExpr::Select(select) => self.resolve_select(select, scope),
            SetExpr::Query(query) => self.resolve_query(query, scope),
            SetExpr::SetOperation { branches, .. } => self.resolve_branches(branches, scope),
            SetExpr::Values(values) => self.resolve_values(values, scope),
        }
    }

    /// Resolves set-operation branches and merges them column by column.
    pub(super) fn resolve_branches(
        &self,
        branches: &[SetExpr],
        scope: &Scope<L>,
    ) -> Result<PseudoTable<L>, SpanError> {
        let (first, rest) = branches
            .split_first()
            .ok_or_else(|| SpanError::malformed("set operation without branches"))?;
        let mut table = self.resolve_set_expr(first, scope)?;
        for branch in rest {
            let next = self.resolve_set_expr(branch, scope)?;
            merge_positional(&mut table, &next)?;
        }
        table.name.clear();
        Ok(table)
    }

    fn resolve_values(
        &self,
        values: &ast::Values,
        scope: &Scope<L>,
    ) -> Result<PseudoTable<L>, SpanError> {
        let width = values.rows.first().map_or(0, Vec::len);
        let mut columns: Vec<QuerySpanResult<L>> = (1..=width)
            .map(|position| QuerySpanResult {
                name: format!("column{position}"),
                provenance: L::identity(),
            })
            .collect();
        for row in &values.rows {
            if row.len() != width {
                return Err(SpanError::malformed(format!(
                    "VALUES rows have {} and {} expressions",
                    width,
                    row.len()
                )));
            }
            for (column, expr) in columns.iter_mut().zip(row) {
                let value = self.evaluate(expr, scope, &[])?;
                column.provenance.merge(&value);
            }
        }
        Ok(PseudoTable::new("", columns))
    }

    fn resolve_select(
        &self,
        select: &ast::Select,
        scope: &Scope<L>,
    ) -> Result<PseudoTable<L>, SpanError> {
        let mut visible = Sources::new();
        let mut items = Sources::with_capacity(select.from.len());
        for table in &select.from {
            items.push(self.resolve_table_with_joins(table, scope, &mut visible)?);
        }

        let mut columns = Vec::with_capacity(select.projection.len());
        for item in &select.projection {
            match item {
                SelectItem::Expr { expr, name } => columns.push(QuerySpanResult {
                    name: name.clone(),
                    provenance: self.evaluate(expr, scope, &visible)?,
                }),
                SelectItem::Wildcard => {
                    if items.is_empty() {
                        return Err(SpanError::malformed("SELECT * requires a FROM clause"));
                    }
                    for source in &items {
                        columns.extend(source.columns().iter().cloned());
                    }
                }
                SelectItem::QualifiedWildcard(object) => {
                    let source = items
                        .iter()
                        .chain(visible.iter().rev())
                        .chain(scope.outer_sources())
                        .find(|source| {
                            self.qualifier_matches(
                                source,
                                object.database.as_deref(),
                                object.schema.as_deref(),
                                Some(&object.name),
                                scope,
                            )
                        })
                        .ok_or_else(|| {
                            SpanError::table_not_found(
                                object.database.as_deref(),
                                object.schema.as_deref(),
                                &object.name,
                            )
                        })?;
                    columns.extend(source.columns().iter().cloned());
                }
            }
        }
        Ok(PseudoTable::new("", columns))
    }

    /// Resolves one FROM item. Every operand and every intermediate join
    /// result is published to `visible` so qualified references keep working.
    fn resolve_table_with_joins(
        &self,
        table: &TableWithJoins,
        scope: &Scope<L>,
        visible: &mut Sources<L>,
    ) -> Result<Rc<TableSource<L>>, SpanError> {
        let mut left = self.resolve_table_factor(&table.relation, scope, visible)?;
        for join in &table.joins {
            let right = self.resolve_table_factor(&join.relation, scope, visible)?;
            let merged = Rc::new(TableSource::Pseudo(merge_join(
                &left,
                &right,
                &join.constraint,
            )));
            visible.push(Rc::clone(&merged));
            left = merged;
        }
        Ok(left)
    }

    fn resolve_table_factor(
        &self,
        factor: &TableFactor,
        scope: &Scope<L>,
        visible: &mut Sources<L>,
    ) -> Result<Rc<TableSource<L>>, SpanError> {
        let source = match factor {
            TableFactor::Table { name, alias } => {
                self.resolve_table_name(name, scope)?.aliased(alias.as_ref())?
            }
            TableFactor::Derived { query, alias } => {
                let mut table = self.resolve_query(query, scope)?;
                table.name.clear();
                TableSource::Pseudo(table).aliased(alias.as_ref())?
            }
            TableFactor::NestedJoin { table, alias } => {
                let joined = self.resolve_table_with_joins(table, scope, visible)?;
                match alias {
                    None => return Ok(joined),
                    Some(alias) => Rc::unwrap_or_clone(joined).aliased(Some(alias))?,
                }
            }
            TableFactor::Function { name, args, alias } => {
                self.resolve_table_function(name, args, alias.as_ref(), scope, visible)?
            }
        };
        let source = Rc::new(source);
        visible.push(Rc::clone(&source));
        Ok(source)
    }

    /// Looks `name` up as a CTE, then as a relation of its schema.
    fn resolve_table_name(
        &self,
        name: &ast::ObjectName,
        scope: &Scope<L>,
    ) -> Result<TableSource<L>, SpanError> {
        let strategy = self.config.strategy;
        if name.is_unqualified() {
            if let Some(cte) = scope.cte(&name.name, strategy) {
                return Ok(TableSource::Pseudo(PseudoTable::clone(cte)));
            }
        }

        let not_found = || {
            SpanError::table_not_found(
                Some(name.database.as_deref().unwrap_or(&scope.default_database)),
                name.schema.as_deref(),
                &name.name,
            )
        };
        let database_name = name.database.as_deref().unwrap_or(&scope.default_database);
        let database = self.cache.database(database_name)?.ok_or_else(not_found)?;
        let schema = self
            .cache
            .schema(&database, name.schema.as_deref(), &scope.default_schema)
            .ok_or_else(not_found)?;

        match schema.relation(&name.name, strategy).ok_or_else(not_found)? {
            Relation::Table(table) => Ok(TableSource::Physical(physical_table(
                &database.name,
                &schema.name,
                table,
            ))),
            Relation::View(view) | Relation::MaterializedView(view) => self
                .resolve_view(&database.name, &schema.name, view)
                .map(TableSource::View),
        }
    }

    /// Resolves a set-returning function in FROM.
    ///
    /// User functions from metadata are inlined like views. Built-in series
    /// functions produce one column fed by their arguments, which may refer
    /// to FROM items on their left.
    fn resolve_table_function(
        &self,
        name: &ast::ObjectName,
        args: &[ast::Expr],
        alias: Option<&ast::TableAlias>,
        scope: &Scope<L>,
        visible: &Sources<L>,
    ) -> Result<TableSource<L>, SpanError> {
        let strategy = self.config.strategy;
        let database_name = name.database.as_deref().unwrap_or(&scope.default_database);
        if let Some(database) = self.cache.database(database_name)? {
            let function = self
                .cache
                .schema(&database, name.schema.as_deref(), &scope.default_schema)
                .and_then(|schema| Some((schema, schema.function(&name.name, strategy)?)));
            if let Some((schema, function)) = function {
                let key = self.definition_key(
                    DefinitionKind::Function,
                    &database.name,
                    &schema.name,
                    &function.name,
                );
                let columns = self.resolve_definition(
                    key,
                    &database.name,
                    &schema.name,
                    &function.definition,
                )?;
                return TableSource::Pseudo(PseudoTable::new(function.name.clone(), columns))
                    .aliased(alias);
            }
        }

        let function = name.name.to_lowercase();
        if !SERIES_FUNCTIONS.contains(&function.as_str()) {
            return Err(SpanError::function_not_found(
                Some(database_name),
                name.schema.as_deref(),
                &name.name,
            ));
        }
        let mut provenance = L::identity();
        for arg in args {
            if provenance.is_absorbing() {
                break;
            }
            provenance.merge(&self.evaluate(arg, scope, visible)?);
        }
        // A bare alias names the single output column too.
        let column = match alias {
            Some(alias) if alias.columns.is_empty() => alias.name.clone(),
            _ => function.clone(),
        };
        TableSource::Pseudo(PseudoTable::new(
            function,
            vec![QuerySpanResult {
                name: column,
                provenance,
            }],
        ))
        .aliased(alias)
    }

    pub(super) fn definition_key(
        &self,
        kind: DefinitionKind,
        database: &str,
        schema: &str,
        name: &str,
    ) -> ViewKey {
        let strategy = self.config.strategy;
        ViewKey {
            kind,
            database: strategy.normalize(database).into_owned(),
            schema: strategy.normalize(schema).into_owned(),
            view: strategy.normalize(name).into_owned(),
        }
    }

    /// Analyzes a stored view's definition once per analysis.
    fn resolve_view(
        &self,
        database: &str,
        schema: &str,
        view: &ViewMetadata,
    ) -> Result<PhysicalView<L>, SpanError> {
        let key = self.definition_key(DefinitionKind::View, database, schema, &view.name);
        let columns = self.resolve_definition(key, database, schema, &view.definition)?;
        Ok(PhysicalView {
            database: database.to_string(),
            schema: schema.to_string(),
            name: view.name.clone(),
            columns,
        })
    }

    /// Resolves stored SQL in the schema it belongs to, memoized by `key`.
    /// A definition that reaches itself again is a cycle.
    fn resolve_definition(
        &self,
        key: ViewKey,
        database: &str,
        schema: &str,
        definition: &str,
    ) -> Result<Vec<QuerySpanResult<L>>, SpanError> {
        let cached = self.views.borrow().get(&key).cloned();
        if let Some(columns) = cached {
            return Ok(columns);
        }
        if let Some(start) = self.resolving.borrow().iter().position(|k| *k == key) {
            let mut chain: Vec<String> = self.resolving.borrow()[start..]
                .iter()
                .map(ToString::to_string)
                .collect();
            chain.push(key.to_string());
            return Err(SpanError::CyclicViewDefinition { chain });
        }

        #[cfg(feature = "tracing")]
        debug!(definition = %key, "inlining stored definition");

        self.resolving.borrow_mut().push(key.clone());
        let resolved = parse_statement(definition, self.config.dialect, self.config.strategy)
            .and_then(|statement| {
                self.resolve_statement(&statement, &Scope::root(database, schema))
            });
        self.resolving.borrow_mut().pop();

        let columns = resolved?.columns;
        self.views.borrow_mut().insert(key, columns.clone());
        Ok(columns)
    }
}

fn physical_table<L: Lattice>(
    database: &str,
    schema: &str,
    table: &TableMetadata,
) -> PhysicalTable<L> {
    PhysicalTable {
        database: database.to_string(),
        schema: schema.to_string(),
        name: table.name.clone(),
        columns: table
            .columns
            .iter()
            .map(|column| QuerySpanResult {
                name: column.name.clone(),
                provenance: L::from_column(
                    &ColumnResource::new(database, schema, &table.name, &column.name),
                    column,
                ),
            })
            .collect(),
    }
}

/// Merges `next` into `table` column by column. Returns true when any column
/// changed.
pub(super) fn merge_positional<L: Lattice>(
    table: &mut PseudoTable<L>,
    next: &PseudoTable<L>,
) -> Result<bool, SpanError> {
    if table.columns.len() != next.columns.len() {
        return Err(SpanError::malformed(format!(
            "set operation branches produce {} and {} columns",
            table.columns.len(),
            next.columns.len()
        )));
    }
    let mut changed = false;
    for (column, other) in table.columns.iter_mut().zip(&next.columns) {
        changed |= column.provenance.merge(&other.provenance);
    }
    Ok(changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{Catalog, DatabaseMetadata, FunctionMetadata};
    use crate::types::{AnalysisOptions, Dialect, SourceColumnSet};

    fn catalog() -> Catalog {
        let mut db = DatabaseMetadata::new("shop");
        let schema = db.schema_mut("public");
        schema.tables.push(TableMetadata::new("orders", ["id", "total"]));
        schema
            .views
            .push(ViewMetadata::new("v_orders", "SELECT id AS order_id FROM orders"));
        schema.functions.push(FunctionMetadata::new(
            "big_orders",
            "SELECT id, total FROM orders WHERE total > $1",
        ));
        schema
            .functions
            .push(FunctionMetadata::new("loops", "SELECT * FROM loops()"));
        Catalog::new().with_database(db)
    }

    fn options() -> AnalysisOptions {
        AnalysisOptions {
            default_database: "shop".into(),
            ..AnalysisOptions::default()
        }
    }

    fn resolve(catalog: &Catalog, sql: &str) -> Result<PseudoTable<SourceColumnSet>, SpanError> {
        let analyzer = Analyzer::<SourceColumnSet>::new(catalog, Dialect::Postgres, &options());
        let statement = parse_statement(sql, Dialect::Postgres, analyzer.config.strategy)?;
        let ast::Statement::Query(query) = statement else {
            panic!("expected query");
        };
        analyzer.resolve_query(&query, &analyzer.root_scope())
    }

    fn source(table: &str, column: &str) -> ColumnResource {
        ColumnResource::new("shop", "public", table, column)
    }

    #[test]
    fn physical_columns_are_leaves() {
        let table = resolve(&catalog(), "SELECT * FROM orders").unwrap();
        assert_eq!(table.columns.len(), 2);
        assert_eq!(table.columns[1].name, "total");
        assert_eq!(
            table.columns[1].provenance,
            SourceColumnSet::from([source("orders", "total")])
        );
    }

    #[test]
    fn views_are_inlined() {
        let table = resolve(&catalog(), "SELECT order_id FROM v_orders").unwrap();
        assert_eq!(
            table.columns[0].provenance,
            SourceColumnSet::from([source("orders", "id")])
        );
    }

    #[test]
    fn unknown_table_names_the_database() {
        let err = resolve(&catalog(), "SELECT * FROM nope").unwrap_err();
        assert!(matches!(
            err,
            SpanError::ResourceNotFound { ref database, ref table, .. }
                if database.as_deref() == Some("shop") && table.as_deref() == Some("nope")
        ));
    }

    #[test]
    fn series_alias_names_its_column() {
        let table = resolve(&catalog(), "SELECT g FROM generate_series(1, 3) AS g").unwrap();
        assert_eq!(table.columns[0].name, "g");
        assert!(table.columns[0].provenance.is_empty());

        let table = resolve(&catalog(), "SELECT * FROM generate_series(1, 3)").unwrap();
        assert_eq!(table.columns[0].name, "generate_series");
    }

    #[test]
    fn series_arguments_read_earlier_from_items() {
        let table = resolve(
            &catalog(),
            "SELECT s.n FROM orders o, generate_series(1, o.total) AS s(n)",
        )
        .unwrap();
        assert_eq!(
            table.columns[0].provenance,
            SourceColumnSet::from([source("orders", "total")])
        );
    }

    #[test]
    fn series_alias_list_must_cover_one_column() {
        let err = resolve(&catalog(), "SELECT * FROM generate_series(1, 3) AS s(a, b)").unwrap_err();
        assert!(matches!(err, SpanError::MalformedQuery { .. }));
    }

    #[test]
    fn user_functions_are_inlined() {
        let table = resolve(&catalog(), "SELECT b.total FROM big_orders(100) AS b").unwrap();
        assert_eq!(
            table.columns[0].provenance,
            SourceColumnSet::from([source("orders", "total")])
        );
    }

    #[test]
    fn self_calling_function_is_a_cycle() {
        let err = resolve(&catalog(), "SELECT * FROM loops()").unwrap_err();
        assert!(matches!(err, SpanError::CyclicViewDefinition { .. }));
    }

    #[test]
    fn unknown_function_is_reported() {
        let err = resolve(&catalog(), "SELECT * FROM nowhere(1)").unwrap_err();
        assert!(matches!(
            err,
            SpanError::ResourceNotFound { ref function, .. } if function.as_deref() == Some("nowhere")
        ));
    }

    #[test]
    fn values_rows_must_have_equal_width() {
        let err = resolve(&catalog(), "VALUES (1, 2), (3)").unwrap_err();
        assert!(matches!(err, SpanError::MalformedQuery { .. }));
    }

    #[test]
    fn merge_positional_reports_change() {
        let leaf = |column: &str| QuerySpanResult {
            name: column.to_string(),
            provenance: SourceColumnSet::from([source("orders", column)]),
        };
        let mut table = PseudoTable::new("", vec![leaf("id")]);
        assert!(merge_positional(&mut table, &PseudoTable::new("", vec![leaf("total")])).unwrap());
        assert!(!merge_positional(&mut table, &PseudoTable::new("", vec![leaf("id")])).unwrap());
        assert!(merge_positional(&mut table, &PseudoTable::new("", vec![])).is_err());
    }
}
