//! Tables and views a statement reads.

use std::collections::HashSet;

use super::{Analyzer, AnalyzerConfig, DefinitionKind, ViewKey};
use crate::ast::{ObjectName, Query, SetExpr, Statement, TableFactor, TableWithJoins};
use crate::dialect::Namespace;
use crate::error::SpanError;
use crate::lattice::Lattice;
use crate::parser::parse_statement;
use crate::types::{ColumnResource, SourceColumnSet};

impl<'p, L: Lattice> Analyzer<'p, L> {
    /// Collects every relation named in `statement`: tables, external
    /// tables, views and materialized views.
    ///
    /// Names bound to an enclosing CTE are skipped, as are system catalogs
    /// and names that do not exist in metadata. Relations read by user
    /// functions called in FROM are included. Each entry has an empty column.
    pub fn access_tables(&self, statement: &Statement) -> Result<SourceColumnSet, SpanError> {
        let mut tables = SourceColumnSet::new();
        let mut expanded = HashSet::new();
        self.collect_access(
            statement,
            &self.config.default_database,
            &self.config.default_schema,
            &mut tables,
            &mut expanded,
        )?;
        Ok(tables)
    }

    /// Reports whether every relation `statement` names is a system catalog.
    ///
    /// Naming both system and user relations fails with
    /// [`SpanError::MixedSystemAccess`]. A statement naming no relation at
    /// all is not a system query.
    pub fn reads_only_system_tables(&self, statement: &Statement) -> Result<bool, SpanError> {
        let config = &self.config;
        let mut system = None;
        let mut user = None;
        for reference in references(statement, config) {
            let Reference::Table(name) = reference else {
                continue;
            };
            if self.is_system_table(name, &config.default_database, &config.default_schema)? {
                system.get_or_insert(name);
            } else {
                user.get_or_insert(name);
            }
        }
        match (system, user) {
            (Some(system), Some(user)) => Err(SpanError::MixedSystemAccess {
                user: user.to_string(),
                system: system.to_string(),
            }),
            (system, _) => Ok(system.is_some()),
        }
    }

    fn collect_access(
        &self,
        statement: &Statement,
        database: &str,
        schema: &str,
        tables: &mut SourceColumnSet,
        expanded: &mut HashSet<ViewKey>,
    ) -> Result<(), SpanError> {
        for reference in references(statement, &self.config) {
            match reference {
                Reference::Table(name) => {
                    if self.is_system_table(name, database, schema)? {
                        continue;
                    }
                    if let Some(resource) = self.find_relation(name, database, schema)? {
                        tables.insert(resource);
                    }
                }
                Reference::Function(name) => {
                    let Some(function) = self.find_function(name, database, schema)? else {
                        continue;
                    };
                    if !expanded.insert(function.key) {
                        continue;
                    }
                    let body = parse_statement(
                        &function.definition,
                        self.config.dialect,
                        self.config.strategy,
                    )?;
                    self.collect_access(
                        &body,
                        &function.database,
                        &function.schema,
                        tables,
                        expanded,
                    )?;
                }
            }
        }
        Ok(())
    }

    /// A name points into a system catalog when its schema (or database,
    /// for `db.table` dialects) is a system one. Unqualified names with the
    /// dialect's catalog prefix count too unless metadata knows them.
    fn is_system_table(
        &self,
        name: &ObjectName,
        database: &str,
        schema: &str,
    ) -> Result<bool, SpanError> {
        let dialect = self.config.dialect;
        let qualifier = match dialect.namespace() {
            Namespace::DatabaseTable => name.database.as_deref().unwrap_or(database),
            Namespace::DatabaseSchemaTable => name.schema.as_deref().unwrap_or(schema),
        };
        if dialect.is_system_schema(qualifier) {
            return Ok(true);
        }
        let prefixed = name.is_unqualified()
            && dialect
                .system_table_prefix()
                .is_some_and(|prefix| name.name.to_lowercase().starts_with(prefix));
        Ok(prefixed && self.find_relation(name, database, schema)?.is_none())
    }

    fn find_relation(
        &self,
        name: &ObjectName,
        database: &str,
        schema: &str,
    ) -> Result<Option<ColumnResource>, SpanError> {
        let database_name = name.database.as_deref().unwrap_or(database);
        let Some(db) = self.cache.database(database_name)? else {
            return Ok(None);
        };
        let Some(found) = self.cache.schema(&db, name.schema.as_deref(), schema) else {
            return Ok(None);
        };
        Ok(found
            .relation(&name.name, self.config.strategy)
            .map(|relation| {
                ColumnResource::table(db.name.as_str(), found.name.as_str(), relation.name())
            }))
    }

    fn find_function(
        &self,
        name: &ObjectName,
        database: &str,
        schema: &str,
    ) -> Result<Option<FoundFunction>, SpanError> {
        let database_name = name.database.as_deref().unwrap_or(database);
        let Some(db) = self.cache.database(database_name)? else {
            return Ok(None);
        };
        let Some(found) = self.cache.schema(&db, name.schema.as_deref(), schema) else {
            return Ok(None);
        };
        Ok(found
            .function(&name.name, self.config.strategy)
            .map(|function| FoundFunction {
                key: self.definition_key(
                    DefinitionKind::Function,
                    &db.name,
                    &found.name,
                    &function.name,
                ),
                database: db.name.clone(),
                schema: found.name.clone(),
                definition: function.definition.clone(),
            }))
    }
}

struct FoundFunction {
    key: ViewKey,
    database: String,
    schema: String,
    definition: String,
}

/// A relation or function named in FROM.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Reference<'a> {
    Table(&'a ObjectName),
    Function(&'a ObjectName),
}

/// Lists the non-CTE names `statement` reads, in source order.
fn references<'s>(statement: &'s Statement, config: &AnalyzerConfig) -> Vec<Reference<'s>> {
    let mut collector = ReferenceCollector {
        config,
        found: Vec::new(),
    };
    match statement {
        Statement::Query(query) => collector.query(query, &[]),
        Statement::CreateView(view) => collector.query(&view.query, &[]),
        Statement::Explain | Statement::Unsupported { .. } => {}
    }
    collector.found
}

struct ReferenceCollector<'a, 's> {
    config: &'a AnalyzerConfig,
    found: Vec<Reference<'s>>,
}

impl<'s> ReferenceCollector<'_, 's> {
    fn query(&mut self, query: &'s Query, ctes: &[&'s str]) {
        let mut names: Vec<&str> = ctes.to_vec();
        if let Some(with) = &query.with {
            if with.recursive {
                names.extend(with.ctes.iter().map(|cte| cte.name.as_str()));
                for cte in &with.ctes {
                    self.query(&cte.query, &names);
                }
            } else {
                let implicit = self.config.dialect.implicit_recursive_ctes();
                for cte in &with.ctes {
                    if implicit && cte.query.references_table(&cte.name, self.config.strategy) {
                        names.push(&cte.name);
                        self.query(&cte.query, &names);
                    } else {
                        self.query(&cte.query, &names);
                        names.push(&cte.name);
                    }
                }
            }
        }
        self.set_expr(&query.body, &names);
    }

    fn set_expr(&mut self, body: &'s SetExpr, ctes: &[&'s str]) {
        match body {
            SetExpr::Select(select) => {
                for table in &select.from {
                    self.table_with_joins(table, ctes);
                }
                let mut subqueries = Vec::new();
                select.for_each_expr(&mut |expr| subqueries.extend(expr.subqueries()));
                for subquery in subqueries {
                    self.query(subquery, ctes);
                }
            }
            SetExpr::Query(query) => self.query(query, ctes),
            SetExpr::SetOperation { branches, .. } => {
                for branch in branches {
                    self.set_expr(branch, ctes);
                }
            }
            SetExpr::Values(values) => {
                for expr in values.rows.iter().flatten() {
                    for subquery in expr.subqueries() {
                        self.query(subquery, ctes);
                    }
                }
            }
        }
    }

    fn table_with_joins(&mut self, table: &'s TableWithJoins, ctes: &[&'s str]) {
        self.table_factor(&table.relation, ctes);
        for join in &table.joins {
            self.table_factor(&join.relation, ctes);
        }
    }

    fn table_factor(&mut self, factor: &'s TableFactor, ctes: &[&'s str]) {
        match factor {
            TableFactor::Table { name, .. } => {
                let strategy = self.config.strategy;
                let is_cte =
                    name.is_unqualified() && ctes.iter().any(|cte| strategy.matches(cte, &name.name));
                if !is_cte {
                    self.found.push(Reference::Table(name));
                }
            }
            TableFactor::Derived { query, .. } => self.query(query, ctes),
            TableFactor::NestedJoin { table, .. } => self.table_with_joins(table, ctes),
            TableFactor::Function { name, args, .. } => {
                self.found.push(Reference::Function(name));
                for subquery in args.iter().flat_map(|arg| arg.subqueries()) {
                    self.query(subquery, ctes);
                }
            }
        }
    }
}
