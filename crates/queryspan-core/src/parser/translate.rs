//! Lowering of `sqlparser` statements into the neutral AST.

use std::ops::ControlFlow;

use sqlparser::ast::{
    self as sql, FunctionArg, FunctionArgExpr, FunctionArgumentClause, FunctionArguments,
    GroupByExpr, JoinOperator, SelectItemQualifiedWildcardKind, SetOperator, SetQuantifier,
    Visit, Visitor, WindowType,
};

use super::naming::OutputNamer;
use crate::ast;
use crate::dialect::{skip_args_for_function, Namespace, NormalizationStrategy};
use crate::error::SpanError;
use crate::types::Dialect;

/// Lowers `sqlparser` ASTs for one dialect.
#[derive(Debug, Clone, Copy)]
pub struct Translator {
    dialect: Dialect,
    strategy: NormalizationStrategy,
}

impl Translator {
    pub fn new(dialect: Dialect, strategy: NormalizationStrategy) -> Self {
        Self { dialect, strategy }
    }

    fn namer(&self) -> OutputNamer {
        OutputNamer::new(self.dialect, self.strategy)
    }

    pub fn statement(&self, statement: &sql::Statement) -> Result<ast::Statement, SpanError> {
        match statement {
            sql::Statement::Query(query) => Ok(ast::Statement::Query(Box::new(self.query(query)?))),
            sql::Statement::CreateView {
                name,
                columns,
                query,
                ..
            } => Ok(ast::Statement::CreateView(ast::CreateView {
                name: self.object_name(name)?,
                column_aliases: columns
                    .iter()
                    .map(|column| self.namer().ident(&column.name))
                    .collect(),
                query: Box::new(self.query(query)?),
            })),
            sql::Statement::Explain { .. } | sql::Statement::ExplainTable { .. } => {
                Ok(ast::Statement::Explain)
            }
            other => Ok(ast::Statement::Unsupported {
                kind: statement_kind(other),
            }),
        }
    }

    pub fn query(&self, query: &sql::Query) -> Result<ast::Query, SpanError> {
        let with = match &query.with {
            Some(with) => Some(ast::With {
                recursive: with.recursive,
                ctes: with
                    .cte_tables
                    .iter()
                    .map(|cte| {
                        Ok::<_, SpanError>(ast::Cte {
                            name: cte.alias.name.value.clone(),
                            column_aliases: cte
                                .alias
                                .columns
                                .iter()
                                .map(|column| self.namer().ident(&column.name))
                                .collect(),
                            query: Box::new(self.query(&cte.query)?),
                        })
                    })
                    .collect::<Result<_, SpanError>>()?,
            }),
            None => None,
        };
        Ok(ast::Query {
            with,
            body: self.set_expr(&query.body)?,
        })
    }

    fn set_expr(&self, body: &sql::SetExpr) -> Result<ast::SetExpr, SpanError> {
        match body {
            sql::SetExpr::Select(select) => Ok(ast::SetExpr::Select(Box::new(self.select(select)?))),
            sql::SetExpr::Query(query) => Ok(ast::SetExpr::Query(Box::new(self.query(query)?))),
            sql::SetExpr::SetOperation {
                op,
                set_quantifier,
                left,
                right,
            } => {
                let op = match op {
                    SetOperator::Union => ast::SetOperator::Union,
                    SetOperator::Intersect => ast::SetOperator::Intersect,
                    SetOperator::Except | SetOperator::Minus => ast::SetOperator::Except,
                };
                let all = matches!(set_quantifier, SetQuantifier::All | SetQuantifier::AllByName);
                let right = self.set_expr(right)?;
                // Left-deep chains of the same operator become one flat branch list.
                let branches = match self.set_expr(left)? {
                    ast::SetExpr::SetOperation {
                        op: left_op,
                        all: left_all,
                        mut branches,
                    } if left_op == op && left_all == all => {
                        branches.push(right);
                        branches
                    }
                    left => vec![left, right],
                };
                Ok(ast::SetExpr::SetOperation { op, all, branches })
            }
            sql::SetExpr::Values(values) => Ok(ast::SetExpr::Values(ast::Values {
                rows: values
                    .rows
                    .iter()
                    .map(|row| self.exprs(row))
                    .collect::<Result<_, SpanError>>()?,
            })),
            other => Err(SpanError::UnsupportedConstruct {
                construct: format!("set expression `{other}`"),
            }),
        }
    }

    fn select(&self, select: &sql::Select) -> Result<ast::Select, SpanError> {
        let projection = select
            .projection
            .iter()
            .map(|item| self.select_item(item))
            .collect::<Result<_, SpanError>>()?;
        let from = select
            .from
            .iter()
            .map(|table| self.table_with_joins(table))
            .collect::<Result<_, SpanError>>()?;
        let group_by = match &select.group_by {
            GroupByExpr::Expressions(exprs, _) => exprs
                .iter()
                .map(|expr| self.expr(expr))
                .collect::<Result<_, SpanError>>()?,
            GroupByExpr::All(_) => Vec::new(),
        };
        Ok(ast::Select {
            projection,
            from,
            selection: self.optional_expr(select.selection.as_ref())?,
            group_by,
            having: self.optional_expr(select.having.as_ref())?,
        })
    }

    fn select_item(&self, item: &sql::SelectItem) -> Result<ast::SelectItem, SpanError> {
        match item {
            sql::SelectItem::UnnamedExpr(expr) => Ok(ast::SelectItem::Expr {
                name: self.namer().expr_name(expr),
                expr: self.expr(expr)?,
            }),
            sql::SelectItem::ExprWithAlias { expr, alias } => Ok(ast::SelectItem::Expr {
                name: self.namer().ident(alias),
                expr: self.expr(expr)?,
            }),
            sql::SelectItem::Wildcard(_) => Ok(ast::SelectItem::Wildcard),
            sql::SelectItem::QualifiedWildcard(kind, _) => match kind {
                SelectItemQualifiedWildcardKind::ObjectName(name) => {
                    Ok(ast::SelectItem::QualifiedWildcard(self.object_name(name)?))
                }
                SelectItemQualifiedWildcardKind::Expr(expr) => Err(SpanError::UnsupportedConstruct {
                    construct: format!("wildcard over expression `{expr}`"),
                }),
            },
        }
    }

    fn table_with_joins(
        &self,
        table: &sql::TableWithJoins,
    ) -> Result<ast::TableWithJoins, SpanError> {
        let joins = table
            .joins
            .iter()
            .map(|join| {
                Ok::<_, SpanError>(ast::Join {
                    relation: self.table_factor(&join.relation)?,
                    constraint: self.join_constraint(&join.join_operator)?,
                })
            })
            .collect::<Result<_, SpanError>>()?;
        Ok(ast::TableWithJoins {
            relation: self.table_factor(&table.relation)?,
            joins,
        })
    }

    fn join_constraint(&self, operator: &JoinOperator) -> Result<ast::JoinConstraint, SpanError> {
        let constraint = match operator {
            JoinOperator::Join(constraint)
            | JoinOperator::Inner(constraint)
            | JoinOperator::Left(constraint)
            | JoinOperator::LeftOuter(constraint)
            | JoinOperator::Right(constraint)
            | JoinOperator::RightOuter(constraint)
            | JoinOperator::FullOuter(constraint)
            | JoinOperator::CrossJoin(constraint)
            | JoinOperator::Semi(constraint)
            | JoinOperator::LeftSemi(constraint)
            | JoinOperator::RightSemi(constraint)
            | JoinOperator::Anti(constraint)
            | JoinOperator::LeftAnti(constraint)
            | JoinOperator::RightAnti(constraint)
            | JoinOperator::StraightJoin(constraint) => constraint,
            JoinOperator::AsOf { constraint, .. } => constraint,
            JoinOperator::CrossApply | JoinOperator::OuterApply => {
                return Ok(ast::JoinConstraint::None)
            }
        };
        Ok(match constraint {
            sql::JoinConstraint::On(expr) => ast::JoinConstraint::On(self.expr(expr)?),
            sql::JoinConstraint::Using(names) => ast::JoinConstraint::Using(
                names
                    .iter()
                    .map(|name| object_name_parts(name).pop().unwrap_or_default())
                    .collect(),
            ),
            sql::JoinConstraint::Natural => ast::JoinConstraint::Natural,
            sql::JoinConstraint::None => ast::JoinConstraint::None,
        })
    }

    fn table_factor(&self, factor: &sql::TableFactor) -> Result<ast::TableFactor, SpanError> {
        match factor {
            sql::TableFactor::Table {
                name,
                alias,
                args: Some(table_args),
                ..
            } => Ok(ast::TableFactor::Function {
                name: self.object_name(name)?,
                args: self.table_function_args(&table_args.args)?,
                alias: alias.as_ref().map(|alias| self.table_alias(alias)),
            }),
            sql::TableFactor::Function {
                name, args, alias, ..
            } => Ok(ast::TableFactor::Function {
                name: self.object_name(name)?,
                args: self.table_function_args(args)?,
                alias: alias.as_ref().map(|alias| self.table_alias(alias)),
            }),
            sql::TableFactor::UNNEST {
                alias, array_exprs, ..
            } => Ok(ast::TableFactor::Function {
                name: ast::ObjectName::bare("unnest"),
                args: self.exprs(array_exprs)?,
                alias: alias.as_ref().map(|alias| self.table_alias(alias)),
            }),
            sql::TableFactor::Table { name, alias, .. } => Ok(ast::TableFactor::Table {
                name: self.object_name(name)?,
                alias: alias.as_ref().map(|alias| self.table_alias(alias)),
            }),
            sql::TableFactor::Derived {
                subquery, alias, ..
            } => Ok(ast::TableFactor::Derived {
                query: Box::new(self.query(subquery)?),
                alias: alias.as_ref().map(|alias| self.table_alias(alias)),
            }),
            sql::TableFactor::NestedJoin {
                table_with_joins,
                alias,
            } => Ok(ast::TableFactor::NestedJoin {
                table: Box::new(self.table_with_joins(table_with_joins)?),
                alias: alias.as_ref().map(|alias| self.table_alias(alias)),
            }),
            other => Err(SpanError::UnsupportedConstruct {
                construct: format!("table factor `{other}`"),
            }),
        }
    }

    fn table_function_args(&self, args: &[FunctionArg]) -> Result<Vec<ast::Expr>, SpanError> {
        let mut exprs = Vec::with_capacity(args.len());
        for arg in args {
            let arg = match arg {
                FunctionArg::Unnamed(arg)
                | FunctionArg::Named { arg, .. }
                | FunctionArg::ExprNamed { arg, .. } => arg,
            };
            if let FunctionArgExpr::Expr(expr) = arg {
                exprs.push(self.expr(expr)?);
            }
        }
        Ok(exprs)
    }

    fn table_alias(&self, alias: &sql::TableAlias) -> ast::TableAlias {
        ast::TableAlias {
            name: alias.name.value.clone(),
            columns: alias
                .columns
                .iter()
                .map(|column| self.namer().ident(&column.name))
                .collect(),
        }
    }

    fn object_name(&self, name: &sql::ObjectName) -> Result<ast::ObjectName, SpanError> {
        split_object_name(object_name_parts(name), self.dialect)
    }

    fn optional_expr(&self, expr: Option<&sql::Expr>) -> Result<Option<ast::Expr>, SpanError> {
        expr.map(|expr| self.expr(expr)).transpose()
    }

    fn boxed(&self, expr: &sql::Expr) -> Result<Box<ast::Expr>, SpanError> {
        self.expr(expr).map(Box::new)
    }

    fn exprs<'a>(
        &self,
        exprs: impl IntoIterator<Item = &'a sql::Expr>,
    ) -> Result<Vec<ast::Expr>, SpanError> {
        exprs.into_iter().map(|expr| self.expr(expr)).collect()
    }

    pub fn expr(&self, expr: &sql::Expr) -> Result<ast::Expr, SpanError> {
        use sql::Expr as E;
        Ok(match expr {
            E::Identifier(ident) => ast::Expr::Column(ast::ColumnRef {
                column: ident.value.clone(),
                ..ast::ColumnRef::default()
            }),
            E::CompoundIdentifier(parts) => ast::Expr::Column(self.column_ref(parts)?),
            E::Value(value) => match &value.value {
                sql::Value::Null => ast::Expr::Null,
                sql::Value::Placeholder(_) => ast::Expr::Parameter,
                _ => ast::Expr::Literal,
            },
            E::TypedString { .. } => ast::Expr::Literal,
            E::Nested(inner) => self.expr(inner)?,
            E::UnaryOp { expr: inner, .. }
            | E::Extract { expr: inner, .. }
            | E::Ceil { expr: inner, .. }
            | E::Floor { expr: inner, .. }
            | E::IsFalse(inner)
            | E::IsNotFalse(inner)
            | E::IsTrue(inner)
            | E::IsNotTrue(inner)
            | E::IsUnknown(inner)
            | E::IsNotUnknown(inner) => ast::Expr::Unary(self.boxed(inner)?),
            E::Cast { expr: inner, .. } => ast::Expr::Cast(self.boxed(inner)?),
            E::IsNull(inner) | E::IsNotNull(inner) => ast::Expr::IsNull(self.boxed(inner)?),
            E::BinaryOp { left, right, .. }
            | E::AnyOp { left, right, .. }
            | E::AllOp { left, right, .. } => ast::Expr::Binary {
                left: self.boxed(left)?,
                right: self.boxed(right)?,
            },
            E::IsDistinctFrom(left, right) | E::IsNotDistinctFrom(left, right) => {
                ast::Expr::Binary {
                    left: self.boxed(left)?,
                    right: self.boxed(right)?,
                }
            }
            E::Like { expr, pattern, .. }
            | E::ILike { expr, pattern, .. }
            | E::SimilarTo { expr, pattern, .. }
            | E::RLike { expr, pattern, .. } => ast::Expr::Like {
                expr: self.boxed(expr)?,
                pattern: self.boxed(pattern)?,
            },
            E::Between {
                expr, low, high, ..
            } => ast::Expr::Between {
                expr: self.boxed(expr)?,
                low: self.boxed(low)?,
                high: self.boxed(high)?,
            },
            E::InList { expr, list, .. } => ast::Expr::InList {
                expr: self.boxed(expr)?,
                list: self.exprs(list)?,
            },
            E::InSubquery { expr, subquery, .. } => ast::Expr::InSubquery {
                expr: self.boxed(expr)?,
                subquery: Box::new(self.query(subquery)?),
            },
            E::Exists { subquery, .. } => ast::Expr::Exists(Box::new(self.query(subquery)?)),
            E::Subquery(query) => ast::Expr::Subquery(Box::new(self.query(query)?)),
            E::Tuple(items) => ast::Expr::Tuple(self.exprs(items)?),
            E::Case {
                operand,
                conditions,
                else_result,
                ..
            } => ast::Expr::Case {
                operand: operand.as_deref().map(|op| self.boxed(op)).transpose()?,
                branches: conditions
                    .iter()
                    .map(|when| {
                        Ok::<_, SpanError>(ast::CaseWhen {
                            condition: self.expr(&when.condition)?,
                            result: self.expr(&when.result)?,
                        })
                    })
                    .collect::<Result<_, SpanError>>()?,
                else_result: else_result
                    .as_deref()
                    .map(|result| self.boxed(result))
                    .transpose()?,
            },
            E::Position { expr, r#in } => ast::Expr::Composite(vec![self.expr(expr)?, self.expr(r#in)?]),
            E::AtTimeZone {
                timestamp,
                time_zone,
            } => ast::Expr::Composite(vec![self.expr(timestamp)?, self.expr(time_zone)?]),
            E::Substring {
                expr,
                substring_from,
                substring_for,
                ..
            } => {
                let mut children = vec![self.expr(expr)?];
                for part in [substring_from, substring_for].into_iter().flatten() {
                    children.push(self.expr(part)?);
                }
                ast::Expr::Composite(children)
            }
            E::Function(function) => ast::Expr::Function(Box::new(self.function(function)?)),
            other => self.fallback(other)?,
        })
    }

    fn function(&self, function: &sql::Function) -> Result<ast::Function, SpanError> {
        let name = object_name_parts(&function.name)
            .pop()
            .unwrap_or_default()
            .to_lowercase();
        let skip = skip_args_for_function(self.dialect, &name);

        let mut args = Vec::new();
        let mut order_by = Vec::new();
        match &function.args {
            FunctionArguments::None => {}
            FunctionArguments::Subquery(query) => {
                args.push(ast::Expr::Subquery(Box::new(self.query(query)?)));
            }
            FunctionArguments::List(list) => {
                for (index, arg) in list.args.iter().enumerate() {
                    if skip.contains(&index) {
                        continue;
                    }
                    let arg = match arg {
                        FunctionArg::Unnamed(arg)
                        | FunctionArg::Named { arg, .. }
                        | FunctionArg::ExprNamed { arg, .. } => arg,
                    };
                    if let FunctionArgExpr::Expr(expr) = arg {
                        args.push(self.expr(expr)?);
                    }
                }
                for clause in &list.clauses {
                    if let FunctionArgumentClause::OrderBy(exprs) = clause {
                        order_by.extend(self.exprs(exprs.iter().map(|order| &order.expr))?);
                    }
                }
            }
        }

        order_by.extend(self.exprs(function.within_group.iter().map(|order| &order.expr))?);
        let mut partition_by = Vec::new();
        if let Some(WindowType::WindowSpec(spec)) = &function.over {
            partition_by = self.exprs(&spec.partition_by)?;
            order_by.extend(self.exprs(spec.order_by.iter().map(|order| &order.expr))?);
        }

        Ok(ast::Function {
            name,
            args,
            filter: self.optional_expr(function.filter.as_deref())?,
            partition_by,
            order_by,
        })
    }

    fn column_ref(&self, parts: &[sql::Ident]) -> Result<ast::ColumnRef, SpanError> {
        let Some((column, qualifier)) = parts.split_last() else {
            return Err(SpanError::malformed("empty column reference"));
        };
        if qualifier.is_empty() {
            return Ok(ast::ColumnRef {
                column: column.value.clone(),
                ..ast::ColumnRef::default()
            });
        }
        let table = split_object_name(
            qualifier.iter().map(|ident| ident.value.clone()).collect(),
            self.dialect,
        )?;
        Ok(ast::ColumnRef {
            database: table.database,
            schema: table.schema,
            table: Some(table.name),
            column: column.value.clone(),
        })
    }

    /// Lowers an expression the translator has no dedicated rule for.
    ///
    /// Every column reference and subquery reachable without entering a
    /// nested query becomes a child of an [`ast::Expr::Composite`].
    fn fallback(&self, expr: &sql::Expr) -> Result<ast::Expr, SpanError> {
        let mut collector = ReferenceCollector::default();
        let _ = expr.visit(&mut collector);

        let mut children = Vec::new();
        for reference in &collector.columns {
            children.push(ast::Expr::Column(self.column_ref(reference)?));
        }
        for query in &collector.subqueries {
            children.push(ast::Expr::Subquery(Box::new(self.query(query)?)));
        }
        Ok(ast::Expr::Composite(children))
    }
}

#[derive(Default)]
struct ReferenceCollector {
    depth: usize,
    columns: Vec<Vec<sql::Ident>>,
    subqueries: Vec<sql::Query>,
}

impl Visitor for ReferenceCollector {
    type Break = ();

    fn pre_visit_query(&mut self, query: &sql::Query) -> ControlFlow<Self::Break> {
        if self.depth == 0 {
            self.subqueries.push(query.clone());
        }
        self.depth += 1;
        ControlFlow::Continue(())
    }

    fn post_visit_query(&mut self, _query: &sql::Query) -> ControlFlow<Self::Break> {
        self.depth -= 1;
        ControlFlow::Continue(())
    }

    fn pre_visit_expr(&mut self, expr: &sql::Expr) -> ControlFlow<Self::Break> {
        if self.depth == 0 {
            match expr {
                sql::Expr::Identifier(ident) => self.columns.push(vec![ident.clone()]),
                sql::Expr::CompoundIdentifier(parts) => self.columns.push(parts.clone()),
                _ => {}
            }
        }
        ControlFlow::Continue(())
    }
}

/// Returns the identifier parts of an object name as written.
pub(crate) fn object_name_parts(name: &sql::ObjectName) -> Vec<String> {
    name.0
        .iter()
        .map(|part| match part.as_ident() {
            Some(ident) => ident.value.clone(),
            None => part.to_string(),
        })
        .collect()
}

/// Maps name parts onto database/schema/table per the dialect's namespace.
pub fn split_object_name(
    mut parts: Vec<String>,
    dialect: Dialect,
) -> Result<ast::ObjectName, SpanError> {
    let too_long = || SpanError::malformed(format!("too many name parts in `{}`", parts.join(".")));
    let max_parts = match dialect.namespace() {
        Namespace::DatabaseTable => 2,
        Namespace::DatabaseSchemaTable => 3,
    };
    if parts.len() > max_parts {
        return Err(too_long());
    }
    let Some(name) = parts.pop() else {
        return Err(SpanError::malformed("empty object name"));
    };
    let (database, schema) = match (dialect.namespace(), parts.len()) {
        (_, 0) => (None, None),
        (Namespace::DatabaseTable, _) => (parts.pop(), None),
        (Namespace::DatabaseSchemaTable, 1) => (None, parts.pop()),
        (Namespace::DatabaseSchemaTable, _) => {
            let schema = parts.pop();
            (parts.pop(), schema)
        }
    };
    Ok(ast::ObjectName {
        database,
        schema,
        name,
    })
}

fn statement_kind(statement: &sql::Statement) -> String {
    let text = statement.to_string();
    let mut words = text.split_whitespace();
    let first = words.next().unwrap_or_default().to_uppercase();
    match first.as_str() {
        "CREATE" | "DROP" | "ALTER" => match words.next() {
            Some(second) => format!("{first} {}", second.to_uppercase()),
            None => first,
        },
        _ => first,
    }
}
