//! Dialect-neutral query AST consumed by the span analyzer.
//!
//! The parser front end lowers `sqlparser` statements into these types. Only
//! the constructs that matter for provenance survive: output naming is
//! already decided, identifiers are already split into database/schema/table
//! parts, and expressions the engine does not need to distinguish are kept
//! as [`Expr::Composite`].

use std::fmt;

use crate::dialect::NormalizationStrategy;

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Query(Box<Query>),
    CreateView(CreateView),
    /// EXPLAIN of any statement; reads no data.
    Explain,
    /// A statement the engine does not analyze (DML, DDL other than views).
    Unsupported { kind: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateView {
    pub name: ObjectName,
    pub column_aliases: Vec<String>,
    pub query: Box<Query>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub with: Option<With>,
    pub body: SetExpr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct With {
    pub recursive: bool,
    pub ctes: Vec<Cte>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cte {
    pub name: String,
    pub column_aliases: Vec<String>,
    pub query: Box<Query>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SetExpr {
    Select(Box<Select>),
    /// Parenthesized query, possibly with its own WITH clause.
    Query(Box<Query>),
    /// Chain of branches combined with the same operator, in source order.
    SetOperation {
        op: SetOperator,
        all: bool,
        branches: Vec<SetExpr>,
    },
    Values(Values),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOperator {
    Union,
    Intersect,
    Except,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Values {
    pub rows: Vec<Vec<Expr>>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Select {
    pub projection: Vec<SelectItem>,
    pub from: Vec<TableWithJoins>,
    pub selection: Option<Expr>,
    pub group_by: Vec<Expr>,
    pub having: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SelectItem {
    /// An expression with its output name already decided.
    Expr { expr: Expr, name: String },
    Wildcard,
    QualifiedWildcard(ObjectName),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableWithJoins {
    pub relation: TableFactor,
    pub joins: Vec<Join>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub relation: TableFactor,
    pub constraint: JoinConstraint,
}

#[derive(Debug, Clone, PartialEq)]
pub enum JoinConstraint {
    Natural,
    Using(Vec<String>),
    On(Expr),
    /// CROSS joins, APPLY and lateral joins without a condition.
    None,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TableFactor {
    Table {
        name: ObjectName,
        alias: Option<TableAlias>,
    },
    Derived {
        query: Box<Query>,
        alias: Option<TableAlias>,
    },
    NestedJoin {
        table: Box<TableWithJoins>,
        alias: Option<TableAlias>,
    },
    /// A set-returning function call, e.g. `generate_series(1, 3)`.
    Function {
        name: ObjectName,
        args: Vec<Expr>,
        alias: Option<TableAlias>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableAlias {
    pub name: String,
    pub columns: Vec<String>,
}

impl TableAlias {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
        }
    }
}

/// A possibly qualified table, view or CTE name.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ObjectName {
    pub database: Option<String>,
    pub schema: Option<String>,
    pub name: String,
}

impl ObjectName {
    pub fn bare(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn is_unqualified(&self) -> bool {
        self.database.is_none() && self.schema.is_none()
    }
}

impl fmt::Display for ObjectName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for part in [&self.database, &self.schema].into_iter().flatten() {
            write!(f, "{part}.")?;
        }
        f.write_str(&self.name)
    }
}

/// A possibly qualified column reference.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ColumnRef {
    pub database: Option<String>,
    pub schema: Option<String>,
    pub table: Option<String>,
    pub column: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Column(ColumnRef),
    /// Literals of any type, including typed strings and intervals.
    Literal,
    Null,
    /// Bind parameter or placeholder.
    Parameter,
    Unary(Box<Expr>),
    Binary {
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Function(Box<Function>),
    Case {
        operand: Option<Box<Expr>>,
        branches: Vec<CaseWhen>,
        else_result: Option<Box<Expr>>,
    },
    Between {
        expr: Box<Expr>,
        low: Box<Expr>,
        high: Box<Expr>,
    },
    InList {
        expr: Box<Expr>,
        list: Vec<Expr>,
    },
    InSubquery {
        expr: Box<Expr>,
        subquery: Box<Query>,
    },
    Exists(Box<Query>),
    Subquery(Box<Query>),
    Cast(Box<Expr>),
    IsNull(Box<Expr>),
    Like {
        expr: Box<Expr>,
        pattern: Box<Expr>,
    },
    Tuple(Vec<Expr>),
    /// Any other construct: provenance is the merge of the children.
    Composite(Vec<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CaseWhen {
    pub condition: Expr,
    pub result: Expr,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Function {
    pub name: String,
    /// Arguments that carry data; keyword arguments are already removed.
    pub args: Vec<Expr>,
    pub filter: Option<Expr>,
    pub partition_by: Vec<Expr>,
    pub order_by: Vec<Expr>,
}

impl Expr {
    pub fn column(table: Option<&str>, column: &str) -> Self {
        Expr::Column(ColumnRef {
            table: table.map(str::to_string),
            column: column.to_string(),
            ..ColumnRef::default()
        })
    }

    /// Calls `f` on each direct child expression.
    ///
    /// Subqueries are not children; use [`Expr::subqueries`] for those.
    pub fn for_each_child<'a>(&'a self, f: &mut impl FnMut(&'a Expr)) {
        match self {
            Expr::Column(_) | Expr::Literal | Expr::Null | Expr::Parameter => {}
            Expr::Exists(_) | Expr::Subquery(_) => {}
            Expr::Unary(inner) | Expr::Cast(inner) | Expr::IsNull(inner) => f(inner),
            Expr::Binary { left, right } => {
                f(left);
                f(right);
            }
            Expr::Function(func) => {
                func.args.iter().for_each(&mut *f);
                if let Some(filter) = &func.filter {
                    f(filter);
                }
                func.partition_by.iter().for_each(&mut *f);
                func.order_by.iter().for_each(&mut *f);
            }
            Expr::Case {
                operand,
                branches,
                else_result,
            } => {
                if let Some(operand) = operand {
                    f(operand);
                }
                for branch in branches {
                    f(&branch.condition);
                    f(&branch.result);
                }
                if let Some(else_result) = else_result {
                    f(else_result);
                }
            }
            Expr::Between { expr, low, high } => {
                f(expr);
                f(low);
                f(high);
            }
            Expr::InList { expr, list } => {
                f(expr);
                list.iter().for_each(&mut *f);
            }
            Expr::InSubquery { expr, .. } => f(expr),
            Expr::Like { expr, pattern } => {
                f(expr);
                f(pattern);
            }
            Expr::Tuple(items) | Expr::Composite(items) => items.iter().for_each(f),
        }
    }

    /// Collects every subquery nested in this expression, outermost first,
    /// without descending into the subqueries themselves.
    pub fn subqueries(&self) -> Vec<&Query> {
        let mut found = Vec::new();
        self.collect_subqueries(&mut found);
        found
    }

    fn collect_subqueries<'a>(&'a self, found: &mut Vec<&'a Query>) {
        match self {
            Expr::Exists(query) | Expr::Subquery(query) => found.push(query),
            Expr::InSubquery { subquery, .. } => found.push(subquery),
            _ => {}
        }
        let mut children = Vec::new();
        self.for_each_child(&mut |child| children.push(child));
        for child in children {
            child.collect_subqueries(found);
        }
    }
}

impl Select {
    /// Calls `f` on every expression owned by this SELECT, including join
    /// conditions, but not on expressions inside derived tables.
    pub fn for_each_expr<'a>(&'a self, f: &mut impl FnMut(&'a Expr)) {
        for item in &self.projection {
            if let SelectItem::Expr { expr, .. } = item {
                f(expr);
            }
        }
        for table in &self.from {
            table.for_each_join_condition(f);
        }
        if let Some(selection) = &self.selection {
            f(selection);
        }
        self.group_by.iter().for_each(&mut *f);
        if let Some(having) = &self.having {
            f(having);
        }
    }
}

impl TableWithJoins {
    fn for_each_join_condition<'a>(&'a self, f: &mut impl FnMut(&'a Expr)) {
        if let TableFactor::NestedJoin { table, .. } = &self.relation {
            table.for_each_join_condition(f);
        }
        for join in &self.joins {
            if let TableFactor::NestedJoin { table, .. } = &join.relation {
                table.for_each_join_condition(f);
            }
            if let JoinConstraint::On(expr) = &join.constraint {
                f(expr);
            }
        }
    }
}

impl Query {
    /// True when this query declares a CTE called `name` at its top level.
    pub fn declares_cte(&self, name: &str, strategy: NormalizationStrategy) -> bool {
        self.with
            .as_ref()
            .is_some_and(|with| with.ctes.iter().any(|cte| strategy.matches(&cte.name, name)))
    }

    /// True when `name`, unqualified, is read somewhere in this query.
    ///
    /// Queries that redeclare `name` in their own WITH clause shadow it and
    /// are not searched.
    pub fn references_table(&self, name: &str, strategy: NormalizationStrategy) -> bool {
        if self.declares_cte(name, strategy) {
            return false;
        }
        let in_ctes = self.with.as_ref().is_some_and(|with| {
            with.ctes
                .iter()
                .any(|cte| cte.query.references_table(name, strategy))
        });
        in_ctes || self.body.references_table(name, strategy)
    }
}

impl SetExpr {
    pub fn references_table(&self, name: &str, strategy: NormalizationStrategy) -> bool {
        match self {
            SetExpr::Select(select) => {
                select
                    .from
                    .iter()
                    .any(|table| table.references_table(name, strategy))
                    || select_expr_references(select, name, strategy)
            }
            SetExpr::Query(query) => query.references_table(name, strategy),
            SetExpr::SetOperation { branches, .. } => branches
                .iter()
                .any(|branch| branch.references_table(name, strategy)),
            SetExpr::Values(values) => values.rows.iter().flatten().any(|expr| {
                expr.subqueries()
                    .iter()
                    .any(|query| query.references_table(name, strategy))
            }),
        }
    }
}

fn select_expr_references(select: &Select, name: &str, strategy: NormalizationStrategy) -> bool {
    let mut found = false;
    select.for_each_expr(&mut |expr| {
        if !found {
            found = expr
                .subqueries()
                .iter()
                .any(|query| query.references_table(name, strategy));
        }
    });
    found
}

impl TableWithJoins {
    pub fn references_table(&self, name: &str, strategy: NormalizationStrategy) -> bool {
        self.relation.references_table(name, strategy)
            || self
                .joins
                .iter()
                .any(|join| join.relation.references_table(name, strategy))
    }
}

impl TableFactor {
    pub fn references_table(&self, name: &str, strategy: NormalizationStrategy) -> bool {
        match self {
            TableFactor::Table { name: object, .. } => {
                object.is_unqualified() && strategy.matches(&object.name, name)
            }
            TableFactor::Derived { query, .. } => query.references_table(name, strategy),
            TableFactor::NestedJoin { table, .. } => table.references_table(name, strategy),
            TableFactor::Function { args, .. } => args
                .iter()
                .flat_map(Expr::subqueries)
                .any(|query| query.references_table(name, strategy)),
        }
    }
}
