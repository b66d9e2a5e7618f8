//! Output column naming for unaliased select items.

use sqlparser::ast::{self as sql, SelectItem, SetExpr};

use crate::dialect::{NormalizationStrategy, OutputNaming};
use crate::types::Dialect;

const ANONYMOUS: &str = "?column?";

#[derive(Debug, Clone, Copy)]
pub(super) struct OutputNamer {
    dialect: Dialect,
    strategy: NormalizationStrategy,
}

impl OutputNamer {
    pub(super) fn new(dialect: Dialect, strategy: NormalizationStrategy) -> Self {
        Self { dialect, strategy }
    }

    /// Name of an identifier as the database would report it.
    pub(super) fn ident(&self, ident: &sql::Ident) -> String {
        if ident.quote_style.is_some() {
            ident.value.clone()
        } else {
            self.strategy.fold_unquoted(&ident.value)
        }
    }

    pub(super) fn expr_name(&self, expr: &sql::Expr) -> String {
        match expr {
            sql::Expr::Identifier(ident) => self.ident(ident),
            sql::Expr::CompoundIdentifier(parts) => {
                parts.last().map(|ident| self.ident(ident)).unwrap_or_default()
            }
            other => match self.dialect.output_naming() {
                OutputNaming::ExpressionText => other.to_string(),
                OutputNaming::Keyword => self.keyword_name(other),
            },
        }
    }

    fn keyword_name(&self, expr: &sql::Expr) -> String {
        use sql::Expr as E;
        match expr {
            E::Identifier(_) | E::CompoundIdentifier(_) => self.expr_name(expr),
            E::Nested(inner) => self.keyword_name(inner),
            E::Function(function) => function
                .name
                .0
                .last()
                .and_then(|part| part.as_ident())
                .map(|ident| ident.value.to_lowercase())
                .unwrap_or_else(|| ANONYMOUS.to_string()),
            E::Cast {
                expr, data_type, ..
            } => match self.keyword_name(expr) {
                name if name == ANONYMOUS => data_type.to_string().to_lowercase(),
                name => name,
            },
            E::TypedString(typed) => typed.data_type.to_string().to_lowercase(),
            E::Subquery(query) => self.single_target_name(&query.body),
            E::Case { .. } => "case".into(),
            E::Exists { .. } => "exists".into(),
            E::Array(_) => "array".into(),
            E::Tuple(_) => "row".into(),
            E::Extract { .. } => "extract".into(),
            E::Substring { .. } => "substring".into(),
            E::Trim { .. } => "btrim".into(),
            E::Position { .. } => "position".into(),
            E::Ceil { .. } => "ceil".into(),
            E::Floor { .. } => "floor".into(),
            E::Interval(_) => "interval".into(),
            _ => ANONYMOUS.into(),
        }
    }

    /// A scalar subquery takes the name of its only output column.
    fn single_target_name(&self, body: &SetExpr) -> String {
        match body {
            SetExpr::Select(select) => match select.projection.as_slice() {
                [SelectItem::UnnamedExpr(expr)] => self.keyword_name(expr),
                [SelectItem::ExprWithAlias { alias, .. }] => self.ident(alias),
                _ => ANONYMOUS.into(),
            },
            SetExpr::Query(query) => self.single_target_name(&query.body),
            SetExpr::SetOperation { left, .. } => self.single_target_name(left),
            _ => ANONYMOUS.into(),
        }
    }
}
