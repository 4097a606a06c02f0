//! The filter half of the Expression Compiler.

use crate::dialect_registry::{MbqlDialect, NodeKind};
use crate::error::CompileError;
use crate::mbql::{FieldClause, FilterClause, Scalar, ValueClause};
use crate::metadata::InMemoryMetadataStore;
use crate::sql::expr::{func, BinaryOperator, Expr, Literal, UnaryOperator};

use super::{Compiler, Context};

impl<'a> Compiler<'a> {
    pub(super) fn to_sql_ast_filter(
        &self,
        store: &mut InMemoryMetadataStore,
        ctx: &Context,
        f: &FilterClause,
    ) -> Result<Expr, CompileError> {
        let expr = match f {
            FilterClause::Eq(fc, v) => self.cmp(store, ctx, fc, v, BinaryOperator::Eq)?,
            FilterClause::Ne(fc, v) => self.cmp(store, ctx, fc, v, BinaryOperator::Ne)?,
            FilterClause::Lt(fc, v) => self.cmp(store, ctx, fc, v, BinaryOperator::Lt)?,
            FilterClause::Lte(fc, v) => self.cmp(store, ctx, fc, v, BinaryOperator::Lte)?,
            FilterClause::Gt(fc, v) => self.cmp(store, ctx, fc, v, BinaryOperator::Gt)?,
            FilterClause::Gte(fc, v) => self.cmp(store, ctx, fc, v, BinaryOperator::Gte)?,
            FilterClause::Between { field, lo, hi } => {
                let expr = self.to_sql_ast_field(store, ctx, field)?;
                let low = self.to_sql_ast_value(store, ctx, lo)?;
                let high = self.to_sql_ast_value(store, ctx, hi)?;
                Expr::Between {
                    expr: Box::new(expr),
                    low: Box::new(low),
                    high: Box::new(high),
                    negated: false,
                }
            }
            FilterClause::StartsWith {
                field,
                value,
                case_sensitive,
            } => self.like_filter(store, ctx, field, value, *case_sensitive, |s| format!("{s}%"))?,
            FilterClause::Contains {
                field,
                value,
                case_sensitive,
            } => self.like_filter(store, ctx, field, value, *case_sensitive, |s| format!("%{s}%"))?,
            FilterClause::EndsWith {
                field,
                value,
                case_sensitive,
            } => self.like_filter(store, ctx, field, value, *case_sensitive, |s| format!("%{s}"))?,
            FilterClause::And(children) => {
                self.fold_combinator(store, ctx, children, BinaryOperator::And)?
            }
            FilterClause::Or(children) => {
                self.fold_combinator(store, ctx, children, BinaryOperator::Or)?
            }
            FilterClause::Not(inner) => {
                let e = self.to_sql_ast_filter(store, ctx, inner)?;
                Expr::UnaryOp {
                    op: UnaryOperator::Not,
                    expr: Box::new(Expr::Paren(Box::new(e))),
                }
            }
        };
        Ok(self.dialect.to_sql_ast(NodeKind::Filter, expr))
    }

    fn cmp(
        &self,
        store: &mut InMemoryMetadataStore,
        ctx: &Context,
        fc: &FieldClause,
        v: &ValueClause,
        op: BinaryOperator,
    ) -> Result<Expr, CompileError> {
        let left = self.to_sql_ast_field(store, ctx, fc)?;
        let right = self.to_sql_ast_value(store, ctx, v)?;
        Ok(Expr::BinaryOp {
            left: Box::new(left),
            op,
            right: Box::new(right),
        })
    }

    fn fold_combinator(
        &self,
        store: &mut InMemoryMetadataStore,
        ctx: &Context,
        children: &[FilterClause],
        op: BinaryOperator,
    ) -> Result<Expr, CompileError> {
        let mut iter = children.iter();
        let first = iter.next().ok_or_else(|| {
            CompileError::InvalidInnerQuery("and/or filter has no operands".into())
        })?;
        let mut acc = Expr::Paren(Box::new(self.to_sql_ast_filter(store, ctx, first)?));
        for child in iter {
            let next = Expr::Paren(Box::new(self.to_sql_ast_filter(store, ctx, child)?));
            acc = Expr::BinaryOp {
                left: Box::new(acc),
                op,
                right: Box::new(next),
            };
        }
        Ok(acc)
    }

    /// `starts-with`/`contains`/`ends-with`, sharing the LIKE-pattern shape.
    /// `%`/`_` in the user's value are not escaped — a known, preserved
    /// deficiency rather than something this resolves.
    fn like_filter(
        &self,
        store: &mut InMemoryMetadataStore,
        ctx: &Context,
        field: &FieldClause,
        value: &ValueClause,
        case_sensitive: bool,
        make_pattern: impl Fn(&str) -> String,
    ) -> Result<Expr, CompileError> {
        let field_expr = self.to_sql_ast_field(store, ctx, field)?;
        let raw = scalar_string(value);
        let pattern = make_pattern(&raw);
        let pattern_expr = Expr::Param(Literal::String(pattern));

        if case_sensitive {
            Ok(Expr::BinaryOp {
                left: Box::new(field_expr),
                op: BinaryOperator::Like,
                right: Box::new(pattern_expr),
            })
        } else {
            Ok(Expr::BinaryOp {
                left: Box::new(func("LOWER", vec![field_expr])),
                op: BinaryOperator::Like,
                right: Box::new(func("LOWER", vec![pattern_expr])),
            })
        }
    }
}

fn scalar_string(v: &ValueClause) -> String {
    match v {
        ValueClause::Value(Scalar::String(s)) => s.clone(),
        ValueClause::Value(Scalar::Int(n)) => n.to_string(),
        ValueClause::Value(Scalar::Float(f)) => f.to_string(),
        ValueClause::Value(Scalar::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}
