//! The aggregation half of the Expression Compiler.

use crate::dialect_registry::{MbqlDialect, NodeKind};
use crate::error::CompileError;
use crate::mbql::{Aggregand, AggregationClause, ArithOp};
use crate::metadata::InMemoryMetadataStore;
use crate::sql::expr::{
    avg, count, count_distinct, count_star, func, max, min, sum, BinaryOperator, Expr, Literal,
};

use super::expr::{promote_int_literal, zero_guard};
use super::{Compiler, Context};

impl<'a> Compiler<'a> {
    pub(super) fn to_sql_ast_aggregation(
        &self,
        store: &mut InMemoryMetadataStore,
        ctx: &Context,
        ag: &AggregationClause,
    ) -> Result<Expr, CompileError> {
        let expr = match ag {
            AggregationClause::Count(None) => count_star(),
            AggregationClause::Count(Some(f)) => count(self.to_sql_ast_field(store, ctx, f)?),
            AggregationClause::Avg(f) => avg(self.to_sql_ast_field(store, ctx, f)?),
            AggregationClause::Sum(f) => sum(self.to_sql_ast_field(store, ctx, f)?),
            AggregationClause::Min(f) => min(self.to_sql_ast_field(store, ctx, f)?),
            AggregationClause::Max(f) => max(self.to_sql_ast_field(store, ctx, f)?),
            AggregationClause::Stddev(f) => {
                func("STDDEV", vec![self.to_sql_ast_field(store, ctx, f)?])
            }
            AggregationClause::Distinct(f) => {
                count_distinct(self.to_sql_ast_field(store, ctx, f)?)
            }
            AggregationClause::SumWhere { arg, pred } => {
                let pred_expr = self.to_sql_ast_filter(store, ctx, pred)?;
                let arg_expr = self.to_sql_ast_aggregand(store, ctx, arg)?;
                func(
                    "SUM",
                    vec![Expr::Case {
                        operand: None,
                        when_clauses: vec![(pred_expr, arg_expr)],
                        else_clause: Some(Box::new(Expr::Literal(Literal::Float(0.0)))),
                    }],
                )
            }
            AggregationClause::CountWhere(pred) => {
                return self.to_sql_ast_aggregation(
                    store,
                    ctx,
                    &AggregationClause::SumWhere {
                        arg: Aggregand::Number(1.0),
                        pred: pred.clone(),
                    },
                );
            }
            AggregationClause::Share(pred) => {
                return self.to_sql_ast_aggregation(
                    store,
                    ctx,
                    &AggregationClause::Arithmetic {
                        op: ArithOp::Div,
                        args: vec![
                            AggregationClause::CountWhere(pred.clone()),
                            AggregationClause::Count(None),
                        ],
                    },
                );
            }
            AggregationClause::Named { inner, .. } => {
                return self.to_sql_ast_aggregation(store, ctx, inner);
            }
            AggregationClause::Arithmetic { op, args } => {
                self.compile_arithmetic(store, ctx, *op, args)?
            }
            AggregationClause::Ref(index) => self.compile_aggregation_ref(store, ctx, *index)?,
            AggregationClause::Number(n) => Expr::Literal(Literal::Float(*n)),
        };
        Ok(self.dialect.to_sql_ast(NodeKind::Aggregation, expr))
    }

    fn to_sql_ast_aggregand(
        &self,
        store: &mut InMemoryMetadataStore,
        ctx: &Context,
        a: &Aggregand,
    ) -> Result<Expr, CompileError> {
        match a {
            Aggregand::Field(fc) => self.to_sql_ast_field(store, ctx, fc),
            Aggregand::Number(n) => Ok(Expr::Literal(Literal::Float(*n))),
        }
    }

    fn compile_arithmetic(
        &self,
        store: &mut InMemoryMetadataStore,
        ctx: &Context,
        op: ArithOp,
        args: &[AggregationClause],
    ) -> Result<Expr, CompileError> {
        let mut iter = args.iter();
        let first = iter.next().ok_or_else(|| {
            CompileError::InvalidInnerQuery("arithmetic aggregation has no operands".into())
        })?;
        let mut acc = promote_int_literal(self.to_sql_ast_aggregation(store, ctx, first)?);

        if op == ArithOp::Div {
            for arg in iter {
                let divisor = promote_int_literal(self.to_sql_ast_aggregation(store, ctx, arg)?);
                acc = Expr::BinaryOp {
                    left: Box::new(acc),
                    op: BinaryOperator::Div,
                    right: Box::new(zero_guard(divisor)),
                };
            }
            return Ok(acc);
        }

        let bin_op = match op {
            ArithOp::Add => BinaryOperator::Plus,
            ArithOp::Sub => BinaryOperator::Minus,
            ArithOp::Mul => BinaryOperator::Mul,
            ArithOp::Div => unreachable!("handled above"),
        };
        for arg in iter {
            let operand = promote_int_literal(self.to_sql_ast_aggregation(store, ctx, arg)?);
            acc = Expr::BinaryOp {
                left: Box::new(acc),
                op: bin_op,
                right: Box::new(operand),
            };
        }
        Ok(acc)
    }

    /// `aggregation(index)` resolution: the bare head name of the referenced
    /// aggregation, except `Arithmetic`, which is recompiled in place. A
    /// `named`/alias collision between two aggregations is a known,
    /// preserved deficiency rather than something this resolves.
    fn compile_aggregation_ref(
        &self,
        store: &mut InMemoryMetadataStore,
        ctx: &Context,
        index: usize,
    ) -> Result<Expr, CompileError> {
        let ag = ctx.aggregation_at(index)?.clone();
        match &ag {
            AggregationClause::Arithmetic { .. } => self.to_sql_ast_aggregation(store, ctx, &ag),
            other => Ok(Expr::Column {
                table: None,
                column: aggregation_name(other),
            }),
        }
    }
}

/// The deterministic SELECT-list alias an aggregation clause projects under.
pub(super) fn aggregation_name(ag: &AggregationClause) -> String {
    match ag {
        AggregationClause::Count(_) => "count".into(),
        AggregationClause::Avg(_) => "avg".into(),
        AggregationClause::Sum(_) => "sum".into(),
        AggregationClause::Min(_) => "min".into(),
        AggregationClause::Max(_) => "max".into(),
        AggregationClause::Stddev(_) => "stddev".into(),
        AggregationClause::Distinct(_) => "count".into(),
        AggregationClause::SumWhere { .. } => "sum".into(),
        AggregationClause::CountWhere(_) => "count".into(),
        AggregationClause::Share(_) => "share".into(),
        AggregationClause::Named { alias, .. } => alias.clone(),
        AggregationClause::Arithmetic { .. } => "expression".into(),
        AggregationClause::Ref(_) => "expression".into(),
        AggregationClause::Number(_) => "expression".into(),
    }
}
