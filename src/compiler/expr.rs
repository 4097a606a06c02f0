//! The field/value/expression-tree half of the Expression Compiler.

use crate::dialect_registry::{MbqlDialect, NodeKind, TimestampResolution};
use crate::error::CompileError;
use crate::mbql::{ExpressionTree, FieldClause, ValueClause};
use crate::metadata::{FieldId, InMemoryMetadataStore, MetadataStore};
use crate::sql::expr::{BinaryOperator, Expr, Literal};

use super::ident::escape_dots;
use super::{Compiler, Context};

impl<'a> Compiler<'a> {
    pub(super) fn to_sql_ast_field(
        &self,
        store: &mut InMemoryMetadataStore,
        ctx: &Context,
        fc: &FieldClause,
    ) -> Result<Expr, CompileError> {
        let expr = match fc {
            FieldClause::FieldId(id) => {
                let field = store.field(*id)?;
                let table = store.table(field.table_id)?;
                let mut expr = self.dialect.field_to_identifier(table, field);
                if let Some(resolution) = TimestampResolution::of(field.special_type) {
                    expr = self.dialect.unix_timestamp_to_timestamp(resolution, expr);
                }
                expr
            }
            FieldClause::FieldLiteral { name, .. } => Expr::Column {
                table: None,
                column: escape_dots(name),
            },
            FieldClause::Fk {
                source_fk,
                dest_field,
            } => {
                let src_id = base_field_id(source_fk).unwrap_or(FieldId(i64::MIN));
                let dest_id = base_field_id(dest_field).unwrap_or(FieldId(i64::MIN));
                let info = self.joins.resolve(src_id, dest_id)?;

                let mut tables = std::collections::HashMap::new();
                tables.insert(
                    info.dest_table,
                    crate::metadata::TableRecord {
                        id: info.dest_table,
                        name: info.alias.clone(),
                        schema: None,
                        is_alias: true,
                    },
                );
                let mut guard = store.push_override(tables, std::collections::HashMap::new());
                return self.to_sql_ast_field(guard.store_mut(), ctx, dest_field);
            }
            FieldClause::DatetimeField { inner, unit } => {
                let e = self.to_sql_ast_field(store, ctx, inner)?;
                self.dialect.date(*unit, e)
            }
            FieldClause::BinningStrategy { inner, strategy } => {
                let e = self.to_sql_ast_field(store, ctx, inner)?;
                compile_binning(e, strategy)
            }
            FieldClause::Expression(name) => {
                let tree = ctx.expression_named(name)?.clone();
                return self.to_sql_ast_expression_tree(store, ctx, &tree);
            }
        };
        Ok(self.dialect.to_sql_ast(NodeKind::Field, expr))
    }

    pub(super) fn to_sql_ast_value(
        &self,
        store: &mut InMemoryMetadataStore,
        ctx: &Context,
        v: &ValueClause,
    ) -> Result<Expr, CompileError> {
        use crate::mbql::Scalar;
        let expr = match v {
            ValueClause::Value(Scalar::Null) => Expr::Literal(Literal::Null),
            ValueClause::Value(Scalar::Int(n)) => Expr::Param(Literal::Int(*n)),
            ValueClause::Value(Scalar::Float(f)) => Expr::Param(Literal::Float(*f)),
            ValueClause::Value(Scalar::String(s)) => Expr::Param(Literal::String(s.clone())),
            ValueClause::Value(Scalar::Bool(b)) => Expr::Param(Literal::Bool(*b)),
            ValueClause::AbsoluteDatetime { ts, unit } => {
                self.dialect.date(*unit, Expr::Param(Literal::String(ts.clone())))
            }
            ValueClause::RelativeDatetime { amount: 0, unit } => {
                self.dialect.date(*unit, self.dialect.current_datetime_fn())
            }
            ValueClause::RelativeDatetime { amount, unit } => {
                let base = self.dialect.current_datetime_fn();
                let interval = self.dialect.date_interval(base, *unit, *amount);
                self.dialect.date(*unit, interval)
            }
            ValueClause::RelativeDatetimeOf {
                field,
                amount,
                unit,
            } => {
                let base = self.to_sql_ast_field(store, ctx, field)?;
                self.dialect.date_interval(base, *unit, *amount)
            }
            ValueClause::Time { v, unit } => {
                self.dialect.date(*unit, Expr::Param(Literal::String(v.clone())))
            }
        };
        Ok(self.dialect.to_sql_ast(NodeKind::Value, expr))
    }

    pub(super) fn to_sql_ast_expression_tree(
        &self,
        store: &mut InMemoryMetadataStore,
        ctx: &Context,
        tree: &ExpressionTree,
    ) -> Result<Expr, CompileError> {
        match tree {
            ExpressionTree::Field(fc) => self.to_sql_ast_field(store, ctx, fc),
            ExpressionTree::Literal(n) => Ok(Expr::Literal(Literal::Float(*n))),
            ExpressionTree::Add(l, r) => {
                self.binop_expr_tree(store, ctx, l, r, BinaryOperator::Plus)
            }
            ExpressionTree::Sub(l, r) => {
                self.binop_expr_tree(store, ctx, l, r, BinaryOperator::Minus)
            }
            ExpressionTree::Mul(l, r) => {
                self.binop_expr_tree(store, ctx, l, r, BinaryOperator::Mul)
            }
            ExpressionTree::Div(l, r) => {
                let le = promote_int_literal(self.to_sql_ast_expression_tree(store, ctx, l)?);
                let re = promote_int_literal(self.to_sql_ast_expression_tree(store, ctx, r)?);
                Ok(Expr::BinaryOp {
                    left: Box::new(le),
                    op: BinaryOperator::Div,
                    right: Box::new(zero_guard(re)),
                })
            }
        }
    }

    fn binop_expr_tree(
        &self,
        store: &mut InMemoryMetadataStore,
        ctx: &Context,
        l: &ExpressionTree,
        r: &ExpressionTree,
        op: BinaryOperator,
    ) -> Result<Expr, CompileError> {
        let le = self.to_sql_ast_expression_tree(store, ctx, l)?;
        let re = self.to_sql_ast_expression_tree(store, ctx, r)?;
        Ok(Expr::BinaryOp {
            left: Box::new(le),
            op,
            right: Box::new(re),
        })
    }

    /// The SELECT-list alias a field clause projects under.
    /// `field-literal` wrappers are never re-aliased.
    pub(super) fn field_clause_alias(
        &self,
        store: &InMemoryMetadataStore,
        fc: &FieldClause,
    ) -> Result<Option<String>, CompileError> {
        match fc {
            FieldClause::FieldId(id) => {
                let field = store.field(*id)?;
                Ok(self.dialect.field_to_alias(field).map(|s| escape_dots(&s)))
            }
            FieldClause::FieldLiteral { .. } => Ok(None),
            FieldClause::Expression(name) => Ok(Some(escape_dots(name))),
            FieldClause::Fk { dest_field, .. } => self.field_clause_alias(store, dest_field),
            FieldClause::DatetimeField { inner, .. } => self.field_clause_alias(store, inner),
            FieldClause::BinningStrategy { inner, .. } => self.field_clause_alias(store, inner),
        }
    }
}

/// The field-id a (possibly wrapped) field clause ultimately resolves to,
/// for `fk->` join-info lookups. `None` for clauses with no backing record.
fn base_field_id(fc: &FieldClause) -> Option<FieldId> {
    match fc {
        FieldClause::FieldId(id) => Some(*id),
        FieldClause::DatetimeField { inner, .. } => base_field_id(inner),
        FieldClause::BinningStrategy { inner, .. } => base_field_id(inner),
        FieldClause::Fk { dest_field, .. } => base_field_id(dest_field),
        FieldClause::FieldLiteral { .. } | FieldClause::Expression(_) => None,
    }
}

/// `floor((inner - min_value) / bin_width) * bin_width + min_value` — the
/// binning rewrite's fixed shape. `max_value` is unused here; it only
/// informs how the host chose `bin_width`/`min_value` upstream.
fn compile_binning(inner: Expr, strategy: &crate::mbql::BinningStrategy) -> Expr {
    let min_value = Expr::Literal(Literal::Float(strategy.params.min_value));
    let bin_width = Expr::Literal(Literal::Float(strategy.params.bin_width));

    let shifted = Expr::BinaryOp {
        left: Box::new(inner),
        op: BinaryOperator::Minus,
        right: Box::new(min_value.clone()),
    };
    let divided = Expr::BinaryOp {
        left: Box::new(shifted),
        op: BinaryOperator::Div,
        right: Box::new(bin_width.clone()),
    };
    let floored = Expr::Function {
        name: "FLOOR".into(),
        args: vec![divided],
        distinct: false,
    };
    let scaled = Expr::BinaryOp {
        left: Box::new(floored),
        op: BinaryOperator::Mul,
        right: Box::new(bin_width),
    };
    Expr::BinaryOp {
        left: Box::new(scaled),
        op: BinaryOperator::Plus,
        right: Box::new(min_value),
    }
}

/// An integer literal operand of `/` is promoted to floating-point before
/// compilation; other expressions pass through unchanged.
pub(super) fn promote_int_literal(e: Expr) -> Expr {
    match e {
        Expr::Literal(Literal::Int(n)) => Expr::Literal(Literal::Float(n as f64)),
        other => other,
    }
}

/// Wrap a divisor in a zero-guard: `CASE WHEN divisor = 0 THEN NULL ELSE
/// divisor END` — the divide-by-zero rewrite.
pub(super) fn zero_guard(divisor: Expr) -> Expr {
    Expr::Case {
        operand: None,
        when_clauses: vec![(
            Expr::BinaryOp {
                left: Box::new(divisor.clone()),
                op: BinaryOperator::Eq,
                right: Box::new(Expr::Literal(Literal::Int(0))),
            },
            Expr::Literal(Literal::Null),
        )],
        else_clause: Some(Box::new(divisor)),
    }
}

/// Re-qualify a compiled column reference under a join alias, for join
/// targets (nested queries) that have no metadata-store table id to
/// override, for join targets reached through a join-tables applier.
pub(super) fn requalify(expr: Expr, alias: &str) -> Expr {
    match expr {
        Expr::Column { column, .. } => Expr::QualifiedColumn {
            qualifier: vec![alias.to_string()],
            column,
        },
        Expr::QualifiedColumn { column, .. } => Expr::QualifiedColumn {
            qualifier: vec![alias.to_string()],
            column,
        },
        other => other,
    }
}
