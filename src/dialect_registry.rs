//! MBQL-specific dialect override points, layered on top of the generic
//! [`SqlDialect`].
//!
//! A concrete dialect overrides only the methods whose default rendering is
//! wrong for it. Because every [`crate::sql::Dialect`] variant already
//! implements `SqlDialect`, and `MbqlDialect: SqlDialect`'s supertrait bound
//! lets any of them pick up these defaults for free, adding a new target
//! dialect only requires overriding the handful of methods that differ (see
//! the module doc on `sql::dialect` for the existing per-dialect feature
//! matrix this extends).

use crate::metadata::{FieldRecord, SpecialType, TableRecord};
use crate::mbql::DateUnit;
use crate::sql::dialect::SqlDialect;
use crate::sql::expr::{BinaryOperator, Expr, Literal};
use crate::sql::query::Query;

/// The resolution of a UNIX-timestamp-typed column, from `Field.special_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampResolution {
    Seconds,
    Milliseconds,
}

impl TimestampResolution {
    pub fn of(special_type: SpecialType) -> Option<Self> {
        match special_type {
            SpecialType::UnixTimestampSeconds => Some(Self::Seconds),
            SpecialType::UnixTimestampMilliseconds => Some(Self::Milliseconds),
            SpecialType::None => None,
        }
    }
}

/// Which top-level MBQL clause applier produced the [`Query`] passed to
/// [`MbqlDialect::apply_top_level_clause`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClauseKind {
    SourceTable,
    Breakout,
    Aggregation,
    Fields,
    Filter,
    JoinTables,
    OrderBy,
    Page,
    Limit,
}

/// Which node-level compilation produced the [`Expr`] passed to
/// [`MbqlDialect::to_sql_ast`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Field,
    Value,
    Aggregation,
    Filter,
}

/// MBQL compiler override points. Every method has a default; a dialect
/// overrides only where its rendering differs.
pub trait MbqlDialect: SqlDialect {
    /// `current_datetime_fn(dialect)`.
    fn current_datetime_fn(&self) -> Expr {
        Expr::Function {
            name: "CURRENT_TIMESTAMP".into(),
            args: vec![],
            distinct: false,
        }
    }

    /// `date(dialect, unit, expr)`. `Default` is the identity rewrite.
    fn date(&self, unit: DateUnit, expr: Expr) -> Expr {
        match unit {
            DateUnit::Default => expr,
            _ => Expr::Function {
                name: "DATE_TRUNC".into(),
                args: vec![Expr::Literal(Literal::String(date_unit_name(unit).into())), expr],
                distinct: false,
            },
        }
    }

    /// `date_interval(dialect, unit, amount)` relative to `base`.
    fn date_interval(&self, base: Expr, unit: DateUnit, amount: i64) -> Expr {
        Expr::BinaryOp {
            left: Box::new(base),
            op: if amount < 0 {
                BinaryOperator::Minus
            } else {
                BinaryOperator::Plus
            },
            right: Box::new(Expr::Function {
                name: "INTERVAL".into(),
                args: vec![
                    // `saturating_abs` avoids the overflow panic `abs()` would
                    // hit on `i64::MIN`, whose magnitude has no `i64` representation.
                    Expr::Literal(Literal::Int(amount.saturating_abs())),
                    Expr::Literal(Literal::String(date_unit_name(unit).into())),
                ],
                distinct: false,
            }),
        }
    }

    /// `field_to_identifier(dialect, field)`: `schema.table.column`, schema
    /// omitted when empty or when the active table record is an alias.
    fn field_to_identifier(&self, table: &TableRecord, field: &FieldRecord) -> Expr {
        let mut qualifier = Vec::new();
        if !table.is_alias {
            if let Some(schema) = &table.schema {
                if !schema.is_empty() {
                    qualifier.push(schema.clone());
                }
            }
        }
        qualifier.push(table.name.clone());
        Expr::QualifiedColumn {
            qualifier,
            column: field.name.clone(),
        }
    }

    /// `field_to_alias(dialect, field)`: default is the field's own name.
    fn field_to_alias(&self, field: &FieldRecord) -> Option<String> {
        Some(field.name.clone())
    }

    /// `unix_timestamp_to_timestamp(dialect, resolution, expr)`. Milliseconds
    /// divides by 1000 and recurses with `Seconds`.
    fn unix_timestamp_to_timestamp(&self, resolution: TimestampResolution, expr: Expr) -> Expr {
        match resolution {
            TimestampResolution::Milliseconds => {
                let seconds = Expr::BinaryOp {
                    left: Box::new(expr),
                    op: BinaryOperator::Div,
                    right: Box::new(Expr::Literal(Literal::Float(1000.0))),
                };
                self.unix_timestamp_to_timestamp(TimestampResolution::Seconds, seconds)
            }
            TimestampResolution::Seconds => Expr::Function {
                name: "TO_TIMESTAMP".into(),
                args: vec![expr],
                distinct: false,
            },
        }
    }

    /// `format_custom_field_name(dialect, name)`: driver-specific alias
    /// formatting hook for computed/custom field names. Default is identity.
    fn format_custom_field_name(&self, name: &str) -> String {
        name.to_string()
    }

    /// Called after a top-level clause applier has shaped the query, letting
    /// a dialect intercept and rewrite the AST before the next clause is
    /// applied. Default is identity.
    fn apply_top_level_clause(&self, _clause: ClauseKind, query: Query) -> Query {
        query
    }

    /// Open-recursion hook over every field/value/aggregation/filter node the
    /// Expression Compiler produces, called once the node's own compilation
    /// is finished. Default is identity; a dialect overrides this to rewrite
    /// a class of node wholesale rather than patching each compiler method
    /// that can produce it.
    fn to_sql_ast(&self, _node: NodeKind, expr: Expr) -> Expr {
        expr
    }
}

fn date_unit_name(unit: DateUnit) -> &'static str {
    match unit {
        DateUnit::Default => "default",
        DateUnit::Minute => "minute",
        DateUnit::Hour => "hour",
        DateUnit::Day => "day",
        DateUnit::Week => "week",
        DateUnit::Month => "month",
        DateUnit::Quarter => "quarter",
        DateUnit::Year => "year",
    }
}

impl MbqlDialect for crate::sql::dialect::Ansi {}
impl MbqlDialect for crate::sql::dialect::Postgres {}
impl MbqlDialect for crate::sql::dialect::MySql {}
impl MbqlDialect for crate::sql::dialect::TSql {
    fn current_datetime_fn(&self) -> Expr {
        Expr::Function {
            name: "GETDATE".into(),
            args: vec![],
            distinct: false,
        }
    }
}
impl MbqlDialect for crate::sql::dialect::DuckDb {}
impl MbqlDialect for crate::sql::dialect::Snowflake {}
impl MbqlDialect for crate::sql::dialect::BigQuery {
    fn current_datetime_fn(&self) -> Expr {
        Expr::Function {
            name: "CURRENT_TIMESTAMP".into(),
            args: vec![],
            distinct: false,
        }
    }
}
impl MbqlDialect for crate::sql::dialect::Redshift {}
impl MbqlDialect for crate::sql::dialect::Databricks {}

impl crate::sql::dialect::Dialect {
    /// The `MbqlDialect` half of the dispatch table, mirroring
    /// `Dialect::dialect()` for the generic `SqlDialect` half.
    pub fn mbql_dialect(&self) -> &'static dyn MbqlDialect {
        use crate::sql::dialect::Dialect::*;
        match self {
            DuckDb => &crate::sql::dialect::DuckDb,
            Postgres => &crate::sql::dialect::Postgres,
            TSql => &crate::sql::dialect::TSql,
            MySql => &crate::sql::dialect::MySql,
            Snowflake => &crate::sql::dialect::Snowflake,
            BigQuery => &crate::sql::dialect::BigQuery,
            Redshift => &crate::sql::dialect::Redshift,
            Databricks => &crate::sql::dialect::Databricks,
        }
    }
}

impl MbqlDialect for crate::sql::dialect::Dialect {
    fn current_datetime_fn(&self) -> Expr {
        self.mbql_dialect().current_datetime_fn()
    }

    fn date(&self, unit: DateUnit, expr: Expr) -> Expr {
        self.mbql_dialect().date(unit, expr)
    }

    fn date_interval(&self, base: Expr, unit: DateUnit, amount: i64) -> Expr {
        self.mbql_dialect().date_interval(base, unit, amount)
    }

    fn field_to_identifier(&self, table: &TableRecord, field: &FieldRecord) -> Expr {
        self.mbql_dialect().field_to_identifier(table, field)
    }

    fn field_to_alias(&self, field: &FieldRecord) -> Option<String> {
        self.mbql_dialect().field_to_alias(field)
    }

    fn unix_timestamp_to_timestamp(&self, resolution: TimestampResolution, expr: Expr) -> Expr {
        self.mbql_dialect()
            .unix_timestamp_to_timestamp(resolution, expr)
    }

    fn format_custom_field_name(&self, name: &str) -> String {
        self.mbql_dialect().format_custom_field_name(name)
    }

    fn apply_top_level_clause(&self, clause: ClauseKind, query: Query) -> Query {
        self.mbql_dialect().apply_top_level_clause(clause, query)
    }

    fn to_sql_ast(&self, node: NodeKind, expr: Expr) -> Expr {
        self.mbql_dialect().to_sql_ast(node, expr)
    }
}
