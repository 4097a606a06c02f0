//! The compiler core: Expression Compiler, Clause Appliers, Clause
//! Orchestrator, and Formatter glue.
//!
//! [`Compiler`] holds only the two collaborators that don't need mutable
//! access threaded through recursion (the dialect, which is `Copy`, and the
//! join resolver, which is read-only); the metadata store is passed as an
//! explicit `&mut` parameter instead of a struct field so that a scoped
//! override can be pushed, recursed through, and popped without fighting the
//! borrow checker over a second mutable borrow of `self`.

mod aggregation;
pub mod context;
mod expr;
mod filter;
pub mod ident;

pub use context::Context;

use std::collections::HashMap;

use crate::config::CompileOptions;
use crate::dialect_registry::{ClauseKind, MbqlDialect};
use crate::error::CompileError;
use crate::join::JoinInfoResolver;
use crate::mbql::{
    InnerQuery, JoinTarget, OuterQuery, Scalar, Source, SortDirection,
};
use crate::metadata::{InMemoryMetadataStore, MetadataStore, TableId, TableRecord};
use crate::sql::dialect::Dialect;
use crate::sql::expr::{star, Expr};
use crate::sql::query::{JoinType, OrderByExpr, Query, SelectExpr, TableRef};

use ident::unescape_dots;

/// A compiled query: the rendered SQL text plus its positional parameter
/// values, in the order their `?` placeholders appear in the text.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    pub sql: String,
    pub params: Vec<Scalar>,
}

/// The alias a nested source-query's FROM-position subquery is given, and
/// the alias a query-target join's subquery is given by default when the
/// MBQL doesn't supply one.
const NESTED_SOURCE_ALIAS: &str = "source";

/// Top-level entry point: compile a full `OuterQuery` against a metadata
/// store, a join resolver, and compile options (at minimum, a target
/// dialect). Accepts a bare [`Dialect`] directly, via `CompileOptions`'s
/// `From<Dialect>` impl, or any other `Into<CompileOptions>`.
pub fn mbql_to_native(
    options: impl Into<CompileOptions>,
    store: &mut InMemoryMetadataStore,
    joins: &dyn JoinInfoResolver,
    outer: &OuterQuery,
) -> Result<CompiledQuery, CompileError> {
    let dialect = options.into().dialect;
    let compiler = Compiler::new(dialect, joins);
    let mut ctx = Context::new(&outer.query);
    let query = compiler.compile_inner(store, &mut ctx, &outer.query)?;

    log::trace!(
        "applying clauses in fixed order: source-table, breakout, aggregation, fields, filter, join-tables, order-by, page, limit"
    );
    log::debug!("compiled SQL-AST: {query:#?}");

    let tokens = query.to_tokens_for_dialect(dialect);
    let sql_text = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        tokens.serialize(dialect)
    }))
    .map_err(|payload| {
        let cause = panic_message(payload);
        log::error!("formatter panicked while serializing compiled SQL-AST: {cause}");
        CompileError::SqlFormatError {
            ast: format!("{query:#?}"),
            cause,
        }
    })?;
    let sql = unescape_dots(&sql_text);
    let params = tokens
        .params()
        .into_iter()
        .map(|p| match p {
            crate::sql::token::ParamValue::Int(n) => Scalar::Int(n),
            crate::sql::token::ParamValue::Float(f) => Scalar::Float(f),
            crate::sql::token::ParamValue::String(s) => Scalar::String(s),
            crate::sql::token::ParamValue::Bool(b) => Scalar::Bool(b),
        })
        .collect();

    Ok(CompiledQuery { sql, params })
}

/// Recovers a human-readable message from a `catch_unwind` payload. Panics
/// raised by `std` and by this crate's own `panic!(...)` calls both carry a
/// `&'static str` or `String` payload; anything else falls back to a fixed
/// message rather than propagating the unwind further.
fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "formatter panicked with a non-string payload".to_string()
    }
}

/// The stateless half of the compiler: the dialect and join resolver. The
/// metadata store is threaded through every method explicitly (see module
/// doc) rather than stored here.
pub struct Compiler<'a> {
    dialect: Dialect,
    joins: &'a dyn JoinInfoResolver,
}

impl<'a> Compiler<'a> {
    pub fn new(dialect: Dialect, joins: &'a dyn JoinInfoResolver) -> Self {
        Self { dialect, joins }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Compile one nesting level of the query.
    ///
    /// `'q` ties `inner` to the same lifetime as `ctx`'s stack: every
    /// `InnerQuery` reachable from the root is borrowed, never copied, so a
    /// `source-query`/join-query target can be pushed onto `ctx` by
    /// reference without an intermediate clone.
    pub fn compile_inner<'q>(
        &self,
        store: &mut InMemoryMetadataStore,
        ctx: &mut Context<'q>,
        inner: &'q InnerQuery,
    ) -> Result<Query, CompileError> {
        let source = inner.source.as_ref().ok_or_else(|| {
            CompileError::InvalidInnerQuery(
                "query has neither a source-table nor a source-query".into(),
            )
        })?;

        let mut query = Query::new();

        match source {
            Source::Table(table_id) => {
                let table = store.table(*table_id)?.clone();
                query = query.from(self.table_ref(&table));
                query = self.dialect.apply_top_level_clause(ClauseKind::SourceTable, query);
                self.apply_remaining_clauses(store, ctx, inner, query)
            }
            Source::Native(native_sql) => {
                let trimmed = native_sql.trim().trim_end_matches(';').trim();
                query = query.from(
                    TableRef::from_raw(format!("({trimmed})")).with_alias(NESTED_SOURCE_ALIAS),
                );
                query = self.dialect.apply_top_level_clause(ClauseKind::SourceTable, query);
                self.apply_remaining_clauses(store, ctx, inner, query)
            }
            Source::Query(sub_inner) => {
                ctx.push(sub_inner);
                let sub_query = self.compile_inner(store, ctx, sub_inner)?;
                ctx.pop();

                let sub_sql = unescape_dots(&sub_query.to_tokens_for_dialect(self.dialect).serialize(self.dialect));
                query = query.from(
                    TableRef::from_raw(format!("({sub_sql})")).with_alias(NESTED_SOURCE_ALIAS),
                );
                query = self.dialect.apply_top_level_clause(ClauseKind::SourceTable, query);

                match primary_table_id(sub_inner) {
                    Some(primary_id) => {
                        let mut tables = HashMap::new();
                        tables.insert(
                            primary_id,
                            TableRecord {
                                id: primary_id,
                                name: NESTED_SOURCE_ALIAS.into(),
                                schema: None,
                                is_alias: true,
                            },
                        );
                        let mut guard = store.push_override(tables, HashMap::new());
                        self.apply_remaining_clauses(guard.store_mut(), ctx, inner, query)
                    }
                    None => self.apply_remaining_clauses(store, ctx, inner, query),
                }
            }
        }
    }

    fn apply_remaining_clauses<'q>(
        &self,
        store: &mut InMemoryMetadataStore,
        ctx: &mut Context<'q>,
        inner: &'q InnerQuery,
        query: Query,
    ) -> Result<Query, CompileError> {
        let query = self.apply_breakout(store, ctx, inner, query)?;
        let query = self.apply_aggregation(store, ctx, inner, query)?;
        let query = self.apply_fields(store, ctx, inner, query)?;
        let query = self.apply_filter(store, ctx, inner, query)?;
        let query = self.apply_join_tables(store, ctx, inner, query)?;
        let query = self.apply_order_by(store, ctx, inner, query)?;
        let query = self.apply_page(inner, query);
        let query = self.apply_limit(inner, query);
        Ok(Self::default_select_star(query))
    }

    fn table_ref(&self, table: &TableRecord) -> TableRef {
        let mut t = TableRef::new(&table.name);
        if !table.is_alias {
            if let Some(schema) = &table.schema {
                if !schema.is_empty() {
                    t = t.with_schema(schema);
                }
            }
        }
        t
    }

    fn apply_breakout(
        &self,
        store: &mut InMemoryMetadataStore,
        ctx: &Context,
        inner: &InnerQuery,
        mut query: Query,
    ) -> Result<Query, CompileError> {
        for fc in &inner.breakout {
            let compiled = self.to_sql_ast_field(store, ctx, fc)?;
            if !inner.fields.contains(fc) {
                let mut se = SelectExpr::new(compiled.clone());
                if ctx.nesting_level() > 0 {
                    if let Some(alias) = self.field_clause_alias(store, fc)? {
                        se = se.with_alias(&alias);
                    }
                }
                query.select.push(se);
            }
            query.group_by.push(compiled);
        }
        Ok(self.dialect.apply_top_level_clause(ClauseKind::Breakout, query))
    }

    /// Aggregations (and fields/breakouts, above) are only given a SELECT
    /// alias when this level is itself a `source-query` target (the
    /// `source.<name>` qualification an outer level uses to reference this
    /// one needs a name to qualify); a query returned straight to the caller
    /// has no outer level to name columns for.
    fn apply_aggregation(
        &self,
        store: &mut InMemoryMetadataStore,
        ctx: &Context,
        inner: &InnerQuery,
        mut query: Query,
    ) -> Result<Query, CompileError> {
        for ag in &inner.aggregation {
            let compiled = self.to_sql_ast_aggregation(store, ctx, ag)?;
            let mut se = SelectExpr::new(compiled);
            if ctx.nesting_level() > 0 {
                let alias = self.dialect.format_custom_field_name(&aggregation::aggregation_name(ag));
                se = se.with_alias(&alias);
            }
            query.select.push(se);
        }
        Ok(self.dialect.apply_top_level_clause(ClauseKind::Aggregation, query))
    }

    fn apply_fields(
        &self,
        store: &mut InMemoryMetadataStore,
        ctx: &Context,
        inner: &InnerQuery,
        mut query: Query,
    ) -> Result<Query, CompileError> {
        for fc in &inner.fields {
            let compiled = self.to_sql_ast_field(store, ctx, fc)?;
            let mut se = SelectExpr::new(compiled);
            if ctx.nesting_level() > 0 {
                if let Some(alias) = self.field_clause_alias(store, fc)? {
                    se = se.with_alias(&alias);
                }
            }
            query.select.push(se);
        }
        Ok(self.dialect.apply_top_level_clause(ClauseKind::Fields, query))
    }

    fn apply_filter(
        &self,
        store: &mut InMemoryMetadataStore,
        ctx: &Context,
        inner: &InnerQuery,
        mut query: Query,
    ) -> Result<Query, CompileError> {
        if let Some(f) = &inner.filter {
            query.where_clause = Some(self.to_sql_ast_filter(store, ctx, f)?);
        }
        Ok(self.dialect.apply_top_level_clause(ClauseKind::Filter, query))
    }

    fn apply_join_tables<'q>(
        &self,
        store: &mut InMemoryMetadataStore,
        ctx: &mut Context<'q>,
        inner: &'q InnerQuery,
        mut query: Query,
    ) -> Result<Query, CompileError> {
        for (idx, jt) in inner.join_tables.iter().enumerate() {
            match &jt.dest_table {
                JoinTarget::Table(table_id) => {
                    let table = store.table(*table_id)?.clone();
                    let alias_name = jt.alias.clone().unwrap_or_else(|| table.name.clone());

                    let mut tables = HashMap::new();
                    tables.insert(
                        *table_id,
                        TableRecord {
                            id: *table_id,
                            name: alias_name.clone(),
                            schema: None,
                            is_alias: true,
                        },
                    );
                    let mut guard = store.push_override(tables, HashMap::new());
                    let dest_expr = self.to_sql_ast_field(guard.store_mut(), ctx, &jt.dest_field)?;
                    drop(guard);

                    let source_expr = self.to_sql_ast_field(store, ctx, &jt.source_fk)?;
                    let on = Expr::BinaryOp {
                        left: Box::new(source_expr),
                        op: crate::sql::expr::BinaryOperator::Eq,
                        right: Box::new(dest_expr),
                    };

                    let mut table_ref = TableRef::new(&table.name);
                    if let Some(schema) = &table.schema {
                        if !schema.is_empty() {
                            table_ref = table_ref.with_schema(schema);
                        }
                    }
                    table_ref = table_ref.with_alias(&alias_name);

                    query.joins.push(crate::sql::query::Join {
                        join_type: JoinType::Left,
                        table: table_ref,
                        on: Some(on),
                    });
                }
                JoinTarget::Query(sub) => {
                    ctx.push(sub);
                    let sub_query = self.compile_inner(store, ctx, sub)?;
                    ctx.pop();

                    let alias_name = jt
                        .alias
                        .clone()
                        .unwrap_or_else(|| format!("join_{idx}"));
                    let sub_sql = unescape_dots(
                        &sub_query.to_tokens_for_dialect(self.dialect).serialize(self.dialect),
                    );
                    let table_ref =
                        TableRef::from_raw(format!("({sub_sql})")).with_alias(&alias_name);

                    let dest_expr = self.to_sql_ast_field(store, ctx, &jt.dest_field)?;
                    let dest_expr = expr::requalify(dest_expr, &alias_name);
                    let source_expr = self.to_sql_ast_field(store, ctx, &jt.source_fk)?;
                    let on = Expr::BinaryOp {
                        left: Box::new(source_expr),
                        op: crate::sql::expr::BinaryOperator::Eq,
                        right: Box::new(dest_expr),
                    };

                    query.joins.push(crate::sql::query::Join {
                        join_type: JoinType::Left,
                        table: table_ref,
                        on: Some(on),
                    });
                }
            }
        }
        Ok(self.dialect.apply_top_level_clause(ClauseKind::JoinTables, query))
    }

    fn apply_order_by(
        &self,
        store: &mut InMemoryMetadataStore,
        ctx: &Context,
        inner: &InnerQuery,
        mut query: Query,
    ) -> Result<Query, CompileError> {
        for (dir, fc) in &inner.order_by {
            let expr = self.to_sql_ast_field(store, ctx, fc)?;
            query.order_by.push(match dir {
                SortDirection::Asc => OrderByExpr::asc(expr),
                SortDirection::Desc => OrderByExpr::desc(expr),
            });
        }
        Ok(self.dialect.apply_top_level_clause(ClauseKind::OrderBy, query))
    }

    fn apply_page(&self, inner: &InnerQuery, query: Query) -> Query {
        let query = match inner.page {
            Some(page) => {
                let offset = page.items.saturating_mul(page.page.saturating_sub(1));
                query.limit(page.items).offset(offset)
            }
            None => query,
        };
        self.dialect.apply_top_level_clause(ClauseKind::Page, query)
    }

    fn apply_limit(&self, inner: &InnerQuery, query: Query) -> Query {
        let query = match inner.limit {
            Some(limit) => query.limit(limit),
            None => query,
        };
        self.dialect.apply_top_level_clause(ClauseKind::Limit, query)
    }

    fn default_select_star(mut query: Query) -> Query {
        if query.select.is_empty() {
            query.select = vec![SelectExpr::new(star())];
        }
        query
    }
}

/// The concrete `TableId` an inner query ultimately draws rows from,
/// recursing through nested `source-query`s. `None` for a native-SQL source,
/// which has no backing table record to shadow.
fn primary_table_id(inner: &InnerQuery) -> Option<TableId> {
    match inner.source.as_ref()? {
        Source::Table(id) => Some(*id),
        Source::Query(sub) => primary_table_id(sub),
        Source::Native(_) => None,
    }
}
