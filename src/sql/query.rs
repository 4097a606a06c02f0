//! Query builder - construct SQL queries with a fluent API.

use super::dialect::{Dialect, SqlDialect};
use super::expr::{Expr, ExprExt};
use super::token::{Token, TokenStream};

// =============================================================================
// Select Expression (column with optional alias)
// =============================================================================

/// A SELECT list item: expression with optional alias.
#[derive(Debug, Clone, PartialEq)]
#[must_use = "builders have no effect until used"]
pub struct SelectExpr {
    pub expr: Expr,
    pub alias: Option<String>,
}

impl SelectExpr {
    pub fn new(expr: Expr) -> Self {
        Self { expr, alias: None }
    }

    pub fn with_alias(mut self, alias: &str) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn to_tokens(&self) -> TokenStream {
        self.to_tokens_for_dialect(Dialect::default())
    }

    pub fn to_tokens_for_dialect(&self, dialect: Dialect) -> TokenStream {
        let mut ts = self.expr.to_tokens_for_dialect(dialect);
        if let Some(alias) = &self.alias {
            ts.space()
                .push(Token::As)
                .space()
                .push(Token::Ident(alias.clone()));
        }
        ts
    }
}

impl From<Expr> for SelectExpr {
    fn from(expr: Expr) -> Self {
        SelectExpr::new(expr)
    }
}

// =============================================================================
// Table Reference
// =============================================================================

/// A table reference with optional schema and alias.
#[derive(Debug, Clone, PartialEq)]
#[must_use = "builders have no effect until used"]
pub struct TableRef {
    pub schema: Option<String>,
    pub table: String,
    pub alias: Option<String>,
    /// A pre-rendered, already-parenthesized SQL fragment (a compiled
    /// subquery or a native source string) that replaces the plain
    /// `schema.table` identifier when present. `table`/`schema` are unused
    /// in that case.
    pub raw: Option<String>,
}

impl TableRef {
    pub fn new(table: &str) -> Self {
        Self {
            schema: None,
            table: table.into(),
            alias: None,
            raw: None,
        }
    }

    /// A table reference whose FROM-position text is a pre-rendered
    /// parenthesized fragment (e.g. `(SELECT ...)` or a native source
    /// string), rather than a plain identifier.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self {
            schema: None,
            table: String::new(),
            alias: None,
            raw: Some(raw.into()),
        }
    }

    pub fn with_schema(mut self, schema: &str) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn with_alias(mut self, alias: &str) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn to_tokens(&self) -> TokenStream {
        let mut ts = TokenStream::new();
        match &self.raw {
            Some(raw) => {
                ts.push(Token::Raw(raw.clone()));
            }
            None => {
                ts.push(Token::QualifiedIdent {
                    schema: self.schema.clone(),
                    name: self.table.clone(),
                });
            }
        }
        if let Some(alias) = &self.alias {
            ts.space()
                .push(Token::As)
                .space()
                .push(Token::Ident(alias.clone()));
        }
        ts
    }
}

// =============================================================================
// Joins
// =============================================================================

/// Type of join.
///
/// Only `Inner`/`Left` are reachable from the compiler (`join-tables` only
/// ever emits LEFT JOIN); `Inner` is kept as the other half of the generic
/// `Query::join`/`inner_join` builder pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
}

/// A JOIN clause.
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub join_type: JoinType,
    pub table: TableRef,
    pub on: Option<Expr>,
}

impl Join {
    pub fn to_tokens(&self) -> TokenStream {
        self.to_tokens_for_dialect(Dialect::default())
    }

    pub fn to_tokens_for_dialect(&self, dialect: Dialect) -> TokenStream {
        let mut ts = TokenStream::new();

        match self.join_type {
            JoinType::Inner => ts.push(Token::Inner),
            JoinType::Left => ts.push(Token::Left),
        };

        ts.space().push(Token::Join).space();
        ts.append(&self.table.to_tokens());

        if let Some(on) = &self.on {
            ts.space().push(Token::On).space();
            ts.append(&on.to_tokens_for_dialect(dialect));
        }

        ts
    }
}

// =============================================================================
// ORDER BY
// =============================================================================

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDir {
    #[default]
    Asc,
    Desc,
}

/// NULLS ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NullsOrder {
    First,
    Last,
}

/// An ORDER BY expression.
#[derive(Debug, Clone, PartialEq)]
#[must_use = "builders have no effect until used"]
pub struct OrderByExpr {
    pub expr: Expr,
    pub dir: Option<SortDir>,
    pub nulls: Option<NullsOrder>,
}

impl OrderByExpr {
    pub fn new(expr: Expr) -> Self {
        Self {
            expr,
            dir: None,
            nulls: None,
        }
    }

    pub fn asc(expr: Expr) -> Self {
        Self {
            expr,
            dir: Some(SortDir::Asc),
            nulls: None,
        }
    }

    pub fn desc(expr: Expr) -> Self {
        Self {
            expr,
            dir: Some(SortDir::Desc),
            nulls: None,
        }
    }

    pub fn nulls_first(mut self) -> Self {
        self.nulls = Some(NullsOrder::First);
        self
    }

    pub fn nulls_last(mut self) -> Self {
        self.nulls = Some(NullsOrder::Last);
        self
    }

    /// Convert to tokens (dialect-agnostic, may emit invalid SQL for some dialects).
    pub fn to_tokens(&self) -> TokenStream {
        self.to_tokens_for_dialect(Dialect::default())
    }

    /// Convert to tokens for a specific dialect.
    ///
    /// Skips NULLS FIRST/LAST for dialects that don't support it.
    pub fn to_tokens_for_dialect(&self, dialect: Dialect) -> TokenStream {
        let mut ts = self.expr.to_tokens_for_dialect(dialect);

        if let Some(dir) = &self.dir {
            ts.space().push(match dir {
                SortDir::Asc => Token::Asc,
                SortDir::Desc => Token::Desc,
            });
        }

        // Only emit NULLS FIRST/LAST if dialect supports it
        if let Some(nulls) = &self.nulls {
            if dialect.supports_nulls_ordering() {
                ts.space().push(match nulls {
                    NullsOrder::First => Token::NullsFirst,
                    NullsOrder::Last => Token::NullsLast,
                });
            }
            // For dialects without NULLS ordering support, we silently skip it.
            // TODO: Consider emulating with CASE expressions for MySQL/older T-SQL
        }

        ts
    }
}

// =============================================================================
// LIMIT / OFFSET
// =============================================================================

/// LIMIT and OFFSET clause.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LimitOffset {
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl LimitOffset {
    /// Convert to token stream using dialect-specific pagination.
    ///
    /// Delegates to `SqlDialect::emit_limit_offset()` for the actual formatting.
    pub fn to_tokens(&self, dialect: Dialect) -> TokenStream {
        dialect.emit_limit_offset(self.limit, self.offset)
    }
}

// =============================================================================
// Query Builder
// =============================================================================

/// A SELECT query.
#[derive(Debug, Clone, Default, PartialEq)]
#[must_use = "Query has no effect until converted to SQL with to_sql() or to_tokens()"]
pub struct Query {
    pub select: Vec<SelectExpr>,
    pub from: Option<TableRef>,
    pub joins: Vec<Join>,
    pub where_clause: Option<Expr>,
    pub group_by: Vec<Expr>,
    pub order_by: Vec<OrderByExpr>,
    pub limit_offset: Option<LimitOffset>,
}

impl Query {
    /// Create a new empty query.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the SELECT list.
    pub fn select(mut self, exprs: Vec<impl Into<SelectExpr>>) -> Self {
        self.select = exprs.into_iter().map(|e| e.into()).collect();
        self
    }

    /// SELECT *
    pub fn select_star(mut self) -> Self {
        self.select = vec![SelectExpr::new(crate::expr::star())];
        self
    }

    /// Set the FROM table.
    pub fn from(mut self, table: TableRef) -> Self {
        self.from = Some(table);
        self
    }

    /// Add a JOIN.
    pub fn join(mut self, join_type: JoinType, table: TableRef, on: Expr) -> Self {
        self.joins.push(Join {
            join_type,
            table,
            on: Some(on),
        });
        self
    }

    /// Add an INNER JOIN.
    pub fn inner_join(self, table: TableRef, on: Expr) -> Self {
        self.join(JoinType::Inner, table, on)
    }

    /// Add a LEFT JOIN.
    pub fn left_join(self, table: TableRef, on: Expr) -> Self {
        self.join(JoinType::Left, table, on)
    }

    /// Add a WHERE condition (ANDed with existing conditions).
    pub fn filter(mut self, condition: Expr) -> Self {
        self.where_clause = Some(match self.where_clause {
            Some(existing) => existing.and(condition),
            None => condition,
        });
        self
    }

    /// Set the GROUP BY clause.
    pub fn group_by(mut self, exprs: Vec<Expr>) -> Self {
        self.group_by = exprs;
        self
    }

    /// Set the ORDER BY clause.
    pub fn order_by(mut self, exprs: Vec<OrderByExpr>) -> Self {
        self.order_by = exprs;
        self
    }

    /// Set LIMIT.
    pub fn limit(mut self, limit: u64) -> Self {
        match &mut self.limit_offset {
            Some(lo) => lo.limit = Some(limit),
            None => {
                self.limit_offset = Some(LimitOffset {
                    limit: Some(limit),
                    offset: None,
                })
            }
        }
        self
    }

    /// Set OFFSET.
    pub fn offset(mut self, offset: u64) -> Self {
        match &mut self.limit_offset {
            Some(lo) => lo.offset = Some(offset),
            None => {
                self.limit_offset = Some(LimitOffset {
                    limit: None,
                    offset: Some(offset),
                })
            }
        }
        self
    }

    /// Convert to token stream (dialect-agnostic, uses DuckDB for LIMIT/OFFSET).
    pub fn to_tokens(&self) -> TokenStream {
        self.to_tokens_for_dialect(Dialect::DuckDb)
    }

    /// Convert to token stream for a specific dialect.
    pub fn to_tokens_for_dialect(&self, dialect: Dialect) -> TokenStream {
        let mut ts = TokenStream::new();

        // SELECT
        ts.push(Token::Select);

        // Columns
        for (i, select_expr) in self.select.iter().enumerate() {
            if i == 0 {
                ts.newline().indent(1);
            } else {
                ts.comma().newline().indent(1);
            }
            ts.append(&select_expr.to_tokens_for_dialect(dialect));
        }

        // FROM
        if let Some(from) = &self.from {
            ts.newline().push(Token::From).space();
            ts.append(&from.to_tokens());
        }

        // JOINs
        for join in &self.joins {
            ts.newline();
            ts.append(&join.to_tokens_for_dialect(dialect));
        }

        // WHERE
        if let Some(where_clause) = &self.where_clause {
            ts.newline().push(Token::Where).space();
            ts.append(&where_clause.to_tokens_for_dialect(dialect));
        }

        // GROUP BY
        if !self.group_by.is_empty() {
            ts.newline().push(Token::GroupBy).space();
            for (i, expr) in self.group_by.iter().enumerate() {
                if i > 0 {
                    ts.comma().space();
                }
                ts.append(&expr.to_tokens_for_dialect(dialect));
            }
        }

        // ORDER BY
        // Note: T-SQL requires ORDER BY for OFFSET FETCH syntax.
        // If ORDER BY is missing but we have LIMIT/OFFSET, emit ORDER BY (SELECT NULL).
        let needs_order_by_placeholder = dialect.requires_order_by_for_offset()
            && self.order_by.is_empty()
            && self.limit_offset.is_some();

        if !self.order_by.is_empty() {
            ts.newline().push(Token::OrderBy).space();
            for (i, order_expr) in self.order_by.iter().enumerate() {
                if i > 0 {
                    ts.comma().space();
                }
                ts.append(&order_expr.to_tokens_for_dialect(dialect));
            }
        } else if needs_order_by_placeholder {
            // T-SQL requires ORDER BY for OFFSET FETCH syntax. When no ORDER BY is
            // specified but LIMIT/OFFSET is used, we emit `ORDER BY (SELECT NULL)`
            // as a syntactically valid placeholder.
            //
            // WARNING: This makes row ordering non-deterministic. The database may
            // return rows in any order, which can cause inconsistent pagination.
            // For predictable results, always specify an explicit ORDER BY clause
            // when using LIMIT/OFFSET.
            ts.newline()
                .push(Token::OrderBy)
                .space()
                .lparen()
                .push(Token::Select)
                .space()
                .push(Token::Null)
                .rparen();
        }

        // LIMIT / OFFSET
        if let Some(lo) = &self.limit_offset {
            ts.newline();
            ts.append(&lo.to_tokens(dialect));
        }

        ts
    }

    /// Generate SQL string for a specific dialect.
    pub fn to_sql(&self, dialect: Dialect) -> String {
        self.to_tokens_for_dialect(dialect).serialize(dialect)
    }
}

impl std::fmt::Display for Query {
    /// Formats the query using the default dialect (DuckDB).
    ///
    /// For dialect-specific SQL, use [`Query::to_sql`] instead.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_sql(Dialect::default()))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::expr::{col, count_star, lit_int, sum, table_col};

    #[test]
    fn test_simple_select() {
        let query = Query::new()
            .select(vec![col("id"), col("name")])
            .from(TableRef::new("users").with_schema("dbo"));

        let sql = query.to_sql(Dialect::TSql);
        assert!(sql.contains("[dbo].[users]"));
        assert!(sql.contains("[id]"));
        assert!(sql.contains("[name]"));
    }

    #[test]
    fn test_select_star() {
        let query = Query::new().select_star().from(TableRef::new("users"));

        let sql = query.to_sql(Dialect::Postgres);
        assert!(sql.contains("*"));
    }

    #[test]
    fn test_filter() {
        let query = Query::new()
            .select(vec![col("name")])
            .from(TableRef::new("users"))
            .filter(col("active").eq(true))
            .filter(col("age").gte(lit_int(18)));

        let sql = query.to_sql(Dialect::DuckDb);
        assert!(sql.contains("WHERE"));
        assert!(sql.contains("AND"));
        assert!(sql.contains("true"));
        assert!(sql.contains("18"));
    }

    #[test]
    fn test_join() {
        let query = Query::new()
            .select(vec![table_col("u", "name"), table_col("o", "total")])
            .from(TableRef::new("users").with_alias("u"))
            .inner_join(
                TableRef::new("orders").with_alias("o"),
                table_col("u", "id").eq(table_col("o", "user_id")),
            );

        let sql = query.to_sql(Dialect::MySql);
        assert!(sql.contains("INNER JOIN"));
        assert!(sql.contains("ON"));
    }

    #[test]
    fn test_aggregation() {
        let query = Query::new()
            .select(vec![
                col("region").into(),
                sum(col("amount")).alias("total"),
                count_star().alias("cnt"),
            ])
            .from(TableRef::new("orders"))
            .group_by(vec![col("region")]);

        let sql = query.to_sql(Dialect::Postgres);
        assert!(sql.contains("GROUP BY"));
        assert!(sql.contains("SUM"));
    }

    #[test]
    fn test_order_by() {
        let query = Query::new()
            .select(vec![col("name"), col("age")])
            .from(TableRef::new("users"))
            .order_by(vec![
                OrderByExpr::desc(col("age")),
                OrderByExpr::asc(col("name")),
            ]);

        let sql = query.to_sql(Dialect::Postgres);
        assert!(sql.contains("ORDER BY"));
        assert!(sql.contains("DESC"));
        assert!(sql.contains("ASC"));
    }

    #[test]
    fn test_limit_duckdb() {
        let query = Query::new()
            .select_star()
            .from(TableRef::new("users"))
            .order_by(vec![OrderByExpr::asc(col("id"))])
            .limit(10)
            .offset(20);

        let sql = query.to_sql(Dialect::DuckDb);
        assert!(sql.contains("LIMIT 10"));
        assert!(sql.contains("OFFSET 20"));
    }

    #[test]
    fn test_limit_tsql() {
        let query = Query::new()
            .select_star()
            .from(TableRef::new("users"))
            .order_by(vec![OrderByExpr::asc(col("id"))])
            .limit(10)
            .offset(20);

        let sql = query.to_sql(Dialect::TSql);
        assert!(sql.contains("OFFSET 20 ROWS"));
        assert!(sql.contains("FETCH NEXT 10 ROWS ONLY"));
    }

    #[test]
    fn test_limit_tsql_without_order_by() {
        // T-SQL requires ORDER BY for OFFSET/FETCH, so we use ORDER BY (SELECT NULL)
        let query = Query::new()
            .select_star()
            .from(TableRef::new("users"))
            .limit(10);

        let sql = query.to_sql(Dialect::TSql);
        assert!(
            sql.contains("ORDER BY (SELECT NULL)"),
            "Expected ORDER BY (SELECT NULL) placeholder, got: {}",
            sql
        );
        assert!(sql.contains("OFFSET 0 ROWS"));
        assert!(sql.contains("FETCH NEXT 10 ROWS ONLY"));
    }

    #[test]
    fn test_aliased_columns() {
        let query = Query::new()
            .select(vec![
                col("first_name").alias("fname"),
                col("last_name").alias("lname"),
            ])
            .from(TableRef::new("users"));

        let sql = query.to_sql(Dialect::Postgres);
        assert!(sql.contains("AS \"fname\""));
        assert!(sql.contains("AS \"lname\""));
    }

    #[test]
    fn test_subquery_in_filter() {
        let subquery = Query::new()
            .select(vec![col("user_id")])
            .from(TableRef::new("orders"))
            .filter(col("total").gt(lit_int(1000)));

        let query = Query::new()
            .select_star()
            .from(TableRef::new("users"))
            .filter(Expr::InSubquery {
                expr: Box::new(col("id")),
                subquery: Box::new(subquery),
                negated: false,
            });

        let sql = query.to_sql(Dialect::Postgres);
        assert!(sql.contains("IN"));
        assert!(sql.contains("SELECT"));
    }

    #[test]
    fn test_query_display() {
        let query = Query::new()
            .select(vec![col("id"), col("name")])
            .from(TableRef::new("users"));

        // Display uses default dialect (DuckDB)
        let display_sql = format!("{}", query);
        assert!(display_sql.contains("SELECT"));
        assert!(display_sql.contains("\"id\""));
        assert!(display_sql.contains("\"users\""));
    }
}
