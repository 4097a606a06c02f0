//! SQL generation module.
//!
//! This module provides a type-safe SQL builder used by the compiler's
//! formatter stage to render a `SqlAst` into dialect-specific SELECT text.
//! It includes:
//!
//! - [`query`] - SELECT query builder
//! - [`expr`] - Expression AST and builder DSL
//! - [`token`] - Token types for SQL generation
//! - [`dialect`] - SQL dialect implementations

pub mod dialect;
pub mod expr;
pub mod query;
pub mod token;

// Re-export commonly used types at the sql module level
pub use dialect::{Dialect, QuoteStyle, SqlDialect};
pub use expr::{
    avg, coalesce, col, count, count_distinct, count_star, func, lag_offset, lit_bool, lit_float,
    lit_int, lit_null, lit_str, max, min, star, sum, table_col, table_star, BinaryOperator, Expr,
    ExprExt, Literal, UnaryOperator, WindowExt, WindowFrame, WindowOrderBy,
};
pub use query::{
    Join, JoinType, LimitOffset, NullsOrder, OrderByExpr, Query, SelectExpr, SortDir, TableRef,
};
pub use token::{Token, TokenStream};
