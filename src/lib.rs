//! # mbql-compiler
//!
//! Compiles MBQL — Metabase's nested analytic query representation — into
//! dialect-parameterized SQL.
//!
//! ## Pipeline
//!
//! ```text
//! ┌──────────────┐   ┌───────────────────┐   ┌──────────────────┐
//! │ MetadataStore │   │ Dialect Registry  │   │ JoinInfoResolver │
//! │ (table/field) │   │ (per-dialect      │   │ (fk-> targets)   │
//! │               │   │  override points) │   │                  │
//! └──────┬───────┘   └─────────┬─────────┘   └────────┬─────────┘
//!        │                     │                       │
//!        └───────────┬─────────┴───────────┬───────────┘
//!                     ▼                     ▼
//!             ┌───────────────────────────────────┐
//!             │     compiler::Compiler             │
//!             │  Expression Compiler (to_sql_ast)   │
//!             │  Clause Appliers + Orchestrator     │
//!             └─────────────────┬───────────────────┘
//!                               ▼
//!                        sql::query::Query
//!                               │ to_tokens_for_dialect / serialize
//!                               ▼
//!                     native SQL text + positional params
//! ```
//!
//! [`compiler::mbql_to_native`] is the top-level entry point.

pub mod compiler;
pub mod config;
pub mod dialect_registry;
pub mod error;
pub mod join;
pub mod mbql;
pub mod metadata;
pub mod sql;

pub use compiler::{mbql_to_native, CompiledQuery, Compiler};
pub use config::CompileOptions;
pub use dialect_registry::MbqlDialect;
pub use error::CompileError;
pub use join::{JoinInfo, JoinInfoResolver, StaticJoinInfoResolver};
pub use metadata::{FieldId, FieldRecord, InMemoryMetadataStore, MetadataStore, TableId, TableRecord};
pub use sql::expr;
pub use sql::query;

/// Re-exports for convenient usage.
pub mod prelude {
    pub use crate::compiler::{mbql_to_native, CompiledQuery, Compiler};
    pub use crate::config::CompileOptions;
    pub use crate::dialect_registry::MbqlDialect;
    pub use crate::error::CompileError;
    pub use crate::join::{JoinInfo, JoinInfoResolver, StaticJoinInfoResolver};
    pub use crate::mbql::*;
    pub use crate::metadata::{
        FieldId, FieldRecord, InMemoryMetadataStore, MetadataStore, SpecialType, TableId, TableRecord,
    };
    pub use crate::sql::dialect::Dialect;
    pub use crate::sql::expr::{Expr, ExprExt};
    pub use crate::sql::query::{Query, SelectExpr, TableRef};
}
